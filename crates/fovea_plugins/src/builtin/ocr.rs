//! Text extraction plugin.

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use fovea_protocol::UploadKind;

use crate::plugin::{
    Plugin, PluginContext, PluginError, ToolArgs, ToolInput, ToolOutput, ToolSpec, ToolTable,
};

/// Minimum printable run length that counts as text.
const MIN_RUN_LEN: usize = 4;

/// Cap on extracted text so a pathological upload cannot balloon the
/// output document.
const MAX_TEXT_LEN: usize = 64 * 1024;

/// Typed result model; serialized at the registry boundary.
#[derive(Debug, Serialize)]
struct ExtractedText {
    text: String,
    characters: usize,
}

pub struct OcrPlugin {
    tools: ToolTable,
    /// Optional language data resolved from the plugin search path.
    language_data: Option<PathBuf>,
}

impl OcrPlugin {
    pub fn new() -> Self {
        let mut tools = ToolTable::new();
        tools.insert(
            "extract_text".to_string(),
            ToolSpec::new("Extract embedded text from a still image", [UploadKind::Image]),
        );
        Self {
            tools,
            language_data: None,
        }
    }

    fn extract_text(&self, bytes: &[u8]) -> ExtractedText {
        let mut runs: Vec<String> = Vec::new();
        let mut current = String::new();
        for &byte in bytes {
            if byte.is_ascii_graphic() || byte == b' ' {
                current.push(byte as char);
            } else {
                if current.trim().len() >= MIN_RUN_LEN {
                    runs.push(current.trim().to_string());
                }
                current.clear();
            }
        }
        if current.trim().len() >= MIN_RUN_LEN {
            runs.push(current.trim().to_string());
        }

        let mut text = runs.join(" ");
        text.truncate(MAX_TEXT_LEN);
        let characters = text.chars().count();
        ExtractedText { text, characters }
    }
}

impl Default for OcrPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for OcrPlugin {
    fn id(&self) -> &str {
        "ocr"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn description(&self) -> &str {
        "Optical character recognition over still images"
    }

    fn tools(&self) -> &ToolTable {
        &self.tools
    }

    fn load(&mut self, ctx: &PluginContext) -> Result<(), PluginError> {
        // Language data is optional; extraction falls back to the built-in
        // printable-run scanner without it.
        self.language_data = ctx
            .search_path
            .iter()
            .map(|root| root.join("ocr/eng.traineddata"))
            .find(|candidate| candidate.is_file());
        if let Some(path) = &self.language_data {
            debug!("ocr: using language data at {}", path.display());
        }
        Ok(())
    }

    fn run_tool(&self, tool: &str, args: &ToolArgs) -> Result<ToolOutput, PluginError> {
        match tool {
            "extract_text" => {
                let ToolInput::Image { bytes } = &args.input else {
                    return Err(PluginError::execution("extract_text requires image input"));
                };
                ToolOutput::from_model(&self.extract_text(bytes))
            }
            other => Err(PluginError::execution(format!("unhandled tool: {other}"))),
        }
    }
}
