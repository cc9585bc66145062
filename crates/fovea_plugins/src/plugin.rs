//! The plugin dispatch contract.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use fovea_protocol::{JobId, UploadKind};

/// Method names reserved for the plugin lifecycle. These are never valid
/// tool names and the registry refuses plugins that declare them.
pub const RESERVED_TOOL_NAMES: [&str; 4] = ["load", "unload", "run_tool", "validate"];

/// Declared capability of one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub description: String,
    pub input_kinds: BTreeSet<UploadKind>,
}

impl ToolSpec {
    pub fn new(description: impl Into<String>, kinds: impl IntoIterator<Item = UploadKind>) -> Self {
        Self {
            description: description.into(),
            input_kinds: kinds.into_iter().collect(),
        }
    }

    pub fn accepts(&self, kind: UploadKind) -> bool {
        self.input_kinds.contains(&kind)
    }
}

/// Tool name -> spec, read once at registration. The map is the sole
/// source of truth for what a plugin exposes.
pub type ToolTable = BTreeMap<String, ToolSpec>;

/// Startup context handed to `load`.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    /// Roots a plugin may resolve model weights or language data from.
    pub search_path: Vec<PathBuf>,
}

// ============================================================================
// Dispatch arguments and results
// ============================================================================

/// Arguments for one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolArgs {
    pub job_id: JobId,
    pub input: ToolInput,
}

/// The uploaded media, in the shape tools consume it: images arrive as
/// bytes, videos as an absolute path on disk.
#[derive(Debug, Clone)]
pub enum ToolInput {
    Image { bytes: Vec<u8> },
    Video { path: PathBuf },
}

impl ToolInput {
    pub fn kind(&self) -> UploadKind {
        match self {
            ToolInput::Image { .. } => UploadKind::Image,
            ToolInput::Video { .. } => UploadKind::Video,
        }
    }
}

/// What a tool returns: a plain mapping, or a typed model that was
/// serialized at construction. The registry collapses both to a mapping at
/// its boundary, so the worker only ever sees one shape.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    Mapping(Map<String, Value>),
    Model(Value),
}

impl ToolOutput {
    pub fn mapping(map: Map<String, Value>) -> Self {
        ToolOutput::Mapping(map)
    }

    /// Serialize a typed result model. Fails if the model does not
    /// serialize; whether it serializes to a mapping is checked at the
    /// registry boundary.
    pub fn from_model<T: Serialize>(model: &T) -> Result<Self, PluginError> {
        Ok(ToolOutput::Model(serde_json::to_value(model)?))
    }

    /// Normalize to a mapping. This is the registry's single
    /// normalization point; no other component performs this conversion.
    pub(crate) fn into_mapping(self) -> Result<Map<String, Value>, PluginError> {
        match self {
            ToolOutput::Mapping(map) => Ok(map),
            ToolOutput::Model(Value::Object(map)) => Ok(map),
            ToolOutput::Model(other) => Err(PluginError::NotAMapping {
                found: value_kind(&other),
            }),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by plugin code or by the result boundary.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Raised by the tool body. The message is what reaches the job row.
    #[error("{0}")]
    Execution(String),

    /// Lifecycle `load` failure; the plugin is excluded, not fatal.
    #[error("plugin load failed: {0}")]
    Load(String),

    /// A tool returned a serialized model that is not a mapping.
    #[error("tool output is not a mapping (got {found})")]
    NotAMapping { found: &'static str },

    #[error("output serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}

// ============================================================================
// The trait
// ============================================================================

/// A unit of analysis code: a manifest of tools plus one dispatch method.
///
/// `load` runs once before the plugin serves dispatches and may allocate
/// whatever the tools need; `unload` runs once at shutdown. Neither is a
/// tool. The registry guarantees `run_tool` is only called with a name
/// present in `tools()`.
pub trait Plugin: Send + Sync {
    fn id(&self) -> &str;
    fn version(&self) -> &str;
    fn description(&self) -> &str;

    /// Declared tool table. Must not change after `load` returns.
    fn tools(&self) -> &ToolTable;

    fn load(&mut self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    fn unload(&self) {}

    /// Canonical dispatch.
    fn run_tool(&self, tool: &str, args: &ToolArgs) -> Result<ToolOutput, PluginError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct FakeModel {
        text: String,
    }

    #[test]
    fn model_output_normalizes_to_mapping() {
        let output = ToolOutput::from_model(&FakeModel {
            text: "hello".into(),
        })
        .unwrap();
        let map = output.into_mapping().unwrap();
        assert_eq!(map["text"], "hello");
    }

    #[test]
    fn non_mapping_model_is_rejected_at_the_boundary() {
        let output = ToolOutput::from_model(&vec![1, 2, 3]).unwrap();
        let err = output.into_mapping().unwrap_err();
        assert!(matches!(err, PluginError::NotAMapping { found: "array" }));
    }

    #[test]
    fn tool_spec_accepts_declared_kinds_only() {
        let spec = ToolSpec::new("detect things", [fovea_protocol::UploadKind::Image]);
        assert!(spec.accepts(fovea_protocol::UploadKind::Image));
        assert!(!spec.accepts(fovea_protocol::UploadKind::Video));
    }
}
