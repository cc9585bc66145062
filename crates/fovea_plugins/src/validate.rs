//! Submission-time tool validation.
//!
//! Decides whether a requested tool set is admissible against the plugin's
//! live tool table. Runs at the ingress boundary before anything touches
//! storage.

use thiserror::Error;

use fovea_protocol::UploadKind;

use crate::registry::{PluginRegistry, RegistryError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("unknown tool '{tool}' (valid tools: {})", known.join(", "))]
    UnknownTool { tool: String, known: Vec<String> },

    #[error("tool '{tool}' does not accept {kind} input")]
    UnsupportedInputKind { tool: String, kind: UploadKind },

    #[error("no tools requested")]
    NoToolsRequested,
}

/// Validate a submission's requested tools against the registry.
///
/// The plugin's runtime tool table is the sole source of truth; reserved
/// lifecycle names are never present in it, so they fail as unknown tools
/// like any other bad name.
pub fn validate_tools(
    registry: &PluginRegistry,
    plugin_id: &str,
    tool_names: &[String],
    upload_kind: UploadKind,
) -> Result<(), ValidationError> {
    let plugin = registry.get(plugin_id).map_err(|e| match e {
        RegistryError::NotFound(id) => ValidationError::UnknownPlugin(id),
        // get() only fails with NotFound
        other => ValidationError::UnknownPlugin(other.to_string()),
    })?;

    if tool_names.is_empty() {
        return Err(ValidationError::NoToolsRequested);
    }

    let declared = plugin.tools();
    for tool in tool_names {
        let Some(spec) = declared.get(tool) else {
            return Err(ValidationError::UnknownTool {
                tool: tool.clone(),
                known: declared.keys().cloned().collect(),
            });
        };
        if !spec.accepts(upload_kind) {
            return Err(ValidationError::UnsupportedInputKind {
                tool: tool.clone(),
                kind: upload_kind,
            });
        }
    }

    Ok(())
}
