//! Plugin capability model and registry.
//!
//! A plugin is a black box behind two seams: an immutable tool table read
//! at registration time, and a single dispatch method. The registry is the
//! only component that talks to plugin instances, and the declared tool
//! table is the only authority on what a plugin can do. There is no
//! reflection and no descriptor file with a second tool list.

pub mod builtin;
pub mod plugin;
pub mod registry;
pub mod validate;

pub use plugin::{
    Plugin, PluginContext, PluginError, ToolArgs, ToolInput, ToolOutput, ToolSpec, ToolTable,
    RESERVED_TOOL_NAMES,
};
pub use registry::{PluginRegistry, RegistryError};
pub use validate::{validate_tools, ValidationError};
