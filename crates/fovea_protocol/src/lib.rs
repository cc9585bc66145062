//! Canonical types for the Fovea media analysis server.
//!
//! Everything that crosses a crate boundary lives here: job identifiers and
//! lifecycle enums, progress events, the HTTP API payload types, and the
//! resolved system configuration. Components depend on these definitions
//! instead of redeclaring their own.

pub mod config;
pub mod defaults;
pub mod events;
pub mod http_types;
pub mod types;

// Re-export the canonical enums and ids for convenience
pub use types::{JobId, JobIdError, JobStatus, JobType, StatusParseError, UploadKind};

pub use events::JobEvent;

pub use http_types::{
    ErrorBody, HealthResponse, JobResponse, PluginManifestResponse, PluginSummary,
    SubmitResponse, ToolManifestEntry, WsStatusMessage,
};

pub use config::SystemConfig;
