//! Built-in plugins.
//!
//! These are the configured plugin list handed to `PluginRegistry::load_all`
//! at startup. Their analysis bodies are deterministic stand-ins; what they
//! exercise for real is the dispatch contract, the declared tool tables and
//! the output normalization path.

mod ocr;
mod tracker;

pub use ocr::OcrPlugin;
pub use tracker::TrackerPlugin;

use crate::plugin::Plugin;

/// The full built-in plugin set, in registration order.
pub fn all() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(OcrPlugin::new()),
        Box::new(TrackerPlugin::new()),
    ]
}
