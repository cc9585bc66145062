//! Plugin registry: loads instances at startup, answers capability
//! questions, and owns the only dispatch path into plugin code.

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use fovea_protocol::{PluginManifestResponse, PluginSummary, ToolManifestEntry};

use crate::plugin::{Plugin, PluginContext, PluginError, ToolArgs, RESERVED_TOOL_NAMES};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown plugin: {0}")]
    NotFound(String),

    #[error("plugin '{plugin_id}' has no tool '{tool}' (known tools: {})", known.join(", "))]
    UnknownTool {
        plugin_id: String,
        tool: String,
        known: Vec<String>,
    },

    /// Any error raised inside plugin code during dispatch.
    #[error("plugin '{plugin_id}' tool '{tool}' failed: {source}")]
    Plugin {
        plugin_id: String,
        tool: String,
        #[source]
        source: PluginError,
    },
}

/// Process-wide plugin instances. Written once at startup, read-only
/// afterward; the read path takes no locks.
pub struct PluginRegistry {
    plugins: HashMap<String, Box<dyn Plugin>>,
}

impl PluginRegistry {
    /// Instantiate and load every candidate plugin. A plugin that fails
    /// `load`, declares a reserved tool name, or collides with an already
    /// registered id is logged and excluded; it never blocks startup.
    pub fn load_all(candidates: Vec<Box<dyn Plugin>>, ctx: &PluginContext) -> Self {
        let mut plugins: HashMap<String, Box<dyn Plugin>> = HashMap::new();

        for mut plugin in candidates {
            let id = plugin.id().to_string();

            if let Some(reserved) = plugin
                .tools()
                .keys()
                .find(|name| RESERVED_TOOL_NAMES.contains(&name.as_str()))
            {
                error!(
                    "Excluding plugin '{}': declares reserved tool name '{}'",
                    id, reserved
                );
                continue;
            }

            if plugins.contains_key(&id) {
                error!("Excluding plugin '{}': duplicate id", id);
                continue;
            }

            match plugin.load(ctx) {
                Ok(()) => {
                    info!(
                        "Loaded plugin '{}' v{} ({} tool(s))",
                        id,
                        plugin.version(),
                        plugin.tools().len()
                    );
                    plugins.insert(id, plugin);
                }
                Err(e) => {
                    error!("Excluding plugin '{}': {}", id, e);
                }
            }
        }

        if plugins.is_empty() {
            warn!("No plugins loaded; every submission will be rejected");
        }

        Self { plugins }
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Registered plugins for discovery, sorted by id.
    pub fn list(&self) -> Vec<PluginSummary> {
        let mut summaries: Vec<PluginSummary> = self
            .plugins
            .values()
            .map(|plugin| PluginSummary {
                id: plugin.id().to_string(),
                version: plugin.version().to_string(),
                description: plugin.description().to_string(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Manifest derived from the live instance's tool table.
    pub fn manifest(&self, plugin_id: &str) -> Result<PluginManifestResponse, RegistryError> {
        let plugin = self.get(plugin_id)?;
        let tools = plugin
            .tools()
            .iter()
            .map(|(name, spec)| ToolManifestEntry {
                name: name.clone(),
                description: spec.description.clone(),
                input_kinds: spec.input_kinds.iter().copied().collect(),
            })
            .collect();
        Ok(PluginManifestResponse {
            id: plugin.id().to_string(),
            version: plugin.version().to_string(),
            tools,
        })
    }

    pub fn get(&self, plugin_id: &str) -> Result<&dyn Plugin, RegistryError> {
        self.plugins
            .get(plugin_id)
            .map(|boxed| boxed.as_ref())
            .ok_or_else(|| RegistryError::NotFound(plugin_id.to_string()))
    }

    /// Canonical dispatch. Consults the declared tool table, invokes the
    /// plugin, and normalizes the result to a mapping so callers share one
    /// serializer.
    pub fn run_tool(
        &self,
        plugin_id: &str,
        tool: &str,
        args: &ToolArgs,
    ) -> Result<Map<String, Value>, RegistryError> {
        let plugin = self.get(plugin_id)?;

        if !plugin.tools().contains_key(tool) {
            return Err(RegistryError::UnknownTool {
                plugin_id: plugin_id.to_string(),
                tool: tool.to_string(),
                known: plugin.tools().keys().cloned().collect(),
            });
        }

        let wrap = |source: PluginError| RegistryError::Plugin {
            plugin_id: plugin_id.to_string(),
            tool: tool.to_string(),
            source,
        };

        let output = plugin.run_tool(tool, args).map_err(wrap)?;
        output.into_mapping().map_err(wrap)
    }

    /// Shutdown hook: invokes each plugin's `unload`.
    pub fn unload_all(&self) {
        for plugin in self.plugins.values() {
            info!("Unloading plugin '{}'", plugin.id());
            plugin.unload();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{ToolInput, ToolOutput, ToolSpec, ToolTable};
    use fovea_protocol::{JobId, UploadKind};
    use serde_json::json;

    struct TestPlugin {
        id: &'static str,
        tools: ToolTable,
        fail_load: bool,
    }

    impl TestPlugin {
        fn new(id: &'static str, tool_names: &[&str]) -> Self {
            let mut tools = ToolTable::new();
            for name in tool_names {
                tools.insert(
                    name.to_string(),
                    ToolSpec::new("test tool", [UploadKind::Image]),
                );
            }
            Self {
                id,
                tools,
                fail_load: false,
            }
        }
    }

    impl Plugin for TestPlugin {
        fn id(&self) -> &str {
            self.id
        }
        fn version(&self) -> &str {
            "0.0.1"
        }
        fn description(&self) -> &str {
            "test plugin"
        }
        fn tools(&self) -> &ToolTable {
            &self.tools
        }
        fn load(&mut self, _ctx: &PluginContext) -> Result<(), PluginError> {
            if self.fail_load {
                Err(PluginError::Load("missing weights".into()))
            } else {
                Ok(())
            }
        }
        fn run_tool(&self, tool: &str, _args: &ToolArgs) -> Result<ToolOutput, PluginError> {
            if tool == "boom" {
                return Err(PluginError::execution("simulated failure"));
            }
            let mut map = serde_json::Map::new();
            map.insert("tool".into(), json!(tool));
            Ok(ToolOutput::Mapping(map))
        }
    }

    fn image_args() -> ToolArgs {
        ToolArgs {
            job_id: JobId::generate(),
            input: ToolInput::Image { bytes: vec![1, 2] },
        }
    }

    #[test]
    fn load_all_excludes_failing_plugins() {
        let good = TestPlugin::new("good", &["run"]);
        let mut bad = TestPlugin::new("bad", &["run"]);
        bad.fail_load = true;

        let registry =
            PluginRegistry::load_all(vec![Box::new(good), Box::new(bad)], &PluginContext::default());
        assert!(registry.get("good").is_ok());
        assert!(matches!(
            registry.get("bad"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn reserved_tool_names_exclude_the_plugin() {
        let plugin = TestPlugin::new("sneaky", &["run_tool"]);
        let registry = PluginRegistry::load_all(vec![Box::new(plugin)], &PluginContext::default());
        assert!(registry.get("sneaky").is_err());
    }

    #[test]
    fn run_tool_rejects_undeclared_names() {
        let registry = PluginRegistry::load_all(
            vec![Box::new(TestPlugin::new("p", &["declared"]))],
            &PluginContext::default(),
        );
        let err = registry
            .run_tool("p", "undeclared", &image_args())
            .unwrap_err();
        match err {
            RegistryError::UnknownTool { known, .. } => {
                assert_eq!(known, vec!["declared".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn run_tool_propagates_plugin_errors() {
        let registry = PluginRegistry::load_all(
            vec![Box::new(TestPlugin::new("p", &["boom"]))],
            &PluginContext::default(),
        );
        let err = registry.run_tool("p", "boom", &image_args()).unwrap_err();
        assert!(err.to_string().contains("simulated failure"));
    }

    #[test]
    fn run_tool_returns_normalized_mapping() {
        let registry = PluginRegistry::load_all(
            vec![Box::new(TestPlugin::new("p", &["detect"]))],
            &PluginContext::default(),
        );
        let map = registry.run_tool("p", "detect", &image_args()).unwrap();
        assert_eq!(map["tool"], "detect");
    }
}
