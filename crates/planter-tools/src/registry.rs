//! The tool catalog.
//!
//! One [`ToolRegistry`] drives both provider schema generation and dispatch,
//! so the schema the model sees and the tool that runs can never drift
//! apart.

use std::collections::HashMap;
use std::sync::Arc;

use planter_core::schema::ToolSchema;

use crate::fs::{ListDirTool, PatchFileTool, ReadFileTool, WriteFileTool};
use crate::misc::{
    ExecuteTool, FinishTool, PlanAssembleTool, PlanInjectTool, SubtaskTool, ThinkTool,
};
use crate::search::{RepoMapTool, SearchTool};
use crate::shell::{RunShellTool, ShellCancelTool, ShellOutputTool, ShellStatusTool};
use crate::traits::{PlanterTool, SpawnKind};
use crate::web::{FetchUrlTool, WebSearchTool};

/// Ordered tool catalog with name lookup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn PlanterTool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Later registrations under the same name win.
    pub fn register(&mut self, tool: Arc<dyn PlanterTool>) {
        let name = tool.name().to_owned();
        if let Some(&index) = self.by_name.get(&name) {
            self.tools[index] = tool;
        } else {
            let _ = self.by_name.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn PlanterTool>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// The spawn marker for a name, if it is a spawn entry.
    #[must_use]
    pub fn spawn_kind(&self, name: &str) -> Option<SpawnKind> {
        self.get(name).and_then(|t| t.spawn_kind())
    }

    /// Provider-neutral schemas, in registration order.
    #[must_use]
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Registered names, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The full standard catalog.
#[must_use]
pub fn standard_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ReadFileTool));
    registry.register(Arc::new(WriteFileTool));
    registry.register(Arc::new(PatchFileTool));
    registry.register(Arc::new(ListDirTool));
    registry.register(Arc::new(SearchTool));
    registry.register(Arc::new(RepoMapTool));
    registry.register(Arc::new(RunShellTool));
    registry.register(Arc::new(ShellStatusTool));
    registry.register(Arc::new(ShellCancelTool));
    registry.register(Arc::new(ShellOutputTool));
    registry.register(Arc::new(WebSearchTool));
    registry.register(Arc::new(FetchUrlTool));
    registry.register(Arc::new(ThinkTool));
    registry.register(Arc::new(SubtaskTool));
    registry.register(Arc::new(ExecuteTool));
    registry.register(Arc::new(FinishTool));
    registry.register(Arc::new(PlanAssembleTool));
    registry.register(Arc::new(PlanInjectTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_complete() {
        let registry = standard_registry();
        let expected = [
            "read_file",
            "write_file",
            "patch_file",
            "list_dir",
            "search",
            "repo_map",
            "run_shell",
            "shell_status",
            "shell_cancel",
            "shell_output",
            "web_search",
            "fetch_url",
            "think",
            "subtask",
            "execute",
            "finish",
            "plan_assemble",
            "plan_inject",
        ];
        assert_eq!(registry.names(), expected);
        for name in expected {
            assert!(registry.get(name).is_some(), "missing tool {name}");
        }
    }

    #[test]
    fn schemas_match_catalog_order() {
        let registry = standard_registry();
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), registry.len());
        assert_eq!(schemas[0].name, "read_file");
        for schema in &schemas {
            assert_eq!(schema.parameters.schema_type, "object");
            assert!(!schema.description.is_empty());
        }
    }

    #[test]
    fn spawn_kinds_flagged() {
        let registry = standard_registry();
        assert_eq!(registry.spawn_kind("subtask"), Some(SpawnKind::Subtask));
        assert_eq!(registry.spawn_kind("execute"), Some(SpawnKind::Execute));
        assert_eq!(registry.spawn_kind("read_file"), None);
    }

    #[test]
    fn reregistration_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ThinkTool));
        registry.register(Arc::new(ThinkTool));
        assert_eq!(registry.len(), 1);
    }
}
