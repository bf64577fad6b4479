//! Shared test utilities for tool implementations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::shell::jobs::JobTable;
use crate::traits::{PlanSlot, ToolContext};
use crate::workspace::{ReadSet, WriteGuard, Workspace};

/// Build a [`ToolContext`] over a fresh temp workspace.
///
/// The returned `TempDir` must stay alive for the duration of the test.
#[must_use]
pub fn test_context() -> (ToolContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = context_for(dir.path());
    (ctx, dir)
}

/// Build a [`ToolContext`] over an existing directory.
#[must_use]
pub fn context_for(root: &std::path::Path) -> ToolContext {
    ToolContext {
        workspace: Arc::new(Workspace::open(root).expect("workspace")),
        read_set: Arc::new(ReadSet::new()),
        write_guard: Arc::new(WriteGuard::new()),
        jobs: Arc::new(JobTable::new()),
        plans: Arc::new(PlanSlot::new()),
        cancellation: CancellationToken::new(),
        timeout: Duration::from_secs(30),
        max_observation_chars: 20_000,
        depth: 0,
        claimant: "test-solve".into(),
        shell_env: BTreeMap::new(),
        user_agent: "openplanter-test".into(),
        web_search_base_url: None,
    }
}

/// Write a fixture file under the workspace root.
pub fn write_fixture(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, content).expect("write fixture");
}
