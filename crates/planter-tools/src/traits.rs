//! Tool trait and execution context.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use planter_core::schema::ToolSchema;

use crate::errors::ToolError;
use crate::shell::jobs::JobTable;
use crate::workspace::{ReadSet, Workspace, WriteGuard};

/// Spawn-style catalog entries the engine intercepts instead of executing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnKind {
    /// Child at an explicit same-or-lower tier model.
    Subtask,
    /// Child at the lowest tier.
    Execute,
}

/// The `(is_final, observation)` pair every tool produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Observation text returned to the model.
    pub observation: String,
    /// Whether this outcome ends the turn with a final answer.
    pub is_final: bool,
}

impl ToolOutcome {
    /// A regular observation.
    #[must_use]
    pub fn observation(text: impl Into<String>) -> Self {
        Self {
            observation: text.into(),
            is_final: false,
        }
    }

    /// A final answer.
    #[must_use]
    pub fn final_answer(text: impl Into<String>) -> Self {
        Self {
            observation: text.into(),
            is_final: true,
        }
    }
}

/// Captured plans awaiting session persistence and re-injection.
#[derive(Debug, Default)]
pub struct PlanSlot {
    plans: Mutex<Vec<String>>,
}

impl PlanSlot {
    /// Empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a plan (newest last).
    pub fn push(&self, plan: impl Into<String>) {
        self.plans.lock().push(plan.into());
    }

    /// The newest stored plan.
    #[must_use]
    pub fn latest(&self) -> Option<String> {
        self.plans.lock().last().cloned()
    }

    /// All stored plans, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<String> {
        self.plans.lock().clone()
    }
}

/// Everything a tool execution may touch.
#[derive(Clone)]
pub struct ToolContext {
    /// The confinement root.
    pub workspace: Arc<Workspace>,
    /// Per-solve read tracking.
    pub read_set: Arc<ReadSet>,
    /// Parent-step write-conflict detection.
    pub write_guard: Arc<WriteGuard>,
    /// Background shell jobs (engine-wide).
    pub jobs: Arc<JobTable>,
    /// Captured plans (engine-wide).
    pub plans: Arc<PlanSlot>,
    /// Cooperative cancellation.
    pub cancellation: CancellationToken,
    /// Per-call timeout for this tool.
    pub timeout: Duration,
    /// Observation clipping limit.
    pub max_observation_chars: usize,
    /// Recursion depth of the owning solve.
    pub depth: u32,
    /// Write-claim token identifying the owning solve.
    pub claimant: String,
    /// Extra environment variables for shell subprocesses.
    pub shell_env: BTreeMap<String, String>,
    /// User-Agent for the web tools.
    pub user_agent: String,
    /// Search endpoint override (defaults to DuckDuckGo HTML).
    pub web_search_base_url: Option<String>,
}

/// A tool exposed to the model.
#[async_trait]
pub trait PlanterTool: Send + Sync {
    /// Catalog name.
    fn name(&self) -> &str;

    /// Schema handed to providers.
    fn definition(&self) -> ToolSchema;

    /// Spawn marker; `Some` entries are dispatched by the engine, never
    /// through [`PlanterTool::execute`].
    fn spawn_kind(&self) -> Option<SpawnKind> {
        None
    }

    /// Execute against the context. Errors become `is_error` results.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError>;
}
