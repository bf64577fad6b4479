//! Engine configuration.
//!
//! [`EngineConfig`] is assembled once per session (by `planter-settings` or
//! directly in tests) and never mutated during a solve. Every field has a
//! serde default so partial settings files deep-merge cleanly.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Reasoning effort forwarded to providers that support it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Minimal deliberation.
    Low,
    /// Provider default.
    Medium,
    /// Extended deliberation.
    High,
}

impl ReasoningEffort {
    /// Wire string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tool-family timeouts, in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolTimeouts {
    /// `run_shell` foreground timeout.
    pub shell_secs: u64,
    /// `web_search` / `fetch_url` timeout.
    pub web_secs: u64,
    /// Everything else.
    pub default_secs: u64,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            shell_secs: 120,
            web_secs: 30,
            default_secs: 60,
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_owned()
}

fn default_max_steps() -> u64 {
    40
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_observation_chars() -> usize {
    20_000
}

fn default_condensation_threshold() -> f64 {
    0.75
}

fn default_budget_warning_threshold() -> f64 {
    0.50
}

fn default_budget_critical_threshold() -> f64 {
    0.25
}

fn default_true() -> bool {
    true
}

fn default_repetition_limit() -> u32 {
    2
}

fn default_shell_bans() -> BTreeSet<String> {
    ["vim", "vi", "nvim", "emacs", "nano", "less", "more", "top", "htop", "watch", "ssh"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_user_agent() -> String {
    format!("openplanter/{}", env!("CARGO_PKG_VERSION"))
}

/// Immutable per-solve configuration bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Depth-0 model; also fixes the default tier.
    pub model_name: String,
    /// Forwarded to the model abstraction; dropped after one-shot fallback
    /// on providers that reject it.
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Hard bound on the step loop.
    pub max_steps: u64,
    /// Hard bound on sub-agent recursion.
    pub max_depth: u32,
    /// Observation clipping limit.
    pub max_observation_chars: usize,
    /// Overrides the model's reported context window when set.
    pub max_context_tokens: Option<u64>,
    /// Fraction of the window at which condensation triggers.
    pub condensation_threshold: f64,
    /// Remaining-budget fraction below which a warning tag is injected.
    pub budget_warning_threshold: f64,
    /// Remaining-budget fraction below which a critical tag is injected.
    pub budget_critical_threshold: f64,
    /// Include the recursive system-prompt section.
    pub recursive_mode: bool,
    /// Include the acceptance section and enable the judge.
    pub acceptance_criteria_mode: bool,
    /// Include the demo system-prompt section.
    pub demo_mode: bool,
    /// Per-tool-family timeouts.
    pub tool_timeouts: ToolTimeouts,
    /// Program basenames the shell policy rejects.
    pub shell_bans: BTreeSet<String>,
    /// Reject heredoc syntax in shell commands.
    pub shell_heredoc_forbidden: bool,
    /// Max identical shell invocations per depth.
    pub repetition_limit: u32,
    /// Fan sibling sub-agents out on a task pool.
    pub parallel_dispatch: bool,
    /// Filesystem confinement root.
    pub workspace_root: PathBuf,
    /// Explicit lowest-tier model for `execute`; derived from the provider
    /// family when unset.
    pub executor_model: Option<String>,
    /// Override for the web search endpoint.
    pub web_search_base_url: Option<String>,
    /// User-Agent sent by the web tools.
    pub user_agent: String,
    /// Extra environment variables for shell subprocesses.
    pub shell_env: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_name: default_model(),
            reasoning_effort: None,
            max_steps: default_max_steps(),
            max_depth: default_max_depth(),
            max_observation_chars: default_max_observation_chars(),
            max_context_tokens: None,
            condensation_threshold: default_condensation_threshold(),
            budget_warning_threshold: default_budget_warning_threshold(),
            budget_critical_threshold: default_budget_critical_threshold(),
            recursive_mode: default_true(),
            acceptance_criteria_mode: false,
            demo_mode: false,
            tool_timeouts: ToolTimeouts::default(),
            shell_bans: default_shell_bans(),
            shell_heredoc_forbidden: default_true(),
            repetition_limit: default_repetition_limit(),
            parallel_dispatch: default_true(),
            workspace_root: PathBuf::from("."),
            executor_model: None,
            web_search_base_url: None,
            user_agent: default_user_agent(),
            shell_env: BTreeMap::new(),
        }
    }
}
