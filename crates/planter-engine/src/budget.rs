//! Budget tags and threshold warnings.
//!
//! Tags are information shaping, not control flow: they prefix the first
//! tool result of each step so the model can see wall-clock time, step
//! budget, and context pressure at a glance.

use planter_core::config::EngineConfig;

/// Warning level crossed by the current budget state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BudgetLevel {
    /// Plenty of budget left.
    Ok,
    /// Below the warning threshold.
    Warning,
    /// Below the critical threshold.
    Critical,
}

impl BudgetLevel {
    /// Event label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// The budget tag block and the level it reflects.
#[derive(Clone, Debug)]
pub struct BudgetTags {
    /// Tag text to prefix onto the first tool result of the step.
    pub text: String,
    /// Crossed level.
    pub level: BudgetLevel,
}

/// Build budget tags for one step.
///
/// `context_used` is the fraction of the context window the last completion
/// consumed. The governing remainder is the smaller of the step and context
/// remainders.
#[must_use]
pub fn budget_tags(config: &EngineConfig, step: u64, context_used: f64) -> BudgetTags {
    let step_remaining = 1.0 - (step as f64 / config.max_steps.max(1) as f64);
    let context_remaining = (1.0 - context_used).max(0.0);
    let remaining = step_remaining.min(context_remaining);

    let level = if remaining < config.budget_critical_threshold {
        BudgetLevel::Critical
    } else if remaining < config.budget_warning_threshold {
        BudgetLevel::Warning
    } else {
        BudgetLevel::Ok
    };

    let mut text = format!(
        "<ts>{}</ts> <step {}/{}> <context {:.0}% used>",
        chrono::Utc::now().to_rfc3339(),
        step,
        config.max_steps,
        context_used * 100.0
    );
    match level {
        BudgetLevel::Ok => {}
        BudgetLevel::Warning => {
            text.push_str("\n[budget warning: over half the budget is spent; prioritize]");
        }
        BudgetLevel::Critical => {
            text.push_str("\n[budget critical: produce your best final answer now]");
        }
    }

    BudgetTags { text, level }
}
