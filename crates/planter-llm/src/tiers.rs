//! Model capability tiers and the static model registry.
//!
//! A tier is an ordinal capability/cost class: 1 = most capable and most
//! expensive, 3 = cheapest leaf executor. The mapping is a pure function of
//! the model name so tier routing never needs a network call.
//!
//! Mapping, checked in order:
//!
//! 1. Exact registry hit → the registry tier.
//! 2. Name contains `opus`, or a `gpt-5` family name without `mini`, or
//!    ends in `-max` → tier 1.
//! 3. Name contains `haiku`, `mini`, `flash`, `spark`, or `nano` → tier 3.
//! 4. Everything else (including `sonnet` and the `gpt-4` family) → tier 2.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Ordinal capability tier, 1..=3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelTier(pub u8);

impl ModelTier {
    /// The most capable tier.
    pub const TOP: Self = Self(1);
    /// The cheapest leaf-executor tier.
    pub const LEAF: Self = Self(3);

    /// Whether a child at `self` may be spawned from a parent at `parent`.
    ///
    /// Delegating up (to a more capable, more expensive tier) is forbidden.
    #[must_use]
    pub fn spawnable_from(self, parent: Self) -> bool {
        self.0 >= parent.0
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

/// Static registry info for a known model.
#[derive(Clone, Copy, Debug)]
pub struct ModelInfo {
    /// Context window in tokens.
    pub context_window: u64,
    /// Capability tier.
    pub tier: ModelTier,
}

/// Known models with pinned windows and tiers.
static MODEL_REGISTRY: LazyLock<HashMap<&'static str, ModelInfo>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    let mut add = |name: &'static str, window: u64, tier: u8| {
        let _ = m.insert(
            name,
            ModelInfo {
                context_window: window,
                tier: ModelTier(tier),
            },
        );
    };

    add("claude-opus-4-20250514", 200_000, 1);
    add("claude-sonnet-4-20250514", 200_000, 2);
    add("claude-3-7-sonnet-20250219", 200_000, 2);
    add("claude-3-5-haiku-20241022", 200_000, 3);
    add("gpt-5", 400_000, 1);
    add("gpt-5-mini", 400_000, 3);
    add("gpt-4.1", 1_000_000, 2);
    add("gpt-4.1-mini", 1_000_000, 3);
    add("gpt-4o", 128_000, 2);
    add("gpt-4o-mini", 128_000, 3);

    m
});

/// Look up registry info for a model name.
#[must_use]
pub fn model_info(name: &str) -> Option<ModelInfo> {
    MODEL_REGISTRY.get(name).copied()
}

/// Pure model-name → tier function.
#[must_use]
pub fn model_tier(name: &str) -> ModelTier {
    if let Some(info) = model_info(name) {
        return info.tier;
    }
    let lower = name.to_lowercase();
    if ["haiku", "mini", "flash", "spark", "nano"]
        .iter()
        .any(|t| lower.contains(t))
    {
        return ModelTier::LEAF;
    }
    if lower.contains("opus") || lower.starts_with("gpt-5") || lower.ends_with("-max") {
        return ModelTier::TOP;
    }
    ModelTier(2)
}

/// Default context window for an unregistered model name.
#[must_use]
pub fn default_context_window(name: &str) -> u64 {
    if let Some(info) = model_info(name) {
        return info.context_window;
    }
    if name.to_lowercase().starts_with("claude") {
        200_000
    } else {
        128_000
    }
}

/// The lowest-tier model in the same provider family as `name`.
///
/// `execute` resolves through this when no explicit executor model is
/// configured.
#[must_use]
pub fn default_executor_model(name: &str) -> String {
    if name.to_lowercase().starts_with("claude") {
        "claude-3-5-haiku-20241022".to_owned()
    } else {
        "gpt-4o-mini".to_owned()
    }
}
