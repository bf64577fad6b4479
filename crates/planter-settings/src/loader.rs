//! Settings loading: defaults → file deep-merge → env overrides.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tracing::debug;

use planter_core::config::ReasoningEffort;

use crate::errors::Result;
use crate::types::Settings;

/// `~/.openplanter/settings.json`.
#[must_use]
pub fn settings_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".openplanter/settings.json"))
}

/// Deep-merge `overlay` onto `base`: objects merge recursively, everything
/// else (including arrays) is replaced wholesale.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// Environment lookup seam: the process env in production, a map in tests
/// (mutating the process env is global and, as of edition 2024, unsafe).
type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_overlay(get: EnvLookup<'_>) -> Map<String, Value> {
    let mut engine = Map::new();
    let mut providers = Map::new();

    let mut set_str = |map: &mut Map<String, Value>, key: &str, var: &str| {
        if let Some(value) = get(var) {
            if !value.is_empty() {
                let _ = map.insert(key.into(), json!(value));
            }
        }
    };

    set_str(&mut engine, "modelName", "PLANTER_MODEL");
    set_str(&mut engine, "executorModel", "PLANTER_EXECUTOR_MODEL");
    set_str(&mut engine, "workspaceRoot", "PLANTER_WORKSPACE");
    set_str(&mut providers, "anthropicApiKey", "PLANTER_ANTHROPIC_API_KEY");
    set_str(&mut providers, "anthropicBaseUrl", "PLANTER_ANTHROPIC_BASE_URL");
    set_str(&mut providers, "openaiApiKey", "PLANTER_OPENAI_API_KEY");
    set_str(&mut providers, "openaiBaseUrl", "PLANTER_OPENAI_BASE_URL");

    if let Some(value) = get("PLANTER_MAX_STEPS") {
        if let Ok(steps) = value.parse::<u64>() {
            let _ = engine.insert("maxSteps".into(), json!(steps));
        }
    }
    if let Some(value) = get("PLANTER_MAX_DEPTH") {
        if let Ok(depth) = value.parse::<u32>() {
            let _ = engine.insert("maxDepth".into(), json!(depth));
        }
    }
    if let Some(value) = get("PLANTER_PARALLEL_DISPATCH") {
        let _ = engine.insert(
            "parallelDispatch".into(),
            json!(value == "1" || value == "true"),
        );
    }
    if let Some(value) = get("PLANTER_DEMO_MODE") {
        let _ = engine.insert("demoMode".into(), json!(value == "1" || value == "true"));
    }
    if let Some(value) = get("PLANTER_REASONING_EFFORT") {
        if serde_json::from_value::<ReasoningEffort>(json!(value)).is_ok() {
            let _ = engine.insert("reasoningEffort".into(), json!(value));
        }
    }

    let mut overlay = Map::new();
    if !engine.is_empty() {
        let _ = overlay.insert("engine".into(), Value::Object(engine));
    }
    if !providers.is_empty() {
        let _ = overlay.insert("providers".into(), Value::Object(providers));
    }
    overlay
}

fn load_layered(path: Option<&Path>, get: EnvLookup<'_>) -> Result<Settings> {
    let defaults = serde_json::to_value(Settings::default())?;
    let file_layer = match path {
        Some(path) if path.is_file() => {
            debug!(?path, "loading settings file");
            serde_json::from_str(&std::fs::read_to_string(path)?)?
        }
        _ => Value::Object(Map::new()),
    };
    let merged = deep_merge(defaults, file_layer);
    let with_env = deep_merge(merged, Value::Object(env_overlay(get)));
    Ok(serde_json::from_value(with_env)?)
}

/// Load settings from an explicit file path (or pure defaults when the file
/// is absent), then apply `PLANTER_*` env overrides.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    load_layered(Some(path), &|var| std::env::var(var).ok())
}

/// Load settings from the default location.
pub fn load_settings() -> Result<Settings> {
    load_layered(settings_path().as_deref(), &|var| std::env::var(var).ok())
}
