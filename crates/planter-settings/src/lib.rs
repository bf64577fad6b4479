//! # planter-settings
//!
//! Layered configuration for the OpenPlanter engine.
//!
//! Settings load from three layers (in priority order):
//! 1. **Compiled defaults**: [`Settings::default()`]
//! 2. **User file**: `~/.openplanter/settings.json` (deep-merged over
//!    defaults)
//! 3. **Environment variables**: `PLANTER_*` overrides (highest priority)
//!
//! The result is an immutable [`Settings`] bundle: the
//! [`planter_core::config::EngineConfig`] plus provider credentials. There
//! is no global singleton: the configuration is constructed once per
//! session and handed to the engine.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::SettingsError;
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{ProviderSettings, Settings};
