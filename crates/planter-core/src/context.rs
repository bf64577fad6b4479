//! Session-spanning observation accumulator.
//!
//! [`ExternalContext`] outlives individual solves: sub-agents append into
//! the same accumulator (through the shared mutex) and the session layer
//! snapshots it to `state.json`. It is reset only when a session is created.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Recursion depth at which the observation was made.
    pub depth: u32,
    /// Per-solve step number.
    pub step: u64,
    /// Short source tag (`tool`, `think`, `sub_return`, ...).
    pub tag: String,
    /// Observation text.
    pub content: String,
}

/// Mutable accumulator shared across all solves in a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalContext {
    /// Ordered observations.
    pub observations: Vec<Observation>,
    /// Monotonic step counter across the whole session.
    pub step_counter: u64,
    /// Session start time.
    pub start_time: DateTime<Utc>,
}

impl ExternalContext {
    /// Fresh context, stamped now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observations: Vec::new(),
            step_counter: 0,
            start_time: Utc::now(),
        }
    }

    /// Append an observation.
    pub fn record(&mut self, depth: u32, step: u64, tag: impl Into<String>, content: impl Into<String>) {
        self.observations.push(Observation {
            depth,
            step,
            tag: tag.into(),
            content: content.into(),
        });
    }

    /// Advance and return the session-wide step counter.
    pub fn next_step(&mut self) -> u64 {
        self.step_counter += 1;
        self.step_counter
    }

    /// Seconds elapsed since the session started.
    #[must_use]
    pub fn elapsed_secs(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}

impl Default for ExternalContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The sharing handle used by the engine and session layers.
pub type SharedContext = Arc<parking_lot::Mutex<ExternalContext>>;

/// Wrap a context for sharing.
#[must_use]
pub fn shared(context: ExternalContext) -> SharedContext {
    Arc::new(parking_lot::Mutex::new(context))
}
