//! Persistence seams between the engine and the session layer.
//!
//! The engine emits events and LLM call records through these traits so it
//! never depends on the session crate; `planter-session` supplies the file
//! implementations and the facade wires them together. Sink failures are
//! logged and swallowed: persistence trouble must not kill a solve.

use std::sync::Arc;

use serde_json::Value;

use crate::context::ExternalContext;
use crate::events::EngineEvent;
use crate::ids::CallId;

/// Receives lifecycle events and state snapshots.
pub trait EventSink: Send + Sync {
    /// Record one event (append-only).
    fn record_event(&self, event: &EngineEvent);

    /// Persist the latest external-context snapshot (atomic overwrite).
    fn snapshot_state(&self, context: &ExternalContext);
}

/// Receives LLM call records for exact replay.
///
/// Each solve owns one logger; spawning a child produces a child logger via
/// [`ReplaySink::child`] whose records carry the parent call ID so the
/// conversation tree is reconstructable.
pub trait ReplaySink: Send + Sync {
    /// Record one LLM call: the wire-format request view and the full
    /// response. Returns the assigned call ID.
    fn record_call(&self, request: &Value, response: &Value) -> CallId;

    /// A logger for a child solve spawned from `parent_call_id`.
    fn child(&self, parent_call_id: &CallId) -> Arc<dyn ReplaySink>;
}

/// No-op event sink for tests and sessionless solves.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record_event(&self, _event: &EngineEvent) {}
    fn snapshot_state(&self, _context: &ExternalContext) {}
}
