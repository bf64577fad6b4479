//! Append-only event log and the engine-facing sink.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use planter_core::context::ExternalContext;
use planter_core::events::EngineEvent;
use planter_core::sinks::EventSink;

use crate::errors::SessionError;
use crate::store::Session;

/// Append-only writer over `events.jsonl`.
///
/// One JSON object per line, `\n`-terminated, flushed per event so a crash
/// never loses acknowledged lines.
pub struct EventWriter {
    file: Mutex<File>,
}

impl EventWriter {
    /// Open (or create) the log at `path` in append mode.
    pub fn open(path: &Path) -> Result<Self, SessionError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append one event record.
    pub fn append(&self, event: &EngineEvent) -> Result<(), SessionError> {
        let line = serde_json::to_string(&event.to_record())?;
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }
}

/// The [`EventSink`] the engine writes through: events to `events.jsonl`,
/// state snapshots to `state.json`. Persistence failures are logged and
/// swallowed: they must not kill a solve.
pub struct SessionSink {
    session: Arc<Session>,
    events: EventWriter,
}

impl SessionSink {
    /// Build a sink over a session.
    pub fn new(session: Arc<Session>) -> Result<Self, SessionError> {
        let events = EventWriter::open(&session.dir().join("events.jsonl"))?;
        Ok(Self { session, events })
    }

    /// The underlying session.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl EventSink for SessionSink {
    fn record_event(&self, event: &EngineEvent) {
        if let Err(error) = self.events.append(event) {
            warn!(%error, "failed to append event");
        }
    }

    fn snapshot_state(&self, context: &ExternalContext) {
        if let Err(error) = self.session.snapshot_state(context) {
            warn!(%error, "failed to snapshot state");
        }
    }
}

/// Read all event records back (for assertions and inspection).
pub fn read_event_records(path: &Path) -> Result<Vec<serde_json::Value>, SessionError> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    std::fs::read_to_string(path)?
        .lines()
        .map(|line| serde_json::from_str(line).map_err(SessionError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use planter_core::events::BaseEvent;
    use crate::store::SessionStore;

    fn event(step: u64) -> EngineEvent {
        EngineEvent::StepStart {
            base: BaseEvent::now(0, step),
        }
    }

    #[test]
    fn log_is_append_only_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let writer = EventWriter::open(&path).unwrap();
        writer.append(&event(1)).unwrap();
        writer.append(&event(2)).unwrap();
        drop(writer);

        // Reopening must keep the existing prefix.
        let writer = EventWriter::open(&path).unwrap();
        writer.append(&event(3)).unwrap();

        let records = read_event_records(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["step"], 1);
        assert_eq!(records[2]["step"], 3);
    }

    #[test]
    fn records_have_outer_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let writer = EventWriter::open(&path).unwrap();
        writer
            .append(&EngineEvent::Final {
                base: BaseEvent::now(2, 9),
                text: "answer".into(),
            })
            .unwrap();
        let records = read_event_records(&path).unwrap();
        assert_eq!(records[0]["type"], "final");
        assert_eq!(records[0]["depth"], 2);
        assert_eq!(records[0]["step"], 9);
        assert_eq!(records[0]["payload"]["text"], "answer");
    }

    #[test]
    fn sink_writes_events_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(SessionStore::new(dir.path()).create().unwrap());
        let sink = SessionSink::new(Arc::clone(&session)).unwrap();

        sink.record_event(&event(1));
        sink.snapshot_state(&ExternalContext::new());

        let records = read_event_records(&session.dir().join("events.jsonl")).unwrap();
        assert_eq!(records.len(), 1);
        assert!(session.load_state().unwrap().is_some());
    }
}
