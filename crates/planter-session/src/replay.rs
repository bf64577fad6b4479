//! Delta-encoded replay log and the replay driver.
//!
//! Each LLM call is recorded as `{call_id, parent_call_id, seq,
//! request_delta, response}` where `request_delta` stores the longest common
//! prefix length against the previous call *from the same logger* plus the
//! appended suffix: conversations only grow, so deltas stay small. Child
//! solves log through child loggers carrying `parent_call_id`, which makes
//! the conversation tree reconstructable from the flat file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use planter_core::ids::CallId;
use planter_core::messages::ModelTurn;
use planter_core::sinks::ReplaySink;
use planter_llm::scripted::ScriptedModel;

use crate::errors::SessionError;

/// One replay record, as persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRecord {
    /// This call's ID.
    pub call_id: String,
    /// The parent solve's triggering call, when spawned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_call_id: Option<String>,
    /// Global emission order across the whole session.
    pub seq: u64,
    /// Request delta against this logger's previous call.
    pub request_delta: RequestDelta,
    /// Full recorded response.
    pub response: Value,
}

/// Delta encoding of a request's message list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDelta {
    /// Length of the common prefix with the previous request.
    pub prefix: usize,
    /// Messages appended after that prefix.
    pub append: Vec<Value>,
}

/// Pull the message list out of a provider snapshot.
///
/// OpenAI snapshots are a bare array; Anthropic snapshots wrap theirs in
/// `{system, messages}`. Anything else is treated as a single opaque entry.
fn message_list(request: &Value) -> Vec<Value> {
    if let Some(array) = request.as_array() {
        return array.clone();
    }
    if let Some(array) = request.get("messages").and_then(Value::as_array) {
        return array.clone();
    }
    vec![request.clone()]
}

fn common_prefix_len(previous: &[Value], current: &[Value]) -> usize {
    previous
        .iter()
        .zip(current)
        .take_while(|(a, b)| a == b)
        .count()
}

/// Append-only replay logger. Cloning via [`ReplaySink::child`] shares the
/// file and sequence counter but tracks its own previous request.
pub struct ReplayLogger {
    file: Arc<Mutex<File>>,
    seq: Arc<AtomicU64>,
    parent_call_id: Option<CallId>,
    last_request: Mutex<Vec<Value>>,
}

impl ReplayLogger {
    /// Open (or append to) `replay.jsonl` at `path`.
    pub fn open(path: &Path) -> Result<Arc<Self>, SessionError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Arc::new(Self {
            file: Arc::new(Mutex::new(file)),
            seq: Arc::new(AtomicU64::new(0)),
            parent_call_id: None,
            last_request: Mutex::new(Vec::new()),
        }))
    }

    fn write_record(&self, record: &ReplayRecord) {
        match serde_json::to_string(record) {
            Ok(line) => {
                let mut file = self.file.lock();
                if let Err(error) = file
                    .write_all(line.as_bytes())
                    .and_then(|()| file.write_all(b"\n"))
                    .and_then(|()| file.flush())
                {
                    warn!(%error, "failed to append replay record");
                }
            }
            Err(error) => warn!(%error, "failed to serialize replay record"),
        }
    }
}

impl ReplaySink for ReplayLogger {
    fn record_call(&self, request: &Value, response: &Value) -> CallId {
        let call_id = CallId::generate();
        let messages = message_list(request);
        let mut last = self.last_request.lock();
        let prefix = common_prefix_len(&last, &messages);
        let record = ReplayRecord {
            call_id: call_id.as_str().to_owned(),
            parent_call_id: self.parent_call_id.as_ref().map(|id| id.as_str().to_owned()),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            request_delta: RequestDelta {
                prefix,
                append: messages[prefix..].to_vec(),
            },
            response: response.clone(),
        };
        *last = messages;
        drop(last);
        self.write_record(&record);
        call_id
    }

    fn child(&self, parent_call_id: &CallId) -> Arc<dyn ReplaySink> {
        Arc::new(Self {
            file: Arc::clone(&self.file),
            seq: Arc::clone(&self.seq),
            parent_call_id: Some(parent_call_id.clone()),
            last_request: Mutex::new(Vec::new()),
        })
    }
}

/// Reads a replay log and rebuilds models/requests from it.
pub struct ReplayDriver;

impl ReplayDriver {
    /// Load all records, ordered by `seq`.
    pub fn load(path: &Path) -> Result<Vec<ReplayRecord>, SessionError> {
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let mut records: Vec<ReplayRecord> = std::fs::read_to_string(path)?
            .lines()
            .map(|line| serde_json::from_str(line).map_err(SessionError::from))
            .collect::<Result<_, _>>()?;
        records.sort_by_key(|r| r.seq);
        Ok(records)
    }

    /// Reconstruct the full request message lists of one logger's records
    /// (same `parent_call_id`), applying prefixes against the previous call.
    #[must_use]
    pub fn reconstruct_requests(records: &[ReplayRecord]) -> Vec<Vec<Value>> {
        let mut previous: Vec<Value> = Vec::new();
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let mut full: Vec<Value> = previous[..record.request_delta.prefix.min(previous.len())]
                .to_vec();
            full.extend(record.request_delta.append.iter().cloned());
            previous.clone_from(&full);
            out.push(full);
        }
        out
    }

    /// Build a scripted model that replays the recorded responses in order.
    pub fn scripted_model(
        records: &[ReplayRecord],
        name: &str,
    ) -> Result<ScriptedModel, SessionError> {
        let turns: Vec<ModelTurn> = records
            .iter()
            .map(|r| serde_json::from_value(r.response.clone()).map_err(SessionError::from))
            .collect::<Result<_, _>>()?;
        Ok(ScriptedModel::new(name, turns))
    }
}
