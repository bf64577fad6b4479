//! End-to-end solve scenarios driven by scripted models over a temp
//! workspace: the happy path, the safety rails, tier routing, and sibling
//! write conflicts.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use planter_core::config::EngineConfig;
use planter_core::context::{ExternalContext, SharedContext, shared};
use planter_core::events::EngineEvent;
use planter_engine::{Engine, EngineBuilder};
use planter_llm::factory::StaticModelFactory;
use planter_llm::scripted::ScriptedModel;
use planter_llm::Model;

const PARENT_MODEL: &str = "claude-sonnet-4-20250514";

fn engine_with(
    workspace: &std::path::Path,
    factory: StaticModelFactory,
) -> Arc<Engine> {
    let config = EngineConfig {
        model_name: PARENT_MODEL.into(),
        workspace_root: workspace.to_path_buf(),
        max_steps: 10,
        ..EngineConfig::default()
    };
    EngineBuilder::new(config, Arc::new(factory))
        .build()
        .expect("engine builds")
}

fn fresh_context() -> SharedContext {
    shared(ExternalContext::new())
}

async fn drain(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<EngineEvent>,
) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── Scenario 1: happy path read/summarize ───────────────────────────────

#[tokio::test]
async fn happy_path_read_and_summarize() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello world").unwrap();

    let parent = ScriptedModel::new(
        PARENT_MODEL,
        vec![
            ScriptedModel::single_call("c1", "read_file", json!({"path": "notes.txt"})),
            ScriptedModel::text_turn("The file says: hello world."),
        ],
    );
    let engine = engine_with(
        dir.path(),
        StaticModelFactory::new().with_model(PARENT_MODEL, Arc::new(parent)),
    );
    let mut rx = engine.emitter().subscribe();

    let final_text = engine
        .solve_with_context(
            "Read notes.txt and tell me what it says.",
            fresh_context(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(final_text, "The file says: hello world.");

    let events = drain(&mut rx).await;
    let types: Vec<&str> = events.iter().map(EngineEvent::event_type).collect();
    assert!(types.contains(&"tool_call"));
    assert!(types.contains(&"tool_result"));
    assert!(types.contains(&"final"));

    let result = events
        .iter()
        .find_map(|e| match e {
            EngineEvent::ToolResult { content, is_error, .. } => Some((content, *is_error)),
            _ => None,
        })
        .unwrap();
    assert!(!result.1);
    assert!(result.0.contains("hello world"));
    // The first result of the step carries the budget tags.
    assert!(result.0.contains("<step 1/10>"));
}

// ── Scenario 2: unread overwrite blocked ────────────────────────────────

#[tokio::test]
async fn unread_overwrite_blocked_then_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.csv"), "a,b\n1,2\n").unwrap();

    let parent = ScriptedModel::new(
        PARENT_MODEL,
        vec![
            ScriptedModel::single_call(
                "c1",
                "write_file",
                json!({"path": "data.csv", "content": "new"}),
            ),
            ScriptedModel::single_call("c2", "read_file", json!({"path": "data.csv"})),
            ScriptedModel::single_call(
                "c3",
                "write_file",
                json!({"path": "data.csv", "content": "new"}),
            ),
            ScriptedModel::text_turn("Rewrote data.csv after reading it."),
        ],
    );
    let engine = engine_with(
        dir.path(),
        StaticModelFactory::new().with_model(PARENT_MODEL, Arc::new(parent)),
    );
    let mut rx = engine.emitter().subscribe();

    let final_text = engine
        .solve_with_context("Replace data.csv.", fresh_context(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(final_text, "Rewrote data.csv after reading it.");

    let events = drain(&mut rx).await;
    let errors: Vec<&String> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::ToolResult { content, is_error: true, .. } => Some(content),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("unread_overwrite"));
    // The retry after reading succeeded.
    assert_eq!(
        std::fs::read_to_string(dir.path().join("data.csv")).unwrap(),
        "new"
    );
}

// ── Scenario 3: shell policy rejects heredocs before execution ──────────

#[tokio::test]
async fn heredoc_rejected_before_subprocess() {
    let dir = tempfile::tempdir().unwrap();
    let parent = ScriptedModel::new(
        PARENT_MODEL,
        vec![
            ScriptedModel::single_call(
                "c1",
                "run_shell",
                json!({"command": "cat <<EOF > x.txt\nhacked\nEOF"}),
            ),
            ScriptedModel::text_turn("done"),
        ],
    );
    let engine = engine_with(
        dir.path(),
        StaticModelFactory::new().with_model(PARENT_MODEL, Arc::new(parent)),
    );
    let mut rx = engine.emitter().subscribe();

    let _ = engine
        .solve_with_context("Write a file.", fresh_context(), CancellationToken::new())
        .await
        .unwrap();

    let events = drain(&mut rx).await;
    let error = events
        .iter()
        .find_map(|e| match e {
            EngineEvent::ToolResult { content, is_error: true, .. } => Some(content),
            _ => None,
        })
        .unwrap();
    assert!(error.contains("shell_policy"));
    // The subprocess never ran.
    assert!(!dir.path().join("x.txt").exists());
}

// ── Scenario 4: rate-limit countdowns surface as events ─────────────────

/// A model that reports two retry countdowns before answering, as the HTTP
/// providers do during 429 backoff.
#[derive(Debug)]
struct RateLimitingModel {
    inner: ScriptedModel,
}

#[async_trait::async_trait]
impl Model for RateLimitingModel {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn context_window(&self) -> u64 {
        self.inner.context_window()
    }
    fn create_conversation(
        &self,
        system_prompt: &str,
        tools: &[planter_core::schema::ToolSchema],
    ) -> planter_llm::Conversation {
        self.inner.create_conversation(system_prompt, tools)
    }
    fn append_user(
        &self,
        conversation: &mut planter_llm::Conversation,
        text: &str,
    ) -> Result<(), planter_llm::ModelError> {
        self.inner.append_user(conversation, text)
    }
    async fn complete(
        &self,
        conversation: &planter_llm::Conversation,
        hooks: &planter_llm::CompletionHooks,
    ) -> Result<planter_core::messages::ModelTurn, planter_llm::ModelError> {
        hooks.retry("rate limited, retrying in 2s");
        hooks.retry("rate limited, retrying in 1s");
        self.inner.complete(conversation, hooks).await
    }
    fn append_assistant_turn(
        &self,
        conversation: &mut planter_llm::Conversation,
        turn: &planter_core::messages::ModelTurn,
    ) -> Result<(), planter_llm::ModelError> {
        self.inner.append_assistant_turn(conversation, turn)
    }
    fn append_tool_results(
        &self,
        conversation: &mut planter_llm::Conversation,
        results: &[planter_core::messages::ToolResult],
    ) -> Result<(), planter_llm::ModelError> {
        self.inner.append_tool_results(conversation, results)
    }
    fn condense(&self, conversation: &mut planter_llm::Conversation) -> usize {
        self.inner.condense(conversation)
    }
    fn snapshot(&self, conversation: &planter_llm::Conversation) -> serde_json::Value {
        self.inner.snapshot(conversation)
    }
}

#[tokio::test]
async fn rate_limit_countdowns_become_events() {
    let dir = tempfile::tempdir().unwrap();
    let model = RateLimitingModel {
        inner: ScriptedModel::new(PARENT_MODEL, vec![ScriptedModel::text_turn("recovered")]),
    };
    let engine = engine_with(
        dir.path(),
        StaticModelFactory::new().with_model(PARENT_MODEL, Arc::new(model)),
    );
    let mut rx = engine.emitter().subscribe();

    let final_text = engine
        .solve_with_context("Anything.", fresh_context(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(final_text, "recovered");

    let events = drain(&mut rx).await;
    let countdowns: Vec<&String> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::RateLimit { message, .. } => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(countdowns.len(), 2);
    assert!(countdowns[0].contains("2s"));
    assert!(countdowns[1].contains("1s"));
}

// ── Scenario 5: tier enforcement ────────────────────────────────────────

#[tokio::test]
async fn subtask_cannot_delegate_up() {
    let dir = tempfile::tempdir().unwrap();
    let child = ScriptedModel::new(
        "claude-3-5-haiku-20241022",
        vec![ScriptedModel::text_turn("child finished the lookup")],
    );
    let parent = ScriptedModel::new(
        PARENT_MODEL,
        vec![
            // Tier 1 from a tier-2 parent: rejected without spawning.
            ScriptedModel::single_call(
                "c1",
                "subtask",
                json!({"objective": "dig deeper", "model": "claude-opus-4-20250514"}),
            ),
            // Tier 3 is fine.
            ScriptedModel::single_call(
                "c2",
                "subtask",
                json!({"objective": "dig deeper", "model": "claude-3-5-haiku-20241022"}),
            ),
            ScriptedModel::text_turn("done"),
        ],
    );
    let engine = engine_with(
        dir.path(),
        StaticModelFactory::new()
            .with_model(PARENT_MODEL, Arc::new(parent))
            .with_model("claude-3-5-haiku-20241022", Arc::new(child)),
    );
    let mut rx = engine.emitter().subscribe();

    let final_text = engine
        .solve_with_context("Delegate.", fresh_context(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(final_text, "done");

    let events = drain(&mut rx).await;
    let spawns = events
        .iter()
        .filter(|e| e.event_type() == "sub_spawn")
        .count();
    assert_eq!(spawns, 1, "the upward delegation must not spawn");

    let tier_error = events
        .iter()
        .find_map(|e| match e {
            EngineEvent::ToolResult { content, is_error: true, .. } => Some(content),
            _ => None,
        })
        .unwrap();
    assert!(tier_error.contains("cannot delegate up"));

    let sub_return = events
        .iter()
        .find_map(|e| match e {
            EngineEvent::SubReturn { summary, .. } => Some(summary),
            _ => None,
        })
        .unwrap();
    assert!(sub_return.contains("child finished the lookup"));
}

// ── Scenario 6: parallel write conflict ─────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sibling_writers_conflict_on_same_path() {
    let dir = tempfile::tempdir().unwrap();
    let worker = |id: &str, content: &str| {
        ScriptedModel::new(
            id,
            vec![
                ScriptedModel::single_call(
                    "w1",
                    "write_file",
                    json!({"path": "out.txt", "content": content}),
                ),
                ScriptedModel::text_turn("wrote out.txt"),
            ],
        )
    };
    let parent = ScriptedModel::new(
        PARENT_MODEL,
        vec![
            planter_llm::scripted::ScriptedModel::tool_turn(vec![
                planter_core::messages::ToolCall::new(
                    "s1",
                    "subtask",
                    json!({"objective": "write the report", "model": "worker-a"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                ),
                planter_core::messages::ToolCall::new(
                    "s2",
                    "subtask",
                    json!({"objective": "write the report", "model": "worker-b"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                ),
            ]),
            ScriptedModel::text_turn("both workers returned"),
        ],
    );
    let engine = engine_with(
        dir.path(),
        StaticModelFactory::new()
            .with_model(PARENT_MODEL, Arc::new(parent))
            .with_model("worker-a", Arc::new(worker("worker-a", "from-a")))
            .with_model("worker-b", Arc::new(worker("worker-b", "from-b"))),
    );
    let mut rx = engine.emitter().subscribe();

    let final_text = engine
        .solve_with_context("Fan out.", fresh_context(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(final_text, "both workers returned");

    // Exactly one write landed.
    let content = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
    assert!(content == "from-a" || content == "from-b");

    let events = drain(&mut rx).await;
    let conflicts = events
        .iter()
        .filter(|e| match e {
            EngineEvent::ToolResult { content, is_error: true, .. } => {
                content.contains("write_conflict")
            }
            _ => false,
        })
        .count();
    assert_eq!(conflicts, 1, "exactly one sibling write must fail");

    let returns = events
        .iter()
        .filter(|e| e.event_type() == "sub_return")
        .count();
    assert_eq!(returns, 2);
}

// ── Depth bound ─────────────────────────────────────────────────────────

#[tokio::test]
async fn max_depth_rejects_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        model_name: PARENT_MODEL.into(),
        workspace_root: dir.path().to_path_buf(),
        max_depth: 0,
        max_steps: 5,
        ..EngineConfig::default()
    };
    let parent = ScriptedModel::new(
        PARENT_MODEL,
        vec![
            ScriptedModel::single_call(
                "c1",
                "subtask",
                json!({"objective": "go deeper", "model": "claude-3-5-haiku-20241022"}),
            ),
            ScriptedModel::text_turn("stayed shallow"),
        ],
    );
    let engine = EngineBuilder::new(
        config,
        Arc::new(StaticModelFactory::new().with_model(PARENT_MODEL, Arc::new(parent))),
    )
    .build()
    .unwrap();
    let mut rx = engine.emitter().subscribe();

    let final_text = engine
        .solve_with_context("Try.", fresh_context(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(final_text, "stayed shallow");

    let events = drain(&mut rx).await;
    let error = events
        .iter()
        .find_map(|e| match e {
            EngineEvent::ToolResult { content, is_error: true, .. } => Some(content),
            _ => None,
        })
        .unwrap();
    assert!(error.contains("max_depth"));
}

// ── Step budget epilogue ────────────────────────────────────────────────

#[tokio::test]
async fn step_budget_forces_final_answer() {
    let dir = tempfile::tempdir().unwrap();
    // Two steps of thinking, then the forced epilogue answer.
    let parent = ScriptedModel::new(
        PARENT_MODEL,
        vec![
            ScriptedModel::single_call("c1", "think", json!({"text": "step one"})),
            ScriptedModel::single_call("c2", "think", json!({"text": "step two"})),
            ScriptedModel::text_turn("best effort answer"),
        ],
    );
    let config = EngineConfig {
        model_name: PARENT_MODEL.into(),
        workspace_root: dir.path().to_path_buf(),
        max_steps: 2,
        ..EngineConfig::default()
    };
    let engine = EngineBuilder::new(
        config,
        Arc::new(StaticModelFactory::new().with_model(PARENT_MODEL, Arc::new(parent))),
    )
    .build()
    .unwrap();

    let final_text = engine
        .solve_with_context("Ponder.", fresh_context(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(final_text, "best effort answer");
}

// ── Finish tool ─────────────────────────────────────────────────────────

#[tokio::test]
async fn finish_tool_ends_turn_with_answer() {
    let dir = tempfile::tempdir().unwrap();
    let parent = ScriptedModel::new(
        PARENT_MODEL,
        vec![ScriptedModel::single_call(
            "c1",
            "finish",
            json!({"text": "The answer is 4."}),
        )],
    );
    let engine = engine_with(
        dir.path(),
        StaticModelFactory::new().with_model(PARENT_MODEL, Arc::new(parent)),
    );

    let final_text = engine
        .solve_with_context("What is 2+2?", fresh_context(), CancellationToken::new())
        .await
        .unwrap();
    assert!(final_text.contains("The answer is 4."));
}
