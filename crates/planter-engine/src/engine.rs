//! The recursive step engine.
//!
//! One [`Engine`] serves a session: it owns the tool catalog, the model
//! cache, the background job table, and the event fan-out. Each call to
//! [`Engine::solve_with_context`] runs one solve; `subtask`/`execute` tool
//! calls recurse into child solves sharing the same external context.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use planter_core::config::{EngineConfig, ReasoningEffort};
use planter_core::context::SharedContext;
use planter_core::events::{BaseEvent, EngineEvent};
use planter_core::ids::CallId;
use planter_core::messages::{ModelTurn, ToolCall, ToolResult};
use planter_core::sinks::{EventSink, ReplaySink};
use planter_core::text::clip_observation;
use planter_llm::factory::ModelFactory;
use planter_llm::tiers::{default_executor_model, model_tier};
use planter_llm::{CompletionHooks, Conversation, Model, ModelError};
use planter_tools::shell::JobTable;
use planter_tools::traits::PlanSlot;
use planter_tools::workspace::{ReadSet, Workspace, WriteGuard};
use planter_tools::{SpawnKind, ToolContext, ToolError, ToolRegistry, standard_registry};

use crate::budget::{BudgetLevel, budget_tags};
use crate::dispatch::{DispatchResult, execute_tool_call};
use crate::emitter::EventEmitter;
use crate::errors::EngineError;
use crate::policy::{RepetitionTracker, check_shell_command};
use crate::prompt::{PromptPack, assemble};

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    factory: Arc<dyn ModelFactory>,
    registry: Option<ToolRegistry>,
    prompt_pack: PromptPack,
    event_sink: Option<Arc<dyn EventSink>>,
    replay_sink: Option<Arc<dyn ReplaySink>>,
}

impl EngineBuilder {
    /// Start a builder.
    #[must_use]
    pub fn new(config: EngineConfig, factory: Arc<dyn ModelFactory>) -> Self {
        Self {
            config,
            factory,
            registry: None,
            prompt_pack: PromptPack::default(),
            event_sink: None,
            replay_sink: None,
        }
    }

    /// Replace the standard tool catalog.
    #[must_use]
    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the prompt sections.
    #[must_use]
    pub fn prompt_pack(mut self, pack: PromptPack) -> Self {
        self.prompt_pack = pack;
        self
    }

    /// Attach a persistence sink for events and state snapshots.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Attach a replay logger for LLM calls.
    #[must_use]
    pub fn replay_sink(mut self, sink: Arc<dyn ReplaySink>) -> Self {
        self.replay_sink = Some(sink);
        self
    }

    /// Build the engine. Fails when the workspace root cannot be opened.
    pub fn build(self) -> Result<Arc<Engine>, EngineError> {
        let workspace =
            Workspace::open(&self.config.workspace_root).map_err(|e| EngineError::Setup {
                message: e.to_string(),
            })?;
        Ok(Arc::new(Engine {
            config: Arc::new(self.config),
            factory: self.factory,
            registry: Arc::new(self.registry.unwrap_or_else(standard_registry)),
            workspace: Arc::new(workspace),
            jobs: Arc::new(JobTable::new()),
            plans: Arc::new(PlanSlot::new()),
            emitter: Arc::new(EventEmitter::new()),
            event_sink: self.event_sink,
            replay_sink: self.replay_sink,
            prompt_pack: self.prompt_pack,
            model_cache: Mutex::new(HashMap::new()),
        }))
    }
}

/// One per session. Cheap to share; all mutable state is interior.
pub struct Engine {
    config: Arc<EngineConfig>,
    factory: Arc<dyn ModelFactory>,
    registry: Arc<ToolRegistry>,
    workspace: Arc<Workspace>,
    jobs: Arc<JobTable>,
    plans: Arc<PlanSlot>,
    emitter: Arc<EventEmitter>,
    event_sink: Option<Arc<dyn EventSink>>,
    replay_sink: Option<Arc<dyn ReplaySink>>,
    prompt_pack: PromptPack,
    /// Instances cached by `(model_name, reasoning_effort)`.
    model_cache: Mutex<HashMap<(String, Option<ReasoningEffort>), Arc<dyn Model>>>,
}

/// Everything one recursive solve owns.
struct SolveFrame {
    depth: u32,
    model: Arc<dyn Model>,
    objective: String,
    context: SharedContext,
    cancel: CancellationToken,
    replay: Option<Arc<dyn ReplaySink>>,
    /// Conflict guard shared with siblings spawned in the same parent step.
    write_guard: Arc<WriteGuard>,
}

/// A resolved spawn, ready to run.
struct SpawnPrep {
    call_id: String,
    kind: SpawnKind,
    acceptance: Option<String>,
    frame: SolveFrame,
}

impl Engine {
    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The event fan-out (subscribe for live UI updates).
    #[must_use]
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    /// The plan slot (sessions preload the newest persisted plan here).
    #[must_use]
    pub fn plans(&self) -> &Arc<PlanSlot> {
        &self.plans
    }

    /// The tool catalog.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.event_sink {
            sink.record_event(&event);
        }
        let _ = self.emitter.emit(event);
    }

    fn persist(&self, context: &SharedContext) {
        if let Some(sink) = &self.event_sink {
            sink.snapshot_state(&context.lock());
        }
    }

    /// Build (or fetch from cache) a model instance.
    fn model(
        &self,
        name: &str,
        effort: Option<ReasoningEffort>,
    ) -> Result<Arc<dyn Model>, ModelError> {
        let key = (name.to_owned(), effort);
        if let Some(model) = self.model_cache.lock().get(&key) {
            return Ok(Arc::clone(model));
        }
        let model = self.factory.build(name, effort)?;
        let _ = self.model_cache.lock().insert(key, Arc::clone(&model));
        Ok(model)
    }

    fn timeout_for(&self, tool_name: &str) -> Duration {
        let secs = match tool_name {
            "run_shell" => self.config.tool_timeouts.shell_secs,
            "web_search" | "fetch_url" => self.config.tool_timeouts.web_secs,
            _ => self.config.tool_timeouts.default_secs,
        };
        Duration::from_secs(secs)
    }

    fn context_window(&self, model: &Arc<dyn Model>) -> u64 {
        self.config
            .max_context_tokens
            .unwrap_or_else(|| model.context_window())
    }

    /// Run one solve against the shared external context.
    ///
    /// The newest captured plan (if any) is appended to the objective before
    /// the first completion.
    #[instrument(skip_all, fields(objective_len = objective.len()))]
    pub async fn solve_with_context(
        self: &Arc<Self>,
        objective: &str,
        context: SharedContext,
        cancel: CancellationToken,
    ) -> Result<String, EngineError> {
        let model = self
            .model(&self.config.model_name, self.config.reasoning_effort)
            .map_err(EngineError::Model)?;

        let mut objective_text = objective.to_owned();
        if let Some(plan) = self.plans.latest() {
            objective_text.push_str("\n\nCurrent investigation plan:\n");
            objective_text.push_str(&plan);
        }

        let frame = SolveFrame {
            depth: 0,
            model,
            objective: objective_text,
            context,
            cancel,
            replay: self.replay_sink.clone(),
            write_guard: Arc::new(WriteGuard::new()),
        };
        Arc::clone(self).run_solve(frame).await
    }

    /// Boxed recursion point: child solves re-enter here.
    fn run_solve(
        self: Arc<Self>,
        frame: SolveFrame,
    ) -> futures::future::BoxFuture<'static, Result<String, EngineError>> {
        Box::pin(async move { self.solve_inner(frame).await })
    }

    #[allow(clippy::too_many_lines)]
    async fn solve_inner(self: Arc<Self>, frame: SolveFrame) -> Result<String, EngineError> {
        let depth = frame.depth;
        let context = Arc::clone(&frame.context);
        let model = Arc::clone(&frame.model);
        let window = self.context_window(&model);

        self.emit(EngineEvent::Objective {
            base: BaseEvent::now(depth, 0),
            objective: frame.objective.clone(),
        });
        info!(depth, model = model.name(), "solve started");

        // Per-solve state.
        let read_set = Arc::new(ReadSet::new());
        let claimant = format!("solve-{}", uuid::Uuid::now_v7());
        let mut repetitions = RepetitionTracker::new();
        let mut overflow_condensed = false;
        let mut last_call_id: Option<CallId> = None;
        let step_cell = Arc::new(AtomicU64::new(0));

        let hooks = self.build_hooks(depth, &step_cell);

        let mut conversation =
            model.create_conversation(&assemble(&self.prompt_pack, &self.config), &self.registry.schemas());
        model
            .append_user(&mut conversation, &frame.objective)
            .map_err(EngineError::Model)?;

        let mut step: u64 = 0;
        loop {
            step += 1;
            if step > self.config.max_steps {
                return self
                    .step_budget_epilogue(&frame, &model, &mut conversation, &hooks, step)
                    .await;
            }
            step_cell.store(step, Ordering::Relaxed);
            let _ = context.lock().next_step();
            self.emit(EngineEvent::StepStart {
                base: BaseEvent::now(depth, step),
            });

            let turn = match self
                .complete_step(&frame, &mut conversation, &hooks, &mut overflow_condensed)
                .await
            {
                Ok(turn) => turn,
                Err(error) => {
                    self.persist(&context);
                    self.emit(EngineEvent::Error {
                        base: BaseEvent::now(depth, step),
                        kind: error.kind().to_owned(),
                        message: error.to_string(),
                    });
                    return Err(error);
                }
            };
            counter!("model_completions_total", "model" => model.name().to_owned()).increment(1);

            if let Some(call_id) = self.record_replay(&frame, &model, &conversation, &turn) {
                debug!(call = %call_id, "replay recorded");
                last_call_id = Some(call_id);
            }

            // Condense under context pressure before the next call grows it.
            let used_frac = if window > 0 {
                turn.usage.input_tokens as f64 / window as f64
            } else {
                0.0
            };
            if used_frac >= self.config.condensation_threshold {
                let condensed = model.condense(&mut conversation);
                debug!(condensed, used_frac, "condensation threshold crossed");
            }

            if turn.is_final_text() {
                model
                    .append_assistant_turn(&mut conversation, &turn)
                    .map_err(EngineError::Model)?;
                self.emit(EngineEvent::AssistantText {
                    base: BaseEvent::now(depth, step),
                    text: turn.text.clone(),
                });
                return self.finish_solve(&frame, step, turn.text);
            }
            if turn.tool_calls.is_empty() {
                // Neither text nor calls; nudge once and keep looping.
                model
                    .append_assistant_turn(&mut conversation, &turn)
                    .map_err(EngineError::Model)?;
                model
                    .append_user(
                        &mut conversation,
                        "(empty turn; continue working or call finish with your answer)",
                    )
                    .map_err(EngineError::Model)?;
                continue;
            }
            if !turn.text.is_empty() {
                self.emit(EngineEvent::AssistantText {
                    base: BaseEvent::now(depth, step),
                    text: turn.text.clone(),
                });
            }

            let mut slots = self
                .dispatch_turn(
                    &frame,
                    &turn,
                    step,
                    &read_set,
                    &claimant,
                    &mut repetitions,
                    last_call_id.as_ref(),
                )
                .await;

            // Capture the finish text before tags decorate the observation.
            let final_answer = slots
                .iter()
                .find(|s| s.is_final)
                .map(|s| s.result.content.clone());

            // Budget tags prefix only the first result of the step.
            let tags = budget_tags(&self.config, step, used_frac);
            if tags.level != BudgetLevel::Ok {
                self.emit(EngineEvent::BudgetWarning {
                    base: BaseEvent::now(depth, step),
                    level: tags.level.label().to_owned(),
                    message: tags.text.clone(),
                });
            }
            if let Some(first) = slots.first_mut() {
                first.result.content = format!("{}\n{}", tags.text, first.result.content);
            }

            for (call, slot) in turn.tool_calls.iter().zip(&slots) {
                self.emit(EngineEvent::ToolResult {
                    base: BaseEvent::now(depth, step),
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    is_error: slot.result.is_error,
                    content: slot.result.content.clone(),
                });
            }

            let results: Vec<ToolResult> = slots.into_iter().map(|s| s.result).collect();
            model
                .append_assistant_turn(&mut conversation, &turn)
                .map_err(EngineError::Model)?;
            model
                .append_tool_results(&mut conversation, &results)
                .map_err(EngineError::Model)?;

            self.persist(&context);

            if let Some(text) = final_answer {
                return self.finish_solve(&frame, step, text);
            }
        }
    }

    fn build_hooks(self: &Arc<Self>, depth: u32, step_cell: &Arc<AtomicU64>) -> CompletionHooks {
        let delta_engine = Arc::clone(self);
        let delta_step = Arc::clone(step_cell);
        let retry_engine = Arc::clone(self);
        let retry_step = Arc::clone(step_cell);
        CompletionHooks {
            // Streamed text is surfaced only for the root solve.
            on_content_delta: (depth == 0).then(|| {
                Box::new(move |delta: &str| {
                    delta_engine.emit(EngineEvent::AssistantTextDelta {
                        base: BaseEvent::now(0, delta_step.load(Ordering::Relaxed)),
                        delta: delta.to_owned(),
                    });
                }) as Box<dyn Fn(&str) + Send + Sync>
            }),
            on_retry: Some(Box::new(move |message: &str| {
                retry_engine.emit(EngineEvent::RateLimit {
                    base: BaseEvent::now(depth, retry_step.load(Ordering::Relaxed)),
                    message: message.to_owned(),
                });
            })),
        }
    }

    /// One completion, with cancellation and the single condense-and-retry
    /// allowed on context overflow. A second overflow is fatal.
    async fn complete_step(
        &self,
        frame: &SolveFrame,
        conversation: &mut Conversation,
        hooks: &CompletionHooks,
        overflow_condensed: &mut bool,
    ) -> Result<ModelTurn, EngineError> {
        loop {
            let result = tokio::select! {
                r = frame.model.complete(conversation, hooks) => r,
                () = frame.cancel.cancelled() => return Err(EngineError::Cancelled),
            };
            match result {
                Ok(turn) => return Ok(turn),
                Err(ModelError::ContextOverflow { message }) if !*overflow_condensed => {
                    *overflow_condensed = true;
                    let condensed = frame.model.condense(conversation);
                    warn!(condensed, %message, "context overflow, retrying after condensation");
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    fn record_replay(
        &self,
        frame: &SolveFrame,
        model: &Arc<dyn Model>,
        conversation: &Conversation,
        turn: &ModelTurn,
    ) -> Option<CallId> {
        let replay = frame.replay.as_ref()?;
        let request = model.snapshot(conversation);
        let response = serde_json::to_value(turn).unwrap_or(serde_json::Value::Null);
        Some(replay.record_call(&request, &response))
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_turn(
        self: &Arc<Self>,
        frame: &SolveFrame,
        turn: &ModelTurn,
        step: u64,
        read_set: &Arc<ReadSet>,
        claimant: &str,
        repetitions: &mut RepetitionTracker,
        parent_call_id: Option<&CallId>,
    ) -> Vec<DispatchResult> {
        let depth = frame.depth;
        for call in &turn.tool_calls {
            self.emit(EngineEvent::ToolCall {
                base: BaseEvent::now(depth, step),
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                arguments: serde_json::Value::Object(call.arguments.clone()),
            });
        }

        let mut slots: Vec<Option<DispatchResult>> =
            turn.tool_calls.iter().map(|_| None).collect();

        // Sibling sub-agents spawned in this step share one conflict guard.
        let step_guard = Arc::new(WriteGuard::new());
        let spawn_count = turn
            .tool_calls
            .iter()
            .filter(|c| self.registry.spawn_kind(&c.name).is_some())
            .count();
        let parallel = self.config.parallel_dispatch && spawn_count > 1;

        let mut join: JoinSet<(usize, DispatchResult)> = JoinSet::new();
        if parallel {
            for (index, call) in turn.tool_calls.iter().enumerate() {
                let Some(kind) = self.registry.spawn_kind(&call.name) else {
                    continue;
                };
                match self.prepare_spawn(frame, call, kind, &step_guard, parent_call_id) {
                    Ok(prep) => {
                        let engine = Arc::clone(self);
                        let context = Arc::clone(&frame.context);
                        let _handle = join.spawn(async move {
                            engine.spawn_and_summarize(index, prep, depth, step, context).await
                        });
                    }
                    Err(error) => {
                        slots[index] = Some(DispatchResult::from_error(&call.id, &error));
                    }
                }
            }
        }

        for (index, call) in turn.tool_calls.iter().enumerate() {
            if slots[index].is_some() {
                continue;
            }
            if let Some(kind) = self.registry.spawn_kind(&call.name) {
                if parallel {
                    continue; // joined below
                }
                let result = match self.prepare_spawn(frame, call, kind, &step_guard, parent_call_id)
                {
                    Ok(prep) => {
                        let context = Arc::clone(&frame.context);
                        Arc::clone(self)
                            .spawn_and_summarize(index, prep, depth, step, context)
                            .await
                            .1
                    }
                    Err(error) => DispatchResult::from_error(&call.id, &error),
                };
                slots[index] = Some(result);
                continue;
            }

            // Thoughts land in the session-spanning observation log.
            if call.name == "think" {
                if let Some(text) = call.str_arg("text") {
                    frame.context.lock().record(depth, step, "think", text);
                }
            }

            // Policy screen for shell commands; violations never execute.
            if call.name == "run_shell" {
                if let Some(command) = call.str_arg("command") {
                    if let Err(error) =
                        check_shell_command(&self.config, command, repetitions)
                    {
                        slots[index] = Some(DispatchResult::from_error(&call.id, &error));
                        continue;
                    }
                }
            }

            let ctx = self.tool_context(frame, read_set, claimant, &call.name);
            slots[index] = Some(execute_tool_call(call, &self.registry, &ctx).await);
        }

        while let Some(joined) = join.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(error) => warn!(%error, "spawn task panicked"),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    DispatchResult::from_error(
                        &turn.tool_calls[index].id,
                        &ToolError::internal("dispatch produced no result"),
                    )
                })
            })
            .collect()
    }

    fn tool_context(
        &self,
        frame: &SolveFrame,
        read_set: &Arc<ReadSet>,
        claimant: &str,
        tool_name: &str,
    ) -> ToolContext {
        ToolContext {
            workspace: Arc::clone(&self.workspace),
            read_set: Arc::clone(read_set),
            write_guard: Arc::clone(&frame.write_guard),
            jobs: Arc::clone(&self.jobs),
            plans: Arc::clone(&self.plans),
            cancellation: frame.cancel.clone(),
            timeout: self.timeout_for(tool_name),
            max_observation_chars: self.config.max_observation_chars,
            depth: frame.depth,
            claimant: claimant.to_owned(),
            shell_env: self.config.shell_env.clone(),
            user_agent: self.config.user_agent.clone(),
            web_search_base_url: self.config.web_search_base_url.clone(),
        }
    }

    /// Resolve a spawn call into a runnable child frame, enforcing depth and
    /// tier monotonicity.
    fn prepare_spawn(
        &self,
        frame: &SolveFrame,
        call: &ToolCall,
        kind: SpawnKind,
        step_guard: &Arc<WriteGuard>,
        parent_call_id: Option<&CallId>,
    ) -> Result<SpawnPrep, ToolError> {
        let objective = call
            .str_arg("objective")
            .filter(|o| !o.trim().is_empty())
            .ok_or_else(|| ToolError::invalid("missing required parameter: objective"))?;
        let acceptance = call.str_arg("acceptance_criteria").map(str::to_owned);

        if frame.depth + 1 > self.config.max_depth {
            return Err(ToolError::MaxDepth {
                limit: self.config.max_depth,
            });
        }

        let model_name = match kind {
            SpawnKind::Subtask => {
                let requested = call
                    .str_arg("model")
                    .ok_or_else(|| ToolError::invalid("missing required parameter: model"))?;
                let parent_tier = model_tier(frame.model.name());
                let child_tier = model_tier(requested);
                if !child_tier.spawnable_from(parent_tier) {
                    return Err(ToolError::invalid(format!(
                        "cannot delegate up: {requested} is {child_tier}, above your {parent_tier}; \
                         pick a model at your tier or cheaper"
                    )));
                }
                requested.to_owned()
            }
            SpawnKind::Execute => self
                .config
                .executor_model
                .clone()
                .unwrap_or_else(|| default_executor_model(&self.config.model_name)),
        };

        let child_model = self
            .model(&model_name, self.config.reasoning_effort)
            .map_err(|e| ToolError::internal(format!("cannot build model {model_name}: {e}")))?;

        let mut child_objective = objective.to_owned();
        if let Some(criteria) = &acceptance {
            child_objective.push_str("\n\nAcceptance criteria:\n");
            child_objective.push_str(criteria);
        }

        Ok(SpawnPrep {
            call_id: call.id.clone(),
            kind,
            acceptance,
            frame: SolveFrame {
                depth: frame.depth + 1,
                model: child_model,
                objective: child_objective,
                context: Arc::clone(&frame.context),
                cancel: frame.cancel.child_token(),
                replay: frame
                    .replay
                    .as_ref()
                    .zip(parent_call_id)
                    .map(|(replay, id)| replay.child(id)),
                write_guard: Arc::clone(step_guard),
            },
        })
    }

    /// Run a prepared child solve and fold its outcome into a tool result.
    async fn spawn_and_summarize(
        self: Arc<Self>,
        index: usize,
        prep: SpawnPrep,
        parent_depth: u32,
        parent_step: u64,
        context: SharedContext,
    ) -> (usize, DispatchResult) {
        let kind_label = match prep.kind {
            SpawnKind::Subtask => "subtask",
            SpawnKind::Execute => "execute",
        };
        let child_model_name = prep.frame.model.name().to_owned();
        self.emit(EngineEvent::SubSpawn {
            base: BaseEvent::now(parent_depth, parent_step),
            kind: kind_label.to_owned(),
            model: child_model_name.clone(),
            objective: prep.frame.objective.clone(),
        });
        counter!("sub_agents_spawned_total", "kind" => kind_label).increment(1);

        let outcome = Arc::clone(&self).run_solve(prep.frame).await;
        match outcome {
            Ok(text) => {
                let verdict = match (&prep.acceptance, self.config.acceptance_criteria_mode) {
                    (Some(criteria), true) => Some(self.judge(criteria, &text).await),
                    _ => None,
                };
                let mut summary = text;
                if let Some(verdict) = &verdict {
                    summary.push_str("\nACCEPTANCE: ");
                    summary.push_str(verdict);
                }
                context
                    .lock()
                    .record(parent_depth, parent_step, "sub_return", summary.clone());
                self.emit(EngineEvent::SubReturn {
                    base: BaseEvent::now(parent_depth, parent_step),
                    model: child_model_name,
                    summary: summary.clone(),
                    verdict,
                });
                (
                    index,
                    DispatchResult {
                        result: ToolResult::ok(
                            &prep.call_id,
                            clip_observation(&summary, self.config.max_observation_chars),
                        ),
                        is_final: false,
                    },
                )
            }
            Err(error) => {
                self.emit(EngineEvent::SubReturn {
                    base: BaseEvent::now(parent_depth, parent_step),
                    model: child_model_name,
                    summary: format!("failed: {error}"),
                    verdict: None,
                });
                (
                    index,
                    DispatchResult {
                        result: ToolResult::error(
                            &prep.call_id,
                            format!("sub-agent failed ({}): {error}", error.kind()),
                        ),
                        is_final: false,
                    },
                )
            }
        }
    }

    /// Judge a child's output against acceptance criteria on the cheapest
    /// executor model, with no tools. Anything unparseable is a FAIL.
    async fn judge(&self, criteria: &str, output: &str) -> String {
        let model_name = self
            .config
            .executor_model
            .clone()
            .unwrap_or_else(|| default_executor_model(&self.config.model_name));
        let Ok(model) = self.model(&model_name, None) else {
            return "FAIL".to_owned();
        };
        let mut conversation = model.create_conversation(&self.prompt_pack.judge, &[]);
        if model
            .append_user(
                &mut conversation,
                &format!("Acceptance criteria:\n{criteria}\n\nCandidate output:\n{output}"),
            )
            .is_err()
        {
            return "FAIL".to_owned();
        }
        match model.complete(&conversation, &CompletionHooks::none()).await {
            Ok(turn) => parse_verdict(&turn.text),
            Err(error) => {
                warn!(%error, "judge call failed");
                "FAIL".to_owned()
            }
        }
    }

    /// Final wrap-up for a successful solve.
    fn finish_solve(
        &self,
        frame: &SolveFrame,
        step: u64,
        text: String,
    ) -> Result<String, EngineError> {
        frame
            .context
            .lock()
            .record(frame.depth, step, "final", text.clone());
        self.persist(&frame.context);
        self.emit(EngineEvent::Final {
            base: BaseEvent::now(frame.depth, step),
            text: text.clone(),
        });
        info!(depth = frame.depth, step, "solve finished");
        Ok(text)
    }

    /// Out of steps: demand a plain-text answer with one last completion.
    async fn step_budget_epilogue(
        &self,
        frame: &SolveFrame,
        model: &Arc<dyn Model>,
        conversation: &mut Conversation,
        hooks: &CompletionHooks,
        step: u64,
    ) -> Result<String, EngineError> {
        self.emit(EngineEvent::BudgetWarning {
            base: BaseEvent::now(frame.depth, step),
            level: "critical".to_owned(),
            message: "step budget exhausted".to_owned(),
        });
        model
            .append_user(
                conversation,
                "Step budget exhausted. Provide your best final answer now, in plain text, \
                 without calling tools.",
            )
            .map_err(EngineError::Model)?;
        let mut overflow_condensed = true; // no more condense-retries this late
        let turn = match self
            .complete_step(frame, conversation, hooks, &mut overflow_condensed)
            .await
        {
            Ok(turn) => turn,
            Err(error) => {
                self.persist(&frame.context);
                return Err(error);
            }
        };
        let text = if turn.text.trim().is_empty() {
            "No final answer was produced within the step budget.".to_owned()
        } else {
            turn.text
        };
        self.finish_solve(frame, step, text)
    }
}

/// First standalone PASS/FAIL token wins; anything else is a FAIL.
fn parse_verdict(text: &str) -> String {
    for token in text.split_whitespace() {
        let cleaned: String = token
            .chars()
            .filter(char::is_ascii_alphabetic)
            .collect::<String>()
            .to_ascii_uppercase();
        match cleaned.as_str() {
            "PASS" => return "PASS".to_owned(),
            "FAIL" => return "FAIL".to_owned(),
            _ => {}
        }
    }
    "FAIL".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_parsing() {
        assert_eq!(parse_verdict("PASS, all criteria met"), "PASS");
        assert_eq!(parse_verdict("FAIL: missing citations"), "FAIL");
        assert_eq!(parse_verdict("The result looks fine."), "FAIL");
        assert_eq!(parse_verdict("pass"), "PASS");
        assert_eq!(parse_verdict(""), "FAIL");
    }
}
