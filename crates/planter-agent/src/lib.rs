//! # planter-agent
//!
//! The assembled OpenPlanter agent: settings → providers → engine → session.
//!
//! [`Agent::open`] creates a persisted session in the configured workspace
//! and wires the engine's event and replay sinks to it; [`Agent::resume`]
//! picks an existing session back up, restoring external context and the
//! newest investigation plan. Embedders subscribe to
//! [`planter_engine::EventEmitter`] for live rendering.

#![deny(unsafe_code)]

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use planter_core::context::{ExternalContext, SharedContext, shared};
use planter_engine::{Engine, EngineBuilder, EngineError};
use planter_llm::factory::{DefaultModelFactory, ModelFactory, ProviderCredentials};
use planter_session::{ReplayLogger, Session, SessionError, SessionSink, SessionStore};
use planter_settings::{Settings, SettingsError};

pub use planter_core::config::EngineConfig;
pub use planter_core::events::EngineEvent;
pub use planter_engine::PromptPack;
pub use planter_settings::load_settings;

/// Facade-level errors.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Settings could not be loaded.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// Session persistence failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The engine failed fatally.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Initialize tracing from `RUST_LOG` (defaults to `info`).
///
/// Call once at process start; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// A session-bound agent: one engine, one persisted session, one
/// session-spanning external context.
pub struct Agent {
    engine: Arc<Engine>,
    session: Arc<Session>,
    context: SharedContext,
    cancel: CancellationToken,
    /// Plans already persisted (so new captures can be flushed after solves).
    persisted_plans: std::sync::atomic::AtomicUsize,
}

impl Agent {
    /// Open a fresh session in the configured workspace.
    pub fn open(settings: Settings) -> Result<Self, AgentError> {
        let store = SessionStore::new(&settings.engine.workspace_root);
        let session = Arc::new(store.create()?);
        Self::wire(settings, session, ExternalContext::new())
    }

    /// Resume an existing session, restoring its external context.
    pub fn resume(settings: Settings, session_id: &str) -> Result<Self, AgentError> {
        let store = SessionStore::new(&settings.engine.workspace_root);
        let session = Arc::new(store.resume(session_id)?);
        let context = session.load_state()?.unwrap_or_default();
        Self::wire(settings, session, context)
    }

    fn wire(
        settings: Settings,
        session: Arc<Session>,
        context: ExternalContext,
    ) -> Result<Self, AgentError> {
        let factory: Arc<dyn ModelFactory> = Arc::new(DefaultModelFactory::new(
            ProviderCredentials {
                anthropic_api_key: settings.providers.anthropic_api_key.clone(),
                anthropic_base_url: settings.providers.anthropic_base_url.clone(),
                openai_api_key: settings.providers.openai_api_key.clone(),
                openai_base_url: settings.providers.openai_base_url.clone(),
            },
            settings.engine.max_context_tokens,
        ));

        let engine = EngineBuilder::new(settings.engine, factory)
            .event_sink(Arc::new(SessionSink::new(Arc::clone(&session))?))
            .replay_sink(ReplayLogger::open(&session.dir().join("replay.jsonl"))?)
            .build()?;

        // The newest persisted plan is injected into the next solve.
        let mut persisted = 0;
        if let Some(plan) = session.latest_plan()? {
            engine.plans().push(plan);
            persisted = engine.plans().all().len();
        }

        info!(session = %session.id(), "agent ready");
        Ok(Self {
            engine,
            session,
            context: shared(context),
            cancel: CancellationToken::new(),
            persisted_plans: std::sync::atomic::AtomicUsize::new(persisted),
        })
    }

    /// The engine (subscribe to its emitter for live events).
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// The persisted session.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The session-spanning external context.
    #[must_use]
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Cancel any in-flight solve.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run one solve against the session context. Plans captured during the
    /// solve are persisted afterwards.
    pub async fn solve(&self, objective: &str) -> Result<String, AgentError> {
        let result = self
            .engine
            .solve_with_context(
                objective,
                Arc::clone(&self.context),
                self.cancel.child_token(),
            )
            .await;

        self.flush_plans()?;
        Ok(result?)
    }

    fn flush_plans(&self) -> Result<(), SessionError> {
        use std::sync::atomic::Ordering;
        let plans = self.engine.plans().all();
        let already = self.persisted_plans.load(Ordering::SeqCst);
        for plan in plans.iter().skip(already) {
            let _ = self.session.store_plan(plan)?;
        }
        self.persisted_plans.store(plans.len(), Ordering::SeqCst);
        Ok(())
    }
}
