//! # planter-engine
//!
//! The recursive step engine.
//!
//! [`engine::Engine::solve_with_context`] drives an LLM to completion:
//! alternate completions with tool dispatch, enforce runtime policy (shell
//! bans, heredoc rejection, repetition limits, tier monotonicity, depth
//! bounds), inject budget tags, trigger conversation condensation under
//! context pressure, and spawn sub-engines for `subtask`/`execute` with
//! sibling parallelism.
//!
//! ## Data flow
//!
//! `engine` → model `complete` → `policy` screen → `dispatch` (tools) or
//! spawn (child engine) → results appended → loop. Lifecycle events flow
//! through [`emitter::EventEmitter`] and the optional persistence sink.

#![deny(unsafe_code)]

pub mod budget;
pub mod dispatch;
pub mod emitter;
pub mod engine;
pub mod errors;
pub mod policy;
pub mod prompt;

pub use emitter::EventEmitter;
pub use engine::{Engine, EngineBuilder};
pub use errors::EngineError;
pub use prompt::PromptPack;
