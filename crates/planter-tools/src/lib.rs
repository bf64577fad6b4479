//! # planter-tools
//!
//! The workspace-sandboxed tool layer.
//!
//! Every tool is a [`traits::PlanterTool`] executing against a
//! [`traits::ToolContext`] and returning a `(is_final, observation)` pair as
//! [`traits::ToolOutcome`]. The [`registry::ToolRegistry`] is the single
//! catalog driving both provider schemas and dispatch.
//!
//! ## Invariants enforced here
//!
//! - **Path confinement**: every path resolves inside the workspace root
//!   ([`workspace::Workspace::confine`]).
//! - **Read-before-overwrite**: overwriting a file not in the per-solve
//!   [`workspace::ReadSet`] fails.
//! - **Parallel write conflicts**: sibling sub-agents writing the same path
//!   within one parent step collide in the [`workspace::WriteGuard`].
//! - **Observation clipping**: outputs are bounded before they reach the
//!   engine, with an explicit `[clipped N chars]` marker.

#![deny(unsafe_code)]

pub mod errors;
pub mod fs;
pub mod misc;
pub mod registry;
pub mod search;
pub mod shell;
pub mod testutil;
pub mod traits;
pub mod utils;
pub mod web;
pub mod workspace;

pub use errors::ToolError;
pub use registry::{ToolRegistry, standard_registry};
pub use traits::{PlanterTool, SpawnKind, ToolContext, ToolOutcome};
