//! # planter-core
//!
//! Foundation types and utilities shared by every OpenPlanter crate.
//!
//! - **Branded IDs**: [`ids::SessionId`], [`ids::CallId`], [`ids::JobId`] as newtypes
//! - **Messages**: [`messages::ToolCall`], [`messages::ToolResult`], [`messages::ModelTurn`]
//! - **Events**: [`events::EngineEvent`] lifecycle stream consumed by UIs and the session log
//! - **Configuration**: [`config::EngineConfig`]: immutable per solve
//! - **External context**: [`context::ExternalContext`] observation accumulator
//! - **Retry**: [`retry`] header parsing and clamping for rate-limit backoff
//! - **Text**: [`text`] UTF-8-safe truncation and observation clipping
//! - **Sinks**: [`sinks::EventSink`] / [`sinks::ReplaySink`] persistence seams
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other planter crates.

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod events;
pub mod ids;
pub mod messages;
pub mod retry;
pub mod schema;
pub mod sinks;
pub mod text;
