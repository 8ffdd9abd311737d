//! Orchestration layer: the trampoline executor, its configuration and
//! errors, and the definition cache it tables results through. Depends on
//! `ground_core` (terms, compiled nodes, the target sink contract) and
//! `ground_algo` (records, result sets, the goal-keyed dictionary); knows
//! nothing about where a [`Database`](ground_core::Database) or
//! [`GroundTarget`](ground_core::GroundTarget) actually comes from — that is
//! `ground_io`'s job.

pub mod action;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;

pub use config::{EngineConfig, UnknownPolicy};
pub use error::EngineError;
pub use executor::{call, Executor, QueryResult};
