//! scanrelay daemon library.
//!
//! This library exposes the daemon's building blocks for integration testing
//! and for embedding the runtime with custom provider adapters.
//! In production, `scanrelay-daemon` is used as a binary (main.rs).

pub mod admin;
pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod registry;

pub use admin::{AdminService, BudgetSummary, TriggerReport};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
