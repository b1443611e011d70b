//! Surveyor Engine - workflow execution
//!
//! The run manager drives validated workflows step by step through the
//! executor, broadcasting ordered lifecycle events and persisting every
//! transition. The Engine facade ties planner, registry, and runs
//! together behind one surface.

pub mod config;
pub mod engine;
pub mod event_hub;
pub mod executor;
pub mod run_manager;

pub use config::EngineConfig;
pub use engine::{Engine, MessageMetadata};
pub use event_hub::EventHub;
pub use executor::{StepExecutor, StepOutcome};
pub use run_manager::RunManager;
