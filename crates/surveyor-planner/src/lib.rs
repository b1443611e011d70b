//! Surveyor Planner - turns chat messages into validated workflows
//!
//! Providers produce a JSON-only workflow document; the service validates
//! it, optionally runs a critic pass, and falls open to an empty workflow
//! whenever anything about the plan cannot be trusted.

pub mod context;
pub mod hosted;
pub mod local;
pub mod provider;
pub mod service;
pub mod types;

pub use context::{build_planner_context, ContextInput};
pub use hosted::HostedPlannerProvider;
pub use local::LocalPlannerProvider;
pub use provider::PlannerProvider;
pub use service::{PlanOutcome, PlanRequest, PlannerService, PlannerServiceConfig};
pub use types::{
    CriticResult, MessageRole, PlanResult, PlannerArtifactRef, PlannerContext, PlannerMessage,
    PlannerSnippet,
};
