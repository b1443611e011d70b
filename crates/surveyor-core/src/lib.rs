//! Surveyor Core - domain records, workflow definitions, events, and error handling

pub mod error;
pub mod events;
pub mod hash;
pub mod types;
pub mod workflow;

pub use error::{Error, Result};
pub use events::RunEvent;
pub use types::*;
pub use workflow::{
    parse_workflow_json, validate_workflow, WorkflowDefinition, WorkflowScope, WorkflowStep,
};
