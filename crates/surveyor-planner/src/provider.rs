//! Provider seam
//!
//! A provider turns a planning context into a workflow document. The
//! service treats providers as untrusted: output is re-validated and any
//! error falls back to an empty workflow.

use crate::types::{CriticResult, PlanResult, PlannerContext};
use async_trait::async_trait;
use serde_json::Value;
use surveyor_core::Result;

#[async_trait]
pub trait PlannerProvider: Send + Sync {
    /// Stable provider id, e.g. "local.heuristic".
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Apply provider settings. Unknown keys are ignored.
    fn configure(&mut self, _settings: &Value) {}

    async fn plan(&self, context: &PlannerContext) -> Result<PlanResult>;

    /// Optional second opinion over a produced workflow document. The
    /// default accepts everything.
    async fn critic(&self, _context: &PlannerContext, _workflow_json: &str) -> Result<CriticResult> {
        Ok(CriticResult::pass())
    }
}
