//! Planner data shapes

use serde::{Deserialize, Serialize};
use surveyor_adapters::AdapterSummary;
use surveyor_core::{MissionManifest, PlannerTelemetry};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannerMessage {
    pub role: MessageRole,
    pub content: String,
}

impl PlannerMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }
}

/// One retrieved knowledge snippet attached to the planning context.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannerSnippet {
    pub doc_id: String,
    pub chunk_id: String,
    pub snippet: String,
    pub source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Lightweight view of a prior artifact, enough for a provider to refer to
/// existing outputs without the engine handing over file contents.
#[derive(Clone, Debug, Serialize)]
pub struct PlannerArtifactRef {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
}

/// Everything a provider sees when asked to plan.
#[derive(Clone, Debug, Serialize)]
pub struct PlannerContext {
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub message: PlannerMessage,
    pub mission_manifest: MissionManifest,
    pub adapter_capabilities: Vec<AdapterSummary>,
    pub artifacts: Vec<PlannerArtifactRef>,
    pub retrieved_snippets: Vec<PlannerSnippet>,
}

/// A provider's raw answer: a single self-contained JSON document plus
/// whatever telemetry it can report.
#[derive(Clone, Debug, Deserialize)]
pub struct PlanResult {
    pub workflow_json: String,
    #[serde(default)]
    pub telemetry: Option<PlannerTelemetry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CriticResult {
    pub ok: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl CriticResult {
    pub fn pass() -> Self {
        Self { ok: true, issues: Vec::new() }
    }

    pub fn veto(issues: Vec<String>) -> Self {
        Self { ok: false, issues }
    }
}
