//! Typed artifact content
//!
//! Serde views of the artifact types the builtin pipeline exchanges. The
//! executor validates the serialized form against the schemas in
//! [`crate::schema`]; these structs are the convenient in-process shape.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriageDecision {
    Keep,
    Drop,
    NeedsReview,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSurfaceUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSurfaceLink {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSurfaceForm {
    pub action: String,
    pub method: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSurfaceEvidence {
    pub kind: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSurface {
    pub target: String,
    pub timestamp: String,
    pub urls: Vec<WebSurfaceUrl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<WebSurfaceLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forms: Vec<WebSurfaceForm>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<WebSurfaceEvidence>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindingEvidence {
    pub kind: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindingRef {
    pub source: String,
    pub doc_id: String,
    pub chunk_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindingCandidate {
    pub id: String,
    #[serde(rename = "type")]
    pub finding_type: String,
    pub title: String,
    pub description: String,
    pub evidence: Vec<FindingEvidence>,
    pub confidence: Confidence,
    pub severity_hint: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub refs: Vec<FindingRef>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindingsCandidates {
    pub target: String,
    pub timestamp: String,
    pub source_artifacts: Vec<String>,
    pub candidates: Vec<FindingCandidate>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriagedFinding {
    pub candidate_id: String,
    pub decision: TriageDecision,
    pub severity: Severity,
    pub rationale: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub refs: Vec<FindingRef>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TriageSummary {
    pub kept: usize,
    pub dropped: usize,
    pub needs_review: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindingsTriaged {
    pub target: String,
    pub timestamp: String,
    pub source_artifacts: Vec<String>,
    pub triaged: Vec<TriagedFinding>,
    pub summary: TriageSummary,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report {
    pub target: String,
    pub timestamp: String,
    pub artifacts: Vec<String>,
    pub report_path: String,
}
