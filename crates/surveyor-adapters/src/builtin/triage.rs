//! Rule-based finding triage
//!
//! Maps each candidate's severity hint and confidence through a fixed
//! decision table, then caps the kept set at `max_kept` by demoting the
//! lowest-ranked keeps to needs_review.

use crate::artifacts::{
    Confidence, FindingCandidate, FindingsCandidates, FindingsTriaged, Severity, TriageDecision,
    TriageSummary, TriagedFinding,
};
use crate::builtin::{load_input, param_str, param_usize};
use crate::manifest::{AdapterManifest, RiskLevel};
use crate::registry::{
    Adapter, AdapterArtifact, AdapterContext, AdapterLogEntry, ExecutionResult,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use surveyor_core::Result;

pub const ADAPTER_ID: &str = "findings.triage.rulebased";

pub struct TriageAdapter {
    manifest: AdapterManifest,
}

impl Default for TriageAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TriageAdapter {
    pub fn new() -> Self {
        Self {
            manifest: AdapterManifest {
                id: ADAPTER_ID.into(),
                name: "Rule-based Findings Triage".into(),
                description: "Triage finding candidates with a deterministic decision table.".into(),
                category: "analysis".into(),
                risk_default: RiskLevel::Passive,
                version: "1.0.0".into(),
                inputs: vec!["findings_candidates.json".into()],
                outputs: vec!["findings_triaged.json".into()],
                params_schema: json!({
                    "type": "object",
                    "properties": {
                        "triage_mode": { "type": "string", "enum": ["balanced", "conservative"] },
                        "max_kept": { "type": "integer", "minimum": 1 }
                    },
                    "required": [],
                    "additionalProperties": false
                }),
                artifact_schemas: HashMap::new(),
                tags: vec!["findings".into(), "triage".into()],
            },
        }
    }
}

#[async_trait]
impl Adapter for TriageAdapter {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        inputs: &[AdapterArtifact],
        ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        let mode = {
            let raw = param_str(params, "triage_mode");
            if raw.is_empty() { "balanced".to_string() } else { raw }
        };
        let max_kept = param_usize(params, "max_kept", 30, 1);

        let candidates: FindingsCandidates =
            load_input(inputs, "findings_candidates.json", ctx)?;

        let mut triaged: Vec<TriagedFinding> = candidates
            .candidates
            .iter()
            .map(|candidate| {
                let base = base_decision(candidate.severity_hint, &mode);
                let decision = adjust_decision(base, candidate.confidence);
                TriagedFinding {
                    candidate_id: candidate.id.clone(),
                    decision,
                    severity: resolve_severity(candidate.severity_hint, candidate.confidence),
                    rationale: format!(
                        "Decision {} based on severity_hint {} and confidence {}.",
                        decision_name(decision),
                        severity_name(candidate.severity_hint),
                        confidence_name(candidate.confidence),
                    ),
                    tags: candidate.tags.clone(),
                    refs: candidate.refs.clone(),
                }
            })
            .collect();

        let kept = triaged
            .iter()
            .filter(|t| t.decision == TriageDecision::Keep)
            .count();
        if kept > max_kept {
            let allowed: HashSet<&str> = rank_candidates(&candidates.candidates)
                .into_iter()
                .take(max_kept)
                .collect();
            for entry in triaged.iter_mut() {
                if entry.decision == TriageDecision::Keep
                    && !allowed.contains(entry.candidate_id.as_str())
                {
                    entry.decision = TriageDecision::NeedsReview;
                    entry.rationale.push_str(" Limited by max_kept.");
                }
            }
        }

        let summary = summarize(&triaged);
        let artifact = FindingsTriaged {
            target: candidates.target,
            timestamp: surveyor_core::now().to_rfc3339(),
            source_artifacts: vec!["findings_candidates.json".into()],
            triaged,
            summary,
        };

        Ok(ExecutionResult {
            logs: vec![AdapterLogEntry::info("triage complete").with_data(json!({
                "kept": summary.kept,
                "dropped": summary.dropped,
                "needs_review": summary.needs_review,
            }))],
            artifacts: vec![AdapterArtifact::inline(
                "findings_triaged.json",
                serde_json::to_value(&artifact)?,
            )],
            warnings: Vec::new(),
            metrics: None,
        })
    }
}

fn base_decision(severity: Severity, mode: &str) -> TriageDecision {
    if mode == "conservative" {
        return match severity {
            Severity::High | Severity::Medium => TriageDecision::NeedsReview,
            _ => TriageDecision::Drop,
        };
    }
    match severity {
        Severity::High => TriageDecision::Keep,
        Severity::Medium | Severity::Low => TriageDecision::NeedsReview,
        Severity::Info => TriageDecision::Drop,
    }
}

fn adjust_decision(base: TriageDecision, confidence: Confidence) -> TriageDecision {
    match (base, confidence) {
        (TriageDecision::Keep, Confidence::Low) => TriageDecision::NeedsReview,
        (TriageDecision::NeedsReview, Confidence::Low) => TriageDecision::Drop,
        (TriageDecision::Drop, Confidence::High) => TriageDecision::NeedsReview,
        _ => base,
    }
}

fn resolve_severity(severity: Severity, confidence: Confidence) -> Severity {
    match severity {
        Severity::High => {
            if confidence == Confidence::Low { Severity::Medium } else { Severity::High }
        }
        Severity::Medium => {
            if confidence == Confidence::High { Severity::Medium } else { Severity::Low }
        }
        Severity::Low => {
            if confidence == Confidence::High { Severity::Low } else { Severity::Info }
        }
        Severity::Info => Severity::Info,
    }
}

/// Order candidates best-first for the max_kept cut.
fn rank_candidates(candidates: &[FindingCandidate]) -> Vec<&str> {
    let mut ordered: Vec<&FindingCandidate> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        b.severity_hint
            .cmp(&a.severity_hint)
            .then_with(|| b.confidence.cmp(&a.confidence))
    });
    ordered.into_iter().map(|c| c.id.as_str()).collect()
}

fn summarize(triaged: &[TriagedFinding]) -> TriageSummary {
    let mut summary = TriageSummary { kept: 0, dropped: 0, needs_review: 0 };
    for entry in triaged {
        match entry.decision {
            TriageDecision::Keep => summary.kept += 1,
            TriageDecision::Drop => summary.dropped += 1,
            TriageDecision::NeedsReview => summary.needs_review += 1,
        }
    }
    summary
}

fn decision_name(decision: TriageDecision) -> &'static str {
    match decision {
        TriageDecision::Keep => "keep",
        TriageDecision::Drop => "drop",
        TriageDecision::NeedsReview => "needs_review",
    }
}

fn severity_name(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
    }
}

fn confidence_name(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Low => "low",
        Confidence::Medium => "medium",
        Confidence::High => "high",
    }
}
