//! Markdown report generation
//!
//! Folds the surface and triage artifacts into a human-readable report
//! under `reports/<run_id>/report.md` and emits a `report.json` artifact
//! pointing at it.

use crate::artifacts::{
    FindingCandidate, FindingsCandidates, FindingsTriaged, Report, Severity, TriageDecision,
    WebSurface,
};
use crate::builtin::{load_input, param_bool, relative_to_root, try_load_input};
use crate::manifest::{AdapterManifest, RiskLevel};
use crate::registry::{
    Adapter, AdapterArtifact, AdapterContext, AdapterLogEntry, ExecutionResult,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use surveyor_core::Result;

pub const ADAPTER_ID: &str = "report.generate.markdown";

pub struct ReportAdapter {
    manifest: AdapterManifest,
}

impl Default for ReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportAdapter {
    pub fn new() -> Self {
        Self {
            manifest: AdapterManifest {
                id: ADAPTER_ID.into(),
                name: "Markdown Report Generator".into(),
                description: "Render triaged findings into a markdown assessment report.".into(),
                category: "report".into(),
                risk_default: RiskLevel::Passive,
                version: "1.0.0".into(),
                inputs: vec!["web_surface.json".into(), "findings_triaged.json".into()],
                outputs: vec!["report.json".into()],
                params_schema: json!({
                    "type": "object",
                    "properties": {
                        "template": { "type": "string", "enum": ["default"] },
                        "include_evidence_links": { "type": "boolean" },
                        "include_kb_citations": { "type": "boolean" }
                    },
                    "required": [],
                    "additionalProperties": false
                }),
                artifact_schemas: HashMap::new(),
                tags: vec!["report".into()],
            },
        }
    }
}

#[async_trait]
impl Adapter for ReportAdapter {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        inputs: &[AdapterArtifact],
        ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        let include_evidence = param_bool(params, "include_evidence_links", true);
        let include_citations = param_bool(params, "include_kb_citations", true);

        let surface: WebSurface = load_input(inputs, "web_surface.json", ctx)?;
        let triaged: FindingsTriaged = load_input(inputs, "findings_triaged.json", ctx)?;
        let candidates: Option<FindingsCandidates> =
            try_load_input(inputs, "findings_candidates.json", ctx)?;
        let candidates_by_id: HashMap<&str, &FindingCandidate> = candidates
            .as_ref()
            .map(|c| {
                c.candidates
                    .iter()
                    .map(|entry| (entry.id.as_str(), entry))
                    .collect()
            })
            .unwrap_or_default();

        let report_dir = ctx.project_root.join("reports").join(&ctx.run_id);
        std::fs::create_dir_all(&report_dir)?;
        let report_path = report_dir.join("report.md");

        let content = render(
            &surface,
            &triaged,
            &candidates_by_id,
            ctx.mission.as_ref().map(|m| m.objective.as_str()),
            include_evidence,
            include_citations,
        );
        std::fs::write(&report_path, content)?;

        let report = Report {
            target: triaged.target.clone(),
            timestamp: surveyor_core::now().to_rfc3339(),
            artifacts: vec!["web_surface.json".into(), "findings_triaged.json".into()],
            report_path: relative_to_root(&ctx.project_root, &report_path),
        };

        Ok(ExecutionResult {
            logs: vec![AdapterLogEntry::info("report generated")
                .with_data(json!({ "path": report.report_path }))],
            artifacts: vec![AdapterArtifact::inline(
                "report.json",
                serde_json::to_value(&report)?,
            )],
            warnings: Vec::new(),
            metrics: None,
        })
    }
}

fn render(
    surface: &WebSurface,
    triaged: &FindingsTriaged,
    candidates_by_id: &HashMap<&str, &FindingCandidate>,
    mission_objective: Option<&str>,
    include_evidence: bool,
    include_citations: bool,
) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("# Assessment Report".into());
    lines.push(String::new());
    lines.push(format!("Target: {}", triaged.target));
    lines.push(format!("Timestamp: {}", triaged.timestamp));
    lines.push(String::new());
    lines.push(format!(
        "Mission Objective: {}",
        mission_objective.unwrap_or("Not provided")
    ));
    lines.push(String::new());

    lines.push("## Summary".into());
    lines.push(format!(
        "- Kept: {}, Needs Review: {}, Dropped: {}",
        triaged.summary.kept, triaged.summary.needs_review, triaged.summary.dropped
    ));
    let counts = severity_counts(triaged);
    lines.push(format!(
        "- Severity: high {}, medium {}, low {}, info {}",
        counts.0, counts.1, counts.2, counts.3
    ));
    lines.push(String::new());

    lines.push("## Key Findings".into());
    let findings: Vec<_> = triaged
        .triaged
        .iter()
        .filter(|entry| entry.decision != TriageDecision::Drop)
        .collect();
    if findings.is_empty() {
        lines.push("- No findings retained.".into());
    }
    for entry in findings {
        let candidate = candidates_by_id.get(entry.candidate_id.as_str());
        let title = candidate.map_or(entry.candidate_id.as_str(), |c| c.title.as_str());
        let description = candidate.map_or(entry.rationale.as_str(), |c| c.description.as_str());
        let decision = match entry.decision {
            TriageDecision::Keep => "keep",
            TriageDecision::NeedsReview => "needs_review",
            TriageDecision::Drop => "drop",
        };
        lines.push(format!(
            "- **{title}** ({decision}, severity: {})",
            severity_label(entry.severity)
        ));
        lines.push(format!("  - {description}"));
        if include_evidence {
            if let Some(candidate) = candidate {
                if !candidate.evidence.is_empty() {
                    lines.push("  - Evidence:".into());
                    for ev in &candidate.evidence {
                        match &ev.path {
                            Some(path) => {
                                lines.push(format!("    - {}: {} ({})", ev.kind, ev.value, path))
                            }
                            None => lines.push(format!("    - {}: {}", ev.kind, ev.value)),
                        }
                    }
                }
            }
        }
        if include_citations && !entry.refs.is_empty() {
            lines.push("  - KB refs:".into());
            for reference in &entry.refs {
                lines.push(format!(
                    "    - {} ({}#{})",
                    reference.label.as_deref().unwrap_or("doc"),
                    reference.doc_id,
                    reference.chunk_id
                ));
            }
        }
    }
    lines.push(String::new());

    lines.push("## Appendix".into());
    lines.push(format!("- URLs discovered: {}", surface.urls.len()));
    lines.push(format!("- Forms discovered: {}", surface.forms.len()));
    lines.push(String::new());

    lines.join("\n")
}

fn severity_counts(triaged: &FindingsTriaged) -> (usize, usize, usize, usize) {
    let mut counts = (0, 0, 0, 0);
    for entry in &triaged.triaged {
        match entry.severity {
            Severity::High => counts.0 += 1,
            Severity::Medium => counts.1 += 1,
            Severity::Low => counts.2 += 1,
            Severity::Info => counts.3 += 1,
        }
    }
    counts
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
    }
}
