//! Deterministic local planner
//!
//! Pattern-matches intent keywords in the user message against the fixed
//! pipeline shapes the builtin adapters support. No network, no model;
//! this provider is the fallback when nothing else is configured.

use crate::provider::PlannerProvider;
use crate::types::{CriticResult, PlanResult, PlannerContext};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use surveyor_adapters::AdapterSummary;
use surveyor_core::{new_id, PlannerTelemetry, Result, WorkflowDefinition};

pub const PROVIDER_ID: &str = "local.heuristic";

const ASSESSMENT_KEYWORDS: [&str; 6] =
    ["assessment", "analyze", "analysis", "find issues", "report", "audit"];
const DISCOVERY_KEYWORDS: [&str; 7] = [
    "web discovery",
    "web surface",
    "surface",
    "urls",
    "url discovery",
    "discover urls",
    "crawl",
];

pub struct LocalPlannerProvider {
    prompt_version: String,
}

impl Default for LocalPlannerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPlannerProvider {
    pub fn new() -> Self {
        Self { prompt_version: "planner-v1".into() }
    }
}

#[async_trait]
impl PlannerProvider for LocalPlannerProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Local Heuristic Planner"
    }

    fn configure(&mut self, settings: &Value) {
        if let Some(version) = settings.get("prompt_version").and_then(Value::as_str) {
            self.prompt_version = version.to_string();
        }
    }

    async fn plan(&self, context: &PlannerContext) -> Result<PlanResult> {
        let workflow = build_workflow(context);
        Ok(PlanResult {
            workflow_json: serde_json::to_string_pretty(&workflow)?,
            telemetry: Some(PlannerTelemetry {
                provider_id: PROVIDER_ID.into(),
                model_name: Some("heuristic".into()),
                prompt_version: Some(self.prompt_version.clone()),
                latency_ms: None,
                tokens_in: None,
                tokens_out: None,
            }),
        })
    }

    async fn critic(&self, _context: &PlannerContext, workflow_json: &str) -> Result<CriticResult> {
        match serde_json::from_str::<Value>(workflow_json) {
            Ok(parsed) if parsed.get("steps").map_or(false, Value::is_array) => {
                Ok(CriticResult::pass())
            }
            Ok(_) => Ok(CriticResult::veto(vec![
                "workflow.steps must be an array".into(),
            ])),
            Err(_) => Ok(CriticResult::veto(vec![
                "workflow_json is not valid JSON".into(),
            ])),
        }
    }
}

fn build_workflow(context: &PlannerContext) -> WorkflowDefinition {
    let target = context.mission_manifest.scope_targets.first().cloned();
    let find = |id: &str| {
        context
            .adapter_capabilities
            .iter()
            .find(|summary| summary.id == id)
    };
    let discover = find(surveyor_adapters::builtin::discover::ADAPTER_ID);
    let candidates = find(surveyor_adapters::builtin::candidates::ADAPTER_ID);
    let triage = find(surveyor_adapters::builtin::triage::ADAPTER_ID);
    let report = find(surveyor_adapters::builtin::report::ADAPTER_ID);

    let text = context.message.content.to_lowercase();
    let wants_assessment = ASSESSMENT_KEYWORDS.iter().any(|k| text.contains(k));
    let wants_discovery = DISCOVERY_KEYWORDS.iter().any(|k| text.contains(k));
    let has_pipeline = candidates.is_some() && triage.is_some() && report.is_some();

    let mut steps: Vec<Value> = Vec::new();
    if let (true, true, Some(target)) = (wants_assessment, has_pipeline, target.as_ref()) {
        let mut index = 0usize;
        let mut next_id = move || {
            index += 1;
            format!("step-{index}")
        };
        if let Some(discover) = discover {
            steps.push(step(
                &next_id(),
                discover,
                json!({ "web_surface.json": {} }),
                json!({ "target_url": target }),
            ));
        }
        if let (Some(candidates), Some(triage), Some(report)) = (candidates, triage, report) {
            steps.push(step(
                &next_id(),
                candidates,
                json!({ "findings_candidates.json": {} }),
                json!({
                    "target": target,
                    "ruleset": "baseline",
                    "max_candidates": 50,
                    "include_kb_refs": true
                }),
            ));
            steps.push(step(
                &next_id(),
                triage,
                json!({ "findings_triaged.json": {} }),
                json!({ "triage_mode": "balanced", "max_kept": 30 }),
            ));
            steps.push(step(
                &next_id(),
                report,
                json!({ "report.json": {} }),
                json!({
                    "template": "default",
                    "include_evidence_links": true,
                    "include_kb_citations": true
                }),
            ));
        }
    } else if let (true, Some(discover), Some(target)) = (wants_discovery, discover, target.as_ref())
    {
        steps.push(step(
            "step-1",
            discover,
            json!({ "web_surface.json": {} }),
            json!({ "target_url": target }),
        ));
    }

    let mut definition = Map::new();
    definition.insert("workflow_id".into(), json!(new_id()));
    definition.insert("project_id".into(), json!(context.project_id));
    if let Some(chat_id) = &context.chat_id {
        definition.insert("chat_id".into(), json!(chat_id));
    }
    definition.insert(
        "scope".into(),
        json!({ "targets": context.mission_manifest.scope_targets }),
    );
    definition.insert("steps".into(), Value::Array(steps));
    serde_json::from_value(Value::Object(definition)).unwrap_or_else(|_| {
        WorkflowDefinition::empty(
            Some(context.project_id.clone()),
            context.chat_id.clone(),
            context.mission_manifest.scope_targets.clone(),
        )
    })
}

fn step(id: &str, adapter: &AdapterSummary, outputs: Value, params: Value) -> Value {
    json!({
        "id": id,
        "adapter": adapter.id,
        "category": adapter.category,
        "risk": adapter.risk_default,
        "inputs": Map::<String, Value>::new(),
        "outputs": outputs,
        "limits": {},
        "params": params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlannerMessage;
    use surveyor_core::MissionManifest;

    fn context(message: &str, scope: Vec<String>) -> PlannerContext {
        let registry = surveyor_adapters::create_default_registry();
        PlannerContext {
            project_id: "p1".into(),
            chat_id: Some("c1".into()),
            message: PlannerMessage::user(message),
            mission_manifest: MissionManifest {
                mission_id: "m1".into(),
                chat_id: "c1".into(),
                objective: message.into(),
                scope_targets: scope,
                constraints: vec![],
                success_criteria: vec![],
                notes: None,
                created_at: surveyor_core::now(),
            },
            adapter_capabilities: surveyor_adapters::summarize_all(&registry.list(None)),
            artifacts: vec![],
            retrieved_snippets: vec![],
        }
    }

    #[tokio::test]
    async fn assessment_message_plans_four_steps() {
        let provider = LocalPlannerProvider::new();
        let ctx = context(
            "run an assessment of https://example.com",
            vec!["https://example.com".into()],
        );
        let result = provider.plan(&ctx).await.expect("plan");
        let workflow: WorkflowDefinition =
            serde_json::from_str(&result.workflow_json).expect("workflow json");
        assert_eq!(workflow.steps.len(), 4);
        assert_eq!(workflow.steps[0].adapter, "web.surface.discover.http");
        assert_eq!(workflow.steps[3].adapter, "report.generate.markdown");
        assert_eq!(workflow.steps[0].id, "step-1");
        assert_eq!(workflow.steps[3].id, "step-4");
    }

    #[tokio::test]
    async fn surface_message_plans_single_step() {
        let provider = LocalPlannerProvider::new();
        let ctx = context(
            "map the web surface of the target",
            vec!["https://example.com".into()],
        );
        let result = provider.plan(&ctx).await.expect("plan");
        let workflow: WorkflowDefinition =
            serde_json::from_str(&result.workflow_json).expect("workflow json");
        assert_eq!(workflow.steps.len(), 1);
        assert_eq!(workflow.steps[0].adapter, "web.surface.discover.http");
    }

    #[tokio::test]
    async fn unmatched_intent_plans_empty_workflow() {
        let provider = LocalPlannerProvider::new();
        let ctx = context("hello", vec!["https://example.com".into()]);
        let result = provider.plan(&ctx).await.expect("plan");
        let workflow: WorkflowDefinition =
            serde_json::from_str(&result.workflow_json).expect("workflow json");
        assert!(workflow.steps.is_empty());
    }

    #[tokio::test]
    async fn no_scope_target_means_empty_workflow() {
        let provider = LocalPlannerProvider::new();
        let ctx = context("run an assessment of my site", vec![]);
        let result = provider.plan(&ctx).await.expect("plan");
        let workflow: WorkflowDefinition =
            serde_json::from_str(&result.workflow_json).expect("workflow json");
        assert!(workflow.steps.is_empty());
    }

    #[tokio::test]
    async fn critic_rejects_non_json() {
        let provider = LocalPlannerProvider::new();
        let ctx = context("hello", vec![]);
        let result = provider.critic(&ctx, "not json").await.expect("critic");
        assert!(!result.ok);
    }
}
