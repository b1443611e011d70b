//! Planner service
//!
//! Orchestrates context assembly, provider selection, output validation,
//! and the optional critic pass. The service never fails closed: any
//! provider error, malformed document, or critic veto degrades to an
//! empty workflow so the caller always gets a run to look at. Telemetry
//! is returned in every case.

use crate::context::{build_planner_context, ContextInput};
use crate::local;
use crate::provider::PlannerProvider;
use crate::types::{PlannerContext, PlannerMessage};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use surveyor_adapters::AdapterRegistry;
use surveyor_core::{
    validate_workflow, MissionManifest, PlannerTelemetry, WorkflowDefinition,
};
use surveyor_store::{DocsSearch, Repos};

pub struct PlannerServiceConfig {
    pub selected_provider_id: String,
    pub prompt_version: String,
    pub enable_critic: bool,
    pub provider_settings: Option<Value>,
}

impl Default for PlannerServiceConfig {
    fn default() -> Self {
        Self {
            selected_provider_id: local::PROVIDER_ID.into(),
            prompt_version: "planner-v1".into(),
            enable_critic: true,
            provider_settings: None,
        }
    }
}

pub struct PlanRequest {
    pub project_id: String,
    pub chat_id: Option<String>,
    pub message: PlannerMessage,
    pub mission: MissionManifest,
    pub project_root: Option<String>,
}

pub struct PlanOutcome {
    pub workflow: WorkflowDefinition,
    pub telemetry: PlannerTelemetry,
}

pub struct PlannerService {
    providers: HashMap<String, Box<dyn PlannerProvider>>,
    registry: Arc<AdapterRegistry>,
    docs: Arc<dyn DocsSearch>,
    repos: Repos,
    config: PlannerServiceConfig,
}

impl PlannerService {
    pub fn new(
        mut providers: Vec<Box<dyn PlannerProvider>>,
        registry: Arc<AdapterRegistry>,
        docs: Arc<dyn DocsSearch>,
        repos: Repos,
        config: PlannerServiceConfig,
    ) -> Self {
        if let Some(settings) = &config.provider_settings {
            for provider in providers.iter_mut() {
                if provider.id() == config.selected_provider_id {
                    provider.configure(settings);
                }
            }
        }
        let providers = providers
            .into_iter()
            .map(|provider| (provider.id().to_string(), provider))
            .collect();
        Self { providers, registry, docs, repos, config }
    }

    pub async fn plan_for_message(&self, request: PlanRequest) -> PlanOutcome {
        let context = build_planner_context(
            ContextInput {
                project_id: &request.project_id,
                chat_id: request.chat_id.as_deref(),
                message: request.message,
                mission: request.mission,
                project_root: request.project_root.as_deref(),
            },
            &self.repos,
            &self.docs,
            &self.registry,
        );

        let provider = self
            .providers
            .get(&self.config.selected_provider_id)
            .or_else(|| self.providers.get(local::PROVIDER_ID));
        let Some(provider) = provider else {
            return PlanOutcome {
                workflow: empty_workflow(&context),
                telemetry: PlannerTelemetry {
                    provider_id: "unknown".into(),
                    model_name: None,
                    prompt_version: Some(self.config.prompt_version.clone()),
                    latency_ms: None,
                    tokens_in: None,
                    tokens_out: None,
                },
            };
        };

        let start = Instant::now();
        let result = match provider.plan(&context).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(provider_id = provider.id(), "planner provider failed: {e}");
                return PlanOutcome {
                    workflow: empty_workflow(&context),
                    telemetry: base_telemetry(provider.id(), &self.config.prompt_version, start),
                };
            }
        };

        let mut telemetry = result.telemetry.unwrap_or_else(|| PlannerTelemetry {
            provider_id: provider.id().into(),
            model_name: None,
            prompt_version: None,
            latency_ms: None,
            tokens_in: None,
            tokens_out: None,
        });
        if telemetry.prompt_version.is_none() {
            telemetry.prompt_version = Some(self.config.prompt_version.clone());
        }
        telemetry.latency_ms = Some(start.elapsed().as_millis() as u64);

        let workflow = match parse_workflow(&result.workflow_json) {
            Ok(workflow) => workflow,
            Err(e) => {
                tracing::warn!(provider_id = provider.id(), "planner output rejected: {e}");
                return PlanOutcome { workflow: empty_workflow(&context), telemetry };
            }
        };

        if self.config.enable_critic {
            match provider.critic(&context, &result.workflow_json).await {
                Ok(critic) if !critic.ok => {
                    tracing::warn!(
                        provider_id = provider.id(),
                        "planner critic rejected workflow: {}",
                        critic.issues.join("; ")
                    );
                    return PlanOutcome { workflow: empty_workflow(&context), telemetry };
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(provider_id = provider.id(), "planner critic failed: {e}");
                    return PlanOutcome { workflow: empty_workflow(&context), telemetry };
                }
            }
        }

        PlanOutcome { workflow, telemetry }
    }
}

fn base_telemetry(provider_id: &str, prompt_version: &str, start: Instant) -> PlannerTelemetry {
    PlannerTelemetry {
        provider_id: provider_id.into(),
        model_name: None,
        prompt_version: Some(prompt_version.into()),
        latency_ms: Some(start.elapsed().as_millis() as u64),
        tokens_in: None,
        tokens_out: None,
    }
}

fn parse_workflow(workflow_json: &str) -> surveyor_core::Result<WorkflowDefinition> {
    let workflow = surveyor_core::parse_workflow_json(workflow_json)?;
    validate_workflow(&workflow)?;
    Ok(workflow)
}

fn empty_workflow(context: &PlannerContext) -> WorkflowDefinition {
    WorkflowDefinition::empty(
        Some(context.project_id.clone()),
        context.chat_id.clone(),
        context.mission_manifest.scope_targets.clone(),
    )
}
