//! Hosted planner provider
//!
//! Delegates planning to an external HTTP service. The service receives
//! the full planning context and must answer with a single self-contained
//! JSON workflow document. Critic calls are lenient: any transport or
//! payload problem counts as a pass, the schema validation downstream is
//! the real gate.

use crate::provider::PlannerProvider;
use crate::types::{CriticResult, PlanResult, PlannerContext};
use async_trait::async_trait;
use serde_json::{json, Value};
use surveyor_core::{Error, Result};

pub const PROVIDER_ID: &str = "hosted.http";

#[derive(Default)]
pub struct HostedPlannerProvider {
    endpoint: Option<String>,
    api_key: Option<String>,
    model_name: Option<String>,
    prompt_version: Option<String>,
    client: reqwest::Client,
}

impl HostedPlannerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn request(&self, url: &str, body: &Value) -> reqwest::RequestBuilder {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }
}

#[async_trait]
impl PlannerProvider for HostedPlannerProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Hosted Planner Provider"
    }

    fn configure(&mut self, settings: &Value) {
        let read = |key: &str| settings.get(key).and_then(Value::as_str).map(str::to_string);
        if let Some(endpoint) = read("endpoint") {
            self.endpoint = Some(endpoint);
        }
        if let Some(api_key) = read("api_key") {
            self.api_key = Some(api_key);
        }
        if let Some(model_name) = read("model_name") {
            self.model_name = Some(model_name);
        }
        if let Some(prompt_version) = read("prompt_version") {
            self.prompt_version = Some(prompt_version);
        }
    }

    async fn plan(&self, context: &PlannerContext) -> Result<PlanResult> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::validation("hosted planner endpoint not configured"))?;
        let body = json!({
            "context": context,
            "model_name": self.model_name,
            "prompt_version": self.prompt_version,
        });
        let response = self
            .request(endpoint, &body)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("hosted planner request: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "hosted planner error {}",
                response.status().as_u16()
            )));
        }
        let payload: PlanResult = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("hosted planner payload: {e}")))?;
        ensure_json_only(&payload.workflow_json)?;
        Ok(payload)
    }

    async fn critic(&self, context: &PlannerContext, workflow_json: &str) -> Result<CriticResult> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Ok(CriticResult::pass());
        };
        let body = json!({ "context": context, "workflow_json": workflow_json });
        let response = match self.request(&format!("{endpoint}/critic"), &body).send().await {
            Ok(response) if response.status().is_success() => response,
            _ => return Ok(CriticResult::pass()),
        };
        match response.json::<CriticResult>().await {
            Ok(result) => Ok(result),
            Err(_) => Ok(CriticResult::pass()),
        }
    }
}

fn ensure_json_only(value: &str) -> Result<()> {
    let trimmed = value.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return Err(Error::validation("planner output must be JSON-only"));
    }
    serde_json::from_str::<Value>(trimmed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_only_rejects_prose() {
        assert!(ensure_json_only("Sure! {\"steps\": []}").is_err());
        assert!(ensure_json_only("{\"steps\": []} done").is_err());
        assert!(ensure_json_only("{ not json }").is_err());
        assert!(ensure_json_only("  {\"steps\": []}  ").is_ok());
    }

    #[tokio::test]
    async fn unconfigured_plan_fails() {
        let provider = HostedPlannerProvider::new();
        let ctx = crate::types::PlannerContext {
            project_id: "p1".into(),
            chat_id: None,
            message: crate::types::PlannerMessage::user("hello"),
            mission_manifest: surveyor_core::MissionManifest {
                mission_id: "m1".into(),
                chat_id: "c1".into(),
                objective: String::new(),
                scope_targets: vec![],
                constraints: vec![],
                success_criteria: vec![],
                notes: None,
                created_at: surveyor_core::now(),
            },
            adapter_capabilities: vec![],
            artifacts: vec![],
            retrieved_snippets: vec![],
        };
        assert!(provider.plan(&ctx).await.is_err());
        // Critic without an endpoint is lenient.
        let critic = provider.critic(&ctx, "{}").await.expect("critic");
        assert!(critic.ok);
    }
}
