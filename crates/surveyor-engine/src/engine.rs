//! Engine facade
//!
//! Owns the wiring between the planner, the run manager, the adapter
//! registry, the event hub, and the persistence collaborator. This is
//! the surface a front end talks to.

use crate::config::EngineConfig;
use crate::event_hub::EventHub;
use crate::executor::StepExecutor;
use crate::run_manager::RunManager;
use serde_json::Value;
use std::sync::Arc;
use surveyor_adapters::{validate_known_content, AdapterDiagnostics, AdapterManifest, AdapterRegistry};
use surveyor_core::hash::sha256_hex;
use surveyor_core::{
    new_id, now, Artifact, Chat, Error, MissionManifest, Project, Result, Run, RunEvent, RunStep,
    TrustState, WorkflowDefinition,
};
use surveyor_planner::{
    HostedPlannerProvider, LocalPlannerProvider, PlanRequest, PlannerMessage, PlannerProvider,
    PlannerService,
};
use surveyor_store::{ArtifactFilter, DocSnippet, DocsSearch, Repos, SearchFilter};
use tokio::sync::mpsc;

/// Mission fields carried on a chat's first user message.
#[derive(Clone, Debug, Default)]
pub struct MessageMetadata {
    pub objective: Option<String>,
    pub scope_targets: Vec<String>,
    pub constraints: Vec<String>,
    pub success_criteria: Vec<String>,
    pub notes: Option<String>,
}

pub struct Engine {
    repos: Repos,
    registry: Arc<AdapterRegistry>,
    docs: Arc<dyn DocsSearch>,
    hub: Arc<EventHub>,
    runs: RunManager,
    planner: PlannerService,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        registry: AdapterRegistry,
        docs: Arc<dyn DocsSearch>,
        repos: Repos,
    ) -> Self {
        let registry = Arc::new(registry);
        let hub = Arc::new(EventHub::new());
        let executor = Arc::new(StepExecutor::new(
            repos.clone(),
            hub.clone(),
            registry.clone(),
            docs.clone(),
            config.retain_untrusted,
        ));
        let runs = RunManager::new(repos.clone(), hub.clone(), executor);
        let providers: Vec<Box<dyn PlannerProvider>> = vec![
            Box::new(LocalPlannerProvider::new()),
            Box::new(HostedPlannerProvider::default()),
        ];
        let planner = PlannerService::new(
            providers,
            registry.clone(),
            docs.clone(),
            repos.clone(),
            config.planner,
        );
        Self {
            repos,
            registry,
            docs,
            hub,
            runs,
            planner,
        }
    }

    // --- Projects and chats ---

    pub fn create_project(&self, name: &str, root_path: &str) -> Project {
        self.repos.projects.create(name, root_path)
    }

    pub fn get_project(&self, project_id: &str) -> Result<Project> {
        self.repos
            .projects
            .get(project_id)
            .ok_or_else(|| Error::not_found(format!("project {project_id}")))
    }

    pub fn list_projects(&self) -> Vec<Project> {
        self.repos.projects.list()
    }

    pub fn create_chat(&self, project_id: &str, title: &str) -> Result<Chat> {
        self.get_project(project_id)?;
        Ok(self.repos.chats.create(project_id, title))
    }

    pub fn list_chats(&self, project_id: &str) -> Vec<Chat> {
        self.repos.chats.list_by_project(project_id)
    }

    // --- Missions ---

    pub fn get_mission(&self, chat_id: &str) -> Option<MissionManifest> {
        self.repos.missions.get_by_chat(chat_id)
    }

    pub fn update_mission(&self, chat_id: &str, manifest: MissionManifest) -> Result<MissionManifest> {
        self.repos
            .missions
            .update(chat_id, manifest)
            .ok_or_else(|| Error::not_found(format!("mission for chat {chat_id}")))
    }

    /// The chat's mission, created lazily from the first message that
    /// carries mission metadata.
    fn ensure_mission(
        &self,
        chat_id: &str,
        message: &str,
        metadata: &MessageMetadata,
    ) -> MissionManifest {
        if let Some(existing) = self.repos.missions.get_by_chat(chat_id) {
            return existing;
        }
        self.repos.missions.create(MissionManifest {
            mission_id: new_id(),
            chat_id: chat_id.to_string(),
            objective: metadata
                .objective
                .clone()
                .unwrap_or_else(|| message.to_string()),
            scope_targets: metadata.scope_targets.clone(),
            constraints: metadata.constraints.clone(),
            success_criteria: metadata.success_criteria.clone(),
            notes: metadata.notes.clone(),
            created_at: now(),
        })
    }

    // --- Planning and runs ---

    /// Plan a workflow for the message and start executing it. The
    /// returned Run is accepted and executing, not complete.
    pub async fn send_message(
        &self,
        project_id: &str,
        chat_id: &str,
        message: &str,
        metadata: MessageMetadata,
    ) -> Result<Run> {
        let project = self.get_project(project_id)?;
        let chat = self
            .repos
            .chats
            .get(chat_id)
            .ok_or_else(|| Error::not_found(format!("chat {chat_id}")))?;
        if chat.project_id != project_id {
            return Err(Error::validation(format!(
                "chat {chat_id} does not belong to project {project_id}"
            )));
        }
        let mission = self.ensure_mission(chat_id, message, &metadata);

        let outcome = self
            .planner
            .plan_for_message(PlanRequest {
                project_id: project_id.to_string(),
                chat_id: Some(chat_id.to_string()),
                message: PlannerMessage::user(message),
                mission,
                project_root: Some(project.root_path.clone()),
            })
            .await;

        let mut workflow = outcome.workflow;
        workflow.project_id.get_or_insert_with(|| project_id.to_string());
        workflow.chat_id.get_or_insert_with(|| chat_id.to_string());
        self.runs
            .start_run(&project, &workflow, None, Some(outcome.telemetry), Vec::new())
    }

    /// Execute a caller-supplied workflow directly, bypassing the planner.
    pub fn start_workflow(&self, project_id: &str, workflow: &WorkflowDefinition) -> Result<Run> {
        let project = self.get_project(project_id)?;
        self.runs.start_run(&project, workflow, None, None, Vec::new())
    }

    pub fn get_run(&self, run_id: &str) -> Result<Run> {
        self.repos
            .runs
            .get(run_id)
            .ok_or_else(|| Error::not_found(format!("run {run_id}")))
    }

    pub fn list_runs(&self, project_id: &str) -> Vec<Run> {
        self.repos.runs.list_by_project(project_id)
    }

    pub fn list_run_steps(&self, run_id: &str) -> Vec<RunStep> {
        self.repos.steps.list_by_run(run_id)
    }

    pub fn cancel_run(&self, run_id: &str) -> Result<Run> {
        self.runs.cancel_run(run_id)
    }

    pub async fn wait_for_run(&self, run_id: &str) -> Result<Run> {
        self.runs.wait_for_run(run_id).await
    }

    pub fn fork_run(&self, run_id: &str, step_id: &str) -> Result<Run> {
        let parent = self.get_run(run_id)?;
        let project = self.get_project(&parent.project_id)?;
        self.runs.fork_run(&project, run_id, step_id)
    }

    pub fn replay_run(&self, run_id: &str) -> Result<Run> {
        let parent = self.get_run(run_id)?;
        let project = self.get_project(&parent.project_id)?;
        self.runs.replay_run(&project, run_id)
    }

    // --- Events ---

    pub fn subscribe(&self, run_id: &str) -> mpsc::UnboundedReceiver<RunEvent> {
        self.hub.subscribe(run_id)
    }

    pub fn list_run_events(&self, run_id: &str) -> Vec<RunEvent> {
        self.repos.run_events.list_by_run(run_id)
    }

    // --- Artifacts ---

    pub fn list_artifacts(&self, filter: &ArtifactFilter) -> Vec<Artifact> {
        self.repos.artifacts.list(filter)
    }

    pub fn get_artifact(&self, artifact_id: &str) -> Result<Artifact> {
        self.repos
            .artifacts
            .get(artifact_id)
            .ok_or_else(|| Error::not_found(format!("artifact {artifact_id}")))
    }

    /// Explicit human edit: back up the current file, rewrite the content,
    /// rehash, and re-check trust against the known content schemas.
    pub fn update_artifact(
        &self,
        artifact_id: &str,
        content: &Value,
        reason: Option<String>,
    ) -> Result<Artifact> {
        let artifact = self.get_artifact(artifact_id)?;

        let current = std::fs::read(&artifact.path)?;
        std::fs::write(format!("{}.bak", artifact.path), &current)?;

        let bytes = serde_json::to_vec_pretty(content)?;
        std::fs::write(&artifact.path, &bytes)?;

        let trust_state = match validate_known_content(&artifact.name, content) {
            Ok(()) => TrustState::Trusted,
            Err(_) => TrustState::Untrusted,
        };
        let updated = self
            .repos
            .artifacts
            .update_content(artifact_id, &sha256_hex(&bytes), bytes.len() as u64, trust_state)
            .ok_or_else(|| Error::not_found(format!("artifact {artifact_id}")))?;

        if let Some(run_id) = &updated.run_id {
            let event = RunEvent::ArtifactEdited {
                run_id: run_id.clone(),
                artifact_id: artifact_id.to_string(),
                reason,
                timestamp: now(),
            };
            self.repos.run_events.append(&event);
            self.hub.emit(&event);
        }
        Ok(updated)
    }

    pub fn delete_artifact(&self, artifact_id: &str) -> Result<()> {
        let artifact = self.get_artifact(artifact_id)?;
        let _ = std::fs::remove_file(&artifact.path);
        self.repos.artifacts.delete(artifact_id);
        Ok(())
    }

    // --- Adapters and docs ---

    pub fn list_adapters(&self, project_root: Option<&str>) -> Vec<AdapterManifest> {
        self.registry.list(project_root)
    }

    pub fn adapter_diagnostics(&self, project_root: Option<&str>) -> AdapterDiagnostics {
        self.registry.diagnostics(project_root)
    }

    pub fn search_docs(&self, query: &str, top_k: usize, filter: &SearchFilter) -> Vec<DocSnippet> {
        self.docs.search(query, top_k, filter)
    }
}
