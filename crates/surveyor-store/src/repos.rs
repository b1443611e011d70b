//! Repository traits
//!
//! One trait per record family, keyed by the ids in surveyor-core. Methods
//! are synchronous; implementations serialize writes at the storage
//! boundary so concurrent run tasks can share one store.

use std::sync::Arc;
use surveyor_core::{
    Artifact, Chat, EvidenceRecord, MissionManifest, Project, Run, RunEvent, RunLineage,
    RunStatus, RunStep, TrustState,
};

pub trait ProjectsRepo: Send + Sync {
    fn create(&self, name: &str, root_path: &str) -> Project;
    fn get(&self, project_id: &str) -> Option<Project>;
    fn get_by_root_path(&self, root_path: &str) -> Option<Project>;
    fn list(&self) -> Vec<Project>;
}

pub trait ChatsRepo: Send + Sync {
    fn create(&self, project_id: &str, title: &str) -> Chat;
    fn get(&self, chat_id: &str) -> Option<Chat>;
    fn list_by_project(&self, project_id: &str) -> Vec<Chat>;
}

pub trait MissionsRepo: Send + Sync {
    fn create(&self, manifest: MissionManifest) -> MissionManifest;
    fn get_by_chat(&self, chat_id: &str) -> Option<MissionManifest>;
    /// Replace the content of an existing manifest. The mission_id and
    /// chat_id of the stored record are preserved.
    fn update(&self, chat_id: &str, manifest: MissionManifest) -> Option<MissionManifest>;
}

pub struct NewRun {
    pub project_id: String,
    pub chat_id: Option<String>,
    pub workflow_id: String,
    pub workflow_json: String,
    pub status: RunStatus,
    pub lineage: Option<RunLineage>,
    pub planner: Option<surveyor_core::PlannerTelemetry>,
}

pub struct RunStatusUpdate {
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error: Option<String>,
}

impl RunStatusUpdate {
    pub fn none() -> Self {
        Self {
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn finished() -> Self {
        Self {
            started_at: None,
            finished_at: Some(surveyor_core::now()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            started_at: None,
            finished_at: Some(surveyor_core::now()),
            error: Some(error.into()),
        }
    }
}

pub trait RunsRepo: Send + Sync {
    fn create(&self, input: NewRun) -> Run;
    fn get(&self, run_id: &str) -> Option<Run>;
    fn list_by_project(&self, project_id: &str) -> Vec<Run>;
    fn update_status(&self, run_id: &str, status: RunStatus, update: RunStatusUpdate)
        -> Option<Run>;
}

pub struct NewRunStep {
    pub run_id: String,
    pub step_id: String,
    pub adapter: String,
    pub category: String,
    pub risk: String,
    pub inputs: Option<serde_json::Value>,
    pub outputs: Option<serde_json::Value>,
    pub params: Option<serde_json::Value>,
}

pub trait StepsRepo: Send + Sync {
    fn create(&self, input: NewRunStep) -> RunStep;
    fn get(&self, id: &str) -> Option<RunStep>;
    fn list_by_run(&self, run_id: &str) -> Vec<RunStep>;
    fn update_status(
        &self,
        id: &str,
        status: RunStatus,
        outputs: Option<serde_json::Value>,
    ) -> Option<RunStep>;
}

pub struct NewArtifact {
    pub project_id: String,
    pub run_id: Option<String>,
    pub step_id: Option<String>,
    pub chat_id: Option<String>,
    pub name: String,
    pub hash: String,
    pub path: String,
    pub media_type: Option<String>,
    pub size_bytes: u64,
    pub trust_state: TrustState,
    pub raw_path: Option<String>,
}

#[derive(Default, Clone)]
pub struct ArtifactFilter {
    pub project_id: Option<String>,
    pub run_id: Option<String>,
    pub chat_id: Option<String>,
}

pub trait ArtifactsRepo: Send + Sync {
    fn create(&self, input: NewArtifact) -> Artifact;
    fn get(&self, artifact_id: &str) -> Option<Artifact>;
    fn list(&self, filter: &ArtifactFilter) -> Vec<Artifact>;
    /// Rewrite hash/size/trust after an explicit human edit.
    fn update_content(
        &self,
        artifact_id: &str,
        hash: &str,
        size_bytes: u64,
        trust_state: TrustState,
    ) -> Option<Artifact>;
    fn delete(&self, artifact_id: &str) -> bool;
}

pub struct NewEvidence {
    pub project_id: String,
    pub run_id: Option<String>,
    pub step_id: Option<String>,
    pub chat_id: Option<String>,
    pub artifact_id: String,
    pub kind: String,
    pub path: String,
    pub description: Option<String>,
    pub hash: Option<String>,
    pub media_type: Option<String>,
    pub size_bytes: Option<u64>,
}

pub trait EvidenceRepo: Send + Sync {
    fn create(&self, input: NewEvidence) -> EvidenceRecord;
    fn list_by_artifact(&self, artifact_id: &str) -> Vec<EvidenceRecord>;
}

/// Append-only event log; the durable source of truth subscribers also
/// observe live. Append order per run id is the delivery order.
pub trait RunEventsRepo: Send + Sync {
    fn append(&self, event: &RunEvent);
    fn list_by_run(&self, run_id: &str) -> Vec<RunEvent>;
}

/// The full persistence collaborator handed to the engine.
#[derive(Clone)]
pub struct Repos {
    pub projects: Arc<dyn ProjectsRepo>,
    pub chats: Arc<dyn ChatsRepo>,
    pub missions: Arc<dyn MissionsRepo>,
    pub runs: Arc<dyn RunsRepo>,
    pub steps: Arc<dyn StepsRepo>,
    pub artifacts: Arc<dyn ArtifactsRepo>,
    pub evidence: Arc<dyn EvidenceRepo>,
    pub run_events: Arc<dyn RunEventsRepo>,
}

impl Repos {
    /// All repositories backed by one shared in-memory store.
    pub fn in_memory() -> Self {
        let store = Arc::new(crate::memory::MemoryStore::new());
        Self {
            projects: store.clone(),
            chats: store.clone(),
            missions: store.clone(),
            runs: store.clone(),
            steps: store.clone(),
            artifacts: store.clone(),
            evidence: store.clone(),
            run_events: store,
        }
    }
}
