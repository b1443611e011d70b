//! In-memory store
//!
//! DashMap-keyed records plus a mutex-guarded append-only event log. Write
//! serialization happens per map shard; the event log lock preserves the
//! exact append order the run manager produced.

use crate::repos::{
    ArtifactFilter, ArtifactsRepo, ChatsRepo, EvidenceRepo, MissionsRepo, NewArtifact,
    NewEvidence, NewRun, NewRunStep, ProjectsRepo, RunEventsRepo, RunStatusUpdate, RunsRepo,
    StepsRepo,
};
use dashmap::DashMap;
use std::sync::Mutex;
use surveyor_core::{
    new_id, now, Artifact, Chat, EvidenceRecord, MissionManifest, Project, Run, RunEvent,
    RunStatus, RunStep, TrustState,
};

#[derive(Default)]
pub struct MemoryStore {
    projects: DashMap<String, Project>,
    chats: DashMap<String, Chat>,
    missions: DashMap<String, MissionManifest>,
    runs: DashMap<String, Run>,
    steps: DashMap<String, RunStep>,
    artifacts: DashMap<String, Artifact>,
    evidence: DashMap<String, EvidenceRecord>,
    events: Mutex<Vec<RunEvent>>,
    // Creation order for stable list results.
    insertion: Mutex<Vec<(Kind, String)>>,
}

#[derive(Clone, Copy, PartialEq)]
enum Kind {
    Project,
    Chat,
    Run,
    Step,
    Artifact,
    Evidence,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_insert(&self, kind: Kind, id: &str) {
        self.insertion
            .lock()
            .unwrap()
            .push((kind, id.to_string()));
    }

    fn ordered_ids(&self, kind: Kind) -> Vec<String> {
        self.insertion
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect()
    }
}

impl ProjectsRepo for MemoryStore {
    fn create(&self, name: &str, root_path: &str) -> Project {
        let project = Project {
            id: new_id(),
            name: name.to_string(),
            root_path: root_path.to_string(),
            created_at: now(),
        };
        self.projects.insert(project.id.clone(), project.clone());
        self.record_insert(Kind::Project, &project.id);
        project
    }

    fn get(&self, project_id: &str) -> Option<Project> {
        self.projects.get(project_id).map(|p| p.clone())
    }

    fn get_by_root_path(&self, root_path: &str) -> Option<Project> {
        self.projects
            .iter()
            .find(|entry| entry.root_path == root_path)
            .map(|entry| entry.clone())
    }

    fn list(&self) -> Vec<Project> {
        self.ordered_ids(Kind::Project)
            .iter()
            .filter_map(|id| ProjectsRepo::get(self, id))
            .collect()
    }
}

impl ChatsRepo for MemoryStore {
    fn create(&self, project_id: &str, title: &str) -> Chat {
        let chat = Chat {
            id: new_id(),
            project_id: project_id.to_string(),
            title: title.to_string(),
            created_at: now(),
        };
        self.chats.insert(chat.id.clone(), chat.clone());
        self.record_insert(Kind::Chat, &chat.id);
        chat
    }

    fn get(&self, chat_id: &str) -> Option<Chat> {
        self.chats.get(chat_id).map(|c| c.clone())
    }

    fn list_by_project(&self, project_id: &str) -> Vec<Chat> {
        self.ordered_ids(Kind::Chat)
            .iter()
            .filter_map(|id| self.chats.get(id).map(|c| c.clone()))
            .filter(|c| c.project_id == project_id)
            .collect()
    }
}

impl MissionsRepo for MemoryStore {
    fn create(&self, manifest: MissionManifest) -> MissionManifest {
        self.missions
            .insert(manifest.chat_id.clone(), manifest.clone());
        manifest
    }

    fn get_by_chat(&self, chat_id: &str) -> Option<MissionManifest> {
        self.missions.get(chat_id).map(|m| m.clone())
    }

    fn update(&self, chat_id: &str, manifest: MissionManifest) -> Option<MissionManifest> {
        let mut entry = self.missions.get_mut(chat_id)?;
        let updated = MissionManifest {
            mission_id: entry.mission_id.clone(),
            chat_id: entry.chat_id.clone(),
            created_at: entry.created_at,
            ..manifest
        };
        *entry = updated.clone();
        Some(updated)
    }
}

impl RunsRepo for MemoryStore {
    fn create(&self, input: NewRun) -> Run {
        let run = Run {
            id: new_id(),
            project_id: input.project_id,
            chat_id: input.chat_id,
            workflow_id: input.workflow_id,
            workflow_json: input.workflow_json,
            status: input.status,
            created_at: now(),
            started_at: Some(now()),
            finished_at: None,
            error: None,
            lineage: input.lineage,
            planner: input.planner,
        };
        self.runs.insert(run.id.clone(), run.clone());
        self.record_insert(Kind::Run, &run.id);
        run
    }

    fn get(&self, run_id: &str) -> Option<Run> {
        self.runs.get(run_id).map(|r| r.clone())
    }

    fn list_by_project(&self, project_id: &str) -> Vec<Run> {
        self.ordered_ids(Kind::Run)
            .iter()
            .filter_map(|id| self.runs.get(id).map(|r| r.clone()))
            .filter(|r| r.project_id == project_id)
            .collect()
    }

    fn update_status(
        &self,
        run_id: &str,
        status: RunStatus,
        update: RunStatusUpdate,
    ) -> Option<Run> {
        let mut entry = self.runs.get_mut(run_id)?;
        entry.status = status;
        if let Some(started_at) = update.started_at {
            entry.started_at = Some(started_at);
        }
        if let Some(finished_at) = update.finished_at {
            entry.finished_at = Some(finished_at);
        }
        if let Some(error) = update.error {
            entry.error = Some(error);
        }
        Some(entry.clone())
    }
}

impl StepsRepo for MemoryStore {
    fn create(&self, input: NewRunStep) -> RunStep {
        let step = RunStep {
            id: new_id(),
            run_id: input.run_id,
            step_id: input.step_id,
            status: RunStatus::Running,
            adapter: input.adapter,
            category: input.category,
            risk: input.risk,
            created_at: now(),
            started_at: Some(now()),
            finished_at: None,
            inputs: input.inputs,
            outputs: input.outputs,
            params: input.params,
        };
        self.steps.insert(step.id.clone(), step.clone());
        self.record_insert(Kind::Step, &step.id);
        step
    }

    fn get(&self, id: &str) -> Option<RunStep> {
        self.steps.get(id).map(|s| s.clone())
    }

    fn list_by_run(&self, run_id: &str) -> Vec<RunStep> {
        self.ordered_ids(Kind::Step)
            .iter()
            .filter_map(|id| self.steps.get(id).map(|s| s.clone()))
            .filter(|s| s.run_id == run_id)
            .collect()
    }

    fn update_status(
        &self,
        id: &str,
        status: RunStatus,
        outputs: Option<serde_json::Value>,
    ) -> Option<RunStep> {
        let mut entry = self.steps.get_mut(id)?;
        entry.status = status;
        if status.is_terminal() {
            entry.finished_at = Some(now());
        }
        if outputs.is_some() {
            entry.outputs = outputs;
        }
        Some(entry.clone())
    }
}

impl ArtifactsRepo for MemoryStore {
    fn create(&self, input: NewArtifact) -> Artifact {
        let artifact = Artifact {
            id: new_id(),
            project_id: input.project_id,
            run_id: input.run_id,
            step_id: input.step_id,
            chat_id: input.chat_id,
            name: input.name,
            hash: input.hash,
            path: input.path,
            media_type: input.media_type,
            size_bytes: input.size_bytes,
            trust_state: input.trust_state,
            raw_path: input.raw_path,
            created_at: now(),
        };
        self.artifacts.insert(artifact.id.clone(), artifact.clone());
        self.record_insert(Kind::Artifact, &artifact.id);
        artifact
    }

    fn get(&self, artifact_id: &str) -> Option<Artifact> {
        self.artifacts.get(artifact_id).map(|a| a.clone())
    }

    fn list(&self, filter: &ArtifactFilter) -> Vec<Artifact> {
        self.ordered_ids(Kind::Artifact)
            .iter()
            .filter_map(|id| self.artifacts.get(id).map(|a| a.clone()))
            .filter(|a| {
                filter
                    .project_id
                    .as_ref()
                    .map_or(true, |p| &a.project_id == p)
                    && filter.run_id.as_ref().map_or(true, |r| a.run_id.as_ref() == Some(r))
                    && filter
                        .chat_id
                        .as_ref()
                        .map_or(true, |c| a.chat_id.as_ref() == Some(c))
            })
            .collect()
    }

    fn update_content(
        &self,
        artifact_id: &str,
        hash: &str,
        size_bytes: u64,
        trust_state: TrustState,
    ) -> Option<Artifact> {
        let mut entry = self.artifacts.get_mut(artifact_id)?;
        entry.hash = hash.to_string();
        entry.size_bytes = size_bytes;
        entry.trust_state = trust_state;
        Some(entry.clone())
    }

    fn delete(&self, artifact_id: &str) -> bool {
        self.artifacts.remove(artifact_id).is_some()
    }
}

impl EvidenceRepo for MemoryStore {
    fn create(&self, input: NewEvidence) -> EvidenceRecord {
        let record = EvidenceRecord {
            id: new_id(),
            project_id: input.project_id,
            run_id: input.run_id,
            step_id: input.step_id,
            chat_id: input.chat_id,
            artifact_id: input.artifact_id,
            kind: input.kind,
            path: input.path,
            description: input.description,
            hash: input.hash,
            media_type: input.media_type,
            size_bytes: input.size_bytes,
            created_at: now(),
        };
        self.evidence.insert(record.id.clone(), record.clone());
        self.record_insert(Kind::Evidence, &record.id);
        record
    }

    fn list_by_artifact(&self, artifact_id: &str) -> Vec<EvidenceRecord> {
        self.ordered_ids(Kind::Evidence)
            .iter()
            .filter_map(|id| self.evidence.get(id).map(|e| e.clone()))
            .filter(|e| e.artifact_id == artifact_id)
            .collect()
    }
}

impl RunEventsRepo for MemoryStore {
    fn append(&self, event: &RunEvent) {
        self.events
            .lock()
            .unwrap()
            .push(event.clone());
    }

    fn list_by_run(&self, run_id: &str) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.run_id() == run_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveyor_core::RunEvent;

    #[test]
    fn run_lifecycle_roundtrip() {
        let store = MemoryStore::new();
        let run = RunsRepo::create(
            &store,
            NewRun {
                project_id: "p1".into(),
                chat_id: None,
                workflow_id: "wf".into(),
                workflow_json: "{}".into(),
                status: RunStatus::Running,
                lineage: None,
                planner: None,
            },
        );
        let updated = RunsRepo::update_status(
            &store,
            &run.id,
            RunStatus::Succeeded,
            RunStatusUpdate::finished(),
        )
        .unwrap();
        assert_eq!(updated.status, RunStatus::Succeeded);
        assert!(updated.finished_at.is_some());
    }

    #[test]
    fn event_log_preserves_order() {
        let store = MemoryStore::new();
        for step in ["a", "b", "c"] {
            store.append(&RunEvent::StepStarted {
                run_id: "r1".into(),
                step_id: step.into(),
                timestamp: now(),
            });
        }
        let events = RunEventsRepo::list_by_run(&store, "r1");
        let ids: Vec<_> = events
            .iter()
            .map(|e| match e {
                RunEvent::StepStarted { step_id, .. } => step_id.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn mission_update_preserves_identity() {
        let store = MemoryStore::new();
        let mission = MissionsRepo::create(
            &store,
            MissionManifest {
                mission_id: "m1".into(),
                chat_id: "chat".into(),
                objective: "old".into(),
                scope_targets: vec![],
                constraints: vec![],
                success_criteria: vec![],
                notes: None,
                created_at: now(),
            },
        );
        let updated = store
            .update(
                "chat",
                MissionManifest {
                    mission_id: "ignored".into(),
                    chat_id: "ignored".into(),
                    objective: "new".into(),
                    scope_targets: vec!["https://example.com".into()],
                    constraints: vec![],
                    success_criteria: vec![],
                    notes: None,
                    created_at: now(),
                },
            )
            .unwrap();
        assert_eq!(updated.mission_id, mission.mission_id);
        assert_eq!(updated.objective, "new");
    }
}
