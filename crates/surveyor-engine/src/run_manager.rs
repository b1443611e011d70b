//! Run lifecycle
//!
//! Each run executes on its own background task bound to a fresh
//! cancellation token. `start_run` persists the Run record and returns it
//! immediately; callers observe progress through the event hub or block
//! on `wait_for_run`. Steps execute strictly in order, each one's
//! produced artifacts joining the set available to the steps after it.
//! The first failure stops the run; there are no retries.

use crate::event_hub::EventHub;
use crate::executor::StepExecutor;
use dashmap::DashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use surveyor_adapters::{known_artifact_types, AdapterArtifact};
use surveyor_core::{
    now, validate_workflow, Error, MissionManifest, PlannerTelemetry, Project, Result, Run,
    RunEvent, RunLineage, RunStatus, WorkflowDefinition,
};
use surveyor_store::{ArtifactFilter, NewRun, NewRunStep, Repos, RunStatusUpdate};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct ActiveRun {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

pub struct RunManager {
    repos: Repos,
    hub: Arc<EventHub>,
    executor: Arc<StepExecutor>,
    active: Arc<DashMap<String, ActiveRun>>,
}

impl RunManager {
    pub fn new(repos: Repos, hub: Arc<EventHub>, executor: Arc<StepExecutor>) -> Self {
        Self {
            repos,
            hub,
            executor,
            active: Arc::new(DashMap::new()),
        }
    }

    /// Accept a workflow for execution. The Run record is created and
    /// persisted before this returns; execution happens on a background
    /// task.
    pub fn start_run(
        &self,
        project: &Project,
        workflow: &WorkflowDefinition,
        lineage: Option<RunLineage>,
        planner: Option<PlannerTelemetry>,
        seed_artifacts: Vec<AdapterArtifact>,
    ) -> Result<Run> {
        validate_workflow(workflow)?;

        let run = self.repos.runs.create(NewRun {
            project_id: project.id.clone(),
            chat_id: workflow.chat_id.clone(),
            workflow_id: workflow.workflow_id.clone(),
            workflow_json: serde_json::to_string(workflow)?,
            status: RunStatus::Running,
            lineage: lineage.clone(),
            planner,
        });

        let cancel = CancellationToken::new();
        // Register before spawning. The task removes its own entry as its
        // last act, so spawning first would let a fast run finish and
        // "remove" an entry that is not there yet, stranding it forever.
        self.active.insert(
            run.id.clone(),
            ActiveRun {
                cancel: cancel.clone(),
                handle: Mutex::new(None),
            },
        );
        let task = RunTask {
            repos: self.repos.clone(),
            hub: self.hub.clone(),
            executor: self.executor.clone(),
            active: self.active.clone(),
            run: run.clone(),
            project: project.clone(),
            workflow: workflow.clone(),
            lineage,
            cancel,
        };
        let handle = tokio::spawn(task.execute(seed_artifacts));
        if let Some(entry) = self.active.get(&run.id) {
            *entry.handle.lock().unwrap() = Some(handle);
        }
        Ok(run)
    }

    /// Trigger cancellation if the run is still executing. Idempotent;
    /// always returns the run's current record.
    pub fn cancel_run(&self, run_id: &str) -> Result<Run> {
        if let Some(entry) = self.active.get(run_id) {
            entry.cancel.cancel();
        }
        self.repos
            .runs
            .get(run_id)
            .ok_or_else(|| Error::not_found(format!("run {run_id}")))
    }

    /// Block until a previously started run reaches a terminal status.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<Run> {
        let handle = self
            .active
            .get(run_id)
            .and_then(|entry| entry.handle.lock().unwrap().take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.repos
            .runs
            .get(run_id)
            .ok_or_else(|| Error::not_found(format!("run {run_id}")))
    }

    /// Branch a new run off `parent_run_id` containing only the steps
    /// after `step_id`, seeded with the parent's artifacts up to and
    /// including that step.
    pub fn fork_run(&self, project: &Project, parent_run_id: &str, step_id: &str) -> Result<Run> {
        let parent = self
            .repos
            .runs
            .get(parent_run_id)
            .ok_or_else(|| Error::not_found(format!("run {parent_run_id}")))?;
        let workflow: WorkflowDefinition = serde_json::from_str(&parent.workflow_json)?;
        validate_workflow(&workflow)?;

        let fork_index = workflow
            .steps
            .iter()
            .position(|step| step.id == step_id)
            .ok_or_else(|| Error::not_found(format!("step {step_id} in run {parent_run_id}")))?;

        let forked = WorkflowDefinition {
            workflow_id: surveyor_core::new_id(),
            project_id: workflow.project_id.clone(),
            chat_id: workflow.chat_id.clone(),
            scope: workflow.scope.clone(),
            steps: workflow.steps[fork_index + 1..].to_vec(),
        };

        let upstream_steps: Vec<&str> = workflow.steps[..=fork_index]
            .iter()
            .map(|step| step.id.as_str())
            .collect();
        let seed = self.seed_from_parent(parent_run_id, &upstream_steps);

        self.start_run(
            project,
            &forked,
            Some(RunLineage::Fork {
                parent_run_id: parent_run_id.to_string(),
                forked_from_step_id: step_id.to_string(),
            }),
            None,
            seed,
        )
    }

    /// Re-execute a run's full stored workflow from scratch as a new run.
    pub fn replay_run(&self, project: &Project, run_id: &str) -> Result<Run> {
        let parent = self
            .repos
            .runs
            .get(run_id)
            .ok_or_else(|| Error::not_found(format!("run {run_id}")))?;
        let workflow: WorkflowDefinition = serde_json::from_str(&parent.workflow_json)?;
        validate_workflow(&workflow)?;

        self.start_run(
            project,
            &workflow,
            Some(RunLineage::Replay {
                replay_of_run_id: run_id.to_string(),
            }),
            None,
            Vec::new(),
        )
    }

    /// Parent artifacts produced by the listed steps, as input refs for
    /// the forked run. The artifact type is inferred from the filename;
    /// files that do not match a known type name cannot satisfy a later
    /// step's declared inputs and are left behind.
    fn seed_from_parent(&self, parent_run_id: &str, step_ids: &[&str]) -> Vec<AdapterArtifact> {
        let known = known_artifact_types();
        self.repos
            .artifacts
            .list(&ArtifactFilter {
                run_id: Some(parent_run_id.to_string()),
                ..ArtifactFilter::default()
            })
            .into_iter()
            .filter(|artifact| {
                artifact
                    .step_id
                    .as_deref()
                    .is_some_and(|id| step_ids.contains(&id))
                    && known.contains(&artifact.name.as_str())
            })
            .map(|artifact| {
                AdapterArtifact::from_path(
                    artifact.name.clone(),
                    Path::new(&artifact.path).to_path_buf(),
                )
            })
            .collect()
    }
}

/// The background task owning one run's execution and its terminal status
/// transition.
struct RunTask {
    repos: Repos,
    hub: Arc<EventHub>,
    executor: Arc<StepExecutor>,
    active: Arc<DashMap<String, ActiveRun>>,
    run: Run,
    project: Project,
    workflow: WorkflowDefinition,
    lineage: Option<RunLineage>,
    cancel: CancellationToken,
}

impl RunTask {
    async fn execute(self, seed_artifacts: Vec<AdapterArtifact>) {
        let run_id = self.run.id.clone();
        self.publish(RunEvent::RunStarted {
            run_id: run_id.clone(),
            workflow_id: self.workflow.workflow_id.clone(),
            timestamp: now(),
        });
        match &self.lineage {
            Some(RunLineage::Fork {
                parent_run_id,
                forked_from_step_id,
            }) => self.publish(RunEvent::RunForked {
                run_id: run_id.clone(),
                parent_run_id: parent_run_id.clone(),
                forked_from_step_id: forked_from_step_id.clone(),
                timestamp: now(),
            }),
            Some(RunLineage::Replay { replay_of_run_id }) => self.publish(RunEvent::RunReplayed {
                run_id: run_id.clone(),
                replay_of_run_id: replay_of_run_id.clone(),
                timestamp: now(),
            }),
            None => {}
        }

        let outcome = self.execute_steps(seed_artifacts).await;
        match outcome {
            Ok(()) => {
                self.repos
                    .runs
                    .update_status(&run_id, RunStatus::Succeeded, RunStatusUpdate::finished());
                self.publish(RunEvent::RunFinished {
                    run_id: run_id.clone(),
                    status: RunStatus::Succeeded,
                    timestamp: now(),
                });
            }
            Err(Error::Canceled) => {
                self.repos
                    .runs
                    .update_status(&run_id, RunStatus::Canceled, RunStatusUpdate::finished());
                self.publish(RunEvent::RunFinished {
                    run_id: run_id.clone(),
                    status: RunStatus::Canceled,
                    timestamp: now(),
                });
            }
            Err(e) => {
                let message = e.public_message();
                tracing::warn!(run_id = %run_id, "run failed: {e}");
                self.repos.runs.update_status(
                    &run_id,
                    RunStatus::Failed,
                    RunStatusUpdate::failed(message.clone()),
                );
                self.publish(RunEvent::RunFailed {
                    run_id: run_id.clone(),
                    error: message,
                    timestamp: now(),
                });
            }
        }
        self.active.remove(&run_id);
    }

    async fn execute_steps(&self, seed_artifacts: Vec<AdapterArtifact>) -> Result<()> {
        let mission = self
            .run
            .chat_id
            .as_deref()
            .and_then(|chat_id| self.repos.missions.get_by_chat(chat_id));
        let scope_targets: Vec<String> = self
            .workflow
            .scope
            .as_ref()
            .map(|scope| scope.targets.clone())
            .unwrap_or_default();

        let mut available = seed_artifacts;
        for step in &self.workflow.steps {
            if self.cancel.is_cancelled() {
                return Err(Error::Canceled);
            }

            let record = self.repos.steps.create(NewRunStep {
                run_id: self.run.id.clone(),
                step_id: step.id.clone(),
                adapter: step.adapter.clone(),
                category: step.category.clone(),
                risk: step.risk.clone(),
                inputs: Some(serde_json::Value::Object(step.inputs.clone())),
                outputs: None,
                params: Some(serde_json::Value::Object(step.params.clone())),
            });
            self.publish(RunEvent::StepStarted {
                run_id: self.run.id.clone(),
                step_id: step.id.clone(),
                timestamp: now(),
            });

            let result = self
                .executor
                .execute_step(
                    &self.run,
                    step,
                    &self.project,
                    mission.as_ref(),
                    &available,
                    &scope_targets,
                    &self.cancel,
                )
                .await;

            match result {
                Ok(outcome) => {
                    self.repos.steps.update_status(
                        &record.id,
                        RunStatus::Succeeded,
                        Some(outcome.outputs),
                    );
                    self.publish(RunEvent::StepFinished {
                        run_id: self.run.id.clone(),
                        step_id: step.id.clone(),
                        status: RunStatus::Succeeded,
                        timestamp: now(),
                    });
                    self.merge_available(&mut available, outcome.produced);
                }
                Err(e) => {
                    let status = if e.is_canceled() {
                        RunStatus::Canceled
                    } else {
                        RunStatus::Failed
                    };
                    self.repos.steps.update_status(&record.id, status, None);
                    self.publish(RunEvent::StepFinished {
                        run_id: self.run.id.clone(),
                        step_id: step.id.clone(),
                        status,
                        timestamp: now(),
                    });
                    return Err(e);
                }
            }
        }
        // A token triggered after the last step must still cancel the run.
        if self.cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        Ok(())
    }

    /// Later steps see the newest artifact of each type.
    fn merge_available(&self, available: &mut Vec<AdapterArtifact>, produced: Vec<AdapterArtifact>) {
        for artifact in produced {
            available.retain(|existing| existing.artifact_type != artifact.artifact_type);
            available.push(artifact);
        }
    }

    fn publish(&self, event: RunEvent) {
        self.repos.run_events.append(&event);
        self.hub.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveyor_adapters::AdapterRegistry;
    use surveyor_store::{DocsSearch, NoopDocsSearch};

    fn manager(repos: &Repos) -> RunManager {
        let hub = Arc::new(EventHub::new());
        let registry = Arc::new(AdapterRegistry::new());
        let docs: Arc<dyn DocsSearch> = Arc::new(NoopDocsSearch);
        let executor = Arc::new(StepExecutor::new(
            repos.clone(),
            hub.clone(),
            registry,
            docs,
            true,
        ));
        RunManager::new(repos.clone(), hub, executor)
    }

    // Zero-step runs finish almost immediately on worker threads, racing
    // start_run's own bookkeeping.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fast_runs_never_strand_registry_entries() {
        let repos = Repos::in_memory();
        let manager = manager(&repos);
        let project = repos.projects.create("p", "/tmp/surveyor-test");
        let workflow = WorkflowDefinition::empty(Some(project.id.clone()), None, Vec::new());

        for _ in 0..32 {
            let run = manager
                .start_run(&project, &workflow, None, None, Vec::new())
                .expect("start");
            let finished = manager.wait_for_run(&run.id).await.expect("wait");
            assert_eq!(finished.status, RunStatus::Succeeded);
        }
        assert!(manager.active.is_empty());
    }
}
