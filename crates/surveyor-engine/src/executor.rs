//! Step executor
//!
//! Runs one workflow step end to end: adapter resolution, scope
//! enforcement, contract validation, adapter invocation, artifact and
//! evidence persistence, and content trust checks. Adapter failures are
//! returned as step failures; nothing an adapter does may take the
//! executor down with it.
//!
//! Content trust runs on two timings. Inline content is checked the
//! moment the adapter hands it back. Path-referenced content is read and
//! parsed first; bytes that do not parse are kept alongside the artifact
//! record with a `raw_path` so an operator can inspect them. Either way a
//! schema violation marks the artifact untrusted and fails the step, but
//! the artifact stays on disk and in the store unless `retain_untrusted`
//! is switched off.

use crate::event_hub::EventHub;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use surveyor_adapters::{
    validate_artifact_content, Adapter, AdapterArtifact, AdapterContext, AdapterLogEntry,
    AdapterRegistry, ExecutionResult, LogSink,
};
use surveyor_core::hash::sha256_hex;
use surveyor_core::{
    now, Artifact, Error, MissionManifest, Project, Result, Run, RunEvent, TrustState,
    WorkflowStep,
};
use surveyor_store::{DocsSearch, NewArtifact, NewEvidence, Repos};
use tokio_util::sync::CancellationToken;

/// Param keys treated as scope-governed targets.
const TARGET_PARAM_KEYS: [&str; 2] = ["target", "target_url"];

pub struct StepOutcome {
    pub outputs: Value,
    /// Artifact refs threaded forward to later steps in the run.
    pub produced: Vec<AdapterArtifact>,
    pub artifact_ids: Vec<String>,
}

pub struct StepExecutor {
    repos: Repos,
    hub: Arc<EventHub>,
    registry: Arc<AdapterRegistry>,
    docs: Arc<dyn DocsSearch>,
    retain_untrusted: bool,
}

impl StepExecutor {
    pub fn new(
        repos: Repos,
        hub: Arc<EventHub>,
        registry: Arc<AdapterRegistry>,
        docs: Arc<dyn DocsSearch>,
        retain_untrusted: bool,
    ) -> Self {
        Self {
            repos,
            hub,
            registry,
            docs,
            retain_untrusted,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn execute_step(
        &self,
        run: &Run,
        step: &WorkflowStep,
        project: &Project,
        mission: Option<&MissionManifest>,
        available: &[AdapterArtifact],
        scope_targets: &[String],
        cancel: &CancellationToken,
    ) -> Result<StepOutcome> {
        if cancel.is_cancelled() {
            return Err(Error::Canceled);
        }

        let project_root = Some(project.root_path.as_str());
        let adapter = self
            .registry
            .get(&step.adapter, project_root)
            .ok_or_else(|| Error::AdapterNotFound(step.adapter.clone()))?;

        enforce_scope(step, scope_targets)?;
        self.registry.validate_step(step, available, project_root)?;

        let root = PathBuf::from(&project.root_path);
        let ctx = AdapterContext {
            project_root: root.clone(),
            artifacts_dir: root.join("artifacts").join(&run.id),
            evidence_dir: root.join("evidence").join(&run.id),
            run_id: run.id.clone(),
            step_id: step.id.clone(),
            project_id: project.id.clone(),
            mission: mission.cloned(),
            docs: self.docs.clone(),
            cancel: cancel.clone(),
            log_sink: Some(self.log_sink(run, step)),
        };
        std::fs::create_dir_all(&ctx.artifacts_dir)?;

        let result = tokio::select! {
            result = adapter.execute(&step.params, available, &ctx) => result?,
            _ = cancel.cancelled() => return Err(Error::Canceled),
        };

        self.emit_step_logs(run, step, &result);
        self.persist_artifacts(run, step, project, adapter.as_ref(), &ctx, result)
    }

    /// Sink that turns adapter log entries into STEP_LOG events as the
    /// adapter runs, so subscribers see progress during long steps.
    fn log_sink(&self, run: &Run, step: &WorkflowStep) -> LogSink {
        let run_events = self.repos.run_events.clone();
        let hub = self.hub.clone();
        let run_id = run.id.clone();
        let step_id = step.id.clone();
        Arc::new(move |entry: AdapterLogEntry| {
            let event = RunEvent::StepLog {
                run_id: run_id.clone(),
                step_id: step_id.clone(),
                message: entry.message,
                level: entry.level,
                timestamp: now(),
            };
            run_events.append(&event);
            hub.emit(&event);
        })
    }

    /// Logs the adapter returned buffered rather than streamed.
    fn emit_step_logs(&self, run: &Run, step: &WorkflowStep, result: &ExecutionResult) {
        for entry in &result.logs {
            self.publish(RunEvent::StepLog {
                run_id: run.id.clone(),
                step_id: step.id.clone(),
                message: entry.message.clone(),
                level: entry.level,
                timestamp: now(),
            });
        }
    }

    fn persist_artifacts(
        &self,
        run: &Run,
        step: &WorkflowStep,
        project: &Project,
        adapter: &dyn Adapter,
        ctx: &AdapterContext,
        result: ExecutionResult,
    ) -> Result<StepOutcome> {
        let mut produced: Vec<AdapterArtifact> = Vec::new();
        let mut artifact_ids: Vec<String> = Vec::new();
        let mut summaries: Vec<Value> = Vec::new();
        let mut trust_failures: Vec<String> = Vec::new();

        for emitted in result.artifacts {
            let persisted = self.persist_one(run, step, project, adapter, ctx, &emitted)?;

            if let Some(errors) = persisted.trust_errors {
                self.record_trust_failure(run, step, project, ctx, &persisted.record, &errors)?;
                trust_failures.push(format!(
                    "{}: {}",
                    emitted.artifact_type,
                    errors.join("; ")
                ));
                if !self.retain_untrusted {
                    // Dropped before any event references it; a durable
                    // ARTIFACT_WRITTEN must never point at a deleted record.
                    let _ = std::fs::remove_file(&persisted.record.path);
                    self.repos.artifacts.delete(&persisted.record.id);
                    continue;
                }
            }

            self.publish(RunEvent::ArtifactWritten {
                run_id: run.id.clone(),
                artifact_id: persisted.record.id.clone(),
                step_id: Some(step.id.clone()),
                timestamp: now(),
            });

            if let Some(content) = &persisted.content {
                self.persist_evidence_refs(run, step, project, &persisted.record, content);
            }

            summaries.push(json!({
                "id": persisted.record.id,
                "type": emitted.artifact_type,
                "path": persisted.record.path,
                "hash": persisted.record.hash,
                "trust_state": persisted.record.trust_state,
            }));
            artifact_ids.push(persisted.record.id.clone());
            produced.push(AdapterArtifact {
                artifact_type: emitted.artifact_type,
                path: Some(PathBuf::from(&persisted.record.path)),
                content: persisted.content,
                meta: emitted.meta,
            });
        }

        if !trust_failures.is_empty() {
            return Err(Error::validation_all(&trust_failures));
        }

        Ok(StepOutcome {
            outputs: json!({
                "artifacts": summaries,
                "warnings": result.warnings,
            }),
            produced,
            artifact_ids,
        })
    }

    fn persist_one(
        &self,
        run: &Run,
        step: &WorkflowStep,
        project: &Project,
        adapter: &dyn Adapter,
        ctx: &AdapterContext,
        emitted: &AdapterArtifact,
    ) -> Result<PersistedArtifact> {
        let file_name = emitted
            .path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| emitted.artifact_type.clone());
        let dest = ctx.artifacts_dir.join(&file_name);

        let bytes = match (&emitted.content, &emitted.path) {
            (Some(content), _) => serde_json::to_vec_pretty(content)?,
            (None, Some(path)) => std::fs::read(path)?,
            (None, None) => {
                return Err(Error::adapter_error(
                    &adapter.manifest().id,
                    format!("artifact {} has neither content nor path", emitted.artifact_type),
                ))
            }
        };
        if emitted.path.as_deref() != Some(dest.as_path()) {
            std::fs::write(&dest, &bytes)?;
        }

        // Inline content is trusted or not right here; path-referenced
        // content goes through a parse first.
        let mut raw_path: Option<String> = None;
        let (content, trust_errors) = match &emitted.content {
            Some(content) => {
                let errors = self.check_schema(adapter, &emitted.artifact_type, content);
                (Some(content.clone()), errors)
            }
            None => match serde_json::from_slice::<Value>(&bytes) {
                Ok(parsed) => {
                    let errors = self.check_schema(adapter, &emitted.artifact_type, &parsed);
                    (Some(parsed), errors)
                }
                Err(e) => {
                    let raw = ctx.artifacts_dir.join(format!("{file_name}.raw"));
                    std::fs::write(&raw, &bytes)?;
                    raw_path = Some(raw.to_string_lossy().into_owned());
                    (None, Some(vec![format!("content is not valid JSON: {e}")]))
                }
            },
        };

        let trust_state = if trust_errors.is_some() {
            TrustState::Untrusted
        } else {
            TrustState::Trusted
        };
        let record = self.repos.artifacts.create(NewArtifact {
            project_id: project.id.clone(),
            run_id: Some(run.id.clone()),
            step_id: Some(step.id.clone()),
            chat_id: run.chat_id.clone(),
            name: file_name,
            hash: sha256_hex(&bytes),
            path: dest.to_string_lossy().into_owned(),
            media_type: Some("application/json".into()),
            size_bytes: bytes.len() as u64,
            trust_state,
            raw_path,
        });

        Ok(PersistedArtifact {
            record,
            content,
            trust_errors,
        })
    }

    fn check_schema(
        &self,
        adapter: &dyn Adapter,
        artifact_type: &str,
        content: &Value,
    ) -> Option<Vec<String>> {
        match validate_artifact_content(adapter.manifest(), artifact_type, content) {
            Ok(()) => None,
            Err(e) => Some(vec![e.to_string()]),
        }
    }

    /// Evidence files referenced from inside the artifact's content become
    /// Evidence records tied to it.
    fn persist_evidence_refs(
        &self,
        run: &Run,
        step: &WorkflowStep,
        project: &Project,
        artifact: &Artifact,
        content: &Value,
    ) {
        let Some(entries) = content.get("evidence").and_then(Value::as_array) else {
            return;
        };
        for entry in entries {
            let (Some(kind), Some(path)) = (
                entry.get("kind").and_then(Value::as_str),
                entry.get("path").and_then(Value::as_str),
            ) else {
                tracing::warn!(artifact_id = %artifact.id, "skipping malformed evidence reference");
                continue;
            };
            let resolved = resolve_evidence_path(&project.root_path, path);
            let (hash, size_bytes) = match std::fs::read(&resolved) {
                Ok(bytes) => (Some(sha256_hex(&bytes)), Some(bytes.len() as u64)),
                Err(_) => (None, None),
            };
            self.repos.evidence.create(NewEvidence {
                project_id: project.id.clone(),
                run_id: Some(run.id.clone()),
                step_id: Some(step.id.clone()),
                chat_id: run.chat_id.clone(),
                artifact_id: artifact.id.clone(),
                kind: kind.to_string(),
                path: path.to_string(),
                description: entry
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                hash,
                media_type: None,
                size_bytes,
            });
        }
    }

    /// Persist the schema violations as diagnostic evidence next to the
    /// untrusted artifact.
    fn record_trust_failure(
        &self,
        run: &Run,
        step: &WorkflowStep,
        project: &Project,
        ctx: &AdapterContext,
        artifact: &Artifact,
        errors: &[String],
    ) -> Result<()> {
        std::fs::create_dir_all(&ctx.evidence_dir)?;
        let path = ctx.evidence_dir.join(format!("validation-{}.json", artifact.name));
        let payload = json!({
            "artifact_id": artifact.id,
            "artifact_name": artifact.name,
            "errors": errors,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&payload)?)?;
        self.repos.evidence.create(NewEvidence {
            project_id: project.id.clone(),
            run_id: Some(run.id.clone()),
            step_id: Some(step.id.clone()),
            chat_id: run.chat_id.clone(),
            artifact_id: artifact.id.clone(),
            kind: "validation_errors".into(),
            path: path.to_string_lossy().into_owned(),
            description: Some("Content schema violations".into()),
            hash: None,
            media_type: Some("application/json".into()),
            size_bytes: None,
        });
        tracing::warn!(
            artifact_id = %artifact.id,
            "artifact content failed schema validation, marked untrusted: {}",
            errors.join("; ")
        );
        Ok(())
    }

    fn publish(&self, event: RunEvent) {
        self.repos.run_events.append(&event);
        self.hub.emit(&event);
    }
}

struct PersistedArtifact {
    record: Artifact,
    content: Option<Value>,
    trust_errors: Option<Vec<String>>,
}

/// A step naming a target outside the workflow's allow-list never reaches
/// its adapter. An empty allow-list means no scope was configured and the
/// check does not apply.
fn enforce_scope(step: &WorkflowStep, scope_targets: &[String]) -> Result<()> {
    if scope_targets.is_empty() {
        return Ok(());
    }
    for key in TARGET_PARAM_KEYS {
        if let Some(target) = step.params.get(key).and_then(Value::as_str) {
            if !scope_targets.iter().any(|t| t == target) {
                return Err(Error::ScopeViolation(format!(
                    "target {target} is not in the scope allow-list"
                )));
            }
        }
    }
    Ok(())
}

fn resolve_evidence_path(project_root: &str, path: &str) -> PathBuf {
    let candidate = PathBuf::from(path);
    if candidate.is_absolute() {
        candidate
    } else {
        Path::new(project_root).join(candidate)
    }
}
