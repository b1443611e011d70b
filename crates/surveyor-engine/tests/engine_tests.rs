//! Tests for surveyor-engine: run lifecycle, event ordering, cancellation,
//! fork/replay lineage, scope enforcement, and artifact trust handling.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use surveyor_adapters::{
    Adapter, AdapterArtifact, AdapterContext, AdapterLogEntry, AdapterManifest, AdapterRegistry,
    ExecutionResult, RiskLevel,
};
use surveyor_core::{
    Error, Result, RunEvent, RunLineage, RunStatus, TrustState, WorkflowDefinition, WorkflowScope,
    WorkflowStep,
};
use surveyor_engine::{Engine, EngineConfig, MessageMetadata};
use surveyor_store::{ArtifactFilter, DocsSearch, NoopDocsSearch, Repos};

// ===========================================================================
// Test adapters
// ===========================================================================

fn manifest(id: &str, inputs: Vec<String>, outputs: Vec<String>) -> AdapterManifest {
    AdapterManifest {
        id: id.into(),
        name: id.into(),
        description: String::new(),
        category: "test".into(),
        risk_default: RiskLevel::Passive,
        version: "1.0.0".into(),
        inputs,
        outputs,
        params_schema: json!({
            "type": "object",
            "properties": {
                "target_url": { "type": "string" },
                "target": { "type": "string" }
            },
            "required": [],
            "additionalProperties": false
        }),
        artifact_schemas: HashMap::new(),
        tags: vec![],
    }
}

fn valid_surface() -> Value {
    json!({
        "target": "https://example.com",
        "timestamp": "2026-01-01T00:00:00Z",
        "urls": [{ "url": "https://example.com/", "status": 200 }]
    })
}

/// Emits one deterministic, schema-valid web_surface.json.
struct ProduceSurface {
    manifest: AdapterManifest,
    executed: Arc<AtomicBool>,
}

impl ProduceSurface {
    fn new(executed: Arc<AtomicBool>) -> Self {
        Self {
            manifest: manifest("test.produce.surface", vec![], vec!["web_surface.json".into()]),
            executed,
        }
    }
}

#[async_trait]
impl Adapter for ProduceSurface {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        _params: &Map<String, Value>,
        _inputs: &[AdapterArtifact],
        _ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        self.executed.store(true, Ordering::SeqCst);
        Ok(ExecutionResult {
            artifacts: vec![AdapterArtifact::inline("web_surface.json", valid_surface())],
            ..ExecutionResult::default()
        })
    }
}

/// Requires a web_surface.json input and emits a deterministic report.json.
struct ConsumeSurface {
    manifest: AdapterManifest,
}

impl ConsumeSurface {
    fn new() -> Self {
        Self {
            manifest: manifest(
                "test.consume.surface",
                vec!["web_surface.json".into()],
                vec!["report.json".into()],
            ),
        }
    }
}

#[async_trait]
impl Adapter for ConsumeSurface {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        _params: &Map<String, Value>,
        inputs: &[AdapterArtifact],
        _ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        assert!(inputs.iter().any(|a| a.artifact_type == "web_surface.json"));
        Ok(ExecutionResult {
            artifacts: vec![AdapterArtifact::inline(
                "report.json",
                json!({
                    "target": "https://example.com",
                    "timestamp": "2026-01-01T00:00:00Z",
                    "artifacts": [],
                    "report_path": "reports/report.md"
                }),
            )],
            ..ExecutionResult::default()
        })
    }
}

/// Blocks until canceled.
struct SlowStep {
    manifest: AdapterManifest,
}

impl SlowStep {
    fn new() -> Self {
        Self {
            manifest: manifest("test.slow.step", vec![], vec!["web_surface.json".into()]),
        }
    }
}

#[async_trait]
impl Adapter for SlowStep {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        _params: &Map<String, Value>,
        _inputs: &[AdapterArtifact],
        ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(ExecutionResult::default()),
            _ = ctx.cancel.cancelled() => Err(Error::Canceled),
        }
    }
}

/// Emits web_surface.json content that violates its content schema.
struct BadOutput {
    manifest: AdapterManifest,
}

impl BadOutput {
    fn new() -> Self {
        Self {
            manifest: manifest("test.bad.output", vec![], vec!["web_surface.json".into()]),
        }
    }
}

#[async_trait]
impl Adapter for BadOutput {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        _params: &Map<String, Value>,
        _inputs: &[AdapterArtifact],
        _ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        Ok(ExecutionResult {
            artifacts: vec![AdapterArtifact::inline(
                "web_surface.json",
                json!({ "notes": [] }),
            )],
            ..ExecutionResult::default()
        })
    }
}

/// Streams one log entry through the context, then blocks until released.
struct StreamingStep {
    manifest: AdapterManifest,
    release: Arc<Notify>,
}

impl StreamingStep {
    fn new(release: Arc<Notify>) -> Self {
        Self {
            manifest: manifest("test.streaming.step", vec![], vec!["web_surface.json".into()]),
            release,
        }
    }
}

#[async_trait]
impl Adapter for StreamingStep {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        _params: &Map<String, Value>,
        _inputs: &[AdapterArtifact],
        ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        ctx.log(AdapterLogEntry::info("fetched page 1"));
        self.release.notified().await;
        Ok(ExecutionResult {
            artifacts: vec![AdapterArtifact::inline("web_surface.json", valid_surface())],
            ..ExecutionResult::default()
        })
    }
}

/// Succeeds, but triggers cancellation on its way out.
struct CancelOnExit {
    manifest: AdapterManifest,
}

impl CancelOnExit {
    fn new() -> Self {
        Self {
            manifest: manifest("test.cancel.on.exit", vec![], vec!["web_surface.json".into()]),
        }
    }
}

#[async_trait]
impl Adapter for CancelOnExit {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        _params: &Map<String, Value>,
        _inputs: &[AdapterArtifact],
        ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        ctx.cancel.cancel();
        Ok(ExecutionResult::default())
    }
}

/// Writes a file that is not JSON and hands back only its path.
struct RawPathOutput {
    manifest: AdapterManifest,
}

impl RawPathOutput {
    fn new() -> Self {
        Self {
            manifest: manifest("test.raw.output", vec![], vec!["web_surface.json".into()]),
        }
    }
}

#[async_trait]
impl Adapter for RawPathOutput {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        _params: &Map<String, Value>,
        _inputs: &[AdapterArtifact],
        ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        let path = ctx.artifacts_dir.join("web_surface.json");
        std::fs::write(&path, b"this is not json {{")?;
        Ok(ExecutionResult {
            artifacts: vec![AdapterArtifact::from_path("web_surface.json", path)],
            ..ExecutionResult::default()
        })
    }
}

// ===========================================================================
// Harness
// ===========================================================================

struct Harness {
    engine: Engine,
    project_id: String,
    _dir: tempfile::TempDir,
}

fn harness(registry: AdapterRegistry) -> Harness {
    harness_with_config(registry, EngineConfig::default())
}

fn harness_with_config(registry: AdapterRegistry, config: EngineConfig) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let docs: Arc<dyn DocsSearch> = Arc::new(NoopDocsSearch);
    let engine = Engine::new(config, registry, docs, Repos::in_memory());
    let project = engine.create_project("test", &dir.path().to_string_lossy());
    Harness {
        engine,
        project_id: project.id,
        _dir: dir,
    }
}

fn step(id: &str, adapter: &str, params: Value) -> WorkflowStep {
    serde_json::from_value(json!({
        "id": id,
        "adapter": adapter,
        "category": "test",
        "risk": "passive",
        "params": params
    }))
    .expect("step json")
}

fn workflow(steps: Vec<WorkflowStep>) -> WorkflowDefinition {
    WorkflowDefinition {
        workflow_id: "wf-test".into(),
        project_id: None,
        chat_id: None,
        scope: Some(WorkflowScope {
            targets: vec!["https://example.com".into()],
        }),
        steps,
    }
}

fn event_types(events: &[RunEvent]) -> Vec<&'static str> {
    events.iter().map(RunEvent::event_type).collect()
}

// ===========================================================================
// Event ordering
// ===========================================================================

#[tokio::test]
async fn event_sequence_is_ordered() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(ProduceSurface::new(Arc::new(AtomicBool::new(false))));
    registry.register_builtin(ConsumeSurface::new());
    let h = harness(registry);

    let wf = workflow(vec![
        step("step-1", "test.produce.surface", json!({})),
        step("step-2", "test.consume.surface", json!({})),
    ]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    let finished = h.engine.wait_for_run(&run.id).await.unwrap();
    assert_eq!(finished.status, RunStatus::Succeeded);

    let events = h.engine.list_run_events(&run.id);
    let types = event_types(&events);
    assert_eq!(types.first(), Some(&"RUN_STARTED"));
    assert_eq!(types.last(), Some(&"RUN_FINISHED"));
    assert_eq!(
        types.iter().filter(|t| **t == "RUN_FINISHED" || **t == "RUN_FAILED").count(),
        1
    );

    // STEP_STARTED precedes its STEP_FINISHED, with the step's
    // ARTIFACT_WRITTEN in between.
    for step_id in ["step-1", "step-2"] {
        let started = events
            .iter()
            .position(|e| matches!(e, RunEvent::StepStarted { step_id: s, .. } if s == step_id))
            .unwrap();
        let finished = events
            .iter()
            .position(|e| matches!(e, RunEvent::StepFinished { step_id: s, .. } if s == step_id))
            .unwrap();
        let written = events
            .iter()
            .position(|e| matches!(e, RunEvent::ArtifactWritten { step_id: s, .. } if s.as_deref() == Some(step_id)))
            .unwrap();
        assert!(started < written && written < finished);
    }
}

#[tokio::test]
async fn subscribers_see_the_same_order_live() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(ProduceSurface::new(Arc::new(AtomicBool::new(false))));
    let h = harness(registry);

    let wf = workflow(vec![step("step-1", "test.produce.surface", json!({}))]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    let mut rx = h.engine.subscribe(&run.id);
    h.engine.wait_for_run(&run.id).await.unwrap();

    let mut live: Vec<RunEvent> = Vec::new();
    while let Ok(event) = rx.try_recv() {
        live.push(event);
    }
    let logged = h.engine.list_run_events(&run.id);
    // The subscriber attached after start_run, so it may have missed a
    // prefix, but what it saw must be a suffix of the durable log in the
    // same order.
    assert!(!live.is_empty());
    assert_eq!(&logged[logged.len() - live.len()..], live.as_slice());
}

#[tokio::test]
async fn step_logs_stream_while_the_adapter_is_running() {
    let release = Arc::new(Notify::new());
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(StreamingStep::new(release.clone()));
    let h = harness(registry);

    let wf = workflow(vec![step("step-1", "test.streaming.step", json!({}))]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    let mut rx = h.engine.subscribe(&run.id);

    // The STEP_LOG must arrive while the adapter is still blocked; only
    // after seeing it is the adapter released to finish.
    loop {
        match rx.recv().await.expect("event stream open") {
            RunEvent::StepLog { message, .. } => {
                assert_eq!(message, "fetched page 1");
                break;
            }
            RunEvent::RunFinished { .. } | RunEvent::RunFailed { .. } => {
                panic!("run reached a terminal event before the step log");
            }
            _ => {}
        }
    }
    release.notify_one();
    let finished = h.engine.wait_for_run(&run.id).await.unwrap();
    assert_eq!(finished.status, RunStatus::Succeeded);

    // Streamed once, not buffered and replayed a second time.
    let types = event_types(&h.engine.list_run_events(&run.id));
    assert_eq!(types.iter().filter(|t| **t == "STEP_LOG").count(), 1);
}

// ===========================================================================
// Cancellation
// ===========================================================================

#[tokio::test]
async fn cancel_mid_step_yields_canceled_never_succeeded() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(SlowStep::new());
    let h = harness(registry);

    let wf = workflow(vec![step("step-1", "test.slow.step", json!({}))]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();

    // Give the step a moment to start, then cancel.
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.engine.cancel_run(&run.id).unwrap();
    let finished = h.engine.wait_for_run(&run.id).await.unwrap();
    assert_eq!(finished.status, RunStatus::Canceled);

    let steps = h.engine.list_run_steps(&run.id);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].status, RunStatus::Canceled);

    let types = event_types(&h.engine.list_run_events(&run.id));
    assert_eq!(types.last(), Some(&"RUN_FINISHED"));
    assert!(!types.contains(&"RUN_FAILED"));
}

#[tokio::test]
async fn cancel_is_idempotent_after_completion() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(ProduceSurface::new(Arc::new(AtomicBool::new(false))));
    let h = harness(registry);

    let wf = workflow(vec![step("step-1", "test.produce.surface", json!({}))]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    h.engine.wait_for_run(&run.id).await.unwrap();

    let after = h.engine.cancel_run(&run.id).unwrap();
    assert_eq!(after.status, RunStatus::Succeeded);
}

#[tokio::test]
async fn cancellation_after_the_last_step_still_cancels_the_run() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(CancelOnExit::new());
    let h = harness(registry);

    let wf = workflow(vec![step("step-1", "test.cancel.on.exit", json!({}))]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    let finished = h.engine.wait_for_run(&run.id).await.unwrap();
    assert_eq!(finished.status, RunStatus::Canceled);

    let types = event_types(&h.engine.list_run_events(&run.id));
    assert_eq!(types.last(), Some(&"RUN_FINISHED"));
    assert!(!types.contains(&"RUN_FAILED"));
}

// ===========================================================================
// Scope enforcement
// ===========================================================================

#[tokio::test]
async fn out_of_scope_target_fails_before_adapter_executes() {
    let executed = Arc::new(AtomicBool::new(false));
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(ProduceSurface::new(executed.clone()));
    let h = harness(registry);

    let wf = workflow(vec![step(
        "step-1",
        "test.produce.surface",
        json!({ "target_url": "https://not-in-scope.example" }),
    )]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    let finished = h.engine.wait_for_run(&run.id).await.unwrap();

    assert_eq!(finished.status, RunStatus::Failed);
    assert!(finished.error.unwrap().contains("scope"));
    assert!(!executed.load(Ordering::SeqCst));
}

// ===========================================================================
// Fork and replay
// ===========================================================================

#[tokio::test]
async fn fork_executes_only_downstream_steps() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(ProduceSurface::new(Arc::new(AtomicBool::new(false))));
    registry.register_builtin(ConsumeSurface::new());
    let h = harness(registry);

    let wf = workflow(vec![
        step("step-1", "test.produce.surface", json!({})),
        step("step-2", "test.consume.surface", json!({})),
    ]);
    let parent = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    h.engine.wait_for_run(&parent.id).await.unwrap();

    let fork = h.engine.fork_run(&parent.id, "step-1").unwrap();
    assert_eq!(
        fork.lineage,
        Some(RunLineage::Fork {
            parent_run_id: parent.id.clone(),
            forked_from_step_id: "step-1".into(),
        })
    );
    let finished = h.engine.wait_for_run(&fork.id).await.unwrap();
    assert_eq!(finished.status, RunStatus::Succeeded);

    let steps = h.engine.list_run_steps(&fork.id);
    let step_ids: Vec<&str> = steps.iter().map(|s| s.step_id.as_str()).collect();
    assert_eq!(step_ids, vec!["step-2"]);

    let types = event_types(&h.engine.list_run_events(&fork.id));
    assert_eq!(&types[..2], &["RUN_STARTED", "RUN_FORKED"]);
}

#[tokio::test]
async fn replay_produces_identical_artifact_hashes() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(ProduceSurface::new(Arc::new(AtomicBool::new(false))));
    let h = harness(registry);

    let wf = workflow(vec![step("step-1", "test.produce.surface", json!({}))]);
    let original = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    h.engine.wait_for_run(&original.id).await.unwrap();

    let replay = h.engine.replay_run(&original.id).unwrap();
    assert_eq!(
        replay.lineage,
        Some(RunLineage::Replay {
            replay_of_run_id: original.id.clone(),
        })
    );
    let finished = h.engine.wait_for_run(&replay.id).await.unwrap();
    assert_eq!(finished.status, RunStatus::Succeeded);

    let hash_of = |run_id: &str| {
        let artifacts = h.engine.list_artifacts(&ArtifactFilter {
            run_id: Some(run_id.to_string()),
            ..ArtifactFilter::default()
        });
        assert_eq!(artifacts.len(), 1);
        artifacts[0].hash.clone()
    };
    assert_eq!(hash_of(&original.id), hash_of(&replay.id));

    let types = event_types(&h.engine.list_run_events(&replay.id));
    assert_eq!(&types[..2], &["RUN_STARTED", "RUN_REPLAYED"]);
}

// ===========================================================================
// Artifact trust
// ===========================================================================

#[tokio::test]
async fn schema_violating_artifact_is_retained_untrusted() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(BadOutput::new());
    let h = harness(registry);

    let wf = workflow(vec![step("step-1", "test.bad.output", json!({}))]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    let finished = h.engine.wait_for_run(&run.id).await.unwrap();
    assert_eq!(finished.status, RunStatus::Failed);

    let artifacts = h.engine.list_artifacts(&ArtifactFilter {
        run_id: Some(run.id.clone()),
        ..ArtifactFilter::default()
    });
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].trust_state, TrustState::Untrusted);
    assert!(std::path::Path::new(&artifacts[0].path).exists());
}

#[tokio::test]
async fn dropped_untrusted_artifact_leaves_no_artifact_written_event() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(BadOutput::new());
    let h = harness_with_config(
        registry,
        EngineConfig {
            retain_untrusted: false,
            ..EngineConfig::default()
        },
    );

    let wf = workflow(vec![step("step-1", "test.bad.output", json!({}))]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    let finished = h.engine.wait_for_run(&run.id).await.unwrap();
    assert_eq!(finished.status, RunStatus::Failed);

    let artifacts = h.engine.list_artifacts(&ArtifactFilter {
        run_id: Some(run.id.clone()),
        ..ArtifactFilter::default()
    });
    assert!(artifacts.is_empty());

    // The durable log must not reference the deleted record.
    let types = event_types(&h.engine.list_run_events(&run.id));
    assert!(!types.contains(&"ARTIFACT_WRITTEN"));
}

#[tokio::test]
async fn unparseable_path_artifact_records_raw_path() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(RawPathOutput::new());
    let h = harness(registry);

    let wf = workflow(vec![step("step-1", "test.raw.output", json!({}))]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    let finished = h.engine.wait_for_run(&run.id).await.unwrap();
    assert_eq!(finished.status, RunStatus::Failed);

    let artifacts = h.engine.list_artifacts(&ArtifactFilter {
        run_id: Some(run.id.clone()),
        ..ArtifactFilter::default()
    });
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].trust_state, TrustState::Untrusted);
    let raw_path = artifacts[0].raw_path.as_ref().expect("raw_path recorded");
    assert!(std::path::Path::new(raw_path).exists());
}

#[tokio::test]
async fn human_edit_backs_up_rehashes_and_restores_trust() {
    let mut registry = AdapterRegistry::new();
    registry.register_builtin(BadOutput::new());
    let h = harness(registry);

    let wf = workflow(vec![step("step-1", "test.bad.output", json!({}))]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    h.engine.wait_for_run(&run.id).await.unwrap();

    let artifact = h
        .engine
        .list_artifacts(&ArtifactFilter {
            run_id: Some(run.id.clone()),
            ..ArtifactFilter::default()
        })
        .remove(0);
    let before_hash = artifact.hash.clone();

    let repaired = h
        .engine
        .update_artifact(&artifact.id, &valid_surface(), Some("manual repair".into()))
        .unwrap();
    assert_eq!(repaired.trust_state, TrustState::Trusted);
    assert_ne!(repaired.hash, before_hash);
    assert!(std::path::Path::new(&format!("{}.bak", artifact.path)).exists());

    let types = event_types(&h.engine.list_run_events(&run.id));
    assert!(types.contains(&"ARTIFACT_EDITED"));
}

// ===========================================================================
// Planner end to end
// ===========================================================================

#[tokio::test]
async fn assessment_message_produces_four_step_run() {
    let h = harness(surveyor_adapters::create_default_registry());
    let chat = h.engine.create_chat(&h.project_id, "assessment").unwrap();

    let run = h
        .engine
        .send_message(
            &h.project_id,
            &chat.id,
            "run an assessment of https://example.com",
            MessageMetadata {
                objective: Some("Assess the site".into()),
                scope_targets: vec!["https://example.com".into()],
                ..MessageMetadata::default()
            },
        )
        .await
        .unwrap();

    let wf: WorkflowDefinition = serde_json::from_str(&run.workflow_json).unwrap();
    assert_eq!(wf.steps.len(), 4);
    let adapters: Vec<&str> = wf.steps.iter().map(|s| s.adapter.as_str()).collect();
    assert_eq!(
        adapters,
        vec![
            "web.surface.discover.http",
            "findings.candidates.from_web_surface",
            "findings.triage.rulebased",
            "report.generate.markdown",
        ]
    );
    assert!(run.planner.is_some());
    // Terminal state is not asserted here: the discovery step performs
    // real network I/O. Cancel instead of letting it run.
    h.engine.cancel_run(&run.id).unwrap();
    h.engine.wait_for_run(&run.id).await.unwrap();
}

#[tokio::test]
async fn unmatched_message_produces_empty_run_that_succeeds() {
    let h = harness(surveyor_adapters::create_default_registry());
    let chat = h.engine.create_chat(&h.project_id, "chitchat").unwrap();

    let run = h
        .engine
        .send_message(&h.project_id, &chat.id, "hello", MessageMetadata::default())
        .await
        .unwrap();
    let finished = h.engine.wait_for_run(&run.id).await.unwrap();

    assert_eq!(finished.status, RunStatus::Succeeded);
    let wf: WorkflowDefinition = serde_json::from_str(&finished.workflow_json).unwrap();
    assert!(wf.steps.is_empty());
    assert!(h.engine.list_run_steps(&run.id).is_empty());

    let types = event_types(&h.engine.list_run_events(&run.id));
    assert_eq!(types, vec!["RUN_STARTED", "RUN_FINISHED"]);
}

#[tokio::test]
async fn mission_is_created_lazily_and_kept() {
    let h = harness(surveyor_adapters::create_default_registry());
    let chat = h.engine.create_chat(&h.project_id, "mission").unwrap();
    assert!(h.engine.get_mission(&chat.id).is_none());

    let run = h
        .engine
        .send_message(
            &h.project_id,
            &chat.id,
            "hello",
            MessageMetadata {
                objective: Some("First objective".into()),
                scope_targets: vec!["https://example.com".into()],
                ..MessageMetadata::default()
            },
        )
        .await
        .unwrap();
    h.engine.wait_for_run(&run.id).await.unwrap();

    let mission = h.engine.get_mission(&chat.id).expect("mission created");
    assert_eq!(mission.objective, "First objective");

    // A later message does not overwrite the mission.
    let run = h
        .engine
        .send_message(
            &h.project_id,
            &chat.id,
            "hello again",
            MessageMetadata {
                objective: Some("Different objective".into()),
                ..MessageMetadata::default()
            },
        )
        .await
        .unwrap();
    h.engine.wait_for_run(&run.id).await.unwrap();
    let mission = h.engine.get_mission(&chat.id).unwrap();
    assert_eq!(mission.objective, "First objective");
}

// ===========================================================================
// Missing adapter
// ===========================================================================

#[tokio::test]
async fn unknown_adapter_fails_the_run_with_a_named_error() {
    let h = harness(AdapterRegistry::new());
    let wf = workflow(vec![step("step-1", "no.such.adapter", json!({}))]);
    let run = h.engine.start_workflow(&h.project_id, &wf).unwrap();
    let finished = h.engine.wait_for_run(&run.id).await.unwrap();

    assert_eq!(finished.status, RunStatus::Failed);
    assert!(finished.error.unwrap().contains("no.such.adapter"));
}
