//! Adapter registry and execution boundary
//!
//! Adapters are compiled-in plugins registered by id at engine start.
//! Built-in adapters form the base set; a project may register local
//! overrides, and the same id from both sources resolves local-first with
//! every losing definition recorded as a conflict for diagnostics.

use crate::manifest::{is_strict_params_schema, validate_manifest, AdapterManifest};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use surveyor_core::events::LogLevel;
use surveyor_core::workflow::WorkflowStep;
use surveyor_core::{Error, MissionManifest, Result};
use surveyor_store::DocsSearch;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Serialize)]
pub struct AdapterLogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AdapterLogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), data: None }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warn, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// One output an adapter hands back. Content may be inline JSON, a file
/// path, or both; the executor persists either form.
#[derive(Clone, Debug)]
pub struct AdapterArtifact {
    pub artifact_type: String,
    pub path: Option<PathBuf>,
    pub content: Option<Value>,
    pub meta: Option<Map<String, Value>>,
}

impl AdapterArtifact {
    pub fn inline(artifact_type: impl Into<String>, content: Value) -> Self {
        Self {
            artifact_type: artifact_type.into(),
            path: None,
            content: Some(content),
            meta: None,
        }
    }

    pub fn from_path(artifact_type: impl Into<String>, path: PathBuf) -> Self {
        Self {
            artifact_type: artifact_type.into(),
            path: Some(path),
            content: None,
            meta: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExecutionMetrics {
    pub duration_ms: Option<u64>,
    pub counts: HashMap<String, u64>,
}

#[derive(Clone, Debug, Default)]
pub struct ExecutionResult {
    pub logs: Vec<AdapterLogEntry>,
    pub artifacts: Vec<AdapterArtifact>,
    pub warnings: Vec<String>,
    pub metrics: Option<ExecutionMetrics>,
}

/// Receives log entries the moment an adapter produces them.
pub type LogSink = Arc<dyn Fn(AdapterLogEntry) + Send + Sync>;

/// Capability context handed to an adapter body. Everything an adapter may
/// touch goes through here; adapters hold no other engine references.
#[derive(Clone)]
pub struct AdapterContext {
    pub project_root: PathBuf,
    pub artifacts_dir: PathBuf,
    pub evidence_dir: PathBuf,
    pub run_id: String,
    pub step_id: String,
    pub project_id: String,
    pub mission: Option<MissionManifest>,
    pub docs: Arc<dyn DocsSearch>,
    pub cancel: CancellationToken,
    /// When set, `log` streams entries to run subscribers while the step
    /// is still executing. Entries returned in `ExecutionResult::logs`
    /// are emitted only after the adapter finishes.
    pub log_sink: Option<LogSink>,
}

impl AdapterContext {
    /// Bail out with a cancellation signal if the run was canceled.
    pub fn check_canceled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }

    /// Stream a log entry without waiting for the step to finish. A no-op
    /// when no sink is wired, e.g. in adapter unit tests.
    pub fn log(&self, entry: AdapterLogEntry) {
        if let Some(sink) = &self.log_sink {
            sink(entry);
        }
    }
}

/// The plugin boundary. Implementations must not panic; any failure is
/// returned as an error the executor turns into a step failure.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn manifest(&self) -> &AdapterManifest;

    async fn execute(
        &self,
        params: &Map<String, Value>,
        inputs: &[AdapterArtifact],
        ctx: &AdapterContext,
    ) -> Result<ExecutionResult>;
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Builtin,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AdapterSource {
    pub kind: SourceKind,
    pub path: String,
}

impl std::fmt::Display for AdapterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            SourceKind::Local => "local",
            SourceKind::Builtin => "builtin",
        };
        write!(f, "{}:{}", kind, self.path)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AdapterConflict {
    pub id: String,
    pub winner: AdapterSource,
    pub losers: Vec<AdapterSource>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AdapterLoadError {
    pub source: AdapterSource,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AdapterDiagnostics {
    pub load_errors: Vec<AdapterLoadError>,
    pub conflicts: Vec<AdapterConflict>,
}

struct Registered {
    adapter: Arc<dyn Adapter>,
    source: AdapterSource,
    params_validator: jsonschema::Validator,
}

/// Registry of compiled-in adapters. Built once at engine start and shared
/// read-only afterwards; registration is not thread safe by design.
pub struct AdapterRegistry {
    builtins: Vec<Registered>,
    locals: HashMap<String, Vec<Registered>>,
    load_errors: Vec<AdapterLoadError>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            builtins: Vec::new(),
            locals: HashMap::new(),
            load_errors: Vec::new(),
        }
    }

    /// Register a built-in adapter. Invalid manifests become load errors
    /// instead of registrations.
    pub fn register_builtin(&mut self, adapter: impl Adapter + 'static) {
        let id = adapter.manifest().id.clone();
        let source = AdapterSource {
            kind: SourceKind::Builtin,
            path: format!("builtin/{id}"),
        };
        self.register(Arc::new(adapter), source, None);
    }

    /// Register a project-local override. `path` is the adapter's location
    /// under the project root, used for conflict tiebreaks and diagnostics.
    pub fn register_local(
        &mut self,
        project_root: &str,
        path: impl Into<String>,
        adapter: impl Adapter + 'static,
    ) {
        let source = AdapterSource {
            kind: SourceKind::Local,
            path: path.into(),
        };
        self.register(Arc::new(adapter), source, Some(project_root.to_string()));
    }

    fn register(
        &mut self,
        adapter: Arc<dyn Adapter>,
        source: AdapterSource,
        project_root: Option<String>,
    ) {
        let manifest = adapter.manifest();
        let mut errors = validate_manifest(manifest);
        if errors.is_empty() {
            errors.extend(
                is_strict_params_schema(&manifest.params_schema)
                    .into_iter()
                    .map(|e| format!("params schema invalid: {e}")),
            );
        }
        if !errors.is_empty() {
            tracing::warn!(source = %source, "rejected adapter: {}", errors.join("; "));
            self.load_errors.push(AdapterLoadError {
                source,
                error: errors.join("; "),
            });
            return;
        }
        let params_validator = match jsonschema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .build(&manifest.params_schema)
        {
            Ok(validator) => validator,
            Err(e) => {
                self.load_errors.push(AdapterLoadError {
                    source,
                    error: format!("params schema did not compile: {e}"),
                });
                return;
            }
        };
        let entry = Registered { adapter, source, params_validator };
        match project_root {
            Some(root) => self.locals.entry(root).or_default().push(entry),
            None => self.builtins.push(entry),
        }
    }

    /// Winners for a project: local beats builtin for the same id, ties
    /// within a source break by lexical path order.
    fn resolve_all(&self, project_root: Option<&str>) -> Vec<&Registered> {
        let mut candidates: Vec<&Registered> = Vec::new();
        if let Some(locals) = project_root.and_then(|root| self.locals.get(root)) {
            candidates.extend(locals.iter());
        }
        candidates.extend(self.builtins.iter());
        candidates.sort_by(|a, b| {
            a.source
                .kind
                .cmp(&b.source.kind)
                .then_with(|| a.source.path.cmp(&b.source.path))
        });

        let mut winners: HashMap<&str, &Registered> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for entry in candidates {
            let id = entry.adapter.manifest().id.as_str();
            if !winners.contains_key(id) {
                winners.insert(id, entry);
                order.push(id);
            }
        }
        order.sort_unstable();
        order.into_iter().map(|id| winners[id]).collect()
    }

    pub fn list(&self, project_root: Option<&str>) -> Vec<AdapterManifest> {
        self.resolve_all(project_root)
            .into_iter()
            .map(|entry| entry.adapter.manifest().clone())
            .collect()
    }

    pub fn get(&self, id: &str, project_root: Option<&str>) -> Option<Arc<dyn Adapter>> {
        self.resolve_all(project_root)
            .into_iter()
            .find(|entry| entry.adapter.manifest().id == id)
            .map(|entry| entry.adapter.clone())
    }

    pub fn diagnostics(&self, project_root: Option<&str>) -> AdapterDiagnostics {
        let mut by_id: HashMap<String, Vec<&Registered>> = HashMap::new();
        let mut all: Vec<&Registered> = Vec::new();
        if let Some(locals) = project_root.and_then(|root| self.locals.get(root)) {
            all.extend(locals.iter());
        }
        all.extend(self.builtins.iter());
        all.sort_by(|a, b| {
            a.source
                .kind
                .cmp(&b.source.kind)
                .then_with(|| a.source.path.cmp(&b.source.path))
        });
        for entry in all {
            by_id
                .entry(entry.adapter.manifest().id.clone())
                .or_default()
                .push(entry);
        }

        let mut conflicts: Vec<AdapterConflict> = by_id
            .into_iter()
            .filter(|(_, entries)| entries.len() > 1)
            .map(|(id, entries)| AdapterConflict {
                id,
                winner: entries[0].source.clone(),
                losers: entries[1..].iter().map(|e| e.source.clone()).collect(),
            })
            .collect();
        conflicts.sort_by(|a, b| a.id.cmp(&b.id));

        let mut load_errors = self.load_errors.clone();
        load_errors.sort_by(|a, b| a.source.path.cmp(&b.source.path));

        AdapterDiagnostics { load_errors, conflicts }
    }

    /// Validate a step's params against the adapter's schema and its
    /// declared input types against the artifacts available so far.
    pub fn validate_step(
        &self,
        step: &WorkflowStep,
        available: &[AdapterArtifact],
        project_root: Option<&str>,
    ) -> Result<()> {
        let entry = self
            .resolve_all(project_root)
            .into_iter()
            .find(|entry| entry.adapter.manifest().id == step.adapter)
            .ok_or_else(|| Error::AdapterNotFound(step.adapter.clone()))?;

        let params = Value::Object(step.params.clone());
        let mut errors: Vec<String> = entry
            .params_validator
            .iter_errors(&params)
            .map(|error| format!("{} {}", error.instance_path, error).trim().to_string())
            .collect();

        for required in &entry.adapter.manifest().inputs {
            if !available.iter().any(|a| &a.artifact_type == required) {
                errors.push(format!("missing input artifact: {required}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::validation_all(&errors))
        }
    }

    /// Identity-only version resolution. Range matching is not implemented;
    /// any requested range resolves to the registered manifest.
    pub fn resolve_version(
        &self,
        id: &str,
        _version_range: Option<&str>,
        project_root: Option<&str>,
    ) -> Option<AdapterManifest> {
        self.get(id, project_root).map(|a| a.manifest().clone())
    }
}
