//! Surveyor Adapters - compiled-in adapter plugins and their registry
//!
//! Each builtin adapter is a self-contained file in src/builtin/.
//! To add an adapter: create the file, implement the Adapter trait,
//! register it in create_default_registry().

pub mod artifacts;
pub mod builtin;
pub mod manifest;
pub mod registry;
pub mod schema;
pub mod summary;

pub use manifest::{is_strict_params_schema, validate_manifest, AdapterManifest, RiskLevel};
pub use registry::{
    Adapter, AdapterArtifact, AdapterConflict, AdapterContext, AdapterDiagnostics,
    AdapterLoadError, AdapterLogEntry, AdapterRegistry, AdapterSource, ExecutionMetrics,
    ExecutionResult, LogSink, SourceKind,
};
pub use schema::{known_artifact_types, validate_artifact_content, validate_known_content};
pub use summary::{summarize, summarize_all, AdapterParamSummary, AdapterSummary};

/// Create the registry with all builtin adapters. Callers register any
/// project-local overrides before wiring the registry into the engine.
pub fn create_default_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    // --- Assessment pipeline ---
    registry.register_builtin(builtin::discover::DiscoverAdapter::new());
    registry.register_builtin(builtin::candidates::CandidatesAdapter::new());
    registry.register_builtin(builtin::triage::TriageAdapter::new());
    registry.register_builtin(builtin::report::ReportAdapter::new());

    registry
}
