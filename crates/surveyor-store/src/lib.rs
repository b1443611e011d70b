//! Surveyor Store - persistence and knowledge-search collaborator contracts
//!
//! The engine only ever talks to the repository traits defined here; the
//! bundled in-memory implementation backs tests and embedded use. A durable
//! relational store satisfies the same contract out of tree.

pub mod docs;
pub mod memory;
pub mod repos;

pub use docs::{DocSnippet, DocsSearch, NoopDocsSearch, SearchFilter, StaticDocsSearch};
pub use memory::MemoryStore;
pub use repos::{
    ArtifactFilter, ArtifactsRepo, ChatsRepo, EvidenceRepo, MissionsRepo, NewArtifact,
    NewEvidence, NewRun, NewRunStep, ProjectsRepo, Repos, RunEventsRepo, RunStatusUpdate, RunsRepo,
    StepsRepo,
};
