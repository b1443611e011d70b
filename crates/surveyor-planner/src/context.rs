//! Planning context assembly
//!
//! Collects adapter capability summaries, the mission manifest, prior
//! artifacts, and a bounded set of retrieved knowledge snippets into the
//! context object every provider receives.

use crate::types::{PlannerArtifactRef, PlannerContext, PlannerMessage, PlannerSnippet};
use std::collections::HashSet;
use std::sync::Arc;
use surveyor_adapters::{summarize_all, AdapterRegistry, AdapterSummary};
use surveyor_core::MissionManifest;
use surveyor_store::{ArtifactFilter, DocsSearch, Repos, SearchFilter};

const MESSAGE_TOKEN_CAP: usize = 24;
const OBJECTIVE_TOKEN_CAP: usize = 24;
const ADAPTER_NAME_TOKEN_CAP: usize = 6;
const ADAPTER_CATEGORY_TOKEN_CAP: usize = 4;
const SNIPPET_TOP_K: usize = 6;

pub struct ContextInput<'a> {
    pub project_id: &'a str,
    pub chat_id: Option<&'a str>,
    pub message: PlannerMessage,
    pub mission: MissionManifest,
    pub project_root: Option<&'a str>,
}

pub fn build_planner_context(
    input: ContextInput<'_>,
    repos: &Repos,
    docs: &Arc<dyn DocsSearch>,
    registry: &AdapterRegistry,
) -> PlannerContext {
    let adapter_capabilities = summarize_all(&registry.list(input.project_root));
    let retrieved_snippets = retrieve_snippets(
        &input.message,
        &input.mission,
        &adapter_capabilities,
        docs,
    );
    let artifacts = repos
        .artifacts
        .list(&ArtifactFilter {
            project_id: Some(input.project_id.to_string()),
            chat_id: input.chat_id.map(str::to_string),
            run_id: None,
        })
        .into_iter()
        .map(|artifact| PlannerArtifactRef {
            id: artifact.id,
            name: artifact.name,
            path: artifact.path,
            media_type: artifact.media_type,
            run_id: artifact.run_id,
            step_id: artifact.step_id,
        })
        .collect();

    PlannerContext {
        project_id: input.project_id.to_string(),
        chat_id: input.chat_id.map(str::to_string),
        message: input.message,
        mission_manifest: input.mission,
        adapter_capabilities,
        artifacts,
        retrieved_snippets,
    }
}

fn retrieve_snippets(
    message: &PlannerMessage,
    mission: &MissionManifest,
    adapters: &[AdapterSummary],
    docs: &Arc<dyn DocsSearch>,
) -> Vec<PlannerSnippet> {
    let mut terms: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    add_tokens(&mut terms, &mut seen, &message.content, MESSAGE_TOKEN_CAP);
    add_tokens(&mut terms, &mut seen, &mission.objective, OBJECTIVE_TOKEN_CAP);
    for adapter in adapters {
        add_tokens(&mut terms, &mut seen, &adapter.name, ADAPTER_NAME_TOKEN_CAP);
        add_tokens(&mut terms, &mut seen, &adapter.category, ADAPTER_CATEGORY_TOKEN_CAP);
    }
    let query = build_query(&terms);
    if query.is_empty() {
        return Vec::new();
    }

    docs.search(&query, SNIPPET_TOP_K, &SearchFilter::default())
        .into_iter()
        .map(|snippet| PlannerSnippet {
            doc_id: snippet.doc_id,
            chunk_id: snippet.chunk_id,
            snippet: snippet.snippet,
            source_name: snippet.source_name,
            category: snippet.category,
        })
        .collect()
}

/// Quoted OR query so multi-word phrases stay intact at the search seam.
fn build_query(terms: &[String]) -> String {
    terms
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Pull up to `cap` new word-like tokens out of free text. Tokens start
/// alphanumeric and may continue with dots, dashes, and underscores, so
/// adapter ids and hostnames survive intact.
fn add_tokens(target: &mut Vec<String>, seen: &mut HashSet<String>, value: &str, cap: usize) {
    let mut added = 0usize;
    let mut current = String::new();
    let mut flush = |current: &mut String, target: &mut Vec<String>, seen: &mut HashSet<String>, added: &mut usize| {
        if !current.is_empty() {
            if *added < cap && seen.insert(current.clone()) {
                target.push(std::mem::take(current));
                *added += 1;
            } else {
                current.clear();
            }
        }
    };
    for c in value.chars() {
        let continues = c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-';
        if current.is_empty() {
            if c.is_ascii_alphanumeric() {
                current.push(c);
            }
        } else if continues {
            current.push(c);
        } else {
            flush(&mut current, target, seen, &mut added);
            if added >= cap {
                return;
            }
        }
    }
    flush(&mut current, target, seen, &mut added);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(value: &str, cap: usize) -> Vec<String> {
        let mut target = Vec::new();
        let mut seen = HashSet::new();
        add_tokens(&mut target, &mut seen, value, cap);
        target
    }

    #[test]
    fn tokenizer_keeps_ids_and_hosts_intact() {
        let terms = tokens("run web.surface.discover.http on example.com!", 10);
        assert!(terms.contains(&"web.surface.discover.http".to_string()));
        assert!(terms.contains(&"example.com".to_string()));
    }

    #[test]
    fn tokenizer_respects_cap_and_dedupes() {
        let terms = tokens("alpha beta alpha gamma delta", 3);
        assert_eq!(terms, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn query_quotes_and_escapes() {
        let query = build_query(&["mixed content".to_string(), "he said \"hi\"".to_string()]);
        assert_eq!(query, "\"mixed content\" OR \"he said \"\"hi\"\"\"");
    }

    #[test]
    fn empty_terms_empty_query() {
        assert!(build_query(&[]).is_empty());
        assert!(build_query(&["  ".to_string()]).is_empty());
    }
}
