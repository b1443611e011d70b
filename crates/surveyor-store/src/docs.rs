//! Knowledge search
//!
//! The planner and the analysis adapters ground their output in short
//! chunks retrieved from an indexed knowledge base. The search seam is a
//! trait so deployments can plug in a real index while tests and the
//! default wiring stay offline.

use serde::{Deserialize, Serialize};

/// One retrieved knowledge-base chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocSnippet {
    /// Document the chunk belongs to.
    pub doc_id: String,
    /// Chunk within the document.
    pub chunk_id: String,
    /// The excerpt itself.
    pub snippet: String,
    /// Human-readable source, e.g. a file name or document title.
    pub source_name: String,
    /// Relevance to the query, higher is better.
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Narrows a search to particular documents or categories.
#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    pub doc_ids: Vec<String>,
    pub categories: Vec<String>,
}

impl SearchFilter {
    fn matches(&self, snippet: &DocSnippet) -> bool {
        let doc_ok = self.doc_ids.is_empty() || self.doc_ids.contains(&snippet.doc_id);
        let category_ok = self.categories.is_empty()
            || snippet
                .category
                .as_ref()
                .map_or(false, |c| self.categories.contains(c));
        doc_ok && category_ok
    }
}

pub trait DocsSearch: Send + Sync {
    /// Return up to `top_k` snippets relevant to `query`, best first,
    /// each carrying its relevance score.
    fn search(&self, query: &str, top_k: usize, filter: &SearchFilter) -> Vec<DocSnippet>;
}

/// Search that never returns anything. Planning degrades gracefully
/// without snippets, so this is the default when no index is configured.
#[derive(Default)]
pub struct NoopDocsSearch;

impl DocsSearch for NoopDocsSearch {
    fn search(&self, _query: &str, _top_k: usize, _filter: &SearchFilter) -> Vec<DocSnippet> {
        Vec::new()
    }
}

/// Fixed snippet set scored by case-insensitive term overlap. Used for
/// bundled documentation and in tests.
pub struct StaticDocsSearch {
    snippets: Vec<DocSnippet>,
}

impl StaticDocsSearch {
    pub fn new(snippets: Vec<DocSnippet>) -> Self {
        Self { snippets }
    }

    fn overlap(query_terms: &[String], snippet: &DocSnippet) -> usize {
        let haystack = format!(
            "{} {} {}",
            snippet.doc_id, snippet.source_name, snippet.snippet
        )
        .to_lowercase();
        query_terms
            .iter()
            .filter(|term| haystack.contains(term.as_str()))
            .count()
    }
}

impl DocsSearch for StaticDocsSearch {
    fn search(&self, query: &str, top_k: usize, filter: &SearchFilter) -> Vec<DocSnippet> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.trim_matches('"').to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let mut scored: Vec<(usize, &DocSnippet)> = self
            .snippets
            .iter()
            .filter(|s| filter.matches(s))
            .map(|s| (Self::overlap(&terms, s), s))
            .filter(|(overlap, _)| *overlap > 0 || terms.is_empty())
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(top_k)
            .map(|(overlap, s)| {
                let mut hit = s.clone();
                hit.score = overlap as f32;
                hit
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(doc_id: &str, chunk_id: &str, snippet: &str, category: &str) -> DocSnippet {
        DocSnippet {
            doc_id: doc_id.into(),
            chunk_id: chunk_id.into(),
            snippet: snippet.into(),
            source_name: format!("{doc_id}.md"),
            score: 0.0,
            category: Some(category.into()),
        }
    }

    fn fixture() -> StaticDocsSearch {
        StaticDocsSearch::new(vec![
            snippet(
                "kb-web-discovery",
                "chunk-1",
                "Crawls a target and records reachable pages",
                "discover",
            ),
            snippet(
                "kb-finding-triage",
                "chunk-1",
                "Ranks candidate findings by severity and confidence",
                "triage",
            ),
        ])
    }

    #[test]
    fn ranks_by_term_overlap_and_scores_hits() {
        let docs = fixture();
        let results = docs.search("crawl target pages", 5, &SearchFilter::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_id, "kb-web-discovery");
        assert_eq!(results[0].chunk_id, "chunk-1");
        assert_eq!(results[0].source_name, "kb-web-discovery.md");
        assert_eq!(results[0].score, 3.0);
    }

    #[test]
    fn filter_restricts_categories() {
        let docs = fixture();
        let filter = SearchFilter {
            categories: vec!["triage".into()],
            ..Default::default()
        };
        let results = docs.search("findings severity", 5, &filter);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_id, "kb-finding-triage");
    }

    #[test]
    fn filter_restricts_doc_ids() {
        let docs = fixture();
        let filter = SearchFilter {
            doc_ids: vec!["kb-finding-triage".into()],
            ..Default::default()
        };
        assert!(docs.search("crawl target pages", 5, &filter).is_empty());
    }

    #[test]
    fn top_k_caps_results() {
        let docs = fixture();
        let results = docs.search("kb", 1, &SearchFilter::default());
        assert_eq!(results.len(), 1);
    }
}
