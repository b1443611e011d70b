//! Passive web surface discovery
//!
//! Breadth-first GET crawl of a single origin, bounded by depth and page
//! count. Every response is sampled to an evidence file so later pipeline
//! stages can inspect headers and body content without refetching.

use crate::artifacts::{WebSurface, WebSurfaceEvidence, WebSurfaceForm, WebSurfaceLink, WebSurfaceUrl};
use crate::builtin::{param_bool, param_str, param_usize, relative_to_root};
use crate::manifest::{AdapterManifest, RiskLevel};
use crate::registry::{
    Adapter, AdapterArtifact, AdapterContext, AdapterLogEntry, ExecutionResult,
};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use surveyor_core::{Error, Result};

const SAMPLE_BODY_LIMIT: usize = 2000;
const DEFAULT_USER_AGENT: &str = "Surveyor-WebSurface";

pub const ADAPTER_ID: &str = "web.surface.discover.http";

struct QueueEntry {
    url: Url,
    depth: usize,
    source: &'static str,
}

pub struct DiscoverAdapter {
    manifest: AdapterManifest,
}

impl Default for DiscoverAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoverAdapter {
    pub fn new() -> Self {
        Self {
            manifest: AdapterManifest {
                id: ADAPTER_ID.into(),
                name: "Web Surface Discovery (HTTP)".into(),
                description: "Discover surface URLs on a target site using passive HTTP GETs."
                    .into(),
                category: "web".into(),
                risk_default: RiskLevel::Passive,
                version: "1.0.0".into(),
                inputs: vec![],
                outputs: vec!["web_surface.json".into()],
                params_schema: json!({
                    "type": "object",
                    "properties": {
                        "target_url": { "type": "string", "description": "Seed URL; the crawl never leaves its origin" },
                        "max_depth": { "type": "integer", "minimum": 0 },
                        "max_pages": { "type": "integer", "minimum": 1 },
                        "timeout_sec": { "type": "integer", "minimum": 1 },
                        "follow_redirects": { "type": "boolean" },
                        "user_agent": { "type": "string" }
                    },
                    "required": ["target_url"],
                    "additionalProperties": false
                }),
                artifact_schemas: HashMap::new(),
                tags: vec!["web".into(), "discovery".into()],
            },
        }
    }
}

#[async_trait]
impl Adapter for DiscoverAdapter {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        _inputs: &[AdapterArtifact],
        ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        let target_url = param_str(params, "target_url");
        if target_url.is_empty() {
            return Err(Error::validation("target_url is required"));
        }
        let seed = Url::parse(&target_url)
            .map_err(|e| Error::validation(format!("target_url invalid: {e}")))?;
        let max_depth = param_usize(params, "max_depth", 1, 0);
        let max_pages = param_usize(params, "max_pages", 25, 1);
        let timeout_sec = param_usize(params, "timeout_sec", 10, 1);
        let follow_redirects = param_bool(params, "follow_redirects", true);
        let user_agent = {
            let ua = param_str(params, "user_agent");
            if ua.is_empty() { DEFAULT_USER_AGENT.to_string() } else { ua }
        };

        let redirect = if follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .redirect(redirect)
            .timeout(Duration::from_secs(timeout_sec as u64))
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::adapter_error(ADAPTER_ID, e.to_string()))?;

        std::fs::create_dir_all(&ctx.evidence_dir)?;

        let mut queue = VecDeque::new();
        queue.push_back(QueueEntry { url: seed.clone(), depth: 0, source: "seed" });
        let mut visited: HashSet<String> = HashSet::new();
        let mut url_map: HashMap<String, WebSurfaceUrl> = HashMap::new();
        let mut url_order: Vec<String> = Vec::new();
        let mut links: Vec<WebSurfaceLink> = Vec::new();
        let mut forms: Vec<WebSurfaceForm> = Vec::new();
        let mut evidence: Vec<WebSurfaceEvidence> = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        let mut pages_fetched = 0usize;

        while let Some(current) = queue.pop_front() {
            if pages_fetched >= max_pages {
                break;
            }
            let current_str = current.url.to_string();
            if visited.contains(&current_str) {
                continue;
            }
            ctx.check_canceled()?;
            visited.insert(current_str.clone());
            pages_fetched += 1;

            let response = tokio::select! {
                result = client.get(current.url.clone()).send() => result,
                _ = ctx.cancel.cancelled() => return Err(Error::Canceled),
            };

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    ctx.log(
                        AdapterLogEntry::warn("fetch error")
                            .with_data(json!({ "url": current_str, "error": e.to_string() })),
                    );
                    notes.push(format!("Failed to fetch {current_str}: {e}"));
                    if current.depth == 0 {
                        return Err(Error::adapter_error(ADAPTER_ID, e.to_string()));
                    }
                    continue;
                }
            };

            let status = response.status().as_u16();
            let headers: HashMap<String, String> = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();
            let content_type = headers.get("content-type").cloned();
            let body = tokio::select! {
                result = response.text() => result.unwrap_or_default(),
                _ = ctx.cancel.cancelled() => return Err(Error::Canceled),
            };
            let sample: String = body.chars().take(SAMPLE_BODY_LIMIT).collect();

            if !url_map.contains_key(&current_str) {
                url_order.push(current_str.clone());
            }
            url_map.insert(
                current_str.clone(),
                WebSurfaceUrl {
                    url: current_str.clone(),
                    method: Some("GET".into()),
                    status: Some(status),
                    content_type: content_type.clone(),
                    source: Some(current.source.into()),
                },
            );

            let evidence_path = ctx.evidence_dir.join(format!("response-{pages_fetched}.json"));
            let payload = json!({
                "url": current_str,
                "status": status,
                "headers": headers,
                "body_sample": sample,
            });
            std::fs::write(&evidence_path, serde_json::to_string_pretty(&payload)?)?;
            evidence.push(WebSurfaceEvidence {
                kind: "http_response".into(),
                path: relative_to_root(&ctx.project_root, &evidence_path),
                description: Some(format!("Response sample for {current_str}")),
            });

            // Streamed so subscribers see crawl progress page by page.
            ctx.log(
                AdapterLogEntry::info("fetched url")
                    .with_data(json!({ "url": current_str, "status": status })),
            );

            let is_html = content_type
                .as_deref()
                .map_or(false, |ct| ct.contains("text/html"));
            if is_html && current.depth < max_depth {
                let parsed = parse_html(&body, &current.url)?;
                for link in &parsed.links {
                    links.push(link.clone());
                }
                for form in &parsed.forms {
                    forms.push(form.clone());
                }
                for (url, source) in parsed.queue {
                    if !visited.contains(url.as_str()) {
                        queue.push_back(QueueEntry { url, depth: current.depth + 1, source });
                    }
                }
            }
        }

        let urls: Vec<WebSurfaceUrl> = url_order
            .iter()
            .filter_map(|key| url_map.get(key).cloned())
            .collect();

        let surface = WebSurface {
            target: target_url,
            timestamp: surveyor_core::now().to_rfc3339(),
            urls,
            links,
            forms,
            notes,
            evidence,
        };

        Ok(ExecutionResult {
            logs: vec![AdapterLogEntry::info("crawl complete")
                .with_data(json!({ "pages_fetched": pages_fetched }))],
            artifacts: vec![AdapterArtifact::inline(
                "web_surface.json",
                serde_json::to_value(&surface)?,
            )],
            warnings: Vec::new(),
            metrics: None,
        })
    }
}

struct ParsedPage {
    links: Vec<WebSurfaceLink>,
    forms: Vec<WebSurfaceForm>,
    queue: Vec<(Url, &'static str)>,
}

fn parse_html(html: &str, base: &Url) -> Result<ParsedPage> {
    let mut links = Vec::new();
    let mut forms = Vec::new();
    let mut queue = Vec::new();

    for href in extract_attribute(html, "a", "href")? {
        if let Some(url) = normalize_url(&href, base) {
            links.push(WebSurfaceLink { url: url.to_string(), source: Some("anchor".into()) });
            queue.push((url, "anchor"));
        }
    }
    for src in extract_attribute(html, "script", "src")? {
        if let Some(url) = normalize_url(&src, base) {
            queue.push((url, "script"));
        }
    }
    for src in extract_attribute(html, "img", "src")? {
        if let Some(url) = normalize_url(&src, base) {
            queue.push((url, "image"));
        }
    }
    for (action, method) in extract_forms(html)? {
        if let Some(url) = normalize_url(&action, base) {
            forms.push(WebSurfaceForm { action: url.to_string(), method });
            queue.push((url, "form"));
        }
    }

    Ok(ParsedPage { links, forms, queue })
}

fn extract_attribute(html: &str, tag: &str, attr: &str) -> Result<Vec<String>> {
    let pattern = format!(r#"(?i)<{tag}[^>]*\s{attr}\s*=\s*["']([^"']+)["']"#);
    let re = compile(&pattern)?;
    Ok(re
        .captures_iter(html)
        .map(|captures| captures[1].to_string())
        .collect())
}

fn extract_forms(html: &str) -> Result<Vec<(String, String)>> {
    let form_re = compile(r"(?i)<form\b[^>]*>")?;
    let action_re = compile(r#"(?i)action\s*=\s*["']([^"']+)["']"#)?;
    let method_re = compile(r#"(?i)method\s*=\s*["']([^"']+)["']"#)?;
    let mut forms = Vec::new();
    for tag in form_re.find_iter(html) {
        let tag = tag.as_str();
        let Some(action) = action_re.captures(tag).map(|c| c[1].to_string()) else {
            continue;
        };
        let method = method_re
            .captures(tag)
            .map(|c| c[1].to_uppercase())
            .unwrap_or_else(|| "GET".to_string());
        forms.push((action, method));
    }
    Ok(forms)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Internal(format!("html pattern: {e}")))
}

/// Resolve a candidate against the base and keep it only when it stays on
/// the same http(s) origin. Fragments are stripped so duplicates collapse.
fn normalize_url(candidate: &str, base: &Url) -> Option<Url> {
    if candidate.is_empty()
        || candidate.starts_with('#')
        || candidate.starts_with("mailto:")
        || candidate.starts_with("javascript:")
    {
        return None;
    }
    let mut url = base.join(candidate).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    if url.origin() != base.origin() {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/index.html").expect("base url")
    }

    #[test]
    fn extracts_anchor_hrefs() {
        let html = r#"<a href="/about">About</a> <A HREF='/contact'>x</A>"#;
        let hrefs = extract_attribute(html, "a", "href").expect("regex");
        assert_eq!(hrefs, vec!["/about", "/contact"]);
    }

    #[test]
    fn normalize_rejects_offsite_and_unsafe_schemes() {
        assert!(normalize_url("https://other.com/x", &base()).is_none());
        assert!(normalize_url("mailto:x@example.com", &base()).is_none());
        assert!(normalize_url("javascript:void(0)", &base()).is_none());
        assert!(normalize_url("#anchor", &base()).is_none());
        let kept = normalize_url("/admin#frag", &base()).expect("same origin");
        assert_eq!(kept.as_str(), "https://example.com/admin");
    }

    #[test]
    fn extracts_forms_with_method_default() {
        let html = r#"<form action="/login" method="post"><input type="password"></form>
                      <form action="/search">x</form>"#;
        let forms = extract_forms(html).expect("regex");
        assert_eq!(forms[0], ("/login".to_string(), "POST".to_string()));
        assert_eq!(forms[1], ("/search".to_string(), "GET".to_string()));
    }
}
