//! Finding candidate generation
//!
//! Applies the baseline ruleset to a web surface artifact and its captured
//! response evidence: missing security headers, mixed content, auth
//! surface, admin-like endpoints, directory listings, exposure hints, and
//! large script surfaces. Each hit becomes a candidate for triage.

use crate::artifacts::{
    Confidence, FindingCandidate, FindingEvidence, FindingRef, Severity, WebSurface,
};
use crate::builtin::{load_input, param_bool, param_str, param_usize, resolve_path};
use crate::manifest::{AdapterManifest, RiskLevel};
use crate::registry::{
    Adapter, AdapterArtifact, AdapterContext, AdapterLogEntry, ExecutionResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use surveyor_core::{Error, Result};
use surveyor_store::SearchFilter;

pub const ADAPTER_ID: &str = "findings.candidates.from_web_surface";

const BASE_HEADERS: [&str; 6] = [
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
    "referrer-policy",
    "permissions-policy",
];

const ADMIN_PATHS: [&str; 3] = ["/admin", "/dashboard", "/manage"];

#[derive(Deserialize)]
struct EvidenceResponse {
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body_sample: String,
    #[serde(skip)]
    path: Option<String>,
}

pub struct CandidatesAdapter {
    manifest: AdapterManifest,
}

impl Default for CandidatesAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidatesAdapter {
    pub fn new() -> Self {
        Self {
            manifest: AdapterManifest {
                id: ADAPTER_ID.into(),
                name: "Findings Candidates from Web Surface".into(),
                description: "Generate analysis candidates from web surface discovery artifacts."
                    .into(),
                category: "analysis".into(),
                risk_default: RiskLevel::Passive,
                version: "1.0.0".into(),
                inputs: vec!["web_surface.json".into()],
                outputs: vec!["findings_candidates.json".into()],
                params_schema: json!({
                    "type": "object",
                    "properties": {
                        "target": { "type": "string" },
                        "ruleset": { "type": "string", "enum": ["baseline"] },
                        "max_candidates": { "type": "integer", "minimum": 1 },
                        "include_kb_refs": { "type": "boolean" },
                        "kb_query_boost_terms": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["target"],
                    "additionalProperties": false
                }),
                artifact_schemas: HashMap::new(),
                tags: vec!["findings".into()],
            },
        }
    }
}

#[async_trait]
impl Adapter for CandidatesAdapter {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        inputs: &[AdapterArtifact],
        ctx: &AdapterContext,
    ) -> Result<ExecutionResult> {
        let target = param_str(params, "target");
        if target.is_empty() {
            return Err(Error::validation("target is required"));
        }
        if let Some(mission) = &ctx.mission {
            if !mission.scope_targets.is_empty() && !mission.scope_targets.contains(&target) {
                return Err(Error::ScopeViolation(format!(
                    "target not in scope: {target}"
                )));
            }
        }
        let max_candidates = param_usize(params, "max_candidates", 50, 1);
        let include_kb_refs = param_bool(params, "include_kb_refs", true);
        let boost_terms: Vec<String> = params
            .get("kb_query_boost_terms")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let surface: WebSurface = load_input(inputs, "web_surface.json", ctx)?;
        let responses = load_evidence_responses(&surface, &ctx.project_root);

        let mut candidates: Vec<FindingCandidate> = Vec::new();

        let missing = detect_missing_headers(&responses);
        if !missing.is_empty() {
            let header_names: Vec<&str> = missing.iter().map(|(h, _)| *h).collect();
            candidates.push(candidate(
                "missing_security_headers",
                "Missing common security headers",
                format!("Missing headers: {}.", header_names.join(", ")),
                missing
                    .into_iter()
                    .map(|(header, path)| FindingEvidence {
                        kind: "header".into(),
                        value: format!("missing: {header}"),
                        path,
                    })
                    .collect(),
            ));
        }

        let mixed = detect_mixed_content(&target, &surface);
        if !mixed.is_empty() {
            candidates.push(candidate(
                "mixed_content_links",
                "Mixed content links detected",
                "HTTP resources discovered on an HTTPS target.".into(),
                url_evidence(&mixed, 5),
            ));
        }

        let auth = detect_auth_surface(&responses, &surface);
        if !auth.is_empty() {
            candidates.push(candidate(
                "authentication_surface_present",
                "Authentication surface present",
                "Login or password-related forms detected.".into(),
                auth.into_iter().take(5).collect(),
            ));
        }

        let admin = detect_admin_endpoints(&surface);
        if !admin.is_empty() {
            candidates.push(candidate(
                "sensitive_endpoint_discovered",
                "Sensitive endpoint discovered",
                "Admin-like endpoints were discovered on the surface.".into(),
                url_evidence(&admin, 5),
            ));
        }

        let listings = detect_directory_listing(&responses);
        if !listings.is_empty() {
            candidates.push(candidate(
                "directory_listing_indicator",
                "Directory listing indicator",
                "Response content indicates a possible directory listing.".into(),
                listings.into_iter().take(3).collect(),
            ));
        }

        let hints = detect_exposure_hints(&surface);
        if !hints.is_empty() {
            candidates.push(candidate(
                "exposure_hints_detected",
                "Exposure hints detected",
                "Robots or sitemap references were discovered.".into(),
                url_evidence(&hints, 3),
            ));
        }

        let (script_count, script_sample) = detect_large_js_surface(&surface);
        if script_count >= 10 {
            candidates.push(candidate(
                "client_side_surface_large",
                "Client-side surface large",
                format!("Discovered {script_count} script assets."),
                url_evidence(&script_sample, 5),
            ));
        }

        candidates.truncate(max_candidates);
        if include_kb_refs {
            attach_kb_refs(&mut candidates, &boost_terms, ctx);
        }
        for (index, entry) in candidates.iter_mut().enumerate() {
            entry.id = format!("cand_{:03}", index + 1);
        }

        let count = candidates.len();
        let artifact = crate::artifacts::FindingsCandidates {
            target,
            timestamp: surveyor_core::now().to_rfc3339(),
            source_artifacts: vec!["web_surface.json".into()],
            candidates,
        };

        Ok(ExecutionResult {
            logs: vec![AdapterLogEntry::info("candidate generation complete")
                .with_data(json!({ "candidates": count }))],
            artifacts: vec![AdapterArtifact::inline(
                "findings_candidates.json",
                serde_json::to_value(&artifact)?,
            )],
            warnings: Vec::new(),
            metrics: None,
        })
    }
}

fn load_evidence_responses(surface: &WebSurface, project_root: &Path) -> Vec<EvidenceResponse> {
    let mut responses = Vec::new();
    for entry in &surface.evidence {
        if entry.kind != "http_response" {
            continue;
        }
        let resolved = resolve_path(project_root, Path::new(&entry.path));
        let Ok(raw) = std::fs::read_to_string(&resolved) else {
            continue;
        };
        let Ok(mut parsed) = serde_json::from_str::<EvidenceResponse>(&raw) else {
            continue;
        };
        parsed.path = Some(entry.path.clone());
        responses.push(parsed);
    }
    responses
}

fn detect_missing_headers(
    responses: &[EvidenceResponse],
) -> Vec<(&'static str, Option<String>)> {
    if responses.is_empty() {
        return Vec::new();
    }
    let mut seen: HashSet<String> = HashSet::new();
    for response in responses {
        for key in response.headers.keys() {
            seen.insert(key.to_lowercase());
        }
    }
    let first_path = responses[0].path.clone();
    BASE_HEADERS
        .iter()
        .filter(|header| !seen.contains(**header))
        .map(|header| (*header, first_path.clone()))
        .collect()
}

fn detect_mixed_content(target: &str, surface: &WebSurface) -> Vec<String> {
    if !target.starts_with("https://") {
        return Vec::new();
    }
    let mut urls: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for url in surface
        .urls
        .iter()
        .map(|u| u.url.as_str())
        .chain(surface.links.iter().map(|l| l.url.as_str()))
    {
        if url.starts_with("http://") && seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }
    urls
}

fn detect_auth_surface(
    responses: &[EvidenceResponse],
    surface: &WebSurface,
) -> Vec<FindingEvidence> {
    let mut evidence: Vec<FindingEvidence> = surface
        .forms
        .iter()
        .map(|form| FindingEvidence {
            kind: "url".into(),
            value: form.action.clone(),
            path: None,
        })
        .collect();
    for response in responses {
        if response.body_sample.contains("type=\"password\"")
            || response.body_sample.contains("type='password'")
        {
            evidence.push(FindingEvidence {
                kind: "html".into(),
                value: "password input detected".into(),
                path: response.path.clone(),
            });
            break;
        }
    }
    evidence
}

fn detect_admin_endpoints(surface: &WebSurface) -> Vec<String> {
    let mut urls = Vec::new();
    let mut seen = HashSet::new();
    for url in surface
        .urls
        .iter()
        .map(|u| u.url.as_str())
        .chain(surface.links.iter().map(|l| l.url.as_str()))
    {
        let lower = url.to_lowercase();
        if ADMIN_PATHS.iter().any(|p| lower.contains(p)) && seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }
    urls
}

fn detect_directory_listing(responses: &[EvidenceResponse]) -> Vec<FindingEvidence> {
    responses
        .iter()
        .filter(|response| {
            response.body_sample.contains("Index of /")
                || response.body_sample.contains("Directory listing")
        })
        .map(|response| FindingEvidence {
            kind: "html".into(),
            value: "directory listing indicator".into(),
            path: response.path.clone(),
        })
        .collect()
}

fn detect_exposure_hints(surface: &WebSurface) -> Vec<String> {
    let mut urls = Vec::new();
    let mut seen = HashSet::new();
    for url in surface
        .urls
        .iter()
        .map(|u| u.url.as_str())
        .chain(surface.links.iter().map(|l| l.url.as_str()))
    {
        let lower = url.to_lowercase();
        if (lower.ends_with("/robots.txt") || lower.ends_with("/sitemap.xml"))
            && seen.insert(url.to_string())
        {
            urls.push(url.to_string());
        }
    }
    urls
}

fn detect_large_js_surface(surface: &WebSurface) -> (usize, Vec<String>) {
    let scripts: Vec<&str> = surface
        .urls
        .iter()
        .filter(|entry| {
            entry.url.to_lowercase().ends_with(".js")
                || entry.source.as_deref() == Some("script")
        })
        .map(|entry| entry.url.as_str())
        .collect();
    let sample = scripts.iter().take(5).map(|s| s.to_string()).collect();
    (scripts.len(), sample)
}

fn url_evidence(urls: &[String], limit: usize) -> Vec<FindingEvidence> {
    urls.iter()
        .take(limit)
        .map(|url| FindingEvidence {
            kind: "url".into(),
            value: url.clone(),
            path: None,
        })
        .collect()
}

fn candidate(
    finding_type: &str,
    title: &str,
    description: String,
    evidence: Vec<FindingEvidence>,
) -> FindingCandidate {
    FindingCandidate {
        id: "cand".into(),
        finding_type: finding_type.into(),
        title: title.into(),
        description,
        evidence,
        confidence: Confidence::Medium,
        severity_hint: severity_hint(finding_type),
        tags: tags(finding_type),
        refs: Vec::new(),
    }
}

fn severity_hint(finding_type: &str) -> Severity {
    match finding_type {
        "missing_security_headers" | "mixed_content_links" => Severity::Medium,
        "authentication_surface_present" | "sensitive_endpoint_discovered" => Severity::Low,
        "directory_listing_indicator" => Severity::High,
        _ => Severity::Info,
    }
}

fn tags(finding_type: &str) -> Vec<String> {
    let tag = match finding_type {
        "missing_security_headers" => "headers",
        "mixed_content_links" => "mixed-content",
        "authentication_surface_present" => "auth",
        "sensitive_endpoint_discovered" => "sensitive",
        "directory_listing_indicator" => "directory-listing",
        "exposure_hints_detected" => "exposure",
        "client_side_surface_large" => "javascript",
        _ => return Vec::new(),
    };
    vec![tag.to_string()]
}

fn attach_kb_refs(candidates: &mut [FindingCandidate], boost_terms: &[String], ctx: &AdapterContext) {
    for entry in candidates.iter_mut() {
        let phrase = entry.finding_type.replace('_', " ");
        let mut terms = vec![phrase.clone(), format!("{phrase} explanation")];
        terms.extend(boost_terms.iter().cloned());
        let query = terms
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR ");
        let snippets = ctx.docs.search(&query, 2, &SearchFilter::default());
        entry.refs = snippets
            .into_iter()
            .map(|snippet| FindingRef {
                source: "kb".into(),
                doc_id: snippet.doc_id,
                chunk_id: snippet.chunk_id,
                label: Some(snippet.source_name),
            })
            .collect();
    }
}
