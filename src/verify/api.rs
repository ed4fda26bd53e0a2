//! Structured citation API client and candidate selection.
//!
//! Strategy 1 POSTs a normalized citation to the lookup endpoint; strategy 2
//! hits the search endpoint with the same contract. A 429 status, or any
//! body mentioning a rate limit, becomes `ApiOutcome::RateLimited` and is
//! never retried within a request. Candidate selection is a pure function
//! so the acceptance rules can be tested without any I/O.

use crate::fetch::{FetchFailure, HttpFetch, RateLimitInfo};
use crate::similarity::name_similarity;
use crate::types::Citation;
use crate::verify::jurisdiction::jurisdiction_allows;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One candidate cluster from the structured API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCandidate {
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub case_name: Option<String>,
    #[serde(default)]
    pub docket: Option<ApiDocket>,
    #[serde(default)]
    pub decision_date: Option<String>,
    #[serde(default)]
    pub absolute_url: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
}

/// Docket sub-object some responses nest the case name under when the
/// top-level field is null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiDocket {
    #[serde(default)]
    pub case_name: Option<String>,
}

impl ApiCandidate {
    /// Top-level case name, falling through to `docket.case_name`.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.case_name
            .as_deref()
            .or_else(|| self.docket.as_ref().and_then(|d| d.case_name.as_deref()))
    }

    /// Four-digit decision year, when the date parses.
    #[must_use]
    pub fn decision_year(&self) -> Option<i32> {
        let date = self.decision_date.as_deref()?;
        let digits: String = date.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.len() >= 4 {
            digits[..4].parse().ok()
        } else {
            None
        }
    }
}

/// Outcome of one structured-API call.
#[derive(Debug, Clone)]
pub enum ApiOutcome {
    Candidates(Vec<ApiCandidate>),
    NotFound,
    RateLimited(RateLimitInfo),
    /// Transport-level failure; treated as not-found for control flow but
    /// counted toward the upstream-unavailable warning.
    Error(String),
}

/// The two endpoints of the structured citation API.
#[async_trait]
pub trait CitationApi: Send + Sync {
    async fn lookup(&self, citation_text: &str) -> ApiOutcome;
    async fn search(&self, query: &str) -> ApiOutcome;
}

/// Production client speaking to the real API through the shared fetcher.
pub struct HttpCitationApi {
    fetch: Arc<dyn HttpFetch>,
    lookup_url: String,
    search_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpCitationApi {
    #[must_use]
    pub fn new(
        fetch: Arc<dyn HttpFetch>,
        lookup_url: String,
        search_url: String,
        token: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetch,
            lookup_url,
            search_url,
            token,
            timeout,
        }
    }

    async fn call(&self, url: &str, text: &str) -> ApiOutcome {
        let body = serde_json::json!({ "text": text });
        let response = self
            .fetch
            .post_json(url, body, self.token.as_deref(), self.timeout)
            .await;
        match response {
            Ok(r) if r.status == 429 => {
                warn!(url, "structured API rate limited");
                ApiOutcome::RateLimited(r.rate_limit)
            }
            Ok(r) if r.body.to_lowercase().contains("rate limit") => {
                warn!(url, "structured API reported a rate limit in the body");
                ApiOutcome::RateLimited(r.rate_limit)
            }
            Ok(r) if (200..300).contains(&r.status) => {
                let candidates = parse_candidates(&r.body);
                if candidates.is_empty() {
                    ApiOutcome::NotFound
                } else {
                    ApiOutcome::Candidates(candidates)
                }
            }
            Ok(r) => {
                debug!(url, status = r.status, "structured API miss");
                ApiOutcome::NotFound
            }
            Err(FetchFailure::Timeout) => ApiOutcome::Error("lookup timed out".into()),
            Err(FetchFailure::Transport(msg)) => ApiOutcome::Error(msg),
        }
    }
}

#[async_trait]
impl CitationApi for HttpCitationApi {
    async fn lookup(&self, citation_text: &str) -> ApiOutcome {
        self.call(&self.lookup_url, citation_text).await
    }

    async fn search(&self, query: &str) -> ApiOutcome {
        self.call(&self.search_url, query).await
    }
}

/// Pull candidate clusters from a response body. Accepts both a bare
/// candidate array and the wrapped form where each entry nests its
/// candidates under `clusters`.
#[must_use]
pub fn parse_candidates(body: &str) -> Vec<ApiCandidate> {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let mut out = Vec::new();
    let entries = match &value {
        serde_json::Value::Array(items) => items.as_slice(),
        serde_json::Value::Object(_) => std::slice::from_ref(&value),
        _ => return Vec::new(),
    };
    for entry in entries {
        if let Some(clusters) = entry.get("clusters").and_then(|c| c.as_array()) {
            for cluster in clusters {
                if let Ok(c) = serde_json::from_value::<ApiCandidate>(cluster.clone()) {
                    out.push(c);
                }
            }
        } else if let Ok(c) = serde_json::from_value::<ApiCandidate>(entry.clone()) {
            if c.name().is_some() || !c.citations.is_empty() {
                out.push(c);
            }
        }
    }
    out
}

/// Canonical fields produced by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRecord {
    pub canonical_name: Option<String>,
    pub canonical_date: Option<String>,
    pub canonical_url: Option<String>,
}

/// Acceptance thresholds for candidate selection.
#[derive(Debug, Clone)]
pub struct SelectionRules<'a> {
    pub name_similarity_threshold: f64,
    pub year_tolerance: i32,
    pub jurisdiction_overrides: &'a BTreeMap<String, Vec<String>>,
}

/// Repair a truncated or suspiciously short upstream name by preferring the
/// name the document itself uses.
#[must_use]
pub fn repair_canonical_name(candidate: Option<&str>, extracted: Option<&str>) -> Option<String> {
    match (candidate, extracted) {
        (Some(c), Some(e)) => {
            let truncated = c.ends_with("...")
                || c.chars().count() < 20
                || c.chars().count() + 10 < e.chars().count();
            if truncated {
                Some(e.to_string())
            } else {
                Some(c.to_string())
            }
        }
        (Some(c), None) => Some(c.to_string()),
        (None, Some(e)) => Some(e.to_string()),
        (None, None) => None,
    }
}

/// Whether any of the candidate's citation strings normalizes to one of the
/// target's variants.
fn cites_target(candidate: &ApiCandidate, citation: &Citation, variants: &[String]) -> bool {
    candidate.citations.iter().any(|raw| {
        let normalized = crate::normalize::normalize(raw).unwrap_or_else(|| raw.trim().to_string());
        normalized == citation.text || variants.iter().any(|v| *v == normalized || *v == raw.trim())
    })
}

/// Iterate candidates and accept the first satisfying every check. Returning
/// `None` rather than the first candidate is a hard rule; a plausible but
/// unchecked candidate is worse than no candidate.
#[must_use]
pub fn select_candidate(
    candidates: &[ApiCandidate],
    citation: &Citation,
    variants: &[String],
    rules: &SelectionRules<'_>,
) -> Option<VerifiedRecord> {
    for candidate in candidates {
        if !cites_target(candidate, citation, variants) {
            continue;
        }

        if let Some(jur) = candidate.jurisdiction.as_deref() {
            if !jurisdiction_allows(citation.reporter_family, jur, rules.jurisdiction_overrides) {
                debug!(
                    citation = %citation.text,
                    jurisdiction = jur,
                    "candidate rejected by jurisdiction check"
                );
                continue;
            }
        }

        if let (Some(extracted), Some(decided)) = (citation.extracted_year, candidate.decision_year())
        {
            let diff = (decided - extracted).abs();
            if diff > rules.year_tolerance {
                debug!(
                    citation = %citation.text,
                    extracted,
                    decided,
                    "candidate rejected by year check"
                );
                continue;
            }
            if diff >= 3 {
                warn!(
                    citation = %citation.text,
                    extracted,
                    decided,
                    "year differs by {diff} but is within tolerance"
                );
            }
        }

        if let Some(extracted_name) = citation.extracted_case_name.as_deref() {
            match candidate.name() {
                Some(candidate_name)
                    if name_similarity(candidate_name, extracted_name)
                        >= rules.name_similarity_threshold => {}
                _ => {
                    debug!(citation = %citation.text, "candidate rejected by name check");
                    continue;
                }
            }
        }

        return Some(VerifiedRecord {
            canonical_name: repair_canonical_name(
                candidate.name(),
                citation.extracted_case_name.as_deref(),
            ),
            canonical_date: candidate.decision_date.clone(),
            canonical_url: candidate.absolute_url.clone(),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReporterFamily;

    fn citation() -> Citation {
        let mut c = Citation::new(
            "388 P.3d 977".into(),
            "388 P.3d 977".into(),
            0,
            12,
            "P.3d".into(),
            "388".into(),
            "977".into(),
            ReporterFamily::Pacific,
        );
        c.extracted_case_name =
            Some("Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians".into());
        c.extracted_year = Some(2017);
        c
    }

    fn candidate(name: &str, date: &str, jur: &str) -> ApiCandidate {
        ApiCandidate {
            citations: vec!["388 P.3d 977".into()],
            case_name: Some(name.into()),
            docket: None,
            decision_date: Some(date.into()),
            absolute_url: Some("https://api.example.com/opinion/1/".into()),
            jurisdiction: Some(jur.into()),
        }
    }

    fn rules(overrides: &BTreeMap<String, Vec<String>>) -> SelectionRules<'_> {
        SelectionRules {
            name_similarity_threshold: 0.6,
            year_tolerance: 5,
            jurisdiction_overrides: overrides,
        }
    }

    #[test]
    fn accepting_candidate_produces_canonical_fields() {
        let c = citation();
        let cands = vec![candidate(
            "Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians",
            "2017-01-23",
            "WA",
        )];
        let none = BTreeMap::new();
        let record =
            select_candidate(&cands, &c, &["388 P.3d 977".into()], &rules(&none)).unwrap();
        assert_eq!(
            record.canonical_name.as_deref(),
            Some("Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians")
        );
        assert_eq!(record.canonical_date.as_deref(), Some("2017-01-23"));
    }

    #[test]
    fn wrong_jurisdiction_is_rejected_even_when_everything_else_matches() {
        let c = citation();
        let cands = vec![candidate(
            "Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians",
            "2017-01-23",
            "Iowa",
        )];
        let none = BTreeMap::new();
        assert!(select_candidate(&cands, &c, &["388 P.3d 977".into()], &rules(&none)).is_none());
    }

    #[test]
    fn year_mismatch_beyond_tolerance_is_rejected() {
        let mut c = citation();
        c.extracted_year = Some(1980);
        let cands = vec![candidate(
            "Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians",
            "2024-06-01",
            "WA",
        )];
        let none = BTreeMap::new();
        assert!(select_candidate(&cands, &c, &["388 P.3d 977".into()], &rules(&none)).is_none());
    }

    #[test]
    fn dissimilar_candidate_name_is_rejected() {
        let c = citation();
        let cands = vec![candidate("Miranda v. Arizona", "2017-01-23", "WA")];
        let none = BTreeMap::new();
        assert!(select_candidate(&cands, &c, &["388 P.3d 977".into()], &rules(&none)).is_none());
    }

    #[test]
    fn candidate_missing_the_target_citation_is_skipped() {
        let c = citation();
        let mut cand = candidate(
            "Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians",
            "2017-01-23",
            "WA",
        );
        cand.citations = vec!["99 Wash.2d 1".into()];
        let none = BTreeMap::new();
        assert!(
            select_candidate(&[cand], &c, &["388 P.3d 977".into()], &rules(&none)).is_none()
        );
    }

    #[test]
    fn second_candidate_wins_when_the_first_fails_checks() {
        let c = citation();
        let bad = candidate("Miranda v. Arizona", "2017-01-23", "WA");
        let good = candidate(
            "Flying T Ranch v. Stillaguamish Tribe",
            "2017-01-23",
            "WA",
        );
        let none = BTreeMap::new();
        let record =
            select_candidate(&[bad, good], &c, &["388 P.3d 977".into()], &rules(&none)).unwrap();
        // The accepted name is repaired from the document because the
        // upstream form is more than ten characters shorter.
        assert_eq!(
            record.canonical_name.as_deref(),
            Some("Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians")
        );
    }

    #[test]
    fn truncated_upstream_names_are_repaired_from_the_document() {
        assert_eq!(
            repair_canonical_name(Some("Flying T Ranch..."), Some("Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians")),
            Some("Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians".to_string())
        );
        assert_eq!(
            repair_canonical_name(Some("Short v. A"), Some("Short Corporation v. Anderson")),
            Some("Short Corporation v. Anderson".to_string())
        );
        assert_eq!(
            repair_canonical_name(Some("A Perfectly Reasonable Name v. Another"), None),
            Some("A Perfectly Reasonable Name v. Another".to_string())
        );
    }

    #[test]
    fn docket_nested_name_is_used_when_top_level_is_null() {
        let cand = ApiCandidate {
            citations: vec!["388 P.3d 977".into()],
            case_name: None,
            docket: Some(ApiDocket {
                case_name: Some("Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians".into()),
            }),
            decision_date: Some("2017-01-23".into()),
            absolute_url: None,
            jurisdiction: Some("WA".into()),
        };
        assert_eq!(
            cand.name(),
            Some("Flying T Ranch, Inc. v. Stillaguamish Tribe of Indians")
        );
    }

    #[test]
    fn parse_candidates_handles_wrapped_and_bare_forms() {
        let wrapped = r#"[{"citation": "388 P.3d 977", "clusters": [
            {"citations": ["388 P.3d 977"], "case_name": "A v. B"}
        ]}]"#;
        assert_eq!(parse_candidates(wrapped).len(), 1);

        let bare = r#"[{"citations": ["388 P.3d 977"], "case_name": "A v. B"}]"#;
        assert_eq!(parse_candidates(bare).len(), 1);

        assert!(parse_candidates("not json").is_empty());
        assert!(parse_candidates("[]").is_empty());
    }
}
