//! Verification engine.
//!
//! The unit of verification is the cluster: members are tried in document
//! order until one verifies. Each citation walks a fixed strategy chain
//! (structured API lookup, structured API search, ranked HTML fallbacks)
//! under a total time budget. A single 429 from the structured API poisons
//! both structured strategies for the remainder of the request; the HTML
//! chain still runs, which is what keeps rate-limited requests from coming
//! back entirely unverified.

pub mod api;
pub mod fallback;
pub mod jurisdiction;

pub use api::{ApiCandidate, ApiOutcome, CitationApi, HttpCitationApi, VerifiedRecord};

use crate::config::Config;
use crate::fetch::HttpFetch;
use crate::types::{Citation, Cluster, VerificationSource};
use api::{SelectionRules, select_candidate};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request-scoped rate-limit latch. Once set it is never cleared; the
/// structured API is not consulted again within the request.
#[derive(Debug, Default)]
pub struct RateLimitState {
    limited: AtomicBool,
}

impl RateLimitState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.limited.load(Ordering::Relaxed)
    }

    pub fn mark_limited(&self) {
        self.limited.store(true, Ordering::Relaxed);
    }
}

/// Upstream trouble observed while verifying one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyStats {
    pub rate_limited: bool,
    pub upstream_errors: usize,
}

/// Drives the strategy chain for each cluster of a request.
pub struct Verifier {
    api: Arc<dyn CitationApi>,
    fetch: Arc<dyn HttpFetch>,
    fallback_order: Vec<String>,
    per_call_timeout: Duration,
    per_citation_budget: Duration,
    name_similarity_threshold: f64,
    year_tolerance: i32,
    jurisdiction_overrides: BTreeMap<String, Vec<String>>,
}

impl Verifier {
    #[must_use]
    pub fn new(config: &Config, api: Arc<dyn CitationApi>, fetch: Arc<dyn HttpFetch>) -> Self {
        Self {
            api,
            fetch,
            fallback_order: config.fallback_source_order.clone(),
            per_call_timeout: config.per_call_timeout(),
            per_citation_budget: config.per_citation_budget(),
            name_similarity_threshold: config.name_similarity_threshold,
            year_tolerance: config.year_tolerance_verify,
            jurisdiction_overrides: config.jurisdiction_map.clone(),
        }
    }

    /// Verify one cluster: members in document order until a success.
    /// Returns true when some member verified.
    pub async fn verify_cluster<'a>(
        &'a self,
        citations: &'a mut [Citation],
        cluster: &'a Cluster,
        state: &'a RateLimitState,
        stats: &'a mut VerifyStats,
    ) -> bool {
        for &idx in &cluster.members {
            if self.verify_citation(&mut citations[idx], state, stats).await {
                info!(
                    cluster = cluster.id,
                    citation = %citations[idx].text,
                    source = ?citations[idx].verification_source,
                    "cluster verified"
                );
                return true;
            }
        }
        debug!(cluster = cluster.id, "no member verified");
        false
    }

    /// Verify a single citation under the per-citation budget.
    async fn verify_citation<'a>(
        &'a self,
        citation: &'a mut Citation,
        state: &'a RateLimitState,
        stats: &'a mut VerifyStats,
    ) -> bool {
        let outcome = tokio::time::timeout(
            self.per_citation_budget,
            self.run_strategies(citation, state, stats),
        )
        .await;

        match outcome {
            Ok(Some((record, source))) => {
                citation.canonical_name = record.canonical_name;
                citation.canonical_date = record.canonical_date;
                citation.canonical_url = record.canonical_url;
                citation.verification_source = Some(source);
                citation.verified = true;
                citation.true_by_parallel = false;
                true
            }
            Ok(None) => false,
            Err(_) => {
                warn!(citation = %citation.text, "verification budget exhausted");
                false
            }
        }
    }

    async fn run_strategies<'a>(
        &'a self,
        citation: &'a Citation,
        state: &'a RateLimitState,
        stats: &'a mut VerifyStats,
    ) -> Option<(VerifiedRecord, VerificationSource)> {
        let variants = crate::normalize::variants_for_text(&citation.text);
        let rules = SelectionRules {
            name_similarity_threshold: self.name_similarity_threshold,
            year_tolerance: self.year_tolerance,
            jurisdiction_overrides: &self.jurisdiction_overrides,
        };

        // Strategy 1: structured API lookup.
        if !state.is_limited() {
            match self.api.lookup(&citation.text).await {
                ApiOutcome::Candidates(candidates) => {
                    if let Some(record) =
                        select_candidate(&candidates, citation, &variants, &rules)
                    {
                        return Some((record, VerificationSource::CitationApi));
                    }
                }
                ApiOutcome::RateLimited(info) => {
                    warn!(
                        citation = %citation.text,
                        retry_after = ?info.retry_after,
                        remaining = ?info.remaining,
                        "structured API rate limited; skipping it for this request"
                    );
                    state.mark_limited();
                    stats.rate_limited = true;
                }
                ApiOutcome::NotFound => {}
                ApiOutcome::Error(msg) => {
                    debug!(citation = %citation.text, error = %msg, "lookup errored");
                    stats.upstream_errors += 1;
                }
            }
        }

        // Strategy 2: structured API search. Skipped entirely after a rate
        // limit; a second call to the same upstream would burn the window.
        if !state.is_limited() {
            match self.api.search(&citation.text).await {
                ApiOutcome::Candidates(candidates) => {
                    if let Some(record) =
                        select_candidate(&candidates, citation, &variants, &rules)
                    {
                        return Some((record, VerificationSource::CitationApiSearch));
                    }
                }
                ApiOutcome::RateLimited(_) => {
                    state.mark_limited();
                    stats.rate_limited = true;
                }
                ApiOutcome::NotFound => {}
                ApiOutcome::Error(msg) => {
                    debug!(citation = %citation.text, error = %msg, "search errored");
                    stats.upstream_errors += 1;
                }
            }
        }

        // Strategy 3: ranked HTML fallbacks.
        fallback::run_fallbacks(
            citation,
            &self.fallback_order,
            Arc::clone(&self.fetch),
            self.per_call_timeout,
            self.name_similarity_threshold,
            self.year_tolerance,
        )
        .await
    }
}
