//! The citation-processing pipeline.
//!
//! One entry point, `Pipeline::run`, executes the phase sequence for a
//! request: extraction, normalization, clustering, verification,
//! propagation, formatting. The same code runs inline for small inputs and
//! inside a worker for queued jobs; the only difference is who calls it and
//! whether anyone polls the progress it publishes.
//!
//! Cancellation is cooperative: the flag is checked at phase boundaries and
//! between clusters during verification, never mid-HTTP-call (per-call
//! timeouts bound those).

use crate::casename;
use crate::cluster::cluster_citations;
use crate::config::Config;
use crate::context;
use crate::error::CaseStrainerError;
use crate::format::{self, AnalysisResult};
use crate::normalize;
use crate::patterns;
use crate::types::{Citation, JobPhase};
use crate::verify::{RateLimitState, Verifier, VerifyStats};
use chrono::Datelike;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Progress sink invoked at every phase boundary with `(phase, percent)`.

pub struct Pipeline {
    config: Arc<Config>,
    verifier: Arc<Verifier>,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: Arc<Config>, verifier: Arc<Verifier>) -> Self {
        Self { config, verifier }
    }

    /// Extract every citation with its document-derived fields. Pure given
    /// the cleaned text and configuration.
    #[must_use]
    pub fn extract_citations(&self, text: &str) -> Vec<Citation> {
        let matches = patterns::find_citations(text);
        let spans: Vec<(usize, usize)> = matches.iter().map(|m| (m.start, m.end)).collect();
        let current_year = chrono::Utc::now().year();

        let mut citations = Vec::with_capacity(matches.len());
        let mut seen: Vec<(String, usize)> = Vec::new();
        for m in &matches {
            let normalized = normalize::normalized_text_with(m, &self.config.reporter_aliases);
            let key = (normalized.clone(), m.start);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);

            let window = context::isolate(text, m.start, m.end, &spans);
            let facts = casename::extract(&window, current_year);

            let mut citation = Citation::new(
                normalized,
                m.raw_text.clone(),
                m.start,
                m.end,
                normalize::canonical_reporter_with(&m.reporter, &self.config.reporter_aliases),
                m.volume.clone(),
                m.page.clone(),
                m.family,
            );
            citation.extracted_case_name = facts.case_name;
            citation.extracted_year = facts.year;
            citations.push(citation);
        }
        citations
    }

    /// Run the full phase sequence over cleaned source text.
    ///
    /// # Errors
    ///
    /// `JobCanceled` when the cancellation flag was observed at a phase
    /// boundary. Per-citation verification failures never surface here;
    /// they produce unverified citations instead.
    pub async fn run<'a>(
        &'a self,
        text: &'a str,
        source_url: Option<&'a str>,
        cancel: &'a AtomicBool,
        mut progress: impl FnMut(JobPhase, u8) + Send + 'a,
    ) -> Result<AnalysisResult, CaseStrainerError> {
        let started = Instant::now();
        let check = |cancel: &AtomicBool| -> Result<(), CaseStrainerError> {
            if cancel.load(Ordering::Relaxed) {
                Err(CaseStrainerError::JobCanceled)
            } else {
                Ok(())
            }
        };

        progress(JobPhase::Initializing, JobPhase::Initializing.percent_floor());
        check(cancel)?;

        // The dispatcher decodes input before the job exists, so these two
        // phases are progress markers here.
        if source_url.is_some() {
            progress(JobPhase::Fetching, JobPhase::Fetching.percent_floor());
        }
        progress(JobPhase::ExtractingText, JobPhase::ExtractingText.percent_floor());
        check(cancel)?;

        progress(
            JobPhase::ExtractingCitations,
            JobPhase::ExtractingCitations.percent_floor(),
        );
        let mut citations = self.extract_citations(text);
        debug!(count = citations.len(), "citations extracted");
        check(cancel)?;

        progress(JobPhase::Clustering, JobPhase::Clustering.percent_floor());
        let mut clusters = cluster_citations(&mut citations, &self.config.cluster_options());
        debug!(count = clusters.len(), "clusters formed");
        check(cancel)?;

        let mut stats = VerifyStats::default();
        if self.config.verification_enabled && !clusters.is_empty() {
            progress(JobPhase::Verifying, JobPhase::Verifying.percent_floor());
            let state = RateLimitState::new();
            let total = clusters.len();
            for (done, cluster) in clusters.iter().enumerate() {
                check(cancel)?;
                self.verifier
                    .verify_cluster(&mut citations, cluster, &state, &mut stats)
                    .await;
                // 70 advances toward 95 as clusters complete.
                let percent = 70 + (((done + 1) * 25) / total) as u8;
                progress(JobPhase::Verifying, percent.min(95));
            }
            crate::propagate::propagate(&mut citations, &mut clusters);
        }
        check(cancel)?;

        progress(JobPhase::Finalizing, JobPhase::Finalizing.percent_floor());
        let result = format::build_result(
            citations,
            clusters,
            stats.rate_limited,
            stats.upstream_errors,
            started.elapsed().as_millis() as u64,
        );
        progress(JobPhase::Done, JobPhase::Done.percent_floor());

        info!(
            citations = result.stats.citations_total,
            verified = result.stats.citations_verified,
            clusters = result.stats.clusters_total,
            rate_limited = result.stats.rate_limited,
            duration_ms = result.stats.duration_ms,
            "analysis complete"
        );
        Ok(result)
    }
}
