//! Public result contract.
//!
//! The shapes in this module serialize one-to-one into the JSON the HTTP
//! surface returns. Citations appear in document order; clusters reference
//! their members by normalized citation text.

use crate::types::{Citation, Cluster, VerificationSource};
use serde::{Deserialize, Serialize};

/// Aggregate counters for one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub citations_total: usize,
    pub citations_verified: usize,
    pub clusters_total: usize,
    /// True when the structured API rate limited this request
    pub rate_limited: bool,
    pub duration_ms: u64,
    /// Strategies that failed for reasons other than not-found
    #[serde(default)]
    pub upstream_errors: usize,
}

/// A cluster as published: member citations by text, not by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterView {
    pub id: u32,
    pub cluster_case_name: Option<String>,
    pub cluster_year: Option<i32>,
    pub canonical_name: Option<String>,
    pub canonical_date: Option<String>,
    pub canonical_url: Option<String>,
    pub verification_source: Option<VerificationSource>,
    pub citations: Vec<String>,
}

/// The immutable result document stored under a `result_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Document order, sorted strictly by `start`
    pub citations: Vec<Citation>,
    pub clusters: Vec<ClusterView>,
    pub stats: Stats,
}

/// Assemble the public result from pipeline output.
#[must_use]
pub fn build_result(
    mut citations: Vec<Citation>,
    clusters: Vec<Cluster>,
    rate_limited: bool,
    upstream_errors: usize,
    duration_ms: u64,
) -> AnalysisResult {
    // Member indices refer to the incoming order; resolve them to citation
    // text before any reordering.
    let cluster_views = clusters
        .into_iter()
        .map(|k| ClusterView {
            id: k.id,
            cluster_case_name: k.cluster_case_name,
            cluster_year: k.cluster_year,
            canonical_name: k.canonical_name,
            canonical_date: k.canonical_date,
            canonical_url: k.canonical_url,
            verification_source: k.verification_source,
            citations: k
                .members
                .iter()
                .map(|&idx| citations[idx].text.clone())
                .collect(),
        })
        .collect::<Vec<_>>();

    citations.sort_by_key(|c| c.start);

    let stats = Stats {
        citations_total: citations.len(),
        citations_verified: citations.iter().filter(|c| c.verified).count(),
        clusters_total: cluster_views.len(),
        rate_limited,
        duration_ms,
        upstream_errors,
    };

    AnalysisResult {
        citations,
        clusters: cluster_views,
        stats,
    }
}
