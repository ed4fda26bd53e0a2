//! Configuration management for casestrainer.
//!
//! Configuration is hierarchical with the same precedence model throughout:
//! CLI flags > TOML file > built-in defaults. Every option is optional in
//! the file; unset fields take their documented default, and `validate()`
//! rejects values that would misbehave at runtime (zero workers, an empty
//! fallback chain, a similarity threshold outside `[0, 1]`).

use crate::cluster::ClusterOptions;
use crate::error::CaseStrainerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Forced processing mode, overriding the size-based sync/async split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceMode {
    Sync,
    Async,
}

impl ForceMode {
    /// Parse a mode string from a request or config file.
    ///
    /// # Errors
    ///
    /// Returns an error naming the accepted values when the string is
    /// neither `sync` nor `async`.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            other => Err(format!(
                "Unknown force_mode '{other}'. Accepted values: sync, async"
            )),
        }
    }
}

/// Full configuration surface. Field names match the TOML keys one-to-one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inputs below this size run inline; at or above, a job is enqueued
    pub sync_threshold_bytes: usize,
    /// Worker tasks draining the queue
    pub worker_count: usize,
    /// Timeout for each upstream HTTP call
    pub per_call_timeout_ms: u64,
    /// Total verification budget per citation across all strategies
    pub per_citation_budget_ms: u64,
    /// Worker heartbeat cadence
    pub heartbeat_interval_ms: u64,
    /// A started job whose heartbeat is older than this is reapable
    pub stuck_threshold_ms: u64,
    /// Result retention
    pub result_ttl_s: u64,
    /// Extra reporter-label aliases layered over the built-in table
    pub reporter_aliases: BTreeMap<String, String>,
    /// HTML fallback sources, in rank order
    pub fallback_source_order: Vec<String>,
    /// Extra jurisdiction sets layered over the built-in per-family table
    pub jurisdiction_map: BTreeMap<String, Vec<String>>,
    /// Forwarded to the document extractor for PDF inputs
    pub convert_footnotes: bool,
    /// When false, the pipeline stops after clustering
    pub verification_enabled: bool,
    pub name_similarity_threshold: f64,
    pub year_tolerance_cluster: i32,
    pub year_tolerance_verify: i32,
    pub cluster_max_span_chars: usize,
    pub cluster_proximity_chars: usize,
    /// Hard cap on uploaded/downloaded input size (HTTP 413 beyond it)
    pub max_input_bytes: usize,
    /// Structured citation API, lookup endpoint
    pub citation_api_url: String,
    /// Structured citation API, search endpoint
    pub citation_api_search_url: String,
    /// Bearer token for the structured API
    pub citation_api_token: Option<String>,
    /// Server-wide mode override; requests may still set their own
    pub force_mode: Option<ForceMode>,
    /// Queue partition name
    pub queue_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_threshold_bytes: 5120,
            worker_count: 3,
            per_call_timeout_ms: 5_000,
            per_citation_budget_ms: 30_000,
            heartbeat_interval_ms: 5_000,
            stuck_threshold_ms: 300_000,
            result_ttl_s: 86_400,
            reporter_aliases: BTreeMap::new(),
            fallback_source_order: vec![
                "justia".into(),
                "leagle".into(),
                "casetext".into(),
                "cornell_lii".into(),
                "google_scholar".into(),
                "findlaw".into(),
                "casemine".into(),
                "vlex".into(),
                "openjurist".into(),
            ],
            jurisdiction_map: BTreeMap::new(),
            convert_footnotes: true,
            verification_enabled: true,
            name_similarity_threshold: 0.6,
            year_tolerance_cluster: 2,
            year_tolerance_verify: 5,
            cluster_max_span_chars: 2000,
            cluster_proximity_chars: 200,
            max_input_bytes: 10 * 1024 * 1024,
            citation_api_url: "https://www.courtlistener.com/api/rest/v4/citation-lookup/".into(),
            citation_api_search_url: "https://www.courtlistener.com/api/rest/v4/search/".into(),
            citation_api_token: None,
            force_mode: None,
            queue_name: "casestrainer".into(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for
    /// every unset field.
    ///
    /// # Errors
    ///
    /// Returns `CaseStrainerError::Input` when the file cannot be read or
    /// parsed, or when validation fails.
    pub fn load(path: &Path) -> Result<Self, CaseStrainerError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CaseStrainerError::Input(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            CaseStrainerError::Input(format!("invalid config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the system relies on.
    ///
    /// # Errors
    ///
    /// Returns `CaseStrainerError::Input` naming the offending key.
    pub fn validate(&self) -> Result<(), CaseStrainerError> {
        if self.worker_count == 0 {
            return Err(CaseStrainerError::Input(
                "worker_count must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.name_similarity_threshold) {
            return Err(CaseStrainerError::Input(
                "name_similarity_threshold must lie in [0.0, 1.0]".into(),
            ));
        }
        if self.fallback_source_order.is_empty() {
            return Err(CaseStrainerError::Input(
                "fallback_source_order must name at least one source".into(),
            ));
        }
        if self.per_call_timeout_ms == 0 || self.per_citation_budget_ms == 0 {
            return Err(CaseStrainerError::Input("timeouts must be non-zero".into()));
        }
        if self.per_citation_budget_ms < self.per_call_timeout_ms {
            return Err(CaseStrainerError::Input(
                "per_citation_budget_ms must be at least per_call_timeout_ms".into(),
            ));
        }
        if self.year_tolerance_cluster < 0 || self.year_tolerance_verify < 0 {
            return Err(CaseStrainerError::Input(
                "year tolerances must be non-negative".into(),
            ));
        }
        if self.max_input_bytes == 0 {
            return Err(CaseStrainerError::Input(
                "max_input_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn per_call_timeout(&self) -> Duration {
        Duration::from_millis(self.per_call_timeout_ms)
    }

    #[must_use]
    pub const fn per_citation_budget(&self) -> Duration {
        Duration::from_millis(self.per_citation_budget_ms)
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    #[must_use]
    pub const fn stuck_threshold(&self) -> Duration {
        Duration::from_millis(self.stuck_threshold_ms)
    }

    #[must_use]
    pub const fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_s)
    }

    /// Clustering knobs derived from the config surface.
    #[must_use]
    pub const fn cluster_options(&self) -> ClusterOptions {
        ClusterOptions {
            name_similarity_threshold: self.name_similarity_threshold,
            year_tolerance: self.year_tolerance_cluster,
            proximity_chars: self.cluster_proximity_chars,
            max_span_chars: self.cluster_max_span_chars,
        }
    }
}
