//! casestrainer - legal citation extraction, clustering, and verification
//!
//! This crate ingests legal documents and returns, for every citation
//! found, the citing context, the case name and year as written in the
//! document, the parallel-citation cluster the citation belongs to, and,
//! where an external legal database confirms it, a canonical case name,
//! date, and source URL.

/// Returns the casestrainer version
#[must_use]
pub fn casestrainer_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub mod casename;
pub mod cluster;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod docext;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fakes;
pub mod fetch;
pub mod format;
pub mod logging;
pub mod normalize;
pub mod patterns;
pub mod pipeline;
pub mod progress;
pub mod propagate;
pub mod queue;
pub mod server;
pub mod similarity;
pub mod types;
pub mod verify;
pub mod worker;

// Core types and errors used by external consumers
pub use config::{Config, ForceMode};
pub use dispatch::{AnalyzeInput, AnalyzeResponse, Dispatcher};
pub use error::{CaseStrainerError, ErrorBody};
pub use format::{AnalysisResult, ClusterView, Stats};
pub use types::*;
