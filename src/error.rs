//! Error types for the citation-processing engine.
//!
//! The library returns `CaseStrainerError` from every fallible public
//! operation. Each variant carries a stable machine-readable code used in
//! HTTP error bodies; per-citation and per-cluster verification failures are
//! deliberately NOT represented here because they never abort a job.

use serde::Serialize;
use thiserror::Error;

/// Top-level error type for dispatcher, pipeline, and queue operations.
#[derive(Error, Debug)]
pub enum CaseStrainerError {
    /// Missing, malformed, or empty input; rejected at the dispatcher
    /// before any job exists.
    #[error("Invalid input: {0}")]
    Input(String),

    /// Input exceeding the configured size limit.
    #[error("Input of {bytes} bytes exceeds the {limit}-byte limit")]
    InputTooLarge { bytes: usize, limit: usize },

    /// Declared MIME type outside the supported set.
    #[error("Unsupported document format: {mime}")]
    UnsupportedFormat { mime: String },

    /// URL-mode download failure.
    #[error("Failed to fetch document from {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The document extractor failed to produce text.
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// Unknown task id or expired result.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unrecoverable internal error during job processing.
    #[error("Job failed ({code}): {message}")]
    JobFailed { code: &'static str, message: String },

    /// The job was canceled cooperatively at a phase boundary.
    #[error("Job canceled")]
    JobCanceled,

    /// Queue or result-store outage; surfaces as a 5xx with no partial state.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl CaseStrainerError {
    /// Stable machine-readable code for the HTTP error body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Input(_) => "input_error",
            Self::InputTooLarge { .. } => "input_too_large",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::Fetch { .. } => "fetch_error",
            Self::Extraction(_) => "extraction_error",
            Self::NotFound(_) => "not_found",
            Self::JobFailed { .. } => "job_failed",
            Self::JobCanceled => "job_canceled",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// HTTP status code the error maps to at the API surface.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Input(_) => 400,
            Self::InputTooLarge { .. } => 413,
            Self::UnsupportedFormat { .. } => 415,
            Self::Fetch { .. } => 400,
            Self::Extraction(_) => 422,
            Self::NotFound(_) => 404,
            Self::JobFailed { .. } | Self::JobCanceled => 500,
            Self::StoreUnavailable(_) => 503,
        }
    }
}

/// JSON body returned for every error at the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    #[must_use]
    pub fn from_error(err: &CaseStrainerError) -> Self {
        Self {
            error: err.code().to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CaseStrainerError::Input("x".into()).code(), "input_error");
        assert_eq!(
            CaseStrainerError::UnsupportedFormat {
                mime: "image/png".into()
            }
            .code(),
            "unsupported_format"
        );
        assert_eq!(CaseStrainerError::JobCanceled.code(), "job_canceled");
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(CaseStrainerError::Input("x".into()).http_status(), 400);
        assert_eq!(
            CaseStrainerError::UnsupportedFormat {
                mime: "image/png".into()
            }
            .http_status(),
            415
        );
        assert_eq!(CaseStrainerError::NotFound("t".into()).http_status(), 404);
        assert_eq!(
            CaseStrainerError::StoreUnavailable("down".into()).http_status(),
            503
        );
    }

    #[test]
    fn error_body_carries_code_and_message() {
        let err = CaseStrainerError::Fetch {
            url: "https://example.com/x.pdf".into(),
            reason: "connect timeout".into(),
        };
        let body = ErrorBody::from_error(&err);
        assert_eq!(body.code, "fetch_error");
        assert!(body.message.contains("example.com"));
        assert!(body.message.contains("connect timeout"));
    }
}
