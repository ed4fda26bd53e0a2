//! Ingestion dispatcher.
//!
//! `analyze` owns the public request contract: decode the input into
//! cleaned text first (decode failures return typed errors and never
//! enqueue a job), then route by size. Small inputs run the pipeline
//! inline and return the result directly; everything else becomes a queued
//! job polled through the status endpoint.

use crate::config::{Config, ForceMode};
use crate::docext::{self, DocumentExtractor};
use crate::error::CaseStrainerError;
use crate::fetch::HttpFetch;
use crate::format::AnalysisResult;
use crate::pipeline::Pipeline;
use crate::queue::JobQueue;
use crate::types::Job;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{debug, info};

/// Timeout for URL-mode document downloads. Looser than the 5-second
/// verification call timeout because court PDFs are large.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// One analyze request.
#[derive(Debug, Clone)]
pub enum AnalyzeInput {
    /// Raw UTF-8 text
    Text { text: String },
    /// Uploaded file bytes with a declared MIME type
    File { bytes: Vec<u8>, mime: String },
    /// Absolute http/https URL to fetch
    Url { url: String },
}

/// How the request was served.
#[derive(Debug, Clone)]
pub enum AnalyzeResponse {
    /// Processed inline; the result is final
    Immediate(Box<AnalysisResult>),
    /// Enqueued; poll `task_status` with this id
    Queued { task_id: String },
}

pub struct Dispatcher {
    config: Arc<Config>,
    queue: Arc<dyn JobQueue>,
    pipeline: Arc<Pipeline>,
    fetch: Arc<dyn HttpFetch>,
    extractor: Arc<dyn DocumentExtractor>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        queue: Arc<dyn JobQueue>,
        pipeline: Arc<Pipeline>,
        fetch: Arc<dyn HttpFetch>,
        extractor: Arc<dyn DocumentExtractor>,
    ) -> Self {
        Self {
            config,
            queue,
            pipeline,
            fetch,
            extractor,
        }
    }

    /// Serve one analyze request.
    ///
    /// # Errors
    ///
    /// Typed errors for every decode failure (`Input`, `InputTooLarge`,
    /// `UnsupportedFormat`, `Fetch`, `Extraction`); none of these enqueue
    /// anything.
    pub async fn analyze(
        &self,
        input: AnalyzeInput,
        force_mode: Option<ForceMode>,
    ) -> Result<AnalyzeResponse, CaseStrainerError> {
        let (cleaned, source_url) = self.decode(input).await?;
        if cleaned.trim().is_empty() {
            return Err(CaseStrainerError::Input(
                "document contains no extractable text".into(),
            ));
        }

        let mode = force_mode.or(self.config.force_mode);
        let run_inline = match mode {
            Some(ForceMode::Sync) => true,
            Some(ForceMode::Async) => false,
            None => cleaned.len() < self.config.sync_threshold_bytes,
        };
        debug!(
            bytes = cleaned.len(),
            inline = run_inline,
            forced = mode.is_some(),
            "dispatching"
        );

        if run_inline {
            let cancel = AtomicBool::new(false);
            let result = self
                .pipeline
                .run(&cleaned, source_url.as_deref(), &cancel, &mut |_, _| {})
                .await?;
            Ok(AnalyzeResponse::Immediate(Box::new(result)))
        } else {
            let job = Job::new(uuid::Uuid::new_v4().to_string(), cleaned, source_url);
            let task_id = self.queue.enqueue(job).await?;
            info!(task_id = %task_id, "job enqueued");
            Ok(AnalyzeResponse::Queued { task_id })
        }
    }

    /// Decode any input form into cleaned text plus the source URL for
    /// URL-mode requests.
    async fn decode(
        &self,
        input: AnalyzeInput,
    ) -> Result<(String, Option<String>), CaseStrainerError> {
        let limit = self.config.max_input_bytes;
        match input {
            AnalyzeInput::Text { text } => {
                if text.len() > limit {
                    return Err(CaseStrainerError::InputTooLarge {
                        bytes: text.len(),
                        limit,
                    });
                }
                Ok((docext::clean_text(&text), None))
            }
            AnalyzeInput::File { bytes, mime } => {
                if bytes.len() > limit {
                    return Err(CaseStrainerError::InputTooLarge {
                        bytes: bytes.len(),
                        limit,
                    });
                }
                if !docext::is_supported_mime(&mime) {
                    return Err(CaseStrainerError::UnsupportedFormat {
                        mime: docext::base_mime(&mime),
                    });
                }
                let text = self
                    .extractor
                    .extract(&bytes, &mime, self.config.convert_footnotes)
                    .await?;
                Ok((text, None))
            }
            AnalyzeInput::Url { url } => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(CaseStrainerError::Input(format!(
                        "only http and https URLs are accepted, got {url}"
                    )));
                }
                let document = self
                    .fetch
                    .get_bytes(&url, limit, DOWNLOAD_TIMEOUT)
                    .await
                    .map_err(|e| CaseStrainerError::Fetch {
                        url: url.clone(),
                        reason: e.to_string(),
                    })?;
                if !docext::is_supported_mime(&document.content_type) {
                    return Err(CaseStrainerError::UnsupportedFormat {
                        mime: docext::base_mime(&document.content_type),
                    });
                }
                let text = self
                    .extractor
                    .extract(
                        &document.bytes,
                        &document.content_type,
                        self.config.convert_footnotes,
                    )
                    .await?;
                Ok((text, Some(url)))
            }
        }
    }
}
