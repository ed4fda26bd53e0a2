//! In-process fakes for the external collaborators.
//!
//! Compiled for tests and under the `test-utils` feature so integration
//! suites can drive the full pipeline without network access: a scripted
//! citation API, a canned HTTP fetcher, and a document extractor that
//! serves fixed text for binary formats.

use crate::error::CaseStrainerError;
use crate::docext::{BuiltinExtractor, DocumentExtractor};
use crate::fetch::{FetchFailure, FetchResponse, FetchedDocument, HttpFetch, RateLimitInfo};
use crate::verify::api::{ApiCandidate, ApiDocket};
use crate::verify::{ApiOutcome, CitationApi};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted structured-API fake. Lookups match on the exact citation text;
/// flipping `rate_limited` makes every subsequent call return 429 semantics,
/// which is how the short-circuit tests arrange their first-call limit.
#[derive(Default)]
pub struct FakeCitationApi {
    candidates: Mutex<HashMap<String, Vec<ApiCandidate>>>,
    rate_limited: AtomicBool,
    pub lookup_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl FakeCitationApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate for a citation text.
    pub fn add_case(
        &self,
        citation_text: &str,
        case_name: &str,
        decision_date: &str,
        url: &str,
        jurisdiction: &str,
    ) {
        let candidate = ApiCandidate {
            citations: vec![citation_text.to_string()],
            case_name: Some(case_name.to_string()),
            docket: None,
            decision_date: Some(decision_date.to_string()),
            absolute_url: Some(url.to_string()),
            jurisdiction: Some(jurisdiction.to_string()),
        };
        self.candidates
            .lock()
            .expect("fake api lock")
            .entry(citation_text.to_string())
            .or_default()
            .push(candidate);
    }

    /// Register a candidate whose name lives only under the docket object.
    pub fn add_docket_case(&self, citation_text: &str, case_name: &str, jurisdiction: &str) {
        let candidate = ApiCandidate {
            citations: vec![citation_text.to_string()],
            case_name: None,
            docket: Some(ApiDocket {
                case_name: Some(case_name.to_string()),
            }),
            decision_date: None,
            absolute_url: None,
            jurisdiction: Some(jurisdiction.to_string()),
        };
        self.candidates
            .lock()
            .expect("fake api lock")
            .entry(citation_text.to_string())
            .or_default()
            .push(candidate);
    }

    /// Make every later structured-API call rate limited.
    pub fn start_rate_limiting(&self) {
        self.rate_limited.store(true, Ordering::SeqCst);
    }

    fn outcome_for(&self, text: &str) -> ApiOutcome {
        if self.rate_limited.load(Ordering::SeqCst) {
            return ApiOutcome::RateLimited(RateLimitInfo {
                retry_after: Some("60".into()),
                ..RateLimitInfo::default()
            });
        }
        let map = self.candidates.lock().expect("fake api lock");
        match map.get(text) {
            Some(candidates) => ApiOutcome::Candidates(candidates.clone()),
            None => ApiOutcome::NotFound,
        }
    }
}

#[async_trait]
impl CitationApi for FakeCitationApi {
    async fn lookup(&self, citation_text: &str) -> ApiOutcome {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome_for(citation_text)
    }

    async fn search(&self, query: &str) -> ApiOutcome {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome_for(query)
    }
}

/// Canned HTTP fetcher: responses match on a URL substring. Anything
/// unmatched is a 404, so untouched fallback sources fail quietly.
#[derive(Default)]
pub struct FakeHttp {
    pages: Mutex<Vec<(String, String)>>,
    documents: Mutex<HashMap<String, (String, Vec<u8>)>>,
    pub get_calls: AtomicUsize,
}

impl FakeHttp {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for any GET whose URL contains `url_fragment`.
    pub fn add_page(&self, url_fragment: &str, body: &str) {
        self.pages
            .lock()
            .expect("fake http lock")
            .push((url_fragment.to_string(), body.to_string()));
    }

    /// Serve a document download for an exact URL.
    pub fn add_document(&self, url: &str, content_type: &str, bytes: &[u8]) {
        self.documents
            .lock()
            .expect("fake http lock")
            .insert(url.to_string(), (content_type.to_string(), bytes.to_vec()));
    }
}

#[async_trait]
impl HttpFetch for FakeHttp {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchResponse, FetchFailure> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.lock().expect("fake http lock");
        for (fragment, body) in pages.iter() {
            if url.contains(fragment.as_str()) {
                return Ok(FetchResponse {
                    status: 200,
                    body: body.clone(),
                    rate_limit: RateLimitInfo::default(),
                });
            }
        }
        Ok(FetchResponse {
            status: 404,
            body: String::new(),
            rate_limit: RateLimitInfo::default(),
        })
    }

    async fn post_json(
        &self,
        _url: &str,
        _body: serde_json::Value,
        _auth: Option<&str>,
        _timeout: Duration,
    ) -> Result<FetchResponse, FetchFailure> {
        Ok(FetchResponse {
            status: 404,
            body: String::new(),
            rate_limit: RateLimitInfo::default(),
        })
    }

    async fn get_bytes(
        &self,
        url: &str,
        max_bytes: usize,
        _timeout: Duration,
    ) -> Result<FetchedDocument, FetchFailure> {
        let documents = self.documents.lock().expect("fake http lock");
        match documents.get(url) {
            Some((content_type, bytes)) if bytes.len() <= max_bytes => Ok(FetchedDocument {
                content_type: content_type.clone(),
                bytes: bytes.clone(),
            }),
            Some((_, bytes)) => Err(FetchFailure::Transport(format!(
                "document of {} bytes exceeds the {max_bytes}-byte limit",
                bytes.len()
            ))),
            None => Err(FetchFailure::Transport("connection refused".into())),
        }
    }
}

/// Document extractor that decodes text formats through the builtin adapter
/// and serves registered fixed text for binary formats.
#[derive(Default)]
pub struct FakeDocumentExtractor {
    by_mime: Mutex<HashMap<String, String>>,
}

impl FakeDocumentExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` for any document declared as `mime`.
    pub fn add_text(&self, mime: &str, text: &str) {
        self.by_mime
            .lock()
            .expect("fake extractor lock")
            .insert(mime.to_string(), text.to_string());
    }
}

#[async_trait]
impl DocumentExtractor for FakeDocumentExtractor {
    async fn extract(
        &self,
        bytes: &[u8],
        mime: &str,
        convert_footnotes: bool,
    ) -> Result<String, CaseStrainerError> {
        let base = crate::docext::base_mime(mime);
        if let Some(text) = self.by_mime.lock().expect("fake extractor lock").get(&base) {
            return Ok(text.clone());
        }
        BuiltinExtractor.extract(bytes, mime, convert_footnotes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_api_serves_registered_candidates() {
        let api = FakeCitationApi::new();
        api.add_case("388 P.3d 977", "A v. B", "2017-01-23", "https://x/", "WA");
        match api.lookup("388 P.3d 977").await {
            ApiOutcome::Candidates(c) => assert_eq!(c.len(), 1),
            other => panic!("unexpected outcome {other:?}"),
        }
        match api.lookup("1 U.S. 1").await {
            ApiOutcome::NotFound => {}
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(api.lookup_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fake_api_rate_limits_when_told() {
        let api = FakeCitationApi::new();
        api.start_rate_limiting();
        assert!(matches!(
            api.lookup("388 P.3d 977").await,
            ApiOutcome::RateLimited(_)
        ));
    }

    #[tokio::test]
    async fn fake_http_matches_on_substring() {
        let http = FakeHttp::new();
        http.add_page("justia", "<html>hit</html>");
        let hit = http
            .get("https://law.justia.com/search?q=x", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(hit.status, 200);
        let miss = http
            .get("https://other.example.com/", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(miss.status, 404);
    }

    #[tokio::test]
    async fn fake_extractor_serves_binary_formats() {
        let ext = FakeDocumentExtractor::new();
        ext.add_text("application/pdf", "See 123 F.3d 456.");
        let text = ext
            .extract(b"%PDF-1.7", "application/pdf", true)
            .await
            .unwrap();
        assert_eq!(text, "See 123 F.3d 456.");
        // Text formats still flow through the builtin adapter.
        let plain = ext.extract(b"hello", "text/plain", true).await.unwrap();
        assert_eq!(plain, "hello");
    }
}
