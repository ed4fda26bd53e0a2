//! Ranked HTML fallback sources.
//!
//! When the structured API cannot verify a citation (or is rate limited),
//! the verifier fans out across a ranked list of public legal databases,
//! fetching one page per source and applying a source-specific extractor to
//! recover the case name and decision year. Up to eight requests run
//! concurrently; acceptance still follows rank order, so a lower-ranked
//! source only wins when every source above it failed.

use crate::fetch::HttpFetch;
use crate::similarity::name_similarity;
use crate::types::{Citation, VerificationSource};
use crate::verify::api::{VerifiedRecord, repair_canonical_name};
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Concurrency cap for the fallback fan-out.
const MAX_CONCURRENT_FALLBACKS: usize = 8;

/// A case as recovered from one HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlCase {
    pub case_name: String,
    pub year: Option<i32>,
}

/// One ranked fallback source.
pub struct HtmlSource {
    pub name: &'static str,
    pub source: VerificationSource,
    build_url: fn(&Citation) -> String,
    extract: fn(&str) -> Option<HtmlCase>,
}

/// Percent-encode a query component.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern"));
static H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("h1 pattern"));
static OG_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s+property="og:title"\s+content="([^"]*)""#).expect("og:title pattern")
});
static SCHOLAR_RESULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<h3 class="gs_rt"[^>]*>.*?<a[^>]*>(.*?)</a>"#).expect("scholar pattern")
});
static INNER_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag pattern"));

/// A case-name shape inside scraped text, adversarial or special-form.
static HTML_CASE_NAME: Lazy<Regex> = Lazy::new(|| {
    let party = r"[A-Z][\w&'’.\-]*(?:,?\s+(?:[A-Z][\w&'’.\-]*|of|the|and|for|ex rel\.|et al\.|&))*";
    Regex::new(&format!(
        r"(?:In re|Ex parte|Matter of|Estate of)\s+{party}|{party}\s+vs?\.?\s+{party}"
    ))
    .expect("html case-name pattern")
});

static DECIDED_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:decided|filed|argued)[^<]{0,60}?\b((?:17|18|19|20)\d{2})\b")
        .expect("decided-year pattern")
});
static PAREN_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(((?:17|18|19|20)\d{2})\)").expect("paren-year pattern"));

fn strip_tags(fragment: &str) -> String {
    let text = INNER_TAG.replace_all(fragment, " ");
    text.replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pull the first case-name shape out of a text fragment.
fn case_name_in(text: &str) -> Option<String> {
    HTML_CASE_NAME.find(text).map(|m| m.as_str().trim().to_string())
}

fn year_in(html: &str) -> Option<i32> {
    DECIDED_YEAR
        .captures(html)
        .or_else(|| PAREN_YEAR.captures(html))
        .and_then(|c| c[1].parse().ok())
}

/// Shared extractor skeleton: try the given fragments in order, then fall
/// back to the page title.
fn extract_from_fragments(html: &str, fragments: &[Option<String>]) -> Option<HtmlCase> {
    for fragment in fragments.iter().flatten() {
        if let Some(case_name) = case_name_in(fragment) {
            return Some(HtmlCase {
                case_name,
                year: year_in(html),
            });
        }
    }
    let title = TITLE
        .captures(html)
        .map(|c| strip_tags(&c[1]))
        .and_then(|t| case_name_in(&t));
    title.map(|case_name| HtmlCase {
        case_name,
        year: year_in(html),
    })
}

fn h1_fragment(html: &str) -> Option<String> {
    H1.captures(html).map(|c| strip_tags(&c[1]))
}

fn title_fragment(html: &str) -> Option<String> {
    TITLE.captures(html).map(|c| strip_tags(&c[1]))
}

fn extract_h1_first(html: &str) -> Option<HtmlCase> {
    extract_from_fragments(html, &[h1_fragment(html)])
}

fn extract_title_only(html: &str) -> Option<HtmlCase> {
    extract_from_fragments(html, &[title_fragment(html)])
}

fn extract_og_title(html: &str) -> Option<HtmlCase> {
    let og = OG_TITLE.captures(html).map(|c| c[1].to_string());
    extract_from_fragments(html, &[og])
}

fn extract_scholar(html: &str) -> Option<HtmlCase> {
    let result = SCHOLAR_RESULT.captures(html).map(|c| strip_tags(&c[1]));
    extract_from_fragments(html, &[result])
}

/// The ranked source registry. `fallback_source_order` in the configuration
/// selects and orders entries by name.
pub static SOURCES: Lazy<Vec<HtmlSource>> = Lazy::new(|| {
    vec![
        HtmlSource {
            name: "justia",
            source: VerificationSource::Justia,
            build_url: |c| format!("https://law.justia.com/cases/search?query={}", urlencode(&c.text)),
            extract: extract_h1_first,
        },
        HtmlSource {
            name: "leagle",
            source: VerificationSource::Leagle,
            build_url: |c| format!("https://www.leagle.com/search?q={}", urlencode(&c.text)),
            extract: extract_title_only,
        },
        HtmlSource {
            name: "casetext",
            source: VerificationSource::CaseText,
            build_url: |c| format!("https://casetext.com/search?q={}", urlencode(&c.text)),
            extract: extract_title_only,
        },
        HtmlSource {
            name: "cornell_lii",
            source: VerificationSource::CornellLii,
            build_url: |c| {
                format!(
                    "https://www.law.cornell.edu/search/site/{}",
                    urlencode(&c.text)
                )
            },
            extract: extract_title_only,
        },
        HtmlSource {
            name: "google_scholar",
            source: VerificationSource::GoogleScholar,
            build_url: |c| {
                format!(
                    "https://scholar.google.com/scholar?hl=en&as_sdt=2006&q={}",
                    urlencode(&c.text)
                )
            },
            extract: extract_scholar,
        },
        HtmlSource {
            name: "findlaw",
            source: VerificationSource::FindLaw,
            build_url: |c| {
                format!(
                    "https://caselaw.findlaw.com/search?query={}",
                    urlencode(&c.text)
                )
            },
            extract: extract_title_only,
        },
        HtmlSource {
            name: "casemine",
            source: VerificationSource::CaseMine,
            build_url: |c| format!("https://www.casemine.com/search/us?q={}", urlencode(&c.text)),
            extract: extract_og_title,
        },
        HtmlSource {
            name: "vlex",
            source: VerificationSource::VLex,
            build_url: |c| format!("https://vlex.com/search?q={}", urlencode(&c.text)),
            extract: extract_title_only,
        },
        HtmlSource {
            name: "openjurist",
            source: VerificationSource::OpenJurist,
            build_url: |c| format!("https://openjurist.org/search?query={}", urlencode(&c.text)),
            extract: extract_h1_first,
        },
    ]
});

/// Look a source up by its configuration name.
#[must_use]
pub fn source_by_name(name: &str) -> Option<&'static HtmlSource> {
    SOURCES.iter().find(|s| s.name == name)
}

/// Acceptance test for a scraped case against the citation's extracted
/// fields: name similarity at or above the threshold when the document
/// yielded a name, year within tolerance when both sides know one.
fn accepts(citation: &Citation, case: &HtmlCase, threshold: f64, year_tolerance: i32) -> bool {
    if let Some(extracted) = citation.extracted_case_name.as_deref() {
        if name_similarity(&case.case_name, extracted) < threshold {
            return false;
        }
    }
    if let (Some(extracted), Some(found)) = (citation.extracted_year, case.year) {
        if (found - extracted).abs() > year_tolerance {
            return false;
        }
    }
    true
}

/// Run the fallback chain for one citation. Requests fan out concurrently
/// (at most eight in flight); the successful source with the best rank wins.
pub async fn run_fallbacks<'a>(
    citation: &'a Citation,
    order: &'a [String],
    fetch: Arc<dyn HttpFetch>,
    timeout: Duration,
    threshold: f64,
    year_tolerance: i32,
) -> Option<(VerifiedRecord, VerificationSource)> {
    let sources: Vec<&'static HtmlSource> = order
        .iter()
        .filter_map(|name| source_by_name(name))
        .collect();

    let attempts = futures::stream::iter(sources.into_iter().enumerate().map(
        |(rank, source): (usize, &'static HtmlSource)| {
            let fetch = Arc::clone(&fetch);
            let url = (source.build_url)(citation);
            let fut: std::pin::Pin<Box<dyn std::future::Future<Output = Option<(usize, &'static HtmlSource, String, HtmlCase)>> + Send>> = Box::pin(async move {
                let response = fetch.get(&url, timeout).await.ok()?;
                if !(200..300).contains(&response.status) {
                    return None;
                }
                let case = (source.extract)(&response.body)?;
                Some((rank, source, url, case))
            });
            fut
        },
    ))
    .buffer_unordered(MAX_CONCURRENT_FALLBACKS)
    .collect::<Vec<_>>()
    .await;

    let mut best: Option<(usize, &'static HtmlSource, String, HtmlCase)> = None;
    for hit in attempts.into_iter().flatten() {
        if !accepts(citation, &hit.3, threshold, year_tolerance) {
            debug!(source = hit.1.name, citation = %citation.text, "fallback hit rejected");
            continue;
        }
        if best.as_ref().is_none_or(|b| hit.0 < b.0) {
            best = Some(hit);
        }
    }

    best.map(|(_, source, url, case)| {
        let record = VerifiedRecord {
            canonical_name: repair_canonical_name(
                Some(&case.case_name),
                citation.extracted_case_name.as_deref(),
            ),
            canonical_date: case.year.map(|y| y.to_string()),
            canonical_url: Some(url),
        };
        (record, source.source)
    })
}
