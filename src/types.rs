use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the reporter series a citation belongs to.
///
/// Families drive normalization (alias tables are keyed per family) and
/// verification (each family carries an allowed-jurisdiction set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReporterFamily {
    /// United States Reports (`U.S.`)
    Us,
    /// Supreme Court Reporter (`S. Ct.`)
    Sct,
    /// Lawyers' Edition (`L. Ed.`, `L. Ed. 2d`)
    LEd,
    /// Federal Reporter (`F.`, `F.2d`, `F.3d`, `F.4th`)
    Fed,
    /// Federal Supplement (`F. Supp.`, `F. Supp. 2d`, `F. Supp. 3d`)
    FSupp,
    /// Federal Claims Reporter (`Fed. Cl.`)
    FedCl,
    /// Bankruptcy Reporter (`B.R.`)
    Br,
    /// Atlantic Reporter (`A.`, `A.2d`, `A.3d`)
    Atlantic,
    /// Pacific Reporter (`P.`, `P.2d`, `P.3d`)
    Pacific,
    /// North Eastern Reporter (`N.E.`, `N.E.2d`, `N.E.3d`)
    NorthEastern,
    /// North Western Reporter (`N.W.`, `N.W.2d`)
    NorthWestern,
    /// South Eastern Reporter (`S.E.`, `S.E.2d`)
    SouthEastern,
    /// South Western Reporter (`S.W.`, `S.W.2d`, `S.W.3d`)
    SouthWestern,
    /// Southern Reporter (`So.`, `So.2d`, `So.3d`)
    Southern,
    /// Washington Reports (`Wn.`/`Wash.`, `Wn.2d`/`Wash.2d`)
    Washington,
    /// Washington Appellate Reports (`Wn. App.`/`Wash. App.`)
    WashingtonApp,
    /// Court-issued neutral citations (`2017-NM-007`, `2019 ND 12`)
    Neutral,
    /// Westlaw online citations (`2021 WL 123456`)
    WestLaw,
    /// Lexis online citations (`2021 LEXIS 9876`, `2021 U.S. App. LEXIS 42`)
    Lexis,
}

impl ReporterFamily {
    /// Returns the string representation of the family
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Sct => "sct",
            Self::LEd => "led",
            Self::Fed => "fed",
            Self::FSupp => "fsupp",
            Self::FedCl => "fedcl",
            Self::Br => "br",
            Self::Atlantic => "atlantic",
            Self::Pacific => "pacific",
            Self::NorthEastern => "ne",
            Self::NorthWestern => "nw",
            Self::SouthEastern => "se",
            Self::SouthWestern => "sw",
            Self::Southern => "so",
            Self::Washington => "washington",
            Self::WashingtonApp => "washington_app",
            Self::Neutral => "neutral",
            Self::WestLaw => "wl",
            Self::Lexis => "lexis",
        }
    }
}

/// Identifies which external source produced a citation's canonical fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(any(test, feature = "test-utils"), derive(strum::VariantNames))]
pub enum VerificationSource {
    /// The structured legal-citation API, lookup endpoint
    CitationApi,
    /// The structured legal-citation API, search endpoint
    CitationApiSearch,
    Justia,
    Leagle,
    CaseText,
    CornellLii,
    GoogleScholar,
    FindLaw,
    CaseMine,
    VLex,
    OpenJurist,
}

impl VerificationSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CitationApi => "citation_api",
            Self::CitationApiSearch => "citation_api_search",
            Self::Justia => "justia",
            Self::Leagle => "leagle",
            Self::CaseText => "casetext",
            Self::CornellLii => "cornell_lii",
            Self::GoogleScholar => "google_scholar",
            Self::FindLaw => "findlaw",
            Self::CaseMine => "casemine",
            Self::VLex => "vlex",
            Self::OpenJurist => "openjurist",
        }
    }

    /// True when the source is one of the structured-API endpoints rather
    /// than an HTML fallback. The propagator prefers these.
    #[must_use]
    pub const fn is_structured_api(&self) -> bool {
        matches!(self, Self::CitationApi | Self::CitationApiSearch)
    }
}

/// A reference to a case as it appears in the document.
///
/// `extracted_*` fields are derived purely from document text and are never
/// overwritten by canonical data; `canonical_*` fields are populated only by
/// verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Canonical normalized form (e.g. `166 Wash.2d 974`)
    pub text: String,
    /// The citation exactly as found in the document
    pub raw_text: String,
    /// Byte offset of the first byte of the citation in the cleaned text
    pub start: usize,
    /// Byte offset one past the last byte of the citation
    pub end: usize,
    /// Canonical reporter label (e.g. `Wash.2d`)
    pub reporter: String,
    /// Volume component; the year for neutral and online citations
    pub volume: String,
    /// Page or sequence component
    pub page: String,
    pub reporter_family: ReporterFamily,
    /// Case name as written in the document, or null
    pub extracted_case_name: Option<String>,
    /// Four-digit year from the document, or null
    pub extracted_year: Option<i32>,
    /// Case name from an external source; never copied into extracted fields
    pub canonical_name: Option<String>,
    pub canonical_date: Option<String>,
    pub canonical_url: Option<String>,
    pub verified: bool,
    /// True when `verified` was inherited from a cluster peer
    pub true_by_parallel: bool,
    pub verification_source: Option<VerificationSource>,
    /// Identifier of the owning cluster within this request
    pub cluster_id: Option<u32>,
}

impl Citation {
    /// Build an unverified citation from parsed components.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        text: String,
        raw_text: String,
        start: usize,
        end: usize,
        reporter: String,
        volume: String,
        page: String,
        reporter_family: ReporterFamily,
    ) -> Self {
        Self {
            text,
            raw_text,
            start,
            end,
            reporter,
            volume,
            page,
            reporter_family,
            extracted_case_name: None,
            extracted_year: None,
            canonical_name: None,
            canonical_date: None,
            canonical_url: None,
            verified: false,
            true_by_parallel: false,
            verification_source: None,
            cluster_id: None,
        }
    }
}

/// A set of citations treated as parallel references to one case.
///
/// Members are stored as indices into the request's citation arena; the
/// citations themselves carry the back-reference via `cluster_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Opaque identifier, stable within one request only
    pub id: u32,
    /// Indices into the request's citation list, document order, size >= 1
    pub members: Vec<usize>,
    /// Display name; extracted initially, may be overwritten from canonical
    /// data after verification (the only such overwrite in the system)
    pub cluster_case_name: Option<String>,
    pub cluster_year: Option<i32>,
    /// Copied from the first verified member, if any
    pub canonical_name: Option<String>,
    pub canonical_date: Option<String>,
    pub canonical_url: Option<String>,
    pub verification_source: Option<VerificationSource>,
}

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Started,
    Finished,
    Failed,
    Canceled,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Terminal states never transition again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Canceled)
    }
}

/// Processing phases published while a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Initializing,
    Fetching,
    ExtractingText,
    ExtractingCitations,
    Clustering,
    Verifying,
    Finalizing,
    Done,
}

impl JobPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Fetching => "fetching",
            Self::ExtractingText => "extracting_text",
            Self::ExtractingCitations => "extracting_citations",
            Self::Clustering => "clustering",
            Self::Verifying => "verifying",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }

    /// The percent floor published when this phase begins. `Verifying`
    /// advances from its floor toward 95 as clusters complete.
    #[must_use]
    pub const fn percent_floor(&self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::Fetching => 10,
            Self::ExtractingText => 20,
            Self::ExtractingCitations => 40,
            Self::Clustering => 55,
            Self::Verifying => 70,
            Self::Finalizing => 95,
            Self::Done => 100,
        }
    }
}

/// A unit of work in the queue.
///
/// The dispatcher decodes input before enqueueing, so the record carries the
/// cleaned source text rather than raw upload bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub phase: JobPhase,
    pub percent: u8,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    /// Times this job has been claimed; incremented by the reaper on requeue
    pub attempts: u32,
    /// Cooperative cancellation flag, honored at phase boundaries
    pub cancel_requested: bool,
    /// Present when `status` is `finished`
    pub result_id: Option<String>,
    /// Short machine-readable message when `status` is `failed`
    pub error: Option<String>,
    /// Cleaned source text to analyze
    pub text: String,
    /// Original URL for URL-mode requests, for the `fetching` phase marker
    pub source_url: Option<String>,
}

impl Job {
    /// Create a fresh queued job for cleaned source text.
    #[must_use]
    pub fn new(id: String, text: String, source_url: Option<String>) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            phase: JobPhase::Initializing,
            percent: 0,
            enqueued_at: Utc::now(),
            started_at: None,
            ended_at: None,
            heartbeat_at: None,
            attempts: 0,
            cancel_requested: false,
            result_id: None,
            error: None,
            text,
            source_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_percent_floors_are_monotonic() {
        let phases = [
            JobPhase::Initializing,
            JobPhase::Fetching,
            JobPhase::ExtractingText,
            JobPhase::ExtractingCitations,
            JobPhase::Clustering,
            JobPhase::Verifying,
            JobPhase::Finalizing,
            JobPhase::Done,
        ];
        let mut last = 0;
        for phase in phases {
            assert!(
                phase.percent_floor() >= last,
                "{} regressed below {last}",
                phase.as_str()
            );
            last = phase.percent_floor();
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn job_status_terminality() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Started.is_terminal());
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
    }

    #[test]
    fn reporter_family_round_trips_through_serde() {
        let json = serde_json::to_string(&ReporterFamily::Pacific).unwrap();
        assert_eq!(json, "\"pacific\"");
        let back: ReporterFamily = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ReporterFamily::Pacific);
    }

    #[test]
    fn new_citation_is_unverified() {
        let c = Citation::new(
            "166 Wash.2d 974".into(),
            "166 Wn.2d 974".into(),
            10,
            23,
            "Wash.2d".into(),
            "166".into(),
            "974".into(),
            ReporterFamily::Washington,
        );
        assert!(!c.verified);
        assert!(!c.true_by_parallel);
        assert!(c.canonical_name.is_none());
        assert!(c.cluster_id.is_none());
    }
}
