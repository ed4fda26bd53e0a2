//! Citation pattern library.
//!
//! A closed inventory of regular expressions, one per reporter family,
//! covering federal, regional, Washington, neutral, and vendor-neutral
//! online citation formats. Every pattern captures `volume`, `reporter`,
//! and `page` named groups (for neutral and online formats the year fills
//! the `volume` group and the sequence number fills `page`) so that
//! normalization and verification can reassemble the citation.
//!
//! Extraction policy: overlapping matches from different patterns are
//! resolved in favour of the earlier start, ties broken by the longer span;
//! matches are reported in document order.

use crate::types::ReporterFamily;
use once_cell::sync::Lazy;
use regex::Regex;

/// A single pattern hit before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub family: ReporterFamily,
    /// Byte offset of the match start in the source text
    pub start: usize,
    /// Byte offset one past the match end
    pub end: usize,
    /// The citation exactly as matched
    pub raw_text: String,
    /// Volume number, or the year for neutral/online citations
    pub volume: String,
    /// Reporter label as printed in the document
    pub reporter: String,
    /// Page number, or the sequence number for neutral/online citations
    pub page: String,
}

/// Classic `<volume> <reporter> <page>` pattern for the given reporter label
/// alternation.
fn classic(reporter: &str) -> String {
    format!(r"\b(?P<volume>\d{{1,4}})\s+(?P<reporter>{reporter})\s*(?P<page>\d{{1,5}})\b")
}

/// The full pattern inventory, in registration order. Registration order is
/// not a priority order; overlap resolution is positional (§ extraction
/// policy above).
static PATTERNS: Lazy<Vec<(ReporterFamily, Regex)>> = Lazy::new(|| {
    let table: Vec<(ReporterFamily, String)> = vec![
        // Federal reporters
        (ReporterFamily::Us, classic(r"U\.\s?S\.")),
        (ReporterFamily::Sct, classic(r"S\.\s?Ct\.")),
        (ReporterFamily::LEd, classic(r"L\.\s?Ed\.(?:\s?2d)?")),
        (
            ReporterFamily::FSupp,
            classic(r"F\.\s?Supp\.(?:\s?(?:2d|3d))?"),
        ),
        (ReporterFamily::Fed, classic(r"F\.(?:\s?(?:2d|3d|4th))?")),
        (ReporterFamily::FedCl, classic(r"Fed\.\s?Cl\.")),
        (ReporterFamily::Br, classic(r"B\.\s?R\.")),
        // Regional reporters
        (ReporterFamily::Atlantic, classic(r"A\.(?:\s?(?:2d|3d))?")),
        (ReporterFamily::Pacific, classic(r"P\.(?:\s?(?:2d|3d))?")),
        (
            ReporterFamily::NorthEastern,
            classic(r"N\.\s?E\.(?:\s?(?:2d|3d))?"),
        ),
        (
            ReporterFamily::NorthWestern,
            classic(r"N\.\s?W\.(?:\s?2d)?"),
        ),
        (
            ReporterFamily::SouthEastern,
            classic(r"S\.\s?E\.(?:\s?2d)?"),
        ),
        (
            ReporterFamily::SouthWestern,
            classic(r"S\.\s?W\.(?:\s?(?:2d|3d))?"),
        ),
        (ReporterFamily::Southern, classic(r"So\.(?:\s?(?:2d|3d))?")),
        // Washington reporters, with Wn./Wash. alias equivalence
        (
            ReporterFamily::WashingtonApp,
            classic(r"(?:Wn\.|Wash\.)\s?App\.(?:\s?2d)?"),
        ),
        (
            ReporterFamily::Washington,
            classic(r"(?:Wn\.|Wash\.)(?:\s?2d)?"),
        ),
        // Court-issued neutral citations: 2017-NM-007 and 2019 ND 12
        (
            ReporterFamily::Neutral,
            r"\b(?P<volume>(?:17|18|19|20)\d{2})[-\s](?P<reporter>NM|ND|OK|WY|SD|VT|UT|OH|IL|WI)[-\s](?P<page>\d{1,6})\b".to_string(),
        ),
        // Vendor-neutral online citations
        (
            ReporterFamily::WestLaw,
            r"\b(?P<volume>(?:19|20)\d{2})\s+(?P<reporter>WL)\s+(?P<page>\d{1,9})\b".to_string(),
        ),
        (
            ReporterFamily::Lexis,
            r"\b(?P<volume>(?:19|20)\d{2})\s+(?P<reporter>U\.\s?S\.\s?App\.\s?LEXIS|LEXIS)\s+(?P<page>\d{1,9})\b".to_string(),
        ),
    ];

    table
        .into_iter()
        .map(|(family, pattern)| {
            let re = Regex::new(&pattern)
                .unwrap_or_else(|e| panic!("invalid pattern for {}: {e}", family.as_str()));
            (family, re)
        })
        .collect()
});

/// A regex matching any recognised citation, used by the context isolator to
/// blank neighbouring citations out of an extraction window.
pub static ANY_CITATION: Lazy<Vec<&'static Regex>> =
    Lazy::new(|| PATTERNS.iter().map(|(_, re)| re).collect());

/// Find every citation in `text`, in document order, with overlaps resolved.
#[must_use]
pub fn find_citations(text: &str) -> Vec<PatternMatch> {
    let mut matches: Vec<PatternMatch> = Vec::new();

    for (family, re) in PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            let whole = caps.get(0).expect("group 0 always present");
            matches.push(PatternMatch {
                family: *family,
                start: whole.start(),
                end: whole.end(),
                raw_text: whole.as_str().to_string(),
                volume: caps["volume"].to_string(),
                reporter: caps["reporter"].to_string(),
                page: caps["page"].to_string(),
            });
        }
    }

    // Earlier start wins; ties broken by longer span.
    matches.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut kept: Vec<PatternMatch> = Vec::new();
    for m in matches {
        match kept.last() {
            Some(last) if m.start < last.end => {}
            _ => kept.push(m),
        }
    }
    kept
}

/// Spans of every citation in `text`, for callers that only need positions.
#[must_use]
pub fn citation_spans(text: &str) -> Vec<(usize, usize)> {
    find_citations(text).iter().map(|m| (m.start, m.end)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(text: &str) -> PatternMatch {
        let found = find_citations(text);
        assert_eq!(found.len(), 1, "expected one citation in {text:?}: {found:?}");
        found.into_iter().next().unwrap()
    }

    #[test]
    fn matches_us_reports() {
        let m = one("Upper Skagit, 584 U.S. 554, was decided in 2018.");
        assert_eq!(m.family, ReporterFamily::Us);
        assert_eq!(m.volume, "584");
        assert_eq!(m.reporter, "U.S.");
        assert_eq!(m.page, "554");
    }

    #[test]
    fn matches_supreme_court_reporter() {
        let m = one("cited at 138 S. Ct. 1649 by the court");
        assert_eq!(m.family, ReporterFamily::Sct);
        assert_eq!(m.raw_text, "138 S. Ct. 1649");
    }

    #[test]
    fn matches_lawyers_edition_second_series() {
        let m = one("reported in 200 L. Ed. 2d 931 as well");
        assert_eq!(m.family, ReporterFamily::LEd);
        assert_eq!(m.reporter, "L. Ed. 2d");
    }

    #[test]
    fn matches_federal_reporter_series() {
        for (text, reporter) in [
            ("123 F. 456", "F."),
            ("123 F.2d 456", "F.2d"),
            ("123 F.3d 456", "F.3d"),
            ("123 F.4th 456", "F.4th"),
        ] {
            let m = one(&format!("see {text} (1990)"));
            assert_eq!(m.family, ReporterFamily::Fed);
            assert_eq!(m.reporter, reporter);
        }
    }

    #[test]
    fn federal_supplement_beats_bare_federal() {
        let m = one("held in 45 F. Supp. 3d 100 recently");
        assert_eq!(m.family, ReporterFamily::FSupp);
        assert_eq!(m.reporter, "F. Supp. 3d");
    }

    #[test]
    fn matches_regional_reporters() {
        let cases = [
            ("388 P.3d 977", ReporterFamily::Pacific),
            ("12 A.2d 34", ReporterFamily::Atlantic),
            ("99 N.E.3d 88", ReporterFamily::NorthEastern),
            ("77 N.W.2d 66", ReporterFamily::NorthWestern),
            ("55 S.E.2d 44", ReporterFamily::SouthEastern),
            ("33 S.W.3d 22", ReporterFamily::SouthWestern),
            ("11 So.2d 10", ReporterFamily::Southern),
        ];
        for (text, family) in cases {
            assert_eq!(one(&format!("x {text} y")).family, family, "{text}");
        }
    }

    #[test]
    fn washington_aliases_share_a_family() {
        let a = one("see 166 Wn.2d 974 (2009)");
        let b = one("see 166 Wash.2d 974 (2009)");
        assert_eq!(a.family, ReporterFamily::Washington);
        assert_eq!(b.family, ReporterFamily::Washington);
        assert_eq!(a.reporter, "Wn.2d");
        assert_eq!(b.reporter, "Wash.2d");
    }

    #[test]
    fn washington_appellate_is_distinct_from_washington() {
        let m = one("see 12 Wn. App. 2d 345 (2020)");
        assert_eq!(m.family, ReporterFamily::WashingtonApp);
        assert_eq!(m.reporter, "Wn. App. 2d");
    }

    #[test]
    fn matches_neutral_citations_in_both_printed_forms() {
        let dashed = one("resolved by 2017-NM-007 later");
        assert_eq!(dashed.family, ReporterFamily::Neutral);
        assert_eq!(dashed.volume, "2017");
        assert_eq!(dashed.reporter, "NM");
        assert_eq!(dashed.page, "007");

        let spaced = one("resolved by 2019 ND 12 later");
        assert_eq!(spaced.family, ReporterFamily::Neutral);
        assert_eq!(spaced.reporter, "ND");
    }

    #[test]
    fn matches_westlaw_and_lexis() {
        let wl = one("available at 2021 WL 123456 online");
        assert_eq!(wl.family, ReporterFamily::WestLaw);
        assert_eq!(wl.page, "123456");

        let lexis = one("available at 2020 LEXIS 9876 online");
        assert_eq!(lexis.family, ReporterFamily::Lexis);

        let app = one("available at 2020 U.S. App. LEXIS 42 online");
        assert_eq!(app.family, ReporterFamily::Lexis);
        assert_eq!(app.reporter, "U.S. App. LEXIS");
    }

    #[test]
    fn reports_citations_in_document_order() {
        let text = "See 388 P.3d 977 (2017); 2017-NM-007; and 584 U.S. 554.";
        let found = find_citations(text);
        assert_eq!(found.len(), 3);
        assert!(found[0].start < found[1].start);
        assert!(found[1].start < found[2].start);
        assert_eq!(found[0].family, ReporterFamily::Pacific);
        assert_eq!(found[1].family, ReporterFamily::Neutral);
        assert_eq!(found[2].family, ReporterFamily::Us);
    }

    #[test]
    fn overlapping_matches_prefer_earlier_start_then_longer_span() {
        // "2020 U.S. App. LEXIS 42" also contains "LEXIS 42" territory; the
        // full-span match must win and no sub-match may survive.
        let found = find_citations("see 2020 U.S. App. LEXIS 42 here");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reporter, "U.S. App. LEXIS");
    }

    #[test]
    fn adjacent_parallel_citations_stay_separate() {
        let text = "584 U.S. 554, 138 S. Ct. 1649, 200 L. Ed. 2d 931";
        let found = find_citations(text);
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn plain_prose_yields_nothing() {
        assert!(find_citations("The court heard argument on June 3, 2021.").is_empty());
    }
}
