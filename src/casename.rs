//! Case-name and year extraction from an isolated context window.
//!
//! The extractor only ever sees the window produced by the context isolator,
//! so neighbouring citations are already blanked and leading signal words
//! are gone. Within the window it searches backward from the citation for
//! the last case-name pattern, then hunts for the decision year position by
//! position: parenthesised court/date group first, then between name and
//! volume, then anywhere in the window.

use crate::context::ContextWindow;
use once_cell::sync::Lazy;
use regex::Regex;

/// Earliest plausible decision year.
const MIN_YEAR: i32 = 1700;

/// A party: capitalised tokens joined by spaces, commas, and a small closed
/// set of lowercase connectors, so `Stillaguamish Tribe of Indians` and
/// `Flying T Ranch, Inc.` both hold together.
const PARTY: &str = r"[A-Z][\w&'’.\-]*(?:,?\s+(?:[A-Z][\w&'’.\-]*|of|the|and|for|ex rel\.|et al\.|d/b/a|&))*";

/// Adversarial case names: `X v. Y` (also `vs.`).
static ADVERSARIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?P<name>{PARTY}\s+vs?\.\s+{PARTY})")).expect("adversarial pattern")
});

/// Special-form case names: `In re …`, `Ex parte …`, `Matter of …`,
/// `Estate of …`.
static SPECIAL_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?P<name>(?:In re|Ex parte|Matter of|Estate of)\s+{PARTY})"
    ))
    .expect("special-form pattern")
});

/// A parenthesised group after the citation holding the court and/or year,
/// e.g. `(W.D. Wash. 2024)` or `(2017)`.
static PAREN_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]*)\)").expect("paren group pattern"));

static FOUR_DIGIT_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(1[7-9]\d{2}|20\d{2})\b").expect("year pattern"));

/// Signal tokens that must never lead an extracted case name. The isolator
/// blanks them at the window head; this guard catches mid-window stragglers
/// swallowed by the capitalised-token party pattern.
const LEADING_SIGNAL_TOKENS: &[&str] = &["see", "also", "accord", "contra", "cf.", "e.g.", "id.", "but"];

/// Procedural phrases that are not case names even when capitalised.
const PROCEDURAL_TOKENS: &[&str] = &[
    "vacated",
    "remanded",
    "reversed",
    "affirmed",
    "overruling",
    "affirming",
    "and",
];

/// Document-derived facts for one citation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFacts {
    pub case_name: Option<String>,
    pub year: Option<i32>,
}

fn is_procedural_only(name: &str) -> bool {
    let mut any = false;
    for token in name.split_whitespace() {
        any = true;
        let lowered = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        if !PROCEDURAL_TOKENS.contains(&lowered.as_str()) {
            return false;
        }
    }
    any
}

/// Drop leading signal tokens and trailing connectors/punctuation from a
/// candidate name.
fn tidy_name(name: &str) -> String {
    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    while let Some(first) = tokens.first() {
        let lowered = first.to_lowercase();
        if LEADING_SIGNAL_TOKENS.contains(&lowered.as_str()) {
            tokens.remove(0);
        } else {
            break;
        }
    }
    while let Some(last) = tokens.last() {
        let lowered = last.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        if matches!(lowered.as_str(), "of" | "the" | "and" | "for") {
            tokens.pop();
        } else {
            break;
        }
    }
    tokens.join(" ").trim_end_matches([',', ';']).to_string()
}

/// Extract the case name appearing immediately before the citation, if any.
///
/// All candidates from both name patterns are collected from the window text
/// preceding the citation; the one whose end offset is closest to (and not
/// past) the citation start wins.
#[must_use]
pub fn extract_case_name(window: &ContextWindow) -> Option<(String, usize)> {
    if window.is_empty() {
        return None;
    }
    let head = &window.text[..window.cite_offset.min(window.text.len())];

    let mut best: Option<(usize, usize, String)> = None;
    for re in [&*ADVERSARIAL, &*SPECIAL_FORM] {
        for m in re.find_iter(head) {
            let candidate = (m.end(), m.end() - m.start(), m.as_str().to_string());
            let better = match &best {
                None => true,
                // Closest to the citation; ties go to the longer span.
                Some((end, len, _)) => candidate.0 > *end || (candidate.0 == *end && candidate.1 > *len),
            };
            if better {
                best = Some(candidate);
            }
        }
    }

    let (end, _, raw) = best?;
    let name = tidy_name(&raw);
    if name.is_empty() || is_procedural_only(&name) {
        return None;
    }
    if name.chars().next().is_some_and(char::is_lowercase) {
        return None;
    }
    // Citation text is blanked from the window before extraction; a name
    // that still embeds a recognised citation is malformed.
    if !crate::patterns::find_citations(&name).is_empty() {
        return None;
    }
    Some((name, end))
}

fn year_in_range(candidate: i32, current_year: i32) -> bool {
    (MIN_YEAR..=current_year + 1).contains(&candidate)
}

fn first_year_in(text: &str, current_year: i32) -> Option<i32> {
    for m in FOUR_DIGIT_YEAR.find_iter(text) {
        if let Ok(y) = m.as_str().parse::<i32>() {
            if year_in_range(y, current_year) {
                return Some(y);
            }
        }
    }
    None
}

/// Extract the decision year for the citation, trying each position in
/// order. `name_end` is the window offset where the extracted case name
/// ends, when one was found.
#[must_use]
pub fn extract_year(
    window: &ContextWindow,
    name_end: Option<usize>,
    current_year: i32,
) -> Option<i32> {
    let text = &window.text;

    // 1. Parenthesised court/date group after the citation.
    let tail = &text[window.cite_end_offset.min(text.len())..];
    for group in PAREN_GROUP.captures_iter(tail) {
        if let Some(y) = first_year_in(&group[1], current_year) {
            return Some(y);
        }
    }

    // 2. Between the case name and the citation volume.
    let between_start = name_end.unwrap_or(0).min(window.cite_offset);
    let between = &text[between_start..window.cite_offset.min(text.len())];
    if let Some(y) = first_year_in(between, current_year) {
        return Some(y);
    }

    // 3. Anywhere in the window, excluding the citation's own text (a
    //    neutral citation's year component lives inside the span).
    let head = &text[..window.cite_offset.min(text.len())];
    if let Some(y) = first_year_in(head, current_year) {
        return Some(y);
    }
    first_year_in(tail, current_year)
}

/// Run both extractors over a window.
#[must_use]
pub fn extract(window: &ContextWindow, current_year: i32) -> DocumentFacts {
    let name = extract_case_name(window);
    let year = extract_year(window, name.as_ref().map(|(_, end)| *end), current_year);
    DocumentFacts {
        case_name: name.map(|(n, _)| n),
        year,
    }
}
