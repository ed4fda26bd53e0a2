//! Strict per-citation context isolation.
//!
//! For a citation at `[cite_start, cite_end)` the isolator computes the
//! `[lo, hi)` window handed to the case-name and year extractor:
//!
//! - `lo` is the latest of `cite_start - 400`, the end of the previous
//!   citation, and the position after the nearest sentence terminator that
//!   is outside parentheses and quotes.
//! - `hi` is the earliest of `cite_end + 200`, the start of the next
//!   citation, and the next sentence terminator after `cite_end`.
//!
//! Any other citation text inside the window is blanked with spaces
//! (offset-preserving), and leading signal words are blanked the same way,
//! so the extractor can never pick up a neighbour's citation or a signal
//! word as part of a case name.

use crate::patterns;

/// Backward context radius in bytes. Distinct from the 200-char clustering
/// proximity bound; the two are configured separately on purpose.
pub const CONTEXT_BACK_CHARS: usize = 400;

/// Forward context radius in bytes.
pub const CONTEXT_FWD_CHARS: usize = 200;

/// Signal words stripped from the head of a context window, longest first so
/// that greedy stripping removes `But see` before `See`.
pub const SIGNAL_WORDS: &[&str] = &[
    "for example, in",
    "but see",
    "but cf.",
    "see also",
    "overruling",
    "affirming",
    "affirmed",
    "reversed",
    "remanded",
    "vacated",
    "accord",
    "contra",
    "e.g.",
    "cf.",
    "see",
    "id.",
];

/// Tokens whose trailing period never ends a sentence. Single-letter tokens
/// (initials, reporter fragments) are excluded separately.
const NON_TERMINAL_ABBREVIATIONS: &[&str] = &[
    "v", "vs", "inc", "llc", "corp", "co", "ltd", "jr", "sr", "no", "nos", "mr", "mrs", "dr",
    "st", "ave", "al", "app", "supp", "wash", "wn", "cal", "fed", "cl", "ed", "rev", "stat",
    "sec", "mun", "dep't", "ass'n", "comm'n",
];

/// The isolated context for one citation.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    /// Window start, byte offset into the cleaned text
    pub lo: usize,
    /// Window end, exclusive
    pub hi: usize,
    /// Window text with neighbouring citations and leading signal words
    /// blanked; byte `i` of `text` corresponds to byte `lo + i` of the source
    pub text: String,
    /// Offset of the citation start within `text`
    pub cite_offset: usize,
    /// Offset one past the citation end within `text`
    pub cite_end_offset: usize,
}

impl ContextWindow {
    /// True when blanking and stripping left nothing usable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// The word token immediately before byte `idx`, lowercased. Used to decide
/// whether a period belongs to an abbreviation.
fn token_before(text: &str, idx: usize) -> String {
    let head = &text[..idx];
    let mut chars: Vec<char> = Vec::new();
    for c in head.chars().rev() {
        if c.is_alphanumeric() || c == '\'' || c == '\u{2019}' {
            chars.push(c.to_ascii_lowercase());
        } else {
            break;
        }
    }
    chars.into_iter().rev().collect()
}

/// Whether the terminator candidate at byte `idx` (a `.`, `?`, or `!`) ends a
/// sentence. Periods after abbreviations, initials, or digits-into-digits do
/// not; `?` and `!` always do.
fn is_sentence_terminator(text: &str, idx: usize) -> bool {
    let ch = text[idx..].chars().next().unwrap_or(' ');
    if ch == '?' || ch == '!' {
        return true;
    }
    if ch != '.' {
        return false;
    }

    // Must be followed by whitespace (or end of text), then an uppercase
    // letter, a digit, or nothing.
    let rest = &text[idx + 1..];
    if !rest.is_empty() && !rest.starts_with(|c: char| c.is_whitespace()) {
        return false;
    }
    match rest.trim_start().chars().next() {
        None => {}
        Some(c) if c.is_uppercase() || c.is_numeric() || c == '(' || c == '"' => {}
        Some(_) => return false,
    }

    let token = token_before(text, idx);
    if token.is_empty() {
        // A period straight after a closing paren or quote ends the
        // sentence; anything else (stray punctuation runs) does not.
        return matches!(
            text[..idx].chars().next_back(),
            Some(')') | Some('"') | Some('\u{201D}')
        );
    }
    if token.chars().count() == 1 {
        // Initials and reporter fragments: "T.", "F.", "P.".
        return false;
    }
    !NON_TERMINAL_ABBREVIATIONS.contains(&token.as_str())
}

/// Scan `text[from..to]` and return the position just past the last sentence
/// terminator that sits outside parentheses and quotation marks.
fn last_terminator_end(text: &str, from: usize, to: usize) -> Option<usize> {
    let mut paren_depth: i32 = 0;
    let mut in_quote = false;
    let mut found = None;
    for (rel, c) in text[from..to].char_indices() {
        let idx = from + rel;
        match c {
            '(' => paren_depth += 1,
            ')' => paren_depth = (paren_depth - 1).max(0),
            '"' => in_quote = !in_quote,
            '\u{201C}' => in_quote = true,
            '\u{201D}' => in_quote = false,
            '.' | '?' | '!' => {
                if paren_depth == 0 && !in_quote && is_sentence_terminator(text, idx) {
                    found = Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    found
}

/// Scan forward from `from` (capped at `to`) for the first sentence
/// terminator outside parentheses and quotes; returns the exclusive bound
/// just past it.
fn next_terminator_end(text: &str, from: usize, to: usize) -> Option<usize> {
    let mut paren_depth: i32 = 0;
    let mut in_quote = false;
    for (rel, c) in text[from..to].char_indices() {
        let idx = from + rel;
        match c {
            '(' => paren_depth += 1,
            ')' => paren_depth = (paren_depth - 1).max(0),
            '"' => in_quote = !in_quote,
            '\u{201C}' => in_quote = true,
            '\u{201D}' => in_quote = false,
            '.' | '?' | '!' => {
                if paren_depth == 0 && !in_quote && is_sentence_terminator(text, idx) {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Blank the byte range `[start, end)` of `window` with spaces, whole
/// characters at a time so offsets and UTF-8 validity are preserved.
fn blank_range(window: &mut String, start: usize, end: usize) {
    let mut out = String::with_capacity(window.len());
    for (idx, c) in window.char_indices() {
        if idx >= start && idx < end {
            for _ in 0..c.len_utf8() {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
    *window = out;
}

/// Blank leading signal words, greedily and case-insensitively, from the
/// window head up to the citation itself.
fn blank_leading_signals(window: &mut String, cite_offset: usize) {
    loop {
        let head_end = cite_offset.min(window.len());
        let head = &window[..head_end];
        let trimmed_start = head.len() - head.trim_start().len();
        let lead = head[trimmed_start..].to_lowercase();

        let mut stripped = false;
        for signal in SIGNAL_WORDS {
            if lead.starts_with(signal) {
                let after = lead[signal.len()..].chars().next();
                let boundary = match after {
                    None => true,
                    Some(c) => c.is_whitespace() || c == ',' || c == ';' || c == ':',
                };
                if boundary {
                    let mut end = trimmed_start + signal.len();
                    // Swallow the separator that followed the signal word.
                    while window[end..head_end]
                        .chars()
                        .next()
                        .is_some_and(|c| c == ',' || c == ';' || c == ':')
                    {
                        end += 1;
                    }
                    blank_range(window, trimmed_start, end);
                    stripped = true;
                    break;
                }
            }
        }
        if !stripped {
            break;
        }
    }
}

/// Compute the isolated context window for the citation at
/// `[cite_start, cite_end)`, given the sorted spans of every citation in the
/// document.
#[must_use]
pub fn isolate(
    text: &str,
    cite_start: usize,
    cite_end: usize,
    all_spans: &[(usize, usize)],
) -> ContextWindow {
    let prev_end = all_spans
        .iter()
        .filter(|(_, e)| *e <= cite_start)
        .map(|(_, e)| *e)
        .max();
    let next_start = all_spans
        .iter()
        .filter(|(s, _)| *s >= cite_end)
        .map(|(s, _)| *s)
        .min();

    let base = ceil_char_boundary(text, cite_start.saturating_sub(CONTEXT_BACK_CHARS));
    let mut lo = base;
    if let Some(p) = prev_end {
        lo = lo.max(p);
    }
    if let Some(t) = last_terminator_end(text, lo, cite_start) {
        lo = lo.max(t);
    }
    lo = ceil_char_boundary(text, lo);

    let fwd_cap = floor_char_boundary(text, (cite_end + CONTEXT_FWD_CHARS).min(text.len()));
    let mut hi = fwd_cap;
    if let Some(n) = next_start {
        hi = hi.min(n);
    }
    if let Some(t) = next_terminator_end(text, cite_end, hi) {
        hi = hi.min(t);
    }
    hi = floor_char_boundary(text, hi.max(cite_end));

    let mut window = text[lo..hi].to_string();
    let cite_offset = cite_start - lo;
    let cite_end_offset = cite_end - lo;

    // Blank every other citation overlapping the window. The bounds above
    // already exclude whole neighbouring spans, so this catches partial
    // fragments and any pattern text the span list did not keep.
    for &(s, e) in all_spans {
        if (s, e) == (cite_start, cite_end) || e <= lo || s >= hi {
            continue;
        }
        let end = (e - lo).min(window.len());
        blank_range(&mut window, s.saturating_sub(lo), end);
    }
    for re in patterns::ANY_CITATION.iter() {
        let hits: Vec<(usize, usize)> = re
            .find_iter(&window)
            .map(|m| (m.start(), m.end()))
            .filter(|&(s, e)| e <= cite_offset || s >= cite_end_offset)
            .collect();
        for (s, e) in hits {
            blank_range(&mut window, s, e);
        }
    }

    blank_leading_signals(&mut window, cite_offset);

    ContextWindow {
        lo,
        hi,
        text: window,
        cite_offset,
        cite_end_offset,
    }
}
