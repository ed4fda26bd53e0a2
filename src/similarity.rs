//! Case-name similarity scoring.
//!
//! Clustering and verification both compare case names with the
//! Ratcliff/Obershelp ratio: recursively take the longest common substring,
//! then score `2 * matched / (len_a + len_b)`. Names are normalised first
//! (lowercased, punctuation-stripped, business suffixes collapsed) so that
//! `Flying T Ranch, Inc.` and `Flying T Ranch Inc` compare equal.

/// Longest common substring between `a` and `b`.
///
/// Returns `(start_a, start_b, len)`; on ties the earliest match in `a` wins,
/// which keeps the recursion deterministic.
fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    if a.is_empty() || b.is_empty() {
        return best;
    }
    // One dp row: lengths[j] = run length ending at (i, j).
    let mut lengths = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        // Walk j backwards so lengths[j] still holds the previous row.
        for j in (0..b.len()).rev() {
            if b[j] == ca {
                let run = lengths[j] + 1;
                lengths[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            } else {
                lengths[j + 1] = 0;
            }
        }
    }
    best
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, k) = longest_match(a, b);
    if k == 0 {
        return 0;
    }
    k + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + k..], &b[j + k..])
}

/// Ratcliff/Obershelp similarity ratio in `[0.0, 1.0]`.
///
/// Two empty strings are identical (ratio 1.0); one empty string matches
/// nothing (ratio 0.0).
#[must_use]
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_chars(&a, &b);
    (2 * matched) as f64 / total as f64
}

/// Business suffixes collapsed to one token so spelled-out and abbreviated
/// forms compare equal.
const SUFFIX_MAP: &[(&str, &str)] = &[
    ("incorporated", "inc"),
    ("corporation", "corp"),
    ("company", "co"),
    ("limited", "ltd"),
    ("association", "assn"),
    ("assn", "assn"),
    ("department", "dept"),
    ("dept", "dept"),
    ("commission", "commn"),
    ("commn", "commn"),
    ("municipal", "mun"),
];

/// Normalise a case name for comparison: lowercase, strip punctuation,
/// collapse whitespace, and map business suffixes onto canonical tokens.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let lowered: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '&' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    lowered
        .split_whitespace()
        .map(|token| {
            for (long, short) in SUFFIX_MAP {
                if token == *long {
                    return *short;
                }
            }
            token
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity between two case names after normalisation.
#[must_use]
pub fn name_similarity(a: &str, b: &str) -> f64 {
    ratio(&normalize_name(a), &normalize_name(b))
}
