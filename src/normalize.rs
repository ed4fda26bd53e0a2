//! Citation normalization.
//!
//! Reassembles a citation from its parsed components into one canonical
//! printed form per reporter family (`Wn.2d` and `Wash.2d` both become
//! `Wash.2d`), dropping pinpoint pages, star pages, docket decorations, and
//! court parentheticals along the way. Also generates the variant set used
//! by verification when comparing against upstream citation lists.
//!
//! Everything here is pure and deterministic; normalizing an
//! already-normalized citation is the identity.

use crate::patterns::{self, PatternMatch};
use crate::types::ReporterFamily;

/// Alias table keyed by the whitespace-collapsed, ordinal-normalized label.
/// Values are the canonical printed forms.
const REPORTER_ALIASES: &[(&str, &str)] = &[
    ("U.S.", "U.S."),
    ("S.Ct.", "S. Ct."),
    ("L.Ed.", "L. Ed."),
    ("L.Ed.2d", "L. Ed. 2d"),
    ("F.", "F."),
    ("F.2d", "F.2d"),
    ("F.3d", "F.3d"),
    ("F.4th", "F.4th"),
    ("F.Supp.", "F. Supp."),
    ("F.Supp.2d", "F. Supp. 2d"),
    ("F.Supp.3d", "F. Supp. 3d"),
    ("Fed.Cl.", "Fed. Cl."),
    ("B.R.", "B.R."),
    ("A.", "A."),
    ("A.2d", "A.2d"),
    ("A.3d", "A.3d"),
    ("P.", "P."),
    ("P.2d", "P.2d"),
    ("P.3d", "P.3d"),
    ("N.E.", "N.E."),
    ("N.E.2d", "N.E.2d"),
    ("N.E.3d", "N.E.3d"),
    ("N.W.", "N.W."),
    ("N.W.2d", "N.W.2d"),
    ("S.E.", "S.E."),
    ("S.E.2d", "S.E.2d"),
    ("S.W.", "S.W."),
    ("S.W.2d", "S.W.2d"),
    ("S.W.3d", "S.W.3d"),
    ("So.", "So."),
    ("So.2d", "So.2d"),
    ("So.3d", "So.3d"),
    ("Wn.", "Wash."),
    ("Wash.", "Wash."),
    ("Wn.2d", "Wash.2d"),
    ("Wash.2d", "Wash.2d"),
    ("Wn.App.", "Wash. App."),
    ("Wash.App.", "Wash. App."),
    ("Wn.App.2d", "Wash. App. 2d"),
    ("Wash.App.2d", "Wash. App. 2d"),
    ("WL", "WL"),
    ("LEXIS", "LEXIS"),
    ("U.S.App.LEXIS", "U.S. App. LEXIS"),
];

/// Collapse a printed label to its alias key: whitespace removed, spelled
/// ordinals folded to the reporter forms.
fn label_key(label: &str) -> String {
    let collapsed: String = label.chars().filter(|c| !c.is_whitespace()).collect();
    collapsed.replace("2nd", "2d").replace("3rd", "3d")
}

/// Canonical printed label for a reporter as found in the document.
/// Unknown labels pass through unchanged.
#[must_use]
pub fn canonical_reporter(label: &str) -> String {
    let key = label_key(label);
    for (alias, canonical) in REPORTER_ALIASES {
        if *alias == key {
            return (*canonical).to_string();
        }
    }
    label.to_string()
}

/// Canonical label with configuration-provided aliases layered over the
/// built-in table. Override keys match on the collapsed label form.
#[must_use]
pub fn canonical_reporter_with(
    label: &str,
    overrides: &std::collections::BTreeMap<String, String>,
) -> String {
    let key = label_key(label);
    for (alias, canonical) in overrides {
        if label_key(alias) == key {
            return canonical.clone();
        }
    }
    canonical_reporter(label)
}

/// `normalized_text` with configuration alias overrides applied.
#[must_use]
pub fn normalized_text_with(
    m: &PatternMatch,
    overrides: &std::collections::BTreeMap<String, String>,
) -> String {
    match m.family {
        ReporterFamily::Neutral => format!("{}-{}-{}", m.volume, m.reporter, m.page),
        _ => format!(
            "{} {} {}",
            m.volume,
            canonical_reporter_with(&m.reporter, overrides),
            m.page
        ),
    }
}

/// The canonical normalized text for a pattern match. Neutral citations
/// keep their dashed court-issued form; everything else prints as
/// `<volume> <canonical reporter> <page>`.
#[must_use]
pub fn normalized_text(m: &PatternMatch) -> String {
    match m.family {
        ReporterFamily::Neutral => format!("{}-{}-{}", m.volume, m.reporter, m.page),
        _ => format!("{} {} {}", m.volume, canonical_reporter(&m.reporter), m.page),
    }
}

/// Swap the ordinal spelling inside a label: `2d`↔`2nd`, `3d`↔`3rd`.
/// Returns `None` when the label carries no ordinal.
fn ordinal_variant(label: &str) -> Option<String> {
    if label.contains("2d") {
        Some(label.replace("2d", "2nd"))
    } else if label.contains("3d") {
        Some(label.replace("3d", "3rd"))
    } else if label.contains("2nd") {
        Some(label.replace("2nd", "2d"))
    } else if label.contains("3rd") {
        Some(label.replace("3rd", "3d"))
    } else {
        None
    }
}

/// Every printed alias for the canonical label, canonical first.
fn label_aliases(canonical: &str) -> Vec<String> {
    let key = label_key(canonical);
    let mut out = vec![canonical.to_string()];
    for (alias, canon) in REPORTER_ALIASES {
        if label_key(canon) == key && label_key(alias) != key {
            // Reprint the collapsed alias key in spaced form by reusing the
            // canonical spacing where possible; the collapsed key itself is
            // how the alias appears in tight print (`Wn.2d`).
            out.push((*alias).to_string());
        }
    }
    out
}

/// The variant set for a citation: canonical form, each reporter alias,
/// alternative ordinals, and full-name Washington forms.
#[must_use]
pub fn variants(m: &PatternMatch) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: String| {
        if !out.contains(&s) {
            out.push(s);
        }
    };

    match m.family {
        ReporterFamily::Neutral => {
            push(format!("{}-{}-{}", m.volume, m.reporter, m.page));
            push(format!("{} {} {}", m.volume, m.reporter, m.page));
        }
        _ => {
            let canonical = canonical_reporter(&m.reporter);
            for label in label_aliases(&canonical) {
                push(format!("{} {} {}", m.volume, label, m.page));
                if let Some(ord) = ordinal_variant(&label) {
                    push(format!("{} {} {}", m.volume, ord, m.page));
                }
                if matches!(
                    m.family,
                    ReporterFamily::Washington | ReporterFamily::WashingtonApp
                ) {
                    let full = label.replacen("Wash.", "Washington", 1).replacen(
                        "Wn.",
                        "Washington",
                        1,
                    );
                    let full = if full.contains("Washington2d") {
                        full.replace("Washington2d", "Washington 2d")
                    } else {
                        full
                    };
                    push(format!("{} {} {}", m.volume, full.trim(), m.page));
                }
            }
        }
    }
    out
}

/// Normalize free-form citation text: parse the first recognised citation
/// and return its canonical form. Pinpoints, dockets, and parentheticals
/// fall away because only the captured components are reassembled.
#[must_use]
pub fn normalize(text: &str) -> Option<String> {
    patterns::find_citations(text)
        .first()
        .map(normalized_text)
}

/// Variant set for already-extracted citation text. Used by verification to
/// compare against upstream citation lists; falls back to the text itself
/// when it does not reparse.
#[must_use]
pub fn variants_for_text(text: &str) -> Vec<String> {
    match patterns::find_citations(text).first() {
        Some(m) => variants(m),
        None => vec![text.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match(text: &str) -> PatternMatch {
        patterns::find_citations(text).into_iter().next().unwrap()
    }

    #[test]
    fn washington_aliases_map_to_wash() {
        assert_eq!(canonical_reporter("Wn.2d"), "Wash.2d");
        assert_eq!(canonical_reporter("Wash.2d"), "Wash.2d");
        assert_eq!(canonical_reporter("Wn. App. 2d"), "Wash. App. 2d");
        assert_eq!(canonical_reporter("Wn."), "Wash.");
    }

    #[test]
    fn spacing_is_canonicalised() {
        assert_eq!(canonical_reporter("S.Ct."), "S. Ct.");
        assert_eq!(canonical_reporter("L. Ed. 2d"), "L. Ed. 2d");
        assert_eq!(canonical_reporter("F. Supp.2d"), "F. Supp. 2d");
    }

    #[test]
    fn unknown_labels_pass_through() {
        assert_eq!(canonical_reporter("Neb."), "Neb.");
    }

    #[test]
    fn normalized_text_uses_canonical_label() {
        let m = first_match("see 166 Wn.2d 974 (2009)");
        assert_eq!(normalized_text(&m), "166 Wash.2d 974");
    }

    #[test]
    fn pinpoints_and_parentheticals_fall_away() {
        assert_eq!(
            normalize("166 Wn.2d 974, 980-81 (2009)"),
            Some("166 Wash.2d 974".to_string())
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("166 Wn.2d 974").unwrap();
        assert_eq!(normalize(&once), Some(once.clone()));

        let neutral = normalize("2017-NM-007").unwrap();
        assert_eq!(normalize(&neutral), Some(neutral));
    }

    #[test]
    fn neutral_citations_keep_the_dashed_form() {
        assert_eq!(
            normalize("decided by 2019 ND 12 today"),
            Some("2019-ND-12".to_string())
        );
    }

    #[test]
    fn variant_set_contains_aliases_and_ordinals() {
        let m = first_match("166 Wash.2d 974");
        let vs = variants(&m);
        assert!(vs.contains(&"166 Wash.2d 974".to_string()), "{vs:?}");
        assert!(vs.contains(&"166 Wn.2d 974".to_string()), "{vs:?}");
        assert!(vs.contains(&"166 Wash.2nd 974".to_string()), "{vs:?}");
        assert!(vs.contains(&"166 Washington 2d 974".to_string()), "{vs:?}");
    }

    #[test]
    fn variant_set_for_neutral_has_both_printed_forms() {
        let m = first_match("2017-NM-007");
        let vs = variants(&m);
        assert!(vs.contains(&"2017-NM-007".to_string()));
        assert!(vs.contains(&"2017 NM 007".to_string()));
    }

    #[test]
    fn lexis_spacing_is_canonical() {
        let m = first_match("2020 U.S.App. LEXIS 42");
        assert_eq!(normalized_text(&m), "2020 U.S. App. LEXIS 42");
    }
}
