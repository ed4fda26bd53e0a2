//! Per-reporter-family jurisdiction discipline.
//!
//! Each reporter family carries the set of jurisdictions it can plausibly
//! report. A structured-API candidate whose jurisdiction falls outside the
//! set is rejected outright, which is what keeps an Iowa case from
//! verifying a Pacific Reporter citation.

use crate::types::ReporterFamily;
use std::collections::BTreeMap;

/// States covered by the Pacific Reporter.
const PACIFIC: &[&str] = &[
    "WA", "OR", "CA", "MT", "ID", "NV", "AZ", "HI", "AK", "KS", "CO", "WY", "NM", "UT",
];

/// Iowa and the neighbouring midwest states of the North Western Reporter.
const NORTH_WESTERN: &[&str] = &["IA", "MI", "MN", "NE", "ND", "SD", "WI"];

const NORTH_EASTERN: &[&str] = &["IL", "IN", "MA", "NY", "OH"];
const SOUTH_EASTERN: &[&str] = &["GA", "NC", "SC", "VA", "WV"];
const SOUTH_WESTERN: &[&str] = &["AR", "KY", "MO", "TN", "TX"];
const SOUTHERN: &[&str] = &["AL", "FL", "LA", "MS"];
const ATLANTIC: &[&str] = &[
    "CT", "DE", "DC", "ME", "MD", "NH", "NJ", "PA", "RI", "VT",
];

/// The U.S. Supreme Court reporters.
const SUPREME: &[&str] = &["US"];

const WASHINGTON: &[&str] = &["WA"];

/// Allowed jurisdictions for a family; `None` means unrestricted (online
/// citations and the Federal Reporter span the whole country).
#[must_use]
pub fn allowed_jurisdictions(family: ReporterFamily) -> Option<&'static [&'static str]> {
    match family {
        ReporterFamily::Pacific => Some(PACIFIC),
        ReporterFamily::NorthWestern => Some(NORTH_WESTERN),
        ReporterFamily::NorthEastern => Some(NORTH_EASTERN),
        ReporterFamily::SouthEastern => Some(SOUTH_EASTERN),
        ReporterFamily::SouthWestern => Some(SOUTH_WESTERN),
        ReporterFamily::Southern => Some(SOUTHERN),
        ReporterFamily::Atlantic => Some(ATLANTIC),
        ReporterFamily::Us | ReporterFamily::Sct | ReporterFamily::LEd => Some(SUPREME),
        ReporterFamily::Washington | ReporterFamily::WashingtonApp => Some(WASHINGTON),
        ReporterFamily::Fed
        | ReporterFamily::FSupp
        | ReporterFamily::FedCl
        | ReporterFamily::Br
        | ReporterFamily::Neutral
        | ReporterFamily::WestLaw
        | ReporterFamily::Lexis => None,
    }
}

/// Spellings the upstream APIs use for jurisdictions we care about.
const JURISDICTION_NAMES: &[(&str, &str)] = &[
    ("washington", "WA"),
    ("wash", "WA"),
    ("oregon", "OR"),
    ("california", "CA"),
    ("cal", "CA"),
    ("montana", "MT"),
    ("idaho", "ID"),
    ("nevada", "NV"),
    ("arizona", "AZ"),
    ("ariz", "AZ"),
    ("hawaii", "HI"),
    ("alaska", "AK"),
    ("kansas", "KS"),
    ("kan", "KS"),
    ("colorado", "CO"),
    ("colo", "CO"),
    ("wyoming", "WY"),
    ("wyo", "WY"),
    ("new mexico", "NM"),
    ("utah", "UT"),
    ("iowa", "IA"),
    ("michigan", "MI"),
    ("mich", "MI"),
    ("minnesota", "MN"),
    ("minn", "MN"),
    ("nebraska", "NE"),
    ("neb", "NE"),
    ("north dakota", "ND"),
    ("south dakota", "SD"),
    ("wisconsin", "WI"),
    ("wis", "WI"),
    ("illinois", "IL"),
    ("ill", "IL"),
    ("indiana", "IN"),
    ("ind", "IN"),
    ("massachusetts", "MA"),
    ("mass", "MA"),
    ("new york", "NY"),
    ("ohio", "OH"),
    ("texas", "TX"),
    ("tex", "TX"),
    ("united states", "US"),
    ("u.s", "US"),
    ("us", "US"),
    ("scotus", "US"),
    ("united states supreme court", "US"),
];

/// Normalise an upstream jurisdiction string to a two-letter code where
/// possible.
#[must_use]
pub fn normalize_jurisdiction(raw: &str) -> String {
    let lowered = raw.trim().trim_end_matches('.').to_lowercase();
    if lowered.len() == 2 && lowered.chars().all(|c| c.is_ascii_alphabetic()) {
        return lowered.to_uppercase();
    }
    for (name, code) in JURISDICTION_NAMES {
        if lowered == *name {
            return (*code).to_string();
        }
    }
    raw.trim().to_uppercase()
}

/// Whether a candidate from `jurisdiction` may verify a citation in
/// `family`. `overrides` layers config-provided sets (keyed by the family's
/// string form) over the built-in table.
#[must_use]
pub fn jurisdiction_allows(
    family: ReporterFamily,
    jurisdiction: &str,
    overrides: &BTreeMap<String, Vec<String>>,
) -> bool {
    let code = normalize_jurisdiction(jurisdiction);
    if let Some(set) = overrides.get(family.as_str()) {
        return set.iter().any(|j| normalize_jurisdiction(j) == code);
    }
    match allowed_jurisdictions(family) {
        Some(set) => set.contains(&code.as_str()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacific_accepts_washington_and_rejects_iowa() {
        let none = BTreeMap::new();
        assert!(jurisdiction_allows(ReporterFamily::Pacific, "WA", &none));
        assert!(jurisdiction_allows(ReporterFamily::Pacific, "Washington", &none));
        assert!(!jurisdiction_allows(ReporterFamily::Pacific, "Iowa", &none));
        assert!(!jurisdiction_allows(ReporterFamily::Pacific, "IA", &none));
    }

    #[test]
    fn supreme_court_reporters_accept_only_the_supreme_court() {
        let none = BTreeMap::new();
        for family in [ReporterFamily::Us, ReporterFamily::Sct, ReporterFamily::LEd] {
            assert!(jurisdiction_allows(family, "U.S.", &none));
            assert!(jurisdiction_allows(family, "United States", &none));
            assert!(!jurisdiction_allows(family, "WA", &none));
        }
    }

    #[test]
    fn north_western_covers_the_midwest() {
        let none = BTreeMap::new();
        assert!(jurisdiction_allows(ReporterFamily::NorthWestern, "Iowa", &none));
        assert!(jurisdiction_allows(ReporterFamily::NorthWestern, "SD", &none));
        assert!(!jurisdiction_allows(ReporterFamily::NorthWestern, "CA", &none));
    }

    #[test]
    fn unrestricted_families_accept_anything() {
        let none = BTreeMap::new();
        assert!(jurisdiction_allows(ReporterFamily::Fed, "WA", &none));
        assert!(jurisdiction_allows(ReporterFamily::WestLaw, "Guam", &none));
    }

    #[test]
    fn config_overrides_replace_the_builtin_set() {
        let mut overrides = BTreeMap::new();
        overrides.insert("pacific".to_string(), vec!["IA".to_string()]);
        assert!(jurisdiction_allows(ReporterFamily::Pacific, "Iowa", &overrides));
        assert!(!jurisdiction_allows(ReporterFamily::Pacific, "WA", &overrides));
    }

    #[test]
    fn jurisdiction_spellings_normalise() {
        assert_eq!(normalize_jurisdiction("Wash."), "WA");
        assert_eq!(normalize_jurisdiction("wa"), "WA");
        assert_eq!(normalize_jurisdiction("United States"), "US");
    }
}
