//! Verification propagation across parallel-citation clusters.
//!
//! After the verifier has attempted each cluster, one member's successful
//! verification is inherited by its peers under `true_by_parallel`. The
//! propagator is also the single place where canonical data may overwrite a
//! display field (`cluster_case_name` / `cluster_year`).

use crate::types::{Citation, Cluster};

/// First four-digit run in a canonical date string (`2018-05-21` → 2018).
fn year_of(date: &str) -> Option<i32> {
    let digits: String = date.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 4 {
        digits[..4].parse().ok()
    } else {
        None
    }
}

/// How closely a member's canonical date agrees with its own extracted year;
/// large when unknown so it loses tie-breaks.
fn year_distance(c: &Citation) -> i32 {
    match (
        c.canonical_date.as_deref().and_then(year_of),
        c.extracted_year,
    ) {
        (Some(canon), Some(extracted)) => (canon - extracted).abs(),
        _ => i32::MAX,
    }
}

/// Pick the member whose verification the cluster inherits: structured-API
/// sources beat HTML fallbacks, then the closest year match, then document
/// order.
fn pick_winner(verified: &[usize], citations: &[Citation]) -> usize {
    let mut best = verified[0];
    for &idx in &verified[1..] {
        let best_api = citations[best]
            .verification_source
            .is_some_and(|s| s.is_structured_api());
        let c_api = citations[idx]
            .verification_source
            .is_some_and(|s| s.is_structured_api());
        if c_api != best_api {
            if c_api {
                best = idx;
            }
            continue;
        }
        if year_distance(&citations[idx]) < year_distance(&citations[best]) {
            best = idx;
        }
    }
    best
}

/// Apply one cluster member's verification to its peers.
///
/// Postcondition: within each cluster either every member is verified or
/// none is, and any member carrying `true_by_parallel` has a peer that
/// verified directly with the same canonical fields.
pub fn propagate(citations: &mut [Citation], clusters: &mut [Cluster]) {
    for cluster in clusters.iter_mut() {
        let verified_idx: Vec<usize> = cluster
            .members
            .iter()
            .copied()
            .filter(|&idx| citations[idx].verified)
            .collect();
        if verified_idx.is_empty() {
            continue;
        }

        let winner_idx = pick_winner(&verified_idx, citations);

        let canonical_name = citations[winner_idx].canonical_name.clone();
        let canonical_date = citations[winner_idx].canonical_date.clone();
        let canonical_url = citations[winner_idx].canonical_url.clone();
        let source = citations[winner_idx].verification_source;

        for &idx in &cluster.members {
            let member = &mut citations[idx];
            let was_direct = member.verified;
            member.canonical_name = canonical_name.clone();
            member.canonical_date = canonical_date.clone();
            member.canonical_url = canonical_url.clone();
            member.verification_source = source;
            member.verified = true;
            // Members that verified on their own keep their direct flag;
            // only inheritance sets true_by_parallel.
            member.true_by_parallel = !was_direct;
        }

        cluster.canonical_name = canonical_name.clone();
        cluster.canonical_date = canonical_date.clone();
        cluster.canonical_url = canonical_url;
        cluster.verification_source = source;

        // The only canonical-over-display overwrite in the system.
        if canonical_name.is_some() {
            cluster.cluster_case_name = canonical_name;
        }
        if let Some(y) = canonical_date.as_deref().and_then(year_of) {
            cluster.cluster_year = Some(y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReporterFamily, VerificationSource};

    fn mk(start: usize) -> Citation {
        Citation::new(
            format!("{start} U.S. 1"),
            format!("{start} U.S. 1"),
            start,
            start + 10,
            "U.S.".into(),
            start.to_string(),
            "1".into(),
            ReporterFamily::Us,
        )
    }

    fn verify(c: &mut Citation, name: &str, date: &str, source: VerificationSource) {
        c.verified = true;
        c.canonical_name = Some(name.to_string());
        c.canonical_date = Some(date.to_string());
        c.canonical_url = Some(format!("https://example.com/{}", source.as_str()));
        c.verification_source = Some(source);
    }

    fn one_cluster(n: usize) -> (Vec<Citation>, Vec<Cluster>) {
        let citations: Vec<Citation> = (0..n).map(|i| mk(i * 20)).collect();
        let clusters = vec![Cluster {
            id: 0,
            members: (0..n).collect(),
            cluster_case_name: Some("Upper Skagit Indian Tribe v. Lundgren".into()),
            cluster_year: Some(2018),
            canonical_name: None,
            canonical_date: None,
            canonical_url: None,
            verification_source: None,
        }];
        (citations, clusters)
    }

    #[test]
    fn single_verification_is_inherited_by_peers() {
        let (mut cs, mut ks) = one_cluster(3);
        verify(
            &mut cs[1],
            "Upper Skagit Indian Tribe v. Lundgren",
            "2018-05-21",
            VerificationSource::CitationApi,
        );
        propagate(&mut cs, &mut ks);

        assert!(cs.iter().all(|c| c.verified));
        assert!(!cs[1].true_by_parallel);
        assert!(cs[0].true_by_parallel);
        assert!(cs[2].true_by_parallel);
        for c in &cs {
            assert_eq!(
                c.canonical_name.as_deref(),
                Some("Upper Skagit Indian Tribe v. Lundgren")
            );
            assert_eq!(c.verification_source, Some(VerificationSource::CitationApi));
        }
        assert_eq!(ks[0].canonical_date.as_deref(), Some("2018-05-21"));
        assert_eq!(ks[0].cluster_year, Some(2018));
    }

    #[test]
    fn unverified_clusters_are_left_alone() {
        let (mut cs, mut ks) = one_cluster(2);
        propagate(&mut cs, &mut ks);
        assert!(cs.iter().all(|c| !c.verified && !c.true_by_parallel));
        assert!(ks[0].canonical_name.is_none());
        assert_eq!(ks[0].cluster_year, Some(2018));
    }

    #[test]
    fn structured_api_wins_over_html_source() {
        let (mut cs, mut ks) = one_cluster(2);
        verify(&mut cs[0], "Skagit v. Lundgren", "2018-01-01", VerificationSource::Justia);
        verify(
            &mut cs[1],
            "Upper Skagit Indian Tribe v. Lundgren",
            "2018-05-21",
            VerificationSource::CitationApi,
        );
        propagate(&mut cs, &mut ks);
        for c in &cs {
            assert_eq!(c.verification_source, Some(VerificationSource::CitationApi));
        }
        // Both verified directly, so neither carries the inherited flag.
        assert!(!cs[0].true_by_parallel);
        assert!(!cs[1].true_by_parallel);
    }

    #[test]
    fn closest_year_breaks_ties_between_equal_sources() {
        let (mut cs, mut ks) = one_cluster(2);
        cs[0].extracted_year = Some(2018);
        cs[1].extracted_year = Some(2018);
        verify(&mut cs[0], "A v. B", "2021-01-01", VerificationSource::Justia);
        verify(&mut cs[1], "A v. B", "2018-06-01", VerificationSource::Leagle);
        propagate(&mut cs, &mut ks);
        assert_eq!(cs[0].verification_source, Some(VerificationSource::Leagle));
        assert_eq!(ks[0].cluster_year, Some(2018));
    }

    #[test]
    fn no_mixed_clusters_survive() {
        let (mut cs, mut ks) = one_cluster(4);
        verify(&mut cs[3], "A v. B", "2018-05-21", VerificationSource::CornellLii);
        propagate(&mut cs, &mut ks);
        let verified: Vec<bool> = cs.iter().map(|c| c.verified).collect();
        assert!(verified.iter().all(|&v| v));
    }
}
