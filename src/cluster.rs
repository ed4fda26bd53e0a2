//! Parallel-citation clustering.
//!
//! Runs before verification and uses only document-derived fields: the
//! extracted case name, the extracted year, and character positions.
//! Canonical data is forbidden here; a cluster formed from canonical names
//! would let upstream data rewrite what the document says.

use crate::similarity::name_similarity;
use crate::types::{Citation, Cluster};

/// Knobs for the clustering pass; defaults mirror the configuration surface.
#[derive(Debug, Clone, Copy)]
pub struct ClusterOptions {
    /// Minimum name similarity for two citations to share a cluster
    pub name_similarity_threshold: f64,
    /// Maximum year difference among members
    pub year_tolerance: i32,
    /// Maximum character gap between a citation and its nearest cluster member
    pub proximity_chars: usize,
    /// Maximum span (max end − min start) of a finished cluster
    pub max_span_chars: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            name_similarity_threshold: 0.6,
            year_tolerance: 2,
            proximity_chars: 200,
            max_span_chars: 2000,
        }
    }
}

/// Near-identical names excuse the proximity bound: repeated references to
/// one case across a long document still cluster.
const EXACT_NAME_SIMILARITY: f64 = 0.95;

fn gap(a: &Citation, b: &Citation) -> usize {
    if a.start >= b.end {
        a.start - b.end
    } else if b.start >= a.end {
        b.start - a.end
    } else {
        0
    }
}

/// The extracted case name occurring most frequently among members; ties go
/// to the earliest member. Null when every member's name is null.
fn representative_name(members: &[usize], citations: &[Citation]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for &idx in members {
        if let Some(name) = &citations[idx].extracted_case_name {
            match counts.iter_mut().find(|(n, _)| n == name) {
                Some((_, c)) => *c += 1,
                None => counts.push((name.clone(), 1)),
            }
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (name, count) in counts {
        if best.as_ref().is_none_or(|(_, c)| count > *c) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name)
}

fn representative_year(members: &[usize], citations: &[Citation]) -> Option<i32> {
    let mut counts: Vec<(i32, usize)> = Vec::new();
    for &idx in members {
        if let Some(year) = citations[idx].extracted_year {
            match counts.iter_mut().find(|(y, _)| *y == year) {
                Some((_, c)) => *c += 1,
                None => counts.push((year, 1)),
            }
        }
    }
    let mut best: Option<(i32, usize)> = None;
    for (year, count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((year, count));
        }
    }
    best.map(|(year, _)| year)
}

struct MergeFit {
    name_sim: Option<f64>,
    min_gap: usize,
}

/// Evaluate the merge tests for citation `c` against cluster `members`.
///
/// All tests are pairwise against every member, not just the
/// representative, so the finished cluster satisfies the pairwise
/// invariants directly: every named pair at least threshold-similar, year
/// spread within tolerance, and every pair within the proximity bound
/// unless its names match near-exactly.
fn should_merge(
    c: &Citation,
    members: &[usize],
    citations: &[Citation],
    opts: &ClusterOptions,
) -> Option<MergeFit> {
    let min_gap = members
        .iter()
        .map(|&idx| gap(c, &citations[idx]))
        .min()
        .unwrap_or(usize::MAX);

    for &idx in members {
        let member = &citations[idx];
        let pair_sim = match (&c.extracted_case_name, &member.extracted_case_name) {
            (Some(a), Some(b)) => Some(name_similarity(a, b)),
            _ => None,
        };
        if let Some(sim) = pair_sim {
            if sim < opts.name_similarity_threshold {
                return None;
            }
        }
        let names_exact = pair_sim.is_some_and(|s| s >= EXACT_NAME_SIMILARITY);
        if gap(c, member) > opts.proximity_chars && !names_exact {
            return None;
        }
    }

    // Shared-sentence heuristic: when either side lacks a name, only tight
    // proximity justifies the merge.
    let rep_name = representative_name(members, citations);
    let name_sim = match (&c.extracted_case_name, &rep_name) {
        (Some(a), Some(b)) => Some(name_similarity(a, b)),
        _ => {
            if min_gap > opts.proximity_chars {
                return None;
            }
            None
        }
    };

    // Year spread across the whole cluster stays within tolerance.
    if let Some(cy) = c.extracted_year {
        let member_years: Vec<i32> = members
            .iter()
            .filter_map(|&idx| citations[idx].extracted_year)
            .collect();
        if let (Some(&min_y), Some(&max_y)) =
            (member_years.iter().min(), member_years.iter().max())
        {
            if max_y.max(cy) - min_y.min(cy) > opts.year_tolerance {
                return None;
            }
        }
    }

    Some(MergeFit { name_sim, min_gap })
}

/// Split an over-long member list at its largest inter-member gaps until
/// every group spans at most `max_span`. Members must be in document order.
fn split_by_span(members: Vec<usize>, citations: &[Citation], max_span: usize) -> Vec<Vec<usize>> {
    let span = |ms: &[usize]| -> usize {
        let first = citations[ms[0]].start;
        let last = citations[*ms.last().expect("non-empty group")].end;
        last - first
    };

    if members.len() <= 1 || span(&members) <= max_span {
        return vec![members];
    }

    // Largest gap between consecutive members; first on ties.
    let mut cut = 1;
    let mut widest = 0;
    for w in 1..members.len() {
        let g = gap(&citations[members[w]], &citations[members[w - 1]]);
        if g > widest {
            widest = g;
            cut = w;
        }
    }

    let right = members[cut..].to_vec();
    let left = members[..cut].to_vec();
    let mut out = split_by_span(left, citations, max_span);
    out.extend(split_by_span(right, citations, max_span));
    out
}

/// Partition citations (document order) into parallel-citation clusters and
/// stamp each citation's `cluster_id`.
pub fn cluster_citations(citations: &mut [Citation], opts: &ClusterOptions) -> Vec<Cluster> {
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for idx in 0..citations.len() {
        let c = &citations[idx];
        let mut fits: Vec<(usize, MergeFit)> = Vec::new();
        for (g, members) in groups.iter().enumerate() {
            if let Some(fit) = should_merge(c, members, citations, opts) {
                fits.push((g, fit));
            }
        }

        match fits.len() {
            0 => groups.push(vec![idx]),
            1 => groups[fits[0].0].push(idx),
            _ => {
                // Prefer the most similar representative name; fall back to
                // the closest cluster by proximity.
                let best = fits
                    .into_iter()
                    .min_by(|(_, a), (_, b)| {
                        let an = a.name_sim.unwrap_or(-1.0);
                        let bn = b.name_sim.unwrap_or(-1.0);
                        bn.partial_cmp(&an)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then(a.min_gap.cmp(&b.min_gap))
                    })
                    .expect("at least two fits");
                groups[best.0].push(idx);
            }
        }
    }

    let mut split: Vec<Vec<usize>> = Vec::new();
    for group in groups {
        split.extend(split_by_span(group, citations, opts.max_span_chars));
    }
    split.sort_by_key(|ms| citations[ms[0]].start);

    let mut clusters = Vec::with_capacity(split.len());
    for (n, members) in split.into_iter().enumerate() {
        let id = n as u32;
        for &idx in &members {
            citations[idx].cluster_id = Some(id);
        }
        let cluster_case_name = representative_name(&members, citations);
        let cluster_year = representative_year(&members, citations);
        clusters.push(Cluster {
            id,
            members,
            cluster_case_name,
            cluster_year,
            canonical_name: None,
            canonical_date: None,
            canonical_url: None,
            verification_source: None,
        });
    }
    clusters
}
