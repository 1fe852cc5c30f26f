//! Candidate discovery: read decomposition, core extension and the position cache.

pub mod cache;
pub mod decompose;
pub mod extend;

use std::collections::{btree_map::Entry, BTreeMap};

use crate::{read_context::ReadContext, tier::EvidenceTier};

/// A candidate variant with its representative read context.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Candidate {
    pub chromosome: String,
    pub position: i64,
    #[serde(rename = "ref")]
    pub ref_allele: String,
    #[serde(rename = "alt")]
    pub alt_allele: String,
    pub tier: EvidenceTier,
    /// The most supported complete context; ties keep the first seen.
    pub read_context: ReadContext,
    pub read_context_support: i32,
    /// Raw depth at the position.
    pub max_depth: i32,
    /// Fewest events seen on a supporting read.
    pub min_number_of_events: i32,
    pub raw_alt_support: i32,
}

impl Candidate {
    pub fn is_indel(&self) -> bool {
        self.ref_allele.len() != self.alt_allele.len()
    }

    /// Multi-base substitution.
    pub fn is_mnv(&self) -> bool {
        self.ref_allele.len() == self.alt_allele.len() && self.ref_allele.len() > 1
    }

    /// Last reference position covered by the ref allele.
    pub fn end(&self) -> i64 {
        self.position + self.ref_allele.len() as i64 - 1
    }

    /// Fold in the same variant found in another sample. Its context replaces
    /// ours only on strictly greater support; the depth is the maximum.
    pub fn update(&mut self, other: Candidate) {
        if other.read_context_support > self.read_context_support {
            self.read_context_support = other.read_context_support;
            self.read_context = other.read_context;
            self.min_number_of_events = self.min_number_of_events.min(other.min_number_of_events);
        }
        self.max_depth = self.max_depth.max(other.max_depth);
        self.raw_alt_support = self.raw_alt_support.max(other.raw_alt_support);
    }
}

/// Merge the candidates discovered in several samples, in sample order.
///
/// The result is sorted by position, ref and alt.
pub fn merge_candidates(per_sample: impl IntoIterator<Item = Vec<Candidate>>) -> Vec<Candidate> {
    let mut merged: BTreeMap<(i64, String, String), Candidate> = BTreeMap::new();
    for candidate in per_sample.into_iter().flatten() {
        let key = (
            candidate.position,
            candidate.ref_allele.clone(),
            candidate.alt_allele.clone(),
        );
        match merged.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().update(candidate),
            Entry::Vacant(entry) => {
                entry.insert(candidate);
            }
        }
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::read_context::ReadContextFactory;
    use pretty_assertions::assert_eq;

    fn candidate(position: i64, bases: &[u8], support: i32, max_depth: i32) -> Candidate {
        Candidate {
            chromosome: "1".into(),
            position,
            ref_allele: "G".into(),
            alt_allele: "T".into(),
            tier: EvidenceTier::Other,
            read_context: ReadContextFactory::new(2)
                .substitution(position, 4, 1, bases)
                .expect("context"),
            read_context_support: support,
            max_depth,
            min_number_of_events: support,
            raw_alt_support: support,
        }
    }

    #[test]
    fn merge_keeps_strictly_better_context() {
        let first = candidate(100, b"ACGTTACGT", 3, 20);
        let tied = candidate(100, b"TTGTTACTT", 3, 30);
        let better = candidate(100, b"GGGTTAGGG", 4, 10);
        let other = candidate(90, b"ACGTTACGT", 2, 5);

        let merged = merge_candidates(vec![vec![first.clone()], vec![other.clone(), tied]]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], other);
        assert_eq!(merged[1].read_context, first.read_context);
        assert_eq!(merged[1].max_depth, 30);

        let merged = merge_candidates(vec![vec![first.clone()], vec![better.clone()]]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].read_context, better.read_context);
        assert_eq!(merged[0].read_context_support, 4);
        assert_eq!(merged[0].min_number_of_events, 3);
        assert_eq!(merged[0].max_depth, 20);
        assert_eq!(merged[0].raw_alt_support, 4);
    }
}
