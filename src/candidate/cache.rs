//! Per-position evidence of one region: ref contexts, candidates and depth cap.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::{
    config::Config,
    read_context::ReadContext,
    reads::AlignedRead,
    tier::{EvidenceTier, TierLookup},
};

use super::{decompose::Decomposition, Candidate};

/// Read-only view of the depth cap.
pub trait DepthLimit {
    fn reached_depth_limit(&self, position: i64) -> bool;
}

/// Accumulated evidence for one `(ref, alt)` at one position.
#[derive(Debug, Clone, Default)]
struct AltContext {
    raw_alt_support: i32,
    min_number_of_events: Option<i32>,
    read_context: Option<ReadContext>,
    read_context_support: i32,
    /// Support per distinct complete context, in order of first sight.
    tallies: IndexMap<ReadContext, i32>,
}

impl AltContext {
    fn fold(&mut self, number_of_events: i32, read_context: Option<ReadContext>) {
        self.raw_alt_support += 1;
        self.min_number_of_events = Some(
            self.min_number_of_events
                .map_or(number_of_events, |events| events.min(number_of_events)),
        );

        let Some(read_context) = read_context.filter(|ctx| ctx.is_complete()) else {
            return;
        };
        let support = self.tallies.entry(read_context.clone()).or_insert(0);
        *support += 1;
        if *support > self.read_context_support {
            self.read_context_support = *support;
            self.read_context = Some(read_context);
        }
    }
}

/// Evidence at one position.
#[derive(Debug, Clone)]
pub struct RefContext {
    pub position: i64,
    pub tier: EvidenceTier,
    /// Reads with sufficient mapping quality touching the position.
    pub raw_depth: i32,
    /// All committed reads touching the position; this is what the cap limits.
    read_depth: i32,
    depth_cap: i32,
    alts: IndexMap<(Vec<u8>, Vec<u8>), AltContext>,
}

impl RefContext {
    fn reached_depth_limit(&self) -> bool {
        self.read_depth >= self.depth_cap
    }

    fn add_read(&mut self, sufficient_map_quality: bool) {
        self.read_depth += 1;
        if sufficient_map_quality {
            self.raw_depth += 1;
        }
    }
}

/// Owns all ref contexts of one region.
pub struct RefContextCache<'a> {
    chromosome: String,
    config: &'a Config,
    tiers: &'a dyn TierLookup,
    contexts: BTreeMap<i64, RefContext>,
    /// Reads and events dropped by the depth cap.
    pub dropped_by_depth: usize,
}

impl<'a> RefContextCache<'a> {
    pub fn new(chromosome: &str, config: &'a Config, tiers: &'a dyn TierLookup) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            config,
            tiers,
            contexts: BTreeMap::new(),
            dropped_by_depth: 0,
        }
    }

    fn depth_cap(&self, tier: EvidenceTier) -> i32 {
        match tier {
            EvidenceTier::Hotspot | EvidenceTier::Panel => self.config.max_read_depth_panel,
            EvidenceTier::Other => self.config.max_read_depth,
        }
    }

    fn get_or_create(&mut self, position: i64) -> &mut RefContext {
        let tier = self.tiers.tier(&self.chromosome, position);
        let depth_cap = self.depth_cap(tier);
        self.contexts.entry(position).or_insert_with(|| RefContext {
            position,
            tier,
            raw_depth: 0,
            read_depth: 0,
            depth_cap,
            alts: IndexMap::new(),
        })
    }

    /// Whether the read starts or ends at a position whose cap is reached.
    pub fn reached_read_depth_limit(&self, read: &AlignedRead) -> bool {
        self.reached_depth_limit(read.alignment_start)
            || self.reached_depth_limit(read.alignment_end())
    }

    /// Count a read that was skipped entirely.
    pub fn drop_read(&mut self) {
        self.dropped_by_depth += 1;
    }

    /// Apply the decomposition of one read.
    pub fn commit(&mut self, decomposition: Decomposition) {
        self.dropped_by_depth += decomposition.depth_limited;

        for observation in decomposition.ref_observations {
            self.get_or_create(observation.position)
                .add_read(observation.sufficient_map_quality);
        }

        for alt_read in decomposition.alt_reads {
            let ref_context = self.get_or_create(alt_read.position);
            ref_context.add_read(alt_read.sufficient_map_quality);
            ref_context
                .alts
                .entry((alt_read.ref_allele, alt_read.alt_allele))
                .or_default()
                .fold(alt_read.number_of_events, alt_read.read_context);
        }
    }

    /// The candidates with a representative context and enough raw support,
    /// sorted by position, ref and alt.
    pub fn candidates(self) -> Vec<Candidate> {
        let min_support = self.config.filter.hard_min_tumor_raw_alt_support;
        let mut result = Vec::new();
        for ref_context in self.contexts.into_values() {
            for ((ref_allele, alt_allele), alt) in ref_context.alts {
                if ref_context.tier != EvidenceTier::Hotspot && alt.raw_alt_support < min_support {
                    continue;
                }
                let Some(read_context) = alt.read_context else {
                    continue;
                };
                result.push(Candidate {
                    chromosome: self.chromosome.clone(),
                    position: ref_context.position,
                    ref_allele: String::from_utf8_lossy(&ref_allele).to_string(),
                    alt_allele: String::from_utf8_lossy(&alt_allele).to_string(),
                    tier: ref_context.tier,
                    read_context,
                    read_context_support: alt.read_context_support,
                    max_depth: ref_context.raw_depth,
                    min_number_of_events: alt.min_number_of_events.unwrap_or_default(),
                    raw_alt_support: alt.raw_alt_support,
                });
            }
        }
        result.sort_by(|lhs, rhs| {
            (lhs.position, &lhs.ref_allele, &lhs.alt_allele).cmp(&(
                rhs.position,
                &rhs.ref_allele,
                &rhs.alt_allele,
            ))
        });
        result
    }
}

impl DepthLimit for RefContextCache<'_> {
    fn reached_depth_limit(&self, position: i64) -> bool {
        match self.contexts.get(&position) {
            Some(ref_context) => ref_context.reached_depth_limit(),
            None => self.depth_cap(self.tiers.tier(&self.chromosome, position)) <= 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        candidate::decompose::{AltRead, RefObservation},
        read_context::ReadContextFactory,
        tier::PanelTiers,
    };
    use pretty_assertions::assert_eq;

    const READ_A: &[u8] = b"AAGTCCATGGACTCA";
    const READ_B: &[u8] = b"TTGTCAATGGACTGG";

    fn alt_read(read_bases: &[u8], number_of_events: i32, with_context: bool) -> AltRead {
        AltRead {
            position: 100,
            ref_allele: b"G".to_vec(),
            alt_allele: b"T".to_vec(),
            base_quality: 30,
            number_of_events,
            sufficient_map_quality: true,
            read_index: 7,
            read_context: if with_context {
                ReadContextFactory::new(3).substitution(100, 7, 1, read_bases)
            } else {
                None
            },
        }
    }

    fn commit(cache: &mut RefContextCache, alt_read: AltRead) {
        cache.commit(Decomposition {
            alt_reads: vec![alt_read],
            ..Default::default()
        });
    }

    #[test]
    fn strict_replacement_and_min_events() {
        let config = Config::default();
        let tiers = PanelTiers::default();
        let mut cache = RefContextCache::new("1", &config, &tiers);

        let ctx_a = alt_read(READ_A, 4, true).read_context;
        let ctx_b = alt_read(READ_B, 1, true).read_context;
        assert_ne!(ctx_a, ctx_b);

        let steps = [
            (READ_A, 4, true, &ctx_a, 1, 4),
            (READ_B, 3, true, &ctx_a, 1, 3),
            (READ_B, 5, true, &ctx_b, 2, 3),
            (READ_A, 1, false, &ctx_b, 2, 1),
            (READ_A, 2, true, &ctx_b, 2, 1),
        ];
        for (bases, events, with_context, expected_ctx, expected_support, expected_events) in steps
        {
            commit(&mut cache, alt_read(bases, events, with_context));
            let alt = &cache.contexts[&100].alts[&(b"G".to_vec(), b"T".to_vec())];
            assert_eq!(&alt.read_context, expected_ctx);
            assert_eq!(alt.read_context_support, expected_support);
            assert_eq!(alt.min_number_of_events, Some(expected_events));
        }

        let candidates = cache.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].raw_alt_support, 5);
        assert_eq!(candidates[0].max_depth, 5);
        assert_eq!(candidates[0].read_context_support, 2);
        assert_eq!(Some(candidates[0].read_context.clone()), ctx_b);
    }

    #[test]
    fn incomplete_contexts_are_depth_only() {
        let config = Config::default();
        let tiers = PanelTiers::default();
        let mut cache = RefContextCache::new("1", &config, &tiers);
        for _ in 0..3 {
            commit(&mut cache, alt_read(READ_A, 1, false));
        }
        assert_eq!(cache.candidates(), vec![]);
    }

    #[test]
    fn hard_min_raw_alt_support() {
        let config = Config::default();
        let tiers = PanelTiers::new(
            &[crate::tier::Hotspot {
                chromosome: "1".into(),
                position: 100,
                ref_allele: "G".into(),
                alt_allele: "T".into(),
            }],
            &[],
        );

        let mut cache = RefContextCache::new("1", &config, &tiers);
        commit(&mut cache, alt_read(READ_A, 1, true));
        let candidates = cache.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].tier, EvidenceTier::Hotspot);

        let no_tiers = PanelTiers::default();
        let mut cache = RefContextCache::new("1", &config, &no_tiers);
        commit(&mut cache, alt_read(READ_A, 1, true));
        assert_eq!(cache.candidates(), vec![]);
    }

    #[test]
    fn depth_cap() {
        let config = Config {
            max_read_depth: 3,
            ..Default::default()
        };
        let tiers = PanelTiers::default();
        let mut cache = RefContextCache::new("1", &config, &tiers);

        assert!(!cache.reached_depth_limit(100));
        for _ in 0..3 {
            cache.commit(Decomposition {
                ref_observations: vec![RefObservation {
                    position: 100,
                    sufficient_map_quality: true,
                }],
                ..Default::default()
            });
        }
        assert!(cache.reached_depth_limit(100));
        assert!(!cache.reached_depth_limit(101));
    }

    #[test]
    fn depth_cap_counts_low_mapping_quality() {
        let config = Config {
            max_read_depth: 2,
            ..Default::default()
        };
        let tiers = PanelTiers::default();
        let mut cache = RefContextCache::new("1", &config, &tiers);

        for _ in 0..2 {
            commit(
                &mut cache,
                AltRead {
                    sufficient_map_quality: false,
                    ..alt_read(READ_A, 1, true)
                },
            );
        }
        assert!(cache.reached_depth_limit(100));
        assert_eq!(cache.contexts[&100].raw_depth, 0);
        assert_eq!(cache.contexts[&100].read_depth, 2);
    }
}
