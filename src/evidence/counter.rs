//! Per-candidate, per-sample read context evidence.

use crate::{
    candidate::Candidate,
    common::Chrom,
    config::{Config, QualityConfig},
    read_context::{realign::Realignment, repeat::MAX_REPEAT_LENGTH, ReadContextMatch},
    reads::{AlignedRead, CigarOp},
};

use super::raw::RawContext;

/// Counts of one sample's reads at one candidate.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ReadContextCounter {
    pub sample: String,
    pub full: i32,
    pub partial: i32,
    pub core: i32,
    /// Reads carrying the context close to, but not at, the variant.
    pub realigned: i32,
    pub reference: i32,
    /// Reads covering the whole core.
    pub coverage: i32,

    pub full_quality: i32,
    pub partial_quality: i32,
    pub core_quality: i32,
    pub realigned_quality: i32,
    pub reference_quality: i32,
    pub total_quality: i32,

    /// Reads whose context repeat has one unit more.
    pub lengthened: i32,
    /// Reads whose context repeat has one unit less.
    pub shortened: i32,
    /// Accumulated penalty of lengthened and shortened reads.
    pub jitter_penalty: f64,

    /// Supporting reads without the proper pair flag.
    pub improper_pair: i32,

    pub raw_depth: i32,
    pub raw_alt_support: i32,
    pub raw_ref_support: i32,
    pub raw_alt_base_quality: i32,
    pub raw_ref_base_quality: i32,
}

impl ReadContextCounter {
    pub fn new(sample: &str) -> Self {
        Self {
            sample: sample.to_string(),
            ..Default::default()
        }
    }

    /// Reads matching the read context in full, partially, in the core or
    /// after realignment.
    pub fn alt_support(&self) -> i32 {
        self.full + self.partial + self.core + self.realigned
    }

    pub fn ref_support(&self) -> i32 {
        self.reference
    }

    pub fn vaf(&self) -> f64 {
        if self.coverage == 0 {
            0.0
        } else {
            self.alt_support() as f64 / self.coverage as f64
        }
    }

    /// Quality of full and partial matches less the jitter penalty.
    pub fn tumor_quality(&self) -> i32 {
        (self.full_quality + self.partial_quality - self.jitter_penalty as i32).max(0)
    }

    pub fn raw_vaf(&self) -> f64 {
        if self.raw_depth == 0 {
            0.0
        } else {
            self.raw_alt_support as f64 / self.raw_depth as f64
        }
    }

    /// Account for one read overlapping the candidate.
    pub fn accept(&mut self, candidate: &Candidate, read: &AlignedRead, config: &Config) {
        let max_coverage = if Chrom::from(candidate.chromosome.as_str()) == Chrom::MT {
            1000 * config.max_read_depth_evidence
        } else {
            config.max_read_depth_evidence
        };
        if self.coverage >= max_coverage {
            return;
        }

        let raw = RawContext::new(read, candidate, config.max_skipped_reference_regions);
        if raw.in_skipped {
            return;
        }

        self.raw_depth += raw.depth_support as i32;
        self.raw_alt_support += raw.alt_support as i32;
        self.raw_ref_support += raw.ref_support as i32;
        self.raw_alt_base_quality += raw.alt_quality;
        self.raw_ref_base_quality += raw.ref_quality;

        let Some(read_index) = raw.read_index else {
            return;
        };
        let read_context = &candidate.read_context;
        if !read_context.is_core_covered(read_index, read.len()) {
            return;
        }

        let quality = quality_score(candidate, read, read_index, &config.quality);
        self.coverage += 1;
        self.total_quality += quality;

        if !raw.in_delete {
            let counted = match read_context.match_at(read_index, &read.bases) {
                ReadContextMatch::Full => {
                    self.full += 1;
                    self.full_quality += quality;
                    true
                }
                ReadContextMatch::Partial => {
                    self.partial += 1;
                    self.partial_quality += quality;
                    true
                }
                ReadContextMatch::Core => {
                    self.core += 1;
                    self.core_quality += quality;
                    true
                }
                ReadContextMatch::None => false,
            };
            if counted {
                if !read.is_proper_pair() {
                    self.improper_pair += 1;
                }
                return;
            }
        }

        let max_distance = indel_length(read).max(MAX_REPEAT_LENGTH);
        match read_context.realigned_around_index(read_index, &read.bases, max_distance) {
            Realignment::Exact => {
                self.realigned += 1;
                self.realigned_quality += quality;
                return;
            }
            Realignment::Lengthened(repeat_count) => {
                self.lengthened += 1;
                self.jitter_penalty += config.quality.repeat_jitter_penalty(repeat_count);
            }
            Realignment::Shortened(repeat_count) => {
                self.shortened += 1;
                self.jitter_penalty += config.quality.repeat_jitter_penalty(repeat_count);
            }
            Realignment::None => (),
        }

        let ref_base = candidate.ref_allele.as_bytes().first();
        if ref_base == read.bases.get(read_index) && !raw.in_delete && !raw.indel_at_position {
            self.reference += 1;
            self.reference_quality += quality;
        }
    }
}

/// Inserted plus deleted bases of a read.
fn indel_length(read: &AlignedRead) -> usize {
    read.cigar
        .iter()
        .filter(|op| matches!(op, CigarOp::Ins(_) | CigarOp::Del(_)))
        .map(|op| op.len())
        .sum()
}

/// Quality of a read at the candidate: the lower of the penalised mapping and
/// base qualities, at least zero.
fn quality_score(
    candidate: &Candidate,
    read: &AlignedRead,
    read_index: usize,
    quality: &QualityConfig,
) -> i32 {
    let read_context = &candidate.read_context;
    let base_quality = if candidate.is_indel() {
        read_context.min_core_quality(read_index, &read.qualities)
    } else {
        read.min_quality(read_index, candidate.ref_allele.len())
    };
    let distance_from_edge = read_context.distance_from_read_edge(read_index, read.len());

    let map_quality = quality.modified_map_quality(
        read.mapping_quality as i32,
        candidate.min_number_of_events,
        read.is_proper_pair(),
    );
    let base_quality = quality.modified_base_quality(base_quality as i32, distance_from_edge);
    map_quality.min(base_quality).max(0)
}
