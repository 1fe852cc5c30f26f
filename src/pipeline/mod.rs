//! Per-region calling and the parallel fan-out over regions.

pub mod cli;

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use thousands::Separable;

use crate::{
    common::{build_chrom_map, chrom_sort_key, ChrRegion},
    config::Config,
    err::RegionError,
    candidate::merge_candidates,
    evidence::{counter::ReadContextCounter, CandidateCollector, EvidenceCounter},
    reads::{ReadSource, RefSequence, SequenceWindow},
    tier::TierLookup,
    variant::{classify::VariantClassifier, VariantRecord},
};

/// Names of the samples to call; discovery runs on every tumor sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Samples {
    pub tumor: Vec<String>,
    pub normal: Option<String>,
}

/// Discovery, counting and classification of one region at a time.
pub struct RegionPipeline<'a> {
    config: &'a Config,
    reference: &'a dyn SequenceWindow,
    reads: &'a dyn ReadSource,
    tiers: &'a dyn TierLookup,
    samples: &'a Samples,
}

impl<'a> RegionPipeline<'a> {
    pub fn new(
        config: &'a Config,
        reference: &'a dyn SequenceWindow,
        reads: &'a dyn ReadSource,
        tiers: &'a dyn TierLookup,
        samples: &'a Samples,
    ) -> Self {
        Self {
            config,
            reference,
            reads,
            tiers,
            samples,
        }
    }

    /// Load the reference of `region` plus padding, clamped to the contig.
    fn load_reference(&self, region: &ChrRegion) -> Result<RefSequence, RegionError> {
        let to_region_error = |source| RegionError::Reference {
            region: region.clone(),
            source,
        };
        let contig_length = self
            .reference
            .contig_length(&region.chromosome)
            .map_err(to_region_error)?;
        let start = (region.start - self.config.ref_padding).max(1);
        let end = (region.end + self.config.ref_padding).min(contig_length);
        RefSequence::load(self.reference, &region.chromosome, start, end).map_err(to_region_error)
    }

    /// Call one region; records come out sorted by position.
    pub fn run(
        &self,
        region: &ChrRegion,
        cancel: &AtomicBool,
    ) -> Result<Vec<VariantRecord>, RegionError> {
        if self.samples.tumor.is_empty() {
            return Ok(Vec::new());
        }
        let ref_seq = self.load_reference(region)?;

        let collector = CandidateCollector::new(self.config, self.tiers, region, &ref_seq);
        let candidates = merge_candidates(
            self.samples
                .tumor
                .iter()
                .map(|sample| collector.collect(self.reads, sample, cancel))
                .collect::<Result<Vec<_>, _>>()?,
        );
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let counter = EvidenceCounter::new(self.config, region);
        let mut tumor_counters = self
            .samples
            .tumor
            .iter()
            .map(|sample| {
                counter
                    .count(self.reads, sample, &candidates, cancel)
                    .map(Vec::into_iter)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut normal_counters = self
            .samples
            .normal
            .as_ref()
            .map(|sample| counter.count(self.reads, sample, &candidates, cancel))
            .transpose()?
            .map(Vec::into_iter);

        let classifier = VariantClassifier::new(&self.config.filter);
        let num_candidates = candidates.len();
        let mut records = Vec::new();
        for candidate in candidates {
            let tumor = tumor_counters
                .iter_mut()
                .filter_map(Iterator::next)
                .collect::<Vec<ReadContextCounter>>();
            let normal = normal_counters.as_mut().and_then(Iterator::next);
            let record = classifier.classify(candidate, tumor, normal);
            if classifier.passes_hard_filter(&record) {
                records.push(record);
            }
        }

        tracing::debug!(
            "region {}: {} candidates, {} records ({} passing)",
            region,
            num_candidates.separate_with_commas(),
            records.len().separate_with_commas(),
            records
                .iter()
                .filter(|record| record.is_pass())
                .count()
                .separate_with_commas(),
        );
        Ok(records)
    }
}

/// Split `region` into chunks of at most `max_len` positions.
pub fn split_region(region: &ChrRegion, max_len: i64) -> Vec<ChrRegion> {
    region.split(max_len)
}

/// Call all `regions` in parallel on the current rayon pool.
///
/// The first failing region stops the others at their next read; its error
/// is returned and all partial results are discarded. Records of successful
/// runs are sorted by chromosome, position, ref and alt.
pub fn call_regions(
    pipeline: &RegionPipeline,
    regions: &[ChrRegion],
) -> Result<Vec<VariantRecord>, RegionError> {
    let cancel = AtomicBool::new(false);
    let results = regions
        .par_iter()
        .map(|region| {
            if cancel.load(Ordering::Relaxed) {
                return Err(RegionError::Cancelled(region.clone()));
            }
            pipeline.run(region, &cancel).map_err(|e| {
                cancel.store(true, Ordering::Relaxed);
                e
            })
        })
        .collect::<Vec<_>>();

    let mut records = Vec::new();
    let mut cancelled = None;
    for result in results {
        match result {
            Ok(region_records) => records.extend(region_records),
            Err(e) if e.is_cancelled() => {
                cancelled.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    if let Some(e) = cancelled {
        return Err(e);
    }

    let chrom_map = build_chrom_map();
    records.sort_by(|lhs, rhs| {
        (
            chrom_sort_key(&chrom_map, &lhs.candidate.chromosome),
            lhs.candidate.position,
            &lhs.candidate.ref_allele,
            &lhs.candidate.alt_allele,
        )
            .cmp(&(
                chrom_sort_key(&chrom_map, &rhs.candidate.chromosome),
                rhs.candidate.position,
                &rhs.candidate.ref_allele,
                &rhs.candidate.alt_allele,
            ))
    });
    Ok(records)
}
