//! Evidence collection: discovery of candidates and counting of read contexts.

pub mod counter;
pub mod raw;

use std::sync::atomic::{AtomicBool, Ordering};

use thousands::Separable;

use crate::{
    candidate::{
        cache::RefContextCache, decompose::ReadDecomposer, extend::extend_cores, Candidate,
    },
    common::ChrRegion,
    config::Config,
    err::RegionError,
    reads::{AlignedRead, ReadIter, ReadSource, RefSequence},
    tier::TierLookup,
};

use self::counter::ReadContextCounter;

/// Whether a read takes part in evidence collection at all.
pub fn is_selected(read: &AlignedRead) -> bool {
    !(read.is_unmapped() || read.is_secondary() || read.is_supplementary() || read.is_duplicate())
}

/// Open the reads of `sample` in `region`.
fn open_reads<'a>(
    reads: &'a dyn ReadSource,
    sample: &str,
    region: &ChrRegion,
) -> Result<ReadIter<'a>, RegionError> {
    reads
        .reads_in_region(sample, &region.chromosome, region.start, region.end)
        .map_err(|source| RegionError::ReadSource {
            sample: sample.to_string(),
            region: region.clone(),
            source,
        })
}

/// Pull the next read, honouring the cancellation flag.
fn next_read(
    iter: &mut ReadIter,
    sample: &str,
    region: &ChrRegion,
    cancel: &AtomicBool,
) -> Option<Result<AlignedRead, RegionError>> {
    if cancel.load(Ordering::Relaxed) {
        return Some(Err(RegionError::Cancelled(region.clone())));
    }
    iter.next().map(|result| {
        result.map_err(|source| RegionError::ReadSource {
            sample: sample.to_string(),
            region: region.clone(),
            source,
        })
    })
}

/// Discovery pass over the reads of one sample in one region.
pub struct CandidateCollector<'a> {
    config: &'a Config,
    tiers: &'a dyn TierLookup,
    region: &'a ChrRegion,
    ref_seq: &'a RefSequence,
}

impl<'a> CandidateCollector<'a> {
    pub fn new(
        config: &'a Config,
        tiers: &'a dyn TierLookup,
        region: &'a ChrRegion,
        ref_seq: &'a RefSequence,
    ) -> Self {
        Self {
            config,
            tiers,
            region,
            ref_seq,
        }
    }

    /// Decompose all selected reads into a fresh cache and return its candidates.
    pub fn collect(
        &self,
        reads: &dyn ReadSource,
        sample: &str,
        cancel: &AtomicBool,
    ) -> Result<Vec<Candidate>, RegionError> {
        let decomposer = ReadDecomposer::new(self.config, self.region, self.ref_seq);
        let mut cache = RefContextCache::new(&self.region.chromosome, self.config, self.tiers);

        let mut iter = open_reads(reads, sample, self.region)?;
        let mut total = 0usize;
        let mut malformed = 0usize;
        while let Some(read) = next_read(&mut iter, sample, self.region, cancel) {
            let read = read?;
            total += 1;
            if !is_selected(&read)
                || !self
                    .region
                    .overlaps(read.alignment_start, read.alignment_end())
            {
                continue;
            }
            if cache.reached_read_depth_limit(&read) {
                cache.drop_read();
                continue;
            }

            let mut decomposition = decomposer.decompose(&read, &cache);
            if decomposition.malformed {
                malformed += 1;
            }
            decomposition.alt_reads = extend_cores(
                decomposition.alt_reads,
                &read.bases,
                self.config.read_context_flank_size,
            );
            cache.commit(decomposition);
        }

        let dropped = cache.dropped_by_depth;
        let candidates = cache.candidates();
        tracing::debug!(
            "discovery in {} for {}: {} reads, {} candidates, {} dropped by depth cap, {} malformed",
            self.region,
            sample,
            total.separate_with_commas(),
            candidates.len().separate_with_commas(),
            dropped.separate_with_commas(),
            malformed.separate_with_commas(),
        );
        Ok(candidates)
    }
}

/// Counting pass: read context evidence of one sample for known candidates.
pub struct EvidenceCounter<'a> {
    config: &'a Config,
    region: &'a ChrRegion,
}

impl<'a> EvidenceCounter<'a> {
    pub fn new(config: &'a Config, region: &'a ChrRegion) -> Self {
        Self { config, region }
    }

    /// One counter per candidate, in the order of `candidates`, which must be
    /// sorted by position.
    pub fn count(
        &self,
        reads: &dyn ReadSource,
        sample: &str,
        candidates: &[Candidate],
        cancel: &AtomicBool,
    ) -> Result<Vec<ReadContextCounter>, RegionError> {
        let mut counters = candidates
            .iter()
            .map(|_| ReadContextCounter::new(sample))
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            return Ok(counters);
        }

        let mut iter = open_reads(reads, sample, self.region)?;
        while let Some(read) = next_read(&mut iter, sample, self.region, cancel) {
            let read = read?;
            if !is_selected(&read) || read.mapping_quality < self.config.min_map_quality {
                continue;
            }

            let (start, end) = (read.unclipped_start(), read.unclipped_end());
            let first = candidates.partition_point(|candidate| candidate.position < start);
            for (candidate, counter) in candidates[first..]
                .iter()
                .zip(counters[first..].iter_mut())
                .take_while(|(candidate, _)| candidate.position <= end)
            {
                counter.accept(candidate, &read, self.config);
            }
        }

        Ok(counters)
    }
}
