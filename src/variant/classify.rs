//! Tiered soft filtering with multi-tumor rescue.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::{
    candidate::Candidate,
    common::Chrom,
    config::{FilterConfig, SoftFilterConfig},
    evidence::counter::ReadContextCounter,
    tier::EvidenceTier,
};

use super::{SoftFilter, VariantRecord};

/// Applies the soft and hard filters of a `FilterConfig`.
#[derive(Debug, Clone, Copy)]
pub struct VariantClassifier<'a> {
    config: &'a FilterConfig,
}

impl<'a> VariantClassifier<'a> {
    pub fn new(config: &'a FilterConfig) -> Self {
        Self { config }
    }

    /// Merge the counters of a candidate into a record carrying its filter tags.
    ///
    /// Every tumor sample is checked on its own (together with the normal); a
    /// single clean tumor sample rescues the record.
    pub fn classify(
        &self,
        candidate: Candidate,
        tumor: Vec<ReadContextCounter>,
        normal: Option<ReadContextCounter>,
    ) -> VariantRecord {
        let mut sample_filters = IndexMap::new();
        let mut filters = BTreeSet::new();

        if self.config.soft_filter {
            let soft_config = self.config.soft_config(candidate.tier);
            for counter in &tumor {
                let mut tags = BTreeSet::new();
                self.tumor_checks(&candidate, counter, soft_config, &mut tags);
                if let Some(normal) = normal.as_ref() {
                    self.germline_checks(&candidate, counter, normal, soft_config, &mut tags);
                }
                sample_filters.insert(counter.sample.clone(), tags);
            }

            let rescued = sample_filters.values().any(|tags| tags.is_empty());
            if !rescued {
                filters = sample_filters.values().flatten().copied().collect();
            }
        }

        VariantRecord {
            candidate,
            tumor,
            normal,
            filters,
            sample_filters,
            local_phase_set: 0,
            local_realign_set: 0,
            mixed_germline_impact: 0,
        }
    }

    fn skip_tumor_checks(&self, candidate: &Candidate, tumor: &ReadContextCounter) -> bool {
        candidate.tier == EvidenceTier::Hotspot
            && tumor.alt_support() >= self.config.hotspot_min_tumor_alt_support_to_skip_qual_check
            && tumor.vaf() >= self.config.hotspot_min_tumor_vaf_to_skip_qual_check
    }

    fn tumor_checks(
        &self,
        candidate: &Candidate,
        tumor: &ReadContextCounter,
        soft_config: &SoftFilterConfig,
        tags: &mut BTreeSet<SoftFilter>,
    ) {
        if self.skip_tumor_checks(candidate, tumor) {
            return;
        }
        if tumor.tumor_quality() < soft_config.min_tumor_qual {
            tags.insert(SoftFilter::MinTumorQual);
        }
        if tumor.vaf() < soft_config.min_tumor_vaf {
            tags.insert(SoftFilter::MinTumorVaf);
        }
    }

    fn germline_checks(
        &self,
        candidate: &Candidate,
        tumor: &ReadContextCounter,
        normal: &ReadContextCounter,
        soft_config: &SoftFilterConfig,
        tags: &mut BTreeSet<SoftFilter>,
    ) {
        let min_germline_depth = if Chrom::from(candidate.chromosome.as_str()).is_allosome() {
            soft_config.min_germline_depth_allosome
        } else {
            soft_config.min_germline_depth
        };
        if normal.coverage < min_germline_depth {
            tags.insert(SoftFilter::MinGermlineDepth);
        }

        if normal.vaf() > soft_config.max_germline_vaf {
            tags.insert(SoftFilter::MaxGermlineVaf);
        }

        if tumor.raw_alt_base_quality > 0 {
            let rel_raw_base_qual =
                normal.raw_alt_base_quality as f64 / tumor.raw_alt_base_quality as f64;
            if rel_raw_base_qual > soft_config.max_germline_rel_raw_base_qual {
                tags.insert(SoftFilter::MaxGermlineRelRawBaseQual);
            }
        }

        if candidate.tier != EvidenceTier::Hotspot
            && candidate.is_mnv()
            && self.config.mnv_filter
            && normal.raw_alt_support > 0
        {
            tags.insert(SoftFilter::MaxGermlineAltSupport);
        }
    }

    /// Whether a record survives the hard quality filter: HOTSPOT records always
    /// do, all others need one tumor sample of sufficient quality.
    pub fn passes_hard_filter(&self, record: &VariantRecord) -> bool {
        record.tier() == EvidenceTier::Hotspot
            || record
                .tumor
                .iter()
                .any(|tumor| tumor.tumor_quality() >= self.config.hard_min_tumor_qual)
    }
}
