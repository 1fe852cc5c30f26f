//! Classified variant records and their soft filter tags.

pub mod classify;

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::{candidate::Candidate, evidence::counter::ReadContextCounter, tier::EvidenceTier};

/// Soft filter tags; an empty set means PASS.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SoftFilter {
    MinTumorQual,
    MinTumorVaf,
    MinGermlineDepth,
    MaxGermlineVaf,
    MaxGermlineRelRawBaseQual,
    MaxGermlineAltSupport,
}

impl SoftFilter {
    /// Human readable description, e.g., for a VCF header.
    pub fn reason(&self) -> &'static str {
        match self {
            SoftFilter::MinTumorQual => "Insufficient tumor quality",
            SoftFilter::MinTumorVaf => "Insufficient tumor VAF",
            SoftFilter::MinGermlineDepth => "Insufficient germline depth",
            SoftFilter::MaxGermlineVaf => "Excessive germline VAF",
            SoftFilter::MaxGermlineRelRawBaseQual => {
                "Excessive germline relative raw base quality"
            }
            SoftFilter::MaxGermlineAltSupport => "Germline alt support of MNV",
        }
    }
}

/// A candidate with its per-sample evidence and filter decision.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VariantRecord {
    #[serde(flatten)]
    pub candidate: Candidate,
    /// One counter per tumor sample, in sample order.
    pub tumor: Vec<ReadContextCounter>,
    pub normal: Option<ReadContextCounter>,
    pub filters: BTreeSet<SoftFilter>,
    /// Tags of each tumor sample before rescue.
    pub sample_filters: IndexMap<String, BTreeSet<SoftFilter>>,
    pub local_phase_set: i32,
    pub local_realign_set: i32,
    pub mixed_germline_impact: i32,
}

impl VariantRecord {
    pub fn is_pass(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn tier(&self) -> EvidenceTier {
        self.candidate.tier
    }

    /// Filter column value: `PASS` or the tags joined by `;`.
    pub fn filter_label(&self) -> String {
        if self.is_pass() {
            "PASS".to_string()
        } else {
            itertools::join(self.filters.iter(), ";")
        }
    }
}
