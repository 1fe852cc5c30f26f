//! Evidence tiers and their lookup from hotspot and panel lists.

use std::collections::{BTreeMap, BTreeSet};

use crate::common::ChrRegion;

/// Prior evidence category of a candidate; selects the soft filter thresholds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    enum_map::Enum,
    strum::Display,
    strum::EnumString,
    serde::Deserialize,
    serde::Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceTier {
    /// Known pathogenic site.
    Hotspot,
    /// Inside the gene panel.
    Panel,
    /// Background.
    Other,
}

/// Assignment of tiers to genomic positions.
pub trait TierLookup: Sync {
    fn tier(&self, chromosome: &str, position: i64) -> EvidenceTier;
}

/// A known hotspot variant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Hotspot {
    pub chromosome: String,
    pub position: i64,
    #[serde(rename = "ref")]
    pub ref_allele: String,
    #[serde(rename = "alt")]
    pub alt_allele: String,
}

/// Tier lookup over in-memory hotspot positions and panel regions.
#[derive(Debug, Clone, Default)]
pub struct PanelTiers {
    /// Hotspot positions per chromosome.
    hotspots: BTreeMap<String, BTreeSet<i64>>,
    /// Merged, sorted panel intervals per chromosome.
    panel: BTreeMap<String, Vec<(i64, i64)>>,
}

impl PanelTiers {
    pub fn new(hotspots: &[Hotspot], panel: &[ChrRegion]) -> Self {
        let mut hotspot_map: BTreeMap<String, BTreeSet<i64>> = BTreeMap::new();
        for hotspot in hotspots {
            hotspot_map
                .entry(hotspot.chromosome.clone())
                .or_default()
                .insert(hotspot.position);
        }

        let mut panel_map: BTreeMap<String, Vec<(i64, i64)>> = BTreeMap::new();
        for region in panel {
            panel_map
                .entry(region.chromosome.clone())
                .or_default()
                .push((region.start, region.end));
        }
        for intervals in panel_map.values_mut() {
            intervals.sort();
            let mut merged: Vec<(i64, i64)> = Vec::with_capacity(intervals.len());
            for &(start, end) in intervals.iter() {
                match merged.last_mut() {
                    Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
                    _ => merged.push((start, end)),
                }
            }
            *intervals = merged;
        }

        Self {
            hotspots: hotspot_map,
            panel: panel_map,
        }
    }

    /// Whether `position` is a hotspot position.
    pub fn is_hotspot(&self, chromosome: &str, position: i64) -> bool {
        self.hotspots
            .get(chromosome)
            .map(|positions| positions.contains(&position))
            .unwrap_or(false)
    }

    /// Whether `position` lies within a panel region.
    pub fn in_panel(&self, chromosome: &str, position: i64) -> bool {
        let Some(intervals) = self.panel.get(chromosome) else {
            return false;
        };
        let idx = intervals.partition_point(|&(start, _)| start <= position);
        idx > 0 && intervals[idx - 1].1 >= position
    }

    /// Whether any panel region overlaps `region`.
    pub fn panel_overlaps(&self, region: &ChrRegion) -> bool {
        self.panel
            .get(&region.chromosome)
            .map(|intervals| {
                intervals
                    .iter()
                    .any(|&(start, end)| region.overlaps(start, end))
            })
            .unwrap_or(false)
    }
}

impl TierLookup for PanelTiers {
    fn tier(&self, chromosome: &str, position: i64) -> EvidenceTier {
        if self.is_hotspot(chromosome, position) {
            EvidenceTier::Hotspot
        } else if self.in_panel(chromosome, position) {
            EvidenceTier::Panel
        } else {
            EvidenceTier::Other
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tiers() -> PanelTiers {
        PanelTiers::new(
            &[Hotspot {
                chromosome: "7".into(),
                position: 140_453_136,
                ref_allele: "A".into(),
                alt_allele: "T".into(),
            }],
            &[
                ChrRegion::new("7", 140_453_000, 140_453_100),
                ChrRegion::new("7", 140_453_050, 140_453_200),
                ChrRegion::new("17", 7_577_000, 7_577_100),
            ],
        )
    }

    #[rstest::rstest]
    #[case("7", 140_453_136, EvidenceTier::Hotspot)]
    #[case("7", 140_453_000, EvidenceTier::Panel)]
    #[case("7", 140_453_150, EvidenceTier::Panel)]
    #[case("7", 140_453_201, EvidenceTier::Other)]
    #[case("17", 7_577_100, EvidenceTier::Panel)]
    #[case("17", 140_453_136, EvidenceTier::Other)]
    #[case("1", 1, EvidenceTier::Other)]
    fn tier_lookup(#[case] chrom: &str, #[case] pos: i64, #[case] expected: EvidenceTier) {
        assert_eq!(tiers().tier(chrom, pos), expected);
    }

    #[test]
    fn panel_overlaps() {
        let tiers = tiers();
        assert!(tiers.panel_overlaps(&ChrRegion::new("7", 140_453_190, 140_453_300)));
        assert!(!tiers.panel_overlaps(&ChrRegion::new("7", 1, 100)));
        assert!(!tiers.panel_overlaps(&ChrRegion::new("X", 1, 100)));
    }

    #[test]
    fn tier_names() -> Result<(), anyhow::Error> {
        assert_eq!(EvidenceTier::Hotspot.to_string(), "HOTSPOT");
        assert_eq!("PANEL".parse::<EvidenceTier>()?, EvidenceTier::Panel);
        assert_eq!(serde_json::to_string(&EvidenceTier::Other)?, r#""OTHER""#);
        Ok(())
    }
}
