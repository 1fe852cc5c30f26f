//! Run configuration, loaded from JSON.

use enum_map::{enum_map, EnumMap};

use crate::tier::EvidenceTier;

/// Thresholds of the soft filters for one evidence tier.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SoftFilterConfig {
    /// Minimal tumor quality (full plus partial match quality).
    pub min_tumor_qual: i32,
    /// Minimal tumor VAF.
    pub min_tumor_vaf: f64,
    /// Minimal normal coverage on autosomes.
    pub min_germline_depth: i32,
    /// Minimal normal coverage on X and Y.
    pub min_germline_depth_allosome: i32,
    /// Maximal normal VAF.
    pub max_germline_vaf: f64,
    /// Maximal ratio of normal to tumor raw alt base quality.
    pub max_germline_rel_raw_base_qual: f64,
}

impl SoftFilterConfig {
    fn hotspot() -> Self {
        Self {
            min_tumor_qual: 70,
            min_tumor_vaf: 0.005,
            min_germline_depth: 0,
            min_germline_depth_allosome: 0,
            max_germline_vaf: 0.1,
            max_germline_rel_raw_base_qual: 0.5,
        }
    }

    fn panel() -> Self {
        Self {
            min_tumor_qual: 100,
            min_tumor_vaf: 0.015,
            min_germline_depth: 0,
            min_germline_depth_allosome: 0,
            max_germline_vaf: 0.04,
            max_germline_rel_raw_base_qual: 0.04,
        }
    }

    fn other() -> Self {
        Self {
            min_tumor_qual: 240,
            min_tumor_vaf: 0.025,
            min_germline_depth: 10,
            min_germline_depth_allosome: 6,
            max_germline_vaf: 0.04,
            max_germline_rel_raw_base_qual: 0.04,
        }
    }
}

/// Soft and hard filter settings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Whether soft filters are evaluated at all.
    pub soft_filter: bool,
    /// Whether MNVs with germline alt support are flagged.
    pub mnv_filter: bool,
    /// Records below this tumor quality in every tumor sample are dropped.
    pub hard_min_tumor_qual: i32,
    /// Candidates need this many supporting reads in discovery.
    pub hard_min_tumor_raw_alt_support: i32,
    /// Hotspot tumor checks are skipped at this alt support...
    pub hotspot_min_tumor_alt_support_to_skip_qual_check: i32,
    /// ...and this VAF.
    pub hotspot_min_tumor_vaf_to_skip_qual_check: f64,
    /// Per-tier soft filter thresholds.
    pub tiers: EnumMap<EvidenceTier, SoftFilterConfig>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            soft_filter: true,
            mnv_filter: true,
            hard_min_tumor_qual: 30,
            hard_min_tumor_raw_alt_support: 2,
            hotspot_min_tumor_alt_support_to_skip_qual_check: 8,
            hotspot_min_tumor_vaf_to_skip_qual_check: 0.08,
            tiers: enum_map! {
                EvidenceTier::Hotspot => SoftFilterConfig::hotspot(),
                EvidenceTier::Panel => SoftFilterConfig::panel(),
                EvidenceTier::Other => SoftFilterConfig::other(),
            },
        }
    }
}

impl FilterConfig {
    /// Soft filter thresholds of the given tier.
    pub fn soft_config(&self, tier: EvidenceTier) -> &SoftFilterConfig {
        &self.tiers[tier]
    }
}

/// Penalties of the read quality score used in evidence counting.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct QualityConfig {
    pub map_qual_fixed_penalty: i32,
    pub map_qual_improper_pair_penalty: i32,
    /// Applied per read event beyond the first.
    pub map_qual_read_events_penalty: i32,
    pub base_qual_fixed_penalty: i32,
    /// Cores closer than this to a read end are penalised.
    pub read_edge_distance: i32,
    pub read_edge_fixed_penalty: i32,
    /// Tumor quality penalty per repeat unit beyond `jitter_min_repeat_count` of
    /// a read whose context is lengthened or shortened.
    pub jitter_penalty: f64,
    pub jitter_min_repeat_count: i32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            map_qual_fixed_penalty: 15,
            map_qual_improper_pair_penalty: 15,
            map_qual_read_events_penalty: 8,
            base_qual_fixed_penalty: 12,
            read_edge_distance: 0,
            read_edge_fixed_penalty: 0,
            jitter_penalty: 0.25,
            jitter_min_repeat_count: 3,
        }
    }
}

impl QualityConfig {
    /// Mapping quality after the fixed, pairing and complexity penalties.
    pub fn modified_map_quality(
        &self,
        map_quality: i32,
        number_of_events: i32,
        proper_pair: bool,
    ) -> i32 {
        let improper_pair_penalty = if proper_pair {
            0
        } else {
            self.map_qual_improper_pair_penalty
        };
        let events_penalty = (number_of_events - 1).max(0) * self.map_qual_read_events_penalty;
        map_quality - self.map_qual_fixed_penalty - improper_pair_penalty - events_penalty
    }

    /// Penalty of one read whose context repeat has `repeat_count` units.
    pub fn repeat_jitter_penalty(&self, repeat_count: usize) -> f64 {
        self.jitter_penalty * (repeat_count as i32 - self.jitter_min_repeat_count).max(0) as f64
    }

    /// Base quality after the fixed and read edge penalties.
    pub fn modified_base_quality(&self, base_quality: i32, distance_from_read_edge: i32) -> i32 {
        let quality = base_quality - self.base_qual_fixed_penalty;
        if distance_from_read_edge < self.read_edge_distance {
            quality - self.read_edge_fixed_penalty
        } else {
            quality
        }
    }
}

/// Configuration of a calling run.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    /// Number of flank bases on each side of a read context core.
    pub read_context_flank_size: usize,
    /// Reads below this mapping quality do not add depth and are not counted.
    pub min_map_quality: u8,
    /// Depth cap per position outside of panel and hotspot positions.
    pub max_read_depth: i32,
    /// Depth cap per position at panel and hotspot positions.
    pub max_read_depth_panel: i32,
    /// Coverage cap per candidate and sample in the counting pass.
    pub max_read_depth_evidence: i32,
    /// `N` operations longer than this hide the variant from a read.
    pub max_skipped_reference_regions: usize,
    /// Whether multi-base substitutions are emitted.
    pub mnv_enabled: bool,
    /// Reference bases loaded on each side of a region.
    pub ref_padding: i64,
    /// Restrict calling to regions overlapping the panel.
    pub panel_only: bool,
    pub quality: QualityConfig,
    pub filter: FilterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_context_flank_size: 10,
            min_map_quality: 10,
            max_read_depth: 1000,
            max_read_depth_panel: 100_000,
            max_read_depth_evidence: 100_000,
            max_skipped_reference_regions: 50,
            mnv_enabled: true,
            ref_padding: 1000,
            panel_only: false,
            quality: QualityConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl Config {
    /// Load from a JSON string or `@path`; an empty string yields the defaults.
    pub fn load(param: &str) -> Result<Self, anyhow::Error> {
        if param.trim().is_empty() {
            Ok(Self::default())
        } else {
            crate::common::load_json_arg(param)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn load_partial_json() -> Result<(), anyhow::Error> {
        let config = Config::load(
            r#"{
                "max_read_depth": 5,
                "filter": {
                    "soft_filter": false,
                    "tiers": {
                        "HOTSPOT": {
                            "min_tumor_qual": 1, "min_tumor_vaf": 0.1, "min_germline_depth": 2,
                            "min_germline_depth_allosome": 3, "max_germline_vaf": 0.4,
                            "max_germline_rel_raw_base_qual": 0.5
                        },
                        "PANEL": {
                            "min_tumor_qual": 100, "min_tumor_vaf": 0.015, "min_germline_depth": 0,
                            "min_germline_depth_allosome": 0, "max_germline_vaf": 0.04,
                            "max_germline_rel_raw_base_qual": 0.04
                        },
                        "OTHER": {
                            "min_tumor_qual": 240, "min_tumor_vaf": 0.025, "min_germline_depth": 10,
                            "min_germline_depth_allosome": 6, "max_germline_vaf": 0.04,
                            "max_germline_rel_raw_base_qual": 0.04
                        }
                    }
                }
            }"#,
        )?;

        assert_eq!(config.max_read_depth, 5);
        assert_eq!(config.read_context_flank_size, 10);
        assert!(!config.filter.soft_filter);
        assert_eq!(config.filter.hard_min_tumor_qual, 30);
        assert_eq!(
            config.filter.soft_config(EvidenceTier::Hotspot).min_germline_depth_allosome,
            3
        );
        assert_eq!(
            config.filter.soft_config(EvidenceTier::Other),
            &SoftFilterConfig::other()
        );
        Ok(())
    }

    #[test]
    fn load_empty_is_default() -> Result<(), anyhow::Error> {
        assert_eq!(Config::load("")?, Config::default());
        Ok(())
    }

    #[rstest::rstest]
    #[case(60, 1, true, 45)]
    #[case(60, 3, true, 29)]
    #[case(60, 1, false, 30)]
    #[case(20, 4, false, -34)]
    fn modified_map_quality(
        #[case] mapq: i32,
        #[case] events: i32,
        #[case] proper_pair: bool,
        #[case] expected: i32,
    ) {
        let quality = QualityConfig::default();
        assert_eq!(quality.modified_map_quality(mapq, events, proper_pair), expected);
    }

    #[test]
    fn modified_base_quality() {
        let quality = QualityConfig {
            read_edge_distance: 5,
            read_edge_fixed_penalty: 10,
            ..Default::default()
        };
        assert_eq!(quality.modified_base_quality(37, 10), 25);
        assert_eq!(quality.modified_base_quality(37, 4), 15);
    }

    #[rstest::rstest]
    #[case(2, 0.0)]
    #[case(3, 0.0)]
    #[case(4, 0.25)]
    #[case(7, 1.0)]
    fn repeat_jitter_penalty(#[case] repeat_count: usize, #[case] expected: f64) {
        let quality = QualityConfig::default();
        assert!(float_cmp::approx_eq!(
            f64,
            quality.repeat_jitter_penalty(repeat_count),
            expected,
            ulps = 2
        ));
    }
}
