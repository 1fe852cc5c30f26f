//! Raw (context-free) view of a read at a candidate's position.

use crate::{
    candidate::Candidate,
    reads::{AlignedRead, CigarOp},
};

/// Where and how a read covers a candidate's position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawContext {
    /// Read index aligned to the candidate's position, if any.
    pub read_index: Option<usize>,
    pub in_soft_clip: bool,
    pub in_delete: bool,
    pub in_skipped: bool,
    /// An insertion or deletion is anchored at the position.
    pub indel_at_position: bool,
    pub depth_support: bool,
    pub alt_support: bool,
    pub ref_support: bool,
    pub alt_quality: i32,
    pub ref_quality: i32,
}

impl RawContext {
    fn soft_clip(read_index: isize, read_len: usize) -> Self {
        Self {
            read_index: (0..read_len as isize)
                .contains(&read_index)
                .then_some(read_index as usize),
            in_soft_clip: true,
            ..Default::default()
        }
    }

    fn alignment(read_index: usize, alt_support: bool, ref_support: bool, quality: i32) -> Self {
        Self {
            read_index: Some(read_index),
            depth_support: true,
            alt_support,
            ref_support,
            alt_quality: if alt_support { quality } else { 0 },
            ref_quality: if ref_support { quality } else { 0 },
            ..Default::default()
        }
    }

    fn indel(read_index: usize, alt_support: bool, quality: i32) -> Self {
        Self {
            read_index: Some(read_index),
            indel_at_position: true,
            depth_support: true,
            alt_support,
            alt_quality: quality,
            ..Default::default()
        }
    }

    fn in_delete(read_index: usize) -> Self {
        Self {
            read_index: Some(read_index),
            in_delete: true,
            ..Default::default()
        }
    }

    fn in_skipped(read_index: usize) -> Self {
        Self {
            read_index: Some(read_index),
            in_skipped: true,
            ..Default::default()
        }
    }

    /// Walk the read's operations until the candidate's position is reached.
    ///
    /// An aligned run ending at an indel candidate's anchor leaves the decision
    /// to a directly following insertion or deletion.
    pub fn new(
        read: &AlignedRead,
        candidate: &Candidate,
        max_skipped_reference_regions: usize,
    ) -> Self {
        let position = candidate.position;
        let ref_allele = candidate.ref_allele.as_bytes();
        let alt_allele = candidate.alt_allele.as_bytes();
        let is_snv = ref_allele.len() == alt_allele.len();

        let matches_at = |read_index: usize, expected: &[u8]| {
            read.bases.get(read_index..read_index + expected.len()) == Some(expected)
        };
        let matches_first = |read_index: usize, expected: &[u8]| {
            read.bases.get(read_index).is_some() && read.bases.get(read_index) == expected.first()
        };
        let quality =
            |read_index: usize, length: usize| read.min_quality(read_index, length) as i32;

        let mut deferred: Option<RawContext> = None;
        let mut read_index = 0usize;
        let mut ref_pos = read.alignment_start;
        let mut seen_aligned = false;

        for op in &read.cigar {
            let result = match *op {
                CigarOp::SoftClip(len) if !seen_aligned => {
                    // left soft clip
                    (position < read.alignment_start).then(|| {
                        let first_aligned = (read_index + len) as isize;
                        RawContext::soft_clip(
                            first_aligned - (read.alignment_start - position) as isize
                                - alt_allele.len() as isize
                                + ref_allele.len() as isize,
                            read.len(),
                        )
                    })
                }
                CigarOp::SoftClip(len) => {
                    // right soft clip, `ref_pos` is one past the alignment end
                    (ref_pos <= position && position < ref_pos + len as i64).then(|| {
                        RawContext::soft_clip(
                            read_index as isize + (position - ref_pos) as isize,
                            read.len(),
                        )
                    })
                }
                CigarOp::HardClip(_) => None,
                CigarOp::Match(len) => {
                    seen_aligned = true;
                    let ref_end = ref_pos + len as i64 - 1;
                    if ref_pos <= position && position <= ref_end {
                        let variant_index = read_index + (position - ref_pos) as usize;
                        let alt_support = is_snv
                            && ref_end >= candidate.end()
                            && matches_at(variant_index, alt_allele);
                        let ref_support = !alt_support && matches_first(variant_index, ref_allele);
                        let context = RawContext::alignment(
                            variant_index,
                            alt_support,
                            ref_support,
                            read.qualities.get(variant_index).copied().unwrap_or(0) as i32,
                        );
                        if !is_snv && position == ref_end {
                            deferred = Some(context);
                            None
                        } else {
                            Some(context)
                        }
                    } else {
                        None
                    }
                }
                CigarOp::Ins(len) => {
                    seen_aligned = true;
                    (read_index > 0 && ref_pos - 1 == position).then(|| {
                        let anchor = read_index - 1;
                        let alt_support = ref_allele.len() < alt_allele.len()
                            && len == alt_allele.len() - 1
                            && matches_at(anchor, alt_allele);
                        let quality = if alt_support {
                            quality(anchor, alt_allele.len())
                        } else {
                            0
                        };
                        RawContext::indel(anchor, alt_support, quality)
                    })
                }
                CigarOp::Del(len) => {
                    seen_aligned = true;
                    deletion(read_index, ref_pos, len, position, |anchor| {
                        let alt_support = ref_allele.len() > alt_allele.len()
                            && len == ref_allele.len() - 1
                            && matches_first(anchor, ref_allele);
                        let quality = if alt_support { quality(anchor, 2) } else { 0 };
                        RawContext::indel(anchor, alt_support, quality)
                    })
                }
                CigarOp::Skip(len) => {
                    seen_aligned = true;
                    if len > max_skipped_reference_regions
                        && ref_pos + len as i64 > position
                        && ref_pos <= position + 1
                    {
                        Some(RawContext::in_skipped(read_index.saturating_sub(1)))
                    } else {
                        deletion(read_index, ref_pos, len, position, |anchor| {
                            let alt_support = ref_allele.len() > alt_allele.len()
                                && len == ref_allele.len() - 1
                                && matches_first(anchor, ref_allele);
                            let quality = if alt_support { quality(anchor, 2) } else { 0 };
                            RawContext::indel(anchor, alt_support, quality)
                        })
                    }
                }
            };

            if let Some(result) = result {
                return result;
            }
            if !matches!(op, CigarOp::Match(_)) {
                if let Some(deferred) = deferred.take() {
                    return deferred;
                }
            }

            if op.consumes_read() {
                read_index += op.len();
            }
            if op.consumes_ref() {
                ref_pos += op.len() as i64;
            }
        }

        deferred.unwrap_or_default()
    }
}

/// Raw context of a deletion-like operation starting at `ref_pos`; `at_anchor`
/// builds it when the candidate sits on the anchor base.
fn deletion<F>(
    read_index: usize,
    ref_pos: i64,
    len: usize,
    position: i64,
    at_anchor: F,
) -> Option<RawContext>
where
    F: FnOnce(usize) -> RawContext,
{
    if read_index == 0 {
        return None;
    }
    let anchor = read_index - 1;
    if ref_pos - 1 == position {
        Some(at_anchor(anchor))
    } else if ref_pos <= position && position < ref_pos + len as i64 {
        Some(RawContext::in_delete(anchor))
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        read_context::ReadContextFactory,
        reads::{parse_cigar, FLAG_PROPER_PAIR},
        tier::EvidenceTier,
    };
    use pretty_assertions::assert_eq;

    fn candidate(position: i64, ref_allele: &str, alt_allele: &str) -> Candidate {
        Candidate {
            chromosome: "1".into(),
            position,
            ref_allele: ref_allele.into(),
            alt_allele: alt_allele.into(),
            tier: EvidenceTier::Other,
            read_context: ReadContextFactory::new(1)
                .substitution(position, 2, 1, b"ACGTA")
                .expect("context"),
            read_context_support: 1,
            max_depth: 1,
            min_number_of_events: 1,
            raw_alt_support: 1,
        }
    }

    fn read(start: i64, cigar: &str, bases: &str) -> AlignedRead {
        let qualities = (0..bases.len() as u8).map(|i| 20 + i).collect();
        AlignedRead::new(
            "read",
            "1",
            start,
            parse_cigar(cigar).expect("valid cigar"),
            bases.as_bytes(),
            qualities,
            60,
            FLAG_PROPER_PAIR,
        )
        .expect("valid read")
    }

    #[test]
    fn snv_alt_and_ref() {
        let snv = candidate(104, "C", "T");
        let alt = RawContext::new(&read(100, "10M", "ACGTTCGTAC"), &snv, 50);
        assert_eq!(
            alt,
            RawContext {
                read_index: Some(4),
                depth_support: true,
                alt_support: true,
                alt_quality: 24,
                ..Default::default()
            }
        );

        let reference = RawContext::new(&read(100, "10M", "ACGTCCGTAC"), &snv, 50);
        assert!(reference.ref_support && !reference.alt_support);
        assert_eq!(reference.ref_quality, 24);
    }

    #[test]
    fn insertion_claims_anchor() {
        let insertion = candidate(104, "C", "CA");
        let raw = RawContext::new(&read(100, "5M1I4M", "ACGTCAGTAC"), &insertion, 50);
        assert_eq!(raw.read_index, Some(4));
        assert!(raw.indel_at_position && raw.alt_support);
        assert_eq!(raw.alt_quality, 24);

        // without the insertion the aligned run decides
        let raw = RawContext::new(&read(100, "5M4M", "ACGTCGTAC"), &insertion, 50);
        assert!(!raw.indel_at_position && raw.ref_support);
    }

    #[test]
    fn deletion_and_position_in_deletion() {
        let deletion = candidate(104, "CGT", "C");
        let raw = RawContext::new(&read(100, "5M2D4M", "ACGTCACGT"), &deletion, 50);
        assert!(raw.indel_at_position && raw.alt_support);
        assert_eq!(raw.alt_quality, 24);

        let snv = candidate(105, "G", "A");
        let raw = RawContext::new(&read(100, "5M2D4M", "ACGTCACGT"), &snv, 50);
        assert_eq!(raw.read_index, Some(4));
        assert!(raw.in_delete && !raw.depth_support);
    }

    #[test]
    fn soft_clips_and_skips() {
        let snv = candidate(98, "C", "T");
        let raw = RawContext::new(&read(100, "3S7M", "GTAACGTACG"), &snv, 50);
        assert_eq!(raw.read_index, Some(1));
        assert!(raw.in_soft_clip && !raw.depth_support);

        let snv = candidate(108, "C", "T");
        let raw = RawContext::new(&read(100, "6M4S", "ACGTACGTAC"), &snv, 50);
        assert_eq!(raw.read_index, Some(8));
        assert!(raw.in_soft_clip);

        let snv = candidate(120, "C", "T");
        let raw = RawContext::new(&read(100, "5M100N5M", "ACGTACGTAC"), &snv, 50);
        assert!(raw.in_skipped);
    }
}
