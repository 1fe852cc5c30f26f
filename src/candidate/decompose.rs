//! Decomposition of one aligned read into the events it carries.

use crate::{
    common::ChrRegion,
    config::Config,
    read_context::{ReadContext, ReadContextFactory},
    reads::{AlignedRead, CigarOp, RefSequence},
};

use super::cache::DepthLimit;

/// One deviation from the reference observed on one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltRead {
    pub position: i64,
    pub ref_allele: Vec<u8>,
    pub alt_allele: Vec<u8>,
    /// Minimal base quality over the affected bases.
    pub base_quality: u8,
    pub number_of_events: i32,
    pub sufficient_map_quality: bool,
    /// Read index of the variant's first base (the anchor for indels).
    pub read_index: usize,
    pub read_context: Option<ReadContext>,
}

impl AltRead {
    pub fn is_indel(&self) -> bool {
        self.ref_allele.len() != self.alt_allele.len()
    }

    /// Number of inserted or deleted bases, zero for substitutions.
    pub fn length(&self) -> isize {
        (self.ref_allele.len() as isize - self.alt_allele.len() as isize).abs()
    }

    /// Core bounds in read coordinates, if a context was built.
    pub fn core_bounds(&self) -> Option<(isize, isize)> {
        self.read_context
            .as_ref()
            .map(|ctx| ctx.read_core_bounds(self.read_index))
    }
}

/// A reference-matching base of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefObservation {
    pub position: i64,
    pub sufficient_map_quality: bool,
}

/// Everything a read contributes to the position evidence cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decomposition {
    pub alt_reads: Vec<AltRead>,
    pub ref_observations: Vec<RefObservation>,
    /// Events skipped because their position reached the depth cap.
    pub depth_limited: usize,
    /// Whether the walk stopped at an operation outside of the loaded data.
    pub malformed: bool,
}

/// Operation referencing data outside of the read or the reference window.
#[derive(Debug, Clone, Copy)]
struct Malformed {
    op: CigarOp,
    read_index: usize,
    ref_position: i64,
}

/// Number of mismatches in aligned runs plus one per insertion and deletion.
pub fn number_of_events(read: &AlignedRead, ref_seq: &RefSequence) -> i32 {
    let mut result = 0;
    let mut read_index = 0usize;
    let mut ref_pos = read.alignment_start;
    for op in &read.cigar {
        match *op {
            CigarOp::Match(len) => {
                result += (0..len)
                    .filter(|&i| {
                        match (read.bases.get(read_index + i), ref_seq.base(ref_pos + i as i64)) {
                            (Some(&read_base), Some(ref_base)) => read_base != ref_base,
                            _ => false,
                        }
                    })
                    .count() as i32;
            }
            CigarOp::Ins(_) | CigarOp::Del(_) => result += 1,
            _ => (),
        }
        if op.consumes_read() {
            read_index += op.len();
        }
        if op.consumes_ref() {
            ref_pos += op.len() as i64;
        }
    }
    result
}

/// Events of an MNV relative to the read: the differing bases count as one.
fn number_of_events_with_mnv(number_of_events: i32, ref_allele: &[u8], alt_allele: &[u8]) -> i32 {
    let differing = ref_allele
        .iter()
        .zip(alt_allele)
        .filter(|(r, a)| r != a)
        .count() as i32;
    number_of_events - differing + 1
}

/// Walks the operations of a read against the reference window.
#[derive(Debug)]
pub struct ReadDecomposer<'a> {
    config: &'a Config,
    bounds: &'a ChrRegion,
    ref_seq: &'a RefSequence,
    factory: ReadContextFactory,
}

impl<'a> ReadDecomposer<'a> {
    pub fn new(config: &'a Config, bounds: &'a ChrRegion, ref_seq: &'a RefSequence) -> Self {
        Self {
            config,
            bounds,
            ref_seq,
            factory: ReadContextFactory::new(config.read_context_flank_size),
        }
    }

    /// Decompose `read`, skipping positions whose depth cap is reached.
    pub fn decompose(&self, read: &AlignedRead, depth: &dyn DepthLimit) -> Decomposition {
        let number_of_events = number_of_events(read, self.ref_seq);
        let sufficient_map_quality = read.mapping_quality >= self.config.min_map_quality;
        let mut result = Decomposition::default();

        let mut read_index = 0usize;
        let mut ref_pos = read.alignment_start;
        for op in &read.cigar {
            let step = match *op {
                CigarOp::Match(len) => self.alignment(
                    read,
                    read_index,
                    ref_pos,
                    len,
                    number_of_events,
                    sufficient_map_quality,
                    depth,
                    &mut result,
                ),
                CigarOp::Ins(len) => self.insertion(
                    read,
                    read_index,
                    ref_pos,
                    len,
                    number_of_events,
                    sufficient_map_quality,
                    depth,
                    &mut result,
                ),
                CigarOp::Del(len) => self.deletion(
                    read,
                    read_index,
                    ref_pos,
                    len,
                    number_of_events,
                    sufficient_map_quality,
                    depth,
                    &mut result,
                ),
                CigarOp::Skip(_) | CigarOp::SoftClip(_) | CigarOp::HardClip(_) => Ok(()),
            };

            if let Err(malformed) = step {
                tracing::trace!(
                    "skipping remaining operations of read {} at {:?} (read index {}, position {})",
                    &read.name,
                    malformed.op,
                    malformed.read_index,
                    malformed.ref_position
                );
                result.malformed = true;
                break;
            }

            if op.consumes_read() {
                read_index += op.len();
            }
            if op.consumes_ref() {
                ref_pos += op.len() as i64;
            }
        }

        result
    }

    fn within_read_context(&self, read_index: usize, read: &AlignedRead) -> bool {
        let flank_size = self.config.read_context_flank_size;
        read_index >= flank_size && read_index + flank_size < read.len()
    }

    #[allow(clippy::too_many_arguments)]
    fn alignment(
        &self,
        read: &AlignedRead,
        read_index: usize,
        ref_pos: i64,
        len: usize,
        number_of_events: i32,
        sufficient_map_quality: bool,
        depth: &dyn DepthLimit,
        result: &mut Decomposition,
    ) -> Result<(), Malformed> {
        if read_index + len > read.len() {
            return Err(Malformed {
                op: CigarOp::Match(len),
                read_index,
                ref_position: ref_pos,
            });
        }

        for i in 0..len {
            let position = ref_pos + i as i64;
            let read_base_index = read_index + i;
            if !self.bounds.contains(position) {
                continue;
            }
            let ref_base = self.ref_seq.base(position).ok_or(Malformed {
                op: CigarOp::Match(len),
                read_index: read_base_index,
                ref_position: position,
            })?;
            if depth.reached_depth_limit(position) {
                result.depth_limited += 1;
                continue;
            }

            let read_base = read.bases[read_base_index];
            if read_base == ref_base {
                result.ref_observations.push(RefObservation {
                    position,
                    sufficient_map_quality,
                });
                continue;
            }

            let within_read_context = self.within_read_context(read_base_index, read);
            result.alt_reads.push(AltRead {
                position,
                ref_allele: vec![ref_base],
                alt_allele: vec![read_base],
                base_quality: read.qualities[read_base_index],
                number_of_events,
                sufficient_map_quality,
                read_index: read_base_index,
                read_context: within_read_context
                    .then(|| {
                        self.factory
                            .substitution(position, read_base_index, 1, &read.bases)
                    })
                    .flatten(),
            });

            if !self.config.mnv_enabled {
                continue;
            }
            let max_mnv_length = self.mnv_length(read, read_base_index, position, len - i);
            for mnv_length in 2..=max_mnv_length {
                let mnv_end = position + mnv_length as i64 - 1;
                let Some(mnv_ref) = self.ref_seq.slice(position, mnv_end) else {
                    break;
                };
                let mnv_alt = &read.bases[read_base_index..read_base_index + mnv_length];
                // only the last base decides; CA>TA is no valid subset of CAC>TAT
                if mnv_ref[mnv_length - 1] == mnv_alt[mnv_length - 1] {
                    continue;
                }
                result.alt_reads.push(AltRead {
                    position,
                    ref_allele: mnv_ref.to_vec(),
                    alt_allele: mnv_alt.to_vec(),
                    base_quality: read.min_quality(read_base_index, mnv_length),
                    number_of_events: number_of_events_with_mnv(
                        number_of_events,
                        mnv_ref,
                        mnv_alt,
                    ),
                    sufficient_map_quality,
                    read_index: read_base_index,
                    read_context: within_read_context
                        .then(|| {
                            self.factory.substitution(
                                position,
                                read_base_index,
                                mnv_length,
                                &read.bases,
                            )
                        })
                        .flatten(),
                });
            }
        }

        Ok(())
    }

    /// Longest MNV window worth trying at a mismatch; limited to `remaining`
    /// bases of the aligned run.
    fn mnv_length(
        &self,
        read: &AlignedRead,
        read_index: usize,
        position: i64,
        remaining: usize,
    ) -> usize {
        let differs = |offset: usize| {
            offset < remaining
                && matches!(
                    (
                        read.bases.get(read_index + offset),
                        self.ref_seq.base(position + offset as i64)
                    ),
                    (Some(&read_base), Some(ref_base)) if read_base != ref_base
                )
        };
        if differs(2) {
            3
        } else if differs(1) {
            2
        } else {
            1
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn insertion(
        &self,
        read: &AlignedRead,
        read_index: usize,
        ref_pos: i64,
        len: usize,
        number_of_events: i32,
        sufficient_map_quality: bool,
        depth: &dyn DepthLimit,
        result: &mut Decomposition,
    ) -> Result<(), Malformed> {
        let malformed = Malformed {
            op: CigarOp::Ins(len),
            read_index,
            ref_position: ref_pos,
        };
        if read_index == 0 || read_index + len > read.len() {
            return Err(malformed);
        }
        let anchor_index = read_index - 1;
        let position = ref_pos - 1;
        if !self.bounds.contains(position) {
            return Ok(());
        }
        let ref_base = self.ref_seq.base(position).ok_or(malformed)?;
        if depth.reached_depth_limit(position) {
            result.depth_limited += 1;
            return Ok(());
        }

        let alt = &read.bases[anchor_index..=anchor_index + len];
        result.alt_reads.push(AltRead {
            position,
            ref_allele: vec![ref_base],
            alt_allele: alt.to_vec(),
            base_quality: read.min_quality(anchor_index, alt.len()),
            number_of_events,
            sufficient_map_quality,
            read_index: anchor_index,
            read_context: self
                .within_read_context(anchor_index, read)
                .then(|| {
                    self.factory
                        .insertion(position, anchor_index, alt, &read.bases)
                })
                .flatten(),
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn deletion(
        &self,
        read: &AlignedRead,
        read_index: usize,
        ref_pos: i64,
        len: usize,
        number_of_events: i32,
        sufficient_map_quality: bool,
        depth: &dyn DepthLimit,
        result: &mut Decomposition,
    ) -> Result<(), Malformed> {
        let malformed = Malformed {
            op: CigarOp::Del(len),
            read_index,
            ref_position: ref_pos,
        };
        if read_index == 0 || read_index > read.len() {
            return Err(malformed);
        }
        let anchor_index = read_index - 1;
        let position = ref_pos - 1;
        if !self.bounds.contains(position) {
            return Ok(());
        }
        let ref_allele = self
            .ref_seq
            .slice(position, position + len as i64)
            .ok_or(malformed)?;
        if depth.reached_depth_limit(position) {
            result.depth_limited += 1;
            return Ok(());
        }

        result.alt_reads.push(AltRead {
            position,
            ref_allele: ref_allele.to_vec(),
            alt_allele: vec![read.bases[anchor_index]],
            base_quality: read.min_quality(anchor_index, 2),
            number_of_events,
            sufficient_map_quality,
            read_index: anchor_index,
            read_context: self
                .within_read_context(anchor_index, read)
                .then(|| {
                    self.factory
                        .deletion(position, anchor_index, ref_allele, &read.bases)
                })
                .flatten(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reads::parse_cigar;
    use pretty_assertions::assert_eq;

    struct NoLimit;

    impl DepthLimit for NoLimit {
        fn reached_depth_limit(&self, _position: i64) -> bool {
            false
        }
    }

    struct LimitAt(i64);

    impl DepthLimit for LimitAt {
        fn reached_depth_limit(&self, position: i64) -> bool {
            position == self.0
        }
    }

    fn read(start: i64, cigar: &str, bases: &str) -> AlignedRead {
        AlignedRead::new(
            "read",
            "1",
            start,
            parse_cigar(cigar).expect("valid cigar"),
            bases.as_bytes(),
            vec![30; bases.len()],
            60,
            crate::reads::FLAG_PROPER_PAIR,
        )
        .expect("valid read")
    }

    fn alleles(decomposition: &Decomposition) -> Vec<(i64, String, String)> {
        decomposition
            .alt_reads
            .iter()
            .map(|alt_read| {
                (
                    alt_read.position,
                    String::from_utf8_lossy(&alt_read.ref_allele).to_string(),
                    String::from_utf8_lossy(&alt_read.alt_allele).to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn reference_read_has_no_events() {
        let config = Config::default();
        let bounds = ChrRegion::new("1", 1, 20);
        let ref_seq = RefSequence::new("1", 1, b"GATTACAGATTACAGATTAC");
        let decomposer = ReadDecomposer::new(&config, &bounds, &ref_seq);

        let decomposition = decomposer.decompose(&read(3, "10M", "TTACAGATTA"), &NoLimit);
        assert_eq!(decomposition.alt_reads, vec![]);
        assert_eq!(decomposition.ref_observations.len(), 10);
        assert!(!decomposition.malformed);
    }

    #[test]
    fn mnv_last_base_rule() {
        let config = Config {
            read_context_flank_size: 2,
            ..Default::default()
        };
        let bounds = ChrRegion::new("1", 1, 12);
        let ref_seq = RefSequence::new("1", 1, b"TTGACGTCCATG");
        let decomposer = ReadDecomposer::new(&config, &bounds, &ref_seq);

        // ACGT at 4..7 read as ATGA
        let read = read(1, "12M", "TTGATGACCATG");
        assert_eq!(number_of_events(&read, &ref_seq), 2);
        let decomposition = decomposer.decompose(&read, &NoLimit);
        assert_eq!(
            alleles(&decomposition),
            vec![
                (5, "C".to_string(), "T".to_string()),
                (5, "CGT".to_string(), "TGA".to_string()),
                (7, "T".to_string(), "A".to_string()),
            ]
        );
        let events = decomposition
            .alt_reads
            .iter()
            .map(|alt_read| alt_read.number_of_events)
            .collect::<Vec<_>>();
        assert_eq!(events, vec![2, 1, 2]);
    }

    #[test]
    fn mnv_disabled() {
        let config = Config {
            mnv_enabled: false,
            ..Default::default()
        };
        let bounds = ChrRegion::new("1", 1, 12);
        let ref_seq = RefSequence::new("1", 1, b"TTGACGTCCATG");
        let decomposer = ReadDecomposer::new(&config, &bounds, &ref_seq);

        let decomposition = decomposer.decompose(&read(1, "12M", "TTGATGACCATG"), &NoLimit);
        assert_eq!(decomposition.alt_reads.len(), 2);
    }

    #[test]
    fn indels() {
        let config = Config {
            read_context_flank_size: 3,
            ..Default::default()
        };
        let bounds = ChrRegion::new("1", 1, 30);
        let ref_seq = RefSequence::new("1", 1, b"ACGTCAGGTACCTGATCGGATCCATGACTG");
        let decomposer = ReadDecomposer::new(&config, &bounds, &ref_seq);

        // insertion of "T" after position 8, deletion of "CG" after position 16
        let read = read(1, "8M1I8M2D10M", "ACGTCAGGTTACCTGATGATCCATGAC");
        let decomposition = decomposer.decompose(&read, &NoLimit);
        assert_eq!(
            alleles(&decomposition),
            vec![
                (8, "G".to_string(), "GT".to_string()),
                (16, "TCG".to_string(), "T".to_string()),
            ]
        );
        let insertion = &decomposition.alt_reads[0];
        assert_eq!(insertion.read_index, 7);
        assert!(insertion.read_context.is_some());
        let deletion = &decomposition.alt_reads[1];
        assert_eq!(deletion.read_index, 16);
        assert_eq!(deletion.number_of_events, 2);
    }

    #[test]
    fn bounds_and_depth_limit() {
        let config = Config::default();
        let bounds = ChrRegion::new("1", 1, 6);
        let ref_seq = RefSequence::new("1", 1, b"ACGTACGTAC");
        let decomposer = ReadDecomposer::new(&config, &bounds, &ref_seq);

        let read = read(1, "10M", "TCGAACGTTC");
        let decomposition = decomposer.decompose(&read, &LimitAt(4));
        // mismatch at 9 outside of bounds, at 4 depth limited
        assert_eq!(
            alleles(&decomposition),
            vec![(1, "A".to_string(), "T".to_string())]
        );
        assert_eq!(decomposition.depth_limited, 1);
        assert_eq!(decomposition.ref_observations.len(), 4);
    }

    #[test]
    fn malformed_read_keeps_earlier_events() {
        let config = Config::default();
        let bounds = ChrRegion::new("1", 1, 100);
        let ref_seq = RefSequence::new("1", 1, b"ACGTACGTAC");
        let decomposer = ReadDecomposer::new(&config, &bounds, &ref_seq);

        // second run lies beyond the loaded window
        let read = read(1, "4M20N4M", "TCGTACGT");
        let decomposition = decomposer.decompose(&read, &NoLimit);
        assert!(decomposition.malformed);
        assert_eq!(
            alleles(&decomposition),
            vec![(1, "A".to_string(), "T".to_string())]
        );
    }
}
