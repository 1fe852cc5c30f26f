//! Read contexts: the core bases spanning a variant plus flanks on both sides.

pub mod realign;
pub mod repeat;

use crate::common::serialize_bases;

/// Bases on each side of a variant that always belong to its core.
pub const MIN_CORE_DISTANCE: usize = 2;

/// Result of matching a read against a read context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadContextMatch {
    /// Core and both flanks agree.
    Full,
    /// Core agrees and the flanks agree as far as the read extends.
    Partial,
    /// Core agrees, a flank base disagrees.
    Core,
    None,
}

/// Local sequence signature of a variant: `[left flank][core][right flank]`.
///
/// All indices are offsets into `bases`; the core bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ReadContext {
    /// Reference position of the variant.
    pub position: i64,
    /// Offset of the variant's first base.
    pub index: usize,
    pub left_core_index: usize,
    pub right_core_index: usize,
    pub flank_size: usize,
    #[serde(serialize_with = "serialize_bases")]
    pub bases: Vec<u8>,
}

impl ReadContext {
    /// Build from a read whose variant base is at `read_index` and whose core spans
    /// `[left_core, right_core]` in read coordinates.
    ///
    /// Returns `None` if the core does not fit into the read. Flanks are clamped to
    /// the read, which makes the context incomplete.
    pub fn from_read(
        position: i64,
        read_index: usize,
        left_core: isize,
        right_core: isize,
        flank_size: usize,
        read_bases: &[u8],
    ) -> Option<Self> {
        if left_core < 0
            || right_core >= read_bases.len() as isize
            || left_core > read_index as isize
            || right_core < read_index as isize
        {
            return None;
        }
        let (left_core, right_core) = (left_core as usize, right_core as usize);
        let start = left_core.saturating_sub(flank_size);
        let end = (right_core + flank_size).min(read_bases.len() - 1);

        Some(Self {
            position,
            index: read_index - start,
            left_core_index: left_core - start,
            right_core_index: right_core - start,
            flank_size,
            bases: read_bases[start..=end].to_vec(),
        })
    }

    /// Whether both flanks have their full size.
    pub fn is_complete(&self) -> bool {
        self.left_core_index == self.flank_size
            && self.bases.len() - 1 - self.right_core_index == self.flank_size
    }

    /// The core bases.
    pub fn core(&self) -> &[u8] {
        &self.bases[self.left_core_index..=self.right_core_index]
    }

    /// Read index of `bases[0]` when the variant sits at `read_index`.
    fn read_offset(&self, read_index: usize) -> isize {
        read_index as isize - self.index as isize
    }

    /// Core bounds in the coordinates of a read with the variant at `read_index`.
    pub fn read_core_bounds(&self, read_index: usize) -> (isize, isize) {
        let offset = self.read_offset(read_index);
        (
            offset + self.left_core_index as isize,
            offset + self.right_core_index as isize,
        )
    }

    /// Whether a read of `read_len` bases covers the whole core.
    pub fn is_core_covered(&self, read_index: usize, read_len: usize) -> bool {
        let (left, right) = self.read_core_bounds(read_index);
        left >= 0 && right < read_len as isize
    }

    /// Compare the read bases against this context, aligning the variant at
    /// `read_index`.
    pub fn match_at(&self, read_index: usize, read_bases: &[u8]) -> ReadContextMatch {
        if !self.is_core_covered(read_index, read_bases.len()) {
            return ReadContextMatch::None;
        }
        let offset = self.read_offset(read_index);
        let read_base = |i: usize| -> Option<u8> {
            let pos = offset + i as isize;
            if pos < 0 {
                None
            } else {
                read_bases.get(pos as usize).copied()
            }
        };

        let core_matches = (self.left_core_index..=self.right_core_index)
            .all(|i| read_base(i) == Some(self.bases[i]));
        if !core_matches {
            return ReadContextMatch::None;
        }

        let mut truncated = false;
        let flanks = (0..self.left_core_index).chain(self.right_core_index + 1..self.bases.len());
        for i in flanks {
            match read_base(i) {
                Some(base) if base != self.bases[i] => return ReadContextMatch::Core,
                Some(_) => (),
                None => truncated = true,
            }
        }

        if truncated {
            ReadContextMatch::Partial
        } else {
            ReadContextMatch::Full
        }
    }

    /// Minimal quality over the core of a read with the variant at `read_index`.
    pub fn min_core_quality(&self, read_index: usize, qualities: &[u8]) -> u8 {
        let (left, right) = self.read_core_bounds(read_index);
        let left = left.max(0) as usize;
        let right = right.max(-1) + 1;
        qualities
            .get(left..(right as usize).min(qualities.len()))
            .and_then(|quals| quals.iter().min().copied())
            .unwrap_or(0)
    }

    /// Distance of the core from the nearer read end.
    pub fn distance_from_read_edge(&self, read_index: usize, read_len: usize) -> i32 {
        let (left, right) = self.read_core_bounds(read_index);
        left.min(read_len as isize - 1 - right).max(0) as i32
    }
}

/// Builds read contexts for the different variant kinds.
#[derive(Debug, Clone, Copy)]
pub struct ReadContextFactory {
    pub flank_size: usize,
}

impl ReadContextFactory {
    pub fn new(flank_size: usize) -> Self {
        Self { flank_size }
    }

    /// Context of a single or multi-base substitution of `length` bases.
    pub fn substitution(
        &self,
        position: i64,
        read_index: usize,
        length: usize,
        read_bases: &[u8],
    ) -> Option<ReadContext> {
        let left = read_index as isize - MIN_CORE_DISTANCE as isize;
        let right = (read_index + length - 1 + MIN_CORE_DISTANCE) as isize;
        ReadContext::from_read(position, read_index, left, right, self.flank_size, read_bases)
    }

    /// Context of an insertion whose anchor base is at `read_index`; `alt` includes
    /// the anchor.
    pub fn insertion(
        &self,
        position: i64,
        read_index: usize,
        alt: &[u8],
        read_bases: &[u8],
    ) -> Option<ReadContext> {
        let inserted = alt.get(1..).unwrap_or_default();
        let following = read_bases.get(read_index + alt.len()..).unwrap_or_default();
        let homology = common_prefix_len(inserted, following);

        let left = read_index as isize - MIN_CORE_DISTANCE as isize;
        let right = (read_index + alt.len() - 1 + MIN_CORE_DISTANCE + homology) as isize;
        let (left, right) = self.widen_by_repeat(read_index, left, right, read_bases);
        ReadContext::from_read(position, read_index, left, right, self.flank_size, read_bases)
    }

    /// Context of a deletion whose anchor base is at `read_index`; `ref_allele`
    /// includes the anchor.
    pub fn deletion(
        &self,
        position: i64,
        read_index: usize,
        ref_allele: &[u8],
        read_bases: &[u8],
    ) -> Option<ReadContext> {
        let deleted = ref_allele.get(1..).unwrap_or_default();
        let following = read_bases.get(read_index + 1..).unwrap_or_default();
        let homology = common_prefix_len(deleted, following);

        let left = read_index as isize - MIN_CORE_DISTANCE as isize;
        let right = (read_index + 1 + MIN_CORE_DISTANCE + homology) as isize;
        let (left, right) = self.widen_by_repeat(read_index, left, right, read_bases);
        ReadContext::from_read(position, read_index, left, right, self.flank_size, read_bases)
    }

    /// Widen a core so that it covers a repeat right after the anchor plus one
    /// base on each side.
    fn widen_by_repeat(
        &self,
        read_index: usize,
        left: isize,
        right: isize,
        read_bases: &[u8],
    ) -> (isize, isize) {
        match repeat::find_repeat(read_bases, read_index + 1) {
            Some(repeat) => (
                left.min(repeat.start as isize - 1),
                right.max(repeat.end as isize + 1),
            ),
            None => (left, right),
        }
    }
}

fn common_prefix_len(lhs: &[u8], rhs: &[u8]) -> usize {
    lhs.iter().zip(rhs).take_while(|(a, b)| a == b).count()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const READ: &[u8] = b"TTGACCGATGCAGTCCATGGA";

    #[test]
    fn snv_context() {
        let factory = ReadContextFactory::new(3);
        let ctx = factory
            .substitution(100, 10, 1, READ)
            .expect("context within read");
        assert_eq!(ctx.bases, b"CGATGCAGTCC".to_vec());
        assert_eq!(ctx.index, 5);
        assert_eq!((ctx.left_core_index, ctx.right_core_index), (3, 7));
        assert_eq!(ctx.core(), b"TGCAG");
        assert!(ctx.is_complete());
        assert_eq!(ctx.read_core_bounds(10), (8, 12));
    }

    #[test]
    fn context_near_read_start_is_incomplete() {
        let factory = ReadContextFactory::new(3);
        let ctx = factory
            .substitution(100, 3, 1, READ)
            .expect("core within read");
        assert_eq!(ctx.left_core_index, 1);
        assert!(!ctx.is_complete());
        assert_eq!(factory.substitution(100, 1, 1, READ), None);
    }

    #[rstest::rstest]
    #[case(10, b"TTGACCGATGCAGTCCATGGA", ReadContextMatch::Full)]
    #[case(6, b"CCGATGCAGTCCATGGA", ReadContextMatch::Full)]
    #[case(2, b"TGCAGTCCATGGA", ReadContextMatch::Partial)]
    #[case(10, b"TTGACCGTTGCAGTCCATGGA", ReadContextMatch::Core)]
    #[case(10, b"TTGACCGATGCTGTCCATGGA", ReadContextMatch::None)]
    #[case(1, b"GCAGTCCATGGA", ReadContextMatch::None)]
    fn match_at(
        #[case] read_index: usize,
        #[case] read: &[u8],
        #[case] expected: ReadContextMatch,
    ) {
        let ctx = ReadContextFactory::new(3)
            .substitution(100, 10, 1, READ)
            .expect("context within read");
        assert_eq!(ctx.match_at(read_index, read), expected);
    }

    #[test]
    fn qualities_and_edges() {
        let ctx = ReadContextFactory::new(3)
            .substitution(100, 10, 1, READ)
            .expect("context within read");
        let mut quals = vec![30u8; READ.len()];
        quals[12] = 11;
        quals[13] = 2;
        assert_eq!(ctx.min_core_quality(10, &quals), 11);
        assert_eq!(ctx.distance_from_read_edge(10, READ.len()), 8);
        assert_eq!(ctx.distance_from_read_edge(3, 14), 1);
    }

    #[test]
    fn deletion_with_homology() {
        // anchor G at 5, deleted "CA", read continues with "CAT..."
        let read = b"ATTCGGCATTGACGTAGC";
        let ctx = ReadContextFactory::new(2)
            .deletion(50, 5, b"GCA", read)
            .expect("context within read");
        // homology of 2 bases widens the core to [3, 10]
        assert_eq!(ctx.read_core_bounds(5), (3, 10));
        assert!(ctx.is_complete());
    }

    #[test]
    fn insertion_in_repeat() {
        // anchor T at 4, inserted "A" into a run of five As
        let read = b"GCGTTAAAAACGTCGATC";
        let ctx = ReadContextFactory::new(2)
            .insertion(50, 4, b"TA", read)
            .expect("context within read");
        // repeat [5, 9] widened by one base on each side
        assert_eq!(ctx.read_core_bounds(4), (2, 10));
        assert_eq!(ctx.core(), b"GTTAAAAAC");
    }
}
