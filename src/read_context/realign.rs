//! Search for a read context that the aligner placed slightly off or that
//! differs by one repeat unit.

use super::{
    repeat::{find_repeat, Repeat},
    ReadContext,
};

/// Where a read context was found near its expected location in a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Realignment {
    /// The context occurs unchanged.
    Exact,
    /// The context occurs with one more repeat unit; carries the repeat count.
    Lengthened(usize),
    /// The context occurs with one less repeat unit; carries the repeat count.
    Shortened(usize),
    None,
}

impl ReadContext {
    /// Longest repeat through the core.
    pub fn core_repeat(&self) -> Option<Repeat> {
        (self.left_core_index..=self.right_core_index)
            .filter_map(|index| find_repeat(&self.bases, index))
            .max_by_key(|repeat| {
                (
                    repeat.end - repeat.start,
                    std::cmp::Reverse(repeat.unit_length),
                )
            })
    }

    /// Look for the context in `read_bases` within `max_distance` of where it
    /// would start with the variant at `read_index`.
    pub fn realigned_around_index(
        &self,
        read_index: usize,
        read_bases: &[u8],
        max_distance: usize,
    ) -> Realignment {
        let expected = read_index as isize - self.index as isize;
        if occurs_near(&self.bases, expected, read_bases, max_distance) {
            return Realignment::Exact;
        }

        let Some(repeat) = self.core_repeat() else {
            return Realignment::None;
        };
        let (before, from_repeat) = self.bases.split_at(repeat.start);
        let unit = &from_repeat[..repeat.unit_length];

        let lengthened = [before, unit, from_repeat].concat();
        if occurs_near(&lengthened, expected, read_bases, max_distance) {
            return Realignment::Lengthened(repeat.count + 1);
        }

        let shortened = [before, &from_repeat[repeat.unit_length..]].concat();
        if occurs_near(&shortened, expected, read_bases, max_distance) {
            return Realignment::Shortened(repeat.count - 1);
        }

        Realignment::None
    }
}

/// Whether `pattern` occurs in `bases` starting at most `max_distance` away
/// from `expected`; closer starts are tried first.
fn occurs_near(pattern: &[u8], expected: isize, bases: &[u8], max_distance: usize) -> bool {
    (0..=max_distance as isize)
        .flat_map(|distance| [expected - distance, expected + distance])
        .filter(|start| *start >= 0)
        .any(|start| {
            let start = start as usize;
            bases.get(start..start + pattern.len()) == Some(pattern)
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::read_context::ReadContextFactory;
    use pretty_assertions::assert_eq;

    // anchor T at 4, inserted "A" into a run of five As
    const READ: &[u8] = b"GCGTTAAAAACGTCGATC";

    fn insertion() -> ReadContext {
        ReadContextFactory::new(2)
            .insertion(50, 4, b"TA", READ)
            .expect("context within read")
    }

    #[test]
    fn repeat_through_core() {
        let ctx = insertion();
        assert_eq!(ctx.bases, b"GCGTTAAAAACGT".to_vec());
        let repeat = ctx.core_repeat().expect("repeat");
        assert_eq!(
            (repeat.start, repeat.end, repeat.unit_length, repeat.count),
            (5, 9, 1, 5)
        );
    }

    #[rstest::rstest]
    #[case(b"GCGTTAAAAACGTCGATC", Realignment::Exact)]
    #[case(b"CCCGCGTTAAAAACGTCGATC", Realignment::Exact)]
    #[case(b"GCGTTAAAAAACGTCGATC", Realignment::Lengthened(6))]
    #[case(b"GCGTTAAAACGTCGATC", Realignment::Shortened(4))]
    #[case(b"TTTTTTTTTTTTTTTTTT", Realignment::None)]
    #[case(b"CCCCCCCCGCGTTAAAAACGTCGATC", Realignment::None)]
    fn realigned_around_index(#[case] read: &[u8], #[case] expected: Realignment) {
        assert_eq!(insertion().realigned_around_index(4, read, 5), expected);
    }
}
