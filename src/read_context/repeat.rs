//! Detection of short tandem repeats around indels.

/// Longest repeat unit considered.
pub const MAX_REPEAT_LENGTH: usize = 5;
/// Minimal number of unit copies that make a repeat.
pub const MIN_REPEAT_COUNT: usize = 3;

/// A tandem repeat in a base sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repeat {
    /// Index of the first repeat base.
    pub start: usize,
    /// Index of the last repeat base (inclusive).
    pub end: usize,
    pub unit_length: usize,
    pub count: usize,
}

/// Longest repeat whose unit starts at `index`, extended in both directions.
///
/// On equal spans the shorter unit wins.
pub fn find_repeat(bases: &[u8], index: usize) -> Option<Repeat> {
    (1..=MAX_REPEAT_LENGTH)
        .filter_map(|unit_length| repeat_of_unit(bases, index, unit_length))
        .max_by_key(|repeat| (repeat.end - repeat.start, std::cmp::Reverse(repeat.unit_length)))
}

fn repeat_of_unit(bases: &[u8], index: usize, unit_length: usize) -> Option<Repeat> {
    let unit = bases.get(index..index + unit_length)?;

    let mut forward = 1;
    while bases.get(index + forward * unit_length..index + (forward + 1) * unit_length)
        == Some(unit)
    {
        forward += 1;
    }

    let mut backward = 0;
    while index >= (backward + 1) * unit_length
        && &bases[index - (backward + 1) * unit_length..index - backward * unit_length] == unit
    {
        backward += 1;
    }

    let count = forward + backward;
    if count < MIN_REPEAT_COUNT {
        return None;
    }
    Some(Repeat {
        start: index - backward * unit_length,
        end: index + forward * unit_length - 1,
        unit_length,
        count,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest::rstest]
    #[case(b"GCAAAAAT", 3, Some((2, 6, 1, 5)))]
    #[case(b"GCACACACAT", 1, Some((1, 8, 2, 4)))]
    #[case(b"GCACACACAT", 5, Some((1, 8, 2, 4)))]
    #[case(b"GCATGCATT", 1, None)]
    #[case(b"GCAAT", 2, None)]
    #[case(b"ACG", 7, None)]
    fn find_repeat_cases(
        #[case] bases: &[u8],
        #[case] index: usize,
        #[case] expected: Option<(usize, usize, usize, usize)>,
    ) {
        assert_eq!(
            find_repeat(bases, index).map(|r| (r.start, r.end, r.unit_length, r.count)),
            expected
        );
    }
}
