//! Widening of linked substitution and indel contexts on the same read.

use crate::read_context::ReadContext;

use super::decompose::AltRead;

/// Widen the cores of every substitution and indel pair on one read whose
/// contexts overlap to the union of both cores.
///
/// The spans are computed first and the contexts rebuilt from `read_bases`
/// afterwards, so the input vector is consumed and a new one returned.
pub fn extend_cores(
    alt_reads: Vec<AltRead>,
    read_bases: &[u8],
    flank_size: usize,
) -> Vec<AltRead> {
    if alt_reads.len() < 2 {
        return alt_reads;
    }

    let original = alt_reads
        .iter()
        .map(|alt_read| alt_read.core_bounds())
        .collect::<Vec<_>>();
    let mut spans = original.clone();

    // indels after the substitution
    for i in 0..alt_reads.len() {
        if alt_reads[i].is_indel() || spans[i].is_none() {
            continue;
        }
        for j in (i + 1..alt_reads.len()).rev() {
            if !alt_reads[j].is_indel() {
                continue;
            }
            if let (Some(snv), Some(indel)) = (spans[i], spans[j]) {
                if indel.0 - alt_reads[j].length() <= snv.1 {
                    join(&mut spans, i, j);
                }
            }
        }
    }

    // indels before the substitution
    for i in (0..alt_reads.len()).rev() {
        if alt_reads[i].is_indel() || spans[i].is_none() {
            continue;
        }
        for j in 0..i {
            if !alt_reads[j].is_indel() {
                continue;
            }
            if let (Some(snv), Some(indel)) = (spans[i], spans[j]) {
                if indel.1 + alt_reads[j].length() >= snv.0 {
                    join(&mut spans, i, j);
                }
            }
        }
    }

    alt_reads
        .into_iter()
        .zip(spans.into_iter().zip(original))
        .map(|(alt_read, (span, original))| match span {
            Some((left, right)) if span != original => AltRead {
                read_context: ReadContext::from_read(
                    alt_read.position,
                    alt_read.read_index,
                    left,
                    right,
                    flank_size,
                    read_bases,
                ),
                ..alt_read
            },
            _ => alt_read,
        })
        .collect()
}

/// Set both spans to their union.
fn join(spans: &mut [Option<(isize, isize)>], i: usize, j: usize) {
    if let (Some(lhs), Some(rhs)) = (spans[i], spans[j]) {
        let span = (lhs.0.min(rhs.0), lhs.1.max(rhs.1));
        spans[i] = Some(span);
        spans[j] = Some(span);
    }
}
