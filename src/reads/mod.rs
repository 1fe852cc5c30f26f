//! Aligned reads and the interfaces to the reference and alignment collaborators.

pub mod memory;

use crate::err::{ReadError, ReferenceError};

/// FLAG bit 0x2: each segment properly aligned.
pub const FLAG_PROPER_PAIR: u16 = 0x2;
/// FLAG bit 0x4: segment unmapped.
pub const FLAG_UNMAPPED: u16 = 0x4;
/// FLAG bit 0x100: secondary alignment.
pub const FLAG_SECONDARY: u16 = 0x100;
/// FLAG bit 0x400: PCR or optical duplicate.
pub const FLAG_DUPLICATE: u16 = 0x400;
/// FLAG bit 0x800: supplementary alignment.
pub const FLAG_SUPPLEMENTARY: u16 = 0x800;

/// Run-length encoded alignment operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    /// M/=/X: consumes reference and read.
    Match(usize),
    /// I: consumes read only.
    Ins(usize),
    /// D: consumes reference only.
    Del(usize),
    /// N: skipped reference region, consumes reference only.
    Skip(usize),
    /// S: consumes read only.
    SoftClip(usize),
    /// H/P: consumes neither.
    HardClip(usize),
}

impl CigarOp {
    /// Length of the operation.
    pub fn len(&self) -> usize {
        match *self {
            CigarOp::Match(len)
            | CigarOp::Ins(len)
            | CigarOp::Del(len)
            | CigarOp::Skip(len)
            | CigarOp::SoftClip(len)
            | CigarOp::HardClip(len) => len,
        }
    }

    /// Whether the operation consumes read bases.
    pub fn consumes_read(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_) | CigarOp::Ins(_) | CigarOp::SoftClip(_)
        )
    }

    /// Whether the operation consumes reference bases.
    pub fn consumes_ref(&self) -> bool {
        matches!(self, CigarOp::Match(_) | CigarOp::Del(_) | CigarOp::Skip(_))
    }
}

/// Parse a CIGAR string into a sequence of operations.
pub fn parse_cigar(cigar: &str) -> Result<Vec<CigarOp>, ReadError> {
    if cigar == "*" {
        return Ok(Vec::new());
    }

    let mut ops = Vec::new();
    let mut num_start = 0;
    for (i, c) in cigar.char_indices() {
        if c.is_ascii_digit() {
            continue;
        }
        let len: usize = cigar[num_start..i]
            .parse()
            .map_err(|_| ReadError::InvalidCigar(cigar.to_string()))?;
        let op = match c {
            'M' | '=' | 'X' => CigarOp::Match(len),
            'I' => CigarOp::Ins(len),
            'D' => CigarOp::Del(len),
            'N' => CigarOp::Skip(len),
            'S' => CigarOp::SoftClip(len),
            'H' | 'P' => CigarOp::HardClip(len),
            _ => return Err(ReadError::InvalidCigar(cigar.to_string())),
        };
        ops.push(op);
        num_start = i + 1;
    }
    if num_start != cigar.len() {
        return Err(ReadError::InvalidCigar(cigar.to_string()));
    }

    Ok(ops)
}

/// One aligned read as yielded by a `ReadSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    /// Read name.
    pub name: String,
    /// Chromosome the read is aligned to.
    pub chromosome: String,
    /// 1-based position of the first aligned reference base.
    pub alignment_start: i64,
    /// Alignment operations.
    pub cigar: Vec<CigarOp>,
    /// Read bases (upper case).
    pub bases: Vec<u8>,
    /// Phred base qualities, one per base.
    pub qualities: Vec<u8>,
    /// Mapping quality.
    pub mapping_quality: u8,
    /// SAM flags.
    pub flags: u16,
}

impl AlignedRead {
    /// Construct a read, checking that bases, qualities and the CIGAR agree in
    /// length. An empty CIGAR (`*`) is accepted for any number of bases.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        chromosome: &str,
        alignment_start: i64,
        cigar: Vec<CigarOp>,
        bases: &[u8],
        qualities: Vec<u8>,
        mapping_quality: u8,
        flags: u16,
    ) -> Result<Self, ReadError> {
        if bases.len() != qualities.len() {
            return Err(ReadError::QualityLength {
                name: name.to_string(),
                bases: bases.len(),
                qualities: qualities.len(),
            });
        }
        let read = Self {
            name: name.to_string(),
            chromosome: chromosome.to_string(),
            alignment_start,
            cigar,
            bases: bases.to_ascii_uppercase(),
            qualities,
            mapping_quality,
            flags,
        };
        if !read.cigar.is_empty() && read.cigar_read_length() != read.len() {
            return Err(ReadError::CigarLength {
                cigar: read.cigar_read_length(),
                name: read.name,
                bases: read.bases.len(),
            });
        }
        Ok(read)
    }

    /// Number of read bases.
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Whether the read has no bases.
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Number of reference bases spanned by the alignment.
    pub fn reference_length(&self) -> i64 {
        self.cigar
            .iter()
            .filter(|op| op.consumes_ref())
            .map(|op| op.len() as i64)
            .sum()
    }

    /// 1-based position of the last aligned reference base.
    pub fn alignment_end(&self) -> i64 {
        self.alignment_start + self.reference_length().max(1) - 1
    }

    /// Alignment start extended by a leading soft clip.
    pub fn unclipped_start(&self) -> i64 {
        let clipped: usize = self
            .cigar
            .iter()
            .take_while(|op| matches!(op, CigarOp::SoftClip(_) | CigarOp::HardClip(_)))
            .filter(|op| matches!(op, CigarOp::SoftClip(_)))
            .map(|op| op.len())
            .sum();
        self.alignment_start - clipped as i64
    }

    /// Alignment end extended by a trailing soft clip.
    pub fn unclipped_end(&self) -> i64 {
        let clipped: usize = self
            .cigar
            .iter()
            .rev()
            .take_while(|op| matches!(op, CigarOp::SoftClip(_) | CigarOp::HardClip(_)))
            .filter(|op| matches!(op, CigarOp::SoftClip(_)))
            .map(|op| op.len())
            .sum();
        self.alignment_end() + clipped as i64
    }

    /// Number of read bases consumed by the CIGAR.
    fn cigar_read_length(&self) -> usize {
        self.cigar
            .iter()
            .filter(|op| op.consumes_read())
            .map(|op| op.len())
            .sum()
    }

    pub fn is_unmapped(&self) -> bool {
        self.flags & FLAG_UNMAPPED != 0
    }

    pub fn is_secondary(&self) -> bool {
        self.flags & FLAG_SECONDARY != 0
    }

    pub fn is_supplementary(&self) -> bool {
        self.flags & FLAG_SUPPLEMENTARY != 0
    }

    pub fn is_duplicate(&self) -> bool {
        self.flags & FLAG_DUPLICATE != 0
    }

    pub fn is_proper_pair(&self) -> bool {
        self.flags & FLAG_PROPER_PAIR != 0
    }

    /// Minimum base quality over `length` bases starting at `read_index`,
    /// clamped to the end of the read.
    pub fn min_quality(&self, read_index: usize, length: usize) -> u8 {
        let end = (read_index + length).min(self.qualities.len());
        self.qualities
            .get(read_index..end)
            .and_then(|quals| quals.iter().min().copied())
            .unwrap_or(0)
    }
}

/// Access to reference bases by chromosome interval.
pub trait SequenceWindow: Sync {
    /// Bases of the 1-based, fully closed interval `[start, end]`.
    fn lookup_bases(&self, chromosome: &str, start: i64, end: i64)
        -> Result<Vec<u8>, ReferenceError>;

    /// Length of the chromosome.
    fn contig_length(&self, chromosome: &str) -> Result<i64, ReferenceError>;
}

/// Iterator over the reads of one region.
pub type ReadIter<'a> = Box<dyn Iterator<Item = Result<AlignedRead, ReadError>> + 'a>;

/// Region-bounded access to the aligned reads of a sample.
pub trait ReadSource: Sync {
    /// Reads of `sample` overlapping the 1-based interval `[start, end]`.
    fn reads_in_region<'a>(
        &'a self,
        sample: &str,
        chromosome: &str,
        start: i64,
        end: i64,
    ) -> Result<ReadIter<'a>, ReadError>;
}

/// A loaded reference window, indexed by 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSequence {
    /// Chromosome of the window.
    pub chromosome: String,
    /// 1-based position of the first base.
    pub start: i64,
    /// Upper case bases.
    pub bases: Vec<u8>,
}

impl RefSequence {
    /// Construct from already loaded bases.
    pub fn new(chromosome: &str, start: i64, bases: &[u8]) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            start,
            bases: bases.to_ascii_uppercase(),
        }
    }

    /// Load `[start, end]` from the given window.
    pub fn load(
        window: &dyn SequenceWindow,
        chromosome: &str,
        start: i64,
        end: i64,
    ) -> Result<Self, ReferenceError> {
        let bases = window.lookup_bases(chromosome, start, end)?;
        Ok(Self::new(chromosome, start, &bases))
    }

    /// 1-based position of the last base.
    pub fn end(&self) -> i64 {
        self.start + self.bases.len() as i64 - 1
    }

    /// Base at the given position, if loaded.
    pub fn base(&self, position: i64) -> Option<u8> {
        if position < self.start {
            return None;
        }
        self.bases.get((position - self.start) as usize).copied()
    }

    /// Bases of `[start, end]`, if fully loaded.
    pub fn slice(&self, start: i64, end: i64) -> Option<&[u8]> {
        if start < self.start || end > self.end() || end < start {
            return None;
        }
        let offset = (start - self.start) as usize;
        self.bases.get(offset..=offset + (end - start) as usize)
    }
}
