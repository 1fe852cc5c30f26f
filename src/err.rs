use std::num::ParseIntError;

use crate::common::ChrRegion;

/// Errors when parsing command line arguments.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("Invalid format in interval")]
    IntervalInvalidFormat,
    #[error("Invalid integer coordinates in interval")]
    IntervalInvalidInts(#[from] ParseIntError),
    #[error("Interval end lies before its start")]
    IntervalInvalidRange,
}

/// Errors raised by a `SequenceWindow` implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("Unknown contig {0}")]
    UnknownContig(String),
    #[error("Interval {chromosome}:{start}-{end} lies outside of the loaded window")]
    OutOfWindow {
        chromosome: String,
        start: i64,
        end: i64,
    },
}

/// Errors raised by a `ReadSource` implementation or when building reads.
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("Unknown sample {0}")]
    UnknownSample(String),
    #[error("Invalid CIGAR string {0:?}")]
    InvalidCigar(String),
    #[error("Read {name} has {bases} bases but {qualities} qualities")]
    QualityLength {
        name: String,
        bases: usize,
        qualities: usize,
    },
    #[error("Read {name} has {bases} bases but its CIGAR covers {cigar}")]
    CigarLength {
        name: String,
        cigar: usize,
        bases: usize,
    },
    #[error("Problem reading alignments: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort the processing of one region.
#[derive(thiserror::Error, Debug)]
pub enum RegionError {
    #[error("Could not load reference bases for region {region}: {source}")]
    Reference {
        region: ChrRegion,
        #[source]
        source: ReferenceError,
    },
    #[error("Could not read alignments of sample {sample} in region {region}: {source}")]
    ReadSource {
        sample: String,
        region: ChrRegion,
        #[source]
        source: ReadError,
    },
    #[error("Processing of region {0} was cancelled")]
    Cancelled(ChrRegion),
}

impl RegionError {
    /// Whether the error is the consequence of another region failing.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RegionError::Cancelled(_))
    }
}
