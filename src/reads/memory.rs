//! In-memory reference and alignment adapters, deserialisable from JSON fixtures.

use std::collections::HashMap;

use crate::{
    common::ChrRegion,
    err::{ReadError, ReferenceError},
    tier::Hotspot,
};

use super::{parse_cigar, AlignedRead, ReadIter, ReadSource, SequenceWindow};

/// Reference sequences held fully in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReference {
    contigs: HashMap<String, Vec<u8>>,
}

impl InMemoryReference {
    /// Construct from contig name and bases.
    pub fn new<I, S>(contigs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        Self {
            contigs: contigs
                .into_iter()
                .map(|(name, seq)| {
                    (
                        name.as_ref().to_string(),
                        seq.as_ref().as_bytes().to_ascii_uppercase(),
                    )
                })
                .collect(),
        }
    }

    fn contig(&self, chromosome: &str) -> Result<&[u8], ReferenceError> {
        self.contigs
            .get(chromosome)
            .map(|seq| seq.as_slice())
            .ok_or_else(|| ReferenceError::UnknownContig(chromosome.to_string()))
    }
}

impl SequenceWindow for InMemoryReference {
    fn lookup_bases(
        &self,
        chromosome: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<u8>, ReferenceError> {
        let seq = self.contig(chromosome)?;
        if start < 1 || end < start || end > seq.len() as i64 {
            return Err(ReferenceError::OutOfWindow {
                chromosome: chromosome.to_string(),
                start,
                end,
            });
        }
        Ok(seq[(start - 1) as usize..end as usize].to_vec())
    }

    fn contig_length(&self, chromosome: &str) -> Result<i64, ReferenceError> {
        Ok(self.contig(chromosome)?.len() as i64)
    }
}

/// Aligned reads of several samples held in memory, in source order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReads {
    samples: HashMap<String, Vec<AlignedRead>>,
}

impl InMemoryReads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reads of one sample, replacing earlier ones.
    pub fn insert(&mut self, sample: &str, reads: Vec<AlignedRead>) {
        self.samples.insert(sample.to_string(), reads);
    }

    /// Names of the registered samples.
    pub fn sample_names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(|name| name.as_str())
    }
}

impl ReadSource for InMemoryReads {
    fn reads_in_region<'a>(
        &'a self,
        sample: &str,
        chromosome: &str,
        start: i64,
        end: i64,
    ) -> Result<ReadIter<'a>, ReadError> {
        let reads = self
            .samples
            .get(sample)
            .ok_or_else(|| ReadError::UnknownSample(sample.to_string()))?;
        let chromosome = chromosome.to_string();
        Ok(Box::new(
            reads
                .iter()
                .filter(move |read| {
                    read.chromosome == chromosome
                        && read.unclipped_start() <= end
                        && read.unclipped_end() >= start
                })
                .cloned()
                .map(Ok),
        ))
    }
}

fn default_mapq() -> u8 {
    60
}

fn default_flags() -> u16 {
    super::FLAG_PROPER_PAIR
}

/// Serialised form of one aligned read.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ReadFixture {
    pub name: String,
    pub chromosome: String,
    /// 1-based alignment start.
    pub start: i64,
    pub cigar: String,
    pub bases: String,
    /// Phred qualities; a single value is repeated for every base.
    pub qualities: Vec<u8>,
    #[serde(default = "default_mapq")]
    pub mapq: u8,
    #[serde(default = "default_flags")]
    pub flags: u16,
}

impl TryFrom<&ReadFixture> for AlignedRead {
    type Error = ReadError;

    fn try_from(fixture: &ReadFixture) -> Result<Self, Self::Error> {
        let qualities = match fixture.qualities.as_slice() {
            [quality] => vec![*quality; fixture.bases.len()],
            quals => quals.to_vec(),
        };
        AlignedRead::new(
            &fixture.name,
            &fixture.chromosome,
            fixture.start,
            parse_cigar(&fixture.cigar)?,
            fixture.bases.as_bytes(),
            qualities,
            fixture.mapq,
            fixture.flags,
        )
    }
}

/// Everything needed to call one or more regions without external files.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct RegionFixture {
    /// Contig name to bases.
    pub reference: HashMap<String, String>,
    /// Sample name to reads, in source order.
    pub reads: HashMap<String, Vec<ReadFixture>>,
    /// Known hotspot variants.
    pub hotspots: Vec<Hotspot>,
    /// Panel regions.
    pub panel: Vec<ChrRegion>,
}

impl RegionFixture {
    /// Build the in-memory adapters.
    pub fn build(&self) -> Result<(InMemoryReference, InMemoryReads), ReadError> {
        let reference = InMemoryReference::new(
            self.reference
                .iter()
                .map(|(name, seq)| (name.as_str(), seq.as_str())),
        );
        let mut reads = InMemoryReads::new();
        for (sample, fixtures) in &self.reads {
            let sample_reads = fixtures
                .iter()
                .map(AlignedRead::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            reads.insert(sample, sample_reads);
        }
        Ok((reference, reads))
    }
}
