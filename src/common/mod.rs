//! Common functionality.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use indexmap::IndexMap;

use crate::err::ArgError;

pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Definition of canonical chromosome names.
pub const CHROMS: &[&str] = &[
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16", "17",
    "18", "19", "20", "21", "22", "X", "Y", "M",
];

/// Build mapping of chromosome names to chromosome counts.
pub fn build_chrom_map() -> IndexMap<String, usize> {
    let mut result = IndexMap::new();
    for (i, &chrom_name) in CHROMS.iter().enumerate() {
        result.insert(chrom_name.to_owned(), i);
        result.insert(format!("chr{chrom_name}").to_owned(), i);
    }
    result.insert("MT".to_owned(), 24);
    result.insert("chrMT".to_owned(), 24);
    result
}

/// Sort key of a chromosome name; canonical chromosomes come first, all other
/// contigs after them in lexicographic order.
pub fn chrom_sort_key<'a>(chrom_map: &IndexMap<String, usize>, name: &'a str) -> (usize, &'a str) {
    match chrom_map.get(name) {
        Some(idx) => (*idx, ""),
        None => (CHROMS.len(), name),
    }
}

/// Classification of chromosomes into autosomes, allosomes and the mitochondrial
/// genome.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Chrom {
    Auto,
    X,
    Y,
    MT,
}

impl Chrom {
    /// Whether the chromosome is one of the sex chromosomes.
    pub fn is_allosome(&self) -> bool {
        matches!(self, Chrom::X | Chrom::Y)
    }
}

impl std::str::FromStr for Chrom {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.strip_prefix("chr").unwrap_or(s) {
            "X" | "x" => Chrom::X,
            "Y" | "y" => Chrom::Y,
            "M" | "MT" | "m" | "mt" => Chrom::MT,
            _ => Chrom::Auto,
        })
    }
}

impl From<&str> for Chrom {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(chrom) => chrom,
            Err(infallible) => match infallible {},
        }
    }
}

/// A 1-based, fully closed interval on one chromosome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChrRegion {
    /// Chromosome name.
    pub chromosome: String,
    /// 1-based start position.
    pub start: i64,
    /// 1-based end position (inclusive).
    pub end: i64,
}

impl ChrRegion {
    /// Construct new region.
    pub fn new(chromosome: &str, start: i64, end: i64) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            start,
            end,
        }
    }

    /// Whether `position` lies within the region.
    pub fn contains(&self, position: i64) -> bool {
        self.start <= position && position <= self.end
    }

    /// Whether the interval `[start, end]` on the same chromosome overlaps.
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        start <= self.end && end >= self.start
    }

    /// Split into consecutive regions of at most `max_len` positions.
    pub fn split(&self, max_len: i64) -> Vec<ChrRegion> {
        let max_len = max_len.max(1);
        let mut result = Vec::new();
        let mut start = self.start;
        while start <= self.end {
            let end = (start + max_len - 1).min(self.end);
            result.push(ChrRegion::new(&self.chromosome, start, end));
            start = end + 1;
        }
        result
    }
}

impl std::fmt::Display for ChrRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

impl std::str::FromStr for ChrRegion {
    type Err = ArgError;

    /// Parse from `CHROM:START-END`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chromosome, range) = s.rsplit_once(':').ok_or(ArgError::IntervalInvalidFormat)?;
        let (start, end) = range
            .split_once('-')
            .ok_or(ArgError::IntervalInvalidFormat)?;
        if chromosome.is_empty() {
            return Err(ArgError::IntervalInvalidFormat);
        }
        let start: i64 = start.replace(',', "").parse()?;
        let end: i64 = end.replace(',', "").parse()?;
        if start < 1 || end < start {
            return Err(ArgError::IntervalInvalidRange);
        }
        Ok(ChrRegion::new(chromosome, start, end))
    }
}

impl serde::Serialize for ChrRegion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ChrRegion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Serialize a base sequence as a string rather than a list of integers.
pub fn serialize_bases<S>(bases: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&String::from_utf8_lossy(bases))
}

/// Load a JSON value from a string or, with a leading `@`, from the file with
/// the given (optionally gzip-compressed) path.
pub fn load_json_arg<T>(param: &str) -> Result<T, anyhow::Error>
where
    T: serde::de::DeserializeOwned,
{
    if let Some(path) = param.strip_prefix('@') {
        let reader = io::open_read_maybe_gz(path)
            .map_err(|e| anyhow::anyhow!("failed to open JSON file {}: {}", path, e))?;
        serde_json::from_reader(reader)
            .map_err(|e| anyhow::anyhow!("failed to parse JSON file {}: {}", path, e))
    } else {
        serde_json::from_str(param).map_err(|e| anyhow::anyhow!("failed to parse JSON: {}", e))
    }
}

/// Return the version of the `somvar-worker` crate and `x.y.z` in tests.
pub fn worker_version() -> &'static str {
    if cfg!(test) {
        "x.y.z"
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest::rstest]
    #[case("chr1:100-200", Ok(ChrRegion::new("chr1", 100, 200)))]
    #[case("X:1,000-2,000", Ok(ChrRegion::new("X", 1000, 2000)))]
    #[case("HLA-A*01:01:1-5", Ok(ChrRegion::new("HLA-A*01:01", 1, 5)))]
    #[case("chr1", Err(ArgError::IntervalInvalidFormat))]
    #[case("chr1:200-100", Err(ArgError::IntervalInvalidRange))]
    fn parse_region(#[case] s: &str, #[case] expected: Result<ChrRegion, ArgError>) {
        assert_eq!(s.parse::<ChrRegion>(), expected);
    }

    #[test]
    fn parse_region_invalid_ints() {
        assert!(matches!(
            "chr1:a-b".parse::<ChrRegion>(),
            Err(ArgError::IntervalInvalidInts(_))
        ));
    }

    #[test]
    fn split_region() {
        let region = ChrRegion::new("1", 1, 25);
        assert_eq!(
            region.split(10),
            vec![
                ChrRegion::new("1", 1, 10),
                ChrRegion::new("1", 11, 20),
                ChrRegion::new("1", 21, 25),
            ]
        );
        assert_eq!(region.split(100), vec![region.clone()]);
    }

    #[test]
    fn overlaps_region() {
        let region = ChrRegion::new("1", 10, 20);
        assert!(region.overlaps(15, 30));
        assert!(region.overlaps(1, 10));
        assert!(!region.overlaps(21, 30));
        assert!(region.contains(20));
        assert!(!region.contains(9));
    }

    #[rstest::rstest]
    #[case("chrX", Chrom::X)]
    #[case("Y", Chrom::Y)]
    #[case("chrM", Chrom::MT)]
    #[case("MT", Chrom::MT)]
    #[case("17", Chrom::Auto)]
    fn chrom_from_str(#[case] name: &str, #[case] expected: Chrom) {
        assert_eq!(Chrom::from(name), expected);
    }

    #[test]
    fn chrom_sort_order() {
        let chrom_map = build_chrom_map();
        let mut names = vec!["chrX", "chr10", "chrUn_gl000220", "chr2", "chrM"];
        names.sort_by_key(|name| chrom_sort_key(&chrom_map, *name));
        assert_eq!(names, vec!["chr2", "chr10", "chrX", "chrM", "chrUn_gl000220"]);
    }

    #[test]
    fn load_json_arg_from_file() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let path = tmpdir.to_path_buf().join("region.json");
        std::fs::write(&path, r#""chr1:1-10""#)?;

        let inline: ChrRegion = load_json_arg(r#""chr1:1-10""#)?;
        let from_file: ChrRegion = load_json_arg(&format!("@{}", path.display()))?;
        assert_eq!(inline, from_file);

        Ok(())
    }
}
