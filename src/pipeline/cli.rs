//! Implementation of the `region call` subcommand.

use std::io::Write;

use thousands::Separable;

use crate::{
    common::{self, build_chrom_map, chrom_sort_key, ChrRegion},
    config::Config,
    reads::memory::RegionFixture,
    tier::PanelTiers,
    variant::VariantRecord,
};

use super::{call_regions, split_region, RegionPipeline, Samples};

/// Command line arguments for the `region call` subcommand.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "call somatic variants from a region fixture", long_about = None)]
pub struct Args {
    /// Region fixture with reference, reads, hotspots and panel as JSON, or @ with
    /// path to (gzip-compressed) JSON file.
    #[arg(long)]
    pub fixture: String,
    /// Name of tumor sample; the first one is used for candidate discovery.
    #[arg(long, required = true)]
    pub tumor: Vec<String>,
    /// Name of the normal sample.
    #[arg(long)]
    pub normal: Option<String>,
    /// Region(s) to call as `CHROM:START-END`; defaults to all contigs.
    #[arg(long)]
    pub region: Vec<ChrRegion>,
    /// Configuration as JSON or @ with path to JSON file; defaults apply if empty.
    #[arg(long, default_value = "")]
    pub config: String,
    /// Path to output JSONL file, gzip-compressed if ending in `.gz`.
    #[arg(long)]
    pub path_output: String,
    /// Number of threads to use, defaults to the number of CPUs.
    #[arg(long)]
    pub num_threads: Option<usize>,
    /// Maximal length of a region processed at once.
    #[arg(long, default_value_t = 100_000)]
    pub max_region_len: i64,
}

/// First line of the output file.
#[derive(Debug, serde::Serialize)]
struct OutputHeader<'a> {
    worker_version: &'a str,
    tumor: &'a [String],
    normal: Option<&'a str>,
    regions: usize,
}

/// Regions to call: the given ones or whole contigs, optionally limited to the
/// panel, split into chunks.
fn build_regions(
    args: &Args,
    fixture: &RegionFixture,
    config: &Config,
    tiers: &PanelTiers,
) -> Vec<ChrRegion> {
    let regions = if args.region.is_empty() {
        let chrom_map = build_chrom_map();
        let mut contigs = fixture
            .reference
            .iter()
            .map(|(name, seq)| ChrRegion::new(name, 1, seq.len() as i64))
            .collect::<Vec<_>>();
        contigs.sort_by(|lhs, rhs| {
            chrom_sort_key(&chrom_map, &lhs.chromosome)
                .cmp(&chrom_sort_key(&chrom_map, &rhs.chromosome))
        });
        contigs
    } else {
        args.region.clone()
    };

    regions
        .iter()
        .flat_map(|region| split_region(region, args.max_region_len))
        .filter(|region| !config.panel_only || tiers.panel_overlaps(region))
        .collect()
}

/// Write header and records as JSON lines.
fn write_records(
    path: &str,
    header: &OutputHeader,
    records: &[VariantRecord],
) -> Result<(), anyhow::Error> {
    let mut writer = common::io::open_write_maybe_gz(path)
        .map_err(|e| anyhow::anyhow!("could not open output file {}: {}", path, e))?;
    serde_json::to_writer(&mut writer, header)
        .map_err(|e| anyhow::anyhow!("could not write header: {}", e))?;
    writeln!(writer)?;
    for record in records {
        serde_json::to_writer(&mut writer, record)
            .map_err(|e| anyhow::anyhow!("could not write record: {}", e))?;
        writeln!(writer)?;
    }
    writer
        .flush()
        .map_err(|e| anyhow::anyhow!("could not flush output file {}: {}", path, e))?;
    Ok(())
}

/// Main entry point for `region call` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:#?}", &args_common);
    tracing::info!("args = {:#?}", &args);

    let config = Config::load(&args.config)?;
    tracing::debug!("config = {:#?}", &config);

    tracing::info!("loading region fixture...");
    let fixture: RegionFixture = common::load_json_arg(&args.fixture)
        .map_err(|e| anyhow::anyhow!("could not load region fixture: {}", e))?;
    let (reference, reads) = fixture
        .build()
        .map_err(|e| anyhow::anyhow!("invalid reads in region fixture: {}", e))?;
    let tiers = PanelTiers::new(&fixture.hotspots, &fixture.panel);
    let regions = build_regions(args, &fixture, &config, &tiers);
    tracing::info!(
        "... done loading fixture with {} hotspots and {} panel regions",
        fixture.hotspots.len().separate_with_commas(),
        fixture.panel.len().separate_with_commas()
    );

    let samples = Samples {
        tumor: args.tumor.clone(),
        normal: args.normal.clone(),
    };
    let pipeline = RegionPipeline::new(&config, &reference, &reads, &tiers, &samples);

    tracing::info!("calling {} regions...", regions.len().separate_with_commas());
    let before_calling = std::time::Instant::now();
    let records = if let Some(num_threads) = args.num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| anyhow::anyhow!("building Rayon thread pool failed: {}", e))?
            .install(|| call_regions(&pipeline, &regions))
    } else {
        call_regions(&pipeline, &regions)
    }
    .map_err(|e| anyhow::anyhow!("calling regions failed: {}", e))?;
    tracing::info!(
        "... done calling {} records ({} passing) in {:?}",
        records.len().separate_with_commas(),
        records
            .iter()
            .filter(|record| record.is_pass())
            .count()
            .separate_with_commas(),
        before_calling.elapsed()
    );

    tracing::info!("writing output...");
    let header = OutputHeader {
        worker_version: common::worker_version(),
        tumor: &args.tumor,
        normal: args.normal.as_deref(),
        regions: regions.len(),
    };
    write_records(&args.path_output, &header, &records)?;

    tracing::info!(
        "All of `region call` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
