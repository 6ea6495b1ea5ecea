//! melstats - Corpus feature statistics for normalization
//!
//! Usage: melstats <store_dir>... [--output normalization.toml]

use anyhow::Result;
use birdwin_cli::output::print_json;
use birdwin_core::FeatureStats;
use birdwin_store::{SplitManifest, StoreReader};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "melstats")]
#[command(about = "Compute mel feature mean and std over feature stores", long_about = None)]
struct Args {
    /// Directories written by melgen (each holding a manifest.json)
    #[arg(required = true)]
    dirs: Vec<PathBuf>,

    /// Write the statistics as a normalization TOML file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct StatsSummary {
    files: usize,
    values: u64,
    mel_mean: f64,
    mel_std: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    birdwin_cli::init_logger(args.verbose);

    let mut files = Vec::new();
    for dir in &args.dirs {
        let manifest = SplitManifest::load(&dir.join("manifest.json"))?;
        log::info!(
            "{}: split {} with {} clips",
            dir.display(),
            manifest.split,
            manifest.clips.len()
        );
        files.extend(manifest.clips.iter().map(|c| dir.join(&c.file)));
    }

    let stats = files
        .par_iter()
        .map(|path| -> Result<FeatureStats> {
            let store = StoreReader::read(path)?;
            let mut stats = FeatureStats::new();
            stats.update(&store.features);
            Ok(stats)
        })
        .try_reduce(FeatureStats::new, |a, b| Ok(a.merge(&b)))?;

    if let Some(path) = &args.output {
        let normalization = stats
            .to_normalization()
            .ok_or_else(|| anyhow::anyhow!("No feature variance found; nothing to normalize"))?;
        normalization.save(path)?;
        log::info!("Saved normalization to {}", path.display());
    }

    print_json(&StatsSummary {
        files: files.len(),
        values: stats.count(),
        mel_mean: stats.mean(),
        mel_std: stats.std(),
    });
    Ok(())
}
