//! splitgen - Stratified train/val/test split generator
//!
//! Usage: splitgen --metadata <csv> --out <dir> [--seed 42] [--train 0.7] [--val 0.15]

use anyhow::{Context, Result};
use birdwin_cli::output::print_json;
use birdwin_meta::{stratified_split, MetadataTable, SplitRatios};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "splitgen")]
#[command(about = "Split clip ids per species into train, val and test_ood", long_about = None)]
struct Args {
    /// Metadata table (CSV)
    #[arg(short, long)]
    metadata: PathBuf,

    /// Output directory for the *_ids.txt files
    #[arg(short, long)]
    out: PathBuf,

    /// Shuffle seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Fraction of each species assigned to train
    #[arg(long, default_value_t = 0.70)]
    train: f64,

    /// Fraction of each species assigned to val
    #[arg(long, default_value_t = 0.15)]
    val: f64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct SplitSummary {
    clips: usize,
    species: usize,
    seed: u64,
    train: usize,
    val: usize,
    test_ood: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    birdwin_cli::init_logger(args.verbose);

    let table = MetadataTable::load(&args.metadata)?;
    let ratios = SplitRatios {
        train: args.train,
        val: args.val,
    };
    let splits = stratified_split(table.records(), ratios, args.seed)?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory: {}", args.out.display()))?;
    splits.write_to_dir(&args.out)?;
    log::info!("Wrote {} ids to {}", splits.total(), args.out.display());

    let species: std::collections::BTreeSet<&str> = table
        .records()
        .iter()
        .map(|r| r.species_code.as_str())
        .collect();

    print_json(&SplitSummary {
        clips: table.len(),
        species: species.len(),
        seed: args.seed,
        train: splits.train.len(),
        val: splits.val.len(),
        test_ood: splits.test_ood.len(),
    });
    Ok(())
}
