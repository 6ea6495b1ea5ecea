//! winindex - Build and check the window index of a split
//!
//! Usage: winindex --config <toml> --split <train|val|test_ood> [--verify] [--output <index.bin>]

use anyhow::Result;
use birdwin_cli::output::{print_json, ClipFailure};
use birdwin_core::{open_split, BirdwinConfig, ClipShape, WindowError};
use birdwin_meta::SplitName;
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "winindex")]
#[command(about = "Index the fixed-length windows of a corpus split", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Split to index (train, val, test_ood)
    #[arg(short, long)]
    split: String,

    /// Decode every clip and check its window count against the index
    #[arg(long)]
    verify: bool,

    /// Save the index (bincode) to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Default, Serialize)]
struct ShapeCounts {
    short: usize,
    near_exact: usize,
    long: usize,
}

#[derive(Debug, Serialize)]
struct Verification {
    clips_checked: usize,
    count_mismatches: Vec<ClipFailure>,
    unavailable: Vec<ClipFailure>,
}

#[derive(Debug, Serialize)]
struct IndexSummary {
    split: String,
    window_length: usize,
    hop_length: usize,
    clips: usize,
    windows: usize,
    tail_windows: usize,
    shapes: ShapeCounts,
    missing_audio: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification: Option<Verification>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    birdwin_cli::init_logger(args.verbose);

    let split: SplitName = args.split.parse()?;
    let config = BirdwinConfig::load(&args.config)?;
    let opened = open_split(&config, split)?;
    let dataset = &opened.dataset;
    let index = dataset.index();
    let spec = *index.spec();

    let mut shapes = ShapeCounts::default();
    for clip in index.clips() {
        match spec.classify(clip.duration_samples) {
            ClipShape::Short => shapes.short += 1,
            ClipShape::NearExact => shapes.near_exact += 1,
            ClipShape::Long => shapes.long += 1,
        }
    }

    let verification = if args.verify {
        log::info!("Verifying {} clips", index.clips().len());
        let results: Vec<(String, Option<WindowError>)> = (0..index.clips().len())
            .into_par_iter()
            .map(|i| {
                let clip_id = index.clips()[i].id.clone();
                (clip_id, dataset.clip_windows(i).err())
            })
            .collect();

        let mut count_mismatches = Vec::new();
        let mut unavailable = Vec::new();
        for (clip_id, err) in results.iter().filter_map(|(id, e)| e.as_ref().map(|e| (id, e))) {
            let failure = ClipFailure {
                clip_id: clip_id.clone(),
                error: err.to_string(),
            };
            if err.is_recoverable() {
                log::warn!("Clip {} unavailable: {}", clip_id, err);
                unavailable.push(failure);
            } else {
                log::warn!("Clip {} failed verification: {}", clip_id, err);
                count_mismatches.push(failure);
            }
        }
        Some(Verification {
            clips_checked: results.len(),
            count_mismatches,
            unavailable,
        })
    } else {
        None
    };

    if let Some(path) = &args.output {
        index.save(path)?;
        log::info!("Saved index to {}", path.display());
    }

    let summary = IndexSummary {
        split: split.to_string(),
        window_length: spec.window_length(),
        hop_length: spec.hop_length(),
        clips: index.clips().len(),
        windows: index.len(),
        tail_windows: index.refs().iter().filter(|r| r.is_tail).count(),
        shapes,
        missing_audio: opened.missing.clone(),
        verification,
    };
    print_json(&summary);

    let failed = summary
        .verification
        .as_ref()
        .map_or(false, |v| !v.count_mismatches.is_empty());
    if failed {
        anyhow::bail!("Window counts disagree with decoded audio");
    }
    Ok(())
}
