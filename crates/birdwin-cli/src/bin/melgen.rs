//! melgen - Precompute mel features for every window of a split
//!
//! Usage: melgen --config <toml> --split <name> --out <dir> [--compress]
//!
//! Writes one `.mwin` file per clip and a `manifest.json` into `<dir>`.

use anyhow::{Context, Result};
use birdwin_cli::output::print_json;
use birdwin_core::{open_split, BirdwinConfig, FeatureExtractor, FileDataset, MelExtractor};
use birdwin_meta::SplitName;
use birdwin_store::{
    store_file_name, ManifestEntry, SplitManifest, StoreFile, StoreMetadata, StoreWriter,
};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "melgen")]
#[command(about = "Generate mel feature stores for a corpus split", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Split to process (train, val, test_ood)
    #[arg(short, long)]
    split: String,

    /// Output directory for .mwin files
    #[arg(short, long)]
    out: PathBuf,

    /// Compress payloads with zstd
    #[arg(long)]
    compress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct MelgenSummary {
    split: String,
    clips_written: usize,
    windows: usize,
    feature_shape: Vec<usize>,
    skipped: Vec<String>,
    missing_audio: Vec<String>,
    manifest: String,
}

enum ClipOutcome {
    Written(ManifestEntry),
    Skipped(String),
}

fn main() -> Result<()> {
    let args = Args::parse();
    birdwin_cli::init_logger(args.verbose);

    let split: SplitName = args.split.parse()?;
    let config = BirdwinConfig::load(&args.config)?;
    let opened = open_split(&config, split)?;
    let dataset = &opened.dataset;
    let spec = *dataset.index().spec();

    let extractor = MelExtractor::new(&config.features, config.audio.sample_rate)?
        .with_normalization(config.normalization);
    let feature_shape = extractor.output_shape(spec.window_length());

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory: {}", args.out.display()))?;

    let start = std::time::Instant::now();
    let outcomes: Vec<ClipOutcome> = (0..dataset.index().clips().len())
        .into_par_iter()
        .map(|i| process_clip(dataset, &extractor, i, &args.out, args.compress))
        .collect::<Result<_>>()?;

    let mut manifest = SplitManifest::new(
        split.to_string(),
        config.audio.sample_rate,
        spec.window_length(),
        spec.hop_length(),
        feature_shape.clone(),
    );
    for outcome in outcomes {
        match outcome {
            ClipOutcome::Written(entry) => manifest.clips.push(entry),
            ClipOutcome::Skipped(clip_id) => manifest.skipped.push(clip_id),
        }
    }

    let manifest_path = args.out.join("manifest.json");
    manifest.save(&manifest_path)?;

    log::info!(
        "Wrote {} windows from {} clips in {:.2}s ({} skipped)",
        manifest.total_windows(),
        manifest.clips.len(),
        start.elapsed().as_secs_f64(),
        manifest.skipped.len()
    );

    print_json(&MelgenSummary {
        split: split.to_string(),
        clips_written: manifest.clips.len(),
        windows: manifest.total_windows(),
        feature_shape,
        skipped: manifest.skipped.clone(),
        missing_audio: opened.missing.clone(),
        manifest: manifest_path.display().to_string(),
    });
    Ok(())
}

fn process_clip(
    dataset: &FileDataset,
    extractor: &MelExtractor,
    clip_index: usize,
    out_dir: &Path,
    compress: bool,
) -> Result<ClipOutcome> {
    let index = dataset.index();
    let clip = &index.clips()[clip_index];
    let file = store_file_name(&clip.id)?;

    let windows = match dataset.clip_windows(clip_index) {
        Ok(windows) => windows,
        Err(e) if e.is_recoverable() => {
            log::warn!("Skipping clip {}: {}", clip.id, e);
            return Ok(ClipOutcome::Skipped(clip.id.clone()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut features = Vec::new();
    let mut frame_shape = Vec::new();
    for window in &windows {
        let array = extractor.extract(&window.samples)?;
        frame_shape = array.shape;
        features.extend(array.data);
    }
    let (n_mels, n_frames) = match frame_shape.as_slice() {
        [m, f] => (*m, *f),
        _ => anyhow::bail!("Unexpected feature shape {:?} for clip {}", frame_shape, clip.id),
    };

    let metadata = StoreMetadata {
        clip_id: clip.id.clone(),
        labels: clip.labels.clone(),
        window_starts: windows.iter().map(|w| w.start).collect(),
        window_length: index.spec().window_length(),
        hop_length: index.spec().hop_length(),
    };
    let sample_rate = dataset.source().inner().sample_rate();
    let store = StoreFile::new(metadata, n_mels, n_frames, sample_rate, features)?;

    StoreWriter::new().write(&out_dir.join(&file), &store, compress)?;
    log::debug!("Wrote {} ({} windows)", file, windows.len());

    Ok(ClipOutcome::Written(ManifestEntry {
        clip_id: clip.id.clone(),
        file,
        num_windows: windows.len(),
    }))
}
