//! Birdwin Core - Windowed Bird Audio Dataset Library
//!
//! Cuts variable-length bird recordings into fixed-length overlapping
//! windows, indexes every window of a corpus split and retrieves them by
//! flat position for training.

pub mod audio;
pub mod batch;
pub mod collate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod index;
pub mod loader;
pub mod window;

pub use batch::{BatchStream, RetrievalStats};
pub use collate::{collate, Batch, BatchItem};
pub use config::{BirdwinConfig, NormalizationConfig};
pub use dataset::{build_split_clips, clip_from_record, Window, WindowedDataset};
pub use error::{Result, WindowError};
pub use features::{FeatureArray, FeatureExtractor, FeatureStats, MelExtractor, RawWaveform};
pub use index::{Clip, CorpusIndex, WindowRef};
pub use loader::{CachedClipSource, ClipSource, FileClipSource, MemoryClipSource};
pub use window::{window, ClipShape, WindowSpec};

use anyhow::Context;
use birdwin_meta::{load_split_ids, LabelMap, MetadataTable, SplitName};

/// Dataset over decoded files, with an LRU clip cache
pub type FileDataset = WindowedDataset<CachedClipSource<FileClipSource>>;

/// An opened corpus split
pub struct SplitDataset {
    pub split: SplitName,
    pub dataset: FileDataset,
    /// Built from the whole metadata table, shared by every split
    pub labels: LabelMap,
    /// Clip ids dropped because their audio file does not exist
    pub missing: Vec<String>,
}

/// Load metadata and the split id list, then index every window of the split
pub fn open_split(config: &BirdwinConfig, split: SplitName) -> anyhow::Result<SplitDataset> {
    let spec = config.window_spec()?;
    let table = MetadataTable::load(&config.data.metadata)?;
    let labels = LabelMap::from_records(table.records());

    let ids = load_split_ids(config.split_path(split))?;
    let records = table.subset(&ids);
    log::info!(
        "Split {}: {} ids, {} with metadata, {} species overall",
        split,
        ids.len(),
        records.len(),
        labels.len()
    );

    let split_clips = build_split_clips(
        &records,
        &config.data.audio_dir,
        config.audio.sample_rate,
        &labels,
        config.data.skip_missing,
    )?;
    if !split_clips.missing.is_empty() {
        log::warn!(
            "Split {}: skipped {} clips with missing audio",
            split,
            split_clips.missing.len()
        );
    }

    let index = CorpusIndex::build(split_clips.clips, spec)
        .with_context(|| format!("Failed to index split {}", split))?;
    let source = CachedClipSource::new(
        FileClipSource::new(config.audio.sample_rate),
        config.loader.cache_capacity,
    );
    let dataset = WindowedDataset::new(index, source).verify_counts(config.loader.verify_counts);

    Ok(SplitDataset {
        split,
        dataset,
        labels,
        missing: split_clips.missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("birdwin-open-split-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("audio")).unwrap();
        std::fs::create_dir_all(dir.join("splits")).unwrap();

        std::fs::write(
            dir.join("metadata.csv"),
            "clip_id,filename,species_code,duration_s,secondary_labels\n\
             c1,c1.wav,norcar,2.0,\n\
             c2,c2.wav,amerob,3.0,norcar\n",
        )
        .unwrap();
        std::fs::write(dir.join("splits/train_ids.txt"), "c1\nc2\n").unwrap();

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(dir.join("audio/c1.wav"), spec).unwrap();
        for i in 0..16000 {
            writer.write_sample(((i % 100) as i16 - 50) * 100).unwrap();
        }
        writer.finalize().unwrap();
        dir
    }

    #[test]
    fn test_open_split_skips_missing_audio() {
        let dir = fixture_dir();
        let mut config = BirdwinConfig::default();
        config.audio.sample_rate = 8000;
        config.audio.window_seconds = 1.0;
        config.audio.hop_seconds = 0.5;
        config.features.fmax = 4000.0;
        config.data.metadata = dir.join("metadata.csv");
        config.data.audio_dir = dir.join("audio");
        config.data.splits.train = dir.join("splits/train_ids.txt");
        config.validate().unwrap();

        let opened = open_split(&config, SplitName::Train).unwrap();
        assert_eq!(opened.missing, vec!["c2".to_string()]);
        assert_eq!(opened.labels.len(), 2);
        assert_eq!(opened.labels.index_of("norcar"), Some(1));

        // 16000 samples, W = 8000, H = 4000: starts 0, 4000, 8000
        let dataset = &opened.dataset;
        assert_eq!(dataset.len(), 3);
        let last = dataset.get(2).unwrap();
        assert_eq!(last.start, 8000);
        assert_eq!(last.samples.len(), 8000);
        assert_eq!(last.labels, vec![1]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
