//! Random-access windowed dataset
//!
//! Resolves a flat position through the corpus index, loads the owning clip
//! and cuts out the requested window. Retrieval is a pure function of the
//! position, so any number of worker threads may call [`WindowedDataset::get`].

use crate::error::{Result, WindowError};
use crate::index::{Clip, CorpusIndex};
use crate::loader::ClipSource;
use crate::window::seconds_to_samples;
use birdwin_meta::{ClipRecord, LabelMap};
use std::path::Path;
use std::sync::Arc;

/// One materialized window and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Exactly `window_length` samples
    pub samples: Vec<f32>,
    /// Label indices inherited from the clip, primary label first
    pub labels: Vec<usize>,
    pub clip_id: String,
    /// Window number within the clip
    pub window_index: usize,
    /// Start offset in the decoded waveform
    pub start: usize,
}

impl Window {
    /// Primary label
    pub fn label(&self) -> Option<usize> {
        self.labels.first().copied()
    }
}

/// Corpus index plus a clip source
pub struct WindowedDataset<S> {
    index: Arc<CorpusIndex>,
    source: S,
    verify_counts: bool,
}

impl<S: ClipSource> WindowedDataset<S> {
    pub fn new(index: CorpusIndex, source: S) -> Self {
        Self::with_shared_index(Arc::new(index), source)
    }

    pub fn with_shared_index(index: Arc<CorpusIndex>, source: S) -> Self {
        Self {
            index,
            source,
            verify_counts: true,
        }
    }

    /// Toggle the analytic/materialized window count check
    pub fn verify_counts(mut self, verify: bool) -> Self {
        self.verify_counts = verify;
        self
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Total number of windows
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Materialize the window at a flat position
    pub fn get(&self, position: usize) -> Result<Window> {
        let window_ref = *self.index.get(position)?;
        let clip = self
            .index
            .clip(window_ref.clip_index)
            .ok_or(WindowError::NotFound {
                position,
                len: self.index.len(),
            })?;

        let waveform = self.load_clip(clip)?;
        if self.verify_counts {
            self.index
                .verify_materialized(window_ref.clip_index, waveform.len())?;
        }

        let spec = self.index.spec();
        let start = spec
            .window_start(waveform.len(), window_ref.window_index)
            .ok_or_else(|| {
                WindowError::integrity(
                    &clip.id,
                    format!(
                        "window {} does not exist in decoded audio of {} samples",
                        window_ref.window_index,
                        waveform.len()
                    ),
                )
            })?;
        if start != window_ref.start {
            log::debug!(
                "Clip {} window {}: indexed start {} moved to {} in decoded audio",
                clip.id,
                window_ref.window_index,
                window_ref.start,
                start
            );
        }
        let samples = spec
            .extract(&waveform, window_ref.window_index)
            .ok_or_else(|| WindowError::integrity(&clip.id, "window extraction failed"))?;

        Ok(Window {
            samples,
            labels: clip.labels.clone(),
            clip_id: clip.id.clone(),
            window_index: window_ref.window_index,
            start,
        })
    }

    /// Materialize every window of one clip, checking the indexed count
    pub fn clip_windows(&self, clip_index: usize) -> Result<Vec<Window>> {
        let clip = self.index.clip(clip_index).ok_or(WindowError::NotFound {
            position: clip_index,
            len: self.index.clips().len(),
        })?;

        let waveform = self.load_clip(clip)?;
        self.index.verify_materialized(clip_index, waveform.len())?;

        let spec = self.index.spec();
        let starts = spec.window_starts(waveform.len());
        Ok(spec
            .windows(&waveform)
            .into_iter()
            .zip(starts)
            .enumerate()
            .map(|(window_index, (samples, start))| Window {
                samples,
                labels: clip.labels.clone(),
                clip_id: clip.id.clone(),
                window_index,
                start,
            })
            .collect())
    }

    fn load_clip(&self, clip: &Clip) -> Result<Arc<Vec<f32>>> {
        self.source
            .load(clip)
            .map_err(|source| WindowError::ClipUnavailable {
                clip_id: clip.id.clone(),
                source,
            })
    }
}

/// Convert a metadata row into a clip
pub fn clip_from_record(
    record: &ClipRecord,
    audio_dir: &Path,
    sample_rate: u32,
    labels: &LabelMap,
) -> Result<Clip> {
    let duration_samples = seconds_to_samples(record.duration_s, sample_rate).ok_or_else(|| {
        WindowError::integrity(
            &record.clip_id,
            format!("recorded duration {}s is not positive", record.duration_s),
        )
    })?;

    let primary = labels.index_of(&record.species_code).ok_or_else(|| {
        WindowError::integrity(
            &record.clip_id,
            format!("species {} missing from label map", record.species_code),
        )
    })?;

    let mut clip_labels = vec![primary];
    for secondary in &record.secondary_labels {
        match labels.index_of(secondary) {
            Some(idx) if !clip_labels.contains(&idx) => clip_labels.push(idx),
            Some(_) => {}
            None => log::debug!(
                "Clip {}: secondary label {} not in label map",
                record.clip_id,
                secondary
            ),
        }
    }

    Ok(Clip::new(
        record.clip_id.clone(),
        audio_dir.join(&record.filename),
        duration_samples,
        clip_labels,
    ))
}

/// Clips of a split, and the ids left out because their audio is missing
#[derive(Debug, Clone, Default)]
pub struct SplitClips {
    pub clips: Vec<Clip>,
    pub missing: Vec<String>,
}

/// Convert the metadata rows of a split into clips
pub fn build_split_clips(
    records: &[ClipRecord],
    audio_dir: &Path,
    sample_rate: u32,
    labels: &LabelMap,
    skip_missing: bool,
) -> Result<SplitClips> {
    let mut split = SplitClips::default();
    for record in records {
        let clip = clip_from_record(record, audio_dir, sample_rate, labels)?;
        if skip_missing && !clip.path.exists() {
            log::warn!("Missing file for clip {}: {}", clip.id, clip.path.display());
            split.missing.push(clip.id);
            continue;
        }
        split.clips.push(clip);
    }
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryClipSource;
    use crate::window::WindowSpec;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    fn dataset() -> WindowedDataset<MemoryClipSource> {
        let spec = WindowSpec::new(100, 50).unwrap();
        let clips = vec![
            Clip::new("short", "short.wav", 60, vec![1]),
            Clip::new("long", "long.wav", 320, vec![0, 2]),
        ];
        let mut source = MemoryClipSource::new();
        source.insert("short", ramp(60));
        source.insert("long", ramp(320));
        WindowedDataset::new(CorpusIndex::build(clips, spec).unwrap(), source)
    }

    #[test]
    fn test_get_resolves_positions() {
        let dataset = dataset();
        // short: 1, long: starts 0, 50, 100, 150, 200, tail 220
        assert_eq!(dataset.len(), 7);

        let first = dataset.get(0).unwrap();
        assert_eq!(first.clip_id, "short");
        assert_eq!(first.label(), Some(1));
        assert_eq!(first.samples.len(), 100);
        assert_eq!(&first.samples[..60], &ramp(60)[..]);
        assert!(first.samples[60..].iter().all(|&s| s == 0.0));

        let third = dataset.get(2).unwrap();
        assert_eq!(third.clip_id, "long");
        assert_eq!(third.window_index, 1);
        assert_eq!(third.start, 50);
        assert_eq!(third.samples[0], 50.0);
        assert_eq!(third.labels, vec![0, 2]);

        let tail = dataset.get(6).unwrap();
        assert_eq!(tail.start, 220);
        assert_eq!(*tail.samples.last().unwrap(), 319.0);
    }

    #[test]
    fn test_get_matches_clip_windows() {
        let dataset = dataset();
        let all = dataset.clip_windows(1).unwrap();
        for (offset, window) in all.iter().enumerate() {
            assert_eq!(&dataset.get(1 + offset).unwrap(), window);
        }
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            dataset().get(7),
            Err(WindowError::NotFound { position: 7, len: 7 })
        ));
    }

    #[test]
    fn test_missing_waveform_is_clip_unavailable() {
        let spec = WindowSpec::new(100, 50).unwrap();
        let clips = vec![Clip::new("ghost", "ghost.wav", 60, vec![0])];
        let dataset =
            WindowedDataset::new(CorpusIndex::build(clips, spec).unwrap(), MemoryClipSource::new());

        let err = dataset.get(0).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.clip_id(), Some("ghost"));
    }

    #[test]
    fn test_stale_metadata_detected_on_retrieval() {
        let spec = WindowSpec::new(100, 50).unwrap();
        // metadata claims 320 samples, audio holds 120
        let clips = vec![Clip::new("stale", "stale.wav", 320, vec![0])];
        let mut source = MemoryClipSource::new();
        source.insert("stale", ramp(120));
        let index = CorpusIndex::build(clips, spec).unwrap();

        let dataset = WindowedDataset::new(index.clone(), source.clone());
        assert!(matches!(
            dataset.get(0),
            Err(WindowError::DataIntegrity { .. })
        ));

        let unchecked = WindowedDataset::new(index, source).verify_counts(false);
        assert!(unchecked.get(0).is_ok());
        assert!(matches!(
            unchecked.get(3),
            Err(WindowError::DataIntegrity { .. })
        ));
    }

    #[test]
    fn test_tail_start_follows_decoded_length() {
        let spec = WindowSpec::new(100, 50).unwrap();
        // both lengths give 5 strided windows plus a tail
        let clips = vec![Clip::new("drift", "drift.wav", 320, vec![0])];
        let mut source = MemoryClipSource::new();
        source.insert("drift", ramp(310));
        let dataset = WindowedDataset::new(CorpusIndex::build(clips, spec).unwrap(), source);

        let indexed = *dataset.index().get(5).unwrap();
        assert!(indexed.is_tail);
        assert_eq!(indexed.start, 220);

        let tail = dataset.get(5).unwrap();
        assert_eq!(tail.start, 210);
        assert_eq!(tail.samples[0], 210.0);
        assert_eq!(tail.samples[99], 309.0);

        // strided windows are unaffected
        assert_eq!(dataset.get(4).unwrap().start, indexed.start - 20);
    }

    #[test]
    fn test_clip_from_record() {
        let records = vec![
            ClipRecord {
                clip_id: "XC1".to_string(),
                filename: "XC1.wav".to_string(),
                species_code: "norcar".to_string(),
                duration_s: 5.5,
                secondary_labels: vec!["amerob".to_string(), "unknown".to_string()],
            },
            ClipRecord {
                clip_id: "XC2".to_string(),
                filename: "XC2.wav".to_string(),
                species_code: "amerob".to_string(),
                duration_s: 0.0,
                secondary_labels: Vec::new(),
            },
        ];
        let labels = LabelMap::from_records(&records);

        let clip = clip_from_record(&records[0], Path::new("data/raw"), 32_000, &labels).unwrap();
        assert_eq!(clip.duration_samples, 176_000);
        assert_eq!(clip.labels, vec![1, 0]);
        assert_eq!(clip.path, Path::new("data/raw/XC1.wav"));

        let err = clip_from_record(&records[1], Path::new("data/raw"), 32_000, &labels)
            .unwrap_err();
        assert_eq!(err.clip_id(), Some("XC2"));
    }

    #[test]
    fn test_build_split_clips_skips_missing_files() {
        let dir = std::env::temp_dir().join(format!("birdwin-split-clips-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("XC1.wav"), b"").unwrap();

        let records: Vec<ClipRecord> = ["XC1", "XC2"]
            .iter()
            .map(|id| ClipRecord {
                clip_id: id.to_string(),
                filename: format!("{}.wav", id),
                species_code: "amerob".to_string(),
                duration_s: 3.0,
                secondary_labels: Vec::new(),
            })
            .collect();
        let labels = LabelMap::from_records(&records);

        let split = build_split_clips(&records, &dir, 16_000, &labels, true).unwrap();
        let kept = build_split_clips(&records, &dir, 16_000, &labels, false).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(split.clips.len(), 1);
        assert_eq!(split.missing, vec!["XC2"]);
        assert_eq!(kept.clips.len(), 2);
        assert!(kept.missing.is_empty());
    }
}
