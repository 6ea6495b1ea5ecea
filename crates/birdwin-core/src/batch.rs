//! Batched iteration over a windowed dataset
//!
//! Each batch is retrieved and featurized in parallel. Windows whose clip
//! cannot be loaded are skipped and recorded; any other error ends the
//! stream after being yielded once.

use crate::collate::{collate, Batch, BatchItem};
use crate::dataset::WindowedDataset;
use crate::error::{Result, WindowError};
use crate::features::FeatureExtractor;
use crate::loader::ClipSource;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters shared by the retrieval workers
#[derive(Debug, Default)]
pub struct RetrievalStats {
    retrieved: AtomicUsize,
    skipped: AtomicUsize,
    skipped_clips: Mutex<Vec<String>>,
}

impl RetrievalStats {
    pub fn retrieved(&self) -> usize {
        self.retrieved.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Distinct clip ids that failed to load, in first-failure order
    pub fn skipped_clips(&self) -> Vec<String> {
        self.skipped_clips.lock().clone()
    }

    fn record_skip(&self, clip_id: &str) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        let mut clips = self.skipped_clips.lock();
        if !clips.iter().any(|c| c == clip_id) {
            clips.push(clip_id.to_string());
        }
    }
}

/// Iterator of collated batches
pub struct BatchStream<'a, S, E: ?Sized> {
    dataset: &'a WindowedDataset<S>,
    extractor: &'a E,
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    num_classes: usize,
    failed: bool,
    stats: RetrievalStats,
}

impl<'a, S, E> BatchStream<'a, S, E>
where
    S: ClipSource,
    E: FeatureExtractor + ?Sized,
{
    /// Sequential order over every position of the dataset
    pub fn new(
        dataset: &'a WindowedDataset<S>,
        extractor: &'a E,
        batch_size: usize,
        num_classes: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(WindowError::InvalidConfig(
                "batch size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            dataset,
            extractor,
            order: (0..dataset.len()).collect(),
            cursor: 0,
            batch_size,
            num_classes,
            failed: false,
            stats: RetrievalStats::default(),
        })
    }

    /// Visit positions in a seeded random order
    pub fn shuffled(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.order.shuffle(&mut rng);
        self
    }

    /// Positions in visiting order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn stats(&self) -> &RetrievalStats {
        &self.stats
    }

    /// Number of batches left, assuming nothing is skipped
    pub fn remaining_batches(&self) -> usize {
        let left = self.order.len().saturating_sub(self.cursor);
        left.div_ceil(self.batch_size)
    }

    fn fetch(&self, position: usize) -> Result<Option<BatchItem>> {
        let window = match self.dataset.get(position) {
            Ok(window) => window,
            Err(e) if e.is_recoverable() => {
                log::warn!("Skipping window {}: {}", position, e);
                if let Some(clip_id) = e.clip_id() {
                    self.stats.record_skip(clip_id);
                }
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let features = self.extractor.extract(&window.samples)?;
        self.stats.retrieved.fetch_add(1, Ordering::Relaxed);
        Ok(Some(BatchItem {
            features,
            labels: window.labels,
            clip_id: window.clip_id,
            window_index: window.window_index,
        }))
    }
}

impl<'a, S, E> Iterator for BatchStream<'a, S, E>
where
    S: ClipSource,
    E: FeatureExtractor + ?Sized,
{
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && self.cursor < self.order.len() {
            let end = (self.cursor + self.batch_size).min(self.order.len());
            let positions = &self.order[self.cursor..end];
            self.cursor = end;

            let fetched: Result<Vec<Option<BatchItem>>> =
                positions.par_iter().map(|&p| self.fetch(p)).collect();

            let items: Vec<BatchItem> = match fetched {
                Ok(items) => items.into_iter().flatten().collect(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            if items.is_empty() {
                continue;
            }

            let batch = collate(items, self.num_classes);
            if batch.is_err() {
                self.failed = true;
            }
            return Some(batch);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::RawWaveform;
    use crate::index::{Clip, CorpusIndex};
    use crate::loader::MemoryClipSource;
    use crate::window::WindowSpec;

    fn dataset(include_broken: bool) -> WindowedDataset<MemoryClipSource> {
        let spec = WindowSpec::new(10, 5).unwrap();
        let mut clips = vec![
            Clip::new("a", "a.wav", 10, vec![0]),
            Clip::new("b", "b.wav", 30, vec![1, 0]),
            Clip::new("c", "c.wav", 4, vec![2]),
        ];
        let mut source = MemoryClipSource::new();
        source.insert("a", vec![1.0; 10]);
        source.insert("b", vec![2.0; 30]);
        source.insert("c", vec![3.0; 4]);
        if include_broken {
            // never inserted into the source
            clips.insert(1, Clip::new("gone", "gone.wav", 12, vec![0]));
        }
        WindowedDataset::new(CorpusIndex::build(clips, spec).unwrap(), source)
    }

    #[test]
    fn test_sequential_batches() {
        let dataset = dataset(false);
        // a: 1, b: 5, c: 1
        assert_eq!(dataset.len(), 7);

        let stream = BatchStream::new(&dataset, &RawWaveform, 3, 3).unwrap();
        assert_eq!(stream.remaining_batches(), 3);
        let batches: Vec<Batch> = stream.map(|b| b.unwrap()).collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].feature_shape, vec![3, 10]);
        assert_eq!(batches[0].clip_ids, vec!["a", "b", "b"]);
        assert_eq!(batches[0].window_indices, vec![0, 0, 1]);
        assert_eq!(batches[2].feature_shape, vec![1, 10]);
        assert_eq!(batches[2].class_ids, vec![2]);
        // short clip is zero-padded
        assert_eq!(
            batches[2].item_features(0).unwrap(),
            &[3.0, 3.0, 3.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_shuffled_order_is_reproducible_permutation() {
        let dataset = dataset(false);
        let a = BatchStream::new(&dataset, &RawWaveform, 2, 3).unwrap().shuffled(42);
        let b = BatchStream::new(&dataset, &RawWaveform, 2, 3).unwrap().shuffled(42);
        assert_eq!(a.order(), b.order());

        let mut sorted = a.order().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..7).collect::<Vec<_>>());

        let total: usize = a.map(|batch| batch.unwrap().len()).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn test_unavailable_clip_is_skipped() {
        let dataset = dataset(true);
        // a: 1, gone: 1, b: 5, c: 1
        assert_eq!(dataset.len(), 8);

        let mut stream = BatchStream::new(&dataset, &RawWaveform, 4, 3).unwrap();
        let mut seen = 0;
        for batch in stream.by_ref() {
            seen += batch.unwrap().len();
        }
        assert_eq!(seen, 7);
        assert_eq!(stream.stats().retrieved(), 7);
        assert_eq!(stream.stats().skipped(), 1);
        assert_eq!(stream.stats().skipped_clips(), vec!["gone".to_string()]);
    }

    #[test]
    fn test_integrity_error_stops_stream() {
        let spec = WindowSpec::new(10, 5).unwrap();
        let clips = vec![
            Clip::new("ok", "ok.wav", 10, vec![0]),
            Clip::new("stale", "stale.wav", 30, vec![0]),
        ];
        let mut source = MemoryClipSource::new();
        source.insert("ok", vec![0.5; 10]);
        source.insert("stale", vec![0.5; 10]);
        let dataset = WindowedDataset::new(CorpusIndex::build(clips, spec).unwrap(), source);

        let mut stream = BatchStream::new(&dataset, &RawWaveform, 2, 1).unwrap();
        let first = stream.next().unwrap();
        assert!(matches!(first, Err(WindowError::DataIntegrity { .. })));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dataset = dataset(false);
        assert!(BatchStream::new(&dataset, &RawWaveform, 0, 3).is_err());
    }
}
