//! Clip loading
//!
//! [`ClipSource`] is the only I/O boundary of the windowing core: it resolves
//! a clip to its decoded mono waveform. Implementations can be stacked, e.g.
//! a [`CachedClipSource`] in front of a [`FileClipSource`].

use crate::audio::decode_audio;
use crate::index::Clip;
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Resolves a clip to its decoded mono waveform
pub trait ClipSource: Send + Sync {
    fn load(&self, clip: &Clip) -> Result<Arc<Vec<f32>>>;
}

impl<S: ClipSource + ?Sized> ClipSource for Arc<S> {
    fn load(&self, clip: &Clip) -> Result<Arc<Vec<f32>>> {
        (**self).load(clip)
    }
}

impl<S: ClipSource + ?Sized> ClipSource for Box<S> {
    fn load(&self, clip: &Clip) -> Result<Arc<Vec<f32>>> {
        (**self).load(clip)
    }
}

/// Decodes clips from their audio files
#[derive(Debug, Clone)]
pub struct FileClipSource {
    sample_rate: u32,
}

impl FileClipSource {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl ClipSource for FileClipSource {
    fn load(&self, clip: &Clip) -> Result<Arc<Vec<f32>>> {
        let audio = decode_audio(&clip.path, self.sample_rate)?;
        log::debug!(
            "Decoded clip {}: {} samples @ {}Hz",
            clip.id,
            audio.samples.len(),
            audio.sample_rate
        );
        Ok(Arc::new(audio.samples))
    }
}

/// Waveforms held in memory, keyed by clip id
#[derive(Debug, Clone, Default)]
pub struct MemoryClipSource {
    waveforms: HashMap<String, Arc<Vec<f32>>>,
}

impl MemoryClipSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, clip_id: impl Into<String>, waveform: Vec<f32>) {
        self.waveforms.insert(clip_id.into(), Arc::new(waveform));
    }
}

impl ClipSource for MemoryClipSource {
    fn load(&self, clip: &Clip) -> Result<Arc<Vec<f32>>> {
        self.waveforms
            .get(&clip.id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No waveform registered for clip {}", clip.id))
    }
}

struct LruState {
    entries: HashMap<String, Arc<Vec<f32>>>,
    /// Least recently used first
    order: VecDeque<String>,
}

impl LruState {
    fn touch(&mut self, clip_id: &str) {
        if let Some(pos) = self.order.iter().position(|id| id == clip_id) {
            if let Some(id) = self.order.remove(pos) {
                self.order.push_back(id);
            }
        }
    }
}

/// Bounded LRU cache of decoded clips in front of another source
///
/// Overlapping windows of one clip are usually requested close together, so
/// keeping the most recent clips decoded avoids repeated decoding. Decoding
/// happens outside the lock; two threads missing on the same clip may both
/// decode it.
pub struct CachedClipSource<S> {
    inner: S,
    capacity: usize,
    state: Mutex<LruState>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<S: ClipSource> CachedClipSource<S> {
    /// Wrap `inner`; a capacity of 0 disables caching
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            state: Mutex::new(LruState {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of clips currently cached
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    fn insert(&self, clip_id: &str, waveform: Arc<Vec<f32>>) {
        let mut state = self.state.lock();
        if state.entries.contains_key(clip_id) {
            state.touch(clip_id);
            return;
        }
        while state.entries.len() >= self.capacity {
            match state.order.pop_front() {
                Some(evicted) => {
                    state.entries.remove(&evicted);
                    log::debug!("Evicted clip {} from cache", evicted);
                }
                None => break,
            }
        }
        state.entries.insert(clip_id.to_string(), waveform);
        state.order.push_back(clip_id.to_string());
    }
}

impl<S: ClipSource> ClipSource for CachedClipSource<S> {
    fn load(&self, clip: &Clip) -> Result<Arc<Vec<f32>>> {
        if self.capacity == 0 {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return self.inner.load(clip);
        }

        {
            let mut state = self.state.lock();
            if let Some(waveform) = state.entries.get(&clip.id).cloned() {
                state.touch(&clip.id);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(waveform);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let waveform = self.inner.load(clip)?;
        self.insert(&clip.id, Arc::clone(&waveform));
        Ok(waveform)
    }
}
