//! Corpus index
//!
//! Maps a flat, zero-based position to a window descriptor across every clip
//! of a split. Window counts come from metadata durations, so no audio is
//! decoded while the index is built.

use crate::error::{Result, WindowError};
use crate::window::WindowSpec;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// A registered source recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    pub path: PathBuf,
    /// Duration in samples at the corpus sample rate
    pub duration_samples: usize,
    /// Label indices, primary label first
    pub labels: Vec<usize>,
}

impl Clip {
    pub fn new(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        duration_samples: usize,
        labels: Vec<usize>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            duration_samples,
            labels,
        }
    }

    /// Primary label
    pub fn label(&self) -> Option<usize> {
        self.labels.first().copied()
    }
}

/// Descriptor of one not-yet-materialized window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRef {
    /// Position of the clip in the index's clip table
    pub clip_index: usize,
    /// Window number within the clip
    pub window_index: usize,
    /// Start offset in samples, computed from the metadata duration
    ///
    /// A tail window's start depends on the clip length, so when decoded
    /// audio differs slightly from the metadata while yielding the same
    /// window count, the retrieved [`Window::start`](crate::Window::start)
    /// is the authoritative offset.
    pub start: usize,
    /// Window length in samples
    pub length: usize,
    /// Anchored to the clip end rather than the stride grid
    pub is_tail: bool,
}

/// Flat, deterministic table of every window in a split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusIndex {
    spec: WindowSpec,
    clips: Vec<Clip>,
    refs: Vec<WindowRef>,
    /// First flat position of each clip, plus the total length
    clip_offsets: Vec<usize>,
}

impl CorpusIndex {
    /// Build the index from clips in input order
    pub fn build(clips: Vec<Clip>, spec: WindowSpec) -> Result<Self> {
        let mut seen = HashSet::with_capacity(clips.len());
        let mut refs = Vec::new();
        let mut clip_offsets = Vec::with_capacity(clips.len() + 1);

        for (clip_index, clip) in clips.iter().enumerate() {
            if !seen.insert(clip.id.as_str()) {
                return Err(WindowError::integrity(&clip.id, "duplicate clip id"));
            }
            if clip.duration_samples == 0 {
                return Err(WindowError::integrity(
                    &clip.id,
                    "recorded duration is 0 samples",
                ));
            }

            clip_offsets.push(refs.len());

            let len = clip.duration_samples;
            let count = spec.window_count(len);
            let has_tail = spec.needs_tail(len);
            for window_index in 0..count {
                let start = spec
                    .window_start(len, window_index)
                    .ok_or_else(|| WindowError::integrity(&clip.id, "window start out of range"))?;
                refs.push(WindowRef {
                    clip_index,
                    window_index,
                    start,
                    length: spec.window_length(),
                    is_tail: has_tail && window_index == count - 1,
                });
            }

            log::debug!(
                "Indexed clip {}: {} samples -> {} windows",
                clip.id,
                len,
                count
            );
        }
        clip_offsets.push(refs.len());

        log::info!(
            "Built corpus index: {} clips, {} windows (window {} / hop {} samples)",
            clips.len(),
            refs.len(),
            spec.window_length(),
            spec.hop_length()
        );

        Ok(Self {
            spec,
            clips,
            refs,
            clip_offsets,
        })
    }

    pub fn spec(&self) -> &WindowSpec {
        &self.spec
    }

    /// Total number of windows
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, clip_index: usize) -> Option<&Clip> {
        self.clips.get(clip_index)
    }

    /// All window descriptors in flat order
    pub fn refs(&self) -> &[WindowRef] {
        &self.refs
    }

    /// Resolve a flat position
    pub fn get(&self, position: usize) -> Result<&WindowRef> {
        self.refs.get(position).ok_or(WindowError::NotFound {
            position,
            len: self.refs.len(),
        })
    }

    /// Flat positions belonging to a clip
    pub fn positions_of(&self, clip_index: usize) -> Range<usize> {
        match (
            self.clip_offsets.get(clip_index),
            self.clip_offsets.get(clip_index + 1),
        ) {
            (Some(&start), Some(&end)) => start..end,
            _ => 0..0,
        }
    }

    /// Windows the metadata duration accounts for
    pub fn window_count(&self, clip_index: usize) -> usize {
        self.positions_of(clip_index).len()
    }

    /// Check a decoded waveform length against the indexed window count
    pub fn verify_materialized(&self, clip_index: usize, decoded_len: usize) -> Result<()> {
        let clip = self.clips.get(clip_index).ok_or(WindowError::NotFound {
            position: clip_index,
            len: self.clips.len(),
        })?;
        let indexed = self.window_count(clip_index);
        let materialized = self.spec.window_count(decoded_len);
        if indexed != materialized {
            return Err(WindowError::integrity(
                &clip.id,
                format!(
                    "metadata duration of {} samples gives {} windows, \
                     decoded audio of {} samples gives {}",
                    clip.duration_samples, indexed, decoded_len, materialized
                ),
            ));
        }
        Ok(())
    }

    /// Save the index with bincode
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create index file: {}", path.display()))?;
        bincode::serialize_into(std::io::BufWriter::new(file), self)
            .with_context(|| format!("Failed to write index file: {}", path.display()))?;
        Ok(())
    }

    /// Load an index written by [`CorpusIndex::save`]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open index file: {}", path.display()))?;
        let index: CorpusIndex = bincode::deserialize_from(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse index file: {}", path.display()))?;
        Ok(index)
    }
}
