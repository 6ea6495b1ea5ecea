//! Fixed-length windowing of variable-length clips
//!
//! Every clip becomes one or more windows of exactly `window_length` samples.
//! Short clips are zero-padded on the right, clips within half a hop of the
//! window length are cropped to a single window, and longer clips are strided
//! by `hop_length` with a final window anchored to the clip end whenever the
//! stride would leave trailing audio uncovered.
//!
//! The same arithmetic drives both [`WindowSpec::window_count`] (used by the
//! corpus index on metadata durations) and [`WindowSpec::windows`] (used on
//! decoded audio), so the two can never disagree for the same length.

use crate::error::{Result, WindowError};
use serde::{Deserialize, Serialize};


/// How a clip of a given length is windowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipShape {
    /// Shorter than one window: padded with silence
    Short,
    /// Within half a hop of one window: cropped from the start
    NearExact,
    /// Strided, possibly with a tail window
    Long,
}

/// Window and hop lengths in samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSpec {
    window_length: usize,
    hop_length: usize,
}

impl WindowSpec {
    /// Create a spec from lengths in samples
    pub fn new(window_length: usize, hop_length: usize) -> Result<Self> {
        if window_length == 0 {
            return Err(WindowError::InvalidConfig(
                "window length must be > 0 samples".to_string(),
            ));
        }
        if hop_length == 0 {
            return Err(WindowError::InvalidConfig(
                "hop length must be > 0 samples".to_string(),
            ));
        }
        if hop_length > window_length {
            return Err(WindowError::InvalidConfig(format!(
                "hop length ({}) must not exceed window length ({})",
                hop_length, window_length
            )));
        }
        Ok(Self {
            window_length,
            hop_length,
        })
    }

    /// Create a spec from durations in seconds, rounding to whole samples
    pub fn from_seconds(sample_rate: u32, window_seconds: f64, hop_seconds: f64) -> Result<Self> {
        let window_length = seconds_to_samples(window_seconds, sample_rate)
            .ok_or_else(|| {
                WindowError::InvalidConfig(format!(
                    "window of {}s at {}Hz is not a positive sample count",
                    window_seconds, sample_rate
                ))
            })?;
        let hop_length = seconds_to_samples(hop_seconds, sample_rate).ok_or_else(|| {
            WindowError::InvalidConfig(format!(
                "hop of {}s at {}Hz is not a positive sample count",
                hop_seconds, sample_rate
            ))
        })?;
        Self::new(window_length, hop_length)
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Longest clip still windowed as a single crop
    pub fn near_exact_limit(&self) -> usize {
        self.window_length + self.hop_length / 2
    }

    pub fn classify(&self, len: usize) -> ClipShape {
        if len < self.window_length {
            ClipShape::Short
        } else if len <= self.near_exact_limit() {
            ClipShape::NearExact
        } else {
            ClipShape::Long
        }
    }

    /// Number of full-stride windows for a long clip
    fn strided_count(&self, len: usize) -> usize {
        (len - self.window_length) / self.hop_length + 1
    }

    /// Whether a long clip needs a tail window after its strided windows
    pub fn needs_tail(&self, len: usize) -> bool {
        if self.classify(len) != ClipShape::Long {
            return false;
        }
        let last_end = (self.strided_count(len) - 1) * self.hop_length + self.window_length;
        last_end < len
    }

    /// Number of windows a clip of `len` samples produces
    pub fn window_count(&self, len: usize) -> usize {
        match self.classify(len) {
            ClipShape::Short | ClipShape::NearExact => 1,
            ClipShape::Long => self.strided_count(len) + usize::from(self.needs_tail(len)),
        }
    }

    /// Start offset of window `index` for a clip of `len` samples
    pub fn window_start(&self, len: usize, index: usize) -> Option<usize> {
        let count = self.window_count(len);
        if index >= count {
            return None;
        }
        if self.needs_tail(len) && index == count - 1 {
            Some(len - self.window_length)
        } else {
            Some(index * self.hop_length)
        }
    }

    /// Start offsets of every window, in order
    pub fn window_starts(&self, len: usize) -> Vec<usize> {
        (0..self.window_count(len))
            .filter_map(|i| self.window_start(len, i))
            .collect()
    }

    /// Materialize window `index` of `waveform`
    ///
    /// Samples past the end of the waveform are zero, which only happens for
    /// short clips.
    pub fn extract(&self, waveform: &[f32], index: usize) -> Option<Vec<f32>> {
        let start = self.window_start(waveform.len(), index)?;
        let end = (start + self.window_length).min(waveform.len());

        let mut window = Vec::with_capacity(self.window_length);
        window.extend_from_slice(&waveform[start..end]);
        window.resize(self.window_length, 0.0);
        Some(window)
    }

    /// Materialize every window of `waveform`
    pub fn windows(&self, waveform: &[f32]) -> Vec<Vec<f32>> {
        (0..self.window_count(waveform.len()))
            .filter_map(|i| self.extract(waveform, i))
            .collect()
    }
}

/// Convert seconds to a rounded, strictly positive sample count
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> Option<usize> {
    let samples = (seconds * sample_rate as f64).round();
    if samples.is_finite() && samples >= 1.0 {
        Some(samples as usize)
    } else {
        None
    }
}

/// Split a mono waveform into fixed-length windows
pub fn window(
    waveform: &[f32],
    sample_rate: u32,
    window_seconds: f64,
    hop_seconds: f64,
) -> Result<Vec<Vec<f32>>> {
    let spec = WindowSpec::from_seconds(sample_rate, window_seconds, hop_seconds)?;
    Ok(spec.windows(waveform))
}
