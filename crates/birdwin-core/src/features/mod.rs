//! Feature extraction for fixed-length windows

mod mel;
mod stats;

pub use mel::MelExtractor;
pub use stats::FeatureStats;

use crate::error::{Result, WindowError};

/// Fixed-shape numeric array, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureArray {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl FeatureArray {
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(WindowError::Feature(format!(
                "{} values do not fill shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { data, shape })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Turns one fixed-length window into a fixed-shape array
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, samples: &[f32]) -> Result<FeatureArray>;

    /// Shape produced for windows of `window_length` samples
    fn output_shape(&self, window_length: usize) -> Vec<usize>;
}

/// Passes the waveform through unchanged, shape `[window_length]`
#[derive(Debug, Clone, Copy, Default)]
pub struct RawWaveform;

impl FeatureExtractor for RawWaveform {
    fn extract(&self, samples: &[f32]) -> Result<FeatureArray> {
        FeatureArray::new(samples.to_vec(), vec![samples.len()])
    }

    fn output_shape(&self, window_length: usize) -> Vec<usize> {
        vec![window_length]
    }
}
