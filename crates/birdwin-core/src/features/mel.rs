//! Log-mel spectrogram
//!
//! Centered STFT with reflect padding and a periodic Hann window, power
//! spectrum, Slaney mel filterbank with area normalization, then decibels
//! relative to the window's peak, floored `top_db` below it.

use super::{FeatureArray, FeatureExtractor};
use crate::config::{FeatureConfig, NormalizationConfig};
use crate::error::{Result, WindowError};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

const AMIN: f32 = 1e-10;

/// Mel spectrogram extractor with precomputed window and filterbank
pub struct MelExtractor {
    n_fft: usize,
    hop_length: usize,
    n_mels: usize,
    top_db: f32,
    window: Vec<f32>,
    /// `[n_mels][n_fft / 2 + 1]`
    filterbank: Vec<Vec<f32>>,
    fft: Arc<dyn Fft<f32>>,
    normalization: Option<NormalizationConfig>,
}

impl MelExtractor {
    pub fn new(config: &FeatureConfig, sample_rate: u32) -> Result<Self> {
        if config.n_fft < 2 || config.hop_length == 0 || config.n_mels == 0 {
            return Err(WindowError::Feature(
                "n_fft must be >= 2, hop_length and n_mels > 0".to_string(),
            ));
        }
        let nyquist = sample_rate as f32 / 2.0;
        if config.fmin < 0.0 || config.fmin >= config.fmax || config.fmax > nyquist {
            return Err(WindowError::Feature(format!(
                "mel range {}..{} Hz invalid for {} Hz audio",
                config.fmin, config.fmax, sample_rate
            )));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.n_fft);

        Ok(Self {
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            n_mels: config.n_mels,
            top_db: config.top_db,
            window: create_hann_window(config.n_fft),
            filterbank: mel_filterbank(
                config.n_mels,
                config.n_fft,
                sample_rate as f32,
                config.fmin,
                config.fmax,
            ),
            fft,
            normalization: None,
        })
    }

    /// Standardize outputs with corpus statistics
    pub fn with_normalization(mut self, normalization: Option<NormalizationConfig>) -> Self {
        self.normalization = normalization;
        self
    }

    fn num_frames(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    fn power_spectrogram(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let pad = self.n_fft / 2;
        let padded: Vec<f32> = (0..samples.len() + self.n_fft)
            .map(|i| {
                if samples.is_empty() {
                    0.0
                } else {
                    samples[reflect_index(i as isize - pad as isize, samples.len())]
                }
            })
            .collect();

        let n_bins = self.n_fft / 2 + 1;
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];

        (0..self.num_frames(samples.len()))
            .map(|frame_idx| {
                let start = frame_idx * self.hop_length;
                for (i, slot) in buffer.iter_mut().enumerate() {
                    *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
                }
                self.fft.process(&mut buffer);
                buffer[..n_bins].iter().map(|c| c.norm_sqr()).collect()
            })
            .collect()
    }
}

impl FeatureExtractor for MelExtractor {
    fn extract(&self, samples: &[f32]) -> Result<FeatureArray> {
        let power = self.power_spectrogram(samples);
        let n_frames = power.len();

        // [n_mels][n_frames], row-major
        let mut mel = vec![0.0f32; self.n_mels * n_frames];
        for (m, filter) in self.filterbank.iter().enumerate() {
            for (t, frame) in power.iter().enumerate() {
                mel[m * n_frames + t] = filter.iter().zip(frame).map(|(w, p)| w * p).sum();
            }
        }

        let peak = mel.iter().fold(0.0f32, |acc, &v| acc.max(v));
        let ref_db = 10.0 * peak.max(AMIN).log10();
        for v in mel.iter_mut() {
            *v = 10.0 * v.max(AMIN).log10() - ref_db;
        }
        let max_db = mel.iter().fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        let floor = max_db - self.top_db;
        for v in mel.iter_mut() {
            *v = v.max(floor);
        }

        if let Some(norm) = &self.normalization {
            for v in mel.iter_mut() {
                *v = (*v - norm.mel_mean) / norm.mel_std;
            }
        }

        FeatureArray::new(mel, vec![self.n_mels, n_frames])
    }

    fn output_shape(&self, window_length: usize) -> Vec<usize> {
        vec![self.n_mels, self.num_frames(window_length)]
    }
}

/// Mirror an out-of-range index back into `0..len` without repeating the edge
fn reflect_index(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let m = i.rem_euclid(period);
    if m >= len as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

/// Periodic Hann window
fn create_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular filters evenly spaced on the Slaney mel scale
fn mel_filterbank(
    n_mels: usize,
    n_fft: usize,
    sample_rate: f32,
    fmin: f32,
    fmax: f32,
) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let fft_freqs: Vec<f32> = (0..n_bins)
        .map(|k| k as f32 * sample_rate / n_fft as f32)
        .collect();

    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let edges: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
            let enorm = 2.0 / (upper - lower);
            fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - lower) / (center - lower);
                    let falling = (upper - f) / (upper - center);
                    rising.min(falling).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> FeatureConfig {
        FeatureConfig {
            n_fft: 512,
            hop_length: 128,
            n_mels: 40,
            fmin: 0.0,
            fmax: 8000.0,
            top_db: 80.0,
        }
    }

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_output_shape_matches_extract() {
        let extractor = MelExtractor::new(&config(), 16000).unwrap();
        let features = extractor.extract(&sine(1000.0, 16000, 16000)).unwrap();
        assert_eq!(features.shape, vec![40, 126]);
        assert_eq!(features.shape, extractor.output_shape(16000));
        assert_eq!(features.len(), 40 * 126);
    }

    #[test]
    fn test_default_config_shape() {
        let extractor = MelExtractor::new(&FeatureConfig::default(), 32000).unwrap();
        assert_eq!(extractor.output_shape(160_000), vec![128, 313]);
    }

    #[test]
    fn test_db_range() {
        let extractor = MelExtractor::new(&config(), 16000).unwrap();
        let features = extractor.extract(&sine(2000.0, 16000, 8000)).unwrap();
        let max = features.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min = features.data.iter().cloned().fold(f32::INFINITY, f32::min);
        assert_relative_eq!(max, 0.0, epsilon = 1e-4);
        assert!(min >= -80.0 - 1e-3);
    }

    #[test]
    fn test_tone_energy_lands_in_matching_band() {
        let extractor = MelExtractor::new(&config(), 16000).unwrap();
        let features = extractor.extract(&sine(3000.0, 16000, 16000)).unwrap();
        let n_frames = features.shape[1];
        let mid = n_frames / 2;

        let loudest = (0..40)
            .max_by(|&a, &b| {
                features.data[a * n_frames + mid]
                    .partial_cmp(&features.data[b * n_frames + mid])
                    .unwrap()
            })
            .unwrap();

        // fmin is 0, so band m spans edges m..m+2 of 41 equal mel steps
        let step = hz_to_mel(8000.0) / 41.0;
        let lower = mel_to_hz(step * loudest as f32);
        let upper = mel_to_hz(step * (loudest + 2) as f32);
        assert!(
            lower <= 3000.0 && 3000.0 <= upper,
            "band {} spans {}..{} Hz",
            loudest,
            lower,
            upper
        );
    }

    #[test]
    fn test_silence_is_flat() {
        let extractor = MelExtractor::new(&config(), 16000).unwrap();
        let features = extractor.extract(&vec![0.0; 4000]).unwrap();
        assert!(features.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_normalization_applied() {
        let norm = NormalizationConfig {
            mel_mean: -40.0,
            mel_std: 20.0,
        };
        let plain = MelExtractor::new(&config(), 16000).unwrap();
        let normalized = MelExtractor::new(&config(), 16000)
            .unwrap()
            .with_normalization(Some(norm));
        let samples = sine(500.0, 16000, 4000);

        let a = plain.extract(&samples).unwrap();
        let b = normalized.extract(&samples).unwrap();
        for (x, y) in a.data.iter().zip(&b.data) {
            assert_relative_eq!((x + 40.0) / 20.0, *y, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_mel_scale_roundtrip() {
        for hz in [0.0, 440.0, 999.0, 1000.0, 4000.0, 16000.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, max_relative = 1e-4, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_reflect_index() {
        assert_eq!(reflect_index(-1, 5), 1);
        assert_eq!(reflect_index(-2, 5), 2);
        assert_eq!(reflect_index(5, 5), 3);
        assert_eq!(reflect_index(2, 5), 2);
        assert_eq!(reflect_index(-7, 3), 1);
        assert_eq!(reflect_index(9, 1), 0);
    }

    #[test]
    fn test_invalid_range_rejected() {
        let mut cfg = config();
        cfg.fmax = 9000.0;
        assert!(MelExtractor::new(&cfg, 16000).is_err());
    }
}
