//! Audio resampling with rubato's FFT resampler

use anyhow::{Context, Result};
use rubato::{FftFixedIn, Resampler};

const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Resample mono audio to the target sample rate
///
/// The resampler's delay is trimmed so that output sample `i` lines up with
/// input time `i / to_rate`, and the output holds exactly
/// `round(len * to_rate / from_rate)` samples.
pub fn resample_to_target(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        anyhow::bail!("Cannot resample from {} Hz to {} Hz", from_rate, to_rate);
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let expected_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1,
    )
    .context("Failed to create resampler")?;

    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected_len + delay + CHUNK_SIZE);

    let mut pos = 0;
    while pos + resampler.input_frames_next() <= samples.len() {
        let frames = resampler.input_frames_next();
        let chunk: [&[f32]; 1] = [&samples[pos..pos + frames]];
        let result = resampler
            .process(&chunk[..], None)
            .context("Resampler error")?;
        output.extend_from_slice(&result[0]);
        pos += frames;
    }

    if pos < samples.len() {
        let remaining: [&[f32]; 1] = [&samples[pos..]];
        let result = resampler
            .process_partial(Some(&remaining[..]), None)
            .context("Resampler partial error")?;
        output.extend_from_slice(&result[0]);
    }

    // Flush the delay line with silence
    while output.len() < expected_len + delay {
        let result = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .context("Resampler flush error")?;
        if result[0].is_empty() {
            break;
        }
        output.extend_from_slice(&result[0]);
    }

    let mut output: Vec<f32> = output.into_iter().skip(delay).take(expected_len).collect();
    output.resize(expected_len, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_to_target(&samples, 32000, 32000).unwrap(), samples);
    }

    #[test]
    fn test_output_length() {
        let samples = vec![0.0f32; 44100 * 2 + 17];
        let out = resample_to_target(&samples, 44100, 32000).unwrap();
        let expected = ((44100 * 2 + 17) as f64 * 32000.0 / 44100.0).round() as usize;
        assert_eq!(out.len(), expected);

        let out = resample_to_target(&samples[..100], 44100, 32000).unwrap();
        assert_eq!(out.len(), 73);
    }

    #[test]
    fn test_sine_keeps_amplitude() {
        let from = 48000;
        let samples: Vec<f32> = (0..from)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / from as f32).sin() * 0.5)
            .collect();
        let out = resample_to_target(&samples, from, 32000).unwrap();
        assert_eq!(out.len(), 32000);

        let peak = out[4000..28000].iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.05, "peak {}", peak);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(resample_to_target(&[0.0; 4], 0, 32000).is_err());
    }
}
