//! Audio decoding for multiple formats

use super::{resample_to_target, AudioFormat};
use anyhow::{Context, Result};
use std::path::Path;

/// Decoded audio data
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: u32,
}

impl AudioData {
    pub(crate) fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            anyhow::bail!(
                "Invalid stream parameters: {} Hz, {} channels",
                sample_rate,
                channels
            );
        }
        let frames = samples.len() / channels as usize;
        let duration_ms = (frames as f64 / sample_rate as f64 * 1000.0) as u32;
        Ok(Self {
            samples,
            sample_rate,
            channels,
            duration_ms,
        })
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }

    /// Number of samples per channel
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Decode an audio file to mono at the target sample rate
pub fn decode_audio(path: &Path, target_sample_rate: u32) -> Result<AudioData> {
    if !path.exists() {
        anyhow::bail!("Audio file not found: {}", path.display());
    }

    let audio_data = match AudioFormat::from_path(path) {
        AudioFormat::Wav => decode_wav(path)?,
        AudioFormat::Mp3 => decode_mp3(path)?,
        AudioFormat::Flac => decode_flac(path)?,
        AudioFormat::Ogg => decode_ogg(path)?,
        AudioFormat::Other => super::decode_with_symphonia(path)?,
    };

    let mono = audio_data.to_mono();
    let samples = if audio_data.sample_rate != target_sample_rate {
        log::debug!(
            "Resampling {} from {} Hz to {} Hz",
            path.display(),
            audio_data.sample_rate,
            target_sample_rate
        );
        resample_to_target(&mono, audio_data.sample_rate, target_sample_rate)?
    } else {
        mono
    };

    AudioData::new(samples, target_sample_rate, 1)
}

/// Decode WAV file
fn decode_wav(path: &Path) -> Result<AudioData> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    AudioData::new(samples, spec.sample_rate, spec.channels)
}

/// Decode MP3 file
fn decode_mp3(path: &Path) -> Result<AudioData> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read MP3 file: {}", path.display()))?;

    let mut decoder = minimp3::Decoder::new(&data[..]);
    let mut samples = Vec::new();
    let mut sample_rate = 0;
    let mut channels = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                    channels = frame.channels as u16;
                }
                samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => anyhow::bail!("MP3 decode error in {}: {}", path.display(), e),
        }
    }

    AudioData::new(samples, sample_rate, channels)
}

/// Decode FLAC file
fn decode_flac(path: &Path) -> Result<AudioData> {
    let mut reader = claxon::FlacReader::open(path)
        .with_context(|| format!("Failed to open FLAC file: {}", path.display()))?;

    let info = reader.streaminfo();
    let max_val = (1i64 << (info.bits_per_sample - 1)) as f32;
    let samples: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / max_val))
        .collect::<Result<Vec<_>, _>>()?;

    AudioData::new(samples, info.sample_rate, info.channels as u16)
}

/// Decode OGG Vorbis file
fn decode_ogg(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open OGG file: {}", path.display()))?;

    let mut reader = lewton::inside_ogg::OggStreamReader::new(file)?;
    let sample_rate = reader.ident_hdr.audio_sample_rate;
    let channels = reader.ident_hdr.audio_channels as u16;

    let mut samples = Vec::new();
    while let Some(packet) = reader.read_dec_packet_itl()? {
        samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }

    AudioData::new(samples, sample_rate, channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(name: &str, sample_rate: u32, channels: u16, frames: usize) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "birdwin-decoder-{}-{}.wav",
            name,
            std::process::id()
        ));
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..frames {
            for ch in 0..channels {
                let v: i16 = if ch == 0 { 8192 } else { -8192 };
                let sample = if i % 2 == 0 { v } else { v / 2 };
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_decode_wav_mono_at_native_rate() {
        let path = write_wav("mono", 16000, 1, 16000);
        let audio = decode_audio(&path, 16000).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(audio.channels, 1);
        assert_eq!(audio.samples.len(), 16000);
        assert_eq!(audio.duration_ms, 1000);
        assert!((audio.samples[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_decode_wav_downmixes_stereo() {
        let path = write_wav("stereo", 8000, 2, 800);
        let audio = decode_audio(&path, 8000).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(audio.frames(), 800);
        assert!(audio.samples.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_decode_wav_resamples() {
        let path = write_wav("resample", 16000, 1, 16000);
        let audio = decode_audio(&path, 32000).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(audio.sample_rate, 32000);
        assert_eq!(audio.samples.len(), 32000);
    }

    #[test]
    fn test_missing_file() {
        let err = decode_audio(Path::new("/nonexistent/XC404.wav"), 32000).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
