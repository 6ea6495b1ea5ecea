//! Audio decoding and resampling
//!
//! Supports WAV, MP3, FLAC and OGG with dedicated decoders, and any other
//! container Symphonia can probe (M4A/AAC, MKV/WebM).

mod decoder;
mod probe;
mod resample;

pub use decoder::{decode_audio, AudioData};
pub use probe::decode_with_symphonia;
pub use resample::resample_to_target;

use std::path::Path;

/// Audio formats with a dedicated decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    /// Anything else, handed to Symphonia's format probe
    Other,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("wav") | Some("wave") => AudioFormat::Wav,
            Some("mp3") => AudioFormat::Mp3,
            Some("flac") => AudioFormat::Flac,
            Some("ogg") | Some("oga") => AudioFormat::Ogg,
            _ => AudioFormat::Other,
        }
    }
}
