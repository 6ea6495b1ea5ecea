//! .mwin file format structures

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic bytes for .mwin files: "BWIN"
pub const MAGIC: [u8; 4] = [0x42, 0x57, 0x49, 0x4E];

/// Current format version
pub const VERSION: u16 = 1;

/// Encoded header length in bytes
pub const HEADER_SIZE: usize = 64;

/// Largest uncompressed payload a reader will allocate (1 GiB)
pub const MAX_PAYLOAD_SIZE: u64 = 1 << 30;

/// CRC-64 used for payload checksums
pub(crate) const CRC64: crc::Crc<u64> = crc::Crc::<u64>::new(&crc::CRC_64_ECMA_182);

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("magic bytes mismatch")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("file truncated: need {needed} bytes, have {available}")]
    Truncated { needed: u64, available: u64 },
    #[error("payload checksum mismatch: header {expected:#018x}, computed {computed:#018x}")]
    ChecksumMismatch { expected: u64, computed: u64 },
    #[error("declared payload of {declared} bytes, header shape needs {expected}")]
    PayloadSize { declared: u64, expected: u64 },
    #[error("header declares a payload beyond the 1 GiB limit ({0} bytes)")]
    PayloadTooLarge(u64),
    #[error("clip id {0:?} cannot be used as a file name")]
    InvalidClipId(String),
    #[error("{values} feature values do not fill {windows} x {n_mels} x {n_frames}")]
    ShapeMismatch {
        values: usize,
        windows: usize,
        n_mels: usize,
        n_frames: usize,
    },
}

/// File header (64 bytes fixed size)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreHeader {
    /// Magic bytes: "BWIN"
    pub magic: [u8; 4],
    /// Format version
    pub version: u16,
    /// Flags (bit 0: zstd-compressed payload)
    pub flags: u16,
    /// Size of the JSON metadata section
    pub metadata_size: u64,
    /// Size of payload (uncompressed)
    pub payload_size: u64,
    /// Compressed payload size (0 if uncompressed)
    pub payload_size_compressed: u64,
    /// Number of windows
    pub num_windows: u32,
    pub n_mels: u32,
    pub n_frames: u32,
    /// Sample rate (Hz)
    pub sample_rate: u32,
    /// CRC64 of the uncompressed payload
    pub checksum: u64,
    /// Reserved
    pub reserved: u64,
}

impl StoreHeader {
    pub fn new(num_windows: u32, n_mels: u32, n_frames: u32, sample_rate: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            metadata_size: 0,
            payload_size: 0,
            payload_size_compressed: 0,
            num_windows,
            n_mels,
            n_frames,
            sample_rate,
            checksum: 0,
            reserved: 0,
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & 0x1) != 0
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        if compressed {
            self.flags |= 0x1;
        } else {
            self.flags &= !0x1;
        }
    }

    /// Payload bytes as stored on disk
    pub fn stored_payload_size(&self) -> u64 {
        if self.is_compressed() {
            self.payload_size_compressed
        } else {
            self.payload_size
        }
    }

    /// Payload bytes implied by the window, mel and frame counts
    pub fn expected_payload_size(&self) -> Result<u64, FormatError> {
        let size = [self.n_mels as u64, self.n_frames as u64, 4]
            .iter()
            .try_fold(self.num_windows as u64, |acc, &n| acc.checked_mul(n))
            .filter(|&size| size <= MAX_PAYLOAD_SIZE);
        size.ok_or(FormatError::PayloadTooLarge(self.payload_size))
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..16].copy_from_slice(&self.metadata_size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[24..32].copy_from_slice(&self.payload_size_compressed.to_le_bytes());
        buf[32..36].copy_from_slice(&self.num_windows.to_le_bytes());
        buf[36..40].copy_from_slice(&self.n_mels.to_le_bytes());
        buf[40..44].copy_from_slice(&self.n_frames.to_le_bytes());
        buf[44..48].copy_from_slice(&self.sample_rate.to_le_bytes());
        buf[48..56].copy_from_slice(&self.checksum.to_le_bytes());
        buf[56..64].copy_from_slice(&self.reserved.to_le_bytes());
        buf
    }

    /// Decode and check magic and version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated {
                needed: HEADER_SIZE as u64,
                available: bytes.len() as u64,
            });
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at = |i: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&bytes[i..i + 4]);
            u32::from_le_bytes(b)
        };
        let u64_at = |i: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[i..i + 8]);
            u64::from_le_bytes(b)
        };

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            return Err(FormatError::BadMagic);
        }
        let version = u16_at(4);
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        Ok(Self {
            magic,
            version,
            flags: u16_at(6),
            metadata_size: u64_at(8),
            payload_size: u64_at(16),
            payload_size_compressed: u64_at(24),
            num_windows: u32_at(32),
            n_mels: u32_at(36),
            n_frames: u32_at(40),
            sample_rate: u32_at(44),
            checksum: u64_at(48),
            reserved: u64_at(56),
        })
    }
}

/// Metadata section (JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub clip_id: String,
    /// Label indices, primary first
    pub labels: Vec<usize>,
    /// Start offset of each window in the decoded clip
    pub window_starts: Vec<usize>,
    pub window_length: usize,
    pub hop_length: usize,
}

/// `.mwin` file name for a clip, rejecting ids that would leave the output directory
pub fn store_file_name(clip_id: &str) -> Result<String, FormatError> {
    let unsafe_char = |c: char| matches!(c, '/' | '\\' | ':') || c.is_control();
    if clip_id.is_empty() || clip_id == "." || clip_id == ".." || clip_id.chars().any(unsafe_char) {
        return Err(FormatError::InvalidClipId(clip_id.to_string()));
    }
    Ok(format!("{}.mwin", clip_id))
}

/// Complete .mwin file structure
#[derive(Debug, Clone, PartialEq)]
pub struct StoreFile {
    pub header: StoreHeader,
    pub metadata: StoreMetadata,
    /// `[windows][n_mels][n_frames]`, row-major
    pub features: Vec<f32>,
}

impl StoreFile {
    pub fn new(
        metadata: StoreMetadata,
        n_mels: usize,
        n_frames: usize,
        sample_rate: u32,
        features: Vec<f32>,
    ) -> Result<Self, FormatError> {
        let windows = metadata.window_starts.len();
        if features.len() != windows * n_mels * n_frames {
            return Err(FormatError::ShapeMismatch {
                values: features.len(),
                windows,
                n_mels,
                n_frames,
            });
        }
        Ok(Self {
            header: StoreHeader::new(windows as u32, n_mels as u32, n_frames as u32, sample_rate),
            metadata,
            features,
        })
    }

    pub fn num_windows(&self) -> usize {
        self.header.num_windows as usize
    }

    /// Features of one window, `[n_mels][n_frames]`
    pub fn window(&self, index: usize) -> Option<&[f32]> {
        if index >= self.num_windows() {
            return None;
        }
        let stride = self.header.n_mels as usize * self.header.n_frames as usize;
        self.features.get(index * stride..(index + 1) * stride)
    }
}
