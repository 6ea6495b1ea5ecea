//! .mwin file reader

use crate::format::{FormatError, StoreFile, StoreHeader, StoreMetadata, CRC64, HEADER_SIZE};
use anyhow::{Context, Result};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

pub struct StoreReader;

impl StoreReader {
    /// Read .mwin file
    pub fn read(path: &Path) -> Result<StoreFile> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open .mwin file: {}", path.display()))?;
        // SAFETY: mapped read-only; store files are written once and never edited in place
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map .mwin file: {}", path.display()))?;

        Self::parse(&mmap).with_context(|| format!("Invalid .mwin file: {}", path.display()))
    }

    /// Read only the header and metadata
    pub fn read_metadata(path: &Path) -> Result<(StoreHeader, StoreMetadata)> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open .mwin file: {}", path.display()))?;
        // SAFETY: see `read`
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map .mwin file: {}", path.display()))?;

        let header = StoreHeader::from_bytes(&mmap)?;
        let metadata = Self::metadata_section(&mmap, &header)?;
        Ok((header, metadata))
    }

    fn parse(bytes: &[u8]) -> Result<StoreFile> {
        let header = StoreHeader::from_bytes(bytes)?;
        let metadata = Self::metadata_section(bytes, &header)?;

        let expected = header.expected_payload_size()?;
        if header.payload_size != expected {
            return Err(FormatError::PayloadSize {
                declared: header.payload_size,
                expected,
            }
            .into());
        }

        let payload_start = HEADER_SIZE as u64 + header.metadata_size;
        let payload_end = section_end(bytes, payload_start, header.stored_payload_size())?;
        let stored = &bytes[payload_start as usize..payload_end as usize];

        let payload: Cow<[u8]> = if header.is_compressed() {
            Cow::Owned(
                zstd::bulk::decompress(stored, header.payload_size as usize)
                    .context("Failed to decompress payload")?,
            )
        } else {
            Cow::Borrowed(stored)
        };

        let computed = CRC64.checksum(&payload);
        if computed != header.checksum {
            return Err(FormatError::ChecksumMismatch {
                expected: header.checksum,
                computed,
            }
            .into());
        }

        let features: Vec<f32> = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let windows = header.num_windows as usize;
        let (n_mels, n_frames) = (header.n_mels as usize, header.n_frames as usize);
        if metadata.window_starts.len() != windows
            || features.len() as u64 * 4 != header.payload_size
        {
            return Err(FormatError::ShapeMismatch {
                values: features.len(),
                windows,
                n_mels,
                n_frames,
            }
            .into());
        }

        Ok(StoreFile {
            header,
            metadata,
            features,
        })
    }

    fn metadata_section(bytes: &[u8], header: &StoreHeader) -> Result<StoreMetadata> {
        let end = section_end(bytes, HEADER_SIZE as u64, header.metadata_size)?;
        serde_json::from_slice(&bytes[HEADER_SIZE..end as usize])
            .context("Failed to parse metadata")
    }
}

/// End offset of a section of `size` bytes at `start`, checked against the file
fn section_end(bytes: &[u8], start: u64, size: u64) -> std::result::Result<u64, FormatError> {
    let available = bytes.len() as u64;
    let end = start.checked_add(size).ok_or(FormatError::Truncated {
        needed: u64::MAX,
        available,
    })?;
    check_len(bytes, end)?;
    Ok(end)
}

fn check_len(bytes: &[u8], needed: u64) -> std::result::Result<(), FormatError> {
    if (bytes.len() as u64) < needed {
        return Err(FormatError::Truncated {
            needed,
            available: bytes.len() as u64,
        });
    }
    Ok(())
}
