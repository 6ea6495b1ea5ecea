//! .mwin file writer

use crate::format::{StoreFile, CRC64};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// zstd level used for compressed payloads
const COMPRESSION_LEVEL: i32 = 3;

pub struct StoreWriter {}

impl StoreWriter {
    pub fn new() -> Self {
        Self {}
    }

    /// Write .mwin file
    ///
    /// Header sizes, flags and checksum are recomputed from the contents.
    pub fn write(&self, path: &Path, store: &StoreFile, compress: bool) -> Result<()> {
        let metadata = serde_json::to_vec(&store.metadata)?;
        let payload = encode_payload(&store.features);

        let mut header = store.header.clone();
        header.metadata_size = metadata.len() as u64;
        header.payload_size = payload.len() as u64;
        header.checksum = CRC64.checksum(&payload);
        header.set_compressed(compress);

        let stored = if compress {
            let compressed = zstd::bulk::compress(&payload, COMPRESSION_LEVEL)
                .with_context(|| format!("Failed to compress payload for {}", path.display()))?;
            header.payload_size_compressed = compressed.len() as u64;
            compressed
        } else {
            header.payload_size_compressed = 0;
            payload
        };

        let file = File::create(path)
            .with_context(|| format!("Failed to create .mwin file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&header.to_bytes())?;
        writer.write_all(&metadata)?;
        writer.write_all(&stored)?;
        writer.flush()?;

        Ok(())
    }
}

impl Default for StoreWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_payload(features: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(features.len() * 4);
    for v in features {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
