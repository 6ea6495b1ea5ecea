//! Birdwin feature window store
//!
//! One `.mwin` file per clip holding the mel features of all its windows,
//! plus a JSON manifest per split.

pub mod format;
pub mod manifest;
pub mod reader;
pub mod writer;

pub use format::{
    FormatError, StoreFile, StoreHeader, StoreMetadata, HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE,
    VERSION,
};
pub use format::store_file_name;
pub use manifest::{ManifestEntry, SplitManifest};
pub use reader::StoreReader;
pub use writer::StoreWriter;
