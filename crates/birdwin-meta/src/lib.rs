//! Birdwin Metadata Layer
//!
//! Clip metadata table, split id files and stratified split generation

pub mod models;
pub mod splits;
pub mod table;

// Re-export commonly used types
pub use models::{ClipRecord, LabelMap, SplitName};
pub use splits::{load_split_ids, stratified_split, write_split_ids, SplitRatios, Splits};
pub use table::MetadataTable;
