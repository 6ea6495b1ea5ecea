//! JSON output formatting

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Print a summary as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

/// Write a summary as pretty JSON to a file
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Failure attributed to one clip
#[derive(Debug, Clone, Serialize)]
pub struct ClipFailure {
    pub clip_id: String,
    pub error: String,
}
