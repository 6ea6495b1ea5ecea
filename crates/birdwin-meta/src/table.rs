//! Metadata table loading
//!
//! Reads the corpus metadata CSV (`clip_id, filename, species_code, duration_s`
//! and an optional `secondary_labels` column separated by `;`).

use crate::models::ClipRecord;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Row {
    clip_id: String,
    filename: String,
    species_code: String,
    duration_s: f64,
    #[serde(default)]
    secondary_labels: Option<String>,
}

impl Row {
    fn into_record(self) -> ClipRecord {
        let secondary_labels = self
            .secondary_labels
            .map(|s| {
                s.split(';')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        ClipRecord {
            clip_id: self.clip_id.trim().to_string(),
            filename: self.filename.trim().to_string(),
            species_code: self.species_code.trim().to_string(),
            duration_s: self.duration_s,
            secondary_labels,
        }
    }
}

/// Read-only table of clip metadata
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    records: Vec<ClipRecord>,
    by_id: HashMap<String, usize>,
}

impl MetadataTable {
    /// Load the metadata table from a CSV file
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(path)
            .with_context(|| format!("Failed to open metadata table: {}", path.display()))?;

        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<Row>().enumerate() {
            let row = row.with_context(|| {
                format!("Failed to parse row {} of {}", line + 1, path.display())
            })?;
            records.push(row.into_record());
        }

        log::info!("Loaded {} metadata rows from {}", records.len(), path.display());
        Self::from_records(records)
    }

    /// Build a table from in-memory records, rejecting duplicate ids
    pub fn from_records(records: Vec<ClipRecord>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if by_id.insert(record.clip_id.clone(), i).is_some() {
                anyhow::bail!("Duplicate clip id in metadata: {}", record.clip_id);
            }
        }
        Ok(Self { records, by_id })
    }

    pub fn records(&self) -> &[ClipRecord] {
        &self.records
    }

    pub fn get(&self, clip_id: &str) -> Option<&ClipRecord> {
        self.by_id.get(clip_id).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows whose id appears in `ids`, in table order
    pub fn subset(&self, ids: &[String]) -> Vec<ClipRecord> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let subset: Vec<ClipRecord> = self
            .records
            .iter()
            .filter(|r| wanted.contains(r.clip_id.as_str()))
            .cloned()
            .collect();

        if subset.len() < wanted.len() {
            log::warn!(
                "{} split ids have no metadata row",
                wanted.len() - subset.len()
            );
        }
        subset
    }
}
