use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One row of the metadata table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRecord {
    pub clip_id: String,
    pub filename: String,
    pub species_code: String,
    pub duration_s: f64,
    /// Additional species audible in the recording
    #[serde(default)]
    pub secondary_labels: Vec<String>,
}

impl ClipRecord {
    /// Primary species first, then secondary labels in table order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.species_code.as_str())
            .chain(self.secondary_labels.iter().map(String::as_str))
    }
}

/// Dataset split a clip is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitName {
    Train,
    Val,
    TestOod,
}

impl SplitName {
    pub const ALL: [SplitName; 3] = [SplitName::Train, SplitName::Val, SplitName::TestOod];

    pub fn as_str(&self) -> &'static str {
        match self {
            SplitName::Train => "train",
            SplitName::Val => "val",
            SplitName::TestOod => "test_ood",
        }
    }

    /// File name used for the split's id list
    pub fn ids_filename(&self) -> String {
        format!("{}_ids.txt", self.as_str())
    }
}

impl fmt::Display for SplitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(SplitName::Train),
            "val" | "validation" => Ok(SplitName::Val),
            "test_ood" | "test" => Ok(SplitName::TestOod),
            other => anyhow::bail!("Unknown split name: {}", other),
        }
    }
}

/// Dense label indices for species codes, ordered alphabetically
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelMap {
    species: Vec<String>,
}

impl LabelMap {
    /// Build from the primary species of every record
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ClipRecord>,
    {
        let unique: BTreeSet<&str> = records
            .into_iter()
            .map(|r| r.species_code.as_str())
            .collect();
        Self {
            species: unique.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn index_of(&self, species: &str) -> Option<usize> {
        self.species
            .binary_search_by(|s| s.as_str().cmp(species))
            .ok()
    }

    pub fn species(&self, index: usize) -> Option<&str> {
        self.species.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.species.iter().map(String::as_str)
    }
}
