//! Split manifest listing the store files of one split

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub clip_id: String,
    /// File name relative to the manifest's directory
    pub file: String,
    pub num_windows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitManifest {
    pub split: String,
    /// RFC 3339
    pub created_at: String,
    pub sample_rate: u32,
    pub window_length: usize,
    pub hop_length: usize,
    /// Per-window feature shape
    pub feature_shape: Vec<usize>,
    pub clips: Vec<ManifestEntry>,
    /// Clips whose audio could not be loaded
    #[serde(default)]
    pub skipped: Vec<String>,
}

impl SplitManifest {
    pub fn new(
        split: impl Into<String>,
        sample_rate: u32,
        window_length: usize,
        hop_length: usize,
        feature_shape: Vec<usize>,
    ) -> Self {
        Self {
            split: split.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            sample_rate,
            window_length,
            hop_length,
            feature_shape,
            clips: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn total_windows(&self) -> usize {
        self.clips.iter().map(|c| c.num_windows).sum()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_save_load() {
        let mut manifest = SplitManifest::new("val", 32000, 160_000, 80_000, vec![128, 313]);
        manifest.clips.push(ManifestEntry {
            clip_id: "xc1".to_string(),
            file: "xc1.mwin".to_string(),
            num_windows: 3,
        });
        manifest.clips.push(ManifestEntry {
            clip_id: "xc2".to_string(),
            file: "xc2.mwin".to_string(),
            num_windows: 1,
        });
        manifest.skipped.push("xc3".to_string());
        assert_eq!(manifest.total_windows(), 4);
        assert!(chrono::DateTime::parse_from_rfc3339(&manifest.created_at).is_ok());

        let path = std::env::temp_dir()
            .join(format!("birdwin-manifest-{}.json", std::process::id()));
        manifest.save(&path).unwrap();
        assert_eq!(SplitManifest::load(&path).unwrap(), manifest);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_skipped_defaults_to_empty() {
        let json = r#"{"split":"train","created_at":"2024-01-01T00:00:00+00:00","sample_rate":32000,
            "window_length":160000,"hop_length":80000,"feature_shape":[128,313],"clips":[]}"#;
        let manifest: SplitManifest = serde_json::from_str(json).unwrap();
        assert!(manifest.skipped.is_empty());
        assert_eq!(manifest.total_windows(), 0);
    }
}
