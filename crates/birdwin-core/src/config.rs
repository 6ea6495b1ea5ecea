//! Project configuration
//!
//! TOML-based configuration for the audio windowing parameters, mel feature
//! extraction, metadata locations and the retrieval loader.

use crate::window::WindowSpec;
use birdwin_meta::SplitName;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BirdwinConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalization: Option<NormalizationConfig>,
}

/// Sample rate and windowing parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: f64,
    #[serde(default = "default_hop_seconds")]
    pub hop_seconds: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            window_seconds: default_window_seconds(),
            hop_seconds: default_hop_seconds(),
        }
    }
}

fn default_sample_rate() -> u32 {
    32000
}
fn default_window_seconds() -> f64 {
    5.0
}
fn default_hop_seconds() -> f64 {
    2.5
}

/// Mel spectrogram parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureConfig {
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    #[serde(default)]
    pub fmin: f32,
    #[serde(default = "default_fmax")]
    pub fmax: f32,
    #[serde(default = "default_top_db")]
    pub top_db: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            n_mels: default_n_mels(),
            fmin: 0.0,
            fmax: default_fmax(),
            top_db: default_top_db(),
        }
    }
}

fn default_n_fft() -> usize {
    2048
}
fn default_hop_length() -> usize {
    512
}
fn default_n_mels() -> usize {
    128
}
fn default_fmax() -> f32 {
    16000.0
}
fn default_top_db() -> f32 {
    80.0
}

/// Metadata table, audio root and split id files
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    #[serde(default = "default_metadata")]
    pub metadata: PathBuf,
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
    #[serde(default)]
    pub splits: SplitPaths,
    /// Leave clips whose audio file is missing out of the index
    #[serde(default = "default_skip_missing")]
    pub skip_missing: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            metadata: default_metadata(),
            audio_dir: default_audio_dir(),
            splits: SplitPaths::default(),
            skip_missing: default_skip_missing(),
        }
    }
}

fn default_metadata() -> PathBuf {
    PathBuf::from("data/metadata.csv")
}
fn default_audio_dir() -> PathBuf {
    PathBuf::from("data/raw")
}
fn default_skip_missing() -> bool {
    true
}

/// Split id file locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SplitPaths {
    #[serde(default = "default_train_split")]
    pub train: PathBuf,
    #[serde(default = "default_val_split")]
    pub val: PathBuf,
    #[serde(default = "default_test_split")]
    pub test_ood: PathBuf,
}

impl Default for SplitPaths {
    fn default() -> Self {
        Self {
            train: default_train_split(),
            val: default_val_split(),
            test_ood: default_test_split(),
        }
    }
}

fn default_train_split() -> PathBuf {
    PathBuf::from("conf/splits/train_ids.txt")
}
fn default_val_split() -> PathBuf {
    PathBuf::from("conf/splits/val_ids.txt")
}
fn default_test_split() -> PathBuf {
    PathBuf::from("conf/splits/test_ood_ids.txt")
}

/// Retrieval settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoaderConfig {
    /// Decoded clips kept in memory (0 disables the cache)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Compare decoded lengths against metadata durations on retrieval
    #[serde(default = "default_verify_counts")]
    pub verify_counts: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_shuffle_seed")]
    pub shuffle_seed: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            verify_counts: default_verify_counts(),
            batch_size: default_batch_size(),
            shuffle_seed: default_shuffle_seed(),
        }
    }
}

fn default_cache_capacity() -> usize {
    16
}
fn default_verify_counts() -> bool {
    true
}
fn default_batch_size() -> usize {
    32
}
fn default_shuffle_seed() -> u64 {
    42
}

/// Feature normalization statistics
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct NormalizationConfig {
    pub mel_mean: f32,
    pub mel_std: f32,
}

impl NormalizationConfig {
    /// Load statistics from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read normalization file {}: {}", path.display(), e)
        })?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse normalization TOML: {}", e))
    }

    /// Save statistics to a TOML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string(self)?;
        std::fs::write(path, content).map_err(|e| {
            anyhow::anyhow!("Failed to write normalization file {}: {}", path.display(), e)
        })
    }
}

impl BirdwinConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: BirdwinConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.audio.sample_rate == 0 {
            anyhow::bail!("Sample rate must be > 0");
        }
        self.window_spec()?;

        let f = &self.features;
        if f.n_fft == 0 || f.hop_length == 0 || f.n_mels == 0 {
            anyhow::bail!("n_fft, hop_length and n_mels must be > 0");
        }
        if f.hop_length > f.n_fft {
            anyhow::bail!("hop_length ({}) must not exceed n_fft ({})", f.hop_length, f.n_fft);
        }
        if f.fmin < 0.0 || f.fmin >= f.fmax {
            anyhow::bail!("fmin must be >= 0 and < fmax");
        }
        if f.fmax > self.audio.sample_rate as f32 / 2.0 {
            anyhow::bail!(
                "fmax ({}) exceeds the Nyquist frequency ({})",
                f.fmax,
                self.audio.sample_rate / 2
            );
        }
        if f.top_db <= 0.0 {
            anyhow::bail!("top_db must be > 0");
        }
        if self.loader.batch_size == 0 {
            anyhow::bail!("batch_size must be > 0");
        }
        if let Some(norm) = &self.normalization {
            if norm.mel_std <= 0.0 {
                anyhow::bail!("mel_std must be > 0");
            }
        }
        Ok(())
    }

    /// Window and hop lengths in samples
    pub fn window_spec(&self) -> crate::Result<WindowSpec> {
        WindowSpec::from_seconds(
            self.audio.sample_rate,
            self.audio.window_seconds,
            self.audio.hop_seconds,
        )
    }

    /// Id file for a split
    pub fn split_path(&self, split: SplitName) -> &Path {
        match split {
            SplitName::Train => &self.data.splits.train,
            SplitName::Val => &self.data.splits.val,
            SplitName::TestOod => &self.data.splits.test_ood,
        }
    }
}
