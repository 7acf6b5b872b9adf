use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FingerprintError, Result};

/// Analysis constants shared by indexing and querying.
///
/// Bin indices are only comparable between two clips analysed with the same
/// values, so a database keeps one of these for its whole lifetime.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    #[serde(default)]
    pub spectrogram: SpectrogramConfig,
    #[serde(default)]
    pub peaks: PeakConfig,
    #[serde(default)]
    pub hashing: HashingConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramConfig {
    /// STFT window length in samples (also the FFT length).
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Samples between successive frame starts.
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakConfig {
    /// Cells at or below this magnitude are never peaks.
    #[serde(default = "default_min_magnitude")]
    pub min_magnitude: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HashingConfig {
    /// Each anchor pairs with the next `fan_value - 1` constellation points.
    #[serde(default = "default_fan_value")]
    pub fan_value: usize,
    /// Largest time-bin gap allowed inside one fingerprint.
    #[serde(default = "default_max_time_delta")]
    pub max_time_delta: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub scoring: Scoring,
    /// Candidates scoring below this are not reported.
    #[serde(default = "default_min_score")]
    pub min_score: usize,
}

/// How a candidate track's collisions are turned into a score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// Size of the largest group of collisions sharing one time offset.
    #[default]
    OffsetHistogram,
    /// Every stored entry hit by a query fingerprint counts once.
    CollisionCount,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            hop_size: default_hop_size(),
        }
    }
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            min_magnitude: default_min_magnitude(),
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            fan_value: default_fan_value(),
            max_time_delta: default_max_time_delta(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            scoring: Scoring::default(),
            min_score: default_min_score(),
        }
    }
}

fn default_fft_size() -> usize { 2048 }
fn default_hop_size() -> usize { 512 }
fn default_min_magnitude() -> f32 { 0.0 }
fn default_fan_value() -> usize { 15 }
fn default_max_time_delta() -> u32 { 200 }
fn default_min_score() -> usize { 1 }

impl FingerprintConfig {
    pub fn validate(&self) -> Result<()> {
        let spec = &self.spectrogram;
        if spec.fft_size < 2 || spec.fft_size % 2 != 0 {
            return Err(FingerprintError::InvalidConfig(format!(
                "fft_size must be an even number >= 2, got {}",
                spec.fft_size
            )));
        }
        if spec.hop_size == 0 {
            return Err(FingerprintError::InvalidConfig("hop_size must be positive".into()));
        }
        if self.hashing.fan_value == 0 {
            return Err(FingerprintError::InvalidConfig("fan_value must be positive".into()));
        }
        if !self.peaks.min_magnitude.is_finite() || self.peaks.min_magnitude < 0.0 {
            return Err(FingerprintError::InvalidConfig(format!(
                "min_magnitude must be finite and non-negative, got {}",
                self.peaks.min_magnitude
            )));
        }
        Ok(())
    }

    /// Seconds covered by one time bin at `sample_rate`.
    pub fn seconds_per_bin(&self, sample_rate: u32) -> f64 {
        self.spectrogram.hop_size as f64 / sample_rate as f64
    }
}

pub fn load_config(path: &Path) -> Option<FingerprintConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<FingerprintConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}
