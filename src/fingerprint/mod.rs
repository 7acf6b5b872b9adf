//! Fingerprint pipeline glue.
//!
//! Wires the spectrogram, peak extraction and pair hashing stages together.
//! Every stage is a pure function of its input and the config.

pub mod hashing;
pub mod peaks;
pub mod spectrogram;

pub use hashing::{generate_fingerprints, AnchoredFingerprint, Fingerprint};
pub use peaks::{find_peaks, ConstellationPoint};
pub use spectrogram::Spectrogram;

use crate::audio::signal;
use crate::config::FingerprintConfig;
use crate::error::Result;

/// Samples to constellation map.
pub fn constellation_map(samples: &[f32], cfg: &FingerprintConfig) -> Vec<ConstellationPoint> {
    let spec = spectrogram::compute(samples, &cfg.spectrogram);
    find_peaks(&spec, cfg.peaks.min_magnitude)
}

/// Run the end-to-end pipeline on validated samples.
pub fn fingerprint_samples(
    samples: &[f32],
    sample_rate: u32,
    cfg: &FingerprintConfig,
) -> Result<Vec<AnchoredFingerprint>> {
    signal::validate(samples, sample_rate)?;
    let peaks = constellation_map(samples, cfg);
    Ok(generate_fingerprints(
        &peaks,
        cfg.hashing.fan_value,
        cfg.hashing.max_time_delta,
    ))
}
