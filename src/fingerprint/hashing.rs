use serde::{Deserialize, Serialize};

use super::peaks::ConstellationPoint;

/// Exact-match key built from a pair of constellation points.
///
/// Serialised as three integers: `[anchor_freq, target_freq, time_delta]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[u32; 3]", into = "[u32; 3]")]
pub struct Fingerprint {
    pub anchor_freq: u32,
    pub target_freq: u32,
    pub time_delta: u32,
}

impl From<[u32; 3]> for Fingerprint {
    fn from([anchor_freq, target_freq, time_delta]: [u32; 3]) -> Self {
        Self { anchor_freq, target_freq, time_delta }
    }
}

impl From<Fingerprint> for [u32; 3] {
    fn from(fp: Fingerprint) -> Self {
        [fp.anchor_freq, fp.target_freq, fp.time_delta]
    }
}

/// A fingerprint together with the time bin of the anchor point that
/// produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnchoredFingerprint {
    pub fingerprint: Fingerprint,
    pub anchor_time: u32,
}

/// Pair each point with the points that follow it in the constellation map.
///
/// The point at position `i` is paired with positions `i+1 .. i+fan_value-1`
/// (bounded by the map length). A pair is kept when the time gap is within
/// `0..=max_time_delta`. The window is positional, not temporal: several
/// points in the same frame consume slots of the fan-out.
///
/// Duplicate fingerprints are kept.
pub fn generate_fingerprints(
    peaks: &[ConstellationPoint],
    fan_value: usize,
    max_time_delta: u32,
) -> Vec<AnchoredFingerprint> {
    let mut fingerprints = Vec::new();

    for (i, anchor) in peaks.iter().enumerate() {
        for target in peaks.iter().skip(i + 1).take(fan_value.saturating_sub(1)) {
            let Some(time_delta) = target.time_bin.checked_sub(anchor.time_bin) else {
                continue;
            };
            if time_delta > max_time_delta {
                continue;
            }

            fingerprints.push(AnchoredFingerprint {
                fingerprint: Fingerprint {
                    anchor_freq: anchor.freq_bin,
                    target_freq: target.freq_bin,
                    time_delta,
                },
                anchor_time: anchor.time_bin,
            });
        }
    }

    log::debug!(
        "Generated {} fingerprints from {} peaks (fan_value={})",
        fingerprints.len(),
        peaks.len(),
        fan_value
    );
    fingerprints
}
