use serde::{Deserialize, Serialize};

use super::spectrogram::Spectrogram;

/// A local energy maximum in the spectrogram.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstellationPoint {
    pub time_bin: u32,
    pub freq_bin: u32,
}

/// Extract the constellation map from `spec`.
///
/// A cell is a peak when it is at least as large as each of its in-bounds
/// 4-connected neighbours (up, down, left, right) and strictly larger than
/// `min_magnitude`. Cells on a flat non-zero plateau all qualify.
///
/// The result is ordered by time bin, then frequency bin, both ascending.
/// Fingerprint generation depends on this order.
pub fn find_peaks(spec: &Spectrogram, min_magnitude: f32) -> Vec<ConstellationPoint> {
    let frames = spec.num_frames();
    let bins = spec.num_bins();
    let mut peaks = Vec::new();

    for t in 0..frames {
        for f in 0..bins {
            let val = spec.magnitude(t, f);
            if val <= min_magnitude {
                continue;
            }

            let is_peak = (t == 0 || spec.magnitude(t - 1, f) <= val)
                && (t + 1 == frames || spec.magnitude(t + 1, f) <= val)
                && (f == 0 || spec.magnitude(t, f - 1) <= val)
                && (f + 1 == bins || spec.magnitude(t, f + 1) <= val);

            if is_peak {
                peaks.push(ConstellationPoint {
                    time_bin: t as u32,
                    freq_bin: f as u32,
                });
            }
        }
    }

    log::debug!("Constellation map: {} peaks over {} frames", peaks.len(), frames);
    peaks
}
