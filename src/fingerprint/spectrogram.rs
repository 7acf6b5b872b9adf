use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::SpectrogramConfig;
use crate::error::{FingerprintError, Result};

/// STFT magnitudes, stored time-major: `frames[time_bin][freq_bin]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrogram {
    frames: Vec<Vec<f32>>,
    num_bins: usize,
}

impl Spectrogram {
    /// Build from precomputed magnitude rows; every row must have the same
    /// number of bins.
    pub fn from_frames(frames: Vec<Vec<f32>>) -> Result<Self> {
        let num_bins = frames.first().map_or(0, Vec::len);
        if let Some(t) = frames.iter().position(|f| f.len() != num_bins) {
            return Err(FingerprintError::InvalidInput(format!(
                "frame {} has {} bins, expected {}",
                t,
                frames[t].len(),
                num_bins
            )));
        }
        Ok(Self { frames, num_bins })
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn magnitude(&self, time_bin: usize, freq_bin: usize) -> f32 {
        self.frames[time_bin][freq_bin]
    }

    pub fn frame(&self, time_bin: usize) -> &[f32] {
        &self.frames[time_bin]
    }
}

/// Compute the magnitude spectrogram of `samples`.
///
/// Frames are centred: the signal is zero-padded by `fft_size / 2` on both
/// sides, frame `t` covers padded samples `t * hop .. t * hop + fft_size`, and
/// there are `1 + len / hop` frames of `fft_size / 2 + 1` bins each. A
/// periodic Hann window is applied before the FFT. Phase is discarded.
pub fn compute(samples: &[f32], cfg: &SpectrogramConfig) -> Spectrogram {
    if samples.is_empty() {
        return Spectrogram {
            frames: Vec::new(),
            num_bins: 0,
        };
    }

    let fft_size = cfg.fft_size;
    let hop = cfg.hop_size;
    let half = fft_size / 2;
    let num_bins = half + 1;
    let num_frames = 1 + samples.len() / hop;

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_size);
    let hann = hann_window(fft_size);

    let frames: Vec<Vec<f32>> = (0..num_frames)
        .into_par_iter()
        .map(|t| {
            // Padded index p maps to sample p - half.
            let start = (t * hop) as isize - half as isize;
            let mut buffer: Vec<Complex<f32>> = (0..fft_size)
                .map(|i| {
                    let idx = start + i as isize;
                    let s = if idx >= 0 && (idx as usize) < samples.len() {
                        samples[idx as usize]
                    } else {
                        0.0
                    };
                    Complex::new(s * hann[i], 0.0)
                })
                .collect();

            fft.process(&mut buffer);

            buffer[..num_bins].iter().map(|c| c.norm()).collect()
        })
        .collect();

    log::debug!(
        "Spectrogram: {} frames x {} bins (fft={}, hop={})",
        frames.len(),
        num_bins,
        fft_size,
        hop
    );

    Spectrogram { frames, num_bins }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}
