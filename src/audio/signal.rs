use crate::error::{FingerprintError, Result};

/// Decoded mono PCM plus its sample rate.
#[derive(Clone, Debug)]
pub struct AudioSignal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        validate(&samples, sample_rate)?;
        Ok(Self { samples, sample_rate })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Boundary check run before any analysis stage.
pub fn validate(samples: &[f32], sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(FingerprintError::InvalidInput("sample rate must be positive".into()));
    }
    if samples.is_empty() {
        return Err(FingerprintError::InvalidInput("no samples".into()));
    }
    if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
        return Err(FingerprintError::InvalidInput(format!(
            "non-finite sample {} at index {}",
            samples[pos], pos
        )));
    }
    Ok(())
}
