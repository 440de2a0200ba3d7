use crate::error::SensorError;
use crate::sensors::AccelerationSource;
use tokio::time::{sleep, Duration};

/// Rest-state statistics and the trigger level derived from them.
/// Immutable once produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationProfile {
    pub baseline: f64,
    pub threshold: f64,
    pub noise_range: f64,
    pub sample_count: usize,
}

impl CalibrationProfile {
    /// `threshold = mean + (max - min) * sensitivity`
    ///
    /// Returns None for an empty window.
    pub fn from_samples(samples: &[f64], sensitivity: f64) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        for &m in samples {
            sum += m;
            max = max.max(m);
            min = min.min(m);
        }

        let baseline = sum / samples.len() as f64;
        let noise_range = max - min;
        Some(Self {
            baseline,
            threshold: baseline + noise_range * sensitivity,
            noise_range,
            sample_count: samples.len(),
        })
    }

    pub fn exceeds(&self, magnitude: f64) -> bool {
        magnitude > self.threshold
    }
}

/// Collects a fixed window of rest samples at startup.
pub struct Calibrator {
    sample_count: usize,
    interval: Duration,
    sensitivity: f64,
}

impl Calibrator {
    pub fn new(sample_count: usize, interval: Duration, sensitivity: f64) -> Self {
        Self {
            sample_count,
            interval,
            sensitivity,
        }
    }

    /// Sample the source while the device is assumed stationary.
    /// Any read failure aborts calibration.
    pub async fn calibrate<S>(&self, source: &mut S) -> Result<CalibrationProfile, SensorError>
    where
        S: AccelerationSource + ?Sized,
    {
        log::info!("Calibrating sensor, keep it still ({} samples)", self.sample_count);

        let mut samples = Vec::with_capacity(self.sample_count);
        for _ in 0..self.sample_count {
            samples.push(source.read_magnitude()?);
            sleep(self.interval).await;
        }

        let profile = CalibrationProfile::from_samples(&samples, self.sensitivity)
            .ok_or_else(|| SensorError::Unavailable("empty calibration window".to_string()))?;

        log::info!(
            "Calibration complete: baseline {:.4}, threshold {:.4} (range {:.4})",
            profile.baseline,
            profile.threshold,
            profile.noise_range
        );
        Ok(profile)
    }
}
