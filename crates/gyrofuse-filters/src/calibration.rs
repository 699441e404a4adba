//! Gyroscope bias calibration.
//!
//! The first `N` gyroscope samples after a provider starts are assumed to be
//! taken at rest; their per-axis mean is the bias subtracted from every
//! later sample.  The bias is estimated once and then held fixed.
//!
//! # Example
//!
//! ```rust
//! use gyrofuse_filters::calibration::GyroCalibration;
//! use gyrofuse_types::Vec3;
//!
//! let mut cal = GyroCalibration::new(3);
//! assert!(cal.add_sample(Vec3::new(0.01, 0.0, 0.0)).is_none());
//! assert!(cal.add_sample(Vec3::new(0.01, 0.0, 0.0)).is_none());
//! let bias = cal.add_sample(Vec3::new(0.01, 0.0, 0.0)).unwrap();
//! assert!((bias.x - 0.01).abs() < 1e-7);
//! ```

use gyrofuse_types::{FusionError, Vec3};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
enum CalibrationState {
    Collecting { sum: [f64; 3], count: usize },
    Complete(Vec3),
}

/// Accumulates a fixed window of stationary gyroscope readings.
#[derive(Debug, Clone)]
pub struct GyroCalibration {
    required: usize,
    state: CalibrationState,
}

impl GyroCalibration {
    /// Create a calibration that completes after `required` samples.
    /// A window of `0` completes immediately with zero bias.
    pub fn new(required: usize) -> Self {
        let mut cal = Self {
            required,
            state: CalibrationState::Complete(Vec3::zero()),
        };
        cal.reset();
        cal
    }

    /// Start over with an empty window.
    pub fn reset(&mut self) {
        self.state = if self.required == 0 {
            CalibrationState::Complete(Vec3::zero())
        } else {
            CalibrationState::Collecting {
                sum: [0.0; 3],
                count: 0,
            }
        };
    }

    /// Feed one angular-velocity reading.
    ///
    /// Returns the bias exactly once, on the sample that completes the
    /// window.  Samples offered after completion are ignored.
    pub fn add_sample(&mut self, omega: Vec3) -> Option<Vec3> {
        let CalibrationState::Collecting { sum, count } = &mut self.state else {
            return None;
        };

        sum[0] += f64::from(omega.x);
        sum[1] += f64::from(omega.y);
        sum[2] += f64::from(omega.z);
        *count += 1;

        if *count < self.required {
            return None;
        }

        let n = *count as f64;
        let bias = Vec3::new(
            (sum[0] / n) as f32,
            (sum[1] / n) as f32,
            (sum[2] / n) as f32,
        );
        self.state = CalibrationState::Complete(bias);
        info!(
            samples = self.required,
            bias_x = bias.x,
            bias_y = bias.y,
            bias_z = bias.z,
            "gyroscope calibration complete"
        );
        Some(bias)
    }

    /// Abandon an unfinished window.
    ///
    /// The bias falls back to zero.  Returns the final bias when calibration
    /// had already completed.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::CalibrationIncomplete`] when the window was cut
    /// short.
    pub fn abort(&mut self) -> Result<Vec3, FusionError> {
        match self.state {
            CalibrationState::Complete(bias) => Ok(bias),
            CalibrationState::Collecting { count, .. } => {
                warn!(
                    collected = count,
                    required = self.required,
                    "gyroscope calibration aborted; using zero bias"
                );
                self.state = CalibrationState::Complete(Vec3::zero());
                Err(FusionError::CalibrationIncomplete {
                    collected: count,
                    required: self.required,
                })
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, CalibrationState::Complete(_))
    }

    /// The estimated bias, once complete.
    pub fn bias(&self) -> Option<Vec3> {
        match self.state {
            CalibrationState::Complete(bias) => Some(bias),
            CalibrationState::Collecting { .. } => None,
        }
    }

    pub fn collected(&self) -> usize {
        match self.state {
            CalibrationState::Complete(_) => self.required,
            CalibrationState::Collecting { count, .. } => count,
        }
    }

    pub fn required(&self) -> usize {
        self.required
    }

    /// Fraction of the window collected, `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        if self.required == 0 {
            1.0
        } else {
            self.collected() as f32 / self.required as f32
        }
    }
}
