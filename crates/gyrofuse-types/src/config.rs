//! Tunable constants shared by every orientation strategy.
//!
//! None of these values is authoritative; each field carries a documented
//! default and can be overridden from the CLI's TOML file.

use serde::{Deserialize, Serialize};

use crate::FusionError;

/// Which absolute-orientation signal a fusion strategy corrects toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    /// Tilt-compensated compass from accelerometer + magnetometer.
    #[default]
    AccelerometerCompass,
    /// Tilt-compensated compass from the platform gravity sensor +
    /// magnetometer.
    GravityCompass,
    /// The platform's own fused rotation vector.
    RotationVector,
}

/// Outlier rejection for the complementary correction.
///
/// A reference that disagrees with the gyroscope estimate by more than
/// `outlier_threshold` (compared as `|q_gyro · q_ref|`) is skipped.  After
/// `panic_limit` consecutive skips the gyroscope estimate is considered lost
/// and is snapped onto the reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergenceGuard {
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold: f32,
    #[serde(default = "default_panic_limit")]
    pub panic_limit: u32,
}

impl Default for DivergenceGuard {
    fn default() -> Self {
        Self {
            outlier_threshold: default_outlier_threshold(),
            panic_limit: default_panic_limit(),
        }
    }
}

/// Parameters for every orientation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Gyroscope samples averaged into the bias estimate after `start()`.
    /// `0` skips calibration (zero bias).
    #[serde(default = "default_calibration_samples")]
    pub calibration_samples: usize,

    /// SLERP weight α pulling the gyroscope estimate toward the absolute
    /// reference on each correction.  `[0, 1]`.
    #[serde(default = "default_correction_weight")]
    pub correction_weight: f32,

    /// Gyroscope integration steps between two corrections for the
    /// fixed-cadence fusion strategy.
    #[serde(default = "default_correction_cadence")]
    pub correction_cadence: u32,

    /// Largest gap between two gyroscope samples (seconds) that is still
    /// integrated.  Longer gaps are treated as a pause.
    #[serde(default = "default_max_integration_gap_s")]
    pub max_integration_gap_s: f32,

    /// Accelerometer magnitude (m/s²) under which the device is assumed to
    /// be in free fall and no tilt can be derived.
    #[serde(default = "default_free_fall_threshold")]
    pub free_fall_threshold: f32,

    /// Minimum `sin` of the angle between gravity and the magnetic field
    /// for a heading to be defined.
    #[serde(default = "default_degenerate_threshold")]
    pub degenerate_threshold: f32,

    /// Capacity of the rolling history kept for chart consumers.
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Absolute reference used by the fusion strategies.
    #[serde(default)]
    pub reference: ReferenceSource,

    /// Optional outlier rejection for fusion corrections.  Disabled by
    /// default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divergence: Option<DivergenceGuard>,
}

fn default_calibration_samples() -> usize {
    200
}
fn default_correction_weight() -> f32 {
    0.02
}
fn default_correction_cadence() -> u32 {
    10
}
fn default_max_integration_gap_s() -> f32 {
    0.5
}
fn default_free_fall_threshold() -> f32 {
    0.981
}
fn default_degenerate_threshold() -> f32 {
    0.05
}
fn default_history_size() -> usize {
    300
}
fn default_outlier_threshold() -> f32 {
    0.85
}
fn default_panic_limit() -> u32 {
    60
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            calibration_samples: default_calibration_samples(),
            correction_weight: default_correction_weight(),
            correction_cadence: default_correction_cadence(),
            max_integration_gap_s: default_max_integration_gap_s(),
            free_fall_threshold: default_free_fall_threshold(),
            degenerate_threshold: default_degenerate_threshold(),
            history_size: default_history_size(),
            reference: ReferenceSource::default(),
            divergence: None,
        }
    }
}

impl FusionConfig {
    /// Largest integrable gap converted to nanoseconds.
    pub fn max_integration_gap_ns(&self) -> u64 {
        (f64::from(self.max_integration_gap_s) * 1e9) as u64
    }

    /// Reject values that would make the filters misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), FusionError> {
        if !(0.0..=1.0).contains(&self.correction_weight) {
            return Err(FusionError::InvalidConfig(format!(
                "correction_weight must be within [0, 1], got {}",
                self.correction_weight
            )));
        }
        if self.correction_cadence == 0 {
            return Err(FusionError::InvalidConfig(
                "correction_cadence must be at least 1".to_string(),
            ));
        }
        if self.max_integration_gap_s.is_nan() || self.max_integration_gap_s <= 0.0 {
            return Err(FusionError::InvalidConfig(
                "max_integration_gap_s must be positive".to_string(),
            ));
        }
        if self.history_size == 0 {
            return Err(FusionError::InvalidConfig(
                "history_size must be at least 1".to_string(),
            ));
        }
        if self.degenerate_threshold < 0.0 || self.free_fall_threshold < 0.0 {
            return Err(FusionError::InvalidConfig(
                "thresholds must not be negative".to_string(),
            ));
        }
        if let Some(guard) = &self.divergence
            && !(0.0..=1.0).contains(&guard.outlier_threshold)
        {
            return Err(FusionError::InvalidConfig(format!(
                "divergence.outlier_threshold must be within [0, 1], got {}",
                guard.outlier_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = FusionConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.calibration_samples, 200);
        assert_eq!(cfg.history_size, 300);
        assert_eq!(cfg.max_integration_gap_ns(), 500_000_000);
    }

    #[test]
    fn weight_out_of_range_is_rejected() {
        let cfg = FusionConfig {
            correction_weight: 1.5,
            ..FusionConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(FusionError::InvalidConfig(_))));
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let cfg = FusionConfig {
            correction_cadence: 0,
            ..FusionConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: FusionConfig = serde_json::from_str(r#"{"correction_weight": 0.1}"#).unwrap();
        assert!((cfg.correction_weight - 0.1).abs() < f32::EPSILON);
        assert_eq!(cfg.correction_cadence, 10);
        assert_eq!(cfg.reference, ReferenceSource::AccelerometerCompass);
        assert!(cfg.divergence.is_none());
    }

    #[test]
    fn reference_source_uses_snake_case() {
        let json = serde_json::to_string(&ReferenceSource::RotationVector).unwrap();
        assert_eq!(json, "\"rotation_vector\"");
    }
}
