//! Absolute orientation from gravity and the geomagnetic field.
//!
//! A tilt-compensated compass: the accelerometer (or gravity sensor) gives
//! "up", the magnetometer gives a vector with a northward horizontal
//! component, and their cross products span an orthonormal east/north/up
//! frame expressed in device coordinates.  Stacking those axes as rows gives
//! the device → world rotation matrix.
//!
//! ```text
//! east  = normalize(m × a)
//! north = normalize(a × east)
//! up    = normalize(a)
//! ```
//!
//! `a` is the specific-force reading, which points away from the ground when
//! the device is at rest (the negated gravity vector).
//!
//! Each estimate depends only on the pair it is given, so it cannot drift,
//! but linear acceleration and magnetic disturbances show up directly as
//! jitter.

use gyrofuse_types::{FusionConfig, FusionError, Quaternion, RotationMatrix, Vec3};

/// Memoryless gravity + magnetic-field orientation estimator.
///
/// Keeps the last successful estimate so that callers who prefer to hold a
/// value through a degenerate reading can do so.
#[derive(Debug, Clone)]
pub struct AbsoluteEstimator {
    free_fall_threshold: f32,
    degenerate_threshold: f32,
    last: Option<Quaternion>,
}

impl AbsoluteEstimator {
    /// `free_fall_threshold` is the smallest usable accelerometer magnitude
    /// (m/s²); `degenerate_threshold` the smallest usable sine of the angle
    /// between gravity and the magnetic field.
    pub fn new(free_fall_threshold: f32, degenerate_threshold: f32) -> Self {
        Self {
            free_fall_threshold,
            degenerate_threshold,
            last: None,
        }
    }

    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(config.free_fall_threshold, config.degenerate_threshold)
    }

    /// Build the east/north/up rotation matrix for one reading pair.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DegenerateAbsoluteOrientation`] when the device
    /// is in free fall, the magnetic field is zero, or the two vectors are
    /// nearly parallel.
    pub fn rotation_matrix(&self, accel: Vec3, magnetic: Vec3) -> Result<RotationMatrix, FusionError> {
        let a_norm = accel.norm();
        let m_norm = magnetic.norm();
        if a_norm < self.free_fall_threshold || m_norm <= f32::EPSILON {
            return Err(FusionError::DegenerateAbsoluteOrientation);
        }

        let east_raw = magnetic.cross(accel);
        // |m × a| = |m||a| sin θ
        if east_raw.norm() / (a_norm * m_norm) < self.degenerate_threshold {
            return Err(FusionError::DegenerateAbsoluteOrientation);
        }

        let up = accel.scale(1.0 / a_norm);
        let east = east_raw
            .normalized()
            .ok_or(FusionError::DegenerateAbsoluteOrientation)?;
        let north = up
            .cross(east)
            .normalized()
            .ok_or(FusionError::DegenerateAbsoluteOrientation)?;

        Ok(RotationMatrix::from_rows(east, north, up))
    }

    /// Estimate the device → world orientation.
    ///
    /// # Errors
    ///
    /// See [`AbsoluteEstimator::rotation_matrix`]; the last good estimate is
    /// left untouched on error.
    pub fn estimate(&mut self, accel: Vec3, magnetic: Vec3) -> Result<Quaternion, FusionError> {
        let q = self.rotation_matrix(accel, magnetic)?.to_quaternion();
        self.last = Some(q);
        Ok(q)
    }

    /// Most recent successful estimate.
    pub fn last(&self) -> Option<Quaternion> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
