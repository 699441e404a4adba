//! Gyroscope integration.
//!
//! Numerically integrates the quaternion kinematic equation
//! `q̇ = ½ q ⊗ (0, ω)` one sample at a time.  Each step composes the current
//! orientation with the exact rotation `exp(ω·Δt/2)` for the bias-corrected
//! angular velocity, so a constant rate integrates to the same result for any
//! step size.
//!
//! The estimate drifts without bound (no absolute reference); correcting that
//! is the job of [`ComplementaryFilter`][crate::complementary::ComplementaryFilter].

use gyrofuse_types::{FusionError, Quaternion, Vec3};

/// Advances an orientation quaternion from angular-velocity samples.
#[derive(Debug, Clone)]
pub struct GyroIntegrator {
    orientation: Quaternion,
    bias: Vec3,
    last_timestamp_ns: Option<u64>,
    max_gap_ns: u64,
}

impl GyroIntegrator {
    /// Create an integrator starting at identity with zero bias.
    ///
    /// Gaps longer than `max_gap_ns` between consecutive samples are not
    /// integrated.
    pub fn new(max_gap_ns: u64) -> Self {
        Self {
            orientation: Quaternion::identity(),
            bias: Vec3::zero(),
            last_timestamp_ns: None,
            max_gap_ns,
        }
    }

    /// Restart from `orientation`, forgetting the previous timestamp.
    pub fn reset(&mut self, orientation: Quaternion) {
        self.orientation = orientation.normalized();
        self.last_timestamp_ns = None;
    }

    /// Replace the integration base point without touching the timestamp
    /// (used after a fusion correction).
    pub fn rebase(&mut self, orientation: Quaternion) {
        self.orientation = orientation.normalized();
    }

    /// Set the timestamp the next sample is measured against.
    pub fn seed_timestamp(&mut self, timestamp_ns: u64) {
        self.last_timestamp_ns = Some(timestamp_ns);
    }

    pub fn set_bias(&mut self, bias: Vec3) {
        self.bias = bias;
    }

    pub fn bias(&self) -> Vec3 {
        self.bias
    }

    pub fn orientation(&self) -> Quaternion {
        self.orientation
    }

    pub fn last_timestamp_ns(&self) -> Option<u64> {
        self.last_timestamp_ns
    }

    /// Integrate one angular-velocity sample (rad/s, device frame).
    ///
    /// The very first sample only establishes the time base and returns the
    /// unchanged orientation.
    ///
    /// # Errors
    ///
    /// - [`FusionError::NonMonotonicTimestamp`] when `timestamp_ns` does not
    ///   advance; nothing is modified.
    /// - [`FusionError::ExcessiveTimeGap`] when the gap exceeds the ceiling;
    ///   the time base moves forward but the orientation is untouched.
    pub fn step(&mut self, timestamp_ns: u64, omega: Vec3) -> Result<Quaternion, FusionError> {
        let Some(previous) = self.last_timestamp_ns else {
            self.last_timestamp_ns = Some(timestamp_ns);
            return Ok(self.orientation);
        };

        if timestamp_ns <= previous {
            return Err(FusionError::NonMonotonicTimestamp {
                previous,
                current: timestamp_ns,
            });
        }

        let gap_ns = timestamp_ns - previous;
        self.last_timestamp_ns = Some(timestamp_ns);
        if gap_ns > self.max_gap_ns {
            return Err(FusionError::ExcessiveTimeGap { gap_ns });
        }

        let dt = (gap_ns as f64 * 1e-9) as f32;
        let corrected = omega.sub(self.bias);
        let delta = Quaternion::from_rotation_vector(corrected.scale(dt));
        self.orientation = self.orientation.mul(delta).normalized();
        Ok(self.orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const MAX_GAP_NS: u64 = 500_000_000;

    fn integrate(omega: Vec3, duration_s: f64, steps: u64) -> Quaternion {
        let mut integ = GyroIntegrator::new(MAX_GAP_NS);
        let dt_ns = (duration_s * 1e9 / steps as f64) as u64;
        for i in 0..=steps {
            integ.step(i * dt_ns, omega).unwrap();
        }
        integ.orientation()
    }

    #[test]
    fn first_sample_only_seeds_time_base() {
        let mut integ = GyroIntegrator::new(MAX_GAP_NS);
        let q = integ.step(1_000, Vec3::new(5.0, 5.0, 5.0)).unwrap();
        assert_eq!(q, Quaternion::identity());
        assert_eq!(integ.last_timestamp_ns(), Some(1_000));
    }

    #[test]
    fn constant_rate_yields_axis_angle_rotation() {
        let axis = Vec3::new(0.0, 0.0, 1.0);
        let q = integrate(axis.scale(FRAC_PI_2), 1.0, 100);
        let expected = Quaternion::from_axis_angle(axis, FRAC_PI_2);
        assert!(q.angle_to(expected) < 1e-3);
        assert!((q.to_euler_angles().yaw - 90.0).abs() < 0.1);
    }

    #[test]
    fn result_independent_of_step_size() {
        let omega = Vec3::new(0.3, -0.7, 0.5);
        let coarse = integrate(omega, 2.0, 20);
        let fine = integrate(omega, 2.0, 1000);
        assert!(coarse.angle_to(fine) < 1e-3);
        let truth = Quaternion::from_rotation_vector(omega.scale(2.0));
        assert!(fine.angle_to(truth) < 1e-3);
    }

    #[test]
    fn norm_stays_unit_over_long_integration() {
        let mut integ = GyroIntegrator::new(MAX_GAP_NS);
        for i in 0..10_000u64 {
            let q = integ.step(i * 10_000_000, Vec3::new(1.3, -0.4, 2.2)).unwrap();
            assert!((q.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn bias_equal_to_rate_yields_no_rotation() {
        let b = Vec3::new(0.02, -0.01, 0.03);
        let mut integ = GyroIntegrator::new(MAX_GAP_NS);
        integ.set_bias(b);
        for i in 0..500u64 {
            integ.step(i * 10_000_000, b).unwrap();
        }
        assert!(integ.orientation().angle_to(Quaternion::identity()) < 1e-6);
    }

    #[test]
    fn out_of_order_sample_is_rejected_without_mutation() {
        let mut integ = GyroIntegrator::new(MAX_GAP_NS);
        integ.step(0, Vec3::zero()).unwrap();
        integ.step(10_000_000, Vec3::new(0.0, 0.0, 1.0)).unwrap();
        let before = integ.orientation();

        let err = integ.step(5_000_000, Vec3::new(0.0, 0.0, 100.0)).unwrap_err();
        assert!(matches!(err, FusionError::NonMonotonicTimestamp { .. }));
        assert_eq!(integ.orientation(), before);
        assert_eq!(integ.last_timestamp_ns(), Some(10_000_000));
    }

    #[test]
    fn duplicate_timestamp_is_rejected() {
        let mut integ = GyroIntegrator::new(MAX_GAP_NS);
        integ.step(100, Vec3::zero()).unwrap();
        assert!(integ.step(100, Vec3::new(1.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn excessive_gap_skips_one_step_then_resumes() {
        let mut integ = GyroIntegrator::new(MAX_GAP_NS);
        integ.step(0, Vec3::zero()).unwrap();
        let err = integ
            .step(2_000_000_000, Vec3::new(0.0, 0.0, 1.0))
            .unwrap_err();
        assert_eq!(err, FusionError::ExcessiveTimeGap { gap_ns: 2_000_000_000 });
        assert_eq!(integ.orientation(), Quaternion::identity());

        // Next sample integrates relative to the resumed time base.
        let q = integ
            .step(2_100_000_000, Vec3::new(0.0, 0.0, 1.0))
            .unwrap();
        assert!((q.angle_to(Quaternion::identity()) - 0.1).abs() < 1e-4);
    }

    #[test]
    fn rebase_keeps_time_base() {
        let mut integ = GyroIntegrator::new(MAX_GAP_NS);
        integ.step(0, Vec3::zero()).unwrap();
        let target = Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), 0.5);
        integ.rebase(target);
        assert_eq!(integ.last_timestamp_ns(), Some(0));
        assert!(integ.orientation().angle_to(target) < 1e-6);
    }
}
