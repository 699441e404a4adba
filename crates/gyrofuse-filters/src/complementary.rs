//! Complementary fusion of gyroscope integration with an absolute reference.
//!
//! The gyroscope estimate is smooth and responsive but drifts; the absolute
//! estimate is drift-free but noisy.  Every correction blends the two with
//! spherical linear interpolation and makes the blend the new integration
//! base point:
//!
//! ```text
//! q_fused = slerp(q_gyro, q_reference, α)
//! q_gyro  = q_fused
//! ```
//!
//! Two cadences are supported:
//!
//! - [`CorrectionCadence::EveryReference`] corrects as soon as a reference
//!   arrives, independent of gyroscope timing.
//! - [`CorrectionCadence::EveryNGyroSteps`] keeps only the most recent
//!   reference and applies it once per `n` integration steps.

use gyrofuse_types::{DivergenceGuard, FusionConfig, FusionError, Quaternion, Vec3};
use tracing::{debug, warn};

use crate::integrator::GyroIntegrator;

/// When corrections are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionCadence {
    EveryReference,
    EveryNGyroSteps(u32),
}

/// What happened to a reference offered to the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// The estimate was pulled toward the reference.
    Applied,
    /// The reference was stored for the next cadence tick.
    Deferred,
    /// The reference disagreed too much with the estimate and was ignored.
    Outlier,
    /// Too many consecutive outliers: the estimate was replaced by the
    /// reference.
    Reset,
}

/// Gyroscope integrator with periodic SLERP correction.
#[derive(Debug, Clone)]
pub struct ComplementaryFilter {
    integrator: GyroIntegrator,
    weight: f32,
    cadence: CorrectionCadence,
    steps_since_correction: u32,
    pending: Option<Quaternion>,
    guard: Option<DivergenceGuard>,
    consecutive_outliers: u32,
}

impl ComplementaryFilter {
    /// `weight` is the SLERP factor α, clamped to `[0, 1]`.
    pub fn new(integrator: GyroIntegrator, weight: f32, cadence: CorrectionCadence) -> Self {
        Self {
            integrator,
            weight: weight.clamp(0.0, 1.0),
            cadence,
            steps_since_correction: 0,
            pending: None,
            guard: None,
            consecutive_outliers: 0,
        }
    }

    /// Build from the shared configuration.
    pub fn from_config(config: &FusionConfig, cadence: CorrectionCadence) -> Self {
        let mut filter = Self::new(
            GyroIntegrator::new(config.max_integration_gap_ns()),
            config.correction_weight,
            cadence,
        );
        filter.guard = config.divergence;
        filter
    }

    pub fn with_divergence_guard(mut self, guard: DivergenceGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Restart from `orientation` with a new bias, dropping any pending
    /// reference.
    pub fn reset(&mut self, orientation: Quaternion, bias: Vec3) {
        self.integrator.reset(orientation);
        self.integrator.set_bias(bias);
        self.steps_since_correction = 0;
        self.pending = None;
        self.consecutive_outliers = 0;
    }

    pub fn integrator_mut(&mut self) -> &mut GyroIntegrator {
        &mut self.integrator
    }

    pub fn orientation(&self) -> Quaternion {
        self.integrator.orientation()
    }

    pub fn pending_reference(&self) -> Option<Quaternion> {
        self.pending
    }

    /// Integrate one gyroscope sample, applying a due correction afterwards.
    ///
    /// # Errors
    ///
    /// Propagates the integrator's timestamp errors; a rejected sample does
    /// not count toward the correction cadence.
    pub fn on_gyroscope(&mut self, timestamp_ns: u64, omega: Vec3) -> Result<Quaternion, FusionError> {
        self.integrator.step(timestamp_ns, omega)?;

        if let CorrectionCadence::EveryNGyroSteps(n) = self.cadence {
            self.steps_since_correction += 1;
            if self.steps_since_correction >= n.max(1) {
                self.steps_since_correction = 0;
                if let Some(reference) = self.pending.take() {
                    self.correct(reference);
                }
            }
        }

        Ok(self.integrator.orientation())
    }

    /// Offer a valid absolute reference.
    pub fn on_reference(&mut self, reference: Quaternion) -> CorrectionOutcome {
        match self.cadence {
            CorrectionCadence::EveryReference => self.correct(reference),
            CorrectionCadence::EveryNGyroSteps(_) => {
                self.pending = Some(reference);
                CorrectionOutcome::Deferred
            }
        }
    }

    /// The absolute estimator could not produce a reference; the next
    /// correction is skipped and the estimate coasts on the gyroscope.
    pub fn on_indeterminate_reference(&mut self) {
        if self.pending.take().is_some() {
            debug!("pending reference discarded after indeterminate reading");
        }
    }

    fn correct(&mut self, reference: Quaternion) -> CorrectionOutcome {
        let current = self.integrator.orientation();

        if let Some(guard) = self.guard {
            if current.dot(reference).abs() < guard.outlier_threshold {
                self.consecutive_outliers += 1;
                if self.consecutive_outliers > guard.panic_limit {
                    warn!(
                        outliers = self.consecutive_outliers,
                        "gyroscope estimate diverged; snapping to reference"
                    );
                    self.consecutive_outliers = 0;
                    self.integrator.rebase(reference);
                    return CorrectionOutcome::Reset;
                }
                return CorrectionOutcome::Outlier;
            }
            self.consecutive_outliers = 0;
        }

        self.integrator.rebase(current.slerp(reference, self.weight));
        CorrectionOutcome::Applied
    }
}
