//! Per-strategy sample handling.
//!
//! One [`Pipeline`] per provider instance turns each incoming sample into
//! either a new [`OrientationState`] to publish or nothing.  It is plain
//! single-threaded state; the provider serialises access to it.

use std::collections::HashMap;

use gyrofuse_filters::{
    AbsoluteEstimator, ComplementaryFilter, CorrectionCadence, CorrectionOutcome, GyroCalibration,
    GyroIntegrator,
};
use gyrofuse_types::{
    FusionConfig, FusionError, OrientationState, ProviderKind, Quaternion, ReferenceSource,
    SensorKind, SensorSample, Stability, Vec3,
};
use tracing::debug;

/// Result of handling one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Step {
    Publish(OrientationState),
    Skip,
}

fn stable(quaternion: Quaternion, timestamp_ns: u64) -> Step {
    Step::Publish(OrientationState {
        quaternion,
        timestamp_ns,
        stability: Stability::Stable,
    })
}

fn calibrating(quaternion: Quaternion, timestamp_ns: u64) -> Step {
    Step::Publish(OrientationState {
        quaternion,
        timestamp_ns,
        stability: Stability::Calibrating,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Absolute references
// ────────────────────────────────────────────────────────────────────────────

/// Tilt-compensated compass fed by a gravity-like vector and the
/// magnetometer.  The vector sample triggers an estimate against the most
/// recent field reading.
#[derive(Debug, Clone)]
struct Compass {
    vector: SensorKind,
    estimator: AbsoluteEstimator,
    field: Option<Vec3>,
}

impl Compass {
    fn new(vector: SensorKind, config: &FusionConfig) -> Self {
        Self {
            vector,
            estimator: AbsoluteEstimator::from_config(config),
            field: None,
        }
    }

    fn on_sample(&mut self, sample: &SensorSample) -> Option<Result<Quaternion, FusionError>> {
        if sample.kind == SensorKind::Magnetometer {
            self.field = Some(sample.values);
            return None;
        }
        if sample.kind != self.vector {
            return None;
        }
        let field = self.field?;
        Some(self.estimator.estimate(sample.values, field))
    }

    fn reset(&mut self) {
        self.estimator.reset();
        self.field = None;
    }
}

#[derive(Debug, Clone)]
enum Reference {
    Compass(Compass),
    RotationVector { last: Option<Quaternion> },
}

impl Reference {
    fn from_source(source: ReferenceSource, config: &FusionConfig) -> Self {
        match source {
            ReferenceSource::AccelerometerCompass => {
                Self::Compass(Compass::new(SensorKind::Accelerometer, config))
            }
            ReferenceSource::GravityCompass => {
                Self::Compass(Compass::new(SensorKind::Gravity, config))
            }
            ReferenceSource::RotationVector => Self::RotationVector { last: None },
        }
    }

    fn sensors(&self) -> Vec<SensorKind> {
        match self {
            Self::Compass(c) => vec![c.vector, SensorKind::Magnetometer],
            Self::RotationVector { .. } => vec![SensorKind::RotationVector],
        }
    }

    /// `None` when the sample produced no new reference reading.
    fn on_sample(&mut self, sample: &SensorSample) -> Option<Result<Quaternion, FusionError>> {
        match self {
            Self::Compass(c) => c.on_sample(sample),
            Self::RotationVector { last } => {
                if sample.kind != SensorKind::RotationVector {
                    return None;
                }
                let q = Quaternion::from_rotation_vector_sample(sample.values);
                *last = Some(q);
                Some(Ok(q))
            }
        }
    }

    fn last(&self) -> Option<Quaternion> {
        match self {
            Self::Compass(c) => c.estimator.last(),
            Self::RotationVector { last } => *last,
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Compass(c) => c.reset(),
            Self::RotationVector { last } => *last = None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Strategies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Estimator {
    CalibratedGyroscope {
        calibration: GyroCalibration,
        integrator: GyroIntegrator,
    },
    Compass(Compass),
    Fused {
        calibration: GyroCalibration,
        filter: ComplementaryFilter,
        reference: Reference,
    },
    RotationVector,
}

impl Estimator {
    fn new(kind: ProviderKind, config: &FusionConfig) -> Self {
        let fused = |cadence| Self::Fused {
            calibration: GyroCalibration::new(config.calibration_samples),
            filter: ComplementaryFilter::from_config(config, cadence),
            reference: Reference::from_source(config.reference, config),
        };

        match kind {
            ProviderKind::CalibratedGyroscope => Self::CalibratedGyroscope {
                calibration: GyroCalibration::new(config.calibration_samples),
                integrator: GyroIntegrator::new(config.max_integration_gap_ns()),
            },
            ProviderKind::AccelerometerCompass => {
                Self::Compass(Compass::new(SensorKind::Accelerometer, config))
            }
            ProviderKind::GravityCompass => Self::Compass(Compass::new(SensorKind::Gravity, config)),
            ProviderKind::ImprovedOrientation1 => fused(CorrectionCadence::EveryReference),
            ProviderKind::ImprovedOrientation2 => {
                fused(CorrectionCadence::EveryNGyroSteps(config.correction_cadence))
            }
            ProviderKind::RotationVector => Self::RotationVector,
        }
    }

    fn calibration(&self) -> Option<&GyroCalibration> {
        match self {
            Self::CalibratedGyroscope { calibration, .. } | Self::Fused { calibration, .. } => {
                Some(calibration)
            }
            Self::Compass(_) | Self::RotationVector => None,
        }
    }
}

/// Sample-to-state pipeline for one provider.
#[derive(Debug, Clone)]
pub(crate) struct Pipeline {
    estimator: Estimator,
    last_seen: HashMap<SensorKind, u64>,
}

impl Pipeline {
    pub(crate) fn new(kind: ProviderKind, config: &FusionConfig) -> Self {
        Self {
            estimator: Estimator::new(kind, config),
            last_seen: HashMap::new(),
        }
    }

    /// Every sensor kind the strategy subscribes to.
    pub(crate) fn required_sensors(&self) -> Vec<SensorKind> {
        match &self.estimator {
            Estimator::CalibratedGyroscope { .. } => vec![SensorKind::Gyroscope],
            Estimator::Compass(c) => vec![c.vector, SensorKind::Magnetometer],
            Estimator::Fused { reference, .. } => {
                let mut kinds = vec![SensorKind::Gyroscope];
                kinds.extend(reference.sensors());
                kinds
            }
            Estimator::RotationVector => vec![SensorKind::RotationVector],
        }
    }

    /// Forget everything learned in a previous run; calibration starts over.
    pub(crate) fn reset(&mut self) {
        self.last_seen.clear();
        match &mut self.estimator {
            Estimator::CalibratedGyroscope {
                calibration,
                integrator,
            } => {
                calibration.reset();
                integrator.reset(Quaternion::identity());
                integrator.set_bias(Vec3::zero());
            }
            Estimator::Compass(c) => c.reset(),
            Estimator::Fused {
                calibration,
                filter,
                reference,
            } => {
                calibration.reset();
                filter.reset(Quaternion::identity(), Vec3::zero());
                reference.reset();
            }
            Estimator::RotationVector => {}
        }
    }

    /// The state published right after a (re)start.
    pub(crate) fn initial_state(&self) -> OrientationState {
        let calibrating = self
            .estimator
            .calibration()
            .is_some_and(|c| !c.is_complete());
        OrientationState {
            quaternion: Quaternion::identity(),
            timestamp_ns: 0,
            stability: if calibrating {
                Stability::Calibrating
            } else {
                Stability::Stable
            },
        }
    }

    /// Cut an unfinished calibration short (bias falls back to zero).
    pub(crate) fn abort_calibration(&mut self) {
        match &mut self.estimator {
            Estimator::CalibratedGyroscope { calibration, .. } | Estimator::Fused { calibration, .. } => {
                // The calibration logs the abort itself.
                let _ = calibration.abort();
            }
            Estimator::Compass(_) | Estimator::RotationVector => {}
        }
    }

    pub(crate) fn calibration_progress(&self) -> f32 {
        self.estimator.calibration().map_or(1.0, GyroCalibration::progress)
    }

    pub(crate) fn handle(&mut self, sample: SensorSample) -> Step {
        if let Some(&previous) = self.last_seen.get(&sample.kind)
            && sample.timestamp_ns <= previous
        {
            debug!(
                kind = %sample.kind,
                previous,
                current = sample.timestamp_ns,
                "non-monotonic sample dropped"
            );
            return Step::Skip;
        }
        self.last_seen.insert(sample.kind, sample.timestamp_ns);

        let t = sample.timestamp_ns;
        match &mut self.estimator {
            Estimator::CalibratedGyroscope {
                calibration,
                integrator,
            } => {
                if sample.kind != SensorKind::Gyroscope {
                    return Step::Skip;
                }
                if !calibration.is_complete() {
                    return match calibration.add_sample(sample.values) {
                        Some(bias) => {
                            integrator.reset(Quaternion::identity());
                            integrator.set_bias(bias);
                            integrator.seed_timestamp(t);
                            stable(Quaternion::identity(), t)
                        }
                        None => calibrating(Quaternion::identity(), t),
                    };
                }
                match integrator.step(t, sample.values) {
                    Ok(q) => stable(q, t),
                    Err(e) => {
                        debug!(error = %e, "gyroscope sample not integrated");
                        Step::Skip
                    }
                }
            }

            Estimator::Compass(compass) => match compass.on_sample(&sample) {
                Some(Ok(q)) => stable(q, t),
                Some(Err(e)) => {
                    debug!(error = %e, "absolute orientation indeterminate; holding last value");
                    Step::Skip
                }
                None => Step::Skip,
            },

            Estimator::Fused {
                calibration,
                filter,
                reference,
            } => {
                if sample.kind == SensorKind::Gyroscope {
                    let base = reference.last().unwrap_or_default();
                    if !calibration.is_complete() {
                        return match calibration.add_sample(sample.values) {
                            Some(bias) => {
                                filter.reset(base, bias);
                                filter.integrator_mut().seed_timestamp(t);
                                stable(base, t)
                            }
                            None => calibrating(base, t),
                        };
                    }
                    return match filter.on_gyroscope(t, sample.values) {
                        Ok(q) => stable(q, t),
                        Err(e) => {
                            debug!(error = %e, "gyroscope sample not integrated");
                            Step::Skip
                        }
                    };
                }

                match reference.on_sample(&sample) {
                    None => Step::Skip,
                    Some(Err(e)) => {
                        debug!(error = %e, "reference indeterminate; correction skipped");
                        filter.on_indeterminate_reference();
                        Step::Skip
                    }
                    Some(Ok(q)) if !calibration.is_complete() => calibrating(q, t),
                    Some(Ok(q)) => match filter.on_reference(q) {
                        CorrectionOutcome::Applied | CorrectionOutcome::Reset => {
                            stable(filter.orientation(), t)
                        }
                        CorrectionOutcome::Deferred | CorrectionOutcome::Outlier => Step::Skip,
                    },
                }
            }

            Estimator::RotationVector => {
                if sample.kind != SensorKind::RotationVector {
                    return Step::Skip;
                }
                stable(Quaternion::from_rotation_vector_sample(sample.values), t)
            }
        }
    }
}
