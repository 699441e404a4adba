//! `gyrofuse-types` – shared vocabulary of the orientation-fusion workspace.
//!
//! # Modules
//!
//! - [`rotation`] – [`Quaternion`], [`RotationMatrix`], [`EulerAngles`] and
//!   [`Vec3`], with exact conversions between them.
//! - [`config`] – [`FusionConfig`]: tunable constants with documented
//!   defaults.
//!
//! The crate root holds the sensor sample types, the published
//! [`OrientationState`], the [`ProviderKind`] catalogue, the
//! [`OrientationUpdate`] event and the [`FusionError`] taxonomy.

pub mod config;
pub mod rotation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use config::{DivergenceGuard, FusionConfig, ReferenceSource};
pub use rotation::{EulerAngles, Quaternion, RotationMatrix, Vec3};

/// Kinds of sample a sensor feed can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Angular velocity, rad/s, device frame.
    Gyroscope,
    /// Specific force, m/s², device frame (points away from the ground at rest).
    Accelerometer,
    /// Magnetic field, µT, device frame.
    Magnetometer,
    /// Platform low-pass gravity estimate, same convention as the accelerometer.
    Gravity,
    /// Platform-fused orientation, `axis·sin(θ/2)`.
    RotationVector,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Gyroscope => write!(f, "gyroscope"),
            SensorKind::Accelerometer => write!(f, "accelerometer"),
            SensorKind::Magnetometer => write!(f, "magnetometer"),
            SensorKind::Gravity => write!(f, "gravity"),
            SensorKind::RotationVector => write!(f, "rotation_vector"),
        }
    }
}

/// One timestamped 3-vector reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub kind: SensorKind,
    /// Monotonic clock, nanoseconds.
    pub timestamp_ns: u64,
    pub values: Vec3,
}

impl SensorSample {
    pub fn new(kind: SensorKind, timestamp_ns: u64, values: Vec3) -> Self {
        Self {
            kind,
            timestamp_ns,
            values,
        }
    }

    pub fn gyroscope(timestamp_ns: u64, x: f32, y: f32, z: f32) -> Self {
        Self::new(SensorKind::Gyroscope, timestamp_ns, Vec3::new(x, y, z))
    }

    pub fn accelerometer(timestamp_ns: u64, x: f32, y: f32, z: f32) -> Self {
        Self::new(SensorKind::Accelerometer, timestamp_ns, Vec3::new(x, y, z))
    }

    pub fn magnetometer(timestamp_ns: u64, x: f32, y: f32, z: f32) -> Self {
        Self::new(SensorKind::Magnetometer, timestamp_ns, Vec3::new(x, y, z))
    }

    pub fn gravity(timestamp_ns: u64, x: f32, y: f32, z: f32) -> Self {
        Self::new(SensorKind::Gravity, timestamp_ns, Vec3::new(x, y, z))
    }

    pub fn rotation_vector(timestamp_ns: u64, x: f32, y: f32, z: f32) -> Self {
        Self::new(SensorKind::RotationVector, timestamp_ns, Vec3::new(x, y, z))
    }
}

/// Whether a published orientation can be relied upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stability {
    /// Gyroscope bias is still being estimated; the orientation is identity
    /// or an absolute-only estimate.
    #[default]
    Calibrating,
    Stable,
}

/// The orientation snapshot a provider publishes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationState {
    pub quaternion: Quaternion,
    /// Timestamp of the sample that produced this state (0 before the first
    /// sample).
    pub timestamp_ns: u64,
    pub stability: Stability,
}

impl OrientationState {
    pub fn euler_angles(&self) -> EulerAngles {
        self.quaternion.to_euler_angles()
    }

    pub fn rotation_matrix(&self) -> RotationMatrix {
        self.quaternion.to_rotation_matrix()
    }
}

/// The catalogue of orientation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Gyroscope integration after a stationary bias calibration.
    CalibratedGyroscope,
    /// Absolute only: accelerometer + magnetometer.
    AccelerometerCompass,
    /// Absolute only: gravity sensor + magnetometer.
    GravityCompass,
    /// Gyroscope fused with every absolute reference as it arrives.
    ImprovedOrientation1,
    /// Gyroscope fused with the latest absolute reference every N steps.
    ImprovedOrientation2,
    /// Platform rotation vector, unfiltered.
    RotationVector,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::ImprovedOrientation1,
        ProviderKind::ImprovedOrientation2,
        ProviderKind::RotationVector,
        ProviderKind::CalibratedGyroscope,
        ProviderKind::GravityCompass,
        ProviderKind::AccelerometerCompass,
    ];

    /// Whether this strategy integrates the gyroscope (and so calibrates).
    pub fn uses_gyroscope(&self) -> bool {
        matches!(
            self,
            ProviderKind::CalibratedGyroscope
                | ProviderKind::ImprovedOrientation1
                | ProviderKind::ImprovedOrientation2
        )
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::CalibratedGyroscope => write!(f, "calibrated_gyroscope"),
            ProviderKind::AccelerometerCompass => write!(f, "accelerometer_compass"),
            ProviderKind::GravityCompass => write!(f, "gravity_compass"),
            ProviderKind::ImprovedOrientation1 => write!(f, "improved_orientation_1"),
            ProviderKind::ImprovedOrientation2 => write!(f, "improved_orientation_2"),
            ProviderKind::RotationVector => write!(f, "rotation_vector"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| FusionError::InvalidConfig(format!("unknown provider '{s}'")))
    }
}

/// Event emitted once per published state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrientationUpdate {
    pub id: Uuid,
    /// Wall-clock time of publication.
    pub published_at: DateTime<Utc>,
    pub provider: ProviderKind,
    pub state: OrientationState,
}

impl OrientationUpdate {
    pub fn new(provider: ProviderKind, state: OrientationState) -> Self {
        Self {
            id: Uuid::new_v4(),
            published_at: Utc::now(),
            provider,
            state,
        }
    }
}

/// Every failure condition of the orientation core.
///
/// Only [`FusionError::SensorUnavailable`] and [`FusionError::InvalidConfig`]
/// are ever surfaced to consumers; the others are produced by individual
/// filter steps and absorbed by the provider.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FusionError {
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(SensorKind),

    #[error("Calibration incomplete: {collected}/{required} samples")]
    CalibrationIncomplete { collected: usize, required: usize },

    #[error("Absolute orientation is indeterminate")]
    DegenerateAbsoluteOrientation,

    #[error("Non-monotonic timestamp: {current} after {previous}")]
    NonMonotonicTimestamp { previous: u64, current: u64 },

    #[error("Excessive time gap: {gap_ns} ns")]
    ExcessiveTimeGap { gap_ns: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Channel Error: {0}")]
    Channel(String),
}
