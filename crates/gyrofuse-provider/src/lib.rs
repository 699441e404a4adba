//! `gyrofuse-provider` – the orientation provider façade.
//!
//! Consumers only ever see [`OrientationProvider`]: start, stop, and
//! non-blocking reads of the latest published orientation.  Each strategy in
//! [`ProviderKind`] is a variant of one concrete [`Provider`], selected at
//! construction time and bound to an injected
//! [`SampleFeed`][gyrofuse_middleware::SampleFeed].
//!
//! # Modules
//!
//! - [`provider`] – [`Provider`]: lifecycle, snapshot publication, update
//!   hooks and optional [`UpdateBus`][gyrofuse_middleware::UpdateBus]
//!   fan-out.
//! - [`history`] – [`RollingHistory`]: fixed-size FIFO for chart consumers.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use gyrofuse_middleware::SensorHub;
//! use gyrofuse_provider::{OrientationProvider, Provider};
//! use gyrofuse_types::{FusionConfig, ProviderKind, SensorSample};
//!
//! let hub = SensorHub::full();
//! let provider = Provider::new(
//!     ProviderKind::CalibratedGyroscope,
//!     Arc::new(hub.clone()),
//!     FusionConfig { calibration_samples: 0, ..FusionConfig::default() },
//! )
//! .unwrap();
//!
//! provider.start().unwrap();
//! hub.publish(SensorSample::gyroscope(0, 0.0, 0.0, 1.0));
//! hub.publish(SensorSample::gyroscope(100_000_000, 0.0, 0.0, 1.0));
//! assert!(provider.euler_angles().yaw > 5.0);
//! provider.stop();
//! ```

mod estimator;
pub mod history;
pub mod provider;

use gyrofuse_types::{
    EulerAngles, FusionError, OrientationState, ProviderKind, Quaternion, RotationMatrix,
};
use serde::{Deserialize, Serialize};

pub use history::RollingHistory;
pub use provider::{Provider, ProviderBuilder, UpdateHook};

/// Lifecycle phase of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderStatus {
    /// Never started.
    Idle,
    /// Running; gyroscope bias still being estimated.
    Calibrating,
    Running,
    Stopped,
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStatus::Idle => write!(f, "idle"),
            ProviderStatus::Calibrating => write!(f, "calibrating"),
            ProviderStatus::Running => write!(f, "running"),
            ProviderStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// The capability set every orientation strategy exposes.
///
/// Reads never block on sample processing and never fail; before the first
/// sample they return the identity orientation.
pub trait OrientationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Begin continuous estimation.  Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::SensorUnavailable`] when a required sensor is
    /// missing.
    fn start(&self) -> Result<(), FusionError>;

    /// Stop estimation and freeze the published state.  Idempotent.
    fn stop(&self);

    /// The most recently published snapshot.
    fn state(&self) -> OrientationState;

    fn status(&self) -> ProviderStatus;

    fn quaternion(&self) -> Quaternion {
        self.state().quaternion
    }

    fn euler_angles(&self) -> EulerAngles {
        self.state().euler_angles()
    }

    fn rotation_matrix(&self) -> RotationMatrix {
        self.state().rotation_matrix()
    }
}
