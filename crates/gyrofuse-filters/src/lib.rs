//! `gyrofuse-filters` – the numerical core.
//!
//! Pure, single-threaded building blocks; every step is O(1) and allocation
//! free.  Threading, lifecycle and publication live in `gyrofuse-provider`.
//!
//! # Modules
//!
//! - [`calibration`] – [`GyroCalibration`][calibration::GyroCalibration]:
//!   averages a stationary window of gyroscope samples into a fixed bias.
//! - [`integrator`] – [`GyroIntegrator`][integrator::GyroIntegrator]:
//!   advances a quaternion with bias-corrected angular velocity, rejecting
//!   out-of-order samples and pauses.
//! - [`absolute`] – [`AbsoluteEstimator`][absolute::AbsoluteEstimator]:
//!   memoryless tilt-compensated compass from gravity + magnetic field.
//! - [`complementary`] – [`ComplementaryFilter`][complementary::ComplementaryFilter]:
//!   pulls the integrated estimate toward the absolute one with SLERP, either
//!   on every reference or at a fixed cadence.

pub mod absolute;
pub mod calibration;
pub mod complementary;
pub mod integrator;

pub use absolute::AbsoluteEstimator;
pub use calibration::GyroCalibration;
pub use complementary::{ComplementaryFilter, CorrectionCadence, CorrectionOutcome};
pub use integrator::GyroIntegrator;
