//! Synthetic IMU for headless runs and tests without sensors.
//!
//! [`SimulatedImu`] pushes a scripted motion into a [`SensorHub`] from one
//! thread per sensor kind, each at its own rate, so that samples of
//! different kinds interleave without any ordering guarantee exactly as a
//! real device's callbacks do.
//!
//! The motion is a constant yaw rotation of a level device.  Readings are
//! derived from the true orientation `q(t)` (device → world):
//!
//! | Kind | Reading |
//! |---|---|
//! | Gyroscope | `(0, 0, yaw_rate) + bias` |
//! | Accelerometer | `q⁻¹ · (0, 0, g)` plus deterministic jitter |
//! | Gravity | `q⁻¹ · (0, 0, g)` |
//! | Magnetometer | `q⁻¹ · B` plus deterministic jitter |
//! | RotationVector | vector part of `q` with `w ≥ 0` |
//!
//! # Example
//!
//! ```rust
//! use gyrofuse_middleware::sim::SimulationProfile;
//! use gyrofuse_types::SensorKind;
//!
//! let profile = SimulationProfile::default();
//! let script = profile.script(1_000_000_000);
//! assert!(script.iter().any(|s| s.kind == SensorKind::Gyroscope));
//! assert!(script.windows(2).all(|w| w[0].timestamp_ns <= w[1].timestamp_ns));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use gyrofuse_types::{Quaternion, SensorKind, SensorSample, Vec3};
use tracing::{debug, info, warn};

use crate::feed::{SampleFeed, SensorHub};

/// Standard gravity, m/s².
pub const STANDARD_GRAVITY: f32 = 9.81;

/// World-frame geomagnetic field (µT): northward horizontal component with
/// a downward dip.
pub const EARTH_FIELD: Vec3 = Vec3 {
    x: 0.0,
    y: 22.0,
    z: -40.0,
};

/// Rates and motion for a [`SimulatedImu`].  A rate of `0` disables that
/// sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationProfile {
    pub gyroscope_hz: f32,
    pub accelerometer_hz: f32,
    pub magnetometer_hz: f32,
    pub gravity_hz: f32,
    pub rotation_vector_hz: f32,
    /// Constant yaw rate of the device, degrees per second.
    pub yaw_rate_dps: f32,
    /// Seconds the device holds still before it starts turning.
    pub stationary_s: f32,
    /// Constant offset added to every gyroscope reading, rad/s.
    pub gyro_bias: Vec3,
    /// Jitter amplitude on accelerometer and magnetometer readings, as a
    /// fraction of the true magnitude.
    pub reference_noise: f32,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            gyroscope_hz: 100.0,
            accelerometer_hz: 50.0,
            magnetometer_hz: 50.0,
            gravity_hz: 50.0,
            rotation_vector_hz: 50.0,
            yaw_rate_dps: 30.0,
            stationary_s: 0.0,
            gyro_bias: Vec3::new(0.01, -0.005, 0.02),
            reference_noise: 0.02,
        }
    }
}

impl SimulationProfile {
    pub fn rate_hz(&self, kind: SensorKind) -> f32 {
        match kind {
            SensorKind::Gyroscope => self.gyroscope_hz,
            SensorKind::Accelerometer => self.accelerometer_hz,
            SensorKind::Magnetometer => self.magnetometer_hz,
            SensorKind::Gravity => self.gravity_hz,
            SensorKind::RotationVector => self.rotation_vector_hz,
        }
    }

    /// Sampling period in nanoseconds, `None` when the sensor is disabled.
    pub fn period_ns(&self, kind: SensorKind) -> Option<u64> {
        let hz = self.rate_hz(kind);
        (hz > 0.0).then(|| (1e9 / f64::from(hz)) as u64)
    }

    /// True device → world orientation at `timestamp_ns`.
    pub fn truth_at(&self, timestamp_ns: u64) -> Quaternion {
        let t = timestamp_ns as f64 * 1e-9 - f64::from(self.stationary_s);
        let yaw = (f64::from(self.yaw_rate_dps) * t.max(0.0)).to_radians() as f32;
        Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), yaw)
    }

    /// The reading a `kind` sensor reports at `timestamp_ns`.
    pub fn sample(&self, kind: SensorKind, timestamp_ns: u64) -> SensorSample {
        let q = self.truth_at(timestamp_ns);
        let to_device = q.conjugate();
        let values = match kind {
            SensorKind::Gyroscope => {
                let turning = timestamp_ns as f64 * 1e-9 >= f64::from(self.stationary_s);
                let rate = if turning { self.yaw_rate_dps.to_radians() } else { 0.0 };
                Vec3::new(0.0, 0.0, rate).add(self.gyro_bias)
            }
            SensorKind::Accelerometer => {
                let up = to_device.rotate(Vec3::new(0.0, 0.0, STANDARD_GRAVITY));
                up.add(self.jitter(timestamp_ns, 0.0).scale(STANDARD_GRAVITY))
            }
            SensorKind::Gravity => to_device.rotate(Vec3::new(0.0, 0.0, STANDARD_GRAVITY)),
            SensorKind::Magnetometer => {
                let field = to_device.rotate(EARTH_FIELD);
                field.add(self.jitter(timestamp_ns, 1.3).scale(EARTH_FIELD.norm()))
            }
            SensorKind::RotationVector => {
                let q = if q.w < 0.0 {
                    Quaternion::new(-q.w, -q.x, -q.y, -q.z)
                } else {
                    q
                };
                Vec3::new(q.x, q.y, q.z)
            }
        };
        SensorSample::new(kind, timestamp_ns, values)
    }

    /// Every sample of every enabled sensor over `duration_ns`, merged in
    /// timestamp order.
    pub fn script(&self, duration_ns: u64) -> Vec<SensorSample> {
        let mut samples = Vec::new();
        for kind in SIMULATED_KINDS {
            let Some(period) = self.period_ns(kind) else {
                continue;
            };
            let mut t = period;
            while t <= duration_ns {
                samples.push(self.sample(kind, t));
                t += period;
            }
        }
        samples.sort_by_key(|s| s.timestamp_ns);
        samples
    }

    // Bounded, deterministic pseudo-noise; `phase` decorrelates sensors.
    fn jitter(&self, timestamp_ns: u64, phase: f32) -> Vec3 {
        let t = (timestamp_ns % 1_000_000_000_000) as f32 * 1e-9;
        Vec3::new(
            (t * 37.0 + phase).sin(),
            (t * 53.0 + phase * 2.0).sin(),
            (t * 71.0 + phase * 3.0).sin(),
        )
        .scale(self.reference_noise)
    }
}

const SIMULATED_KINDS: [SensorKind; 5] = [
    SensorKind::Gyroscope,
    SensorKind::Accelerometer,
    SensorKind::Magnetometer,
    SensorKind::Gravity,
    SensorKind::RotationVector,
];

/// Deliver a pre-computed script to `hub` in order, on the calling thread.
pub fn replay(hub: &SensorHub, samples: &[SensorSample]) -> usize {
    samples.iter().map(|s| hub.publish(*s)).sum()
}

/// Real-time synthetic IMU driving a [`SensorHub`].
pub struct SimulatedImu {
    hub: SensorHub,
    profile: Arc<SimulationProfile>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    epoch: Option<Instant>,
}

impl SimulatedImu {
    pub fn new(hub: SensorHub, profile: SimulationProfile) -> Self {
        Self {
            hub,
            profile: Arc::new(profile),
            running: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
            epoch: None,
        }
    }

    pub fn profile(&self) -> &SimulationProfile {
        &self.profile
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Simulated time since the last `start()`, on the sample clock.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.map_or(0, |e| e.elapsed().as_nanos() as u64)
    }

    /// The true orientation right now.
    pub fn truth_now(&self) -> Quaternion {
        self.profile.truth_at(self.elapsed_ns())
    }

    /// Spawn one delivery thread per enabled, available sensor.  A no-op
    /// when already running.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let epoch = Instant::now();
        self.epoch = Some(epoch);

        for kind in SIMULATED_KINDS {
            let Some(period_ns) = self.profile.period_ns(kind) else {
                continue;
            };
            if !self.hub.is_available(kind) {
                debug!(%kind, "sensor not exposed by hub; not simulated");
                continue;
            }

            let hub = self.hub.clone();
            let profile = Arc::clone(&self.profile);
            let running = Arc::clone(&self.running);
            let spawned = thread::Builder::new()
                .name(format!("sim-{kind}"))
                .spawn(move || {
                    let period = Duration::from_nanos(period_ns);
                    let mut last_ns = 0u64;
                    while running.load(Ordering::SeqCst) {
                        // Never repeat a timestamp even on a coarse clock.
                        let now_ns = (epoch.elapsed().as_nanos() as u64).max(last_ns + 1);
                        last_ns = now_ns;
                        hub.publish(profile.sample(kind, now_ns));
                        thread::sleep(period);
                    }
                });

            match spawned {
                Ok(handle) => self.handles.push(handle),
                Err(e) => warn!(%kind, error = %e, "failed to spawn simulated sensor thread"),
            }
        }

        info!(threads = self.handles.len(), "simulated IMU started");
    }

    /// Signal every delivery thread and wait for them to exit.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("simulated sensor thread panicked");
            }
        }
        info!("simulated IMU stopped");
    }
}

impl Drop for SimulatedImu {
    fn drop(&mut self) {
        self.stop();
    }
}
