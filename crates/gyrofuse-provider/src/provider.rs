//! [`Provider`] – the concrete, thread-safe orientation provider.
//!
//! # Concurrency
//!
//! Samples arrive on whatever thread the [`SampleFeed`] delivers them on;
//! consumers read from their own threads.
//!
//! - The published [`OrientationState`] sits behind an [`RwLock`] and is
//!   copied out whole, so readers never see a torn quaternion.
//! - The per-strategy [`Pipeline`] sits behind a [`Mutex`]; it is the single
//!   writer path and is only ever held for O(1) numeric work.
//! - Every `start()` bumps a generation counter.  Listeners remember the
//!   generation they were registered for, and the publish step re-checks
//!   both `running` and the generation under the state write lock.  `stop()`
//!   clears `running` and then takes that lock once, so once it returns no
//!   in-flight sample can change the published state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use gyrofuse_middleware::{SampleFeed, SampleListener, SubscriptionId, UpdateBus};
use gyrofuse_types::{
    FusionConfig, FusionError, OrientationState, OrientationUpdate, ProviderKind, SensorSample,
    Stability,
};
use tracing::{debug, info, instrument, warn};

use crate::estimator::{Pipeline, Step};
use crate::history::RollingHistory;
use crate::{OrientationProvider, ProviderStatus};

/// Callback invoked once per published state change.
pub type UpdateHook = Arc<dyn Fn(&OrientationState) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder for a [`Provider`].
pub struct ProviderBuilder {
    kind: ProviderKind,
    feed: Arc<dyn SampleFeed>,
    config: FusionConfig,
    bus: Option<UpdateBus>,
}

impl ProviderBuilder {
    pub fn config(mut self, config: FusionConfig) -> Self {
        self.config = config;
        self
    }

    /// Also publish every state change as an [`OrientationUpdate`] on `bus`.
    pub fn bus(mut self, bus: UpdateBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// # Errors
    ///
    /// Returns [`FusionError::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn build(self) -> Result<Provider, FusionError> {
        self.config.validate()?;
        let pipeline = Pipeline::new(self.kind, &self.config);
        let initial = pipeline.initial_state();
        Ok(Provider {
            shared: Arc::new(Shared {
                kind: self.kind,
                feed: self.feed,
                running: AtomicBool::new(false),
                started: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                subscriptions: Mutex::new(Vec::new()),
                pipeline: Mutex::new(pipeline),
                state: RwLock::new(initial),
                hooks: RwLock::new(Vec::new()),
                history: Mutex::new(RollingHistory::new(self.config.history_size)),
                bus: self.bus,
            }),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provider
// ────────────────────────────────────────────────────────────────────────────

struct Shared {
    kind: ProviderKind,
    feed: Arc<dyn SampleFeed>,
    running: AtomicBool,
    started: AtomicBool,
    generation: AtomicU64,
    /// Held for the whole of `start` / `stop`, which serialises them.
    subscriptions: Mutex<Vec<SubscriptionId>>,
    pipeline: Mutex<Pipeline>,
    state: RwLock<OrientationState>,
    hooks: RwLock<Vec<UpdateHook>>,
    history: Mutex<RollingHistory>,
    bus: Option<UpdateBus>,
}

/// A running instance of one orientation strategy.
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct Provider {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("kind", &self.shared.kind)
            .field("status", &self.status())
            .finish()
    }
}

impl Provider {
    /// Start building a provider of `kind` bound to `feed`, with the default
    /// configuration.
    pub fn builder(kind: ProviderKind, feed: Arc<dyn SampleFeed>) -> ProviderBuilder {
        ProviderBuilder {
            kind,
            feed,
            config: FusionConfig::default(),
            bus: None,
        }
    }

    /// Shorthand for `builder(kind, feed).config(config).build()`.
    ///
    /// # Errors
    ///
    /// See [`ProviderBuilder::build`].
    pub fn new(
        kind: ProviderKind,
        feed: Arc<dyn SampleFeed>,
        config: FusionConfig,
    ) -> Result<Self, FusionError> {
        Self::builder(kind, feed).config(config).build()
    }

    /// Register a callback run after every published state change.
    ///
    /// Hooks run on the sample-delivery thread, outside the state lock.
    /// They may read the provider or stop it, but must not register further
    /// hooks.
    pub fn on_update(&self, hook: impl Fn(&OrientationState) + Send + Sync + 'static) {
        self.shared
            .hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    /// Fraction of the calibration window collected, `1.0` for strategies
    /// that do not calibrate.
    pub fn calibration_progress(&self) -> f32 {
        lock(&self.shared.pipeline).calibration_progress()
    }

    /// Snapshot of the rolling chart history: the mean of yaw, pitch and
    /// roll (degrees) for each published state, oldest first.
    pub fn history(&self) -> RollingHistory {
        lock(&self.shared.history).clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

impl OrientationProvider for Provider {
    fn kind(&self) -> ProviderKind {
        self.shared.kind
    }

    /// Subscribe to every required sensor and begin estimating.  A no-op
    /// when already running.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::SensorUnavailable`] for the first required
    /// sensor the feed lacks; nothing is subscribed in that case.
    #[instrument(skip(self), fields(provider = %self.shared.kind))]
    fn start(&self) -> Result<(), FusionError> {
        let shared = &self.shared;
        let mut subscriptions = lock(&shared.subscriptions);
        if shared.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let required = lock(&shared.pipeline).required_sensors();
        if let Some(&missing) = required.iter().find(|k| !shared.feed.is_available(**k)) {
            warn!(sensor = %missing, "required sensor unavailable");
            return Err(FusionError::SensorUnavailable(missing));
        }

        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut pipeline = lock(&shared.pipeline);
            pipeline.reset();
            *shared.state.write().unwrap_or_else(PoisonError::into_inner) =
                pipeline.initial_state();
        }
        lock(&shared.history).clear();
        shared.running.store(true, Ordering::SeqCst);

        let listener: Arc<dyn SampleListener> = Arc::new(ProviderListener {
            shared: Arc::downgrade(shared),
            generation,
        });
        for kind in required {
            match shared.feed.subscribe(kind, Arc::clone(&listener)) {
                Ok(id) => subscriptions.push(id),
                Err(e) => {
                    shared.running.store(false, Ordering::SeqCst);
                    for id in subscriptions.drain(..) {
                        shared.feed.unsubscribe(id);
                    }
                    warn!(error = %e, "subscription failed; start rolled back");
                    return Err(e);
                }
            }
        }

        shared.started.store(true, Ordering::SeqCst);
        info!(generation, "orientation provider started");
        Ok(())
    }

    /// Unsubscribe and freeze the published state.  A no-op when not
    /// running.  Samples still in flight are dropped.
    #[instrument(skip(self), fields(provider = %self.shared.kind))]
    fn stop(&self) {
        let shared = &self.shared;
        let mut subscriptions = lock(&shared.subscriptions);
        if !shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        // Wait out a publish that passed its `running` check before the swap.
        drop(shared.state.write().unwrap_or_else(PoisonError::into_inner));

        for id in subscriptions.drain(..) {
            shared.feed.unsubscribe(id);
        }
        lock(&shared.pipeline).abort_calibration();
        info!("orientation provider stopped");
    }

    fn state(&self) -> OrientationState {
        *self.shared.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> ProviderStatus {
        if self.is_running() {
            match self.state().stability {
                Stability::Calibrating => ProviderStatus::Calibrating,
                Stability::Stable => ProviderStatus::Running,
            }
        } else if self.shared.started.load(Ordering::SeqCst) {
            ProviderStatus::Stopped
        } else {
            ProviderStatus::Idle
        }
    }
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    fn deliver(&self, generation: u64, sample: SensorSample) {
        if !self.is_current(generation) {
            debug!(kind = %sample.kind, "sample for inactive provider dropped");
            return;
        }

        let published = {
            let mut pipeline = lock(&self.pipeline);
            let Step::Publish(next) = pipeline.handle(sample) else {
                return;
            };
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if !self.is_current(generation) {
                return;
            }
            *state = next;
            next
        };

        lock(&self.history).push(published.euler_angles().mean());

        for hook in self.hooks.read().unwrap_or_else(PoisonError::into_inner).iter() {
            hook(&published);
        }

        if let Some(bus) = &self.bus {
            // No subscribers is not a failure for the provider.
            let _ = bus.publish(OrientationUpdate::new(self.kind, published));
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let subscriptions = self
            .subscriptions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for id in subscriptions.drain(..) {
            self.feed.unsubscribe(id);
        }
    }
}

/// Routes feed samples to a provider without keeping it alive.
struct ProviderListener {
    shared: Weak<Shared>,
    generation: u64,
}

impl SampleListener for ProviderListener {
    fn on_sample(&self, sample: SensorSample) {
        if let Some(shared) = self.shared.upgrade() {
            shared.deliver(self.generation, sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyrofuse_middleware::SensorHub;
    use gyrofuse_types::{Quaternion, SensorKind, Vec3};
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    const G: f32 = 9.81;
    const STEP_NS: u64 = 10_000_000;

    fn config(calibration_samples: usize) -> FusionConfig {
        FusionConfig {
            calibration_samples,
            ..FusionConfig::default()
        }
    }

    fn provider(kind: ProviderKind, hub: &SensorHub, config: FusionConfig) -> Provider {
        Provider::new(kind, Arc::new(hub.clone()), config).unwrap()
    }

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    /// Feed whose `unsubscribe` never takes effect, standing in for a
    /// delivery that was already in flight when the provider stopped.
    #[derive(Default)]
    struct LeakyFeed {
        listeners: Mutex<Vec<(SensorKind, Arc<dyn SampleListener>)>>,
    }

    impl LeakyFeed {
        fn push(&self, sample: SensorSample) {
            let listeners = self.listeners.lock().unwrap().clone();
            for (kind, listener) in listeners {
                if kind == sample.kind {
                    listener.on_sample(sample);
                }
            }
        }
    }

    impl SampleFeed for LeakyFeed {
        fn is_available(&self, _kind: SensorKind) -> bool {
            true
        }

        fn subscribe(
            &self,
            kind: SensorKind,
            listener: Arc<dyn SampleListener>,
        ) -> Result<SubscriptionId, FusionError> {
            self.listeners.lock().unwrap().push((kind, listener));
            Ok(SubscriptionId::new_v4())
        }

        fn unsubscribe(&self, _id: SubscriptionId) -> bool {
            true
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    #[test]
    fn start_and_stop_are_idempotent() {
        let hub = SensorHub::full();
        let p = provider(ProviderKind::CalibratedGyroscope, &hub, config(2));
        assert_eq!(p.status(), ProviderStatus::Idle);

        p.start().unwrap();
        p.start().unwrap();
        assert_eq!(hub.subscriber_count(SensorKind::Gyroscope), 1);
        assert_eq!(p.status(), ProviderStatus::Calibrating);

        hub.publish(SensorSample::gyroscope(STEP_NS, 0.0, 0.0, 0.0));
        hub.publish(SensorSample::gyroscope(2 * STEP_NS, 0.0, 0.0, 0.0));
        assert_eq!(p.status(), ProviderStatus::Running);

        p.stop();
        p.stop();
        assert_eq!(hub.subscriber_count(SensorKind::Gyroscope), 0);
        assert_eq!(p.status(), ProviderStatus::Stopped);
    }

    #[test]
    fn missing_sensor_fails_start_without_subscribing() {
        let hub = SensorHub::with_sensors([SensorKind::Gyroscope, SensorKind::Accelerometer]);

        let fused = provider(ProviderKind::ImprovedOrientation1, &hub, config(0));
        assert_eq!(
            fused.start(),
            Err(FusionError::SensorUnavailable(SensorKind::Magnetometer))
        );
        assert_eq!(hub.subscriber_count(SensorKind::Gyroscope), 0);
        assert!(!fused.is_running());
        assert_eq!(fused.status(), ProviderStatus::Idle);

        let passthrough = provider(ProviderKind::RotationVector, &hub, config(0));
        assert_eq!(
            passthrough.start(),
            Err(FusionError::SensorUnavailable(SensorKind::RotationVector))
        );
        assert_eq!(passthrough.quaternion(), Quaternion::identity());
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let hub = SensorHub::full();
        let cfg = FusionConfig {
            correction_weight: 1.5,
            ..FusionConfig::default()
        };
        let result = Provider::new(ProviderKind::ImprovedOrientation1, Arc::new(hub), cfg);
        assert!(matches!(result, Err(FusionError::InvalidConfig(_))));
    }

    #[test]
    fn restart_reruns_calibration() {
        let hub = SensorHub::full();
        let p = provider(ProviderKind::CalibratedGyroscope, &hub, config(5));
        p.start().unwrap();
        for i in 1..=5u64 {
            hub.publish(SensorSample::gyroscope(i * STEP_NS, 0.0, 0.0, 0.3));
        }
        assert_eq!(p.status(), ProviderStatus::Running);

        p.stop();
        // Calibration aborts only when it had not finished.
        assert!((p.calibration_progress() - 1.0).abs() < f32::EPSILON);

        p.start().unwrap();
        assert_eq!(p.status(), ProviderStatus::Calibrating);
        assert_eq!(p.calibration_progress(), 0.0);
        assert_eq!(p.state().stability, Stability::Calibrating);
    }

    #[test]
    fn stop_during_calibration_falls_back_to_zero_bias() {
        let hub = SensorHub::full();
        let p = provider(ProviderKind::CalibratedGyroscope, &hub, config(100));
        p.start().unwrap();
        hub.publish(SensorSample::gyroscope(STEP_NS, 0.0, 0.0, 0.3));
        p.stop();
        assert_eq!(p.status(), ProviderStatus::Stopped);
        assert_eq!(p.quaternion(), Quaternion::identity());
    }

    #[test]
    fn stopped_provider_freezes_state() {
        let hub = SensorHub::full();
        let p = provider(ProviderKind::CalibratedGyroscope, &hub, config(0));
        p.start().unwrap();
        for i in 0..20u64 {
            hub.publish(SensorSample::gyroscope(i * STEP_NS, 0.0, 0.0, 1.0));
        }
        p.stop();
        let frozen = p.state();

        hub.publish(SensorSample::gyroscope(30 * STEP_NS, 0.0, 0.0, 1.0));
        assert_eq!(p.state(), frozen);
        assert_eq!(p.euler_angles(), frozen.euler_angles());
    }

    #[test]
    fn stale_listener_cannot_touch_restarted_provider() {
        let feed = Arc::new(LeakyFeed::default());
        let p = Provider::new(ProviderKind::CalibratedGyroscope, feed.clone(), config(0)).unwrap();

        p.start().unwrap();
        feed.push(SensorSample::gyroscope(1, 0.0, 0.0, 0.0));
        assert_eq!(p.state().timestamp_ns, 1);

        p.stop();
        feed.push(SensorSample::gyroscope(2, 0.0, 0.0, 0.0));
        assert_eq!(p.state().timestamp_ns, 1);

        p.start().unwrap();
        feed.push(SensorSample::gyroscope(3, 0.0, 0.0, 0.0));
        // Both generations' listeners saw the sample; only one counted.
        assert_eq!(p.history().len(), 1);
        assert_eq!(p.state().timestamp_ns, 3);
    }

    #[test]
    fn out_of_order_sample_leaves_state_unchanged() {
        let hub = SensorHub::full();
        let p = provider(ProviderKind::CalibratedGyroscope, &hub, config(0));
        p.start().unwrap();
        hub.publish(SensorSample::gyroscope(0, 0.0, 0.0, 1.0));
        hub.publish(SensorSample::gyroscope(STEP_NS, 0.0, 0.0, 1.0));
        let before = p.state();

        hub.publish(SensorSample::gyroscope(STEP_NS / 2, 0.0, 0.0, 50.0));
        assert_eq!(p.state(), before);
    }

    // ------------------------------------------------------------------
    // Publication
    // ------------------------------------------------------------------

    #[test]
    fn hooks_history_and_bus_see_every_publish() {
        let hub = SensorHub::full();
        let bus = UpdateBus::default();
        let mut rx = bus.subscribe_provider(ProviderKind::RotationVector);
        let p = Provider::builder(ProviderKind::RotationVector, Arc::new(hub.clone()))
            .bus(bus)
            .build()
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        p.on_update(move |state| {
            assert_eq!(state.stability, Stability::Stable);
            c.fetch_add(1, Ordering::SeqCst);
        });

        p.start().unwrap();
        let yaw = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.6);
        for i in 1..=4u64 {
            hub.publish(SensorSample::rotation_vector(i, yaw.x, yaw.y, yaw.z));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let history = p.history();
        assert_eq!(history.len(), 4);
        let expected = yaw.to_euler_angles().mean();
        assert!((history.latest().unwrap() - expected).abs() < 1e-3);

        let update = rx.try_recv().unwrap();
        assert_eq!(update.provider, ProviderKind::RotationVector);
        assert_eq!(update.state.timestamp_ns, 1);
    }

    #[test]
    fn hook_may_stop_the_provider() {
        let hub = SensorHub::full();
        let p = provider(ProviderKind::CalibratedGyroscope, &hub, config(0));
        let handle = p.clone();
        p.on_update(move |_| handle.stop());

        p.start().unwrap();
        hub.publish(SensorSample::gyroscope(1, 0.0, 0.0, 0.0));
        assert_eq!(p.status(), ProviderStatus::Stopped);
        assert_eq!(hub.subscriber_count(SensorKind::Gyroscope), 0);
    }

    #[test]
    fn fusion_pulls_yaw_back_toward_identity_reference() {
        let hub = SensorHub::full();
        let cfg = FusionConfig {
            calibration_samples: 0,
            correction_weight: 0.1,
            ..FusionConfig::default()
        };
        let fused = provider(ProviderKind::ImprovedOrientation1, &hub, cfg.clone());
        let gyro_only = provider(ProviderKind::CalibratedGyroscope, &hub, cfg);
        fused.start().unwrap();
        gyro_only.start().unwrap();

        let yaw_rate = std::f32::consts::FRAC_PI_2;
        hub.publish(SensorSample::magnetometer(1, 0.0, 22.0, -40.0));
        for i in 0..100u64 {
            let t = i * STEP_NS;
            hub.publish(SensorSample::gyroscope(t, 0.0, 0.0, yaw_rate));
            if i % 10 == 9 {
                hub.publish(SensorSample::accelerometer(t + 1, 0.0, 0.0, G));
            }
        }

        let raw_yaw = gyro_only.euler_angles().yaw;
        let fused_yaw = fused.euler_angles().yaw;
        assert!((raw_yaw - 89.1).abs() < 0.5, "gyro-only yaw {raw_yaw}");
        assert!(fused_yaw < 60.0 && fused_yaw > 40.0, "fused yaw {fused_yaw}");
        assert_eq!(fused.status(), ProviderStatus::Running);
    }

    #[test]
    fn fixed_cadence_fusion_converges_on_static_device() {
        let hub = SensorHub::full();
        let cfg = FusionConfig {
            calibration_samples: 10,
            correction_weight: 0.2,
            correction_cadence: 5,
            ..FusionConfig::default()
        };
        let p = provider(ProviderKind::ImprovedOrientation2, &hub, cfg);
        p.start().unwrap();

        let truth = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 1.0);
        let to_device = truth.conjugate();
        let a = to_device.rotate(Vec3::new(0.0, 0.0, G));
        let m = to_device.rotate(Vec3::new(0.0, 22.0, -40.0));
        let bias = Vec3::new(0.02, -0.01, 0.015);

        for i in 1..=600u64 {
            let t = i * STEP_NS;
            hub.publish(SensorSample::new(SensorKind::Gyroscope, t, bias));
            if i % 2 == 0 {
                hub.publish(SensorSample::new(SensorKind::Magnetometer, t, m));
                hub.publish(SensorSample::new(SensorKind::Accelerometer, t, a));
            }
        }
        assert!(p.quaternion().angle_to(truth) < 0.01);
    }

    // ------------------------------------------------------------------
    // Concurrency
    // ------------------------------------------------------------------

    #[test]
    fn concurrent_readers_never_see_torn_state() {
        let hub = SensorHub::full();
        let p = provider(ProviderKind::CalibratedGyroscope, &hub, config(0));
        p.start().unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let p = p.clone();
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut reads = 0u64;
                    loop {
                        let q = p.quaternion();
                        assert!((q.norm() - 1.0).abs() < 1e-5, "torn or non-unit {q:?}");
                        reads += 1;
                        if done.load(Ordering::SeqCst) {
                            break reads;
                        }
                    }
                })
            })
            .collect();

        let writer = {
            let hub = hub.clone();
            thread::spawn(move || {
                for i in 0..5_000u64 {
                    hub.publish(SensorSample::gyroscope(i * 1_000_000, 1.3, -0.4, 2.2));
                }
            })
        };
        writer.join().unwrap();
        done.store(true, Ordering::SeqCst);
        for r in readers {
            assert!(r.join().unwrap() > 0);
        }
    }

    #[test]
    fn independent_providers_do_not_interfere() {
        let hub = SensorHub::full();
        let a = provider(ProviderKind::CalibratedGyroscope, &hub, config(0));
        let b = provider(ProviderKind::CalibratedGyroscope, &hub, config(0));
        a.start().unwrap();
        for i in 0..10u64 {
            hub.publish(SensorSample::gyroscope(i * STEP_NS, 0.0, 0.0, 1.0));
        }
        b.start().unwrap();
        assert_eq!(b.quaternion(), Quaternion::identity());
        assert!(a.quaternion().angle_to(Quaternion::identity()) > 0.05);
    }

    #[test]
    fn stop_while_delivering_freezes_state() {
        let hub = SensorHub::full();
        let p = provider(ProviderKind::CalibratedGyroscope, &hub, config(0));
        p.start().unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let hub = hub.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut i = 0u64;
                while !done.load(Ordering::SeqCst) {
                    hub.publish(SensorSample::gyroscope(i * 1_000_000, 0.0, 0.0, 3.0));
                    i += 1;
                }
            })
        };

        thread::sleep(Duration::from_millis(20));
        p.stop();
        let frozen = p.state();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(p.state(), frozen);

        done.store(true, Ordering::SeqCst);
        writer.join().unwrap();
        assert_eq!(p.state(), frozen);
    }
}
