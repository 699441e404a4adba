//! [`SampleFeed`] – the inbound sensor contract – and [`SensorHub`], its
//! in-process implementation.
//!
//! A feed delivers each [`SensorKind`] on whatever context produced it; the
//! provider never polls.  Listeners are invoked synchronously by the
//! producing thread, so they must return quickly.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use gyrofuse_types::{FusionError, SensorKind, SensorSample};
use tracing::debug;
use uuid::Uuid;

/// Handle returned by [`SampleFeed::subscribe`].
pub type SubscriptionId = Uuid;

/// Receives samples of one kind.
pub trait SampleListener: Send + Sync {
    fn on_sample(&self, sample: SensorSample);
}

impl<F> SampleListener for F
where
    F: Fn(SensorSample) + Send + Sync,
{
    fn on_sample(&self, sample: SensorSample) {
        self(sample)
    }
}

/// Subscribe / unsubscribe interface per sample kind.
pub trait SampleFeed: Send + Sync {
    /// Whether `kind` is present on this device.
    fn is_available(&self, kind: SensorKind) -> bool;

    /// Start delivering `kind` samples to `listener`.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::SensorUnavailable`] when the sensor is absent.
    fn subscribe(
        &self,
        kind: SensorKind,
        listener: Arc<dyn SampleListener>,
    ) -> Result<SubscriptionId, FusionError>;

    /// Stop delivering to a subscription.  Returns `false` for an unknown
    /// id.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

type ListenerTable = HashMap<SensorKind, Vec<(SubscriptionId, Arc<dyn SampleListener>)>>;

/// In-process feed: the owner of the sensors calls [`SensorHub::publish`]
/// and every subscriber of that kind is invoked on the caller's thread.
///
/// Clone it cheaply; all clones share the same subscriber table.
#[derive(Clone, Default)]
pub struct SensorHub {
    available: Arc<RwLock<HashSet<SensorKind>>>,
    listeners: Arc<RwLock<ListenerTable>>,
}

impl SensorHub {
    /// A hub with no sensors.
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub exposing `kinds`.
    pub fn with_sensors(kinds: impl IntoIterator<Item = SensorKind>) -> Self {
        let hub = Self::new();
        for kind in kinds {
            hub.set_available(kind, true);
        }
        hub
    }

    /// A hub exposing every sensor kind.
    pub fn full() -> Self {
        Self::with_sensors([
            SensorKind::Gyroscope,
            SensorKind::Accelerometer,
            SensorKind::Magnetometer,
            SensorKind::Gravity,
            SensorKind::RotationVector,
        ])
    }

    pub fn set_available(&self, kind: SensorKind, available: bool) {
        let mut set = self.available.write().unwrap_or_else(PoisonError::into_inner);
        if available {
            set.insert(kind);
        } else {
            set.remove(&kind);
        }
    }

    /// Deliver `sample` to every subscriber of its kind.
    ///
    /// Returns the number of listeners invoked.  The subscriber table is
    /// not locked while listeners run, so a listener may unsubscribe.
    pub fn publish(&self, sample: SensorSample) -> usize {
        let targets: Vec<Arc<dyn SampleListener>> = {
            let table = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            match table.get(&sample.kind) {
                Some(entries) => entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
                None => return 0,
            }
        };
        for listener in &targets {
            listener.on_sample(sample);
        }
        targets.len()
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: SensorKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl SampleFeed for SensorHub {
    fn is_available(&self, kind: SensorKind) -> bool {
        self.available
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind)
    }

    fn subscribe(
        &self,
        kind: SensorKind,
        listener: Arc<dyn SampleListener>,
    ) -> Result<SubscriptionId, FusionError> {
        if !self.is_available(kind) {
            return Err(FusionError::SensorUnavailable(kind));
        }
        let id = Uuid::new_v4();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, listener));
        debug!(%kind, %id, "sample subscription added");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        for entries in table.values_mut() {
            if let Some(pos) = entries.iter().position(|(sid, _)| *sid == id) {
                entries.remove(pos);
                debug!(%id, "sample subscription removed");
                return true;
            }
        }
        false
    }
}
