//! `gyrofuse-middleware` – sample plumbing between sensors and providers.
//!
//! Routes timestamped readings to whoever subscribed for them and fans
//! published orientation updates out to any number of consumers, without
//! caring what the numbers mean.
//!
//! # Modules
//!
//! - [`feed`] – [`SampleFeed`] / [`SampleListener`]: the subscribe /
//!   unsubscribe contract a provider consumes, plus [`SensorHub`], an
//!   in-process implementation driven by whoever owns the sensors.
//! - [`bus`] – [`UpdateBus`]: Tokio broadcast fan-out of
//!   [`OrientationUpdate`][gyrofuse_types::OrientationUpdate] events.
//! - [`sim`] – [`SimulatedImu`]: a synthetic IMU pushing scripted motion
//!   into a [`SensorHub`] from one thread per sensor kind.

pub mod bus;
pub mod feed;
pub mod sim;

pub use bus::{UpdateBus, UpdateReceiver};
pub use feed::{SampleFeed, SampleListener, SensorHub, SubscriptionId};
pub use sim::{SimulatedImu, SimulationProfile};
