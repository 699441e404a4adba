//! Broadcast fan-out of published orientation states.
//!
//! Uses [`tokio::sync::broadcast`] so that every subscriber receives every
//! update without any single slow subscriber blocking the provider.  A
//! subscriber that falls more than the channel capacity behind skips the
//! oldest updates.
//!
//! Several providers may share one bus when strategies run side by side;
//! [`UpdateBus::subscribe_provider`] narrows a receiver to one of them.

use gyrofuse_types::{FusionError, OrientationUpdate, ProviderKind};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered updates before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared update bus.  Clones share the same underlying channel.
#[derive(Clone, Debug)]
pub struct UpdateBus {
    sender: broadcast::Sender<OrientationUpdate>,
}

impl UpdateBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an update.
    ///
    /// Returns the number of receivers handed the update.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Channel`] when nobody is subscribed.
    pub fn publish(&self, update: OrientationUpdate) -> Result<usize, FusionError> {
        self.sender
            .send(update)
            .map_err(|e| FusionError::Channel(format!("update bus send error: {e}")))
    }

    /// Receive every update from every provider.
    pub fn subscribe(&self) -> UpdateReceiver {
        UpdateReceiver {
            provider: None,
            receiver: self.sender.subscribe(),
        }
    }

    /// Receive only updates published by `provider`.
    pub fn subscribe_provider(&self, provider: ProviderKind) -> UpdateReceiver {
        UpdateReceiver {
            provider: Some(provider),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver, optionally filtered to one provider.
pub struct UpdateReceiver {
    provider: Option<ProviderKind>,
    receiver: broadcast::Receiver<OrientationUpdate>,
}

impl UpdateReceiver {
    /// Wait for the next matching update.
    ///
    /// Lagging is logged and skipped.  Returns `None` once every sender is
    /// gone.
    pub async fn recv(&mut self) -> Option<OrientationUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(update) if self.matches(&update) => return Some(update),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(provider = ?self.provider, lagged_by = n, "update receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`UpdateReceiver::recv`]; `None` when no
    /// matching update is buffered.
    pub fn try_recv(&mut self) -> Option<OrientationUpdate> {
        loop {
            match self.receiver.try_recv() {
                Ok(update) if self.matches(&update) => return Some(update),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(provider = ?self.provider, lagged_by = n, "update receiver lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    fn matches(&self, update: &OrientationUpdate) -> bool {
        self.provider.is_none_or(|p| p == update.provider)
    }
}
