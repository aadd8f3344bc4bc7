// Broadcast Hub - fan-out of summary messages to stream subscribers

mod subscription;

pub use subscription::{ChannelState, SubscriberId, Subscription};

use crate::domain::SummaryMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use subscription::StateCell;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

/// Per-publish delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Open channels whose buffer was full; this message was dropped for them
    pub skipped: usize,
    /// Channels still Connecting, not eligible yet
    pub pending: usize,
    /// Channels found closed and removed
    pub closed: usize,
}

#[derive(Clone)]
struct Channel {
    tx: mpsc::Sender<SummaryMessage>,
    state: Arc<StateCell>,
}

pub(crate) struct HubInner {
    channels: Mutex<HashMap<SubscriberId, Channel>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl HubInner {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, Channel>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        if self.lock().remove(&id).is_some() {
            debug!(subscriber = id, "Subscriber removed");
        }
    }
}

/// Registry of independent bounded channels.
///
/// Publishing never blocks: a slow subscriber loses messages, others are
/// unaffected. Cloning shares the same registry.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                channels: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register a new channel in the Connecting state
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_primed(None)
    }

    /// Register a new channel with `initial` already queued on it
    pub fn subscribe_primed(&self, initial: Option<SummaryMessage>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        if let Some(msg) = initial {
            // Fresh channel with capacity >= 1 cannot be full
            let _ = tx.try_send(msg);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(StateCell::new());
        self.inner.lock().insert(
            id,
            Channel {
                tx,
                state: Arc::clone(&state),
            },
        );
        debug!(subscriber = id, "Subscriber registered");

        Subscription {
            id,
            rx,
            state,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Offer `msg` to every Open channel without waiting
    pub fn publish(&self, msg: &SummaryMessage) -> DeliveryReport {
        // Copy-on-iterate: never hold the registry lock while sending
        let channels: Vec<(SubscriberId, Channel)> = self
            .inner
            .lock()
            .iter()
            .map(|(id, channel)| (*id, channel.clone()))
            .collect();

        let mut report = DeliveryReport::default();
        let mut gone = Vec::new();

        for (id, channel) in channels {
            match channel.state.get() {
                ChannelState::Connecting => report.pending += 1,
                ChannelState::Closed => gone.push(id),
                ChannelState::Open => match channel.tx.try_send(msg.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        trace!(subscriber = id, "Subscriber lagging, message skipped");
                        report.skipped += 1;
                    }
                    Err(TrySendError::Closed(_)) => {
                        channel.state.close();
                        gone.push(id);
                    }
                },
            }
        }

        if !gone.is_empty() {
            report.closed = gone.len();
            let mut registry = self.inner.lock();
            for id in gone {
                registry.remove(&id);
            }
        }

        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Drop every channel; open streams end after draining their buffer
    pub fn close_all(&self) {
        let drained: Vec<Channel> = self.inner.lock().drain().map(|(_, c)| c).collect();
        for channel in &drained {
            channel.state.close();
        }
        debug!(count = drained.len(), "All subscribers closed");
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(crate::application::constants::DEFAULT_CHANNEL_CAPACITY)
    }
}
