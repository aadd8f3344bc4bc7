// Subscriber channel lifecycle

use super::HubInner;
use crate::domain::SummaryMessage;
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Weak;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub type SubscriberId = u64;

/// Connecting -> Open -> Closed (terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug)]
pub(super) struct StateCell(AtomicU8);

impl StateCell {
    pub(super) fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub(super) fn get(&self) -> ChannelState {
        match self.0.load(Ordering::Acquire) {
            0 => ChannelState::Connecting,
            1 => ChannelState::Open,
            _ => ChannelState::Closed,
        }
    }

    /// Connecting -> Open; no-op in any other state
    pub(super) fn open(&self) {
        let _ = self
            .0
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(super) fn close(&self) {
        self.0.store(2, Ordering::Release);
    }
}

/// One subscriber's end of the summary feed.
///
/// The first poll completes the handshake (channel becomes Open).
/// Dropping it closes the channel and removes it from the hub.
pub struct Subscription {
    pub(super) id: SubscriberId,
    pub(super) rx: mpsc::Receiver<SummaryMessage>,
    pub(super) state: std::sync::Arc<StateCell>,
    pub(super) hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn state(&self) -> ChannelState {
        self.state.get()
    }

    /// Next message, `None` once the hub closed the channel
    pub async fn recv(&mut self) -> Option<SummaryMessage> {
        self.state.open();
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = SummaryMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.state.open();
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.state.close();
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}
