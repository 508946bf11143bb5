//! Server-Sent Events for Deposit Notifications
//!
//! Bridges the watcher's synchronous subscriber callbacks to HTTP clients.
//! Uses a tokio broadcast channel so a slow client never stalls a poll cycle;
//! a lagging client skips the messages it missed.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};

use super::server::SharedAppState;
use crate::watcher::{DepositKind, DepositNotification, DepositWatcher, SubscriptionId};

/// Default broadcast buffer per client
pub const DEFAULT_CAPACITY: usize = 100;

pub struct SseBroadcaster {
    sender: broadcast::Sender<DepositNotification>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl SseBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Forward every deposit kind emitted by `watcher` to connected clients
    pub fn attach(&self, watcher: &DepositWatcher) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        for kind in DepositKind::ALL {
            let sender = self.sender.clone();
            let id = watcher.subscribe(kind, move |event| {
                // No connected clients is not a delivery failure
                let _ = sender.send(DepositNotification::from(event));
                Ok(())
            });
            subscriptions.push(id);
        }
    }

    /// Stop forwarding; returns how many subscriptions were removed
    pub fn detach(&self, watcher: &DepositWatcher) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .filter(|id| watcher.unsubscribe(*id))
            .count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DepositNotification> {
        self.sender.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SseBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// GET /updates
///
/// Streams `{"type": ..., "txInfo": {...}}` for every deposit.
pub async fn sse_updates_handler(
    State(state): State<SharedAppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    tracing::debug!(clients = state.broadcaster.client_count(), "sse client connected");

    let updates = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => match Event::default().json_data(&notification) {
                    Ok(event) => return Some((Ok(event), rx)),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode deposit notification");
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "sse client lagging, notifications dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(updates).keep_alive(KeepAlive::default())
}
