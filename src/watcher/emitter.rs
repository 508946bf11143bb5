//! Deposit Event Emitter
//!
//! Publish/subscribe registry: each [`DepositKind`] maps to an ordered list of
//! callbacks invoked synchronously on emit. A failing or panicking callback is
//! logged and skipped; the remaining callbacks still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

use super::types::{DepositEvent, DepositKind};

/// Errors raised by subscriber callbacks
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("subscriber rejected event: {0}")]
    Rejected(String),

    #[error("subscriber panicked: {0}")]
    Panicked(String),
}

/// Subscriber callback
pub type Subscriber = Arc<dyn Fn(&DepositEvent) -> Result<(), SubscriberError> + Send + Sync>;

/// Handle returned by [`EventEmitter::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Delivery result of one emit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOutcome {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<DepositKind, Vec<(SubscriptionId, Subscriber)>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one kind of deposit
    pub fn subscribe<F>(&self, kind: DepositKind, callback: F) -> SubscriptionId
    where
        F: Fn(&DepositEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        for list in subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|(sub_id, _)| *sub_id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn subscriber_count(&self, kind: DepositKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver an event to every subscriber of its kind, in registration order
    pub fn emit(&self, event: &DepositEvent) -> EmitOutcome {
        let kind = event.kind();

        // Callbacks run outside the lock so they may (un)subscribe
        let targets: Vec<(SubscriptionId, Subscriber)> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut outcome = EmitOutcome::default();

        for (id, callback) in targets {
            let result = catch_unwind(AssertUnwindSafe(|| callback(event)))
                .unwrap_or_else(|panic| Err(SubscriberError::Panicked(panic_message(&*panic))));

            match result {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        subscription = ?id,
                        kind = %kind,
                        tx_id = %event.id,
                        error = %e,
                        "deposit subscriber failed"
                    );
                }
            }
        }

        outcome
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("native", &self.subscriber_count(DepositKind::Native))
            .field("asset", &self.subscriber_count(DepositKind::Asset))
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
