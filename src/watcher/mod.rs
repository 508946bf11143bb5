//! Deposit Watcher Module
//!
//! Detects deposits to a set of watched addresses by polling a ledger indexer:
//!
//! ```text
//! indexer search → filter → dedup (seen registry) → emit → advance cursor
//! ```
//!
//! ## Components
//!
//! - **types**: deposit events, options, cycle reports and stats
//! - **watch_set**: concurrency-safe set of watched addresses
//! - **seen**: emitted transaction ids, keyed by round
//! - **emitter**: per-kind subscriber registry
//! - **poller**: the poll loop itself

pub mod emitter;
pub mod poller;
pub mod seen;
pub mod types;
pub mod watch_set;

pub use emitter::{EmitOutcome, EventEmitter, Subscriber, SubscriberError, SubscriptionId};
pub use poller::{DepositWatcher, WatcherError};
pub use seen::SeenRegistry;
pub use types::{
    CycleReport, DepositEvent, DepositKind, DepositNotification, WatcherOptions, WatcherStats,
};
pub use watch_set::WatchSet;
