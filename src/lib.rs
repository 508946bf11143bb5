//! Deposit Watcher
//!
//! Watches a ledger for deposits to a set of addresses and reports each one
//! exactly once.
//!
//! ## Modules
//!
//! - **watcher**: poll loop, filtering, dedup and subscriber registry
//! - **indexer**: `LedgerQuery` trait and the HTTP indexer client
//! - **api**: HTTP endpoints and the SSE deposit feed
//! - **common**: configuration, logging and the root error type

pub mod api;
pub mod common;
pub mod indexer;
pub mod watcher;

// Re-exports: watcher core
pub use watcher::{
    DepositEvent, DepositKind, DepositWatcher, SubscriberError, SubscriptionId, WatcherError,
    WatcherOptions, WatcherStats,
};

// Re-exports: ledger indexer
pub use indexer::{IndexerClient, LedgerQuery, QueryError, SearchQuery, SearchResult};

// Re-exports: service shell
pub use common::{AppError, WatcherConfig};
