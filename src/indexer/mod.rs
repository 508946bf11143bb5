//! Ledger Indexer Module
//!
//! The transaction-search capability the deposit watcher polls.
//!
//! - **types**: search queries, transaction records and errors
//! - **client**: HTTP client for an Algorand-style indexer (`/v2/transactions`)

pub mod client;
pub mod types;

use async_trait::async_trait;

pub use client::IndexerClient;
pub use types::{
    QueryError, RecordError, SearchQuery, SearchResult, TransactionRecord, TransferPayload, TxType,
};

/// Transaction search over a ledger indexer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Run one search; records come back in ledger order
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, QueryError>;
}
