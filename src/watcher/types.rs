//! Deposit Watcher Types
//!
//! Events emitted for detected deposits, per-cycle reports and counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::config::DEFAULT_POLL_INTERVAL_MS;
use crate::indexer::{SearchQuery, TransactionRecord, TransferPayload};

/// Kind of deposit, also the subscription topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepositKind {
    /// Native currency transfer
    #[serde(rename = "deposit_native")]
    Native,
    /// Tokenized asset transfer
    #[serde(rename = "deposit_asset")]
    Asset,
}

impl DepositKind {
    pub const ALL: [DepositKind; 2] = [DepositKind::Native, DepositKind::Asset];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "deposit_native",
            Self::Asset => "deposit_asset",
        }
    }
}

impl std::fmt::Display for DepositKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositEvent {
    /// Transaction ID
    pub id: String,
    pub sender: String,
    /// Watched address that received the deposit
    pub receiver: String,
    /// Amount in base units (microunits or asset base units)
    pub amount: u64,
    /// Set for asset deposits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<u64>,
}

impl DepositEvent {
    pub(crate) fn from_transfer(record: &TransactionRecord, payload: &TransferPayload) -> Self {
        Self {
            id: record.id.clone(),
            sender: record.sender.clone(),
            receiver: payload.receiver.clone(),
            amount: payload.amount,
            asset_id: payload.asset_id,
        }
    }

    pub fn kind(&self) -> DepositKind {
        if self.asset_id.is_some() {
            DepositKind::Asset
        } else {
            DepositKind::Native
        }
    }
}

/// Message pushed to SSE clients
#[derive(Debug, Clone, Serialize)]
pub struct DepositNotification {
    #[serde(rename = "type")]
    pub kind: DepositKind,
    #[serde(rename = "txInfo")]
    pub tx_info: DepositEvent,
}

impl From<&DepositEvent> for DepositNotification {
    fn from(event: &DepositEvent) -> Self {
        Self {
            kind: event.kind(),
            tx_info: event.clone(),
        }
    }
}

/// Construction options for a watcher
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Gap between the end of one cycle and the start of the next
    pub poll_interval: Duration,
    /// Deposits before this instant are never reported (default: now)
    pub start_time: Option<DateTime<Utc>>,
}

impl WatcherOptions {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            start_time: None,
        }
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }
}

/// Summary of one successful poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Window that was searched
    pub query: SearchQuery,
    /// Records returned by the indexer, including undecodable ones
    pub records: usize,
    /// Native deposit events emitted
    pub native: usize,
    /// Asset deposit events emitted
    pub asset: usize,
    /// Records skipped as malformed
    pub malformed: usize,
    /// Subscriber callbacks that failed or panicked
    pub subscriber_failures: usize,
    /// Rounds dropped from the seen registry
    pub evicted_rounds: usize,
    /// Cursor after the cycle
    pub cursor: u64,
}

impl CycleReport {
    pub(crate) fn new(query: SearchQuery, records: usize, cursor: u64) -> Self {
        Self {
            query,
            records,
            native: 0,
            asset: 0,
            malformed: 0,
            subscriber_failures: 0,
            evicted_rounds: 0,
            cursor,
        }
    }

    pub fn emitted(&self) -> usize {
        self.native + self.asset
    }
}

/// Watcher statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatcherStats {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub native_deposits: u64,
    pub asset_deposits: u64,
    pub malformed_records: u64,
    pub subscriber_failures: u64,
    /// Last round reported by the indexer
    pub cursor: Option<u64>,
    pub seen_rounds: usize,
    pub seen_transactions: usize,
    pub watched_addresses: usize,
}

impl std::fmt::Display for WatcherStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cycles: {} ok / {} failed | Deposits: {} native, {} asset | {} malformed | cursor {}",
            self.cycles_completed,
            self.cycles_failed,
            self.native_deposits,
            self.asset_deposits,
            self.malformed_records,
            self.cursor
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string())
        )
    }
}
