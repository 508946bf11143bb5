//! Ledger Indexer Types
//!
//! Transaction records as the watcher consumes them, independent of the
//! indexer's wire format.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from a transaction search. Always treated as transient.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("indexer returned status {0}: {1}")]
    Status(u16, String),

    #[error("malformed indexer response: {0}")]
    Decode(String),

    #[error("search truncated after {0} pages with no usable record to resume from")]
    Truncated(usize),
}

/// A single transaction record that could not be interpreted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("undecodable transaction {id}: {reason}")]
    Decode { id: String, reason: String },

    #[error("transaction {id} of type {tx_type} has no transfer payload")]
    MissingPayload { id: String, tx_type: String },

    #[error("asset transfer {0} has no asset id")]
    MissingAssetId(String),
}

/// Search window for one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchQuery {
    /// Transactions confirmed at or after this round
    MinRound(u64),
    /// Transactions with ledger time at or after this instant
    AfterTime(DateTime<Utc>),
}

/// Transaction type as reported by the indexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxType {
    /// `pay` - native currency transfer
    Payment,
    /// `axfer` - tokenized asset transfer
    AssetTransfer,
    /// Anything else (key registration, app calls, ...)
    Other(String),
}

impl TxType {
    pub fn from_code(code: &str) -> Self {
        match code {
            "pay" => TxType::Payment,
            "axfer" => TxType::AssetTransfer,
            other => TxType::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            TxType::Payment => "pay",
            TxType::AssetTransfer => "axfer",
            TxType::Other(code) => code,
        }
    }

    /// Whether this type can carry a deposit
    pub fn is_transfer(&self) -> bool {
        matches!(self, TxType::Payment | TxType::AssetTransfer)
    }
}

impl std::fmt::Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Type-specific transfer data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPayload {
    pub receiver: String,
    pub amount: u64,
    /// Present for asset transfers only
    pub asset_id: Option<u64>,
}

/// A confirmed transaction returned by a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: String,
    pub sender: String,
    pub tx_type: TxType,
    pub confirmed_round: u64,
    pub round_time: DateTime<Utc>,
    pub payload: Option<TransferPayload>,
}

impl TransactionRecord {
    /// Transfer payload of a `pay`/`axfer` record
    pub fn transfer(&self) -> Result<&TransferPayload, RecordError> {
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| RecordError::MissingPayload {
                id: self.id.clone(),
                tx_type: self.tx_type.to_string(),
            })?;

        if self.tx_type == TxType::AssetTransfer && payload.asset_id.is_none() {
            return Err(RecordError::MissingAssetId(self.id.clone()));
        }

        Ok(payload)
    }
}

/// Outcome of one (possibly multi-page) search
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Records in ledger order
    pub transactions: Vec<TransactionRecord>,
    /// Records the client could not decode, in the order encountered
    pub rejected: Vec<RecordError>,
    /// Ledger height as reported by the indexer
    pub current_round: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tx_type: TxType, payload: Option<TransferPayload>) -> TransactionRecord {
        TransactionRecord {
            id: "TX1".to_string(),
            sender: "SENDER".to_string(),
            tx_type,
            confirmed_round: 5,
            round_time: Utc::now(),
            payload,
        }
    }

    #[test]
    fn test_tx_type_codes() {
        assert_eq!(TxType::from_code("pay"), TxType::Payment);
        assert_eq!(TxType::from_code("axfer"), TxType::AssetTransfer);
        assert_eq!(TxType::from_code("appl"), TxType::Other("appl".to_string()));
        assert!(!TxType::from_code("keyreg").is_transfer());
        assert_eq!(TxType::AssetTransfer.to_string(), "axfer");
    }

    #[test]
    fn test_transfer_payload_checks() {
        let missing = record(TxType::Payment, None);
        assert!(matches!(
            missing.transfer(),
            Err(RecordError::MissingPayload { .. })
        ));

        let no_asset = record(
            TxType::AssetTransfer,
            Some(TransferPayload {
                receiver: "R".to_string(),
                amount: 1,
                asset_id: None,
            }),
        );
        assert_eq!(
            no_asset.transfer(),
            Err(RecordError::MissingAssetId("TX1".to_string()))
        );

        let pay = record(
            TxType::Payment,
            Some(TransferPayload {
                receiver: "R".to_string(),
                amount: 10,
                asset_id: None,
            }),
        );
        assert_eq!(pay.transfer().unwrap().amount, 10);
    }
}
