//! Indexer HTTP Client
//!
//! Searches an Algorand-style indexer (`GET /v2/transactions`) for confirmed
//! transactions, following `next-token` pagination.

use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::types::{
    QueryError, RecordError, SearchQuery, SearchResult, TransactionRecord, TransferPayload, TxType,
};
use super::LedgerQuery;
use crate::common::config::{WatcherConfig, DEFAULT_PAGE_LIMIT};

/// Header carrying the indexer API token
pub const API_TOKEN_HEADER: &str = "X-Indexer-API-Token";

/// Upper bound on pages fetched per search
pub const DEFAULT_MAX_PAGES: usize = 100;

/// Indexer HTTP client
#[derive(Debug, Clone)]
pub struct IndexerClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    page_limit: u32,
    max_pages: usize,
}

impl IndexerClient {
    /// Create a client with custom URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: None,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Create a client from service configuration
    pub fn from_config(config: &WatcherConfig) -> Result<Self, QueryError> {
        let client = Client::builder().timeout(config.indexer_timeout).build()?;

        Ok(Self {
            client,
            base_url: config.indexer_url.trim_end_matches('/').to_string(),
            api_token: config.indexer_token.clone(),
            page_limit: config.page_limit,
            max_pages: DEFAULT_MAX_PAGES,
        })
    }

    /// Set the API token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Set the page size and page cap
    pub fn with_paging(mut self, page_limit: u32, max_pages: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self.max_pages = max_pages.max(1);
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch a single page of transactions
    async fn fetch_page(
        &self,
        query: &SearchQuery,
        next: Option<&str>,
    ) -> Result<TransactionsPage, QueryError> {
        let url = format!("{}/v2/transactions", self.base_url);

        let mut params: Vec<(&str, String)> = vec![("limit", self.page_limit.to_string())];
        match query {
            SearchQuery::MinRound(round) => params.push(("min-round", round.to_string())),
            SearchQuery::AfterTime(time) => params.push((
                "after-time",
                time.to_rfc3339_opts(SecondsFormat::Secs, true),
            )),
        }
        if let Some(token) = next {
            params.push(("next", token.to_string()));
        }

        let mut request = self.client.get(&url).query(&params);
        if let Some(token) = &self.api_token {
            request = request.header(API_TOKEN_HEADER, token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(QueryError::Status(status.as_u16(), body));
        }

        parse_page(&body)
    }
}

#[async_trait]
impl LedgerQuery for IndexerClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, QueryError> {
        let mut result = SearchResult::default();
        let mut current_round: Option<u64> = None;
        let mut next: Option<String> = None;
        let mut truncated = false;

        for page_no in 0..self.max_pages {
            let page = self.fetch_page(query, next.as_deref()).await?;

            // Later pages may report a higher round; the first one bounds this result
            current_round.get_or_insert(page.current_round);

            let count = page.transactions.len();
            for raw in page.transactions {
                match decode_transaction(raw) {
                    Ok(record) => result.transactions.push(record),
                    Err(e) => result.rejected.push(e),
                }
            }

            match page.next_token {
                Some(token) if count > 0 => {
                    next = Some(token);
                    truncated = page_no + 1 == self.max_pages;
                }
                _ => break,
            }
        }

        let mut current_round = current_round.unwrap_or_default();

        // Unfetched pages hold rounds at or above the last record we saw, so
        // the reported height must not move past it.
        if truncated {
            let resume = match (result.transactions.last(), query) {
                (Some(last), _) => last.confirmed_round,
                (None, SearchQuery::MinRound(round)) => *round,
                (None, SearchQuery::AfterTime(_)) => {
                    return Err(QueryError::Truncated(self.max_pages));
                }
            };
            current_round = current_round.min(resume);

            if matches!(query, SearchQuery::MinRound(round) if current_round <= *round) {
                tracing::warn!(
                    max_pages = self.max_pages,
                    page_limit = self.page_limit,
                    current_round,
                    "search window cannot advance past a full round; raise INDEXER_PAGE_LIMIT"
                );
            } else {
                tracing::warn!(
                    max_pages = self.max_pages,
                    current_round,
                    "transaction search truncated, remaining pages deferred to next cycle"
                );
            }
        }

        result.current_round = current_round;
        Ok(result)
    }
}

/// Parse one page of `/v2/transactions`
pub fn parse_page(body: &str) -> Result<TransactionsPage, QueryError> {
    serde_json::from_str(body).map_err(|e| QueryError::Decode(e.to_string()))
}

/// Convert an indexer transaction into a record
pub fn decode_transaction(value: serde_json::Value) -> Result<TransactionRecord, RecordError> {
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or("<unknown>")
        .to_string();

    let raw: IndexerTransaction =
        serde_json::from_value(value).map_err(|e| RecordError::Decode {
            id: id.clone(),
            reason: e.to_string(),
        })?;

    let round_time = Utc
        .timestamp_opt(raw.round_time, 0)
        .single()
        .ok_or_else(|| RecordError::Decode {
            id: id.clone(),
            reason: format!("invalid round-time {}", raw.round_time),
        })?;

    let tx_type = TxType::from_code(&raw.tx_type);

    let payload = match tx_type {
        TxType::Payment => raw.payment_transaction.map(|p| TransferPayload {
            receiver: p.receiver,
            amount: p.amount,
            asset_id: None,
        }),
        TxType::AssetTransfer => raw.asset_transfer_transaction.map(|a| TransferPayload {
            receiver: a.receiver,
            amount: a.amount,
            asset_id: a.asset_id,
        }),
        TxType::Other(_) => None,
    };

    Ok(TransactionRecord {
        id: raw.id,
        sender: raw.sender,
        tx_type,
        confirmed_round: raw.confirmed_round,
        round_time,
        payload,
    })
}

// =============================================================================
// Indexer API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransactionsPage {
    pub current_round: u64,
    pub next_token: Option<String>,
    #[serde(default)]
    pub transactions: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexerTransaction {
    pub id: String,
    pub sender: String,
    pub tx_type: String,
    pub confirmed_round: u64,
    pub round_time: i64,
    pub payment_transaction: Option<IndexerPayment>,
    pub asset_transfer_transaction: Option<IndexerAssetTransfer>,
}

#[derive(Debug, Deserialize)]
pub struct IndexerPayment {
    pub amount: u64,
    pub receiver: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexerAssetTransfer {
    pub amount: u64,
    pub receiver: String,
    pub asset_id: Option<u64>,
}
