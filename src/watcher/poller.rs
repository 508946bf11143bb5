//! Deposit Watcher
//!
//! Polls the ledger indexer for new transactions and emits one event per
//! deposit to a watched address.
//!
//! # Cycle
//!
//! 1. Search from the last seen round (or from the start time on the first cycle)
//! 2. Filter each record: start time, type, watched receiver, ignored sender,
//!    asset opt-in, already seen
//! 3. Record the id in the seen registry, then emit
//! 4. Evict seen rounds below the indexer's current round, advance the cursor
//!
//! A failed search leaves the cursor and seen registry untouched; the next
//! cycle retries the same window.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::emitter::{EventEmitter, SubscriberError, SubscriptionId};
use super::seen::SeenRegistry;
use super::types::{CycleReport, DepositEvent, DepositKind, WatcherOptions, WatcherStats};
use super::watch_set::WatchSet;
use crate::common::logging::{log_deposit_event, log_poll_failure, log_system_event};
use crate::indexer::{LedgerQuery, QueryError, RecordError, SearchQuery, TransactionRecord, TxType};

/// Watcher errors
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("ledger query failed: {0}")]
    Query(#[from] QueryError),

    #[error("deposit watcher has been shut down")]
    Stopped,
}

impl WatcherError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, WatcherError::Query(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            WatcherError::Query(_) => "QUERY_ERROR",
            WatcherError::Stopped => "STOPPED",
        }
    }
}

/// Cursor and dedup state, owned by whichever cycle holds the lock
#[derive(Debug, Default)]
struct PollState {
    cursor: Option<u64>,
    seen: SeenRegistry,
}

/// Why a record did not produce a deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    BeforeStart,
    NotTransfer,
    NotWatched,
    IgnoredSender,
    OptIn,
}

pub struct DepositWatcher {
    query: Arc<dyn LedgerQuery>,
    watch_set: WatchSet,
    ignored_senders: HashSet<String>,
    poll_interval: Duration,
    start_time: DateTime<Utc>,
    state: Mutex<PollState>,
    emitter: EventEmitter,
    stats: RwLock<WatcherStats>,
    cancel: CancellationToken,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl DepositWatcher {
    /// Create a watcher without starting its poll loop
    pub fn new<A, I>(
        query: Arc<dyn LedgerQuery>,
        addresses: A,
        ignored_senders: I,
        options: WatcherOptions,
    ) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            query,
            watch_set: WatchSet::new(addresses),
            ignored_senders: ignored_senders.into_iter().map(Into::into).collect(),
            poll_interval: options.poll_interval,
            start_time: options.start_time.unwrap_or_else(Utc::now),
            state: Mutex::new(PollState::default()),
            emitter: EventEmitter::new(),
            stats: RwLock::new(WatcherStats::default()),
            cancel: CancellationToken::new(),
            task: StdMutex::new(None),
        }
    }

    /// Create a watcher and immediately start polling
    pub fn spawn<A, I>(
        query: Arc<dyn LedgerQuery>,
        addresses: A,
        ignored_senders: I,
        options: WatcherOptions,
    ) -> Arc<Self>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let watcher = Arc::new(Self::new(query, addresses, ignored_senders, options));
        watcher.start();
        watcher
    }

    /// Start the poll loop on the current tokio runtime. No-op if already
    /// started or shut down.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() || self.cancel.is_cancelled() {
            return;
        }

        log_system_event(
            "deposit watcher started",
            serde_json::json!({
                "poll_interval_ms": self.poll_interval.as_millis() as u64,
                "start_time": self.start_time.to_rfc3339(),
                "ignored_senders": self.ignored_senders.len(),
            }),
        );

        *task = Some(tokio::spawn(self.clone().run()));
    }

    async fn run(self: Arc<Self>) {
        loop {
            if let Err(WatcherError::Stopped) = self.poll_once().await {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        log_system_event(
            "deposit watcher stopped",
            serde_json::json!({ "stats": self.stats().await }),
        );
    }

    /// Stop polling. Once this returns no further events are emitted.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = task {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "deposit watcher task ended abnormally");
            }
        }

        // Waits out a manually driven cycle, which aborts at its query
        let _state = self.state.lock().await;
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .task
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .map_or(false, |handle| !handle.is_finished())
    }

    /// Run a single poll cycle
    pub async fn poll_once(&self) -> Result<CycleReport, WatcherError> {
        if self.cancel.is_cancelled() {
            return Err(WatcherError::Stopped);
        }

        let mut state = self.state.lock().await;
        let cursor = state.cursor;

        match self.run_cycle(&mut state).await {
            Ok(report) => {
                self.record_cycle(&report, &state).await;
                Ok(report)
            }
            Err(WatcherError::Stopped) => Err(WatcherError::Stopped),
            Err(e) => {
                self.stats.write().await.cycles_failed += 1;
                log_poll_failure(e.error_code(), &e.to_string(), cursor);
                Err(e)
            }
        }
    }

    async fn run_cycle(&self, state: &mut PollState) -> Result<CycleReport, WatcherError> {
        let query = match state.cursor {
            Some(round) => SearchQuery::MinRound(round),
            None => SearchQuery::AfterTime(self.start_time),
        };

        let watched = self.watch_set.snapshot().await;

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(WatcherError::Stopped),
            result = self.query.search(&query) => result?,
        };

        // No await points from here on: the cycle applies in full or not at all
        let mut report = CycleReport::new(
            query,
            result.transactions.len() + result.rejected.len(),
            result.current_round,
        );

        for rejected in &result.rejected {
            report.malformed += 1;
            tracing::warn!(error = %rejected, "skipping malformed transaction record");
        }

        for record in &result.transactions {
            let event = match self.screen(record, &watched) {
                Ok(Ok(event)) => event,
                Ok(Err(skip)) => {
                    tracing::trace!(tx_id = %record.id, reason = ?skip, "transaction skipped");
                    continue;
                }
                Err(e) => {
                    report.malformed += 1;
                    tracing::warn!(error = %e, "skipping malformed transaction record");
                    continue;
                }
            };

            if !state.seen.insert(record.confirmed_round, &record.id) {
                continue;
            }

            let outcome = self.emitter.emit(&event);
            report.subscriber_failures += outcome.failed;
            match event.kind() {
                DepositKind::Native => report.native += 1,
                DepositKind::Asset => report.asset += 1,
            }
            log_deposit_event(&event);
        }

        let current_round = result.current_round;
        if state.cursor != Some(current_round) {
            report.evicted_rounds = state.seen.evict_below(current_round);
        }
        state.cursor = Some(current_round);

        tracing::debug!(
            query = ?report.query,
            records = report.records,
            emitted = report.emitted(),
            malformed = report.malformed,
            evicted = report.evicted_rounds,
            cursor = current_round,
            "poll cycle complete"
        );

        Ok(report)
    }

    /// Decide whether a record is a deposit to a watched address. The inner
    /// error names the filter that rejected it; the outer error is a record
    /// that cannot be interpreted.
    fn screen(
        &self,
        record: &TransactionRecord,
        watched: &HashSet<String>,
    ) -> Result<Result<DepositEvent, Skip>, RecordError> {
        if record.round_time < self.start_time {
            return Ok(Err(Skip::BeforeStart));
        }

        if !record.tx_type.is_transfer() {
            return Ok(Err(Skip::NotTransfer));
        }

        let payload = record.transfer()?;

        if !watched.contains(&payload.receiver) {
            return Ok(Err(Skip::NotWatched));
        }

        if self.ignored_senders.contains(&record.sender) {
            return Ok(Err(Skip::IgnoredSender));
        }

        if record.tx_type == TxType::AssetTransfer
            && record.sender == payload.receiver
            && payload.amount == 0
        {
            return Ok(Err(Skip::OptIn));
        }

        Ok(Ok(DepositEvent::from_transfer(record, payload)))
    }

    async fn record_cycle(&self, report: &CycleReport, state: &PollState) {
        let mut stats = self.stats.write().await;
        stats.cycles_completed += 1;
        stats.native_deposits += report.native as u64;
        stats.asset_deposits += report.asset as u64;
        stats.malformed_records += report.malformed as u64;
        stats.subscriber_failures += report.subscriber_failures as u64;
        stats.cursor = state.cursor;
        stats.seen_rounds = state.seen.round_count();
        stats.seen_transactions = state.seen.transaction_count();
        stats.watched_addresses = self.watch_set.len().await;
    }

    // =========================================================================
    // Watch set
    // =========================================================================

    /// Watch another address, starting with the next cycle
    pub async fn add_watched_address(&self, address: impl Into<String>) -> bool {
        let address = address.into();
        let added = self.watch_set.add(address.clone()).await;
        if added {
            tracing::info!(address = %address, "watching new deposit address");
        }
        added
    }

    pub async fn watched_addresses(&self) -> Vec<String> {
        self.watch_set.list().await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub fn subscribe<F>(&self, kind: DepositKind, callback: F) -> SubscriptionId
    where
        F: Fn(&DepositEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.emitter.subscribe(kind, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.emitter.unsubscribe(id)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub async fn stats(&self) -> WatcherStats {
        self.stats.read().await.clone()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[cfg(test)]
    async fn seen_rounds(&self) -> Vec<u64> {
        self.state.lock().await.seen.rounds().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{MockLedgerQuery, SearchResult, TransferPayload};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::seconds(secs)
    }

    fn pay(
        id: &str,
        sender: &str,
        receiver: &str,
        amount: u64,
        round: u64,
        time: DateTime<Utc>,
    ) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            sender: sender.to_string(),
            tx_type: TxType::Payment,
            confirmed_round: round,
            round_time: time,
            payload: Some(TransferPayload {
                receiver: receiver.to_string(),
                amount,
                asset_id: None,
            }),
        }
    }

    fn axfer(
        id: &str,
        sender: &str,
        receiver: &str,
        amount: u64,
        asset_id: u64,
        round: u64,
        time: DateTime<Utc>,
    ) -> TransactionRecord {
        TransactionRecord {
            tx_type: TxType::AssetTransfer,
            payload: Some(TransferPayload {
                receiver: receiver.to_string(),
                amount,
                asset_id: Some(asset_id),
            }),
            ..pay(id, sender, receiver, amount, round, time)
        }
    }

    fn page(transactions: Vec<TransactionRecord>, current_round: u64) -> SearchResult {
        SearchResult {
            transactions,
            rejected: Vec::new(),
            current_round,
        }
    }

    /// In-memory ledger replaying one scripted response per search. Once the
    /// script runs out it reports an empty result at the last known round.
    #[derive(Default)]
    struct ScriptedLedger {
        responses: StdMutex<VecDeque<Result<SearchResult, QueryError>>>,
        queries: StdMutex<Vec<SearchQuery>>,
        last_round: StdMutex<u64>,
    }

    impl ScriptedLedger {
        fn new(responses: Vec<SearchResult>) -> Arc<Self> {
            Arc::new(Self {
                responses: StdMutex::new(responses.into_iter().map(Ok).collect()),
                ..Self::default()
            })
        }

        fn push(&self, result: SearchResult) {
            self.responses.lock().unwrap().push_back(Ok(result));
        }

        fn queries(&self) -> Vec<SearchQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LedgerQuery for ScriptedLedger {
        async fn search(&self, query: &SearchQuery) -> Result<SearchResult, QueryError> {
            self.queries.lock().unwrap().push(*query);
            let next = self.responses.lock().unwrap().pop_front();
            let mut last_round = self.last_round.lock().unwrap();
            match next {
                Some(Ok(result)) => {
                    *last_round = result.current_round;
                    Ok(result)
                }
                Some(Err(e)) => Err(e),
                None => Ok(page(Vec::new(), *last_round)),
            }
        }
    }

    /// Ledger whose searches never complete
    struct StalledLedger;

    #[async_trait]
    impl LedgerQuery for StalledLedger {
        async fn search(&self, _query: &SearchQuery) -> Result<SearchResult, QueryError> {
            std::future::pending().await
        }
    }

    fn watcher(
        ledger: Arc<dyn LedgerQuery>,
        addresses: &[&str],
        ignored: &[&str],
    ) -> DepositWatcher {
        DepositWatcher::new(
            ledger,
            addresses.iter().copied(),
            ignored.iter().copied(),
            WatcherOptions::new(Duration::from_millis(10)).with_start_time(t0()),
        )
    }

    fn collect(watcher: &DepositWatcher, kind: DepositKind) -> Arc<StdMutex<Vec<DepositEvent>>> {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let sink = events.clone();
        watcher.subscribe(kind, move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        events
    }

    fn ids(events: &Arc<StdMutex<Vec<DepositEvent>>>) -> Vec<String> {
        events.lock().unwrap().iter().map(|e| e.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_three_cycle_scenario() {
        let ledger = ScriptedLedger::new(vec![
            page(vec![pay("tx1", "B", "A", 500, 10, at(1))], 10),
            page(
                vec![
                    pay("tx1", "B", "A", 500, 10, at(1)),
                    axfer("tx2", "A", "A", 0, 7, 10, at(1)),
                ],
                10,
            ),
            page(vec![pay("tx3", "C", "A", 1, 11, at(2))], 11),
        ]);
        let watcher = watcher(ledger.clone(), &["A"], &[]);
        let native = collect(&watcher, DepositKind::Native);
        let asset = collect(&watcher, DepositKind::Asset);

        let report = watcher.poll_once().await.unwrap();
        assert_eq!(report.native, 1);
        assert_eq!(report.cursor, 10);
        assert_eq!(
            native.lock().unwrap()[0],
            DepositEvent {
                id: "tx1".to_string(),
                sender: "B".to_string(),
                receiver: "A".to_string(),
                amount: 500,
                asset_id: None,
            }
        );

        let report = watcher.poll_once().await.unwrap();
        assert_eq!(report.emitted(), 0);
        assert_eq!(report.evicted_rounds, 0);
        assert_eq!(watcher.seen_rounds().await, vec![10]);

        let report = watcher.poll_once().await.unwrap();
        assert_eq!(report.native, 1);
        assert_eq!(report.evicted_rounds, 1);
        assert_eq!(watcher.seen_rounds().await, vec![11]);

        assert_eq!(ids(&native), vec!["tx1", "tx3"]);
        assert!(asset.lock().unwrap().is_empty());
        assert_eq!(
            ledger.queries(),
            vec![
                SearchQuery::AfterTime(t0()),
                SearchQuery::MinRound(10),
                SearchQuery::MinRound(10),
            ]
        );

        let stats = watcher.stats().await;
        assert_eq!(stats.cycles_completed, 3);
        assert_eq!(stats.native_deposits, 2);
        assert_eq!(stats.cursor, Some(11));
        assert_eq!(stats.seen_transactions, 1);
    }

    #[tokio::test]
    async fn test_start_time_boundary() {
        let ledger = ScriptedLedger::new(vec![page(
            vec![
                pay("early", "B", "A", 5, 9, at(-1)),
                pay("exact", "B", "A", 5, 10, t0()),
            ],
            10,
        )]);
        let watcher = watcher(ledger, &["A"], &[]);
        let native = collect(&watcher, DepositKind::Native);

        watcher.poll_once().await.unwrap();

        assert_eq!(ids(&native), vec!["exact"]);
    }

    #[tokio::test]
    async fn test_filters() {
        let mut app_call = pay("appl", "B", "A", 0, 10, at(1));
        app_call.tx_type = TxType::Other("appl".to_string());
        app_call.payload = None;

        let ledger = ScriptedLedger::new(vec![page(
            vec![
                app_call,
                pay("elsewhere", "B", "Z", 5, 10, at(1)),
                pay("ignored", "HOT", "A", 5, 10, at(1)),
                axfer("optin", "A", "A", 0, 7, 10, at(1)),
                axfer("self-send", "A", "A", 3, 7, 10, at(1)),
                axfer("zero-from-other", "B", "A", 0, 7, 10, at(1)),
                axfer("asset", "B", "A", 25, 7, 10, at(1)),
            ],
            10,
        )]);
        let watcher = watcher(ledger, &["A"], &["HOT"]);
        let native = collect(&watcher, DepositKind::Native);
        let asset = collect(&watcher, DepositKind::Asset);

        let report = watcher.poll_once().await.unwrap();

        assert_eq!(report.records, 7);
        assert_eq!(report.malformed, 0);
        assert!(native.lock().unwrap().is_empty());
        assert_eq!(ids(&asset), vec!["self-send", "zero-from-other", "asset"]);
        assert_eq!(asset.lock().unwrap()[2].asset_id, Some(7));
    }

    #[tokio::test]
    async fn test_duplicate_within_one_page() {
        let ledger = ScriptedLedger::new(vec![page(
            vec![
                pay("tx1", "B", "A", 5, 10, at(1)),
                pay("tx1", "B", "A", 5, 10, at(1)),
            ],
            10,
        )]);
        let watcher = watcher(ledger, &["A"], &[]);
        let native = collect(&watcher, DepositKind::Native);

        watcher.poll_once().await.unwrap();

        assert_eq!(ids(&native), vec!["tx1"]);
    }

    #[tokio::test]
    async fn test_failed_query_preserves_state() {
        let mut ledger = MockLedgerQuery::new();
        let mut seq = mockall::Sequence::new();

        ledger
            .expect_search()
            .withf(|q| *q == SearchQuery::AfterTime(t0()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(vec![pay("tx1", "B", "A", 5, 10, at(1))], 10)));
        ledger
            .expect_search()
            .withf(|q| *q == SearchQuery::MinRound(10))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(QueryError::Status(503, "unavailable".to_string())));
        ledger
            .expect_search()
            .withf(|q| *q == SearchQuery::MinRound(10))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(page(vec![pay("tx1", "B", "A", 5, 10, at(1))], 10)));

        let watcher = watcher(Arc::new(ledger), &["A"], &[]);
        let native = collect(&watcher, DepositKind::Native);

        watcher.poll_once().await.unwrap();

        let err = watcher.poll_once().await.unwrap_err();
        assert!(matches!(err, WatcherError::Query(QueryError::Status(503, _))));
        assert!(err.is_retryable());
        assert_eq!(watcher.seen_rounds().await, vec![10]);

        let report = watcher.poll_once().await.unwrap();
        assert_eq!(report.emitted(), 0);
        assert_eq!(ids(&native), vec!["tx1"]);

        let stats = watcher.stats().await;
        assert_eq!(stats.cycles_completed, 2);
        assert_eq!(stats.cycles_failed, 1);
        assert_eq!(stats.cursor, Some(10));
    }

    #[tokio::test]
    async fn test_first_cycle_failure_retries_from_start_time() {
        let ledger = ScriptedLedger::new(Vec::new());
        ledger
            .responses
            .lock()
            .unwrap()
            .push_back(Err(QueryError::Decode("truncated body".to_string())));
        ledger.push(page(vec![pay("tx1", "B", "A", 5, 10, at(1))], 10));

        let watcher = watcher(ledger.clone(), &["A"], &[]);

        assert!(watcher.poll_once().await.is_err());
        assert_eq!(watcher.stats().await.cursor, None);
        assert_eq!(watcher.poll_once().await.unwrap().native, 1);
        assert_eq!(
            ledger.queries(),
            vec![SearchQuery::AfterTime(t0()), SearchQuery::AfterTime(t0())]
        );
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_block_delivery() {
        let ledger = ScriptedLedger::new(vec![page(vec![pay("tx1", "B", "A", 5, 10, at(1))], 10)]);
        let watcher = watcher(ledger, &["A"], &[]);

        watcher.subscribe(DepositKind::Native, |_| {
            Err(SubscriberError::Rejected("closed".to_string()))
        });
        watcher.subscribe(DepositKind::Native, |_| panic!("subscriber bug"));
        let native = collect(&watcher, DepositKind::Native);

        let report = watcher.poll_once().await.unwrap();

        assert_eq!(ids(&native), vec!["tx1"]);
        assert_eq!(report.subscriber_failures, 2);
        assert_eq!(watcher.stats().await.subscriber_failures, 2);
        assert_eq!(watcher.seen_rounds().await, vec![10]);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let ledger = ScriptedLedger::new(vec![
            page(vec![pay("tx1", "B", "A", 5, 10, at(1))], 10),
            page(vec![pay("tx2", "B", "A", 5, 11, at(2))], 11),
        ]);
        let watcher = watcher(ledger, &["A"], &[]);

        let count = Arc::new(StdMutex::new(0));
        let sink = count.clone();
        let id = watcher.subscribe(DepositKind::Native, move |_| {
            *sink.lock().unwrap() += 1;
            Ok(())
        });

        watcher.poll_once().await.unwrap();
        assert!(watcher.unsubscribe(id));
        watcher.poll_once().await.unwrap();

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_address_added_is_honoured_next_cycle() {
        let deposit = pay("tx1", "C", "B", 5, 10, at(1));
        let ledger = ScriptedLedger::new(vec![
            page(vec![deposit.clone()], 10),
            page(vec![deposit], 10),
        ]);
        let watcher = watcher(ledger, &["A"], &[]);
        let native = collect(&watcher, DepositKind::Native);

        watcher.poll_once().await.unwrap();
        assert!(native.lock().unwrap().is_empty());

        assert!(watcher.add_watched_address("B").await);
        assert!(!watcher.add_watched_address("B").await);
        watcher.poll_once().await.unwrap();

        assert_eq!(ids(&native), vec!["tx1"]);
        assert_eq!(watcher.watched_addresses().await, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let mut broken = axfer("broken", "B", "A", 5, 7, 10, at(1));
        if let Some(payload) = broken.payload.as_mut() {
            payload.asset_id = None;
        }
        let mut empty = pay("empty", "B", "A", 5, 10, at(1));
        empty.payload = None;

        let mut result = page(
            vec![broken, empty, pay("tx1", "B", "A", 5, 10, at(1))],
            10,
        );
        result.rejected.push(RecordError::Decode {
            id: "garbled".to_string(),
            reason: "missing field `sender`".to_string(),
        });

        let ledger = ScriptedLedger::new(vec![result]);
        let watcher = watcher(ledger, &["A"], &[]);
        let native = collect(&watcher, DepositKind::Native);

        let report = watcher.poll_once().await.unwrap();

        assert_eq!(report.records, 4);
        assert_eq!(report.malformed, 3);
        assert_eq!(ids(&native), vec!["tx1"]);
        assert_eq!(watcher.stats().await.malformed_records, 3);
    }

    #[tokio::test]
    async fn test_spawned_loop_delivers_and_stops() {
        let ledger = ScriptedLedger::new(vec![page(vec![pay("tx1", "B", "A", 5, 10, at(1))], 10)]);
        let watcher = Arc::new(watcher(ledger.clone(), &["A"], &[]));

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        watcher.subscribe(DepositKind::Native, move |event| {
            tx.send(event.id.clone())
                .map_err(|e| SubscriberError::Rejected(e.to_string()))
        });

        watcher.start();
        assert!(watcher.is_running());

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(received.as_deref(), Some("tx1"));

        // An address added mid-run is picked up by a later cycle
        watcher.add_watched_address("B").await;
        ledger.push(page(vec![pay("tx2", "C", "B", 9, 12, at(3))], 12));
        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(received.as_deref(), Some("tx2"));

        watcher.shutdown().await;
        assert!(!watcher.is_running());

        // Nothing is emitted once shut down, even with new ledger data
        ledger.push(page(vec![pay("tx3", "B", "A", 5, 13, at(4))], 13));
        assert!(matches!(watcher.poll_once().await, Err(WatcherError::Stopped)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_stalled_query() {
        let watcher = Arc::new(watcher(Arc::new(StalledLedger), &["A"], &[]));
        watcher.start();

        let manual = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.poll_once().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), watcher.shutdown())
            .await
            .unwrap();

        let result = manual.await.unwrap();
        assert!(matches!(result, Err(WatcherError::Stopped)));
        assert_eq!(watcher.stats().await.cycles_completed, 0);
    }

    #[tokio::test]
    async fn test_start_after_shutdown_is_noop() {
        let watcher = Arc::new(watcher(ScriptedLedger::new(Vec::new()), &["A"], &[]));
        watcher.shutdown().await;
        watcher.start();
        assert!(!watcher.is_running());
    }
}
