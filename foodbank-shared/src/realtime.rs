//! Realtime change notifications and debounced refetching
//!
//! Statement triggers on the watched tables call
//! `pg_notify('table_changes', '{"table": ..., "operation": ...}')`. One
//! long-lived task reads those notifications through a [`ChangeFeed`] and
//! fans them out on a [`ChangeHub`] (a `tokio::sync::broadcast` channel).
//! Each live parcel view subscribes to the hub and runs a [`Debouncer`]:
//!
//! ```text
//! notification ──> restart timer ──(quiet for `delay`)──> cancel in-flight fetch
//!                                                         └─> start new fetch ──> send result
//! ```
//!
//! A subscriber that falls behind the broadcast buffer treats the lag as a
//! change. Results are delivered in order and a superseded fetch never
//! delivers, so the last fetch started is the last one written.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Postgres NOTIFY channel written by the change triggers
pub const CHANGES_CHANNEL: &str = "table_changes";

/// Default quiet period before a refetch
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Buffer size of the broadcast hub
pub const HUB_CAPACITY: usize = 256;

/// Delay before reconnecting a dropped listener
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Realtime errors
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// Listener connection failed
    #[error("Database listener error: {0}")]
    Database(#[from] sqlx::Error),

    /// Notification payload could not be parsed
    #[error("Invalid change payload: {0}")]
    InvalidPayload(String),
}

/// Tables whose changes refresh the parcel list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchedTable {
    Parcels,
    Events,
    Clients,
    Families,
    CollectionCentres,
}

impl WatchedTable {
    pub const ALL: [WatchedTable; 5] = [
        WatchedTable::Parcels,
        WatchedTable::Events,
        WatchedTable::Clients,
        WatchedTable::Families,
        WatchedTable::CollectionCentres,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchedTable::Parcels => "parcels",
            WatchedTable::Events => "events",
            WatchedTable::Clients => "clients",
            WatchedTable::Families => "families",
            WatchedTable::CollectionCentres => "collection_centres",
        }
    }
}

/// Kind of statement that changed a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
    Truncate,
}

/// One change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChange {
    pub table: WatchedTable,
    pub operation: ChangeOperation,
}

impl TableChange {
    /// Parses a trigger payload
    ///
    /// ```
    /// use foodbank_shared::realtime::{ChangeOperation, TableChange, WatchedTable};
    ///
    /// let change = TableChange::parse(r#"{"table": "events", "operation": "INSERT"}"#).unwrap();
    /// assert_eq!(change.table, WatchedTable::Events);
    /// assert_eq!(change.operation, ChangeOperation::Insert);
    /// ```
    pub fn parse(payload: &str) -> Result<Self, RealtimeError> {
        serde_json::from_str(payload).map_err(|e| RealtimeError::InvalidPayload(e.to_string()))
    }
}

/// Source of table change notifications
#[async_trait]
pub trait ChangeFeed: Send {
    /// Waits for the next change; `Ok(None)` once the feed has ended
    async fn next_change(&mut self) -> Result<Option<TableChange>, RealtimeError>;
}

/// [`ChangeFeed`] backed by Postgres LISTEN/NOTIFY
pub struct PgChangeFeed {
    listener: PgListener,
}

impl PgChangeFeed {
    /// Opens a dedicated connection and listens on [`CHANGES_CHANNEL`]
    pub async fn connect(pool: &PgPool) -> Result<Self, RealtimeError> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(CHANGES_CHANNEL).await?;

        tracing::info!(channel = CHANGES_CHANNEL, "Listening for table changes");
        Ok(Self { listener })
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn next_change(&mut self) -> Result<Option<TableChange>, RealtimeError> {
        loop {
            let notification = self.listener.recv().await?;

            match TableChange::parse(notification.payload()) {
                Ok(change) => return Ok(Some(change)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        payload = notification.payload(),
                        "Ignoring change notification"
                    );
                }
            }
        }
    }
}

/// Fan-out point for change notifications
#[derive(Debug, Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<TableChange>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(HUB_CAPACITY)
    }
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.sender.subscribe()
    }

    /// Publishes a change, returning how many subscribers received it
    pub fn publish(&self, change: TableChange) -> usize {
        self.sender.send(change).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Copies changes from `feed` to `hub` until the feed ends or shutdown
pub async fn forward_changes<F: ChangeFeed>(
    mut feed: F,
    hub: &ChangeHub,
    shutdown: &CancellationToken,
) -> Result<(), RealtimeError> {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            change = feed.next_change() => {
                match change? {
                    Some(change) => {
                        let receivers = hub.publish(change);
                        tracing::trace!(
                            table = change.table.as_str(),
                            operation = ?change.operation,
                            receivers,
                            "Published table change"
                        );
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}

/// Keeps a Postgres listener feeding `hub`, reconnecting after failures
pub async fn listen_for_changes(pool: PgPool, hub: ChangeHub, shutdown: CancellationToken) {
    while !shutdown.is_cancelled() {
        let result = match PgChangeFeed::connect(&pool).await {
            Ok(feed) => forward_changes(feed, &hub, &shutdown).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::error!(error = %e, "Change listener failed, reconnecting");
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }

    tracing::info!("Change listener stopped");
}

/// Restarts a timer on every change and refetches once things go quiet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    delay: Duration,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Drives debounced refetches until shutdown, the hub closes, or `out`
    /// is dropped
    ///
    /// `fetch` receives a token that is cancelled when a newer fetch
    /// supersedes it; the superseded future is dropped without delivering.
    pub async fn run<T, F, Fut>(
        self,
        mut changes: broadcast::Receiver<TableChange>,
        mut fetch: F,
        out: mpsc::Sender<T>,
        shutdown: CancellationToken,
    ) where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut deadline: Option<Instant> = None;
        let mut in_flight: Option<(CancellationToken, Pin<Box<Fut>>)> = None;

        loop {
            let timer = async {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };
            let fetching = async {
                match in_flight.as_mut() {
                    Some((_, fut)) => fut.as_mut().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = out.closed() => break,
                change = changes.recv() => match change {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        deadline = Some(Instant::now() + self.delay);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = timer => {
                    deadline = None;
                    if let Some((token, _)) = in_flight.take() {
                        tracing::debug!("Cancelling superseded fetch");
                        token.cancel();
                    }
                    let token = CancellationToken::new();
                    let fut = Box::pin(fetch(token.clone()));
                    in_flight = Some((token, fut));
                }
                result = fetching => {
                    in_flight = None;
                    if out.send(result).await.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some((token, _)) = in_flight.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const INSERT_PARCEL: TableChange = TableChange {
        table: WatchedTable::Parcels,
        operation: ChangeOperation::Insert,
    };

    struct MockChangeFeed {
        changes: VecDeque<TableChange>,
    }

    #[async_trait]
    impl ChangeFeed for MockChangeFeed {
        async fn next_change(&mut self) -> Result<Option<TableChange>, RealtimeError> {
            Ok(self.changes.pop_front())
        }
    }

    #[test]
    fn test_parse_payloads() {
        let change =
            TableChange::parse(r#"{"table": "collection_centres", "operation": "DELETE"}"#).unwrap();
        assert_eq!(change.table, WatchedTable::CollectionCentres);
        assert_eq!(change.operation, ChangeOperation::Delete);

        assert!(TableChange::parse(r#"{"table": "lists", "operation": "INSERT"}"#).is_err());
        assert!(TableChange::parse("not json").is_err());
    }

    #[test]
    fn test_watched_table_names_match_serde() {
        for table in WatchedTable::ALL {
            let json = serde_json::to_string(&table).unwrap();
            assert_eq!(json, format!("\"{}\"", table.as_str()));
        }
    }

    #[tokio::test]
    async fn test_forward_changes_publishes_to_subscribers() {
        let hub = ChangeHub::new(8);
        let mut rx = hub.subscribe();
        let feed = MockChangeFeed {
            changes: VecDeque::from(vec![
                INSERT_PARCEL,
                TableChange {
                    table: WatchedTable::Events,
                    operation: ChangeOperation::Insert,
                },
            ]),
        };

        forward_changes(feed, &hub, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), INSERT_PARCEL);
        assert_eq!(rx.recv().await.unwrap().table, WatchedTable::Events);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = ChangeHub::default();
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(INSERT_PARCEL), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_changes_yields_one_fetch() {
        let (tx, rx) = broadcast::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let debouncer = tokio::spawn(Debouncer::new(Duration::from_millis(500)).run(
            rx,
            move |_token| {
                let counter = counter.clone();
                async move { counter.fetch_add(1, Ordering::SeqCst) + 1 }
            },
            out_tx,
            CancellationToken::new(),
        ));

        for _ in 0..5 {
            tx.send(INSERT_PARCEL).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(out_rx.recv().await, Some(1));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(tx);
        debouncer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_fetch_cancels_older() {
        let (tx, rx) = broadcast::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let tokens: Arc<Mutex<Vec<CancellationToken>>> = Arc::new(Mutex::new(Vec::new()));

        let seen = tokens.clone();
        let debouncer = tokio::spawn(Debouncer::new(Duration::from_millis(500)).run(
            rx,
            move |token| {
                let number = {
                    let mut seen = seen.lock().unwrap();
                    seen.push(token);
                    seen.len()
                };
                async move {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    number
                }
            },
            out_tx,
            CancellationToken::new(),
        ));

        // First fetch starts at 500ms and would finish at 1500ms
        tx.send(INSERT_PARCEL).unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        // Second change fires at 1100ms, superseding the first fetch
        tx.send(INSERT_PARCEL).unwrap();

        assert_eq!(out_rx.recv().await, Some(2));

        {
            let tokens = tokens.lock().unwrap();
            assert_eq!(tokens.len(), 2);
            assert!(tokens[0].is_cancelled());
            assert!(!tokens[1].is_cancelled());
        }

        drop(tx);
        debouncer.await.unwrap();
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lag_counts_as_change() {
        let (tx, rx) = broadcast::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        for _ in 0..3 {
            tx.send(INSERT_PARCEL).unwrap();
        }

        let debouncer = tokio::spawn(Debouncer::default().run(
            rx,
            |_token| async { "refetched" },
            out_tx,
            CancellationToken::new(),
        ));

        assert_eq!(out_rx.recv().await, Some("refetched"));

        drop(tx);
        debouncer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_debouncer() {
        let (_tx, rx) = broadcast::channel::<TableChange>(4);
        let (out_tx, _out_rx) = mpsc::channel::<()>(1);
        let shutdown = CancellationToken::new();

        let debouncer = tokio::spawn(Debouncer::default().run(
            rx,
            |_token| async {},
            out_tx,
            shutdown.clone(),
        ));

        shutdown.cancel();
        debouncer.await.unwrap();
    }
}
