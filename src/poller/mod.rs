//! Poller that periodically fetches queue statistics from the backend.

mod state;

pub use state::*;

use crate::client::{AstproxyClient, ClientError};
use crate::stats::{is_queue_id, QueueStats};

use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinSet;

/// Source of complete statistics snapshots.
pub trait StatsSource: Send + Sync + 'static {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Snapshot, ClientError>> + Send;
}

impl StatsSource for AstproxyClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, ClientError> {
        let queues = self.queues().await?;

        let mut tasks = JoinSet::new();
        for key in queues.keys().filter(|k| is_queue_id(k)) {
            let client = self.clone();
            let key = key.clone();
            tasks.spawn(async move {
                let stats = client.queue_stats(&key).await;
                (key, stats)
            });
        }

        let mut stats: BTreeMap<String, QueueStats> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (key, result) = joined.map_err(|e| ClientError::Network(e.to_string()))?;
            let queue_stats = result?;
            if queue_stats.is_empty() {
                tracing::warn!("Poller: queue {} returned no counters", key);
            }
            stats.insert(key, queue_stats);
        }

        let (agents, history, alarms) =
            tokio::try_join!(self.agent_stats(), self.history(), self.alarms())?;

        Ok(Snapshot {
            queues,
            stats,
            agents,
            history,
            alarms,
            fetched_at: Utc::now(),
        })
    }
}

/// Result of one poll attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The snapshot of this generation is now current.
    Applied(u64),
    /// A newer snapshot was applied before this one finished; result dropped.
    Stale(u64),
    /// The fetch failed; the previous snapshot stays current.
    Failed(String),
    /// A poll was already in flight.
    Skipped,
}

/// Marks a fetch as in flight until dropped, including on cancellation.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Polls a [`StatsSource`] and keeps the latest snapshot.
///
/// Every fetch takes a generation number. A result is applied only when it
/// is newer than the snapshot already applied, so the state never moves
/// back to an older fetch.
pub struct Poller<S> {
    source: Arc<S>,
    state: Arc<RwLock<DashboardState>>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    interval: Duration,
    stop: Mutex<Option<broadcast::Sender<()>>>,
}

impl<S: StatsSource> Poller<S> {
    pub fn new(source: Arc<S>, interval: Duration) -> Self {
        Self {
            source,
            state: Arc::new(RwLock::new(DashboardState::default())),
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            interval,
            stop: Mutex::new(None),
        }
    }

    pub fn state(&self) -> Arc<RwLock<DashboardState>> {
        self.state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Start the background poll loop.
    pub async fn start(self: &Arc<Self>) {
        let (tx, mut rx) = broadcast::channel(1);
        *self.stop.lock().await = Some(tx);

        let poller = self.clone();
        tokio::spawn(async move {
            // Jitter so several dashboards do not hit the backend in lockstep
            let jitter = rand::random::<u64>() % 500;
            tokio::time::sleep(Duration::from_millis(jitter)).await;

            let mut interval = tokio::time::interval(poller.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        poller.poll().await;
                    }
                }
            }

            tracing::info!("Poller: stopped");
        });

        tracing::info!("Poller: polling every {:?}", self.interval);
    }

    /// Stop the background poll loop.
    pub async fn stop(&self) {
        if let Some(tx) = self.stop.lock().await.as_ref() {
            let _ = tx.send(());
        }
    }

    /// Timer-driven poll; skipped while another fetch is in flight.
    pub async fn poll(&self) -> PollOutcome {
        if self.is_loading() {
            tracing::debug!("Poller: previous fetch still in flight, skipping tick");
            return PollOutcome::Skipped;
        }
        self.refresh().await
    }

    /// Fetch and apply a snapshot now, regardless of in-flight fetches.
    pub async fn refresh(&self) -> PollOutcome {
        let generation = self.begin();
        let result = {
            let _loading = InFlight::enter(&self.in_flight);
            self.source.fetch_snapshot().await
        };
        self.apply(generation, result).await
    }

    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn apply(&self, generation: u64, result: Result<Snapshot, ClientError>) -> PollOutcome {
        let mut state = self.state.write().await;

        if generation <= state.applied_generation {
            tracing::debug!("Poller: dropping stale response (generation {})", generation);
            return PollOutcome::Stale(generation);
        }

        match result {
            Ok(snapshot) => {
                tracing::info!(
                    "Poller: applied generation {} ({} queues, {} agents)",
                    generation,
                    snapshot.stats.len(),
                    snapshot.agents.0.len()
                );
                state.last_success = Some(snapshot.fetched_at);
                state.snapshot = Some(Arc::new(snapshot));
                state.applied_generation = generation;
                state.last_error = None;
                PollOutcome::Applied(generation)
            }
            Err(e) => {
                tracing::error!("Poller: fetch failed: {}", e);
                let message = e.to_string();
                state.last_error = Some(message.clone());
                PollOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeSource {
        fail: AtomicBool,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl StatsSource for FakeSource {
        async fn fetch_snapshot(&self) -> Result<Snapshot, ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::Network("connection refused".to_string()));
            }

            let mut snapshot = Snapshot::default();
            snapshot.stats.insert(
                "401".to_string(),
                [("tot", n as f64)].into_iter().collect(),
            );
            Ok(snapshot)
        }
    }

    fn snapshot_with_total(total: f64) -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot
            .stats
            .insert("401".to_string(), [("tot", total)].into_iter().collect());
        snapshot
    }

    async fn current_total(poller: &Poller<FakeSource>) -> Option<f64> {
        let state = poller.state.read().await;
        state
            .snapshot
            .as_ref()
            .map(|s| s.stats["401"].counter("tot"))
    }

    #[tokio::test]
    async fn test_refresh_applies_snapshot() {
        let poller = Poller::new(Arc::new(FakeSource::default()), Duration::from_secs(1));

        assert_eq!(poller.refresh().await, PollOutcome::Applied(1));
        assert_eq!(current_total(&poller).await, Some(0.0));
        assert_eq!(poller.refresh().await, PollOutcome::Applied(2));
        assert_eq!(current_total(&poller).await, Some(1.0));
    }

    #[tokio::test]
    async fn test_stale_response_is_dropped() {
        let poller = Poller::new(Arc::new(FakeSource::default()), Duration::from_secs(1));

        let older = poller.begin();
        let newer = poller.begin();

        assert_eq!(
            poller.apply(newer, Ok(snapshot_with_total(20.0))).await,
            PollOutcome::Applied(newer)
        );
        assert_eq!(
            poller.apply(older, Ok(snapshot_with_total(10.0))).await,
            PollOutcome::Stale(older)
        );
        assert_eq!(current_total(&poller).await, Some(20.0));

        // A stale failure must not clobber the state either.
        let stale_err = poller
            .apply(older, Err(ClientError::Network("late".to_string())))
            .await;
        assert_eq!(stale_err, PollOutcome::Stale(older));
        assert!(poller.state.read().await.last_error.is_none());
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_apply_in_order() {
        let poller = Poller::new(Arc::new(FakeSource::default()), Duration::from_secs(1));

        let older = poller.begin();
        let newer = poller.begin();

        assert_eq!(
            poller.apply(older, Ok(snapshot_with_total(10.0))).await,
            PollOutcome::Applied(older)
        );
        assert_eq!(current_total(&poller).await, Some(10.0));

        assert_eq!(
            poller.apply(newer, Ok(snapshot_with_total(20.0))).await,
            PollOutcome::Applied(newer)
        );
        assert_eq!(current_total(&poller).await, Some(20.0));
        assert_eq!(poller.state.read().await.applied_generation, newer);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshot() {
        let source = Arc::new(FakeSource::default());
        let poller = Poller::new(source.clone(), Duration::from_secs(1));

        assert_eq!(poller.refresh().await, PollOutcome::Applied(1));
        source.fail.store(true, Ordering::SeqCst);
        assert!(matches!(poller.refresh().await, PollOutcome::Failed(_)));

        let state = poller.state.read().await;
        assert!(state.snapshot.is_some());
        assert_eq!(state.applied_generation, 1);
        assert!(state.last_error.as_deref().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_poll_skips_while_loading() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(FakeSource {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let poller = Arc::new(Poller::new(source, Duration::from_secs(1)));

        let running = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.refresh().await })
        };
        while !poller.is_loading() {
            tokio::task::yield_now().await;
        }

        assert_eq!(poller.poll().await, PollOutcome::Skipped);

        gate.notify_one();
        assert_eq!(running.await.unwrap(), PollOutcome::Applied(1));
        assert!(!poller.is_loading());
    }

    #[test]
    fn test_generation_is_monotonic() {
        let poller = Poller::new(Arc::new(FakeSource::default()), Duration::from_secs(1));
        let first = poller.begin();
        let second = poller.begin();
        assert!(second > first);
        assert!(tokio_test::block_on(poller.state.read()).applied_generation < first);
    }
}
