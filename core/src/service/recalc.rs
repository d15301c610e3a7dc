//! Recalculator: background worker that keeps one stats view current
//!
//! Subscribes to the change feed, debounces bursts of change events into a
//! single aggregation, and publishes the resulting view state on a watch
//! channel. Every run carries a sequence number; a result from a run older
//! than the latest started one is dropped instead of overwriting newer data.

use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::StatsResult;
use crate::feed::{ChangeEvent, ChangeFeed};
use crate::model::stats::MonthlySnapshot;
use crate::repository::{RecordStore, RosterRepository, SnapshotCache};
use crate::service::aggregator::StatsAggregator;
use crate::service::view::ViewState;
use crate::time::MonthKey;

/// Idle wake-up when no debounce is pending
const IDLE_SLEEP_SECS: u64 = 3600;
const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalcCommand {
    SetMonth(MonthKey),
    Refresh,
    Shutdown,
}

struct RunOutcome {
    seq: u64,
    month: MonthKey,
    result: StatsResult<MonthlySnapshot>,
}

/// Caller side of a running [`Recalculator`].
pub struct RecalcHandle {
    commands: mpsc::Sender<RecalcCommand>,
    state: watch::Receiver<ViewState>,
    task: JoinHandle<()>,
}

impl RecalcHandle {
    pub async fn set_month(&self, month: MonthKey) -> Result<()> {
        self.send(RecalcCommand::SetMonth(month)).await
    }

    pub async fn refresh(&self) -> Result<()> {
        self.send(RecalcCommand::Refresh).await
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.clone()
    }

    pub fn current(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub async fn shutdown(self) {
        let _ = self.commands.send(RecalcCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::error!("Recalculator task failed: {e}");
        }
    }

    async fn send(&self, command: RecalcCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("Recalculator is not running"))
    }
}

pub struct Recalculator<S, C> {
    aggregator: StatsAggregator<S, C>,
    mess_id: String,
    month: MonthKey,
    debounce: Duration,
    state: watch::Sender<ViewState>,
    commands: mpsc::Receiver<RecalcCommand>,
    changes: broadcast::Receiver<ChangeEvent>,
    results_tx: mpsc::UnboundedSender<RunOutcome>,
    results_rx: mpsc::UnboundedReceiver<RunOutcome>,
    latest_seq: u64,
    in_flight: Option<u64>,
    rerun: bool,
}

impl<S, C> Recalculator<S, C>
where
    S: RecordStore + RosterRepository + 'static,
    C: SnapshotCache + 'static,
{
    /// Start the worker for `mess_id`, viewing `month`.
    ///
    /// The feed subscription is taken before this returns, so writes made
    /// right after spawning are not missed.
    pub fn spawn(
        aggregator: StatsAggregator<S, C>,
        feed: &ChangeFeed,
        mess_id: String,
        month: MonthKey,
        debounce: Duration,
    ) -> RecalcHandle {
        let (state_tx, state_rx) = watch::channel(ViewState::new(month));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let worker = Recalculator {
            aggregator,
            mess_id,
            month,
            debounce,
            state: state_tx,
            commands: command_rx,
            changes: feed.subscribe(),
            results_tx,
            results_rx,
            latest_seq: 0,
            in_flight: None,
            rerun: false,
        };
        let task = tokio::spawn(worker.run());

        RecalcHandle {
            commands: command_tx,
            state: state_rx,
            task,
        }
    }

    async fn run(mut self) {
        tracing::info!(mess_id = %self.mess_id, month = %self.month, "Recalculator started");

        if let Some(cached) = self.aggregator.cached(&self.mess_id, self.month).await {
            self.state.send_modify(|s| s.apply_cached(cached));
        }
        self.start_run();

        let mut debounce_deadline: Option<Instant> = None;
        let mut feed_open = true;

        loop {
            let sleep_until =
                debounce_deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(IDLE_SLEEP_SECS));

            tokio::select! {
                _ = tokio::time::sleep_until(sleep_until), if debounce_deadline.is_some() => {
                    debounce_deadline = None;
                    self.request_run();
                }

                command = self.commands.recv() => {
                    match command {
                        Some(RecalcCommand::SetMonth(month)) => {
                            debounce_deadline = None;
                            self.switch_month(month).await;
                        }
                        Some(RecalcCommand::Refresh) => {
                            debounce_deadline = None;
                            self.request_run();
                        }
                        Some(RecalcCommand::Shutdown) | None => break,
                    }
                }

                event = self.changes.recv(), if feed_open => {
                    match event {
                        Ok(event) => {
                            if event.mess_id == self.mess_id {
                                tracing::trace!(collection = %event.collection, "change detected");
                                debounce_deadline = Some(Instant::now() + self.debounce);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("Recalculator lagged {n} change events, scheduling recalculation");
                            debounce_deadline = Some(Instant::now() + self.debounce);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Change feed closed, recalculating on request only");
                            feed_open = false;
                        }
                    }
                }

                Some(outcome) = self.results_rx.recv() => {
                    self.finish_run(outcome);
                }
            }
        }

        tracing::info!(mess_id = %self.mess_id, "Recalculator stopped");
    }

    async fn switch_month(&mut self, month: MonthKey) {
        if month == self.month {
            self.request_run();
            return;
        }
        self.month = month;
        let cached = self.aggregator.cached(&self.mess_id, month).await;
        self.state.send_modify(|s| s.switch_month(month, cached));
        // A run for the old month may still be in flight; its result will be
        // discarded by sequence number.
        self.start_run();
    }

    /// Start now, or fold into one rerun after the current run finishes.
    fn request_run(&mut self) {
        if self.in_flight.is_some() {
            self.rerun = true;
        } else {
            self.start_run();
        }
    }

    fn start_run(&mut self) {
        self.latest_seq += 1;
        let seq = self.latest_seq;
        self.in_flight = Some(seq);
        self.rerun = false;
        self.state.send_modify(|s| s.refreshing = true);

        let aggregator = self.aggregator.clone();
        let mess_id = self.mess_id.clone();
        let month = self.month;
        let results = self.results_tx.clone();
        tracing::debug!(seq, %month, "starting aggregation");

        tokio::spawn(async move {
            let result = aggregator.refresh(&mess_id, month).await;
            let _ = results.send(RunOutcome { seq, month, result });
        });
    }

    fn finish_run(&mut self, outcome: RunOutcome) {
        if self.in_flight == Some(outcome.seq) {
            self.in_flight = None;
        }
        let idle = self.in_flight.is_none() && !self.rerun;

        if outcome.seq < self.latest_seq || outcome.month != self.month {
            tracing::debug!(seq = outcome.seq, latest = self.latest_seq, "discarding superseded aggregation result");
            if idle {
                self.state.send_modify(|s| s.refreshing = false);
            }
        } else {
            match outcome.result {
                Ok(snapshot) => {
                    self.state.send_modify(|s| {
                        s.apply_fresh(outcome.seq, snapshot);
                        s.refreshing = !idle;
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to calculate stats for {} {}: {e}", self.mess_id, outcome.month);
                    self.state.send_modify(|s| {
                        s.apply_failure(e.to_string());
                        s.refreshing = !idle;
                    });
                }
            }
        }

        if self.in_flight.is_none() && self.rerun {
            self.start_run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Collection;
    use crate::model::meal::MealEntry;
    use crate::model::member::{Member, Role};
    use crate::model::transaction::TransactionEntry;
    use crate::repository::MemoryStore;
    use crate::service::view::StatsView;
    use chrono::NaiveDate;
    use std::sync::Arc;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn october() -> MonthKey {
        MonthKey::new(2026, 10).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        let alice = Member {
            id: "a".into(),
            name: "Alice".into(),
            role: Role::Manager,
        };
        store.add_member("home", alice.clone()).await.unwrap();
        store.upsert_meal("home", MealEntry::new("a".into(), day(1), true, true, false)).await.unwrap();
        store
            .add_transaction("home", TransactionEntry::deposit("a".into(), "Alice".into(), 500.0, day(1)))
            .await
            .unwrap();
        store
    }

    async fn setup() -> (Arc<MemoryStore>, ChangeFeed, StatsAggregator<MemoryStore, MemoryStore>) {
        let feed = ChangeFeed::new();
        // Attach the feed after seeding so setup writes don't count as changes.
        let store = Arc::new(seeded_store().await.with_feed(feed.clone()));
        let aggregator = StatsAggregator::new(Arc::clone(&store), Arc::clone(&store));
        (store, feed, aggregator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_publishes_fresh_snapshot() {
        let (_store, feed, aggregator) = setup().await;
        let handle = Recalculator::spawn(aggregator, &feed, "home".into(), october(), DEBOUNCE);

        let mut rx = handle.subscribe();
        let state = rx.wait_for(|s| s.view.is_fresh()).await.unwrap().clone();
        assert_eq!(state.generation, 1);
        assert!(!state.refreshing);
        assert_eq!(state.view.snapshot().unwrap().house.total_meal, 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_changes_collapses_into_one_run() {
        let (store, feed, aggregator) = setup().await;
        let handle = Recalculator::spawn(aggregator, &feed, "home".into(), october(), DEBOUNCE);
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.generation == 1).await.unwrap();

        for d in 2..=4 {
            store.upsert_meal("home", MealEntry::new("a".into(), day(d), true, true, true)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let state = rx.wait_for(|s| s.generation == 2).await.unwrap().clone();
        assert_eq!(state.view.snapshot().unwrap().house.total_meal, 11);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.current().generation, 2);
        assert_eq!(store.fetch_count(Collection::Meals), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_for_other_mess_ignored() {
        let (store, feed, aggregator) = setup().await;
        let handle = Recalculator::spawn(aggregator, &feed, "home".into(), october(), DEBOUNCE);
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.generation == 1).await.unwrap();

        feed.publish("elsewhere", Collection::Meals);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(handle.current().generation, 1);
        assert_eq!(store.fetch_count(Collection::Meals), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_run_is_discarded() {
        let (store, feed, aggregator) = setup().await;
        store.set_delay(october(), Duration::from_secs(5));
        let handle = Recalculator::spawn(aggregator, &feed, "home".into(), october(), DEBOUNCE);

        let november = october().next();
        handle.set_month(november).await.unwrap();

        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.month == november && s.view.is_fresh()).await.unwrap();

        // Let the slow October run finish.
        tokio::time::sleep(Duration::from_secs(10)).await;
        let state = handle.current();
        assert_eq!(store.fetch_count(Collection::Meals), 2);
        assert_eq!(state.month, november);
        assert_eq!(state.generation, 2);
        assert_eq!(state.view.snapshot().unwrap().month, november);
        assert_eq!(state.view.snapshot().unwrap().house.total_meal, 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_last_snapshot() {
        let (store, feed, aggregator) = setup().await;
        let handle = Recalculator::spawn(aggregator, &feed, "home".into(), october(), DEBOUNCE);
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.view.is_fresh()).await.unwrap();

        store.fail(Collection::Transactions);
        handle.refresh().await.unwrap();
        let state = rx.wait_for(|s| s.last_error.is_some()).await.unwrap().clone();
        assert!(matches!(state.view, StatsView::StaleButAvailable(_)));
        assert_eq!(state.view.snapshot().unwrap().house.total_meal, 2);

        store.recover(Collection::Transactions);
        handle.refresh().await.unwrap();
        let state = rx.wait_for(|s| s.view.is_fresh()).await.unwrap().clone();
        assert!(state.last_error.is_none());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_snapshot_shown_before_fetch_completes() {
        let (store, feed, aggregator) = setup().await;
        aggregator.refresh("home", october()).await.unwrap();
        store.set_delay(october(), Duration::from_secs(3));

        let handle = Recalculator::spawn(aggregator, &feed, "home".into(), october(), DEBOUNCE);
        let mut rx = handle.subscribe();
        let state = rx
            .wait_for(|s| matches!(s.view, StatsView::StaleButAvailable(_)))
            .await
            .unwrap()
            .clone();
        assert_eq!(state.view.snapshot().unwrap().house.total_meal, 2);
        assert_eq!(store.fetch_count(Collection::Meals), 1);

        rx.wait_for(|s| s.view.is_fresh()).await.unwrap();
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_during_run_is_coalesced() {
        let (store, feed, aggregator) = setup().await;
        let handle = Recalculator::spawn(aggregator, &feed, "home".into(), october(), DEBOUNCE);
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.generation == 1).await.unwrap();

        store.set_delay(october(), Duration::from_secs(1));
        handle.refresh().await.unwrap();
        handle.refresh().await.unwrap();
        handle.refresh().await.unwrap();

        rx.wait_for(|s| s.generation == 3).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.fetch_count(Collection::Meals), 3);
        assert!(!handle.current().refreshing);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagged_feed_counts_as_change() {
        let feed = ChangeFeed::with_capacity(2);
        let store = Arc::new(seeded_store().await);
        let aggregator = StatsAggregator::new(Arc::clone(&store), Arc::clone(&store));
        let handle = Recalculator::spawn(aggregator, &feed, "home".into(), october(), DEBOUNCE);
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.generation == 1).await.unwrap();

        store.upsert_meal("home", MealEntry::new("a".into(), day(2), true, true, true)).await.unwrap();
        // The only event for this mess is pushed out of the buffer before the
        // worker gets to read it.
        feed.publish("home", Collection::Meals);
        for _ in 0..4 {
            feed.publish("elsewhere", Collection::Meals);
        }

        let state = rx.wait_for(|s| s.generation == 2).await.unwrap().clone();
        assert_eq!(state.view.snapshot().unwrap().house.total_meal, 5);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_feed_still_serves_refresh() {
        let feed = ChangeFeed::new();
        let store = Arc::new(seeded_store().await);
        let aggregator = StatsAggregator::new(Arc::clone(&store), Arc::clone(&store));
        let handle = Recalculator::spawn(aggregator, &feed, "home".into(), october(), DEBOUNCE);
        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.generation == 1).await.unwrap();

        drop(feed);
        tokio::time::sleep(Duration::from_secs(1)).await;

        store.upsert_meal("home", MealEntry::new("a".into(), day(2), false, false, true)).await.unwrap();
        handle.refresh().await.unwrap();
        let state = rx.wait_for(|s| s.generation == 2).await.unwrap().clone();
        assert_eq!(state.view.snapshot().unwrap().house.total_meal, 3);

        // Nothing else wakes the worker once the feed is gone.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.current().generation, 2);
        assert_eq!(store.fetch_count(Collection::Meals), 2);

        handle.shutdown().await;
    }
}
