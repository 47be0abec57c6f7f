use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::settings::StopwatchSettings;

use super::{
    format::format_time,
    laps::{lap_splits, LapSplit},
    StopwatchState, StopwatchStatus,
};

// Set to false to silence the engine's lifecycle logging
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StopwatchSnapshot {
    pub status: StopwatchStatus,
    pub elapsed_ms: u64,
    pub formatted: String,
    pub laps: Vec<LapSplit>,
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl Ticker {
    /// Cancels the loop and waits for it to exit, so no tick lands afterwards.
    async fn stop(self) {
        self.cancel_token.cancel();
        if let Err(err) = self.handle.await {
            log_error!("stopwatch ticker failed to join: {err}");
        }
    }
}

/// Owns the stopwatch state and the single ticker task that keeps
/// `elapsed_ms` fresh while running. Clones share the same stopwatch.
#[derive(Clone)]
pub struct StopwatchEngine {
    state: Arc<Mutex<StopwatchState>>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    elapsed_tx: Arc<watch::Sender<u64>>,
    tick_interval: Duration,
    heartbeat_every_ticks: u32,
    debug: bool,
    root_token: CancellationToken,
    // Cancels any running ticker once the last clone is dropped.
    _drop_guard: Arc<DropGuard>,
}

impl Default for StopwatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StopwatchEngine {
    pub fn new() -> Self {
        Self::build(&StopwatchSettings::default())
    }

    pub fn from_settings(settings: &StopwatchSettings) -> Result<Self> {
        settings.validate().context("invalid stopwatch settings")?;
        Ok(Self::build(settings))
    }

    fn build(settings: &StopwatchSettings) -> Self {
        let (elapsed_tx, _) = watch::channel(0u64);
        let root_token = CancellationToken::new();

        Self {
            state: Arc::new(Mutex::new(StopwatchState::new())),
            ticker: Arc::new(Mutex::new(None)),
            elapsed_tx: Arc::new(elapsed_tx),
            tick_interval: settings.tick_interval(),
            heartbeat_every_ticks: settings.heartbeat_every_ticks,
            debug: settings.debug,
            _drop_guard: Arc::new(root_token.clone().drop_guard()),
            root_token,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Starts a running segment. Strict no-op while already running.
    pub async fn start(&self) {
        let mut ticker_guard = self.ticker.lock().await;

        let baseline = {
            let mut state = self.state.lock().await;
            if !state.begin_segment(Instant::now()) {
                log_debug!("start ignored, already running");
                return;
            }
            state.elapsed_ms_baseline
        };

        *ticker_guard = Some(self.spawn_ticker());
        log_info!("stopwatch started at {}", format_time(baseline));
    }

    /// Stops the ticker and freezes the elapsed time. No-op unless running.
    pub async fn pause(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(ticker) = ticker_guard.take() {
            ticker.stop().await;
        }

        let elapsed = {
            let mut state = self.state.lock().await;
            if !state.freeze() {
                return;
            }
            self.elapsed_tx.send_replace(state.elapsed_ms);
            state.elapsed_ms
        };

        log_info!("stopwatch paused at {}", format_time(elapsed));
    }

    /// Pauses, then clears elapsed time and laps. Allowed in any state.
    pub async fn reset(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(ticker) = ticker_guard.take() {
            ticker.stop().await;
        }

        {
            let mut state = self.state.lock().await;
            state.freeze();
            state.clear();
            self.elapsed_tx.send_replace(state.elapsed_ms);
        }

        log_info!("stopwatch reset");
    }

    /// Records the current elapsed value as a lap. Ignored while elapsed is zero.
    pub async fn record_lap(&self) -> Option<LapSplit> {
        let mut state = self.state.lock().await;
        if state.record_lap().is_none() {
            log_debug!("lap ignored at zero elapsed");
            return None;
        }

        let split = lap_splits(&state.laps).last().copied();
        if let Some(split) = split {
            log_info!(
                "lap {} recorded: split {} total {}",
                split.lap_number,
                format_time(split.split_ms),
                format_time(split.cumulative_ms)
            );
        }
        split
    }

    /// The value the ticker last computed (or that pause/reset froze).
    /// Does not sample the clock.
    pub async fn current_elapsed(&self) -> u64 {
        self.state.lock().await.elapsed_ms
    }

    /// Push feed of `elapsed_ms`, published under the state lock on every
    /// change so subscribers never see a value the state does not hold.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.elapsed_tx.subscribe()
    }

    pub async fn status(&self) -> StopwatchStatus {
        self.state.lock().await.status
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    pub async fn has_elapsed(&self) -> bool {
        self.state.lock().await.has_elapsed()
    }

    pub async fn laps(&self) -> Vec<u64> {
        self.state.lock().await.laps.clone()
    }

    pub async fn lap_splits(&self) -> Vec<LapSplit> {
        lap_splits(&self.state.lock().await.laps)
    }

    pub async fn snapshot(&self) -> StopwatchSnapshot {
        let state = self.state.lock().await;
        StopwatchSnapshot {
            status: state.status,
            elapsed_ms: state.elapsed_ms,
            formatted: format_time(state.elapsed_ms),
            laps: lap_splits(&state.laps),
        }
    }

    /// Teardown for the host: stops the ticker and reports where it stopped.
    pub async fn shutdown(&self) -> u64 {
        self.pause().await;
        let elapsed = self.current_elapsed().await;
        log_info!("stopwatch shut down at {}", format_time(elapsed));
        elapsed
    }

    fn spawn_ticker(&self) -> Ticker {
        let cancel_token = self.root_token.child_token();
        let handle = tokio::spawn(tick_loop(
            self.state.clone(),
            self.elapsed_tx.clone(),
            cancel_token.clone(),
            self.tick_interval,
            self.heartbeat_every_ticks,
            self.debug,
        ));

        Ticker {
            handle,
            cancel_token,
        }
    }
}

async fn tick_loop(
    state: Arc<Mutex<StopwatchState>>,
    elapsed_tx: Arc<watch::Sender<u64>>,
    cancel_token: CancellationToken,
    tick_interval: Duration,
    heartbeat_every: u32,
    debug: bool,
) {
    let mut interval = time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = interval.tick() => {
                let elapsed = {
                    let mut guard = state.lock().await;
                    if !guard.is_running() {
                        break;
                    }
                    let elapsed = guard.sync_from_anchor(Instant::now());
                    elapsed_tx.send_replace(elapsed);
                    elapsed
                };

                ticks = ticks.wrapping_add(1);
                if debug && ticks % heartbeat_every == 0 {
                    log_info!("heartbeat: tick {} elapsed {}", ticks, format_time(elapsed));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn start_pause_reset_scenario() {
        let engine = StopwatchEngine::new();
        assert_eq!(engine.status().await, StopwatchStatus::Idle);
        assert_eq!(engine.current_elapsed().await, 0);

        engine.start().await;
        assert!(engine.is_running().await);
        sleep(ms(105)).await;
        engine.pause().await;

        let elapsed = engine.current_elapsed().await;
        assert!((90..=110).contains(&elapsed), "elapsed {elapsed}");
        assert_eq!(engine.status().await, StopwatchStatus::Paused);

        engine.reset().await;
        assert_eq!(engine.current_elapsed().await, 0);
        assert!(engine.laps().await.is_empty());
        assert_eq!(engine.status().await, StopwatchStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn time_accumulates_across_pauses() {
        let engine = StopwatchEngine::new();

        engine.start().await;
        sleep(ms(155)).await;
        engine.pause().await;
        assert_eq!(engine.current_elapsed().await, 150);

        sleep(ms(500)).await;

        engine.start().await;
        sleep(ms(255)).await;
        engine.pause().await;

        assert_eq!(engine.current_elapsed().await, 400);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_the_last_ticked_value() {
        let engine = StopwatchEngine::new();
        let mut rx = engine.subscribe();

        engine.start().await;
        // 10ms ticks: the last one before the pause lands at 100ms.
        sleep(ms(105)).await;
        let last_ticked = *rx.borrow_and_update();
        assert_eq!(last_ticked, 100);
        assert_eq!(engine.current_elapsed().await, 100);

        engine.pause().await;
        assert_eq!(engine.current_elapsed().await, 100);
        assert_eq!(*rx.borrow(), 100);
        assert_eq!(engine.snapshot().await.elapsed_ms, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_does_not_double_count() {
        let engine = StopwatchEngine::new();
        engine.start().await;
        sleep(ms(45)).await;
        engine.start().await;
        sleep(ms(60)).await;
        engine.pause().await;

        assert_eq!(engine.current_elapsed().await, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_publish_non_decreasing_values() {
        let engine = StopwatchEngine::new();
        let mut rx = engine.subscribe();
        engine.start().await;

        let mut seen = Vec::new();
        for _ in 0..10 {
            rx.changed().await.unwrap();
            seen.push(*rx.borrow_and_update());
        }
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]), "{seen:?}");
        assert!(*seen.last().unwrap() > 0);

        sleep(ms(55)).await;
        let live = engine.current_elapsed().await;
        assert!(live >= *seen.last().unwrap());
        engine.pause().await;
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_is_frozen_while_paused() {
        let engine = StopwatchEngine::new();
        let mut rx = engine.subscribe();

        engine.start().await;
        sleep(ms(80)).await;
        engine.pause().await;
        let frozen = engine.current_elapsed().await;
        rx.borrow_and_update();

        sleep(ms(1_000)).await;
        assert_eq!(engine.current_elapsed().await, frozen);
        assert!(!rx.has_changed().unwrap());

        // Pausing again changes nothing.
        engine.pause().await;
        assert_eq!(engine.current_elapsed().await, frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn laps_require_elapsed_time() {
        let engine = StopwatchEngine::new();
        assert_eq!(engine.record_lap().await, None);
        assert!(engine.laps().await.is_empty());

        engine.start().await;
        sleep(ms(100)).await;
        let first = engine.record_lap().await.unwrap();
        assert_eq!(first.lap_number, 1);
        assert_eq!(first.split_ms, first.cumulative_ms);

        sleep(ms(50)).await;
        engine.pause().await;

        // Paused with time on the clock still records.
        let second = engine.record_lap().await.unwrap();
        assert_eq!(second.lap_number, 2);
        assert_eq!(second.cumulative_ms, engine.current_elapsed().await);

        let splits = engine.lap_splits().await;
        assert_eq!(splits.len(), 2);
        assert_eq!(
            splits[0].split_ms + splits[1].split_ms,
            splits[1].cumulative_ms
        );
        let laps = engine.laps().await;
        assert!(laps[0] <= laps[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_while_running_stops_the_ticker() {
        let engine = StopwatchEngine::new();
        engine.start().await;
        sleep(ms(120)).await;
        engine.record_lap().await;
        engine.reset().await;

        assert_eq!(engine.status().await, StopwatchStatus::Idle);
        assert!(engine.laps().await.is_empty());

        sleep(ms(200)).await;
        assert_eq!(engine.current_elapsed().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_engine_ends_the_feed() {
        let engine = StopwatchEngine::new();
        let mut rx = engine.subscribe();
        engine.start().await;
        sleep(ms(30)).await;
        drop(engine);

        let drained = time::timeout(ms(1_000), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(drained.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_serializes_for_presentation() {
        let engine = StopwatchEngine::new();
        engine.start().await;
        sleep(ms(200)).await;
        engine.pause().await;
        engine.record_lap().await;

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.status, StopwatchStatus::Paused);
        assert_eq!(snapshot.formatted, format_time(snapshot.elapsed_ms));
        assert_eq!(snapshot.laps.len(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "paused");
        assert_eq!(json["elapsedMs"], snapshot.elapsed_ms);
        assert_eq!(json["laps"][0]["lapNumber"], 1);
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let settings = StopwatchSettings {
            tick_interval_ms: 0,
            ..StopwatchSettings::default()
        };
        assert!(StopwatchEngine::from_settings(&settings).is_err());

        let engine = StopwatchEngine::from_settings(&StopwatchSettings {
            tick_interval_ms: 25,
            ..StopwatchSettings::default()
        })
        .unwrap();
        assert_eq!(engine.tick_interval(), ms(25));
    }
}
