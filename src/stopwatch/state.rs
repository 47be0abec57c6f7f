use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StopwatchStatus {
    /// Initial state, and the state after a reset.
    Idle,
    Running,
    Paused,
}

impl Default for StopwatchStatus {
    fn default() -> Self {
        StopwatchStatus::Idle
    }
}

/// Timing state of one stopwatch. The state machine never reads a clock;
/// callers pass in the current instant where one is needed.
#[derive(Debug, Clone, Default)]
pub struct StopwatchState {
    pub status: StopwatchStatus,
    /// Last computed elapsed time; what gets displayed.
    pub elapsed_ms: u64,
    /// Cumulative elapsed time at each recorded lap.
    pub laps: Vec<u64>,
    /// Time banked from earlier running segments; combines with
    /// `running_anchor` to compute the true elapsed time.
    pub elapsed_ms_baseline: u64,
    pub running_anchor: Option<Instant>,
}

impl StopwatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.status == StopwatchStatus::Running
    }

    pub fn has_elapsed(&self) -> bool {
        self.elapsed_ms > 0
    }

    /// Elapsed time as of `now`, without storing it.
    pub fn elapsed_at(&self, now: Instant) -> u64 {
        if let (StopwatchStatus::Running, Some(anchor)) = (self.status, self.running_anchor) {
            let segment_ms = now.saturating_duration_since(anchor).as_millis() as u64;
            self.elapsed_ms_baseline.saturating_add(segment_ms)
        } else {
            self.elapsed_ms
        }
    }

    /// Recomputes `elapsed_ms` from the anchor. Does nothing unless running.
    pub fn sync_from_anchor(&mut self, now: Instant) -> u64 {
        if self.is_running() {
            self.elapsed_ms = self.elapsed_at(now);
        }
        self.elapsed_ms
    }

    /// Opens a running segment at `now`. Returns false if one is already open.
    pub fn begin_segment(&mut self, now: Instant) -> bool {
        if self.is_running() {
            return false;
        }
        self.status = StopwatchStatus::Running;
        self.elapsed_ms_baseline = self.elapsed_ms;
        self.running_anchor = Some(now);
        true
    }

    /// Closes the running segment at the last computed `elapsed_ms`, without
    /// sampling the clock again. Returns false if not running.
    pub fn freeze(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = if self.has_elapsed() {
            StopwatchStatus::Paused
        } else {
            StopwatchStatus::Idle
        };
        self.running_anchor = None;
        self.elapsed_ms_baseline = self.elapsed_ms;
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Appends the current elapsed value as a lap. Zero is never recorded.
    pub fn record_lap(&mut self) -> Option<u64> {
        if !self.has_elapsed() {
            return None;
        }
        self.laps.push(self.elapsed_ms);
        Some(self.elapsed_ms)
    }
}
