pub mod commands;
pub mod controller;
pub mod format;
pub mod laps;
pub mod state;

pub use commands::{Action, Button, Controls};
pub use controller::{StopwatchEngine, StopwatchSnapshot};
pub use format::format_time;
pub use laps::{lap_splits, most_recent_first, LapSplit};
pub use state::{StopwatchState, StopwatchStatus};
