use serde::{Deserialize, Serialize};

use super::StopwatchEngine;

/// The two buttons on the stopwatch screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Button {
    /// START / PAUSE
    Primary,
    /// LAP / RESET
    Secondary,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Start,
    Pause,
    Lap,
    Reset,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Start => "START",
            Action::Pause => "PAUSE",
            Action::Lap => "LAP",
            Action::Reset => "RESET",
        }
    }
}

/// What each button does right now.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    pub primary: Action,
    pub secondary: Action,
    pub secondary_enabled: bool,
}

impl Controls {
    pub fn for_state(is_running: bool, has_elapsed: bool) -> Self {
        if is_running {
            Self {
                primary: Action::Pause,
                secondary: Action::Lap,
                secondary_enabled: true,
            }
        } else {
            Self {
                primary: Action::Start,
                secondary: Action::Reset,
                secondary_enabled: has_elapsed,
            }
        }
    }

    pub fn action_for(&self, button: Button) -> Option<Action> {
        match button {
            Button::Primary => Some(self.primary),
            Button::Secondary if self.secondary_enabled => Some(self.secondary),
            Button::Secondary => None,
        }
    }
}

impl StopwatchEngine {
    pub async fn controls(&self) -> Controls {
        Controls::for_state(self.is_running().await, self.has_elapsed().await)
    }

    /// Applies a button press. Returns the action taken, or `None` when the
    /// button is disabled.
    pub async fn press(&self, button: Button) -> Option<Action> {
        let action = self.controls().await.action_for(button)?;
        self.apply(action).await;
        Some(action)
    }

    pub async fn apply(&self, action: Action) {
        match action {
            Action::Start => self.start().await,
            Action::Pause => self.pause().await,
            Action::Lap => {
                self.record_lap().await;
            }
            Action::Reset => self.reset().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stopwatch::StopwatchStatus;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::sleep;

    #[test]
    fn labels_follow_running_state() {
        let idle = Controls::for_state(false, false);
        assert_eq!(idle.primary.label(), "START");
        assert_eq!(idle.secondary.label(), "RESET");
        assert!(!idle.secondary_enabled);
        assert_eq!(idle.action_for(Button::Secondary), None);

        let running = Controls::for_state(true, false);
        assert_eq!(running.primary, Action::Pause);
        assert_eq!(running.action_for(Button::Secondary), Some(Action::Lap));

        let paused = Controls::for_state(false, true);
        assert_eq!(paused.action_for(Button::Primary), Some(Action::Start));
        assert_eq!(paused.action_for(Button::Secondary), Some(Action::Reset));
    }

    #[tokio::test(start_paused = true)]
    async fn button_presses_drive_the_engine() {
        let engine = StopwatchEngine::new();

        assert_eq!(engine.press(Button::Secondary).await, None);
        assert_eq!(engine.press(Button::Primary).await, Some(Action::Start));
        assert_eq!(engine.status().await, StopwatchStatus::Running);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.press(Button::Secondary).await, Some(Action::Lap));
        assert_eq!(engine.laps().await.len(), 1);

        assert_eq!(engine.press(Button::Primary).await, Some(Action::Pause));
        assert_eq!(engine.status().await, StopwatchStatus::Paused);

        assert_eq!(engine.press(Button::Secondary).await, Some(Action::Reset));
        assert_eq!(engine.status().await, StopwatchStatus::Idle);
        assert!(engine.laps().await.is_empty());
        assert_eq!(engine.current_elapsed().await, 0);
    }
}
