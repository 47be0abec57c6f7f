use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

pub const SETTINGS_PATH_ENV: &str = "STOPWATCH_SETTINGS";
pub const DEBUG_ENV: &str = "STOPWATCH_DEBUG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StopwatchSettings {
    /// Period of the ticker that refreshes the elapsed value.
    pub tick_interval_ms: u64,
    /// In debug mode the ticker logs a heartbeat once per this many ticks.
    pub heartbeat_every_ticks: u32,
    pub debug: bool,
}

impl Default for StopwatchSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            heartbeat_every_ticks: 100,
            debug: false,
        }
    }
}

impl StopwatchSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            bail!("tickIntervalMs must be greater than zero");
        }
        if self.heartbeat_every_ticks == 0 {
            bail!("heartbeatEveryTicks must be greater than zero");
        }
        Ok(())
    }

    /// Applies `STOPWATCH_DEBUG` on top of the stored value.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var(DEBUG_ENV) {
            self.debug = value == "1" || value.eq_ignore_ascii_case("true");
        }
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StopwatchSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`. A missing or unparsable file yields defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring malformed settings in {}: {}",
                    path.display(),
                    err
                );
                StopwatchSettings::default()
            })
        } else {
            StopwatchSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Store at `$STOPWATCH_SETTINGS`, or `stopwatch.json` in the working directory.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(SETTINGS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("stopwatch.json"));
        Self::new(path)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn settings(&self) -> StopwatchSettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update(&self, settings: StopwatchSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: StopwatchSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", self.path.display()))?;
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &StopwatchSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
