mod settings;
pub mod stopwatch;
mod utils;

use std::io::{self, Write};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};

pub use settings::{SettingsStore, StopwatchSettings};
use stopwatch::{format_time, most_recent_first, Action, Button, LapSplit, StopwatchEngine};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Press(Button),
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    match line.trim().to_ascii_lowercase().as_str() {
        "s" | "start" | "pause" => Some(Input::Press(Button::Primary)),
        "l" | "lap" | "reset" => Some(Input::Press(Button::Secondary)),
        "q" | "quit" | "exit" => Some(Input::Quit),
        _ => None,
    }
}

/// Lap list rows, newest first.
fn lap_rows(splits: &[LapSplit]) -> Vec<String> {
    most_recent_first(splits)
        .iter()
        .map(|lap| {
            format!(
                "Lap {:<3} Split: {}  Total: {}",
                lap.lap_number,
                format_time(lap.split_ms),
                format_time(lap.cumulative_ms)
            )
        })
        .collect()
}

fn print_help() {
    println!("s = start/pause, l = lap/reset, q = quit");
}

fn print_laps(splits: &[LapSplit]) {
    println!();
    for row in lap_rows(splits) {
        println!("{row}");
    }
}

async fn render_elapsed(mut rx: watch::Receiver<u64>) {
    while rx.changed().await.is_ok() {
        let elapsed = *rx.borrow_and_update();
        {
            let mut stdout = io::stdout().lock();
            let _ = write!(stdout, "\r{}", format_time(elapsed));
            let _ = stdout.flush();
        }
    }
}

async fn session(settings: StopwatchSettings) -> Result<()> {
    let engine = StopwatchEngine::from_settings(&settings)?;
    let renderer = tokio::spawn(render_elapsed(engine.subscribe()));

    log_info!(
        "stopwatch ready (tick {}ms), elapsed {}",
        settings.tick_interval_ms,
        format_time(engine.current_elapsed().await)
    );
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let button = match parse_input(&line) {
            Some(Input::Quit) => break,
            Some(Input::Press(button)) => button,
            None => {
                print_help();
                continue;
            }
        };

        match engine.press(button).await {
            Some(Action::Lap) => print_laps(&engine.lap_splits().await),
            Some(action) => log_info!(
                "{} pressed at {}",
                action.label(),
                format_time(engine.current_elapsed().await)
            ),
            None => log_warn!("{:?} button is disabled while the clock is at zero", button),
        }
    }

    let elapsed = engine.shutdown().await;
    renderer.abort();

    println!();
    println!("Final: {}", format_time(elapsed));
    for row in lap_rows(&engine.lap_splits().await) {
        println!("{row}");
    }
    Ok(())
}

fn try_run() -> Result<()> {
    let store = SettingsStore::from_env()?;
    let settings = store.settings().with_env_overrides();
    log_info!("settings loaded from {}", store.path().display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?;
    runtime.block_on(session(settings))
}

pub fn run() {
    // RUST_LOG still wins over the default level
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log_info!("Stopwatch starting up...");

    if let Err(err) = try_run() {
        log::error!("stopwatch exited with an error: {err:#}");
        std::process::exit(1);
    }

    log_info!("Stopwatch shut down");
}
