//! `uci_bridge` binary: serves games from an NDJSON event feed on stdin,
//! emitting agent actions as NDJSON on stdout. Logs go to stderr.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use log::{debug, error, info, warn};

use uci_bridge::config::AgentConfig;
use uci_bridge::{AgentAction, EngineProcess, GameDriver, GameEvent, GameStart};

/// UCI session driver (engine vs matchmaking feed).
#[derive(Parser, Debug)]
#[command(author, version, about = "UCI session driver (engine vs matchmaking feed)")]
struct Cli {
    /// Path to the UCI engine binary (overrides the config file)
    #[arg(long)]
    engine: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Engine options to set (format: "Name=Value", can be repeated)
    #[arg(long = "engine-option", num_args = 1..)]
    engine_options: Option<Vec<String>>,

    /// Stop serving after this many games
    #[arg(long)]
    max_games: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    if let Some(path) = cli.engine {
        config.engine.path = Some(path);
    }
    for opt in cli.engine_options.unwrap_or_default() {
        let (name, value) = opt
            .split_once('=')
            .with_context(|| format!("engine option '{opt}' is not Name=Value"))?;
        config
            .engine
            .options
            .insert(name.trim().to_string(), toml::Value::String(value.trim().to_string()));
    }
    let engine_cfg = config.engine_config()?;
    let time_policy = config.time_policy();
    let game_policy = config.game_policy();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("failed to install interrupt handler")?;
    }

    // Feed pump: stdin JSON lines into the event channel.
    let (event_tx, event_rx) = unbounded::<GameEvent>();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<GameEvent>(trimmed) {
                Ok(event) => {
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("skipping malformed feed line: {e}"),
            }
        }
    });

    // Action pump: agent actions out as JSON lines.
    let (action_tx, action_rx) = unbounded::<AgentAction>();
    let writer = thread::spawn(move || {
        let stdout = io::stdout();
        for action in action_rx {
            match serde_json::to_string(&action) {
                Ok(json) => {
                    let mut out = stdout.lock();
                    if writeln!(out, "{json}").and_then(|_| out.flush()).is_err() {
                        break;
                    }
                }
                Err(e) => error!("failed to serialize action: {e}"),
            }
        }
    });

    let mut engine = EngineProcess::start(&engine_cfg, "engine")
        .context("could not start the configured engine")?;
    let mut games_served = 0u32;

    while !shutdown.load(Ordering::SeqCst) {
        if cli.max_games.is_some_and(|max| games_served >= max) {
            info!("served {games_served} games, stopping");
            break;
        }
        let Some(start) = next_game_start(&event_rx, &shutdown) else {
            break;
        };
        let report = {
            let mut driver = GameDriver::new(
                &mut engine,
                &event_rx,
                action_tx.clone(),
                time_policy,
                game_policy,
            );
            driver.run(start)
        };
        match report {
            Ok(report) => {
                games_served += 1;
                match serde_json::to_string(&report) {
                    Ok(json) => info!("game report: {json}"),
                    Err(e) => warn!("failed to serialize game report: {e}"),
                }
                if report.engine_failed {
                    warn!("replacing failed engine process");
                    engine.shutdown();
                    engine = EngineProcess::start(&engine_cfg, "engine")
                        .context("could not restart the engine after a failure")?;
                }
            }
            Err(e) => {
                error!("game aborted without report: {e}");
                break;
            }
        }
    }

    engine.shutdown();
    drop(action_tx);
    let _ = writer.join();
    Ok(())
}

/// Block until the feed announces a game, the feed closes, or an interrupt
/// arrives. Events between games are noise and dropped.
fn next_game_start(events: &Receiver<GameEvent>, shutdown: &AtomicBool) -> Option<GameStart> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return None;
        }
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(GameEvent::GameStart(start)) => return Some(start),
            Ok(other) => debug!("ignoring {other:?} while idle"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("feed closed");
                return None;
            }
        }
    }
}
