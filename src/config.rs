//! Agent configuration, loaded from TOML with CLI overrides applied on top.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::driver::GamePolicy;
use crate::engine::{DEFAULT_READY_TIMEOUT, EngineConfig};
use crate::scheduler::TimePolicy;

/// Top-level configuration file shape.
///
/// ```toml
/// [engine]
/// path = "/usr/games/stockfish"
///
/// [engine.options]
/// Threads = 2
/// Hash = 128
///
/// [time]
/// allocation_moves = 40
/// min_think_ms = 50
///
/// [game]
/// draw_accept_below_cp = 100
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub time: TimeSection,
    #[serde(default)]
    pub game: GameSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Options applied at the handshake, rendered as `setoption` values.
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub ready_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeSection {
    #[serde(default = "default_allocation_moves")]
    pub allocation_moves: u64,
    #[serde(default = "default_min_think_ms")]
    pub min_think_ms: u64,
    #[serde(default = "default_latency_reserve_ms")]
    pub latency_reserve_ms: u64,
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameSection {
    #[serde(default = "default_draw_accept_below_cp")]
    pub draw_accept_below_cp: i32,
    #[serde(default)]
    pub resign_below_cp: Option<i32>,
}

fn default_allocation_moves() -> u64 {
    TimePolicy::default().allocation_moves
}

fn default_min_think_ms() -> u64 {
    TimePolicy::default().min_think.as_millis() as u64
}

fn default_latency_reserve_ms() -> u64 {
    TimePolicy::default().latency_reserve.as_millis() as u64
}

fn default_grace_ms() -> u64 {
    TimePolicy::default().grace.as_millis() as u64
}

fn default_draw_accept_below_cp() -> i32 {
    GamePolicy::default().draw_accept_below_cp
}

impl Default for TimeSection {
    fn default() -> Self {
        Self {
            allocation_moves: default_allocation_moves(),
            min_think_ms: default_min_think_ms(),
            latency_reserve_ms: default_latency_reserve_ms(),
            grace_ms: default_grace_ms(),
        }
    }
}

impl Default for GameSection {
    fn default() -> Self {
        Self {
            draw_accept_below_cp: default_draw_accept_below_cp(),
            resign_below_cp: None,
        }
    }
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Resolve the engine spawn settings; the path must come from the config
    /// or a CLI override.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let Some(path) = &self.engine.path else {
            bail!("no engine path configured (set [engine].path or pass --engine)");
        };
        let mut options = Vec::with_capacity(self.engine.options.len());
        for (name, value) in &self.engine.options {
            options.push((name.clone(), option_value_to_string(name, value)?));
        }
        Ok(EngineConfig {
            path: path.clone(),
            args: self.engine.args.clone(),
            options,
            ready_timeout: self
                .engine
                .ready_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_READY_TIMEOUT),
        })
    }

    pub fn time_policy(&self) -> TimePolicy {
        TimePolicy {
            allocation_moves: self.time.allocation_moves,
            min_think: Duration::from_millis(self.time.min_think_ms),
            latency_reserve: Duration::from_millis(self.time.latency_reserve_ms),
            grace: Duration::from_millis(self.time.grace_ms),
        }
    }

    pub fn game_policy(&self) -> GamePolicy {
        GamePolicy {
            draw_accept_below_cp: self.game.draw_accept_below_cp,
            resign_below_cp: self.game.resign_below_cp,
        }
    }
}

/// Scalar TOML values render directly; structured values have no `setoption`
/// representation.
fn option_value_to_string(name: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => bail!("engine option '{name}' has unsupported value {other:?}"),
    }
}
