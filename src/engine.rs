//! External engine process lifecycle and line I/O.

use std::collections::HashSet;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use log::{debug, info, warn};

use crate::error::DriverError;
use crate::uci::{EngineCommand, EngineEvent, decode_event};

pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);
const QUIT_GRACE: Duration = Duration::from_millis(300);
const QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Engine spawn settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    /// Options applied during the handshake, in order.
    pub options: Vec<(String, String)>,
    /// Upper bound on the handshake and on `isready` round trips.
    pub ready_timeout: Duration,
}

impl EngineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            options: Vec::new(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

/// Identification the engine reported during the handshake.
#[derive(Debug, Clone, Default)]
pub struct EngineId {
    pub name: Option<String>,
    pub author: Option<String>,
}

/// Owns one engine subprocess and its line-based I/O. Commands go out over
/// stdin in order; a reader thread decodes stdout lines into a channel, so
/// events keep arrival order too.
pub struct EngineProcess {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    events: Receiver<EngineEvent>,
    id: EngineId,
    declared: HashSet<String>,
    ready_timeout: Duration,
    stopped: bool,
    pub label: String,
}

impl EngineProcess {
    /// Spawn the engine and complete the identification handshake. Fails if
    /// the binary is missing, exits immediately, or stays silent past the
    /// ready timeout.
    pub fn start(cfg: &EngineConfig, label: impl Into<String>) -> Result<Self, DriverError> {
        let label = label.into();
        let mut cmd = Command::new(&cfg.path);
        cmd.args(&cfg.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let mut child = cmd.spawn().map_err(|e| {
            DriverError::EngineStartup(format!("failed to spawn {}: {e}", cfg.path.display()))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::EngineStartup("engine has no stdin pipe".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::EngineStartup("engine has no stdout pipe".to_string()))?;

        let (tx, rx) = unbounded();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.send(decode_event(&line)).is_err() {
                    break;
                }
            }
        });

        let mut engine = Self {
            child,
            stdin: BufWriter::new(stdin),
            events: rx,
            id: EngineId::default(),
            declared: HashSet::new(),
            ready_timeout: cfg.ready_timeout,
            stopped: false,
            label,
        };
        if let Err(e) = engine.handshake(cfg) {
            engine.shutdown();
            return Err(DriverError::EngineStartup(e.to_string()));
        }
        info!(
            "{}: started {}",
            engine.label,
            engine.id.name.as_deref().unwrap_or("unidentified engine")
        );
        Ok(engine)
    }

    fn handshake(&mut self, cfg: &EngineConfig) -> Result<(), DriverError> {
        self.send(&EngineCommand::Uci)?;
        let deadline = Instant::now() + cfg.ready_timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.read_event(left)? {
                Some(EngineEvent::IdName(name)) => self.id.name = Some(name),
                Some(EngineEvent::IdAuthor(author)) => self.id.author = Some(author),
                Some(EngineEvent::OptionDecl(opt)) => {
                    self.declared.insert(opt.name);
                }
                Some(EngineEvent::UciOk) => break,
                Some(other) => debug!("{}: pre-handshake chatter: {other}", self.label),
                None => {
                    return Err(DriverError::EngineCrash(format!(
                        "{}: no uciok within {:?}",
                        self.label, cfg.ready_timeout
                    )));
                }
            }
        }
        for (name, value) in &cfg.options {
            self.set_option_if_declared(name, value)?;
        }
        self.sync_ready()
    }

    /// `setoption`, but only for names the engine declared. An engine that
    /// declared nothing at all gets every option verbatim.
    pub fn set_option_if_declared(&mut self, name: &str, value: &str) -> Result<(), DriverError> {
        if self.declared.is_empty() || self.declared.contains(name) {
            self.send(&EngineCommand::SetOption {
                name: name.to_string(),
                value: Some(value.to_string()),
            })?;
        } else {
            debug!("{}: skipping undeclared option {name}", self.label);
        }
        Ok(())
    }

    /// Reset the engine for a fresh game and wait for it to settle.
    pub fn new_game(&mut self) -> Result<(), DriverError> {
        self.send(&EngineCommand::NewGame)?;
        self.sync_ready()
    }

    /// `isready` round trip. Everything read while waiting is discarded.
    pub fn sync_ready(&mut self) -> Result<(), DriverError> {
        self.send(&EngineCommand::IsReady)?;
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.read_event(left)? {
                Some(EngineEvent::ReadyOk) => return Ok(()),
                Some(other) => debug!("{}: awaiting readyok, got {other}", self.label),
                None => {
                    return Err(DriverError::EngineCrash(format!(
                        "{}: no readyok within {:?}",
                        self.label, self.ready_timeout
                    )));
                }
            }
        }
    }

    /// Write one command line. A failed write means the process is gone.
    pub fn send(&mut self, cmd: &EngineCommand) -> Result<(), DriverError> {
        debug!("{} << {cmd}", self.label);
        let res = writeln!(self.stdin, "{cmd}").and_then(|_| self.stdin.flush());
        res.map_err(|_| self.crash_error())
    }

    /// Block for the next decoded event. `Ok(None)` is a timeout; a closed
    /// stream is a crash, reported with the exit status when available.
    pub fn read_event(&mut self, timeout: Duration) -> Result<Option<EngineEvent>, DriverError> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                debug!("{} >> {event}", self.label);
                Ok(Some(event))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.crash_error()),
        }
    }

    /// Event channel for multiplexed waits.
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.events
    }

    pub fn id(&self) -> &EngineId {
        &self.id
    }

    pub(crate) fn crash_error(&mut self) -> DriverError {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                DriverError::EngineCrash(format!("{} exited with {status}", self.label))
            }
            _ => DriverError::EngineCrash(format!("{}: output stream closed", self.label)),
        }
    }

    /// Graceful shutdown: `quit`, wait out a grace period, then kill.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let _ = writeln!(self.stdin, "{}", EngineCommand::Quit).and_then(|_| self.stdin.flush());
        let deadline = Instant::now() + QUIT_GRACE;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            thread::sleep(QUIT_POLL_INTERVAL);
        }
        warn!("{}: did not quit in time, killing", self.label);
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.shutdown();
    }
}
