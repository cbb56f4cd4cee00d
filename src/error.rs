//! Error taxonomy for the session driver.

use std::io;

use thiserror::Error;

/// Errors surfaced by the engine handle, the scheduler and the game driver.
///
/// The game driver is the single place where these are converted into a
/// game-level verdict; nothing below it decides outcomes.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The engine binary is missing, exited immediately, or never finished
    /// the handshake. No game is possible.
    #[error("engine startup failed: {0}")]
    EngineStartup(String),

    /// The engine process died or stopped answering mid-session. Terminates
    /// the current game; a fresh process may serve the next one.
    #[error("engine process failed: {0}")]
    EngineCrash(String),

    /// No search result arrived within the allotted budget plus grace. Never
    /// absorbed silently: the clock model would drift.
    #[error("no search result within {budget_ms}ms budget plus {grace_ms}ms grace")]
    SearchTimeout { budget_ms: u64, grace_ms: u64 },

    /// An externally reported move is illegal against the local position, or
    /// the feed violated the game protocol. Continuing would be incoherent.
    #[error("desynchronized from game feed: {0}")]
    Desynchronized(String),

    /// The matchmaking feed hung up.
    #[error("game feed closed")]
    FeedClosed,

    /// A session state transition was requested out of order.
    #[error("invalid session transition: {0}")]
    InvalidTransition(&'static str),

    #[error("I/O failed: {0}")]
    Io(#[from] io::Error),
}
