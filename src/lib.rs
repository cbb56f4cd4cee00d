//! Session driver that wires a UCI chess engine process to a matchmaking
//! event feed.
//!
//! One [`EngineProcess`] owns the engine subprocess; a [`GameDriver`] merges
//! the external game feed with engine output into a single sequential loop,
//! tracking the game in a [`Session`] and budgeting each move through the
//! [`MoveScheduler`]. The `uci_bridge` binary (behind the `cli` feature)
//! frames the feed as NDJSON on stdin/stdout.

pub mod clock;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod feed;
pub mod position;
pub mod scheduler;
pub mod session;
pub mod uci;

pub use clock::ClockState;
pub use config::AgentConfig;
pub use driver::{GameDriver, GamePolicy, GameReport};
pub use engine::{EngineConfig, EngineId, EngineProcess};
pub use error::DriverError;
pub use feed::{AgentAction, ClockSync, FeedResult, GameEvent, GameStart};
pub use position::{BoardStatus, GamePosition};
pub use scheduler::{
    MoveScheduler, SearchDisposition, SearchLimit, SearchRequest, SearchResult, TimePolicy,
};
pub use session::{GameVerdict, Outcome, OutcomeReason, Session, SessionState};
