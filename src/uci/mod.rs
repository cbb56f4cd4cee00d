//! UCI protocol codec.
//!
//! Pure translation between structured commands/events and the engine's text
//! lines; no I/O of its own. The event side is total: unknown lines decode to
//! [`EngineEvent::Unrecognized`] because the protocol is append-only and
//! engines keep inventing output.

pub mod commands;
pub mod events;
pub mod parser;

pub use commands::{EngineCommand, GoParams, RootPosition};
pub use events::{EngineEvent, OptionDecl, Score, ScoreBound, SearchInfo};
pub use parser::{decode_event, parse_command};
