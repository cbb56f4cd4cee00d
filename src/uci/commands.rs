//! Engine-bound UCI commands and their exact text encoding.

use std::fmt;

/// Root of a `position` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootPosition {
    /// The standard starting arrangement.
    Startpos,
    /// An arbitrary start given as a FEN string.
    Fen(String),
}

/// Commands sent from the driver to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Start the identification/option handshake.
    Uci,

    /// Synchronization marker; the engine answers `readyok` once all prior
    /// commands have been absorbed.
    IsReady,

    /// New game notification.
    NewGame,

    /// Configure an engine option.
    SetOption { name: String, value: Option<String> },

    /// Set the root position plus the moves played from it.
    Position { root: RootPosition, moves: Vec<String> },

    /// Start a search.
    Go(GoParams),

    /// Stop the current search; the engine still answers with `bestmove`.
    Stop,

    /// Terminate the engine.
    Quit,
}

/// Parameters for the `go` command. All times are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movetime: Option<u64>,
    pub moves_to_go: Option<u32>,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub infinite: bool,
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::Uci => write!(f, "uci"),
            EngineCommand::IsReady => write!(f, "isready"),
            EngineCommand::NewGame => write!(f, "ucinewgame"),
            EngineCommand::SetOption { name, value } => {
                write!(f, "setoption name {name}")?;
                if let Some(value) = value {
                    write!(f, " value {value}")?;
                }
                Ok(())
            }
            EngineCommand::Position { root, moves } => {
                match root {
                    RootPosition::Startpos => write!(f, "position startpos")?,
                    RootPosition::Fen(fen) => write!(f, "position fen {fen}")?,
                }
                if !moves.is_empty() {
                    write!(f, " moves {}", moves.join(" "))?;
                }
                Ok(())
            }
            EngineCommand::Go(params) => {
                write!(f, "go")?;
                if let Some(v) = params.wtime {
                    write!(f, " wtime {v}")?;
                }
                if let Some(v) = params.btime {
                    write!(f, " btime {v}")?;
                }
                if let Some(v) = params.winc {
                    write!(f, " winc {v}")?;
                }
                if let Some(v) = params.binc {
                    write!(f, " binc {v}")?;
                }
                if let Some(v) = params.movetime {
                    write!(f, " movetime {v}")?;
                }
                if let Some(v) = params.moves_to_go {
                    write!(f, " movestogo {v}")?;
                }
                if let Some(v) = params.depth {
                    write!(f, " depth {v}")?;
                }
                if let Some(v) = params.nodes {
                    write!(f, " nodes {v}")?;
                }
                if params.infinite {
                    write!(f, " infinite")?;
                }
                Ok(())
            }
            EngineCommand::Stop => write!(f, "stop"),
            EngineCommand::Quit => write!(f, "quit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_simple_commands() {
        assert_eq!(EngineCommand::Uci.to_string(), "uci");
        assert_eq!(EngineCommand::IsReady.to_string(), "isready");
        assert_eq!(EngineCommand::NewGame.to_string(), "ucinewgame");
        assert_eq!(EngineCommand::Stop.to_string(), "stop");
        assert_eq!(EngineCommand::Quit.to_string(), "quit");
    }

    #[test]
    fn encodes_setoption_with_and_without_value() {
        let with = EngineCommand::SetOption {
            name: "Hash".to_string(),
            value: Some("128".to_string()),
        };
        assert_eq!(with.to_string(), "setoption name Hash value 128");

        let without = EngineCommand::SetOption {
            name: "Clear Hash".to_string(),
            value: None,
        };
        assert_eq!(without.to_string(), "setoption name Clear Hash");
    }

    #[test]
    fn encodes_position_variants() {
        let start = EngineCommand::Position {
            root: RootPosition::Startpos,
            moves: vec![],
        };
        assert_eq!(start.to_string(), "position startpos");

        let with_moves = EngineCommand::Position {
            root: RootPosition::Startpos,
            moves: vec!["e2e4".to_string(), "e7e5".to_string()],
        };
        assert_eq!(with_moves.to_string(), "position startpos moves e2e4 e7e5");

        let fen = EngineCommand::Position {
            root: RootPosition::Fen("8/8/8/8/8/8/8/K1k5 w - - 0 1".to_string()),
            moves: vec!["a1a2".to_string()],
        };
        assert_eq!(
            fen.to_string(),
            "position fen 8/8/8/8/8/8/8/K1k5 w - - 0 1 moves a1a2"
        );
    }

    #[test]
    fn encodes_go_parameters_in_fixed_order() {
        let go = EngineCommand::Go(GoParams {
            wtime: Some(60_000),
            btime: Some(59_000),
            winc: Some(1_000),
            binc: Some(1_000),
            movetime: Some(2_500),
            ..GoParams::default()
        });
        assert_eq!(
            go.to_string(),
            "go wtime 60000 btime 59000 winc 1000 binc 1000 movetime 2500"
        );

        assert_eq!(EngineCommand::Go(GoParams::default()).to_string(), "go");

        let infinite = EngineCommand::Go(GoParams {
            infinite: true,
            ..GoParams::default()
        });
        assert_eq!(infinite.to_string(), "go infinite");
    }
}
