//! Engine-emitted UCI events and their text rendering.

use std::fmt;

/// Score reported by the engine. Mate distances are a distinct variant and
/// never coerced into centipawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawns from the side to move's point of view.
    Cp(i32),
    /// Mate in N moves; negative means the side to move is getting mated.
    Mate(i32),
}

/// Bound qualifier attached to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    Lower,
    Upper,
}

/// One declared engine option: the name plus its raw `type ...` tail, kept
/// verbatim since only the name matters for configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDecl {
    pub name: String,
    pub decl: String,
}

/// Partial search telemetry from an `info` line. Every field is optional;
/// engines disagree wildly about what they report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    pub bound: Option<ScoreBound>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub hashfull: Option<u32>,
    pub currmove: Option<String>,
    pub pv: Vec<String>,
    pub string: Option<String>,
}

impl SearchInfo {
    /// Whether this line describes the primary variation.
    pub fn is_primary(&self) -> bool {
        self.multipv.is_none_or(|n| n == 1)
    }

    /// Fold a newer partial line into this snapshot, keeping the latest value
    /// per field.
    pub fn absorb(&mut self, update: SearchInfo) {
        if update.depth.is_some() {
            self.depth = update.depth;
        }
        if update.seldepth.is_some() {
            self.seldepth = update.seldepth;
        }
        if update.multipv.is_some() {
            self.multipv = update.multipv;
        }
        if update.score.is_some() {
            self.score = update.score;
            self.bound = update.bound;
        }
        if update.time_ms.is_some() {
            self.time_ms = update.time_ms;
        }
        if update.nodes.is_some() {
            self.nodes = update.nodes;
        }
        if update.nps.is_some() {
            self.nps = update.nps;
        }
        if update.hashfull.is_some() {
            self.hashfull = update.hashfull;
        }
        if update.currmove.is_some() {
            self.currmove = update.currmove;
        }
        if !update.pv.is_empty() {
            self.pv = update.pv;
        }
        if update.string.is_some() {
            self.string = update.string;
        }
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        *self == SearchInfo::default()
    }
}

/// Events decoded from engine output lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// `id name ...`
    IdName(String),

    /// `id author ...`
    IdAuthor(String),

    /// `option name ... type ...`
    OptionDecl(OptionDecl),

    /// Handshake complete.
    UciOk,

    /// Synchronization acknowledgment.
    ReadyOk,

    /// Partial search progress.
    Info(SearchInfo),

    /// Search result.
    BestMove { best: String, ponder: Option<String> },

    /// Anything this codec does not know. Non-fatal by design of the wire
    /// protocol, which engines extend freely.
    Unrecognized(String),
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::IdName(name) => write!(f, "id name {name}"),
            EngineEvent::IdAuthor(author) => write!(f, "id author {author}"),
            EngineEvent::OptionDecl(opt) => {
                if opt.decl.is_empty() {
                    write!(f, "option name {}", opt.name)
                } else {
                    write!(f, "option name {} {}", opt.name, opt.decl)
                }
            }
            EngineEvent::UciOk => write!(f, "uciok"),
            EngineEvent::ReadyOk => write!(f, "readyok"),
            EngineEvent::Info(info) => {
                write!(f, "info")?;
                write!(f, "{info}")
            }
            EngineEvent::BestMove { best, ponder } => {
                write!(f, "bestmove {best}")?;
                if let Some(ponder) = ponder {
                    write!(f, " ponder {ponder}")?;
                }
                Ok(())
            }
            EngineEvent::Unrecognized(line) => write!(f, "{line}"),
        }
    }
}

impl fmt::Display for SearchInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(depth) = self.depth {
            write!(f, " depth {depth}")?;
        }
        if let Some(seldepth) = self.seldepth {
            write!(f, " seldepth {seldepth}")?;
        }
        if let Some(multipv) = self.multipv {
            write!(f, " multipv {multipv}")?;
        }
        if let Some(score) = self.score {
            match score {
                Score::Cp(cp) => write!(f, " score cp {cp}")?,
                Score::Mate(n) => write!(f, " score mate {n}")?,
            }
            match self.bound {
                Some(ScoreBound::Lower) => write!(f, " lowerbound")?,
                Some(ScoreBound::Upper) => write!(f, " upperbound")?,
                None => {}
            }
        }
        if let Some(time) = self.time_ms {
            write!(f, " time {time}")?;
        }
        if let Some(nodes) = self.nodes {
            write!(f, " nodes {nodes}")?;
        }
        if let Some(nps) = self.nps {
            write!(f, " nps {nps}")?;
        }
        if let Some(hashfull) = self.hashfull {
            write!(f, " hashfull {hashfull}")?;
        }
        if let Some(currmove) = &self.currmove {
            write!(f, " currmove {currmove}")?;
        }
        if !self.pv.is_empty() {
            write!(f, " pv {}", self.pv.join(" "))?;
        }
        if let Some(string) = &self.string {
            write!(f, " string {string}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_keeps_latest_fields() {
        let mut snap = SearchInfo {
            depth: Some(5),
            score: Some(Score::Cp(12)),
            pv: vec!["e2e4".to_string()],
            ..SearchInfo::default()
        };
        snap.absorb(SearchInfo {
            depth: Some(8),
            nodes: Some(40_000),
            ..SearchInfo::default()
        });
        assert_eq!(snap.depth, Some(8));
        assert_eq!(snap.score, Some(Score::Cp(12)));
        assert_eq!(snap.nodes, Some(40_000));
        assert_eq!(snap.pv, vec!["e2e4".to_string()]);
    }

    #[test]
    fn absorb_replaces_score_and_bound_together() {
        let mut snap = SearchInfo {
            score: Some(Score::Cp(30)),
            bound: Some(ScoreBound::Lower),
            ..SearchInfo::default()
        };
        snap.absorb(SearchInfo {
            score: Some(Score::Mate(3)),
            ..SearchInfo::default()
        });
        assert_eq!(snap.score, Some(Score::Mate(3)));
        assert_eq!(snap.bound, None);
    }

    #[test]
    fn multipv_gates_primary() {
        assert!(SearchInfo::default().is_primary());
        assert!(
            SearchInfo {
                multipv: Some(1),
                ..SearchInfo::default()
            }
            .is_primary()
        );
        assert!(
            !SearchInfo {
                multipv: Some(2),
                ..SearchInfo::default()
            }
            .is_primary()
        );
    }
}
