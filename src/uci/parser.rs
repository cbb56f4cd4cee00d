//! Text-to-structure decoding for both protocol directions.
//!
//! Event decoding is total: a line the codec does not understand becomes
//! [`EngineEvent::Unrecognized`] rather than an error. Command parsing (the
//! engine-facing direction, used by protocol stubs) is strict.

use anyhow::{Result, anyhow};

use super::commands::{EngineCommand, GoParams, RootPosition};
use super::events::{EngineEvent, OptionDecl, Score, ScoreBound, SearchInfo};

/// Decode one engine output line.
pub fn decode_event(line: &str) -> EngineEvent {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("id name ") {
        return EngineEvent::IdName(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix("id author ") {
        return EngineEvent::IdAuthor(rest.trim().to_string());
    }
    if line == "uciok" {
        return EngineEvent::UciOk;
    }
    if line == "readyok" {
        return EngineEvent::ReadyOk;
    }
    if let Some(rest) = line.strip_prefix("option ") {
        return match parse_option_decl(rest) {
            Some(opt) => EngineEvent::OptionDecl(opt),
            None => EngineEvent::Unrecognized(line.to_string()),
        };
    }
    if line == "info" || line.starts_with("info ") {
        return EngineEvent::Info(parse_info(line));
    }
    if let Some(rest) = line.strip_prefix("bestmove ") {
        let mut tokens = rest.split_whitespace();
        if let Some(best) = tokens.next() {
            let ponder = match (tokens.next(), tokens.next()) {
                (Some("ponder"), Some(mv)) => Some(mv.to_string()),
                _ => None,
            };
            return EngineEvent::BestMove {
                best: best.to_string(),
                ponder,
            };
        }
    }
    EngineEvent::Unrecognized(line.to_string())
}

/// Extract the option name (everything between `name` and `type`) plus the
/// raw declaration tail.
fn parse_option_decl(rest: &str) -> Option<OptionDecl> {
    let rest = rest.strip_prefix("name ")?;
    let (name, decl) = match rest.find(" type ") {
        Some(idx) => (rest[..idx].trim(), rest[idx + 1..].trim()),
        None => (rest.trim(), ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(OptionDecl {
        name: name.to_string(),
        decl: decl.to_string(),
    })
}

/// Parse an `info` line. Malformed or overflowing numeric fields are dropped
/// rather than failing the line; the telemetry is best-effort.
fn parse_info(line: &str) -> SearchInfo {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut info = SearchInfo::default();
    let mut i = 1;
    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                if let Some(v) = tokens.get(i + 1) {
                    info.depth = v.parse().ok();
                    i += 1;
                }
            }
            "seldepth" => {
                if let Some(v) = tokens.get(i + 1) {
                    info.seldepth = v.parse().ok();
                    i += 1;
                }
            }
            "multipv" => {
                if let Some(v) = tokens.get(i + 1) {
                    info.multipv = v.parse().ok();
                    i += 1;
                }
            }
            "score" => {
                if let (Some(kind), Some(v)) = (tokens.get(i + 1), tokens.get(i + 2)) {
                    match *kind {
                        "cp" => {
                            info.score = v.parse().ok().map(Score::Cp);
                            i += 2;
                        }
                        "mate" => {
                            info.score = v.parse().ok().map(Score::Mate);
                            i += 2;
                        }
                        _ => {}
                    }
                }
            }
            "lowerbound" => info.bound = Some(ScoreBound::Lower),
            "upperbound" => info.bound = Some(ScoreBound::Upper),
            "time" => {
                if let Some(v) = tokens.get(i + 1) {
                    info.time_ms = v.parse().ok();
                    i += 1;
                }
            }
            "nodes" => {
                if let Some(v) = tokens.get(i + 1) {
                    info.nodes = v.parse().ok();
                    i += 1;
                }
            }
            "nps" => {
                if let Some(v) = tokens.get(i + 1) {
                    info.nps = v.parse().ok();
                    i += 1;
                }
            }
            "hashfull" => {
                if let Some(v) = tokens.get(i + 1) {
                    info.hashfull = v.parse().ok();
                    i += 1;
                }
            }
            "currmove" => {
                if let Some(v) = tokens.get(i + 1) {
                    info.currmove = Some(v.to_string());
                    i += 1;
                }
            }
            "pv" => {
                info.pv = tokens[i + 1..].iter().map(|s| s.to_string()).collect();
                break;
            }
            "string" => {
                info.string = Some(tokens[i + 1..].join(" "));
                break;
            }
            _ => {}
        }
        i += 1;
    }
    info
}

/// Parse a driver-to-engine command line. Strict: this direction is under our
/// control and a malformed command is a bug, not engine chatter.
pub fn parse_command(line: &str) -> Result<EngineCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&head) = parts.first() else {
        return Err(anyhow!("empty command"));
    };
    match head {
        "uci" => Ok(EngineCommand::Uci),
        "isready" => Ok(EngineCommand::IsReady),
        "ucinewgame" => Ok(EngineCommand::NewGame),
        "stop" => Ok(EngineCommand::Stop),
        "quit" => Ok(EngineCommand::Quit),
        "setoption" => parse_setoption(&parts[1..]),
        "position" => parse_position(&parts[1..]),
        "go" => parse_go(&parts[1..]),
        _ => Err(anyhow!("unknown command: {head}")),
    }
}

fn parse_setoption(parts: &[&str]) -> Result<EngineCommand> {
    if parts.len() < 2 || parts[0] != "name" {
        return Err(anyhow!("invalid setoption format"));
    }
    let value_pos = parts.iter().position(|&p| p == "value");
    let name = match value_pos {
        Some(pos) => parts[1..pos].join(" "),
        None => parts[1..].join(" "),
    };
    if name.is_empty() {
        return Err(anyhow!("setoption requires a name"));
    }
    let value = value_pos.and_then(|pos| {
        let v = parts[pos + 1..].join(" ");
        if v.is_empty() { None } else { Some(v) }
    });
    Ok(EngineCommand::SetOption { name, value })
}

fn parse_position(parts: &[&str]) -> Result<EngineCommand> {
    let (root, moves_start) = match parts.first() {
        Some(&"startpos") => (RootPosition::Startpos, 1),
        Some(&"fen") => {
            let moves_pos = parts.iter().position(|&p| p == "moves");
            let fen_end = moves_pos.unwrap_or(parts.len());
            if fen_end <= 1 {
                return Err(anyhow!("missing FEN payload"));
            }
            (RootPosition::Fen(parts[1..fen_end].join(" ")), fen_end)
        }
        _ => return Err(anyhow!("position must start with 'startpos' or 'fen'")),
    };
    let moves = if parts.get(moves_start) == Some(&"moves") {
        if moves_start + 1 >= parts.len() {
            return Err(anyhow!("'moves' keyword requires at least one move"));
        }
        parts[moves_start + 1..].iter().map(|s| s.to_string()).collect()
    } else {
        Vec::new()
    };
    Ok(EngineCommand::Position { root, moves })
}

fn parse_go(parts: &[&str]) -> Result<EngineCommand> {
    let mut params = GoParams::default();
    let mut i = 0;
    while i < parts.len() {
        match parts[i] {
            "infinite" => params.infinite = true,
            "wtime" => {
                i += 1;
                params.wtime = Some(parse_num(parts.get(i), "wtime")?);
            }
            "btime" => {
                i += 1;
                params.btime = Some(parse_num(parts.get(i), "btime")?);
            }
            "winc" => {
                i += 1;
                params.winc = Some(parse_num(parts.get(i), "winc")?);
            }
            "binc" => {
                i += 1;
                params.binc = Some(parse_num(parts.get(i), "binc")?);
            }
            "movetime" => {
                i += 1;
                params.movetime = Some(parse_num(parts.get(i), "movetime")?);
            }
            "movestogo" => {
                i += 1;
                params.moves_to_go = Some(parse_num(parts.get(i), "movestogo")?);
            }
            "depth" => {
                i += 1;
                params.depth = Some(parse_num(parts.get(i), "depth")?);
            }
            "nodes" => {
                i += 1;
                params.nodes = Some(parse_num(parts.get(i), "nodes")?);
            }
            other => return Err(anyhow!("unknown go parameter: {other}")),
        }
        i += 1;
    }
    Ok(EngineCommand::Go(params))
}

fn parse_num<T: std::str::FromStr>(token: Option<&&str>, name: &str) -> Result<T> {
    let token = token.ok_or_else(|| anyhow!("go {name} requires a value"))?;
    token
        .parse()
        .map_err(|_| anyhow!("invalid {name} value: {token}"))
}
