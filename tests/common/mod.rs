//! Stub UCI engines for integration tests, written as shell scripts into a
//! temp directory and run through `/bin/sh`.

#![allow(dead_code)]

use std::fs;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tempfile::TempDir;
use uci_bridge::{AgentAction, EngineConfig, GameStart};

pub struct StubEngine {
    // Held so the script outlives the engine process.
    _dir: TempDir,
    pub config: EngineConfig,
}

/// Build a stub engine whose `go` handling is the given script block. The
/// last received `position` line is available to the block as `$POS`.
pub fn stub_engine(go_block: &str) -> StubEngine {
    let script = format!(
        r#"POS=""
while read -r line; do
  case "$line" in
    uci)
      echo "id name StubEngine 1.0"
      echo "id author driver tests"
      echo "option name Hash type spin default 16 min 1 max 2048"
      echo "option name Threads type spin default 1 min 1 max 8"
      echo "uciok"
      ;;
    isready)
      echo "readyok"
      ;;
    position*)
      POS="$line"
      ;;
    go*)
{go_block}
      ;;
    quit)
      exit 0
      ;;
  esac
done
"#
    );
    raw_stub(&script)
}

/// Build a stub from a complete script, for engines that misbehave before
/// the handshake.
pub fn raw_stub(script: &str) -> StubEngine {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("engine.sh");
    fs::write(&path, script).expect("write stub script");
    let mut config = EngineConfig::new("/bin/sh");
    config.args = vec![path.to_string_lossy().into_owned()];
    config.ready_timeout = Duration::from_secs(5);
    StubEngine { _dir: dir, config }
}

/// A stub that answers the opening as White: `e2e4`, then `g1f3` once the
/// expected reply is in the position.
pub fn opening_stub() -> StubEngine {
    stub_engine(
        r#"      echo "info depth 5 seldepth 7 nodes 4242 nps 120000 score cp 21 pv e2e4"
      case "$POS" in
        "position startpos moves e2e4 e7e5") echo "bestmove g1f3" ;;
        *) echo "bestmove e2e4" ;;
      esac"#,
    )
}

pub fn game_start(our_color: &str, white_ms: u64, black_ms: u64) -> GameStart {
    serde_json::from_str(&format!(
        r#"{{"game_id":"test-game","our_color":"{our_color}","white_ms":{white_ms},"black_ms":{black_ms}}}"#
    ))
    .expect("game start")
}

/// Wait for the next emitted action.
pub fn next_action(actions: &Receiver<AgentAction>, timeout: Duration) -> AgentAction {
    actions.recv_timeout(timeout).expect("expected an agent action")
}

pub fn expect_move(actions: &Receiver<AgentAction>, timeout: Duration) -> String {
    match next_action(actions, timeout) {
        AgentAction::Move { uci } => uci,
        other => panic!("expected a move, got {other:?}"),
    }
}
