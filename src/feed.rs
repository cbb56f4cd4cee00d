//! Matchmaking boundary: event and action shapes.
//!
//! The transport is someone else's problem; these types only fix the shape of
//! what is consumed and produced. The binary frames them as NDJSON.

use serde::{Deserialize, Serialize};
use shakmaty::Color;

/// Clock values pushed by the feed. Authoritative over local bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSync {
    pub white_ms: u64,
    pub black_ms: u64,
}

/// Game parameters announced at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStart {
    pub game_id: String,
    #[serde(with = "side")]
    pub our_color: Color,
    /// Variant or adjourned starts; standard start when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_fen: Option<String>,
    pub white_ms: u64,
    pub black_ms: u64,
    #[serde(default)]
    pub white_inc_ms: u64,
    #[serde(default)]
    pub black_inc_ms: u64,
}

/// Result of a game as reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedResult {
    Win,
    Loss,
    Draw,
    Aborted,
}

/// Events consumed from the matchmaking feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GameStart(GameStart),
    OpponentMove {
        uci: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clock: Option<ClockSync>,
    },
    ClockUpdate {
        clock: ClockSync,
    },
    DrawOffer,
    GameEnd {
        result: FeedResult,
        /// Free-text reason; recognized values are `checkmate`,
        /// `resignation`, `timeout` and `disconnect`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl GameEvent {
    /// Terminal events cancel any outstanding search before teardown.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameEvent::GameEnd { .. })
    }
}

/// Actions emitted toward the matchmaking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    Move { uci: String },
    Resign,
    DrawResponse { accept: bool },
}

mod side {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use shakmaty::Color;

    pub fn serialize<S: Serializer>(color: &Color, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if color.is_white() { "white" } else { "black" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Color, D::Error> {
        match String::deserialize(deserializer)?.as_str() {
            "white" => Ok(Color::White),
            "black" => Ok(Color::Black),
            other => Err(D::Error::custom(format!("unknown color '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_round_trip_through_json() {
        let events = vec![
            GameEvent::GameStart(GameStart {
                game_id: "abcd1234".to_string(),
                our_color: Color::Black,
                initial_fen: None,
                white_ms: 180_000,
                black_ms: 180_000,
                white_inc_ms: 2_000,
                black_inc_ms: 2_000,
            }),
            GameEvent::OpponentMove {
                uci: "e2e4".to_string(),
                clock: Some(ClockSync {
                    white_ms: 179_000,
                    black_ms: 180_000,
                }),
            },
            GameEvent::ClockUpdate {
                clock: ClockSync {
                    white_ms: 100_000,
                    black_ms: 90_000,
                },
            },
            GameEvent::DrawOffer,
            GameEvent::GameEnd {
                result: FeedResult::Win,
                reason: Some("resignation".to_string()),
            },
        ];
        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: GameEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }

    #[test]
    fn wire_examples_parse() {
        let start: GameEvent = serde_json::from_str(
            r#"{"type":"game_start","game_id":"g1","our_color":"white","white_ms":60000,"black_ms":60000}"#,
        )
        .unwrap();
        match start {
            GameEvent::GameStart(start) => {
                assert_eq!(start.our_color, Color::White);
                assert_eq!(start.white_inc_ms, 0);
                assert!(start.initial_fen.is_none());
            }
            other => panic!("expected GameStart, got {other:?}"),
        }

        let mv: GameEvent =
            serde_json::from_str(r#"{"type":"opponent_move","uci":"g8f6"}"#).unwrap();
        assert_eq!(
            mv,
            GameEvent::OpponentMove {
                uci: "g8f6".to_string(),
                clock: None,
            }
        );
    }

    #[test]
    fn actions_serialize_with_type_tags() {
        assert_eq!(
            serde_json::to_string(&AgentAction::Move {
                uci: "e2e4".to_string()
            })
            .unwrap(),
            r#"{"type":"move","uci":"e2e4"}"#
        );
        assert_eq!(
            serde_json::to_string(&AgentAction::Resign).unwrap(),
            r#"{"type":"resign"}"#
        );
        assert_eq!(
            serde_json::to_string(&AgentAction::DrawResponse { accept: true }).unwrap(),
            r#"{"type":"draw_response","accept":true}"#
        );
    }

    #[test]
    fn unknown_colors_are_rejected() {
        let res: Result<GameStart, _> = serde_json::from_str(
            r#"{"game_id":"g1","our_color":"green","white_ms":1,"black_ms":1}"#,
        );
        assert!(res.is_err());
    }
}
