//! Per-game session state machine.
//!
//! The session is the single writer over its position and clock. At most one
//! search can be in flight at a time; `begin_search` enforces that.

use serde::Serialize;
use shakmaty::Color;

use crate::clock::ClockState;
use crate::error::DriverError;
use crate::position::GamePosition;

/// Lifecycle of one game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Configuring,
    Ready,
    Searching,
    MoveApplied,
    Terminal,
}

/// Terminal tag for a finished game, from the agent's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ongoing,
    Win,
    Loss,
    Draw,
    Aborted,
}

/// Why the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    Resignation,
    Timeout,
    EngineFailure,
    OpponentDisconnect,
    Desynchronized,
    DrawAgreed,
    /// The matchmaking service ended the game for a reason it did not name.
    Adjudicated,
}

/// Outcome plus reason. Set exactly once per game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameVerdict {
    pub outcome: Outcome,
    pub reason: OutcomeReason,
}

impl GameVerdict {
    pub fn new(outcome: Outcome, reason: OutcomeReason) -> Self {
        Self { outcome, reason }
    }
}

/// One game's position history, clock state and engine readiness.
pub struct Session {
    state: SessionState,
    position: GamePosition,
    clock: ClockState,
    our_color: Color,
    verdict: Option<GameVerdict>,
}

impl Session {
    pub fn new(our_color: Color, position: GamePosition, clock: ClockState) -> Self {
        Self {
            state: SessionState::Idle,
            position,
            clock,
            our_color,
            verdict: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn our_color(&self) -> Color {
        self.our_color
    }

    pub fn position(&self) -> &GamePosition {
        &self.position
    }

    pub fn clock(&self) -> &ClockState {
        &self.clock
    }

    pub fn verdict(&self) -> Option<GameVerdict> {
        self.verdict
    }

    pub fn is_our_turn(&self) -> bool {
        self.position.side_to_move() == self.our_color
    }

    pub fn move_count(&self) -> usize {
        self.position.move_count()
    }

    /// Feed clock values win over local bookkeeping.
    pub fn sync_clock(&mut self, white_ms: u64, black_ms: u64) {
        self.clock.set_remaining_ms(white_ms, black_ms);
    }

    pub fn charge_time(&mut self, side: Color, elapsed: std::time::Duration) {
        self.clock.apply_elapsed(side, elapsed);
    }

    pub fn begin_configuring(&mut self) -> Result<(), DriverError> {
        if self.state != SessionState::Idle {
            return Err(DriverError::InvalidTransition("begin_configuring outside Idle"));
        }
        self.state = SessionState::Configuring;
        Ok(())
    }

    pub fn confirm_ready(&mut self) -> Result<(), DriverError> {
        if self.state != SessionState::Configuring {
            return Err(DriverError::InvalidTransition("confirm_ready outside Configuring"));
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Claim the single outstanding search slot.
    pub fn begin_search(&mut self) -> Result<(), DriverError> {
        if self.state != SessionState::Ready {
            return Err(DriverError::InvalidTransition("begin_search outside Ready"));
        }
        self.state = SessionState::Searching;
        Ok(())
    }

    /// Apply the move produced by a resolved search.
    pub fn apply_search_move(&mut self, mv: &str) -> Result<(), DriverError> {
        if self.state != SessionState::Searching {
            return Err(DriverError::InvalidTransition("apply_search_move outside Searching"));
        }
        self.position.try_push(mv)?;
        self.state = SessionState::MoveApplied;
        Ok(())
    }

    /// Release the search slot after the resolved move has been emitted.
    pub fn resume_ready(&mut self) -> Result<(), DriverError> {
        if self.state != SessionState::MoveApplied {
            return Err(DriverError::InvalidTransition("resume_ready outside MoveApplied"));
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Release the search slot without a move (search was cancelled or failed).
    pub fn abandon_search(&mut self) -> Result<(), DriverError> {
        if self.state != SessionState::Searching {
            return Err(DriverError::InvalidTransition("abandon_search outside Searching"));
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Append an externally reported move. Only valid while no search is in
    /// flight; mid-search arrivals must wait until the search resolves.
    pub fn apply_opponent_move(&mut self, mv: &str) -> Result<(), DriverError> {
        if !matches!(self.state, SessionState::Ready | SessionState::MoveApplied) {
            return Err(DriverError::InvalidTransition("apply_opponent_move during a search"));
        }
        if self.position.side_to_move() == self.our_color {
            return Err(DriverError::Desynchronized(format!(
                "feed reported move '{mv}' but it is our turn"
            )));
        }
        self.position.try_push(mv)
    }

    /// Record the terminal verdict. First writer wins; the session never
    /// leaves `Terminal` afterwards.
    pub fn terminate(&mut self, verdict: GameVerdict) -> GameVerdict {
        if let Some(existing) = self.verdict {
            return existing;
        }
        self.verdict = Some(verdict);
        self.state = SessionState::Terminal;
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ready_session() -> Session {
        let mut session = Session::new(
            Color::White,
            GamePosition::startpos(),
            ClockState::from_millis(60_000, 60_000, 0, 0),
        );
        session.begin_configuring().unwrap();
        session.confirm_ready().unwrap();
        session
    }

    #[test]
    fn replay_preserves_move_count() {
        let mut session = ready_session();
        let moves = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6"];
        for pair in moves.chunks(2) {
            session.begin_search().unwrap();
            session.apply_search_move(pair[0]).unwrap();
            session.resume_ready().unwrap();
            session.apply_opponent_move(pair[1]).unwrap();
        }
        assert_eq!(session.move_count(), moves.len());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn only_one_search_outstanding() {
        let mut session = ready_session();
        session.begin_search().unwrap();
        assert!(matches!(
            session.begin_search(),
            Err(DriverError::InvalidTransition(_))
        ));
        session.apply_search_move("e2e4").unwrap();
        assert!(matches!(
            session.begin_search(),
            Err(DriverError::InvalidTransition(_))
        ));
        session.resume_ready().unwrap();
        session.apply_opponent_move("e7e5").unwrap();
        session.begin_search().unwrap();
    }

    #[test]
    fn opponent_moves_are_rejected_mid_search() {
        let mut session = ready_session();
        session.begin_search().unwrap();
        assert!(matches!(
            session.apply_opponent_move("e7e5"),
            Err(DriverError::InvalidTransition(_))
        ));
    }

    #[test]
    fn scenario_ready_with_both_opening_moves_before_next_search() {
        let mut session = ready_session();
        session.begin_search().unwrap();
        session.apply_search_move("e2e4").unwrap();
        session.resume_ready().unwrap();
        session.apply_opponent_move("e7e5").unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.position().moves(), ["e2e4", "e7e5"]);
    }

    #[test]
    fn verdict_is_set_exactly_once() {
        let mut session = ready_session();
        let first = session.terminate(GameVerdict::new(Outcome::Win, OutcomeReason::Checkmate));
        let second = session.terminate(GameVerdict::new(Outcome::Loss, OutcomeReason::Timeout));
        assert_eq!(first, second);
        assert_eq!(session.state(), SessionState::Terminal);
        assert_eq!(session.verdict().unwrap().outcome, Outcome::Win);
    }

    #[test]
    fn abandoned_search_returns_to_ready() {
        let mut session = ready_session();
        session.begin_search().unwrap();
        session.abandon_search().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn charge_time_hits_the_right_side() {
        let mut session = ready_session();
        session.charge_time(Color::White, Duration::from_millis(1_500));
        assert_eq!(session.clock().remaining_ms(Color::White), 58_500);
        assert_eq!(session.clock().remaining_ms(Color::Black), 60_000);
    }
}
