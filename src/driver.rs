//! Top-level game loop: merges feed and engine events, emits agent actions.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use serde::Serialize;
use shakmaty::Color;

use crate::clock::ClockState;
use crate::engine::EngineProcess;
use crate::error::DriverError;
use crate::feed::{AgentAction, FeedResult, GameEvent, GameStart};
use crate::position::{BoardStatus, GamePosition};
use crate::scheduler::{MoveScheduler, SearchDisposition, SearchLimit, SearchRequest, TimePolicy};
use crate::session::{GameVerdict, Outcome, OutcomeReason, Session};
use crate::uci::Score;

/// How long to sit on an empty feed before re-checking clocks.
const IDLE_TICK: Duration = Duration::from_millis(100);

/// When to agree to draws and when to give up, judged from the engine's last
/// reported score for our side.
#[derive(Debug, Clone, Copy)]
pub struct GamePolicy {
    /// Accept a draw offer at or below this many centipawns. A mate score in
    /// our favour never accepts; a mate score against us always does.
    pub draw_accept_below_cp: i32,
    /// Resign instead of moving once our score drops this low. `None` plays
    /// every position out.
    pub resign_below_cp: Option<i32>,
}

impl Default for GamePolicy {
    fn default() -> Self {
        Self {
            draw_accept_below_cp: 100,
            resign_below_cp: None,
        }
    }
}

/// Report for one finished game.
#[derive(Debug, Clone, Serialize)]
pub struct GameReport {
    pub game_id: String,
    pub outcome: Outcome,
    pub reason: OutcomeReason,
    pub plies: u32,
    pub finished_at: String,
    /// The engine should be replaced before serving another game.
    pub engine_failed: bool,
}

/// Drives one game session over a borrowed engine process. The engine
/// association is released when `run` returns.
pub struct GameDriver<'a> {
    engine: &'a mut EngineProcess,
    scheduler: MoveScheduler,
    policy: GamePolicy,
    feed: &'a Receiver<GameEvent>,
    actions: Sender<AgentAction>,
    last_score: Option<Score>,
    queued: VecDeque<GameEvent>,
}

enum Step {
    Continue,
    Finished(GameVerdict),
}

impl<'a> GameDriver<'a> {
    pub fn new(
        engine: &'a mut EngineProcess,
        feed: &'a Receiver<GameEvent>,
        actions: Sender<AgentAction>,
        time: TimePolicy,
        policy: GamePolicy,
    ) -> Self {
        Self {
            engine,
            scheduler: MoveScheduler::new(time),
            policy,
            feed,
            actions,
            last_score: None,
            queued: VecDeque::new(),
        }
    }

    /// Play one game from its start announcement to a terminal verdict.
    ///
    /// Engine-health failures (crash, unresponsive search) become an
    /// `aborted` report with `engine_failed` set; feed transport failures
    /// propagate as errors since no further game is possible either.
    pub fn run(&mut self, start: GameStart) -> Result<GameReport, DriverError> {
        let position = match &start.initial_fen {
            Some(fen) => GamePosition::from_fen(fen)?,
            None => GamePosition::startpos(),
        };
        let clock = ClockState::from_millis(
            start.white_ms,
            start.black_ms,
            start.white_inc_ms,
            start.black_inc_ms,
        );
        let mut session = Session::new(start.our_color, position, clock);
        self.last_score = None;
        self.queued.clear();

        info!(
            "{}: game {} as {}",
            self.engine.label,
            start.game_id,
            if start.our_color.is_white() { "white" } else { "black" }
        );

        let mut engine_failed = false;
        let verdict = match self.play(&mut session) {
            Ok(verdict) => verdict,
            Err(DriverError::EngineCrash(msg)) => {
                warn!("game {}: engine failed: {msg}", start.game_id);
                engine_failed = true;
                GameVerdict::new(Outcome::Aborted, OutcomeReason::EngineFailure)
            }
            Err(DriverError::SearchTimeout { budget_ms, grace_ms }) => {
                warn!(
                    "game {}: engine unresponsive ({budget_ms}ms budget, {grace_ms}ms grace)",
                    start.game_id
                );
                engine_failed = true;
                GameVerdict::new(Outcome::Aborted, OutcomeReason::EngineFailure)
            }
            Err(DriverError::Desynchronized(msg)) => {
                warn!("game {}: desynchronized: {msg}", start.game_id);
                GameVerdict::new(Outcome::Aborted, OutcomeReason::Desynchronized)
            }
            Err(other) => return Err(other),
        };
        let verdict = session.terminate(verdict);

        let report = GameReport {
            game_id: start.game_id,
            outcome: verdict.outcome,
            reason: verdict.reason,
            plies: session.move_count() as u32,
            finished_at: Local::now().to_rfc3339(),
            engine_failed,
        };
        info!(
            "game {} finished: {:?}/{:?} after {} plies",
            report.game_id, report.outcome, report.reason, report.plies
        );
        Ok(report)
    }

    fn play(&mut self, session: &mut Session) -> Result<GameVerdict, DriverError> {
        session.begin_configuring()?;
        self.engine.new_game()?;
        session.confirm_ready()?;

        loop {
            // Flag-fall settles immediately, without consulting the engine.
            let side = session.position().side_to_move();
            if session.clock().flagged(side) {
                return Ok(if side == session.our_color() {
                    GameVerdict::new(Outcome::Loss, OutcomeReason::Timeout)
                } else {
                    GameVerdict::new(Outcome::Win, OutcomeReason::Timeout)
                });
            }

            // The feed normally announces the end first; local detection
            // keeps the loop from searching a finished position.
            match session.position().status() {
                BoardStatus::Checkmate { winner } => {
                    return Ok(if winner == session.our_color() {
                        GameVerdict::new(Outcome::Win, OutcomeReason::Checkmate)
                    } else {
                        GameVerdict::new(Outcome::Loss, OutcomeReason::Checkmate)
                    });
                }
                BoardStatus::Stalemate => {
                    return Ok(GameVerdict::new(Outcome::Draw, OutcomeReason::Stalemate));
                }
                BoardStatus::InsufficientMaterial => {
                    return Ok(GameVerdict::new(
                        Outcome::Draw,
                        OutcomeReason::InsufficientMaterial,
                    ));
                }
                BoardStatus::Ongoing => {}
            }

            // Replay anything stashed while the last search was running.
            if let Some(event) = self.queued.pop_front() {
                match self.handle_event(session, event)? {
                    Step::Continue => continue,
                    Step::Finished(verdict) => return Ok(verdict),
                }
            }

            let step = if session.is_our_turn() {
                self.take_turn(session)?
            } else {
                self.await_feed(session)?
            };
            match step {
                Step::Continue => {}
                Step::Finished(verdict) => return Ok(verdict),
            }
        }
    }

    /// Issue one search for the current position and emit the chosen move.
    fn take_turn(&mut self, session: &mut Session) -> Result<Step, DriverError> {
        let our_color = session.our_color();
        let budget = self.scheduler.compute_budget(session.clock(), our_color);
        // With only the latency reserve left, grab a depth-1 move rather
        // than spend time the clock no longer has.
        let limit = if budget.is_zero() {
            SearchLimit::Depth(1)
        } else {
            SearchLimit::MoveTime(budget)
        };
        let request = SearchRequest::new(session.position().command(), limit, session.clock());

        session.begin_search()?;
        let disposition =
            self.scheduler
                .issue(self.engine, request, Some(self.feed), &mut self.queued)?;

        let result = match disposition {
            SearchDisposition::Interrupted(event) => {
                // Only terminal events interrupt, so this resolves the game.
                session.abandon_search()?;
                return self.handle_event(session, event);
            }
            SearchDisposition::Completed(result) => result,
        };

        if result.best == "(none)" || result.best == "0000" {
            // The engine sees no move to make; trust the board to say why.
            session.abandon_search()?;
            return match session.position().status() {
                BoardStatus::Ongoing => Err(DriverError::Desynchronized(
                    "engine reported no move in an ongoing position".to_string(),
                )),
                _ => Ok(Step::Continue),
            };
        }

        if let Some(info) = &result.info {
            self.last_score = info.score.or(self.last_score);
        }

        let hopeless = self
            .policy
            .resign_below_cp
            .is_some_and(|threshold| score_to_cp(self.last_score) <= threshold);
        if hopeless {
            session.abandon_search()?;
            info!("resigning at {} cp", score_to_cp(self.last_score));
            self.emit(AgentAction::Resign)?;
            return Ok(Step::Finished(GameVerdict::new(
                Outcome::Loss,
                OutcomeReason::Resignation,
            )));
        }

        session.apply_search_move(&result.best).map_err(|e| {
            // Our own engine handed us an unplayable move; that is an engine
            // health problem, not a feed problem.
            DriverError::EngineCrash(format!("engine produced unplayable move: {e}"))
        })?;
        session.charge_time(our_color, result.elapsed);
        self.emit(AgentAction::Move {
            uci: result.best.clone(),
        })?;
        session.resume_ready()?;
        Ok(Step::Continue)
    }

    /// Wait for the opponent's side of the exchange, draining engine chatter.
    fn await_feed(&mut self, session: &mut Session) -> Result<Step, DriverError> {
        while let Ok(event) = self.engine.events().try_recv() {
            debug!("{}: idle engine event {event}", self.engine.label);
        }
        match self.feed.recv_timeout(IDLE_TICK) {
            Ok(event) => self.handle_event(session, event),
            Err(RecvTimeoutError::Timeout) => Ok(Step::Continue),
            Err(RecvTimeoutError::Disconnected) => Err(DriverError::FeedClosed),
        }
    }

    fn handle_event(
        &mut self,
        session: &mut Session,
        event: GameEvent,
    ) -> Result<Step, DriverError> {
        match event {
            GameEvent::GameStart(start) => Err(DriverError::Desynchronized(format!(
                "feed announced game {} while another game is in progress",
                start.game_id
            ))),
            GameEvent::OpponentMove { uci, clock } => {
                if let Some(sync) = clock {
                    session.sync_clock(sync.white_ms, sync.black_ms);
                }
                session.apply_opponent_move(&uci)?;
                Ok(Step::Continue)
            }
            GameEvent::ClockUpdate { clock } => {
                session.sync_clock(clock.white_ms, clock.black_ms);
                Ok(Step::Continue)
            }
            GameEvent::DrawOffer => {
                let accept = self.should_accept_draw();
                info!(
                    "draw offer: {} (last score {:?})",
                    if accept { "accepting" } else { "declining" },
                    self.last_score
                );
                self.emit(AgentAction::DrawResponse { accept })?;
                // The service confirms with its own game end.
                Ok(Step::Continue)
            }
            GameEvent::GameEnd { result, reason } => {
                Ok(Step::Finished(verdict_from_feed(result, reason.as_deref())))
            }
        }
    }

    /// Accept when we are not clearly better; the engine's score is already
    /// from our side's point of view.
    fn should_accept_draw(&self) -> bool {
        match self.last_score {
            Some(Score::Mate(n)) => n < 0,
            score => score_to_cp(score) <= self.policy.draw_accept_below_cp,
        }
    }

    fn emit(&self, action: AgentAction) -> Result<(), DriverError> {
        self.actions.send(action).map_err(|_| DriverError::FeedClosed)
    }
}

/// Collapse a mate distance into the centipawn scale for policy thresholds.
fn score_to_cp(score: Option<Score>) -> i32 {
    match score {
        Some(Score::Cp(cp)) => cp,
        Some(Score::Mate(n)) => {
            if n > 0 {
                10_000
            } else {
                -10_000
            }
        }
        None => 0,
    }
}

fn verdict_from_feed(result: FeedResult, reason: Option<&str>) -> GameVerdict {
    let outcome = match result {
        FeedResult::Win => Outcome::Win,
        FeedResult::Loss => Outcome::Loss,
        FeedResult::Draw => Outcome::Draw,
        FeedResult::Aborted => Outcome::Aborted,
    };
    let reason = match reason {
        Some("checkmate") => OutcomeReason::Checkmate,
        Some("stalemate") => OutcomeReason::Stalemate,
        Some("resignation") => OutcomeReason::Resignation,
        Some("timeout") => OutcomeReason::Timeout,
        Some("disconnect") => OutcomeReason::OpponentDisconnect,
        Some("draw_agreed") | Some("agreement") => OutcomeReason::DrawAgreed,
        _ => match result {
            FeedResult::Draw => OutcomeReason::DrawAgreed,
            FeedResult::Aborted => OutcomeReason::OpponentDisconnect,
            _ => OutcomeReason::Adjudicated,
        },
    };
    GameVerdict::new(outcome, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_results_map_to_verdicts() {
        let v = verdict_from_feed(FeedResult::Win, Some("resignation"));
        assert_eq!(v.outcome, Outcome::Win);
        assert_eq!(v.reason, OutcomeReason::Resignation);

        let v = verdict_from_feed(FeedResult::Draw, None);
        assert_eq!(v.outcome, Outcome::Draw);
        assert_eq!(v.reason, OutcomeReason::DrawAgreed);

        let v = verdict_from_feed(FeedResult::Aborted, None);
        assert_eq!(v.outcome, Outcome::Aborted);
        assert_eq!(v.reason, OutcomeReason::OpponentDisconnect);

        let v = verdict_from_feed(FeedResult::Loss, Some("something new"));
        assert_eq!(v.reason, OutcomeReason::Adjudicated);
    }

    #[test]
    fn mate_scores_collapse_to_the_centipawn_scale() {
        assert_eq!(score_to_cp(Some(Score::Mate(2))), 10_000);
        assert_eq!(score_to_cp(Some(Score::Mate(-2))), -10_000);
        assert_eq!(score_to_cp(Some(Score::Cp(-37))), -37);
        assert_eq!(score_to_cp(None), 0);
    }
}
