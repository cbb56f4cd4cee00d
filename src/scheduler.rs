//! Per-move time budgeting and search issuance.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, select};
use log::{debug, warn};
use shakmaty::Color;

use crate::clock::ClockState;
use crate::engine::EngineProcess;
use crate::error::DriverError;
use crate::feed::GameEvent;
use crate::uci::{EngineCommand, EngineEvent, GoParams, SearchInfo};

/// Fallback deadline for depth-limited searches, which carry no time budget
/// of their own.
const DEPTH_SEARCH_BUDGET: Duration = Duration::from_secs(60);

/// Time allocation policy: remaining time is split over a fixed horizon, with
/// a floor for minimum thinking time and a reserve held back so a reply can
/// still cross the wire before the flag falls.
#[derive(Debug, Clone, Copy)]
pub struct TimePolicy {
    pub allocation_moves: u64,
    pub min_think: Duration,
    pub latency_reserve: Duration,
    /// Extra wait past the budget before declaring the engine unresponsive.
    pub grace: Duration,
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self {
            allocation_moves: 40,
            min_think: Duration::from_millis(50),
            latency_reserve: Duration::from_millis(200),
            grace: Duration::from_millis(1_000),
        }
    }
}

/// Limit for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    MoveTime(Duration),
    Depth(u32),
}

/// Parameters for one engine query. Consumed exactly once by
/// [`MoveScheduler::issue`].
#[derive(Debug, Clone)]
pub struct SearchRequest {
    position: EngineCommand,
    go: GoParams,
    budget: Duration,
}

impl SearchRequest {
    /// Build a request for the given position command, carrying the clock
    /// context the engine expects alongside the limit.
    pub fn new(position: EngineCommand, limit: SearchLimit, clock: &ClockState) -> Self {
        let mut go = GoParams {
            wtime: Some(clock.remaining_ms(Color::White)),
            btime: Some(clock.remaining_ms(Color::Black)),
            winc: Some(clock.increment_ms(Color::White)),
            binc: Some(clock.increment_ms(Color::Black)),
            ..GoParams::default()
        };
        let budget = match limit {
            SearchLimit::MoveTime(d) => {
                go.movetime = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
                d
            }
            SearchLimit::Depth(d) => {
                go.depth = Some(d);
                DEPTH_SEARCH_BUDGET
            }
        };
        Self {
            position,
            go,
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

/// The engine's answer to one request.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best: String,
    pub ponder: Option<String>,
    /// Last primary-variation telemetry seen before the result.
    pub info: Option<SearchInfo>,
    pub elapsed: Duration,
}

/// How an issued search resolved.
#[derive(Debug)]
pub enum SearchDisposition {
    /// The engine produced a move.
    Completed(SearchResult),
    /// A terminal feed event arrived mid-search; the search was cancelled,
    /// its acknowledgment awaited, and the stale result discarded.
    Interrupted(GameEvent),
}

/// Decides per-move budgets and runs the request/response race against them.
pub struct MoveScheduler {
    policy: TimePolicy,
}

impl MoveScheduler {
    pub fn new(policy: TimePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TimePolicy {
        &self.policy
    }

    /// Per-move budget: a slice of usable time plus the increment, clamped so
    /// the reserve is never touched. Returns zero once only the reserve is
    /// left.
    pub fn compute_budget(&self, clock: &ClockState, side: Color) -> Duration {
        let remaining = clock.remaining_ms(side);
        let reserve = self.policy.latency_reserve.as_millis() as u64;
        let usable = remaining.saturating_sub(reserve);
        if usable == 0 {
            return Duration::ZERO;
        }
        let per_move = usable / self.policy.allocation_moves.max(1);
        let candidate = per_move.saturating_add(clock.increment_ms(side));
        let floor = (self.policy.min_think.as_millis() as u64).min(usable);
        Duration::from_millis(candidate.clamp(floor, usable))
    }

    /// Submit one request and wait for its result.
    ///
    /// Feed events arriving during the wait are stashed in `queued` for the
    /// driver to replay afterwards, except terminal ones, which cancel the
    /// search. If nothing arrives within budget + grace a `stop` is sent; if
    /// the engine still stays silent for another grace period the search
    /// fails with `SearchTimeout` and is never silently retried.
    pub fn issue(
        &self,
        engine: &mut EngineProcess,
        req: SearchRequest,
        feed: Option<&Receiver<GameEvent>>,
        queued: &mut VecDeque<GameEvent>,
    ) -> Result<SearchDisposition, DriverError> {
        engine.send(&req.position)?;
        engine.send(&EngineCommand::Go(req.go.clone()))?;

        let start = Instant::now();
        let soft = req.budget + self.policy.grace;
        let hard = soft + self.policy.grace;
        let mut stop_sent = false;
        let mut snapshot = SearchInfo::default();

        loop {
            let elapsed = start.elapsed();
            let deadline = if stop_sent { hard } else { soft };
            if elapsed >= deadline {
                if !stop_sent {
                    debug!("{}: budget exhausted, sending stop", engine.label);
                    engine.send(&EngineCommand::Stop)?;
                    stop_sent = true;
                    continue;
                }
                return Err(DriverError::SearchTimeout {
                    budget_ms: req.budget.as_millis() as u64,
                    grace_ms: self.policy.grace.as_millis() as u64,
                });
            }
            let wait = deadline - elapsed;

            let wake = match feed {
                Some(feed_rx) => select! {
                    recv(engine.events()) -> ev => match ev {
                        Ok(ev) => Wakeup::Engine(ev),
                        Err(_) => Wakeup::EngineGone,
                    },
                    recv(feed_rx) -> ev => match ev {
                        Ok(ev) => Wakeup::Feed(ev),
                        Err(_) => Wakeup::FeedGone,
                    },
                    default(wait) => Wakeup::Deadline,
                },
                None => match engine.events().recv_timeout(wait) {
                    Ok(ev) => Wakeup::Engine(ev),
                    Err(RecvTimeoutError::Timeout) => Wakeup::Deadline,
                    Err(RecvTimeoutError::Disconnected) => Wakeup::EngineGone,
                },
            };

            match wake {
                Wakeup::Engine(EngineEvent::Info(info)) => {
                    if info.is_primary() {
                        snapshot.absorb(info);
                    }
                }
                Wakeup::Engine(EngineEvent::BestMove { best, ponder }) => {
                    return Ok(SearchDisposition::Completed(SearchResult {
                        best,
                        ponder,
                        info: if snapshot.is_empty() {
                            None
                        } else {
                            Some(snapshot)
                        },
                        elapsed: start.elapsed(),
                    }));
                }
                Wakeup::Engine(EngineEvent::Unrecognized(line)) => {
                    debug!("{}: ignoring unrecognized line: {line}", engine.label);
                }
                Wakeup::Engine(other) => {
                    debug!("{}: unexpected mid-search event {other}", engine.label);
                }
                Wakeup::EngineGone => return Err(engine.crash_error()),
                Wakeup::Feed(ev) if ev.is_terminal() => {
                    self.cancel(engine)?;
                    return Ok(SearchDisposition::Interrupted(ev));
                }
                Wakeup::Feed(ev) => queued.push_back(ev),
                Wakeup::FeedGone => {
                    // best effort: do not leave the search running
                    let _ = self.cancel(engine);
                    return Err(DriverError::FeedClosed);
                }
                Wakeup::Deadline => {}
            }
        }
    }

    /// Cancel an in-flight search and wait for its `bestmove` acknowledgment
    /// so a stale result cannot surface later.
    pub fn cancel(&self, engine: &mut EngineProcess) -> Result<(), DriverError> {
        engine.send(&EngineCommand::Stop)?;
        let deadline = Instant::now() + self.policy.grace + self.policy.grace;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match engine.read_event(left)? {
                Some(EngineEvent::BestMove { best, .. }) => {
                    debug!("{}: discarded stale bestmove {best}", engine.label);
                    return Ok(());
                }
                Some(_) => {}
                None => {
                    warn!("{}: no acknowledgment after stop", engine.label);
                    return Err(DriverError::EngineCrash(format!(
                        "{}: no bestmove acknowledgment after stop",
                        engine.label
                    )));
                }
            }
        }
    }
}

enum Wakeup {
    Engine(EngineEvent),
    EngineGone,
    Feed(GameEvent),
    FeedGone,
    Deadline,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> MoveScheduler {
        MoveScheduler::new(TimePolicy::default())
    }

    #[test]
    fn budget_is_a_slice_of_usable_time_plus_increment() {
        let clock = ClockState::from_millis(60_200, 60_200, 1_000, 1_000);
        // (60200 - 200) / 40 + 1000
        assert_eq!(
            scheduler().compute_budget(&clock, Color::White),
            Duration::from_millis(2_500)
        );
    }

    #[test]
    fn budget_never_touches_the_reserve() {
        let policy = TimePolicy::default();
        let sched = MoveScheduler::new(policy);
        let reserve = policy.latency_reserve.as_millis() as u64;
        for remaining in [0, 1, 49, 50, 199, 200, 201, 250, 1_000, 60_000, 3_600_000] {
            for inc in [0, 1_000, 10_000] {
                let clock = ClockState::from_millis(remaining, remaining, inc, inc);
                let budget = sched.compute_budget(&clock, Color::Black).as_millis() as u64;
                assert!(
                    budget <= remaining.saturating_sub(reserve),
                    "budget {budget} exceeds usable time at remaining {remaining} inc {inc}"
                );
            }
        }
    }

    #[test]
    fn budget_honors_the_floor_when_time_allows() {
        let policy = TimePolicy::default();
        let sched = MoveScheduler::new(policy);
        // Tight but not empty: floor applies, capped by usable time.
        let clock = ClockState::from_millis(1_200, 1_200, 0, 0);
        let budget = sched.compute_budget(&clock, Color::White);
        assert_eq!(budget, policy.min_think);

        // Remaining time equal to the floor: everything past the reserve is
        // already less than the floor, so the clamp wins.
        let floor_ms = policy.min_think.as_millis() as u64;
        let clock = ClockState::from_millis(floor_ms, floor_ms, 0, 0);
        assert_eq!(sched.compute_budget(&clock, Color::White), Duration::ZERO);
    }

    #[test]
    fn budget_is_zero_once_only_reserve_is_left() {
        let clock = ClockState::from_millis(150, 150, 5_000, 5_000);
        assert_eq!(scheduler().compute_budget(&clock, Color::White), Duration::ZERO);
    }

    #[test]
    fn movetime_requests_carry_clock_context() {
        let clock = ClockState::from_millis(60_000, 55_000, 1_000, 2_000);
        let req = SearchRequest::new(
            EngineCommand::Position {
                root: crate::uci::RootPosition::Startpos,
                moves: vec![],
            },
            SearchLimit::MoveTime(Duration::from_millis(2_500)),
            &clock,
        );
        assert_eq!(
            EngineCommand::Go(req.go.clone()).to_string(),
            "go wtime 60000 btime 55000 winc 1000 binc 2000 movetime 2500"
        );
        assert_eq!(req.budget(), Duration::from_millis(2_500));
    }

    #[test]
    fn depth_requests_use_the_fallback_budget() {
        let clock = ClockState::from_millis(1_000, 1_000, 0, 0);
        let req = SearchRequest::new(
            EngineCommand::Position {
                root: crate::uci::RootPosition::Startpos,
                moves: vec![],
            },
            SearchLimit::Depth(1),
            &clock,
        );
        assert_eq!(req.budget(), DEPTH_SEARCH_BUDGET);
    }
}
