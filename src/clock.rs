//! Per-side clock bookkeeping.

use std::time::Duration;

use shakmaty::Color;

/// Remaining time and increment per side, in milliseconds.
///
/// Remaining time only ever decreases between increments and is clamped at
/// zero; a zero reading means the flag fell. Feed clock syncs are
/// authoritative and overwrite the local bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockState {
    white_ms: u64,
    black_ms: u64,
    white_inc_ms: u64,
    black_inc_ms: u64,
}

impl ClockState {
    pub fn from_millis(white_ms: u64, black_ms: u64, white_inc_ms: u64, black_inc_ms: u64) -> Self {
        Self {
            white_ms,
            black_ms,
            white_inc_ms,
            black_inc_ms,
        }
    }

    pub fn remaining_ms(&self, side: Color) -> u64 {
        match side {
            Color::White => self.white_ms,
            Color::Black => self.black_ms,
        }
    }

    pub fn remaining(&self, side: Color) -> Duration {
        Duration::from_millis(self.remaining_ms(side))
    }

    pub fn increment_ms(&self, side: Color) -> u64 {
        match side {
            Color::White => self.white_inc_ms,
            Color::Black => self.black_inc_ms,
        }
    }

    /// Overwrite both remaining times with feed-reported values.
    pub fn set_remaining_ms(&mut self, white_ms: u64, black_ms: u64) {
        self.white_ms = white_ms;
        self.black_ms = black_ms;
    }

    /// Deduct think time for one move and credit the increment. Saturates at
    /// zero; a flagged side earns no increment.
    pub fn apply_elapsed(&mut self, side: Color, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis().min(u128::from(u64::MAX)) as u64;
        let inc = self.increment_ms(side);
        let slot = match side {
            Color::White => &mut self.white_ms,
            Color::Black => &mut self.black_ms,
        };
        let next = slot.saturating_sub(elapsed_ms);
        *slot = if next > 0 { next.saturating_add(inc) } else { 0 };
    }

    pub fn flagged(&self, side: Color) -> bool {
        self.remaining_ms(side) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_time_is_deducted_and_increment_credited() {
        let mut clock = ClockState::from_millis(60_000, 60_000, 1_000, 0);
        clock.apply_elapsed(Color::White, Duration::from_millis(4_000));
        assert_eq!(clock.remaining_ms(Color::White), 57_000);
        assert_eq!(clock.remaining_ms(Color::Black), 60_000);
    }

    #[test]
    fn remaining_clamps_at_zero_and_skips_increment() {
        let mut clock = ClockState::from_millis(3_000, 60_000, 5_000, 0);
        clock.apply_elapsed(Color::White, Duration::from_millis(10_000));
        assert_eq!(clock.remaining_ms(Color::White), 0);
        assert!(clock.flagged(Color::White));
        assert!(!clock.flagged(Color::Black));
    }

    #[test]
    fn sync_overwrites_local_bookkeeping() {
        let mut clock = ClockState::from_millis(60_000, 60_000, 0, 0);
        clock.apply_elapsed(Color::White, Duration::from_millis(2_000));
        clock.set_remaining_ms(55_000, 59_500);
        assert_eq!(clock.remaining_ms(Color::White), 55_000);
        assert_eq!(clock.remaining_ms(Color::Black), 59_500);
    }
}
