//! SM-2 spaced repetition algorithm.
//!
//! Reference: Wozniak P.A. (1990), "Optimization of learning", the
//! SuperMemo 2 scheduling function.
//!
//! Grade scale (UI shows Again / Hard / Good / Easy):
//!   0 = again, complete failure
//!   2 = hard,  recalled with great effort
//!   3 = good,  recalled normally
//!   5 = easy,  recalled instantly

use chrono::{Days, NaiveDate};

use crate::types::MemoryState;

/// Ease factor never drops below this.
pub const EASE_FLOOR: f64 = 1.3;
/// Ease factor assigned to a brand-new card.
pub const EASE_INIT: f64 = 2.5;
/// interval_days >= this counts as "mature".
pub const MATURE_THRESHOLD: i32 = 21;
/// Interval cap, roughly one hundred years.
pub const MAX_INTERVAL_DAYS: i32 = 36_500;

/// Outcome of one review cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled {
    pub state: MemoryState,
    pub due: NaiveDate,
}

/// Apply one SM-2 review cycle and return the next state and due date.
///
/// The caller persists the result; this function never touches storage.
/// `score` is the full 0-5 SM-2 scale; callers exposing the restricted
/// UI scale validate through [`crate::Grade`] first.
pub fn review(state: &MemoryState, score: u8, today: NaiveDate) -> Scheduled {
    debug_assert!(score <= 5, "SM-2 score must be 0-5, got {score}");

    let miss = f64::from(5 - score.min(5));
    let ease = (state.ease_factor + 0.1 - miss * (0.08 + miss * 0.02)).max(EASE_FLOOR);

    let (interval, reps) = if score < 3 {
        // Lapse: back to the start of the learning ladder.
        (1, 0)
    } else if state.reps == 0 {
        (1, 1)
    } else if state.reps == 1 {
        (6, 2)
    } else {
        let grown = (f64::from(state.interval_days) * ease).round();
        let capped = grown.min(f64::from(MAX_INTERVAL_DAYS)).max(1.0) as i32;
        (capped, state.reps + 1)
    };

    Scheduled {
        state: MemoryState {
            ease_factor: ease,
            interval_days: interval,
            reps,
        },
        due: today
            .checked_add_days(Days::new(interval as u64))
            .unwrap_or(NaiveDate::MAX),
    }
}
