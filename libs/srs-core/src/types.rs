//! Core types for spaced-repetition scheduling.

use serde::{Deserialize, Serialize};

use crate::sm2::{EASE_INIT, MATURE_THRESHOLD};

/// Review grade on the SM-2 scale, restricted to the four values the
/// flashcard UI exposes (Again / Hard / Good / Easy).
///
/// The transition formula itself accepts the full 0–5 range; this enum is
/// the validation boundary for scores arriving from clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    /// Numeric SM-2 score.
    pub fn score(self) -> u8 {
        match self {
            Self::Again => 0,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 5,
        }
    }

    /// Parse a client-submitted score. Only {0, 2, 3, 5} are accepted.
    pub fn from_score(score: i64) -> Option<Self> {
        match score {
            0 => Some(Self::Again),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            5 => Some(Self::Easy),
            _ => None,
        }
    }

    /// A grade of 3 or better counts as a successful recall.
    pub fn is_correct(self) -> bool {
        self.score() >= 3
    }
}

/// Per-card memory state carried between reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    /// Interval growth multiplier, floored at 1.3.
    pub ease_factor: f64,
    /// Days until the next scheduled review.
    pub interval_days: i32,
    /// Consecutive successful repetitions. 0 = brand-new or lapsed card.
    pub reps: i32,
}

impl MemoryState {
    /// State synthesized for an item reviewed for the first time.
    pub fn initial() -> Self {
        Self {
            ease_factor: EASE_INIT,
            interval_days: 1,
            reps: 0,
        }
    }

    /// Observability classification. Never persisted.
    pub fn phase(&self) -> Phase {
        if self.reps == 0 {
            Phase::New
        } else if self.interval_days < MATURE_THRESHOLD {
            Phase::Learning
        } else {
            Phase::Mature
        }
    }
}

impl Default for MemoryState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Lifecycle phase of a card, derived from its memory state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    New,
    Learning,
    Mature,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_scores_match_ui_scale() {
        assert_eq!(Grade::Again.score(), 0);
        assert_eq!(Grade::Hard.score(), 2);
        assert_eq!(Grade::Good.score(), 3);
        assert_eq!(Grade::Easy.score(), 5);
    }

    #[test]
    fn from_score_rejects_hidden_grades() {
        assert_eq!(Grade::from_score(1), None);
        assert_eq!(Grade::from_score(4), None);
        assert_eq!(Grade::from_score(6), None);
        assert_eq!(Grade::from_score(-1), None);
        assert_eq!(Grade::from_score(3), Some(Grade::Good));
    }

    #[test]
    fn correctness_threshold_is_three() {
        assert!(!Grade::Again.is_correct());
        assert!(!Grade::Hard.is_correct());
        assert!(Grade::Good.is_correct());
        assert!(Grade::Easy.is_correct());
    }

    #[test]
    fn phase_classification() {
        let new = MemoryState::initial();
        assert_eq!(new.phase(), Phase::New);

        let learning = MemoryState {
            ease_factor: 2.5,
            interval_days: 6,
            reps: 2,
        };
        assert_eq!(learning.phase(), Phase::Learning);

        let mature = MemoryState {
            ease_factor: 2.5,
            interval_days: 21,
            reps: 5,
        };
        assert_eq!(mature.phase(), Phase::Mature);
    }
}
