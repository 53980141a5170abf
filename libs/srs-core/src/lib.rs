//! Core spaced-repetition library shared by the backend.
//!
//! Provides:
//! - The SM-2 memory-state transition (`sm2::review`)
//! - Shared types (Grade, MemoryState, Phase, Scheduled)
//!
//! Intentionally free of HTTP and database dependencies so the scheduler
//! can be tested in complete isolation.

pub mod sm2;
pub mod types;

pub use sm2::{review, Scheduled, EASE_FLOOR, EASE_INIT, MATURE_THRESHOLD, MAX_INTERVAL_DAYS};
pub use types::{Grade, MemoryState, Phase};
