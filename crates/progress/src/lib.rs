//! Challenge Progression (Layer 3)
//!
//! Turns daily check-ins into goal completion, phase advancement, streaks and
//! one-time achievements.

#![warn(missing_docs)]

pub mod error;
pub mod config;
pub mod clock;
pub mod locks;
pub mod streak;
pub mod evaluator;
pub mod advancer;
pub mod detector;
pub mod recorder;
pub mod orchestrator;
pub mod tracker;

pub use error::{ProgressError, Result};
pub use config::{EngineConfig, StreakMilestone};
pub use clock::{Clock, SystemClock, FixedClock};
pub use locks::ParticipantLocks;
pub use streak::{Streak, StreakCalculator};
pub use evaluator::GoalEvaluator;
pub use advancer::{Advancement, PhaseAdvancer};
pub use detector::{AchievementDetector, PostAdvanceState};
pub use recorder::{CheckinRecorder, PreparedCheckin, check_challenge, validate_payload};
pub use orchestrator::{CheckinOutcome, Progression, ProgressionEngine};
pub use tracker::{ProgressTracker, ProgressSnapshot, PhaseSnapshot, GoalSnapshot};
