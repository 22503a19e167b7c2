//! Nourish core data models.
//!
//! This crate defines the data structures the challenge progression engine
//! reads and derives: challenges, phases, goals, enrollments, check-ins and
//! achievements.

#![warn(missing_docs)]

// Core identities
mod id;

// Challenge structure (authored externally, read-only to the engine)
mod challenge;
mod phase;
mod goal;
mod plan;

// Participant state and the event log
mod participant;
mod checkin;
mod achievement;

// Re-exports
pub use id::*;

// Challenge structure
pub use challenge::{Challenge, ChallengeStatus};
pub use phase::{Phase, PhaseStatus, PhaseProgress};
pub use goal::{Goal, GoalType, GoalStatus, MetricKind};
pub use plan::{ChallengePlan, Position, Stage};

// Participant & events
pub use participant::Participant;
pub use checkin::{Checkin, CheckinKey, CheckinPayload};
pub use achievement::{Achievement, AchievementType, AchievementScope, AchievementKey};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
