//! Participant model - a patient's enrollment and progression pointers.

use serde::{Deserialize, Serialize};
use crate::id::{ChallengeId, GoalId, ParticipantId, PatientRef, PhaseId};
use crate::Time;

/// A patient's enrollment record in a challenge.
///
/// `current_phase_id` and `current_goal_id` are weak references: the
/// participant points at a phase/goal but never owns its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique identifier
    pub id: ParticipantId,

    /// Enrolled challenge
    pub challenge_id: ChallengeId,

    /// Patient this enrollment belongs to
    pub patient: PatientRef,

    /// Current phase; none before seeding or while on direct goals
    pub current_phase_id: Option<PhaseId>,

    /// Current goal; none before seeding
    pub current_goal_id: Option<GoalId>,

    /// Consecutive days on the active goal as of the last check-in
    pub streak_count: u32,

    /// Longest streak ever observed in this challenge
    pub best_streak: u32,

    /// Whether the whole challenge has been completed
    pub badge_earned: bool,

    /// When the challenge was completed
    pub completed_at: Option<Time>,

    /// When enrolled
    pub joined_at: Time,
}

impl Participant {
    /// Enroll a patient with unseeded pointers.
    pub fn new(challenge_id: ChallengeId, patient: PatientRef) -> Self {
        Self {
            id: ParticipantId::new(),
            challenge_id,
            patient,
            current_phase_id: None,
            current_goal_id: None,
            streak_count: 0,
            best_streak: 0,
            badge_earned: false,
            completed_at: None,
            joined_at: chrono::Utc::now(),
        }
    }

    /// Whether pointers have been seeded.
    pub fn is_seeded(&self) -> bool {
        self.current_goal_id.is_some()
    }

    /// Record a freshly computed current streak, keeping `best_streak` monotonic.
    pub fn record_streak(&mut self, current: u32, best_seen: u32) {
        self.streak_count = current;
        self.best_streak = self.best_streak.max(current).max(best_seen);
    }
}
