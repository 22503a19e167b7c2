//! Phase model - ordered challenge stages with a completion threshold.

use serde::{Deserialize, Serialize};
use crate::id::{ChallengeId, PhaseId};

/// A phase is an ordered stage of a challenge containing goals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    /// Unique identifier
    pub id: PhaseId,

    /// Owning challenge
    pub challenge_id: ChallengeId,

    /// Phase name
    pub name: String,

    /// Position among the challenge's phases (total order key)
    pub order_index: u32,

    /// Percentage (0-100) of goals that must be complete for the phase to count as completed
    pub completion_threshold: u8,
}

/// Phase status as seen by a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Not reached yet, or left behind without meeting the threshold
    Locked,
    /// The participant's current phase
    Active,
    /// Threshold met
    Completed,
}

impl PhaseStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Locked => "locked",
            PhaseStatus::Active => "active",
            PhaseStatus::Completed => "completed",
        }
    }
}

/// Evaluated progress for a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    /// Evaluated status
    pub status: PhaseStatus,

    /// Completed goals
    pub completed_goals: usize,

    /// Total goals
    pub total_goals: usize,
}

impl PhaseProgress {
    /// Percentage complete.
    pub fn percentage(&self) -> f32 {
        if self.total_goals > 0 {
            (self.completed_goals as f32 / self.total_goals as f32) * 100.0
        } else {
            100.0
        }
    }
}

impl Phase {
    /// Create a phase.
    pub fn new(
        challenge_id: ChallengeId,
        name: impl Into<String>,
        order_index: u32,
        completion_threshold: u8,
    ) -> Self {
        Self {
            id: PhaseId::new(),
            challenge_id,
            name: name.into(),
            order_index,
            completion_threshold: completion_threshold.min(100),
        }
    }

    /// Whether `completed` of `total` goals meets the threshold.
    ///
    /// Integer arithmetic: `completed / total * 100 >= threshold`. A phase with
    /// no goals is vacuously complete.
    pub fn threshold_met(&self, completed: usize, total: usize) -> bool {
        if total == 0 {
            return true;
        }
        completed * 100 >= usize::from(self.completion_threshold.min(100)) * total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_allows_partial_completion() {
        let phase = Phase::new(ChallengeId::new(), "Foundations", 0, 80);
        assert!(!phase.threshold_met(3, 5));
        assert!(phase.threshold_met(4, 5));
        assert!(phase.threshold_met(5, 5));
    }

    #[test]
    fn test_threshold_rounding_edges() {
        let phase = Phase::new(ChallengeId::new(), "Thirds", 0, 67);
        // 2/3 = 66.6%
        assert!(!phase.threshold_met(2, 3));

        let zero = Phase::new(ChallengeId::new(), "Open", 0, 0);
        assert!(zero.threshold_met(0, 4));
    }

    #[test]
    fn test_empty_phase_is_complete() {
        let phase = Phase::new(ChallengeId::new(), "Empty", 0, 100);
        assert!(phase.threshold_met(0, 0));
    }

    #[test]
    fn test_threshold_is_clamped() {
        let phase = Phase::new(ChallengeId::new(), "Clamp", 0, 250);
        assert_eq!(phase.completion_threshold, 100);
    }
}
