//! Achievement model - one-time milestone unlocks.

use serde::{Deserialize, Serialize};
use crate::id::{AchievementId, GoalId, ParticipantId, PhaseId};
use crate::Time;

/// A derived, append-only unlock record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    /// Unique identifier
    pub id: AchievementId,

    /// Who earned it
    pub participant_id: ParticipantId,

    /// Milestone kind
    pub achievement_type: AchievementType,

    /// Goal for `goal_complete`
    pub goal_id: Option<GoalId>,

    /// Phase for `phase_complete`
    pub phase_id: Option<PhaseId>,

    /// When earned
    pub earned_at: Time,
}

/// Milestone kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AchievementType {
    /// Seven consecutive days
    #[serde(rename = "streak_7")]
    Streak7,
    /// Fourteen consecutive days
    #[serde(rename = "streak_14")]
    Streak14,
    /// Twenty-one consecutive days
    #[serde(rename = "streak_21")]
    Streak21,
    /// A goal reached its target count
    #[serde(rename = "goal_complete")]
    GoalComplete,
    /// A phase met its threshold
    #[serde(rename = "phase_complete")]
    PhaseComplete,
    /// The whole challenge was finished
    #[serde(rename = "challenge_complete")]
    ChallengeComplete,
}

impl AchievementType {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementType::Streak7 => "streak_7",
            AchievementType::Streak14 => "streak_14",
            AchievementType::Streak21 => "streak_21",
            AchievementType::GoalComplete => "goal_complete",
            AchievementType::PhaseComplete => "phase_complete",
            AchievementType::ChallengeComplete => "challenge_complete",
        }
    }

    /// Parse the string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "streak_7" => Some(AchievementType::Streak7),
            "streak_14" => Some(AchievementType::Streak14),
            "streak_21" => Some(AchievementType::Streak21),
            "goal_complete" => Some(AchievementType::GoalComplete),
            "phase_complete" => Some(AchievementType::PhaseComplete),
            "challenge_complete" => Some(AchievementType::ChallengeComplete),
            _ => None,
        }
    }

    /// Whether this is a streak milestone.
    pub fn is_streak(&self) -> bool {
        matches!(
            self,
            AchievementType::Streak7 | AchievementType::Streak14 | AchievementType::Streak21
        )
    }
}

impl std::fmt::Display for AchievementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an achievement is scoped to, beyond the participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AchievementScope {
    /// Streak and challenge milestones: once per participant
    Participant,
    /// Once per goal
    Goal(GoalId),
    /// Once per phase
    Phase(PhaseId),
}

/// The uniqueness key of an achievement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AchievementKey {
    /// Participant
    pub participant_id: ParticipantId,
    /// Milestone kind
    pub achievement_type: AchievementType,
    /// Scope
    pub scope: AchievementScope,
}

impl std::fmt::Display for AchievementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scope {
            AchievementScope::Participant => {
                write!(f, "{}/{}", self.participant_id, self.achievement_type)
            }
            AchievementScope::Goal(id) => {
                write!(f, "{}/{}/goal:{}", self.participant_id, self.achievement_type, id)
            }
            AchievementScope::Phase(id) => {
                write!(f, "{}/{}/phase:{}", self.participant_id, self.achievement_type, id)
            }
        }
    }
}

impl Achievement {
    fn build(
        participant_id: ParticipantId,
        achievement_type: AchievementType,
        goal_id: Option<GoalId>,
        phase_id: Option<PhaseId>,
        earned_at: Time,
    ) -> Self {
        Self {
            id: AchievementId::new(),
            participant_id,
            achievement_type,
            goal_id,
            phase_id,
            earned_at,
        }
    }

    /// A streak milestone.
    pub fn streak(participant_id: ParticipantId, achievement_type: AchievementType, earned_at: Time) -> Self {
        Self::build(participant_id, achievement_type, None, None, earned_at)
    }

    /// A goal completion.
    pub fn goal_complete(participant_id: ParticipantId, goal_id: GoalId, earned_at: Time) -> Self {
        Self::build(participant_id, AchievementType::GoalComplete, Some(goal_id), None, earned_at)
    }

    /// A phase completion.
    pub fn phase_complete(participant_id: ParticipantId, phase_id: PhaseId, earned_at: Time) -> Self {
        Self::build(participant_id, AchievementType::PhaseComplete, None, Some(phase_id), earned_at)
    }

    /// The challenge badge.
    pub fn challenge_complete(participant_id: ParticipantId, earned_at: Time) -> Self {
        Self::build(participant_id, AchievementType::ChallengeComplete, None, None, earned_at)
    }

    /// The uniqueness key of this row.
    pub fn key(&self) -> AchievementKey {
        let scope = match (self.achievement_type, self.goal_id, self.phase_id) {
            (AchievementType::GoalComplete, Some(goal_id), _) => AchievementScope::Goal(goal_id),
            (AchievementType::PhaseComplete, _, Some(phase_id)) => AchievementScope::Phase(phase_id),
            _ => AchievementScope::Participant,
        };
        AchievementKey {
            participant_id: self.participant_id,
            achievement_type: self.achievement_type,
            scope,
        }
    }
}
