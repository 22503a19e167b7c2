//! Exactly-once achievement detection.

use std::collections::HashSet;
use nourish_core::{Achievement, AchievementKey, GoalId, Participant, PhaseId, Time};
use tracing::debug;

use crate::config::StreakMilestone;
use crate::streak::Streak;

/// Participant state after streak recomputation and pointer advancement.
#[derive(Debug, Clone, Default)]
pub struct PostAdvanceState {
    /// Recomputed streak
    pub streak: Streak,
    /// Goals whose completion predicate holds
    pub completed_goals: Vec<GoalId>,
    /// Phases whose threshold is met
    pub completed_phases: Vec<PhaseId>,
    /// Whether the challenge badge is earned
    pub badge_earned: bool,
}

/// Detects newly crossed milestones.
pub struct AchievementDetector {
    milestones: Vec<StreakMilestone>,
}

impl AchievementDetector {
    /// Create a detector for the given streak milestones.
    pub fn new(milestones: Vec<StreakMilestone>) -> Self {
        Self { milestones }
    }

    /// Achievements earned by `state` that are not already in `existing`.
    ///
    /// Running it again with the returned rows added to `existing` yields
    /// nothing, so replaying the same history never duplicates.
    pub fn detect(
        &self,
        participant: &Participant,
        state: &PostAdvanceState,
        existing: &[Achievement],
        now: Time,
    ) -> Vec<Achievement> {
        let mut seen: HashSet<AchievementKey> = existing
            .iter()
            .filter(|a| a.participant_id == participant.id)
            .map(Achievement::key)
            .collect();
        let mut earned = Vec::new();
        let mut push = |candidate: Achievement| {
            if seen.insert(candidate.key()) {
                debug!(
                    "Participant {} crossed {}",
                    candidate.participant_id, candidate.achievement_type
                );
                earned.push(candidate);
            }
        };

        for milestone in &self.milestones {
            if milestone.achievement.is_streak() && state.streak.current >= milestone.days {
                push(Achievement::streak(participant.id, milestone.achievement, now));
            }
        }
        for goal_id in &state.completed_goals {
            push(Achievement::goal_complete(participant.id, *goal_id, now));
        }
        for phase_id in &state.completed_phases {
            push(Achievement::phase_complete(participant.id, *phase_id, now));
        }
        if state.badge_earned {
            push(Achievement::challenge_complete(participant.id, now));
        }

        earned
    }
}

impl Default for AchievementDetector {
    fn default() -> Self {
        Self::new(crate::config::EngineConfig::default().streak_milestones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nourish_core::{AchievementType, ChallengeId, PatientRef};

    fn participant() -> Participant {
        Participant::new(ChallengeId::new(), PatientRef::new("p"))
    }

    fn types(achievements: &[Achievement]) -> Vec<AchievementType> {
        achievements.iter().map(|a| a.achievement_type).collect()
    }

    #[test]
    fn test_streak_milestones_fire_once() {
        let detector = AchievementDetector::default();
        let participant = participant();
        let now = chrono::Utc::now();
        let state = PostAdvanceState {
            streak: Streak { current: 7, best: 7 },
            ..Default::default()
        };

        let first = detector.detect(&participant, &state, &[], now);
        assert_eq!(types(&first), vec![AchievementType::Streak7]);

        // Reset and reclimb: the persisted row suppresses a second unlock.
        let again = detector.detect(&participant, &state, &first, now);
        assert!(again.is_empty());
    }

    #[test]
    fn test_streak_can_cross_several_milestones() {
        let detector = AchievementDetector::default();
        let state = PostAdvanceState {
            streak: Streak { current: 15, best: 15 },
            ..Default::default()
        };
        let earned = detector.detect(&participant(), &state, &[], chrono::Utc::now());
        assert_eq!(types(&earned), vec![AchievementType::Streak7, AchievementType::Streak14]);
    }

    #[test]
    fn test_completion_achievements_are_scoped() {
        let detector = AchievementDetector::default();
        let participant = participant();
        let now = chrono::Utc::now();
        let goal_a = GoalId::new();
        let goal_b = GoalId::new();
        let phase = PhaseId::new();

        let existing = vec![Achievement::goal_complete(participant.id, goal_a, now)];
        let state = PostAdvanceState {
            completed_goals: vec![goal_a, goal_b],
            completed_phases: vec![phase],
            badge_earned: true,
            ..Default::default()
        };

        let earned = detector.detect(&participant, &state, &existing, now);
        assert_eq!(
            types(&earned),
            vec![
                AchievementType::GoalComplete,
                AchievementType::PhaseComplete,
                AchievementType::ChallengeComplete
            ]
        );
        assert_eq!(earned[0].goal_id, Some(goal_b));
        assert_eq!(earned[1].phase_id, Some(phase));
    }

    #[test]
    fn test_replay_is_idempotent() {
        let detector = AchievementDetector::default();
        let participant = participant();
        let now = chrono::Utc::now();
        let state = PostAdvanceState {
            streak: Streak { current: 21, best: 21 },
            completed_goals: vec![GoalId::new()],
            completed_phases: vec![PhaseId::new()],
            badge_earned: true,
        };

        let mut persisted = detector.detect(&participant, &state, &[], now);
        assert_eq!(persisted.len(), 6);
        persisted.extend(detector.detect(&participant, &state, &persisted, now));
        assert_eq!(persisted.len(), 6);
    }

    #[test]
    fn test_non_streak_milestone_is_ignored() {
        let detector = AchievementDetector::new(vec![StreakMilestone::new(1, AchievementType::GoalComplete)]);
        let state = PostAdvanceState {
            streak: Streak { current: 3, best: 3 },
            ..Default::default()
        };
        assert!(detector.detect(&participant(), &state, &[], chrono::Utc::now()).is_empty());
    }
}
