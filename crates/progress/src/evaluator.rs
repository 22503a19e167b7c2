//! Goal completion predicate.

use std::collections::BTreeSet;
use nourish_core::{Checkin, Goal};

/// Pure goal completion rules.
pub struct GoalEvaluator;

impl GoalEvaluator {
    /// Number of distinct completed days recorded against `goal`.
    pub fn completed_days(goal: &Goal, checkins: &[Checkin]) -> usize {
        checkins
            .iter()
            .filter(|c| c.goal_id == goal.id && c.completed)
            .map(|c| c.checkin_date)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Whether `goal` has reached its target count.
    ///
    /// Days need not be consecutive, and once reached the result never flips
    /// back since history is append-only.
    pub fn is_goal_complete(goal: &Goal, checkins: &[Checkin]) -> bool {
        Self::completed_days(goal, checkins) >= goal.duration_days as usize
    }

    /// Days still needed.
    pub fn remaining_days(goal: &Goal, checkins: &[Checkin]) -> usize {
        (goal.duration_days as usize).saturating_sub(Self::completed_days(goal, checkins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use nourish_core::{ChallengeId, CheckinPayload, GoalType, ParticipantId};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn spaced_checkins(goal: &Goal, count: i64, spacing: i64) -> Vec<Checkin> {
        let participant = ParticipantId::new();
        (0..count)
            .map(|i| {
                Checkin::new(
                    participant,
                    goal.id,
                    start() + Duration::days(i * spacing),
                    CheckinPayload::done(),
                )
            })
            .collect()
    }

    #[test]
    fn test_completion_counts_days_regardless_of_spacing() {
        let goal = Goal::direct(ChallengeId::new(), "Veggies", GoalType::Checkin, 21, 0);

        assert!(!GoalEvaluator::is_goal_complete(&goal, &spaced_checkins(&goal, 20, 1)));
        assert!(GoalEvaluator::is_goal_complete(&goal, &spaced_checkins(&goal, 21, 1)));
        assert!(GoalEvaluator::is_goal_complete(&goal, &spaced_checkins(&goal, 21, 3)));
        assert_eq!(GoalEvaluator::remaining_days(&goal, &spaced_checkins(&goal, 20, 2)), 1);
    }

    #[test]
    fn test_missed_days_and_other_goals_do_not_count() {
        let goal = Goal::direct(ChallengeId::new(), "Walk", GoalType::Checkin, 2, 0);
        let other = Goal::direct(goal.challenge_id, "Sleep", GoalType::Checkin, 2, 1);
        let participant = ParticipantId::new();
        let checkins = vec![
            Checkin::new(participant, goal.id, start(), CheckinPayload::done()),
            Checkin::new(participant, goal.id, start() + Duration::days(1), CheckinPayload::missed()),
            Checkin::new(participant, other.id, start() + Duration::days(2), CheckinPayload::done()),
        ];
        assert_eq!(GoalEvaluator::completed_days(&goal, &checkins), 1);
        assert!(!GoalEvaluator::is_goal_complete(&goal, &checkins));
    }
}
