//! Consecutive-day streak derivation.

use chrono::NaiveDate;
use nourish_core::{Checkin, GoalId, Participant};
use serde::{Deserialize, Serialize};

/// Current and best consecutive-day counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    /// Run ending today (or yesterday, if today has no check-in yet); zero
    /// once today is recorded as missed
    pub current: u32,
    /// Longest run observed
    pub best: u32,
}

/// Derives streaks from check-in history.
pub struct StreakCalculator;

impl StreakCalculator {
    /// Compute the streak over `dates` as of `as_of`.
    ///
    /// `dates` are completed-day dates for the active goal, in any order.
    /// Dates after `as_of` are ignored. `best` covers this history only; use
    /// [`StreakCalculator::for_participant`] for the participant-level maximum.
    pub fn compute(dates: &[NaiveDate], as_of: NaiveDate) -> Streak {
        let mut days: Vec<NaiveDate> = dates.iter().copied().filter(|d| *d <= as_of).collect();
        days.sort_unstable();
        days.dedup();

        let mut best = 0u32;
        let mut run = 0u32;
        let mut prev: Option<NaiveDate> = None;
        for day in &days {
            run = match prev {
                Some(p) if p.succ_opt() == Some(*day) => run + 1,
                _ => 1,
            };
            best = best.max(run);
            prev = Some(*day);
        }

        // `run` now ends at the last day; it is current only if that day is today or yesterday.
        let current = match days.last() {
            Some(last) if *last == as_of || last.succ_opt() == Some(as_of) => run,
            _ => 0,
        };

        Streak { current, best }
    }

    /// Compute the streak with `best` folded into the participant's running maximum.
    pub fn for_participant(participant: &Participant, dates: &[NaiveDate], as_of: NaiveDate) -> Streak {
        let streak = Self::compute(dates, as_of);
        Streak {
            current: streak.current,
            best: participant.best_streak.max(streak.best),
        }
    }

    /// Streak on `goal_id` as of `as_of`, with `best` folded in as in
    /// [`StreakCalculator::for_participant`].
    ///
    /// A not-completed check-in dated `as_of` breaks the run: `current` is 0.
    pub fn for_goal(
        participant: &Participant,
        goal_id: GoalId,
        checkins: &[Checkin],
        as_of: NaiveDate,
    ) -> Streak {
        let dates = Self::completed_dates(goal_id, checkins);
        let mut streak = Self::for_participant(participant, &dates, as_of);
        let missed_today = checkins
            .iter()
            .any(|c| c.goal_id == goal_id && c.checkin_date == as_of && !c.completed);
        if missed_today {
            streak.current = 0;
        }
        streak
    }

    /// Completed-day dates of `goal_id` among `checkins`.
    pub fn completed_dates(goal_id: GoalId, checkins: &[Checkin]) -> Vec<NaiveDate> {
        checkins
            .iter()
            .filter(|c| c.goal_id == goal_id && c.completed)
            .map(|c| c.checkin_date)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nourish_core::{ChallengeId, CheckinPayload, ParticipantId, PatientRef};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    #[test]
    fn test_gap_resets_current_but_not_best() {
        let dates = [day(1), day(2), day(3), day(5)];
        let streak = StreakCalculator::compute(&dates, day(5));
        assert_eq!(streak, Streak { current: 1, best: 3 });
    }

    #[test]
    fn test_run_ending_yesterday_is_still_current() {
        let dates = [day(1), day(2), day(3)];
        assert_eq!(StreakCalculator::compute(&dates, day(4)).current, 3);
        assert_eq!(StreakCalculator::compute(&dates, day(5)).current, 0);
    }

    #[test]
    fn test_unordered_and_future_dates() {
        let dates = [day(3), day(1), day(2), day(9)];
        let streak = StreakCalculator::compute(&dates, day(3));
        assert_eq!(streak, Streak { current: 3, best: 3 });
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(StreakCalculator::compute(&[], day(1)), Streak::default());
    }

    #[test]
    fn test_month_boundary_is_consecutive() {
        let dates = [
            NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        ];
        let streak = StreakCalculator::compute(&dates, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(streak.current, 3);
    }

    #[test]
    fn test_participant_best_is_running_maximum() {
        let mut participant = Participant::new(ChallengeId::new(), PatientRef::new("p"));
        participant.best_streak = 10;
        let streak = StreakCalculator::for_participant(&participant, &[day(1), day(2)], day(2));
        assert_eq!(streak, Streak { current: 2, best: 10 });
    }

    #[test]
    fn test_missed_today_breaks_current_run() {
        let participant = Participant::new(ChallengeId::new(), PatientRef::new("p"));
        let goal = GoalId::new();
        let checkins = vec![
            Checkin::new(participant.id, goal, day(1), CheckinPayload::done()),
            Checkin::new(participant.id, goal, day(2), CheckinPayload::done()),
            Checkin::new(participant.id, goal, day(3), CheckinPayload::missed()),
        ];

        let streak = StreakCalculator::for_goal(&participant, goal, &checkins, day(3));
        assert_eq!(streak, Streak { current: 0, best: 2 });

        // Without today's row the run ending yesterday still counts.
        let streak = StreakCalculator::for_goal(&participant, goal, &checkins[..2], day(3));
        assert_eq!(streak, Streak { current: 2, best: 2 });
    }

    #[test]
    fn test_completed_dates_skip_missed_days_and_other_goals() {
        let participant_id = ParticipantId::new();
        let goal = GoalId::new();
        let other = GoalId::new();
        let checkins = vec![
            Checkin::new(participant_id, goal, day(1), CheckinPayload::done()),
            Checkin::new(participant_id, goal, day(2), CheckinPayload::missed()),
            Checkin::new(participant_id, other, day(3), CheckinPayload::done()),
        ];
        assert_eq!(StreakCalculator::completed_dates(goal, &checkins), vec![day(1)]);
    }
}
