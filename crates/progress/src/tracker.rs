//! Progress tracking service.

use std::collections::BTreeMap;
use async_trait::async_trait;
use chrono::NaiveDate;
use nourish_core::{
    Achievement, ChallengeId, ChallengePlan, Checkin, CheckinPayload, GoalId, GoalStatus,
    GoalType, Participant, ParticipantId, PhaseId, PhaseProgress, Time,
};
use serde::Serialize;

use crate::advancer::PhaseAdvancer;
use crate::error::Result;
use crate::evaluator::GoalEvaluator;
use crate::orchestrator::CheckinOutcome;
use crate::streak::{Streak, StreakCalculator};

/// Progress tracking service.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    /// Record a check-in for today and derive everything it unlocks.
    async fn submit_checkin(
        &self,
        participant_id: ParticipantId,
        goal_id: GoalId,
        payload: CheckinPayload,
    ) -> Result<CheckinOutcome>;

    /// Take a progress snapshot. Never writes.
    async fn get_progress_snapshot(&self, participant_id: ParticipantId) -> Result<ProgressSnapshot>;
}

/// One phase as seen by a participant.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseSnapshot {
    /// Phase ID
    pub phase_id: PhaseId,
    /// Phase name
    pub name: String,
    /// Required percentage of completed goals
    pub completion_threshold: u8,
    /// Evaluated status and counts
    pub progress: PhaseProgress,
}

/// One goal as seen by a participant.
#[derive(Debug, Clone, Serialize)]
pub struct GoalSnapshot {
    /// Goal ID
    pub goal_id: GoalId,
    /// Owning phase, none for direct goals
    pub phase_id: Option<PhaseId>,
    /// Goal title
    pub title: String,
    /// Goal type
    pub goal_type: GoalType,
    /// Display status
    pub status: GoalStatus,
    /// Distinct completed days so far
    pub completed_days: usize,
    /// Days required
    pub duration_days: u32,
}

/// A snapshot of progress at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    /// When snapshot was taken
    pub timestamp: Time,

    /// Participant
    pub participant_id: ParticipantId,

    /// Enrolled challenge
    pub challenge_id: ChallengeId,

    /// Current phase (seeded view when the stored pointer is null)
    pub current_phase_id: Option<PhaseId>,

    /// Current goal (seeded view when the stored pointer is null)
    pub current_goal_id: Option<GoalId>,

    /// Phases in plan order
    pub phases: Vec<PhaseSnapshot>,

    /// Goals in plan order
    pub goals: Vec<GoalSnapshot>,

    /// Streak on the current goal as of today
    pub streak: Streak,

    /// Whether the challenge badge is earned
    pub badge_earned: bool,

    /// When the challenge was completed
    pub completed_at: Option<Time>,

    /// Earned achievements, oldest first
    pub achievements: Vec<Achievement>,
}

impl ProgressSnapshot {
    /// Build a snapshot from loaded rows.
    ///
    /// `participant` is copied and seeded locally; nothing is persisted.
    pub fn build(
        plan: &ChallengePlan,
        participant: &Participant,
        checkins: &[Checkin],
        mut achievements: Vec<Achievement>,
        today: NaiveDate,
        timestamp: Time,
    ) -> Result<Self> {
        let mut view = participant.clone();
        // A plan without goals leaves the pointers null.
        if let Err(e) = PhaseAdvancer::seed(plan, &mut view) {
            if plan.first_goal().is_some() {
                return Err(e);
            }
        }

        let current_position = view.current_goal_id.and_then(|id| plan.position_of(id));

        let phases = plan
            .phases()
            .iter()
            .map(|phase| {
                let goals = plan.goals_in_phase(phase.id);
                PhaseSnapshot {
                    phase_id: phase.id,
                    name: phase.name.clone(),
                    completion_threshold: phase.completion_threshold,
                    progress: PhaseAdvancer::evaluate_phase(phase, &goals, checkins, view.current_phase_id),
                }
            })
            .collect();

        let goals = plan
            .goals()
            .iter()
            .map(|goal| {
                let status = if GoalEvaluator::is_goal_complete(goal, checkins) {
                    GoalStatus::Completed
                } else if view.current_goal_id == Some(goal.id) && !view.badge_earned {
                    GoalStatus::Active
                } else {
                    match (plan.position_of(goal.id), current_position) {
                        (Some(pos), Some(current)) if pos < current => GoalStatus::Closed,
                        _ if view.badge_earned => GoalStatus::Closed,
                        _ => GoalStatus::Locked,
                    }
                };
                GoalSnapshot {
                    goal_id: goal.id,
                    phase_id: goal.phase_id,
                    title: goal.title.clone(),
                    goal_type: goal.goal_type,
                    status,
                    completed_days: GoalEvaluator::completed_days(goal, checkins),
                    duration_days: goal.duration_days,
                }
            })
            .collect();

        let streak = match view.current_goal_id {
            Some(goal_id) if !view.badge_earned => StreakCalculator::for_goal(&view, goal_id, checkins, today),
            _ => Streak {
                current: view.streak_count,
                best: view.best_streak,
            },
        };

        achievements.sort_by_key(|a| a.earned_at);

        Ok(Self {
            timestamp,
            participant_id: view.id,
            challenge_id: view.challenge_id,
            current_phase_id: view.current_phase_id,
            current_goal_id: view.current_goal_id,
            phases,
            goals,
            streak,
            badge_earned: view.badge_earned,
            completed_at: view.completed_at,
            achievements,
        })
    }

    /// Completed-day count per goal.
    pub fn completion_counts(&self) -> BTreeMap<GoalId, usize> {
        self.goals.iter().map(|g| (g.goal_id, g.completed_days)).collect()
    }

    /// Snapshot of a single goal.
    pub fn goal(&self, goal_id: GoalId) -> Option<&GoalSnapshot> {
        self.goals.iter().find(|g| g.goal_id == goal_id)
    }

    /// Snapshot of a single phase.
    pub fn phase(&self, phase_id: PhaseId) -> Option<&PhaseSnapshot> {
        self.phases.iter().find(|p| p.phase_id == phase_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use nourish_core::{Challenge, Goal, PatientRef, Phase, PhaseStatus};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn plan() -> (ChallengePlan, Vec<GoalId>, Vec<PhaseId>) {
        let challenge = Challenge::new("Hydration", date(1), date(30));
        let p1 = Phase::new(challenge.id, "Start", 0, 100);
        let p2 = Phase::new(challenge.id, "Build", 1, 100);
        let a = Goal::in_phase(challenge.id, p1.id, "A", GoalType::Checkin, 2, 0);
        let b = Goal::in_phase(challenge.id, p2.id, "B", GoalType::Checkin, 2, 0);
        let c = Goal::direct(challenge.id, "C", GoalType::Checkin, 1, 0);
        let goals = vec![a.id, b.id, c.id];
        let phases = vec![p1.id, p2.id];
        (ChallengePlan::new(challenge, vec![p1, p2], vec![a, b, c]), goals, phases)
    }

    #[test]
    fn test_unseeded_participant_sees_first_goal() {
        let (plan, goals, phases) = plan();
        let participant = Participant::new(plan.challenge.id, PatientRef::new("p"));

        let snapshot = ProgressSnapshot::build(&plan, &participant, &[], vec![], date(2), Utc::now()).unwrap();

        assert!(!participant.is_seeded());
        assert_eq!(snapshot.current_goal_id, Some(goals[0]));
        assert_eq!(snapshot.current_phase_id, Some(phases[0]));
        assert_eq!(snapshot.goal(goals[0]).unwrap().status, GoalStatus::Active);
        assert_eq!(snapshot.goal(goals[1]).unwrap().status, GoalStatus::Locked);
        assert_eq!(snapshot.phase(phases[0]).unwrap().progress.status, PhaseStatus::Active);
    }

    #[test]
    fn test_goal_statuses_follow_the_pointer() {
        let (plan, goals, phases) = plan();
        let mut participant = Participant::new(plan.challenge.id, PatientRef::new("p"));
        participant.current_phase_id = Some(phases[1]);
        participant.current_goal_id = Some(goals[1]);
        let checkins = vec![
            Checkin::new(participant.id, goals[0], date(1), CheckinPayload::done()),
            Checkin::new(participant.id, goals[0], date(2), CheckinPayload::done()),
            Checkin::new(participant.id, goals[1], date(3), CheckinPayload::done()),
        ];

        let snapshot = ProgressSnapshot::build(&plan, &participant, &checkins, vec![], date(3), Utc::now()).unwrap();

        assert_eq!(snapshot.goal(goals[0]).unwrap().status, GoalStatus::Completed);
        assert_eq!(snapshot.goal(goals[1]).unwrap().status, GoalStatus::Active);
        assert_eq!(snapshot.goal(goals[2]).unwrap().status, GoalStatus::Locked);
        assert_eq!(snapshot.phase(phases[0]).unwrap().progress.status, PhaseStatus::Completed);
        assert_eq!(snapshot.completion_counts()[&goals[1]], 1);
        assert_eq!(snapshot.streak.current, 1);
    }

    #[test]
    fn test_skipped_goal_is_closed() {
        let (plan, goals, _) = plan();
        let mut participant = Participant::new(plan.challenge.id, PatientRef::new("p"));
        participant.current_goal_id = Some(goals[2]);

        let snapshot = ProgressSnapshot::build(&plan, &participant, &[], vec![], date(3), Utc::now()).unwrap();

        assert_eq!(snapshot.goal(goals[0]).unwrap().status, GoalStatus::Closed);
        assert_eq!(snapshot.goal(goals[1]).unwrap().status, GoalStatus::Closed);
        assert_eq!(snapshot.goal(goals[2]).unwrap().status, GoalStatus::Active);
    }

    #[test]
    fn test_achievements_are_sorted_oldest_first() {
        let (plan, goals, _) = plan();
        let participant = Participant::new(plan.challenge.id, PatientRef::new("p"));
        let now = Utc::now();
        let achievements = vec![
            Achievement::challenge_complete(participant.id, now),
            Achievement::goal_complete(participant.id, goals[0], now - Duration::days(2)),
        ];

        let snapshot = ProgressSnapshot::build(&plan, &participant, &[], achievements, date(3), now).unwrap();

        assert_eq!(snapshot.achievements[0].goal_id, Some(goals[0]));
        assert_eq!(snapshot.achievements.len(), 2);
    }

    #[test]
    fn test_missed_today_zeroes_snapshot_streak() {
        let (plan, goals, _) = plan();
        let mut participant = Participant::new(plan.challenge.id, PatientRef::new("p"));
        participant.current_goal_id = Some(goals[0]);
        participant.best_streak = 1;
        let checkins = vec![
            Checkin::new(participant.id, goals[0], date(1), CheckinPayload::done()),
            Checkin::new(participant.id, goals[0], date(2), CheckinPayload::missed()),
        ];

        let snapshot = ProgressSnapshot::build(&plan, &participant, &checkins, vec![], date(2), Utc::now()).unwrap();

        assert_eq!(snapshot.streak, Streak { current: 0, best: 1 });
    }

    #[test]
    fn test_plan_without_goals_leaves_pointers_empty() {
        let challenge = Challenge::new("Empty", date(1), date(30));
        let plan = ChallengePlan::new(challenge, vec![], vec![]);
        let participant = Participant::new(plan.challenge.id, PatientRef::new("p"));

        let snapshot = ProgressSnapshot::build(&plan, &participant, &[], vec![], date(2), Utc::now()).unwrap();

        assert_eq!(snapshot.current_goal_id, None);
        assert!(snapshot.goals.is_empty());
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let (plan, goals, _) = plan();
        let participant = Participant::new(plan.challenge.id, PatientRef::new("p"));
        let snapshot = ProgressSnapshot::build(&plan, &participant, &[], vec![], date(2), Utc::now()).unwrap();

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["current_goal_id"], serde_json::to_value(goals[0]).unwrap());
        assert_eq!(value["goals"].as_array().unwrap().len(), 3);
        assert_eq!(value["goals"][0]["status"], serde_json::to_value(GoalStatus::Active).unwrap());
        assert_eq!(value["streak"]["current"], 0);
        assert_eq!(value["badge_earned"], false);
    }
}
