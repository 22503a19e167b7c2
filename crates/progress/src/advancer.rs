//! Phase evaluation and pointer advancement.
//!
//! Pointers move strictly forward along [`ChallengePlan`] order: through each
//! phase's goals by `order_index`, phase by phase, then through the direct
//! goals. Goals left behind are never revisited.

use nourish_core::{
    ChallengePlan, Checkin, Goal, Participant, Phase, PhaseId, PhaseProgress, PhaseStatus,
    Position, Time,
};
use tracing::debug;

use crate::error::{ProgressError, Result};
use crate::evaluator::GoalEvaluator;

/// Result of moving a participant's pointers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advancement {
    /// Position before the move
    pub from: Position,
    /// Position after the move; none when the challenge is finished
    pub to: Option<Position>,
    /// Phase the participant left, if the move crossed a phase boundary
    pub left_phase: Option<PhaseId>,
    /// Whether this move finished the challenge
    pub challenge_completed: bool,
}

/// Phase status evaluation and pointer movement.
pub struct PhaseAdvancer;

impl PhaseAdvancer {
    /// Evaluate one phase for a participant.
    ///
    /// `checkins` may hold any of the participant's check-ins; each goal only
    /// counts its own. A phase that meets its threshold reports `Completed`
    /// even while it is still the current phase.
    pub fn evaluate_phase(
        phase: &Phase,
        goals_in_phase: &[&Goal],
        checkins: &[Checkin],
        current_phase_id: Option<PhaseId>,
    ) -> PhaseProgress {
        let total_goals = goals_in_phase.len();
        let completed_goals = goals_in_phase
            .iter()
            .filter(|goal| GoalEvaluator::is_goal_complete(goal, checkins))
            .count();

        let status = if phase.threshold_met(completed_goals, total_goals) {
            PhaseStatus::Completed
        } else if current_phase_id == Some(phase.id) {
            PhaseStatus::Active
        } else {
            PhaseStatus::Locked
        };

        PhaseProgress {
            status,
            completed_goals,
            total_goals,
        }
    }

    /// Whether `phase` meets its threshold given `checkins`.
    pub fn is_phase_complete(plan: &ChallengePlan, phase: &Phase, checkins: &[Checkin]) -> bool {
        let goals = plan.goals_in_phase(phase.id);
        Self::evaluate_phase(phase, &goals, checkins, None).status == PhaseStatus::Completed
    }

    /// Seed null pointers to the first goal of the plan.
    ///
    /// Returns whether anything changed.
    pub fn seed(plan: &ChallengePlan, participant: &mut Participant) -> Result<bool> {
        if participant.is_seeded() {
            return Ok(false);
        }
        let first = plan.first_goal().ok_or_else(|| {
            ProgressError::InvalidState(format!("challenge {} has no goals", plan.challenge.id))
        })?;

        participant.current_phase_id = first.phase_id;
        participant.current_goal_id = Some(first.id);
        debug!("Seeded participant {} at goal {}", participant.id, first.id);
        Ok(true)
    }

    /// Move past the current goal, which has just been completed.
    pub fn advance(plan: &ChallengePlan, participant: &mut Participant, now: Time) -> Result<Advancement> {
        let current_id = participant.current_goal_id.ok_or_else(|| {
            ProgressError::InvalidState(format!("participant {} has no current goal", participant.id))
        })?;
        let from = plan.position_of(current_id).ok_or_else(|| {
            ProgressError::InvalidState(format!(
                "goal {} is not part of challenge {}",
                current_id, plan.challenge.id
            ))
        })?;

        let Some(next) = plan.next_goal(current_id) else {
            let challenge_completed = !participant.badge_earned;
            participant.badge_earned = true;
            if participant.completed_at.is_none() {
                participant.completed_at = Some(now);
            }
            debug!("Participant {} finished challenge {}", participant.id, plan.challenge.id);
            return Ok(Advancement {
                from,
                to: None,
                left_phase: participant.current_phase_id,
                challenge_completed,
            });
        };

        let to = plan.position_of(next.id).ok_or_else(|| {
            ProgressError::InvalidState(format!("goal {} has no position", next.id))
        })?;
        if to <= from {
            return Err(ProgressError::InvalidState(format!(
                "refusing to move participant {} backwards from goal {} to {}",
                participant.id, current_id, next.id
            )));
        }

        let left_phase = participant
            .current_phase_id
            .filter(|phase_id| next.phase_id != Some(*phase_id));
        participant.current_phase_id = next.phase_id;
        participant.current_goal_id = Some(next.id);
        debug!(
            "Advanced participant {} from goal {} to goal {}",
            participant.id, current_id, next.id
        );

        Ok(Advancement {
            from,
            to: Some(to),
            left_phase,
            challenge_completed: false,
        })
    }
}
