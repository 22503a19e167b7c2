//! Check-in validation and recording.
//!
//! The recorder turns a submission into a validated [`Checkin`] row plus the
//! context the orchestrator needs. It never advances pointers and never
//! writes; the row is persisted with the rest of the progression commit.

use std::sync::Arc;
use chrono::NaiveDate;
use nourish_core::{
    ChallengePlan, ChallengeStatus, Checkin, CheckinKey, CheckinPayload, Goal, GoalId, GoalType,
    Participant,
};
use nourish_storage::Storage;
use tracing::warn;

use crate::advancer::PhaseAdvancer;
use crate::config::EngineConfig;
use crate::error::{ProgressError, Result};

/// A validated check-in and the state it was validated against.
#[derive(Debug, Clone)]
pub struct PreparedCheckin {
    /// The row to insert
    pub checkin: Checkin,
    /// The goal checked in against
    pub goal: Goal,
    /// Challenge structure
    pub plan: ChallengePlan,
    /// Participant with pointers seeded
    pub participant: Participant,
    /// Participant's goal pointer as stored, before seeding
    pub stored_goal_id: Option<GoalId>,
    /// All of the participant's prior check-ins
    pub history: Vec<Checkin>,
}

/// Validates submissions against storage.
pub struct CheckinRecorder<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> CheckinRecorder<S> {
    /// Create a recorder.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Validate a submission for `date` by the participant as `stored`.
    pub async fn prepare(
        &self,
        stored: Participant,
        goal_id: GoalId,
        date: NaiveDate,
        payload: CheckinPayload,
        config: &EngineConfig,
    ) -> Result<PreparedCheckin> {
        let participant_id = stored.id;

        // Duplicates are answered before any state check so a retried
        // submission gets the same answer after the pointers have moved on.
        let key = CheckinKey {
            participant_id,
            goal_id,
            checkin_date: date,
        };
        if self.storage.load_checkin(&key).await?.is_some() {
            warn!("Duplicate check-in {}", key);
            return Err(ProgressError::DuplicateCheckin {
                participant_id,
                goal_id,
                date,
            });
        }

        if stored.badge_earned {
            return Err(ProgressError::InvalidState(format!(
                "participant {} has already completed the challenge",
                participant_id
            )));
        }

        let plan = self
            .storage
            .load_plan(stored.challenge_id)
            .await?
            .ok_or_else(|| ProgressError::NotFound(format!("challenge {}", stored.challenge_id)))?;
        check_challenge(&plan, date, config)?;

        let goal = self
            .storage
            .load_goal(goal_id)
            .await?
            .ok_or_else(|| ProgressError::NotFound(format!("goal {}", goal_id)))?;
        if goal.challenge_id != stored.challenge_id {
            return Err(ProgressError::InvalidState(format!(
                "goal {} does not belong to challenge {}",
                goal_id, stored.challenge_id
            )));
        }

        let stored_goal_id = stored.current_goal_id;
        let mut participant = stored;
        PhaseAdvancer::seed(&plan, &mut participant)?;
        if participant.current_goal_id != Some(goal_id) {
            warn!(
                "Check-in for goal {} but participant {} is on {:?}",
                goal_id, participant_id, participant.current_goal_id
            );
            return Err(ProgressError::InvalidState(format!(
                "goal {} is not the participant's current goal",
                goal_id
            )));
        }

        let payload = validate_payload(&goal, payload)?;
        let history = self.storage.list_participant_checkins(participant_id).await?;

        Ok(PreparedCheckin {
            checkin: Checkin::new(participant_id, goal_id, date, payload),
            goal,
            plan,
            participant,
            stored_goal_id,
            history,
        })
    }
}

/// Reject challenges that are not open on `date`.
pub fn check_challenge(plan: &ChallengePlan, date: NaiveDate, config: &EngineConfig) -> Result<()> {
    let challenge = &plan.challenge;
    if challenge.status != ChallengeStatus::Active {
        return Err(ProgressError::InvalidState(format!(
            "challenge {} is not active",
            challenge.id
        )));
    }
    if config.enforce_challenge_window && !challenge.contains(date) {
        return Err(ProgressError::InvalidState(format!(
            "{} is outside challenge {} ({} to {})",
            date, challenge.id, challenge.start_date, challenge.end_date
        )));
    }
    Ok(())
}

/// Check the payload against the goal type and normalize it.
pub fn validate_payload(goal: &Goal, mut payload: CheckinPayload) -> Result<CheckinPayload> {
    payload.notes = payload
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    payload.evidence_ref = payload
        .evidence_ref
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());

    if let Some(value) = payload.metric_value {
        if !value.is_finite() {
            return Err(ProgressError::Validation(format!(
                "metric value must be a finite number, got {}",
                value
            )));
        }
    }

    match goal.goal_type {
        GoalType::Checkin => {}
        GoalType::Photo => {
            if payload.evidence_ref.is_none() {
                return Err(ProgressError::Validation(
                    "photo goals require an evidence reference".to_string(),
                ));
            }
        }
        GoalType::Metric => {
            if payload.metric_value.is_none() {
                return Err(ProgressError::Validation(
                    "metric goals require a numeric value".to_string(),
                ));
            }
        }
    }

    Ok(payload)
}
