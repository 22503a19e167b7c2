//! The progression engine - turns a check-in into derived state.
//!
//! Each submission runs as one transaction per participant:
//! ```text
//! Record → Streak → Goal → Advance → Detect → Commit
//! ```
//! Nothing is written until the final commit, and the commit is applied by
//! storage as a unit, so a failure at any step leaves state unchanged.

use std::sync::Arc;
use async_trait::async_trait;
use nourish_core::{
    Achievement, AchievementType, ChallengeId, ChallengeStatus, Checkin, CheckinPayload, GoalId,
    Participant, ParticipantId, PatientRef, Time,
};
use nourish_storage::{ProgressionCommit, Storage};
use tracing::{debug, info, warn};

use crate::advancer::PhaseAdvancer;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::detector::{AchievementDetector, PostAdvanceState};
use crate::error::{ProgressError, Result};
use crate::evaluator::GoalEvaluator;
use crate::locks::ParticipantLocks;
use crate::recorder::{CheckinRecorder, PreparedCheckin};
use crate::streak::{Streak, StreakCalculator};
use crate::tracker::{ProgressSnapshot, ProgressTracker};

/// What one accepted check-in changed.
#[derive(Debug, Clone)]
pub struct CheckinOutcome {
    /// The persisted check-in
    pub checkin: Checkin,
    /// Streak after the check-in
    pub streak: Streak,
    /// Achievements unlocked by this check-in
    pub new_achievements: Vec<AchievementType>,
    /// Whether the checked-in goal reached its target
    pub goal_completed: bool,
    /// Whether the goal's phase reached its threshold for the first time
    pub phase_completed: bool,
    /// Whether the challenge badge was earned
    pub challenge_completed: bool,
    /// Participant as committed
    pub participant: Participant,
}

/// Derived progression, ready to be committed.
#[derive(Debug, Clone)]
pub struct Progression {
    /// Write unit for storage
    pub commit: ProgressionCommit,
    /// Result reported to the caller once the commit lands
    pub outcome: CheckinOutcome,
}

/// The challenge progression engine.
pub struct ProgressionEngine<S: Storage> {
    storage: Arc<S>,
    recorder: CheckinRecorder<S>,
    clock: Arc<dyn Clock>,
    detector: AchievementDetector,
    config: EngineConfig,
    locks: ParticipantLocks,
    enroll_lock: tokio::sync::Mutex<()>,
}

impl<S: Storage> ProgressionEngine<S> {
    /// Create an engine on the wall clock with default configuration.
    pub fn new(storage: Arc<S>) -> Self {
        let config = EngineConfig::default();
        Self {
            recorder: CheckinRecorder::new(storage.clone()),
            storage,
            clock: Arc::new(SystemClock),
            detector: AchievementDetector::new(config.streak_milestones.clone()),
            config,
            locks: ParticipantLocks::new(),
            enroll_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Set the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.detector = AchievementDetector::new(config.streak_milestones.clone());
        self.config = config;
        self
    }

    /// Underlying storage.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Enroll a patient in a challenge with unseeded pointers.
    pub async fn enroll(&self, challenge_id: ChallengeId, patient: PatientRef) -> Result<Participant> {
        let _guard = self.enroll_lock.lock().await;

        let challenge = self
            .storage
            .load_challenge(challenge_id)
            .await?
            .ok_or_else(|| ProgressError::NotFound(format!("challenge {}", challenge_id)))?;
        if matches!(challenge.status, ChallengeStatus::Ended | ChallengeStatus::Archived) {
            return Err(ProgressError::InvalidState(format!(
                "challenge {} is no longer open for enrollment",
                challenge_id
            )));
        }
        if self.storage.find_participant(challenge_id, &patient).await?.is_some() {
            warn!("Patient {} is already enrolled in challenge {}", patient, challenge_id);
            return Err(ProgressError::InvalidState(format!(
                "patient {} is already enrolled in challenge {}",
                patient, challenge_id
            )));
        }

        let mut participant = Participant::new(challenge_id, patient);
        participant.joined_at = self.clock.now();
        self.storage.save_participant(&participant).await?;

        info!(
            "Enrolled patient {} in challenge {} as participant {}",
            participant.patient, challenge_id, participant.id
        );
        Ok(participant)
    }

    /// Record a check-in dated today in the challenge's reference timezone.
    ///
    /// Submissions for the same participant are serialized. A repeat of an
    /// already recorded (participant, goal, day) returns
    /// [`ProgressError::DuplicateCheckin`] and changes nothing.
    pub async fn submit_checkin(
        &self,
        participant_id: ParticipantId,
        goal_id: GoalId,
        payload: CheckinPayload,
    ) -> Result<CheckinOutcome> {
        let _guard = self.locks.acquire(participant_id).await;

        let participant = self
            .storage
            .load_participant(participant_id)
            .await?
            .ok_or_else(|| ProgressError::NotFound(format!("participant {}", participant_id)))?;
        let challenge = self
            .storage
            .load_challenge(participant.challenge_id)
            .await?
            .ok_or_else(|| ProgressError::NotFound(format!("challenge {}", participant.challenge_id)))?;
        let date = self.clock.today(challenge.reference_offset());

        let prepared = match self
            .recorder
            .prepare(participant, goal_id, date, payload, &self.config)
            .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                if let ProgressError::InvalidState(reason) = &e {
                    warn!("Rejected check-in for participant {}: {}", participant_id, reason);
                }
                return Err(e);
            }
        };

        let existing = self.storage.list_achievements(participant_id).await?;
        let progression = self.on_checkin(prepared, &existing, self.clock.now())?;

        if let Err(e) = self.storage.commit_progression(&progression.commit).await {
            let e = ProgressError::from(e);
            if e.is_duplicate() {
                warn!("Duplicate check-in for participant {} on {}", participant_id, date);
            }
            return Err(e);
        }

        let outcome = progression.outcome;
        info!(
            "Accepted check-in {} for participant {} on goal {} ({}), streak {}",
            outcome.checkin.id, participant_id, goal_id, date, outcome.streak.current
        );
        for achievement in &outcome.new_achievements {
            info!("Participant {} earned {}", participant_id, achievement);
        }
        Ok(outcome)
    }

    /// Derive everything a prepared check-in changes.
    ///
    /// Pure: `existing` are the participant's persisted achievements and
    /// nothing is written. The returned commit carries the row guard taken
    /// when the check-in was prepared.
    pub fn on_checkin(
        &self,
        prepared: PreparedCheckin,
        existing: &[Achievement],
        now: Time,
    ) -> Result<Progression> {
        let PreparedCheckin {
            checkin,
            goal,
            plan,
            mut participant,
            stored_goal_id,
            mut history,
        } = prepared;
        let expected_badge = participant.badge_earned;
        history.push(checkin.clone());

        // 1. Streak on the active goal
        let streak = StreakCalculator::for_goal(&participant, goal.id, &history, checkin.checkin_date);
        participant.record_streak(streak.current, streak.best);
        debug!(
            "Participant {} streak on goal {}: current {}, best {}",
            participant.id, goal.id, streak.current, streak.best
        );

        // 2. Goal completion
        let goal_completed = GoalEvaluator::is_goal_complete(&goal, &history);

        // 3. Pointers
        let mut challenge_completed = false;
        if goal_completed {
            let advancement = PhaseAdvancer::advance(&plan, &mut participant, now)?;
            challenge_completed = advancement.challenge_completed;
        }

        let completed_phases = goal
            .phase_id
            .and_then(|phase_id| plan.phase(phase_id))
            .filter(|phase| PhaseAdvancer::is_phase_complete(&plan, phase, &history))
            .map(|phase| vec![phase.id])
            .unwrap_or_default();
        debug!(
            "Participant {} goal {} complete: {}, phases complete: {:?}",
            participant.id, goal.id, goal_completed, completed_phases
        );

        // 4. Achievements
        let state = PostAdvanceState {
            streak,
            completed_goals: if goal_completed { vec![goal.id] } else { Vec::new() },
            completed_phases,
            badge_earned: participant.badge_earned,
        };
        let achievements = self.detector.detect(&participant, &state, existing, now);
        let new_achievements: Vec<AchievementType> =
            achievements.iter().map(|a| a.achievement_type).collect();
        let phase_completed = new_achievements.contains(&AchievementType::PhaseComplete);

        Ok(Progression {
            commit: ProgressionCommit {
                checkin: checkin.clone(),
                participant: participant.clone(),
                achievements,
                expected_goal_id: stored_goal_id,
                expected_badge,
            },
            outcome: CheckinOutcome {
                checkin,
                streak,
                new_achievements,
                goal_completed,
                phase_completed,
                challenge_completed,
                participant,
            },
        })
    }

    /// Read a participant's progress. Never writes.
    pub async fn get_progress_snapshot(&self, participant_id: ParticipantId) -> Result<ProgressSnapshot> {
        let participant = self
            .storage
            .load_participant(participant_id)
            .await?
            .ok_or_else(|| ProgressError::NotFound(format!("participant {}", participant_id)))?;
        let plan = self
            .storage
            .load_plan(participant.challenge_id)
            .await?
            .ok_or_else(|| ProgressError::NotFound(format!("challenge {}", participant.challenge_id)))?;
        let checkins = self.storage.list_participant_checkins(participant_id).await?;
        let achievements = self.storage.list_achievements(participant_id).await?;
        let today = self.clock.today(plan.challenge.reference_offset());

        ProgressSnapshot::build(
            &plan,
            &participant,
            &checkins,
            achievements,
            today,
            self.clock.now(),
        )
    }
}

#[async_trait]
impl<S: Storage> ProgressTracker for ProgressionEngine<S> {
    async fn submit_checkin(
        &self,
        participant_id: ParticipantId,
        goal_id: GoalId,
        payload: CheckinPayload,
    ) -> Result<CheckinOutcome> {
        ProgressionEngine::submit_checkin(self, participant_id, goal_id, payload).await
    }

    async fn get_progress_snapshot(&self, participant_id: ParticipantId) -> Result<ProgressSnapshot> {
        ProgressionEngine::get_progress_snapshot(self, participant_id).await
    }
}
