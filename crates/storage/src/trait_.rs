//! Storage trait abstraction.
//!
//! One repository trait per entity, plus [`Storage::commit_progression`], the
//! single write the progression engine performs per check-in.

use async_trait::async_trait;
use nourish_core::{
    Achievement, AchievementKey, Challenge, ChallengeId, ChallengePlan, Checkin, CheckinKey,
    Goal, GoalId, Participant, ParticipantId, PatientRef, Phase, PhaseId,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A check-in already exists for this (participant, goal, date)
    #[error("Duplicate check-in: {0}")]
    DuplicateCheckin(CheckinKey),

    /// An achievement already exists for this key
    #[error("Duplicate achievement: {0}")]
    DuplicateAchievement(AchievementKey),

    /// The stored participant moved on since it was read
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Everything one check-in changes, written as a unit.
#[derive(Debug, Clone)]
pub struct ProgressionCommit {
    /// The new check-in row
    pub checkin: Checkin,

    /// Participant after streak, pointer and badge updates
    pub participant: Participant,

    /// Newly earned achievements
    pub achievements: Vec<Achievement>,

    /// Row guard: the participant's goal pointer as it was read
    pub expected_goal_id: Option<GoalId>,

    /// Row guard: the participant's badge flag as it was read
    pub expected_badge: bool,
}

impl ProgressionCommit {
    /// Whether `stored` still matches what the commit was derived from.
    pub fn guard_holds(&self, stored: &Participant) -> bool {
        stored.current_goal_id == self.expected_goal_id && stored.badge_earned == self.expected_badge
    }
}

/// Challenge rows.
#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    /// Save a challenge (create or update).
    async fn save_challenge(&self, challenge: &Challenge) -> Result<()>;

    /// Load a challenge by ID.
    async fn load_challenge(&self, id: ChallengeId) -> Result<Option<Challenge>>;

    /// List all challenges.
    async fn list_challenges(&self) -> Result<Vec<Challenge>>;
}

/// Phase rows.
#[async_trait]
pub trait PhaseRepository: Send + Sync {
    /// Save a phase (create or update).
    async fn save_phase(&self, phase: &Phase) -> Result<()>;

    /// Load a phase by ID.
    async fn load_phase(&self, id: PhaseId) -> Result<Option<Phase>>;

    /// List a challenge's phases ordered by `order_index`.
    async fn list_phases(&self, challenge_id: ChallengeId) -> Result<Vec<Phase>>;
}

/// Goal rows.
#[async_trait]
pub trait GoalRepository: Send + Sync {
    /// Save a goal (create or update).
    async fn save_goal(&self, goal: &Goal) -> Result<()>;

    /// Load a goal by ID.
    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>>;

    /// List a challenge's goals, phased and direct.
    async fn list_goals(&self, challenge_id: ChallengeId) -> Result<Vec<Goal>>;
}

/// Participant rows.
#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// Save a participant (enrollment or administrative update).
    async fn save_participant(&self, participant: &Participant) -> Result<()>;

    /// Load a participant by ID.
    async fn load_participant(&self, id: ParticipantId) -> Result<Option<Participant>>;

    /// Find a patient's enrollment in a challenge.
    async fn find_participant(
        &self,
        challenge_id: ChallengeId,
        patient: &PatientRef,
    ) -> Result<Option<Participant>>;

    /// List a challenge's participants.
    async fn list_participants(&self, challenge_id: ChallengeId) -> Result<Vec<Participant>>;
}

/// Check-in rows (append-only).
#[async_trait]
pub trait CheckinRepository: Send + Sync {
    /// Load the check-in for a uniqueness key.
    async fn load_checkin(&self, key: &CheckinKey) -> Result<Option<Checkin>>;

    /// List a participant's check-ins for one goal, oldest date first.
    async fn list_checkins(&self, participant_id: ParticipantId, goal_id: GoalId) -> Result<Vec<Checkin>>;

    /// List all of a participant's check-ins, oldest date first.
    async fn list_participant_checkins(&self, participant_id: ParticipantId) -> Result<Vec<Checkin>>;
}

/// Achievement rows (append-only).
#[async_trait]
pub trait AchievementRepository: Send + Sync {
    /// List a participant's achievements, earliest first.
    async fn list_achievements(&self, participant_id: ParticipantId) -> Result<Vec<Achievement>>;
}

/// Storage abstraction for Nourish data.
///
/// This trait allows different storage backends to be plugged in.
#[async_trait]
pub trait Storage:
    ChallengeRepository
    + PhaseRepository
    + GoalRepository
    + ParticipantRepository
    + CheckinRepository
    + AchievementRepository
{
    /// Apply a progression commit atomically.
    ///
    /// Fails with [`StorageError::DuplicateCheckin`] if the check-in key exists,
    /// [`StorageError::DuplicateAchievement`] if any achievement key exists, and
    /// [`StorageError::Conflict`] if the stored participant no longer matches the
    /// commit's guard. On any error nothing is written.
    async fn commit_progression(&self, commit: &ProgressionCommit) -> Result<()>;

    /// Load a challenge with its phases and goals.
    async fn load_plan(&self, challenge_id: ChallengeId) -> Result<Option<ChallengePlan>> {
        let Some(challenge) = self.load_challenge(challenge_id).await? else {
            return Ok(None);
        };
        let phases = self.list_phases(challenge_id).await?;
        let goals = self.list_goals(challenge_id).await?;
        Ok(Some(ChallengePlan::new(challenge, phases, goals)))
    }
}
