//! SQLite storage backend for Nourish.
//!
//! Rows are stored as JSON in a `data` column next to the key columns the
//! engine filters and constrains on. The check-in and achievement uniqueness
//! invariants are `UNIQUE` constraints, and a progression commit runs in one
//! SQL transaction with a guarded participant update.

use async_trait::async_trait;
use nourish_core::{
    Achievement, AchievementScope, Challenge, ChallengeId, Checkin, CheckinKey, Goal, GoalId,
    Participant, ParticipantId, PatientRef, Phase, PhaseId,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;
use std::path::Path;
use tracing::{debug, warn};

use super::trait_::{
    AchievementRepository, ChallengeRepository, CheckinRepository, GoalRepository,
    ParticipantRepository, PhaseRepository, ProgressionCommit, Result, Storage, StorageError,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS challenges (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS phases (
        id TEXT PRIMARY KEY,
        challenge_id TEXT NOT NULL,
        order_index INTEGER NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS goals (
        id TEXT PRIMARY KEY,
        challenge_id TEXT NOT NULL,
        phase_id TEXT,
        order_index INTEGER NOT NULL,
        data TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS participants (
        id TEXT PRIMARY KEY,
        challenge_id TEXT NOT NULL,
        patient_ref TEXT NOT NULL,
        current_goal_id TEXT,
        badge_earned INTEGER NOT NULL DEFAULT 0,
        data TEXT NOT NULL,
        joined_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS checkins (
        id TEXT PRIMARY KEY,
        participant_id TEXT NOT NULL,
        goal_id TEXT NOT NULL,
        checkin_date TEXT NOT NULL,
        data TEXT NOT NULL,
        UNIQUE (participant_id, goal_id, checkin_date)
    )",
    "CREATE TABLE IF NOT EXISTS achievements (
        id TEXT PRIMARY KEY,
        participant_id TEXT NOT NULL,
        achievement_type TEXT NOT NULL,
        scope_key TEXT NOT NULL,
        data TEXT NOT NULL,
        earned_at TEXT NOT NULL,
        UNIQUE (participant_id, achievement_type, scope_key)
    )",
    "CREATE INDEX IF NOT EXISTS idx_phases_challenge ON phases(challenge_id)",
    "CREATE INDEX IF NOT EXISTS idx_goals_challenge ON goals(challenge_id)",
    "CREATE INDEX IF NOT EXISTS idx_participants_challenge ON participants(challenge_id)",
];

/// SQLite storage implementation.
#[derive(Clone)]
pub struct SqliteStorage {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance from a connection URL.
    pub async fn new(db_url: &str) -> Result<Self> {
        let pool = sqlx::SqlitePool::connect(db_url).await.map_err(db_error)?;

        let storage = Self { pool };
        storage.init_schema().await?;

        Ok(storage)
    }

    /// Create a new SQLite storage instance from a path, creating the file if needed.
    pub async fn new_from_path(path: &Path) -> Result<Self> {
        Self::new(&format!("sqlite://{}?mode=rwc", path.display())).await
    }

    /// Create an in-memory SQLite storage for testing.
    ///
    /// Limited to one connection: every pooled connection would otherwise see
    /// its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_error)?;

        let storage = Self { pool };
        storage.init_schema().await?;

        Ok(storage)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        }
        Ok(())
    }

    /// Helper to extract string from row.
    fn get_string(row: &sqlx::sqlite::SqliteRow, column: &str) -> String {
        row.try_get(column).unwrap_or_default()
    }

    fn decode<T: serde::de::DeserializeOwned>(row: &sqlx::sqlite::SqliteRow) -> Result<T> {
        Ok(serde_json::from_str(&Self::get_string(row, "data"))?)
    }

    async fn fetch_one_data<T: serde::de::DeserializeOwned>(
        &self,
        sql: &str,
        id: String,
    ) -> Result<Option<T>> {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn fetch_all_data<T: serde::de::DeserializeOwned>(
        &self,
        sql: &str,
        binds: &[String],
    ) -> Result<Vec<T>> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(value.clone());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;
        rows.iter().map(Self::decode).collect()
    }
}

fn db_error(e: sqlx::Error) -> StorageError {
    StorageError::Other(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn scope_key(scope: AchievementScope) -> String {
    match scope {
        AchievementScope::Participant => String::new(),
        AchievementScope::Goal(id) => format!("goal:{}", id),
        AchievementScope::Phase(id) => format!("phase:{}", id),
    }
}

#[async_trait]
impl ChallengeRepository for SqliteStorage {
    async fn save_challenge(&self, challenge: &Challenge) -> Result<()> {
        let data = serde_json::to_string(challenge)?;
        sqlx::query("INSERT OR REPLACE INTO challenges (id, data, created_at) VALUES (?, ?, ?)")
            .bind(challenge.id.to_string())
            .bind(data)
            .bind(challenge.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn load_challenge(&self, id: ChallengeId) -> Result<Option<Challenge>> {
        self.fetch_one_data("SELECT data FROM challenges WHERE id = ?", id.to_string())
            .await
    }

    async fn list_challenges(&self) -> Result<Vec<Challenge>> {
        self.fetch_all_data("SELECT data FROM challenges ORDER BY created_at", &[])
            .await
    }
}

#[async_trait]
impl PhaseRepository for SqliteStorage {
    async fn save_phase(&self, phase: &Phase) -> Result<()> {
        let data = serde_json::to_string(phase)?;
        sqlx::query(
            "INSERT OR REPLACE INTO phases (id, challenge_id, order_index, data) VALUES (?, ?, ?, ?)",
        )
        .bind(phase.id.to_string())
        .bind(phase.challenge_id.to_string())
        .bind(i64::from(phase.order_index))
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn load_phase(&self, id: PhaseId) -> Result<Option<Phase>> {
        self.fetch_one_data("SELECT data FROM phases WHERE id = ?", id.to_string())
            .await
    }

    async fn list_phases(&self, challenge_id: ChallengeId) -> Result<Vec<Phase>> {
        self.fetch_all_data(
            "SELECT data FROM phases WHERE challenge_id = ? ORDER BY order_index, id",
            &[challenge_id.to_string()],
        )
        .await
    }
}

#[async_trait]
impl GoalRepository for SqliteStorage {
    async fn save_goal(&self, goal: &Goal) -> Result<()> {
        let data = serde_json::to_string(goal)?;
        sqlx::query(
            "INSERT OR REPLACE INTO goals (id, challenge_id, phase_id, order_index, data)
            VALUES (?, ?, ?, ?, ?)",
        )
        .bind(goal.id.to_string())
        .bind(goal.challenge_id.to_string())
        .bind(goal.phase_id.map(|id| id.to_string()))
        .bind(i64::from(goal.order_index))
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        self.fetch_one_data("SELECT data FROM goals WHERE id = ?", id.to_string())
            .await
    }

    async fn list_goals(&self, challenge_id: ChallengeId) -> Result<Vec<Goal>> {
        self.fetch_all_data(
            "SELECT data FROM goals WHERE challenge_id = ? ORDER BY order_index, id",
            &[challenge_id.to_string()],
        )
        .await
    }
}

#[async_trait]
impl ParticipantRepository for SqliteStorage {
    async fn save_participant(&self, participant: &Participant) -> Result<()> {
        let data = serde_json::to_string(participant)?;
        sqlx::query(
            "INSERT OR REPLACE INTO participants
            (id, challenge_id, patient_ref, current_goal_id, badge_earned, data, joined_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(participant.id.to_string())
        .bind(participant.challenge_id.to_string())
        .bind(participant.patient.0.clone())
        .bind(participant.current_goal_id.map(|id| id.to_string()))
        .bind(participant.badge_earned)
        .bind(data)
        .bind(participant.joined_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn load_participant(&self, id: ParticipantId) -> Result<Option<Participant>> {
        self.fetch_one_data("SELECT data FROM participants WHERE id = ?", id.to_string())
            .await
    }

    async fn find_participant(
        &self,
        challenge_id: ChallengeId,
        patient: &PatientRef,
    ) -> Result<Option<Participant>> {
        let mut rows: Vec<Participant> = self
            .fetch_all_data(
                "SELECT data FROM participants WHERE challenge_id = ? AND patient_ref = ? LIMIT 1",
                &[challenge_id.to_string(), patient.0.clone()],
            )
            .await?;
        Ok(rows.pop())
    }

    async fn list_participants(&self, challenge_id: ChallengeId) -> Result<Vec<Participant>> {
        self.fetch_all_data(
            "SELECT data FROM participants WHERE challenge_id = ? ORDER BY joined_at",
            &[challenge_id.to_string()],
        )
        .await
    }
}

#[async_trait]
impl CheckinRepository for SqliteStorage {
    async fn load_checkin(&self, key: &CheckinKey) -> Result<Option<Checkin>> {
        let mut rows: Vec<Checkin> = self
            .fetch_all_data(
                "SELECT data FROM checkins WHERE participant_id = ? AND goal_id = ? AND checkin_date = ?",
                &[
                    key.participant_id.to_string(),
                    key.goal_id.to_string(),
                    key.checkin_date.to_string(),
                ],
            )
            .await?;
        Ok(rows.pop())
    }

    async fn list_checkins(&self, participant_id: ParticipantId, goal_id: GoalId) -> Result<Vec<Checkin>> {
        self.fetch_all_data(
            "SELECT data FROM checkins WHERE participant_id = ? AND goal_id = ? ORDER BY checkin_date",
            &[participant_id.to_string(), goal_id.to_string()],
        )
        .await
    }

    async fn list_participant_checkins(&self, participant_id: ParticipantId) -> Result<Vec<Checkin>> {
        self.fetch_all_data(
            "SELECT data FROM checkins WHERE participant_id = ? ORDER BY checkin_date, id",
            &[participant_id.to_string()],
        )
        .await
    }
}

#[async_trait]
impl AchievementRepository for SqliteStorage {
    async fn list_achievements(&self, participant_id: ParticipantId) -> Result<Vec<Achievement>> {
        self.fetch_all_data(
            "SELECT data FROM achievements WHERE participant_id = ? ORDER BY earned_at, id",
            &[participant_id.to_string()],
        )
        .await
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn commit_progression(&self, commit: &ProgressionCommit) -> Result<()> {
        let checkin = &commit.checkin;
        let participant = &commit.participant;
        let checkin_data = serde_json::to_string(checkin)?;
        let participant_data = serde_json::to_string(participant)?;

        // Dropping the transaction without commit rolls it back.
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let inserted = sqlx::query(
            "INSERT INTO checkins (id, participant_id, goal_id, checkin_date, data)
            VALUES (?, ?, ?, ?, ?)",
        )
        .bind(checkin.id.to_string())
        .bind(checkin.participant_id.to_string())
        .bind(checkin.goal_id.to_string())
        .bind(checkin.checkin_date.to_string())
        .bind(checkin_data)
        .execute(&mut *tx)
        .await;
        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                return Err(StorageError::DuplicateCheckin(checkin.key()));
            }
            return Err(db_error(e));
        }

        let updated = sqlx::query(
            "UPDATE participants
            SET current_goal_id = ?, badge_earned = ?, data = ?
            WHERE id = ? AND current_goal_id IS ? AND badge_earned = ?",
        )
        .bind(participant.current_goal_id.map(|id| id.to_string()))
        .bind(participant.badge_earned)
        .bind(participant_data)
        .bind(participant.id.to_string())
        .bind(commit.expected_goal_id.map(|id| id.to_string()))
        .bind(commit.expected_badge)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if updated.rows_affected() != 1 {
            warn!("Guarded update of participant {} matched no row", participant.id);
            return Err(StorageError::Conflict(format!(
                "participant {} changed since it was read",
                participant.id
            )));
        }

        for achievement in &commit.achievements {
            let key = achievement.key();
            let inserted = sqlx::query(
                "INSERT INTO achievements
                (id, participant_id, achievement_type, scope_key, data, earned_at)
                VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(achievement.id.to_string())
            .bind(achievement.participant_id.to_string())
            .bind(achievement.achievement_type.as_str())
            .bind(scope_key(key.scope))
            .bind(serde_json::to_string(achievement)?)
            .bind(achievement.earned_at.to_rfc3339())
            .execute(&mut *tx)
            .await;
            if let Err(e) = inserted {
                if is_unique_violation(&e) {
                    return Err(StorageError::DuplicateAchievement(key));
                }
                return Err(db_error(e));
            }
        }

        tx.commit().await.map_err(db_error)?;
        debug!(
            "Committed check-in {} with {} achievements",
            checkin.key(),
            commit.achievements.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nourish_core::{AchievementType, CheckinPayload, GoalType};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    async fn setup() -> (SqliteStorage, Participant, Goal) {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let challenge = Challenge::new("Fiber First", day(1), day(31));
        let phase = Phase::new(challenge.id, "Week 1", 0, 100);
        let goal = Goal::in_phase(challenge.id, phase.id, "Eat oats", GoalType::Checkin, 5, 0);
        storage.save_challenge(&challenge).await.unwrap();
        storage.save_phase(&phase).await.unwrap();
        storage.save_goal(&goal).await.unwrap();
        let participant = Participant::new(challenge.id, PatientRef::new("p-9"));
        storage.save_participant(&participant).await.unwrap();
        (storage, participant, goal)
    }

    fn commit_for(participant: &Participant, goal_id: GoalId, date: NaiveDate) -> ProgressionCommit {
        ProgressionCommit {
            checkin: Checkin::new(participant.id, goal_id, date, CheckinPayload::done()),
            participant: participant.clone(),
            achievements: vec![],
            expected_goal_id: participant.current_goal_id,
            expected_badge: participant.badge_earned,
        }
    }

    #[tokio::test]
    async fn test_in_memory_storage() {
        let (storage, participant, goal) = setup().await;

        let loaded = storage.load_goal(goal.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, goal.title);

        let plan = storage.load_plan(goal.challenge_id).await.unwrap().unwrap();
        assert_eq!(plan.phases().len(), 1);
        assert_eq!(plan.goals().len(), 1);

        let found = storage
            .find_participant(participant.challenge_id, &participant.patient)
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(participant.id));
    }

    #[tokio::test]
    async fn test_unique_constraint_rejects_duplicate_checkin() {
        let (storage, participant, goal) = setup().await;

        storage.commit_progression(&commit_for(&participant, goal.id, day(1))).await.unwrap();
        let err = storage
            .commit_progression(&commit_for(&participant, goal.id, day(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateCheckin(_)));
        assert_eq!(storage.list_checkins(participant.id, goal.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_achievement_insert_rolls_back_checkin() {
        let (storage, participant, goal) = setup().await;
        let now = chrono::Utc::now();

        let mut first = commit_for(&participant, goal.id, day(1));
        first.achievements.push(Achievement::streak(participant.id, AchievementType::Streak7, now));
        storage.commit_progression(&first).await.unwrap();

        let mut second = commit_for(&participant, goal.id, day(2));
        second.participant.streak_count = 2;
        second.achievements.push(Achievement::streak(participant.id, AchievementType::Streak7, now));
        let err = storage.commit_progression(&second).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateAchievement(_)));

        assert!(storage.load_checkin(&second.checkin.key()).await.unwrap().is_none());
        let stored = storage.load_participant(participant.id).await.unwrap().unwrap();
        assert_eq!(stored.streak_count, 0);
        assert_eq!(storage.list_achievements(participant.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_guarded_update_detects_stale_pointer() {
        let (storage, participant, goal) = setup().await;

        let mut advanced = participant.clone();
        advanced.current_goal_id = Some(goal.id);
        storage.save_participant(&advanced).await.unwrap();

        let stale = commit_for(&participant, goal.id, day(3));
        let err = storage.commit_progression(&stale).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert!(storage.load_checkin(&stale.checkin.key()).await.unwrap().is_none());
    }
}
