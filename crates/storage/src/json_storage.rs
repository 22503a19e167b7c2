//! JSON file storage implementation.
//!
//! Stores data as JSON files under a root directory (the CLI uses `.nourish`).
//! Check-ins and achievements are keyed by path so their uniqueness constraints
//! are enforced by the filesystem layout:
//!
//! ```text
//! checkins/<participant>/<goal>/<date>.json
//! achievements/<participant>/<type>[.<scope>].json
//! ```
//!
//! Writes go through a temp file and a rename. A progression commit validates
//! and serializes every row before the first write and undoes completed writes
//! if a later one fails. The backend assumes a single writing process.

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use nourish_core::{
    Achievement, AchievementKey, AchievementScope, Challenge, ChallengeId, Checkin, CheckinKey,
    Goal, GoalId, Participant, ParticipantId, PatientRef, Phase, PhaseId,
};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::trait_::{
    AchievementRepository, ChallengeRepository, CheckinRepository, GoalRepository,
    ParticipantRepository, PhaseRepository, ProgressionCommit, Result, Storage, StorageError,
};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStorage {
    /// Create storage, creating the directory layout under `root` if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("challenges")).await?;
        fs::create_dir_all(root.join("phases")).await?;
        fs::create_dir_all(root.join("goals")).await?;
        fs::create_dir_all(root.join("participants")).await?;
        fs::create_dir_all(root.join("checkins")).await?;
        fs::create_dir_all(root.join("achievements")).await?;

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn challenge_path(&self, id: ChallengeId) -> PathBuf {
        self.root.join("challenges").join(format!("{}.json", id))
    }
    fn phase_path(&self, id: PhaseId) -> PathBuf {
        self.root.join("phases").join(format!("{}.json", id))
    }
    fn goal_path(&self, id: GoalId) -> PathBuf {
        self.root.join("goals").join(format!("{}.json", id))
    }
    fn participant_path(&self, id: ParticipantId) -> PathBuf {
        self.root.join("participants").join(format!("{}.json", id))
    }
    fn checkin_dir(&self, participant_id: ParticipantId, goal_id: GoalId) -> PathBuf {
        self.root
            .join("checkins")
            .join(participant_id.to_string())
            .join(goal_id.to_string())
    }
    fn checkin_path(&self, key: &CheckinKey) -> PathBuf {
        self.checkin_dir(key.participant_id, key.goal_id)
            .join(format!("{}.json", key.checkin_date.format("%Y-%m-%d")))
    }
    fn achievement_dir(&self, participant_id: ParticipantId) -> PathBuf {
        self.root.join("achievements").join(participant_id.to_string())
    }
    fn achievement_path(&self, key: &AchievementKey) -> PathBuf {
        let name = match key.scope {
            AchievementScope::Participant => format!("{}.json", key.achievement_type),
            AchievementScope::Goal(id) => format!("{}.goal-{}.json", key.achievement_type, id),
            AchievementScope::Phase(id) => format!("{}.phase-{}.json", key.achievement_type, id),
        };
        self.achievement_dir(key.participant_id).join(name)
    }

    async fn save<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        write_atomic(path, json.as_bytes()).await
    }
}

#[async_trait]
impl ChallengeRepository for JsonStorage {
    async fn save_challenge(&self, challenge: &Challenge) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(&self.challenge_path(challenge.id), challenge).await
    }

    async fn load_challenge(&self, id: ChallengeId) -> Result<Option<Challenge>> {
        read_json(&self.challenge_path(id)).await
    }

    async fn list_challenges(&self) -> Result<Vec<Challenge>> {
        let mut all: Vec<Challenge> = list_dir(&self.root.join("challenges")).await?;
        all.sort_by_key(|c| c.created_at);
        Ok(all)
    }
}

#[async_trait]
impl PhaseRepository for JsonStorage {
    async fn save_phase(&self, phase: &Phase) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(&self.phase_path(phase.id), phase).await
    }

    async fn load_phase(&self, id: PhaseId) -> Result<Option<Phase>> {
        read_json(&self.phase_path(id)).await
    }

    async fn list_phases(&self, challenge_id: ChallengeId) -> Result<Vec<Phase>> {
        let mut phases: Vec<Phase> = list_dir(&self.root.join("phases"))
            .await?
            .into_iter()
            .filter(|p: &Phase| p.challenge_id == challenge_id)
            .collect();
        phases.sort_by_key(|p| (p.order_index, p.id));
        Ok(phases)
    }
}

#[async_trait]
impl GoalRepository for JsonStorage {
    async fn save_goal(&self, goal: &Goal) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(&self.goal_path(goal.id), goal).await
    }

    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        read_json(&self.goal_path(id)).await
    }

    async fn list_goals(&self, challenge_id: ChallengeId) -> Result<Vec<Goal>> {
        let mut goals: Vec<Goal> = list_dir(&self.root.join("goals"))
            .await?
            .into_iter()
            .filter(|g: &Goal| g.challenge_id == challenge_id)
            .collect();
        goals.sort_by_key(|g| (g.order_index, g.id));
        Ok(goals)
    }
}

#[async_trait]
impl ParticipantRepository for JsonStorage {
    async fn save_participant(&self, participant: &Participant) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(&self.participant_path(participant.id), participant).await
    }

    async fn load_participant(&self, id: ParticipantId) -> Result<Option<Participant>> {
        read_json(&self.participant_path(id)).await
    }

    async fn find_participant(
        &self,
        challenge_id: ChallengeId,
        patient: &PatientRef,
    ) -> Result<Option<Participant>> {
        Ok(self
            .list_participants(challenge_id)
            .await?
            .into_iter()
            .find(|p| &p.patient == patient))
    }

    async fn list_participants(&self, challenge_id: ChallengeId) -> Result<Vec<Participant>> {
        let mut all: Vec<Participant> = list_dir(&self.root.join("participants"))
            .await?
            .into_iter()
            .filter(|p: &Participant| p.challenge_id == challenge_id)
            .collect();
        all.sort_by_key(|p| p.joined_at);
        Ok(all)
    }
}

#[async_trait]
impl CheckinRepository for JsonStorage {
    async fn load_checkin(&self, key: &CheckinKey) -> Result<Option<Checkin>> {
        read_json(&self.checkin_path(key)).await
    }

    async fn list_checkins(&self, participant_id: ParticipantId, goal_id: GoalId) -> Result<Vec<Checkin>> {
        let mut rows: Vec<Checkin> = list_dir(&self.checkin_dir(participant_id, goal_id)).await?;
        rows.sort_by_key(|c| c.checkin_date);
        Ok(rows)
    }

    async fn list_participant_checkins(&self, participant_id: ParticipantId) -> Result<Vec<Checkin>> {
        let participant_dir = self.root.join("checkins").join(participant_id.to_string());
        let mut rows = Vec::new();
        let mut rd = match fs::read_dir(&participant_dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(rows),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = rd.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                rows.extend(list_dir::<Checkin>(&entry.path()).await?);
            }
        }
        rows.sort_by_key(|c| (c.checkin_date, c.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl AchievementRepository for JsonStorage {
    async fn list_achievements(&self, participant_id: ParticipantId) -> Result<Vec<Achievement>> {
        let mut rows: Vec<Achievement> = list_dir(&self.achievement_dir(participant_id)).await?;
        rows.sort_by_key(|a| a.earned_at);
        Ok(rows)
    }
}

#[async_trait]
impl Storage for JsonStorage {
    async fn commit_progression(&self, commit: &ProgressionCommit) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let checkin_path = self.checkin_path(&commit.checkin.key());
        if fs::try_exists(&checkin_path).await? {
            return Err(StorageError::DuplicateCheckin(commit.checkin.key()));
        }

        let mut achievement_files = Vec::with_capacity(commit.achievements.len());
        for achievement in &commit.achievements {
            let key = achievement.key();
            let path = self.achievement_path(&key);
            if fs::try_exists(&path).await? {
                return Err(StorageError::DuplicateAchievement(key));
            }
            achievement_files.push((path, serde_json::to_vec_pretty(achievement)?));
        }

        let participant_path = self.participant_path(commit.participant.id);
        let previous = fs::read(&participant_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(format!("participant {}", commit.participant.id))
            } else {
                e.into()
            }
        })?;
        let stored: Participant = serde_json::from_slice(&previous)?;
        if !commit.guard_holds(&stored) {
            return Err(StorageError::Conflict(format!(
                "participant {} changed since it was read",
                commit.participant.id
            )));
        }

        let checkin_bytes = serde_json::to_vec_pretty(&commit.checkin)?;
        let participant_bytes = serde_json::to_vec_pretty(&commit.participant)?;

        // Everything is validated and serialized; apply, undoing on failure.
        let mut created: Vec<PathBuf> = Vec::new();
        let applied: Result<()> = async {
            for (path, bytes) in &achievement_files {
                write_atomic(path, bytes).await?;
                created.push(path.clone());
            }
            write_atomic(&checkin_path, &checkin_bytes).await?;
            created.push(checkin_path.clone());
            write_atomic(&participant_path, &participant_bytes).await?;
            Ok::<(), StorageError>(())
        }
        .await;

        if let Err(e) = applied {
            warn!("Progression commit failed, undoing {} writes: {}", created.len(), e);
            for path in &created {
                if let Err(undo) = fs::remove_file(path).await {
                    warn!("Failed to undo {}: {}", path.display(), undo);
                }
            }
            if let Err(undo) = write_atomic(&participant_path, &previous).await {
                warn!("Failed to restore participant {}: {}", commit.participant.id, undo);
            }
            return Err(e);
        }

        debug!(
            "Committed check-in {} with {} achievements",
            commit.checkin.key(),
            commit.achievements.len()
        );
        Ok(())
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(items),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Some(item) = read_json(&entry.path()).await? {
            items.push(item);
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nourish_core::{AchievementType, CheckinPayload, GoalType};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    async fn setup() -> (tempfile::TempDir, JsonStorage, Participant, Goal) {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let challenge = Challenge::new("Hydration", day(1), day(30));
        let goal = Goal::direct(challenge.id, "Drink water", GoalType::Checkin, 3, 0);
        storage.save_challenge(&challenge).await.unwrap();
        storage.save_goal(&goal).await.unwrap();
        let participant = Participant::new(challenge.id, PatientRef::new("p-1"));
        storage.save_participant(&participant).await.unwrap();
        (dir, storage, participant, goal)
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
    async fn test_authoring_rows_round_trip() {
        let (_dir, storage, participant, goal) = setup().await;

        let loaded = storage.load_goal(goal.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Drink water");
        assert_eq!(storage.list_goals(goal.challenge_id).await.unwrap().len(), 1);

        let found = storage
            .find_participant(participant.challenge_id, &PatientRef::new("p-1"))
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(participant.id));

        let plan = storage.load_plan(goal.challenge_id).await.unwrap().unwrap();
        assert_eq!(plan.first_goal().map(|g| g.id), Some(goal.id));
    }

    #[tokio::test]
    async fn test_commit_enforces_checkin_uniqueness() {
        let (_dir, storage, participant, goal) = setup().await;

        storage.commit_progression(&commit_for(&participant, goal.id, day(2))).await.unwrap();
        let err = storage
            .commit_progression(&commit_for(&participant, goal.id, day(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateCheckin(_)));

        let rows = storage.list_checkins(participant.id, goal.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(storage.list_participant_checkins(participant.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_persists_participant_and_achievements() {
        let (_dir, storage, participant, goal) = setup().await;

        let mut commit = commit_for(&participant, goal.id, day(3));
        commit.participant.streak_count = 1;
        commit.participant.best_streak = 1;
        commit.achievements.push(Achievement::goal_complete(participant.id, goal.id, chrono::Utc::now()));
        storage.commit_progression(&commit).await.unwrap();

        let stored = storage.load_participant(participant.id).await.unwrap().unwrap();
        assert_eq!(stored.streak_count, 1);
        let achievements = storage.list_achievements(participant.id).await.unwrap();
        assert_eq!(achievements.len(), 1);
        assert_eq!(achievements[0].achievement_type, AchievementType::GoalComplete);

        let mut replay = commit_for(&stored, goal.id, day(4));
        replay.achievements.push(Achievement::goal_complete(participant.id, goal.id, chrono::Utc::now()));
        let err = storage.commit_progression(&replay).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateAchievement(_)));
        assert!(storage
            .load_checkin(&replay.checkin.key())
            .await
            .unwrap()
            .is_none());
    }
}
