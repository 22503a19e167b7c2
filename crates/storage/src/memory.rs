//! In-memory storage implementation.
//!
//! Keeps every table in maps behind one lock. Used by tests and by callers
//! that host the engine in front of their own persistence.

use std::collections::{BTreeMap, HashMap};
use async_trait::async_trait;
use nourish_core::{
    Achievement, AchievementKey, Challenge, ChallengeId, Checkin, CheckinKey, Goal, GoalId,
    Participant, ParticipantId, PatientRef, Phase, PhaseId,
};
use tokio::sync::RwLock;

use super::trait_::{
    AchievementRepository, ChallengeRepository, CheckinRepository, GoalRepository,
    ParticipantRepository, PhaseRepository, ProgressionCommit, Result, Storage, StorageError,
};

#[derive(Default)]
struct Tables {
    challenges: HashMap<ChallengeId, Challenge>,
    phases: HashMap<PhaseId, Phase>,
    goals: HashMap<GoalId, Goal>,
    participants: HashMap<ParticipantId, Participant>,
    checkins: BTreeMap<CheckinKey, Checkin>,
    achievements: BTreeMap<AchievementKey, Achievement>,
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored check-ins.
    pub async fn checkin_count(&self) -> usize {
        self.tables.read().await.checkins.len()
    }

    /// Number of stored achievements.
    pub async fn achievement_count(&self) -> usize {
        self.tables.read().await.achievements.len()
    }
}

#[async_trait]
impl ChallengeRepository for MemoryStorage {
    async fn save_challenge(&self, challenge: &Challenge) -> Result<()> {
        self.tables.write().await.challenges.insert(challenge.id, challenge.clone());
        Ok(())
    }

    async fn load_challenge(&self, id: ChallengeId) -> Result<Option<Challenge>> {
        Ok(self.tables.read().await.challenges.get(&id).cloned())
    }

    async fn list_challenges(&self) -> Result<Vec<Challenge>> {
        let mut all: Vec<Challenge> = self.tables.read().await.challenges.values().cloned().collect();
        all.sort_by_key(|c| c.created_at);
        Ok(all)
    }
}

#[async_trait]
impl PhaseRepository for MemoryStorage {
    async fn save_phase(&self, phase: &Phase) -> Result<()> {
        self.tables.write().await.phases.insert(phase.id, phase.clone());
        Ok(())
    }

    async fn load_phase(&self, id: PhaseId) -> Result<Option<Phase>> {
        Ok(self.tables.read().await.phases.get(&id).cloned())
    }

    async fn list_phases(&self, challenge_id: ChallengeId) -> Result<Vec<Phase>> {
        let mut phases: Vec<Phase> = self
            .tables
            .read()
            .await
            .phases
            .values()
            .filter(|p| p.challenge_id == challenge_id)
            .cloned()
            .collect();
        phases.sort_by_key(|p| (p.order_index, p.id));
        Ok(phases)
    }
}

#[async_trait]
impl GoalRepository for MemoryStorage {
    async fn save_goal(&self, goal: &Goal) -> Result<()> {
        self.tables.write().await.goals.insert(goal.id, goal.clone());
        Ok(())
    }

    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        Ok(self.tables.read().await.goals.get(&id).cloned())
    }

    async fn list_goals(&self, challenge_id: ChallengeId) -> Result<Vec<Goal>> {
        let mut goals: Vec<Goal> = self
            .tables
            .read()
            .await
            .goals
            .values()
            .filter(|g| g.challenge_id == challenge_id)
            .cloned()
            .collect();
        goals.sort_by_key(|g| (g.order_index, g.id));
        Ok(goals)
    }
}

#[async_trait]
impl ParticipantRepository for MemoryStorage {
    async fn save_participant(&self, participant: &Participant) -> Result<()> {
        self.tables
            .write()
            .await
            .participants
            .insert(participant.id, participant.clone());
        Ok(())
    }

    async fn load_participant(&self, id: ParticipantId) -> Result<Option<Participant>> {
        Ok(self.tables.read().await.participants.get(&id).cloned())
    }

    async fn find_participant(
        &self,
        challenge_id: ChallengeId,
        patient: &PatientRef,
    ) -> Result<Option<Participant>> {
        Ok(self
            .tables
            .read()
            .await
            .participants
            .values()
            .find(|p| p.challenge_id == challenge_id && &p.patient == patient)
            .cloned())
    }

    async fn list_participants(&self, challenge_id: ChallengeId) -> Result<Vec<Participant>> {
        let mut all: Vec<Participant> = self
            .tables
            .read()
            .await
            .participants
            .values()
            .filter(|p| p.challenge_id == challenge_id)
            .cloned()
            .collect();
        all.sort_by_key(|p| p.joined_at);
        Ok(all)
    }
}

#[async_trait]
impl CheckinRepository for MemoryStorage {
    async fn load_checkin(&self, key: &CheckinKey) -> Result<Option<Checkin>> {
        Ok(self.tables.read().await.checkins.get(key).cloned())
    }

    async fn list_checkins(&self, participant_id: ParticipantId, goal_id: GoalId) -> Result<Vec<Checkin>> {
        let mut rows: Vec<Checkin> = self
            .tables
            .read()
            .await
            .checkins
            .values()
            .filter(|c| c.participant_id == participant_id && c.goal_id == goal_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.checkin_date);
        Ok(rows)
    }

    async fn list_participant_checkins(&self, participant_id: ParticipantId) -> Result<Vec<Checkin>> {
        let mut rows: Vec<Checkin> = self
            .tables
            .read()
            .await
            .checkins
            .values()
            .filter(|c| c.participant_id == participant_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.checkin_date, c.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl AchievementRepository for MemoryStorage {
    async fn list_achievements(&self, participant_id: ParticipantId) -> Result<Vec<Achievement>> {
        let mut rows: Vec<Achievement> = self
            .tables
            .read()
            .await
            .achievements
            .values()
            .filter(|a| a.participant_id == participant_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.earned_at);
        Ok(rows)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn commit_progression(&self, commit: &ProgressionCommit) -> Result<()> {
        let mut tables = self.tables.write().await;

        // Validate everything before touching any table.
        let key = commit.checkin.key();
        if tables.checkins.contains_key(&key) {
            return Err(StorageError::DuplicateCheckin(key));
        }
        for achievement in &commit.achievements {
            let key = achievement.key();
            if tables.achievements.contains_key(&key) {
                return Err(StorageError::DuplicateAchievement(key));
            }
        }
        let stored = tables
            .participants
            .get(&commit.participant.id)
            .ok_or_else(|| StorageError::NotFound(format!("participant {}", commit.participant.id)))?;
        if !commit.guard_holds(stored) {
            return Err(StorageError::Conflict(format!(
                "participant {} changed since it was read",
                commit.participant.id
            )));
        }

        tables.checkins.insert(key, commit.checkin.clone());
        tables
            .participants
            .insert(commit.participant.id, commit.participant.clone());
        for achievement in &commit.achievements {
            tables.achievements.insert(achievement.key(), achievement.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nourish_core::{AchievementType, CheckinPayload};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    async fn enrolled(storage: &MemoryStorage) -> Participant {
        let participant = Participant::new(ChallengeId::new(), PatientRef::new("p-1"));
        storage.save_participant(&participant).await.unwrap();
        participant
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
    async fn test_duplicate_checkin_writes_nothing() {
        let storage = MemoryStorage::new();
        let participant = enrolled(&storage).await;
        let goal_id = GoalId::new();

        storage.commit_progression(&commit_for(&participant, goal_id, day(1))).await.unwrap();

        let mut again = commit_for(&participant, goal_id, day(1));
        again.achievements.push(Achievement::streak(participant.id, AchievementType::Streak7, chrono::Utc::now()));
        let err = storage.commit_progression(&again).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateCheckin(_)));
        assert_eq!(storage.checkin_count().await, 1);
        assert_eq!(storage.achievement_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_achievement_aborts_commit() {
        let storage = MemoryStorage::new();
        let participant = enrolled(&storage).await;
        let goal_id = GoalId::new();
        let now = chrono::Utc::now();

        let mut first = commit_for(&participant, goal_id, day(1));
        first.achievements.push(Achievement::streak(participant.id, AchievementType::Streak7, now));
        storage.commit_progression(&first).await.unwrap();

        let mut second = commit_for(&participant, goal_id, day(2));
        second.achievements.push(Achievement::streak(participant.id, AchievementType::Streak7, now));
        let err = storage.commit_progression(&second).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateAchievement(_)));
        assert_eq!(storage.checkin_count().await, 1);
    }

    #[tokio::test]
    async fn test_stale_guard_conflicts() {
        let storage = MemoryStorage::new();
        let mut participant = enrolled(&storage).await;
        let stale = commit_for(&participant, GoalId::new(), day(1));

        participant.current_goal_id = Some(GoalId::new());
        storage.save_participant(&participant).await.unwrap();

        let err = storage.commit_progression(&stale).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(storage.checkin_count().await, 0);
    }

    #[tokio::test]
    async fn test_checkins_listed_by_date() {
        let storage = MemoryStorage::new();
        let participant = enrolled(&storage).await;
        let goal_id = GoalId::new();
        for d in [3, 1, 2] {
            storage.commit_progression(&commit_for(&participant, goal_id, day(d))).await.unwrap();
        }
        let dates: Vec<NaiveDate> = storage
            .list_checkins(participant.id, goal_id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.checkin_date)
            .collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
    }
}
