//! Challenge definition documents.
//!
//! A definition nests phases and goals the way an author writes them; order
//! indexes follow array position and identifiers are assigned on import.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use nourish_core::{Challenge, ChallengeStatus, Goal, GoalType, MetricKind, Phase};
use nourish_storage::Storage;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChallengeDefinition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_status")]
    pub status: ChallengeStatus,
    #[serde(default)]
    pub phases: Vec<PhaseDefinition>,
    /// Goals attached to the challenge itself, visited after all phases
    #[serde(default)]
    pub goals: Vec<GoalDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct PhaseDefinition {
    pub name: String,
    #[serde(default = "default_threshold")]
    pub completion_threshold: u8,
    #[serde(default)]
    pub goals: Vec<GoalDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct GoalDefinition {
    pub title: String,
    #[serde(default = "default_goal_type")]
    pub goal_type: GoalType,
    #[serde(default)]
    pub metric_kind: Option<MetricKind>,
    pub duration_days: u32,
}

fn default_status() -> ChallengeStatus {
    ChallengeStatus::Active
}

fn default_threshold() -> u8 {
    100
}

fn default_goal_type() -> GoalType {
    GoalType::Checkin
}

/// Rows produced from one definition.
pub struct ImportedChallenge {
    pub challenge: Challenge,
    pub phases: Vec<Phase>,
    pub goals: Vec<Goal>,
}

impl ChallengeDefinition {
    pub fn from_json(text: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(text)?;
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("challenge title must not be empty");
        }
        if self.end_date < self.start_date {
            bail!("challenge ends ({}) before it starts ({})", self.end_date, self.start_date);
        }
        if !(-14 * 60..=14 * 60).contains(&self.utc_offset_minutes) {
            bail!("utc_offset_minutes {} is out of range", self.utc_offset_minutes);
        }
        if self.phases.iter().all(|p| p.goals.is_empty()) && self.goals.is_empty() {
            bail!("challenge '{}' has no goals", self.title);
        }
        for phase in &self.phases {
            if phase.completion_threshold > 100 {
                bail!("phase '{}' threshold {} exceeds 100", phase.name, phase.completion_threshold);
            }
        }
        for goal in self.phases.iter().flat_map(|p| &p.goals).chain(&self.goals) {
            if goal.goal_type == GoalType::Metric && goal.metric_kind.is_none() {
                bail!("metric goal '{}' needs a metric_kind", goal.title);
            }
        }
        Ok(())
    }

    /// Assign identifiers and order indexes.
    pub fn build(self) -> ImportedChallenge {
        let mut challenge = Challenge::new(self.title, self.start_date, self.end_date)
            .with_utc_offset_minutes(self.utc_offset_minutes);
        challenge.description = self.description;
        challenge.status = self.status;

        let mut phases = Vec::new();
        let mut goals = Vec::new();
        for (phase_index, phase_def) in self.phases.into_iter().enumerate() {
            let phase = Phase::new(
                challenge.id,
                phase_def.name,
                phase_index as u32,
                phase_def.completion_threshold,
            );
            for (goal_index, goal_def) in phase_def.goals.into_iter().enumerate() {
                let goal = Goal::in_phase(
                    challenge.id,
                    phase.id,
                    goal_def.title,
                    goal_def.goal_type,
                    goal_def.duration_days,
                    goal_index as u32,
                );
                goals.push(with_kind(goal, goal_def.metric_kind));
            }
            phases.push(phase);
        }
        for (goal_index, goal_def) in self.goals.into_iter().enumerate() {
            let goal = Goal::direct(
                challenge.id,
                goal_def.title,
                goal_def.goal_type,
                goal_def.duration_days,
                goal_index as u32,
            );
            goals.push(with_kind(goal, goal_def.metric_kind));
        }

        ImportedChallenge { challenge, phases, goals }
    }
}

fn with_kind(goal: Goal, kind: Option<MetricKind>) -> Goal {
    match kind {
        Some(kind) => goal.with_metric_kind(kind),
        None => goal,
    }
}

impl ImportedChallenge {
    /// Write every row.
    pub async fn save<S: Storage>(&self, storage: &S) -> Result<()> {
        storage.save_challenge(&self.challenge).await?;
        for phase in &self.phases {
            storage.save_phase(phase).await?;
        }
        for goal in &self.goals {
            storage.save_goal(goal).await?;
        }
        Ok(())
    }
}
