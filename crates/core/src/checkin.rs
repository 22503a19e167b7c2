//! Checkin model - one dated record that a participant worked on a goal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::id::{CheckinId, GoalId, ParticipantId};
use crate::Time;

/// A check-in. Unique on (participant, goal, date); never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkin {
    /// Unique identifier
    pub id: CheckinId,

    /// Who checked in
    pub participant_id: ParticipantId,

    /// Goal checked in against
    pub goal_id: GoalId,

    /// Calendar date in the challenge's reference timezone
    pub checkin_date: NaiveDate,

    /// Whether the day counts as done
    pub completed: bool,

    /// Measurement for metric goals
    pub metric_value: Option<f64>,

    /// Photo or file reference for photo goals
    pub evidence_ref: Option<String>,

    /// Free-form notes
    pub notes: Option<String>,

    /// When recorded
    pub created_at: Time,
}

impl Checkin {
    /// Build a check-in row from a payload.
    pub fn new(
        participant_id: ParticipantId,
        goal_id: GoalId,
        checkin_date: NaiveDate,
        payload: CheckinPayload,
    ) -> Self {
        Self {
            id: CheckinId::new(),
            participant_id,
            goal_id,
            checkin_date,
            completed: payload.completed,
            metric_value: payload.metric_value,
            evidence_ref: payload.evidence_ref,
            notes: payload.notes,
            created_at: chrono::Utc::now(),
        }
    }

    /// The uniqueness key of this row.
    pub fn key(&self) -> CheckinKey {
        CheckinKey {
            participant_id: self.participant_id,
            goal_id: self.goal_id,
            checkin_date: self.checkin_date,
        }
    }
}

/// The (participant, goal, date) uniqueness key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CheckinKey {
    /// Participant
    pub participant_id: ParticipantId,
    /// Goal
    pub goal_id: GoalId,
    /// Calendar date
    pub checkin_date: NaiveDate,
}

impl std::fmt::Display for CheckinKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.participant_id, self.goal_id, self.checkin_date)
    }
}

/// What the patient submits with a check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinPayload {
    /// Whether the day counts as done
    #[serde(default = "default_completed")]
    pub completed: bool,

    /// Measurement for metric goals
    #[serde(default)]
    pub metric_value: Option<f64>,

    /// Photo or file reference for photo goals
    #[serde(default)]
    pub evidence_ref: Option<String>,

    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_completed() -> bool {
    true
}

impl Default for CheckinPayload {
    fn default() -> Self {
        Self {
            completed: true,
            metric_value: None,
            evidence_ref: None,
            notes: None,
        }
    }
}

impl CheckinPayload {
    /// A plain completed confirmation.
    pub fn done() -> Self {
        Self::default()
    }

    /// A day logged as not done.
    pub fn missed() -> Self {
        Self {
            completed: false,
            ..Self::default()
        }
    }

    /// Attach a measurement.
    pub fn with_metric(mut self, value: f64) -> Self {
        self.metric_value = Some(value);
        self
    }

    /// Attach photo evidence.
    pub fn with_evidence(mut self, reference: impl Into<String>) -> Self {
        self.evidence_ref = Some(reference.into());
        self
    }

    /// Attach notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
