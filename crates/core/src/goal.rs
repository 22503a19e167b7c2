//! Goal model - a repeatable daily objective with a target count.

use serde::{Deserialize, Serialize};
use crate::id::{ChallengeId, GoalId, PhaseId};

/// A goal belongs to a phase, or directly to the challenge when `phase_id` is none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// Unique identifier
    pub id: GoalId,

    /// Owning challenge
    pub challenge_id: ChallengeId,

    /// Owning phase; none for a direct goal
    pub phase_id: Option<PhaseId>,

    /// Goal title
    pub title: String,

    /// What a check-in must carry
    pub goal_type: GoalType,

    /// Measured quantity for metric goals
    #[serde(default)]
    pub metric_kind: Option<MetricKind>,

    /// Number of completed days required
    pub duration_days: u32,

    /// Position within its phase (or among direct goals)
    pub order_index: u32,
}

/// Goal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// Plain confirmation
    Checkin,
    /// Requires photo evidence
    Photo,
    /// Requires a numeric measurement
    Metric,
}

impl GoalType {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::Checkin => "checkin",
            GoalType::Photo => "photo",
            GoalType::Metric => "metric",
        }
    }
}

/// Quantity recorded by a metric goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Body weight
    Weight,
    /// Water intake
    Water,
    /// Step count
    Steps,
    /// Hours slept
    Sleep,
    /// Servings of fruit or vegetables
    Servings,
}

/// Display status of a goal for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Not reached yet
    Locked,
    /// The participant's current goal
    Active,
    /// Target count reached
    Completed,
    /// Left behind without reaching its target
    Closed,
}

impl GoalStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Locked => "locked",
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Closed => "closed",
        }
    }
}

impl Goal {
    /// Create a goal inside a phase.
    pub fn in_phase(
        challenge_id: ChallengeId,
        phase_id: PhaseId,
        title: impl Into<String>,
        goal_type: GoalType,
        duration_days: u32,
        order_index: u32,
    ) -> Self {
        Self {
            id: GoalId::new(),
            challenge_id,
            phase_id: Some(phase_id),
            title: title.into(),
            goal_type,
            metric_kind: None,
            duration_days,
            order_index,
        }
    }

    /// Create a direct goal not in any phase.
    pub fn direct(
        challenge_id: ChallengeId,
        title: impl Into<String>,
        goal_type: GoalType,
        duration_days: u32,
        order_index: u32,
    ) -> Self {
        Self {
            id: GoalId::new(),
            challenge_id,
            phase_id: None,
            title: title.into(),
            goal_type,
            metric_kind: None,
            duration_days,
            order_index,
        }
    }

    /// Set the metric kind.
    pub fn with_metric_kind(mut self, kind: MetricKind) -> Self {
        self.metric_kind = Some(kind);
        self
    }

    /// Whether this goal sits directly on the challenge.
    pub fn is_direct(&self) -> bool {
        self.phase_id.is_none()
    }
}
