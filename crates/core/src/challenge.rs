//! Challenge model - a time-boxed habit program patients enroll in.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use crate::id::ChallengeId;
use crate::Time;

/// A challenge is authored by the practice and read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Unique identifier
    pub id: ChallengeId,

    /// Challenge title
    pub title: String,

    /// Longer description shown to patients
    #[serde(default)]
    pub description: String,

    /// First calendar day check-ins are accepted
    pub start_date: NaiveDate,

    /// Last calendar day check-ins are accepted
    pub end_date: NaiveDate,

    /// Lifecycle status
    pub status: ChallengeStatus,

    /// Offset of the reference timezone from UTC, fixed at creation.
    ///
    /// All check-in dates for this challenge are calendar dates in this zone.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// When created
    pub created_at: Time,
}

/// Challenge status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    /// Being authored, not open for check-ins
    Draft,
    /// Open for check-ins
    Active,
    /// Window closed
    Ended,
    /// Hidden from patients
    Archived,
}

impl Challenge {
    /// Create an active challenge in UTC.
    pub fn new(title: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: ChallengeId::new(),
            title: title.into(),
            description: String::new(),
            start_date,
            end_date,
            status: ChallengeStatus::Active,
            utc_offset_minutes: 0,
            created_at: Utc::now(),
        }
    }

    /// Set the reference timezone offset.
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// The fixed reference timezone. Out-of-range offsets fall back to UTC.
    pub fn reference_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix())
    }

    /// Whether `date` falls inside the start/end window (inclusive).
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}
