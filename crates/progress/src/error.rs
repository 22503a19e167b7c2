//! Error taxonomy of the progression engine.

use chrono::NaiveDate;
use nourish_core::{GoalId, ParticipantId};
use nourish_storage::StorageError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Errors returned by the progression engine.
///
/// Every variant except `Persistence` is an expected outcome the caller can
/// render. A `Persistence` error means nothing was written; retry the whole
/// submission or not at all.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    /// Payload shape does not match the goal type
    #[error("Validation error: {0}")]
    Validation(String),

    /// A check-in already exists for this participant, goal and day
    #[error("Duplicate check-in for goal {goal_id} on {date}")]
    DuplicateCheckin {
        /// Participant
        participant_id: ParticipantId,
        /// Goal
        goal_id: GoalId,
        /// Calendar date
        date: NaiveDate,
    },

    /// Unknown participant, challenge, phase or goal
    #[error("Not found: {0}")]
    NotFound(String),

    /// Check-in against a non-current goal, or a finished challenge
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Opaque storage failure
    #[error("Persistence error: {0}")]
    Persistence(#[source] StorageError),
}

impl ProgressError {
    /// Whether this is the expected duplicate-submission outcome.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ProgressError::DuplicateCheckin { .. })
    }
}

impl From<StorageError> for ProgressError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::DuplicateCheckin(key) => ProgressError::DuplicateCheckin {
                participant_id: key.participant_id,
                goal_id: key.goal_id,
                date: key.checkin_date,
            },
            StorageError::NotFound(what) => ProgressError::NotFound(what),
            other => ProgressError::Persistence(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nourish_core::CheckinKey;

    #[test]
    fn test_duplicate_storage_error_maps_to_duplicate_checkin() {
        let key = CheckinKey {
            participant_id: ParticipantId::new(),
            goal_id: GoalId::new(),
            checkin_date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        };
        let err = ProgressError::from(StorageError::DuplicateCheckin(key));
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_other_storage_errors_are_persistence() {
        let err = ProgressError::from(StorageError::Conflict("moved".into()));
        assert!(matches!(err, ProgressError::Persistence(StorageError::Conflict(_))));
        assert!(!err.is_duplicate());
    }
}
