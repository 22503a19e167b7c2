//! Unique identifiers for Nourish entities.
//!
//! Every identifier wraps a ULID so ids sort by creation time and render as
//! 26-character strings in storage keys and CLI output.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a new identifier.
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

define_id! {
    /// Unique identifier for a Challenge
    ChallengeId
}

define_id! {
    /// Unique identifier for a Phase
    PhaseId
}

define_id! {
    /// Unique identifier for a Goal
    GoalId
}

define_id! {
    /// Unique identifier for a Participant (one enrollment)
    ParticipantId
}

define_id! {
    /// Unique identifier for a Checkin
    CheckinId
}

define_id! {
    /// Unique identifier for an Achievement
    AchievementId
}

/// Reference to a patient record owned by the practice system.
///
/// The engine never resolves it; identity and authorization happen upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatientRef(pub String);

impl PatientRef {
    /// Create a new patient reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }
}

impl std::fmt::Display for PatientRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parses_its_display_form() {
        let id = GoalId::new();
        let parsed: GoalId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_id_rejects_garbage() {
        assert!("not-a-ulid".parse::<ParticipantId>().is_err());
    }
}
