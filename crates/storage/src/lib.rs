//! Storage abstraction and implementations for Nourish.
//!
//! This crate provides strongly-typed repository traits per entity, the
//! atomic progression commit, and in-memory, JSON-file and (with the
//! `sqlite` feature) SQLite implementations.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
pub mod json_storage;
#[cfg(feature = "sqlite")]
pub mod sqlite_storage;

pub use trait_::{
    Storage, StorageError, Result, ProgressionCommit,
    ChallengeRepository, PhaseRepository, GoalRepository,
    ParticipantRepository, CheckinRepository, AchievementRepository,
};
pub use memory::MemoryStorage;
pub use json_storage::JsonStorage;
#[cfg(feature = "sqlite")]
pub use sqlite_storage::SqliteStorage;
