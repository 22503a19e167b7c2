//! Per-participant serialization of progression transactions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use nourish_core::ParticipantId;
use tokio::sync::OwnedMutexGuard;

const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per participant.
///
/// Different participants never contend; submissions for the same
/// participant run one at a time.
#[derive(Default)]
pub struct ParticipantLocks {
    inner: Mutex<HashMap<ParticipantId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ParticipantLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `participant_id`.
    pub async fn acquire(&self, participant_id: ParticipantId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if map.len() >= PRUNE_THRESHOLD {
                // Only the table holds these: nobody is running or waiting.
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            map.entry(participant_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of tracked participants.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no participant is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
