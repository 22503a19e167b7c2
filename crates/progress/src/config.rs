//! Engine configuration.

use nourish_core::AchievementType;

/// A streak length that unlocks an achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakMilestone {
    /// Consecutive days required
    pub days: u32,
    /// Achievement unlocked
    pub achievement: AchievementType,
}

impl StreakMilestone {
    /// Create a milestone.
    pub fn new(days: u32, achievement: AchievementType) -> Self {
        Self { days, achievement }
    }
}

/// Configuration for the progression engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Streak milestones, checked in order
    pub streak_milestones: Vec<StreakMilestone>,
    /// Reject check-ins dated outside the challenge's start/end window
    pub enforce_challenge_window: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            streak_milestones: vec![
                StreakMilestone::new(7, AchievementType::Streak7),
                StreakMilestone::new(14, AchievementType::Streak14),
                StreakMilestone::new(21, AchievementType::Streak21),
            ],
            enforce_challenge_window: true,
        }
    }
}
