//! Challenge plan - a challenge's phases and goals in progression order.

use serde::{Deserialize, Serialize};
use crate::challenge::Challenge;
use crate::goal::Goal;
use crate::id::{GoalId, PhaseId};
use crate::phase::Phase;

/// Where a goal sits in the progression order.
///
/// Phases are visited by `order_index`, direct goals after every phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Inside a phase
    Phase {
        /// Phase order index
        order: u32,
        /// Tie-breaker for equal order indexes
        id: PhaseId,
    },
    /// A direct goal
    Direct,
}

/// Total order over goal positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Stage
    pub stage: Stage,
    /// Goal order index within the stage
    pub goal_order: u32,
    /// Tie-breaker for equal order indexes
    pub goal_id: GoalId,
}

/// A challenge with its phases and goals sorted by `order_index`.
#[derive(Debug, Clone)]
pub struct ChallengePlan {
    /// The challenge
    pub challenge: Challenge,
    phases: Vec<Phase>,
    goals: Vec<Goal>,
}

impl ChallengePlan {
    /// Build a plan. Input order does not matter.
    pub fn new(challenge: Challenge, mut phases: Vec<Phase>, mut goals: Vec<Goal>) -> Self {
        phases.retain(|p| p.challenge_id == challenge.id);
        goals.retain(|g| g.challenge_id == challenge.id);
        phases.sort_by_key(|p| (p.order_index, p.id));

        let stage_rank = |goal: &Goal| -> (usize, u32, GoalId) {
            let rank = match goal.phase_id {
                Some(phase_id) => phases
                    .iter()
                    .position(|p| p.id == phase_id)
                    .unwrap_or(usize::MAX),
                None => usize::MAX - 1,
            };
            (rank, goal.order_index, goal.id)
        };
        goals.sort_by_key(|g| stage_rank(g));
        // Goals pointing at a phase outside this challenge are unreachable.
        goals.retain(|g| match g.phase_id {
            Some(phase_id) => phases.iter().any(|p| p.id == phase_id),
            None => true,
        });

        Self { challenge, phases, goals }
    }

    /// Phases in order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Every reachable goal in progression order.
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    /// Look up a phase.
    pub fn phase(&self, id: PhaseId) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Look up a goal.
    pub fn goal(&self, id: GoalId) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    /// Goals of one phase in order.
    pub fn goals_in_phase(&self, phase_id: PhaseId) -> Vec<&Goal> {
        self.goals
            .iter()
            .filter(|g| g.phase_id == Some(phase_id))
            .collect()
    }

    /// Direct goals in order.
    pub fn direct_goals(&self) -> Vec<&Goal> {
        self.goals.iter().filter(|g| g.is_direct()).collect()
    }

    /// The very first goal of the progression.
    pub fn first_goal(&self) -> Option<&Goal> {
        self.goals.first()
    }

    /// The goal following `goal_id` in progression order.
    pub fn next_goal(&self, goal_id: GoalId) -> Option<&Goal> {
        let index = self.goals.iter().position(|g| g.id == goal_id)?;
        self.goals.get(index + 1)
    }

    /// Position of a goal.
    pub fn position_of(&self, goal_id: GoalId) -> Option<Position> {
        let goal = self.goal(goal_id)?;
        let stage = match goal.phase_id {
            Some(phase_id) => {
                let phase = self.phase(phase_id)?;
                Stage::Phase { order: phase.order_index, id: phase.id }
            }
            None => Stage::Direct,
        };
        Some(Position {
            stage,
            goal_order: goal.order_index,
            goal_id: goal.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::GoalType;
    use chrono::NaiveDate;

    fn challenge() -> Challenge {
        Challenge::new(
            "Gut Health",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    #[test]
    fn test_plan_orders_by_order_index_not_input_order() {
        let c = challenge();
        let late = Phase::new(c.id, "Late", 2, 100);
        let early = Phase::new(c.id, "Early", 1, 100);
        let g_late = Goal::in_phase(c.id, late.id, "late", GoalType::Checkin, 3, 0);
        let g_early_b = Goal::in_phase(c.id, early.id, "early b", GoalType::Checkin, 3, 5);
        let g_early_a = Goal::in_phase(c.id, early.id, "early a", GoalType::Checkin, 3, 1);
        let direct = Goal::direct(c.id, "direct", GoalType::Checkin, 3, 0);

        let plan = ChallengePlan::new(
            c,
            vec![late.clone(), early.clone()],
            vec![direct.clone(), g_late.clone(), g_early_b.clone(), g_early_a.clone()],
        );

        let order: Vec<GoalId> = plan.goals().iter().map(|g| g.id).collect();
        assert_eq!(order, vec![g_early_a.id, g_early_b.id, g_late.id, direct.id]);
        assert_eq!(plan.first_goal().map(|g| g.id), Some(g_early_a.id));
        assert_eq!(plan.next_goal(g_late.id).map(|g| g.id), Some(direct.id));
        assert!(plan.next_goal(direct.id).is_none());
    }

    #[test]
    fn test_positions_increase_along_the_plan() {
        let c = challenge();
        let p1 = Phase::new(c.id, "One", 0, 100);
        let p2 = Phase::new(c.id, "Two", 1, 100);
        let goals = vec![
            Goal::in_phase(c.id, p1.id, "a", GoalType::Checkin, 1, 9),
            Goal::in_phase(c.id, p2.id, "b", GoalType::Checkin, 1, 0),
            Goal::direct(c.id, "c", GoalType::Checkin, 1, 0),
        ];
        let plan = ChallengePlan::new(c, vec![p2, p1], goals);

        let positions: Vec<Position> = plan
            .goals()
            .iter()
            .filter_map(|g| plan.position_of(g.id))
            .collect();
        assert_eq!(positions.len(), 3);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_foreign_rows_are_ignored() {
        let c = challenge();
        let other = challenge();
        let foreign_phase = Phase::new(other.id, "Foreign", 0, 100);
        let orphan = Goal::in_phase(c.id, foreign_phase.id, "orphan", GoalType::Checkin, 1, 0);
        let plan = ChallengePlan::new(c, vec![foreign_phase], vec![orphan]);
        assert!(plan.phases().is_empty());
        assert!(plan.goals().is_empty());
    }
}
