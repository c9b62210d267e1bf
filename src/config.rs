//! Tunable parameters for the learner and the random world generator.

use serde::{Deserialize, Serialize};

/// Knobs for the Q-learner's exploration behavior.
///
/// Both values materially change how aggressively under-visited state-action
/// pairs are preferred over known-good ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Visit threshold `Ne`: pairs tried fewer than this many times always
    /// look optimal to the exploration function.
    pub min_visits: u64,
    /// Optimistic value `R+` returned for under-visited pairs. Must be at
    /// least as large as any achievable return.
    pub optimism: f64,
    /// Seed for the learner's tie-breaking RNG.
    pub seed: u64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            min_visits: 100,
            optimism: f64::INFINITY,
            seed: 1,
        }
    }
}

/// Shape and reward structure of a generated grid world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    pub rows: usize,
    pub cols: usize,
    /// Number of non-terminal penalty cells.
    pub obstacles: usize,
    /// Reward of a penalty cell (expected negative).
    pub obstacle_penalty: i64,
    /// Number of terminal losing cells.
    pub holes: usize,
    /// Reward of a losing cell (expected negative).
    pub hole_penalty: i64,
    /// Reward of the single terminal goal cell.
    pub goal_reward: i64,
    /// Probability that the requested move executes as requested; the
    /// remainder splits evenly between the two perpendicular moves.
    pub straight_prob: f64,
    /// Discount factor, in (0, 1].
    pub discount: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            rows: 10,
            cols: 10,
            obstacles: 0,
            obstacle_penalty: -5,
            holes: 2,
            hole_penalty: -10,
            goal_reward: 10,
            straight_prob: 0.8,
            discount: 0.95,
        }
    }
}
