use serde::Serialize;
use std::hash::{Hash, Hasher};

/// One cell of the grid world.
///
/// Identity is the name alone: reward and terminal-ness are attributes and
/// take no part in equality or hashing, so a cell can be looked up by a
/// name-only probe.
#[derive(Debug, Clone, Serialize)]
pub struct GridCell {
    name: String,
    reward: f64,
    terminal: bool,
}

impl GridCell {
    pub fn new(name: &str, reward: f64) -> Self {
        Self {
            name: name.to_string(),
            reward,
            terminal: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reward(&self) -> f64 {
        self.reward
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// A winning terminal cell.
    pub fn is_goal(&self) -> bool {
        self.terminal && self.reward > 0.0
    }

    /// A losing terminal cell.
    pub fn is_hole(&self) -> bool {
        self.terminal && self.reward < 0.0
    }

    /// A plain traversable cell with no reward of its own.
    pub fn is_normal(&self) -> bool {
        !self.terminal && self.reward == 0.0
    }

    /// Flagged once while the model is being built, never afterwards.
    pub(crate) fn mark_terminal(&mut self) {
        self.terminal = true;
    }
}

impl PartialEq for GridCell {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for GridCell {}

impl Hash for GridCell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_by_name_only() {
        let a = GridCell::new("3_4", 10.0);
        let mut b = GridCell::new("3_4", -1.0);
        b.mark_terminal();
        assert_eq!(a, b);

        let c = GridCell::new("3_5", 10.0);
        assert_ne!(a, c);
    }

    #[test]
    fn classification() {
        let mut goal = GridCell::new("g", 10.0);
        goal.mark_terminal();
        assert!(goal.is_goal() && !goal.is_hole() && !goal.is_normal());

        let mut hole = GridCell::new("h", -10.0);
        hole.mark_terminal();
        assert!(hole.is_hole() && !hole.is_goal());

        let normal = GridCell::new("n", 0.0);
        assert!(normal.is_normal());

        // Non-terminal penalty cells are neither normal nor terminal.
        let obstacle = GridCell::new("o", -5.0);
        assert!(!obstacle.is_normal() && !obstacle.is_terminal());
    }
}
