//! The episode loop: repeatedly exchanges percepts for actions until the
//! agent reaches a terminal cell.

use crate::error::Result;
use crate::mdps::Mdp;
use crate::percepts::Percept;
use tracing::debug;

/// Anything that can pick an action from a percept. Returning `None` means
/// the player has no move to make (a learner does this on terminal states).
pub trait Player {
    fn play(&mut self, percept: &Percept) -> Option<String>;
}

/// One episode of a player exploring the grid world.
pub struct Game<'a, P: Player> {
    mdp: &'a mut Mdp,
    player: &'a mut P,
}

impl<'a, P: Player> Game<'a, P> {
    pub fn new(mdp: &'a mut Mdp, player: &'a mut P) -> Self {
        Self { mdp, player }
    }

    /// Runs until a terminal cell is reached and returns the discounted
    /// score. Illegal or absent actions cause no state change; the player
    /// is simply asked again with a fresh percept.
    pub fn play(&mut self) -> Result<f64> {
        let mut current = self.mdp.current_cell();
        let mut score = current.reward();
        let mut t = 1;
        loop {
            let action = self.player.play(&Percept::new(self.mdp, &current, score));
            if self.mdp.current_cell().is_terminal() {
                break;
            }
            let Some(action) = action else {
                continue;
            };
            if !self.mdp.actions().iter().any(|a| *a == action) {
                continue;
            }

            self.mdp.take_action(&action)?;
            current = self.mdp.current_cell();
            score += self.mdp.gamma().powi(t) * current.reward();
            t += 1;
        }

        debug!(score, turns = t, "episode finished");
        Ok(score)
    }
}
