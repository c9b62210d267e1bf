use crate::error::{Error, Result};
use crate::mdps::grid_cell::GridCell;
use rand::prelude::*;
use std::iter::Peekable;
use std::str::SplitWhitespace;
use tracing::debug;

/// Tolerance for row-stochasticity checks on the confusion matrix and the
/// derived transition tensor.
const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// A Markov decision process over named grid cells.
///
/// Owns the cells, the action set, the transition tensor
/// `trans_probs[s][a][s']` derived from nominal transitions convolved with
/// the action-confusion matrix, and the agent's current cell. Successor
/// sampling is driven by an RNG seeded at construction, so runs are
/// reproducible. Every getter hands out a copy; internal state is never
/// exposed by reference.
pub struct Mdp {
    states: Vec<GridCell>,
    actions: Vec<String>,
    trans_probs: Vec<Vec<Vec<f64>>>,
    action_confusion: Vec<Vec<f64>>,
    gamma: f64,
    start: usize,
    current: usize,
    rng: StdRng,
}

impl Mdp {
    /// Builds a model from a whitespace-separated world description:
    ///
    /// ```text
    /// <numStates>
    /// (<cellName> <rewardInt>) x numStates
    /// <terminalCellName>...            until the next token is an integer
    /// <numActions>
    /// (<actionName> <confusionRow>) x numActions
    /// <numTransitions>
    /// (<fromName> <actionName> <toName>) x numTransitions
    /// <discount>
    /// <startCellName>
    /// ```
    ///
    /// Any malformed, duplicate, or unknown entry aborts construction.
    pub fn parse(text: &str, seed: u64) -> Result<Self> {
        let mut tokens = Tokens::new(text);

        let (states, n_terminal) = Self::read_states(&mut tokens)?;
        let (actions, action_confusion) = Self::read_actions(&mut tokens)?;
        let trans_probs =
            Self::read_transitions(&mut tokens, &states, &actions, &action_confusion)?;

        let gamma = tokens.next_f64("discount")?;
        if !(gamma > 0.0 && gamma <= 1.0) {
            return Err(Error::InvalidModel(format!(
                "discount {gamma} outside (0, 1]"
            )));
        }

        let start_name = tokens.next("start cell name")?;
        let start = index_of(&states, start_name)
            .ok_or_else(|| Error::InvalidModel(format!("unknown start cell '{start_name}'")))?;

        if let Some(extra) = tokens.try_next() {
            return Err(Error::InvalidModel(format!(
                "unexpected trailing token '{extra}'"
            )));
        }

        let mdp = Self {
            states,
            actions,
            trans_probs,
            action_confusion,
            gamma,
            start,
            current: start,
            rng: StdRng::seed_from_u64(seed),
        };
        mdp.check_row_stochastic()?;

        debug!(
            states = mdp.states.len(),
            terminals = n_terminal,
            actions = mdp.actions.len(),
            gamma = mdp.gamma,
            "model built"
        );
        Ok(mdp)
    }

    fn read_states(tokens: &mut Tokens<'_>) -> Result<(Vec<GridCell>, usize)> {
        let n_states = tokens.next_usize("state count")?;
        if n_states == 0 {
            return Err(Error::InvalidModel("state count is zero".to_string()));
        }

        let mut states = Vec::with_capacity(n_states);
        for _ in 0..n_states {
            let name = tokens.next("cell name")?;
            let reward = tokens.next_i64(&format!("reward of cell '{name}'"))?;
            if index_of(&states, name).is_some() {
                return Err(Error::InvalidModel(format!("duplicate cell '{name}'")));
            }
            states.push(GridCell::new(name, reward as f64));
        }

        // Terminal cell names run until the next token parses as an integer
        // (the action count).
        let mut n_terminal = 0;
        while !tokens.peek_is_int() {
            let name = tokens.next("terminal cell name")?;
            let i = index_of(&states, name)
                .ok_or_else(|| Error::InvalidModel(format!("unknown terminal cell '{name}'")))?;
            states[i].mark_terminal();
            n_terminal += 1;
        }

        Ok((states, n_terminal))
    }

    fn read_actions(tokens: &mut Tokens<'_>) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
        let n_actions = tokens.next_usize("action count")?;
        if n_actions == 0 {
            return Err(Error::InvalidModel("action count is zero".to_string()));
        }

        let mut actions: Vec<String> = Vec::with_capacity(n_actions);
        let mut confusion = Vec::with_capacity(n_actions);
        for _ in 0..n_actions {
            let name = tokens.next("action name")?.to_string();
            if actions.contains(&name) {
                return Err(Error::InvalidModel(format!("duplicate action '{name}'")));
            }

            let mut row = Vec::with_capacity(n_actions);
            for j in 0..n_actions {
                let p = tokens.next_f64(&format!("confusion[{name}][{j}]"))?;
                if !(0.0..=1.0).contains(&p) {
                    return Err(Error::InvalidModel(format!(
                        "confusion probability {p} for action '{name}' outside [0, 1]"
                    )));
                }
                row.push(p);
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(Error::InvalidModel(format!(
                    "confusion row for action '{name}' sums to {sum}, expected 1"
                )));
            }

            actions.push(name);
            confusion.push(row);
        }

        Ok((actions, confusion))
    }

    fn read_transitions(
        tokens: &mut Tokens<'_>,
        states: &[GridCell],
        actions: &[String],
        confusion: &[Vec<f64>],
    ) -> Result<Vec<Vec<Vec<f64>>>> {
        let mut probs = vec![vec![vec![0.0; states.len()]; actions.len()]; states.len()];

        let n_transitions = tokens.next_usize("transition count")?;
        for _ in 0..n_transitions {
            let from = tokens.next("transition source")?;
            let action = tokens.next("transition action")?;
            let to = tokens.next("transition target")?;

            let s0 = index_of(states, from)
                .ok_or_else(|| Error::InvalidModel(format!("unknown cell '{from}'")))?;
            let s1 = index_of(states, to)
                .ok_or_else(|| Error::InvalidModel(format!("unknown cell '{to}'")))?;
            let a = actions
                .iter()
                .position(|x| x == action)
                .ok_or_else(|| Error::InvalidModel(format!("unknown action '{action}'")))?;

            // The nominal outcome of `action` is reached from `s0` under any
            // requested action `j` with the confusion mass `confusion[j][a]`.
            for (j, row) in confusion.iter().enumerate() {
                probs[s0][j][s1] += row[a];
            }
        }

        Ok(probs)
    }

    /// Every `(s, a)` row must sum to 1, except rows with no declared
    /// outgoing transitions at all (terminal cells), which stay zero.
    fn check_row_stochastic(&self) -> Result<()> {
        for (s, per_action) in self.trans_probs.iter().enumerate() {
            for (a, row) in per_action.iter().enumerate() {
                let sum: f64 = row.iter().sum();
                if sum.abs() > ROW_SUM_TOLERANCE && (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                    return Err(Error::InvalidModel(format!(
                        "transitions out of '{}' for action '{}' sum to {sum}, expected 1",
                        self.states[s].name(),
                        self.actions[a]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Copy of the agent's current cell.
    pub fn current_cell(&self) -> GridCell {
        self.states[self.current].clone()
    }

    /// Copies of all cells, in enumeration order.
    pub fn states(&self) -> Vec<GridCell> {
        self.states.clone()
    }

    /// Copy of the action set.
    pub fn actions(&self) -> Vec<String> {
        self.actions.clone()
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Copy of the cell with the given name, if the model contains it.
    pub fn cell(&self, name: &str) -> Option<GridCell> {
        index_of(&self.states, name).map(|i| self.states[i].clone())
    }

    /// Moves the agent to the named cell, e.g. to restart an episode.
    pub fn set_current(&mut self, name: &str) -> Result<()> {
        self.current = index_of(&self.states, name)
            .ok_or_else(|| Error::UnknownState(name.to_string()))?;
        Ok(())
    }

    /// Moves the agent back to the start cell of the world description.
    pub fn reset(&mut self) {
        self.current = self.start;
    }

    /// Advances the agent by sampling a successor of the current cell under
    /// `action`: draw `r ~ U(0,1)` and walk the successors in enumeration
    /// order until the cumulative probability reaches `r`. If floating
    /// error leaves the row short of 1, the last cell is the catch-all.
    pub fn take_action(&mut self, action: &str) -> Result<()> {
        let a = self.action_index(action)?;

        let r: f64 = self.rng.gen();
        let row = &self.trans_probs[self.current][a];
        let mut next = self.states.len() - 1;
        let mut sum = 0.0;
        for (i, p) in row.iter().enumerate() {
            sum += p;
            if sum >= r {
                next = i;
                break;
            }
        }

        debug!(
            from = self.states[self.current].name(),
            action,
            to = self.states[next].name(),
            "transition"
        );
        self.current = next;
        Ok(())
    }

    /// Returns `P(s2 | s1, a)`. Pure lookup; unknown names are rejected
    /// rather than defaulted, so configuration bugs surface immediately.
    pub fn trans_prob(&self, s1: &str, a: &str, s2: &str) -> Result<f64> {
        let s1 = index_of(&self.states, s1).ok_or_else(|| Error::UnknownState(s1.to_string()))?;
        let s2 = index_of(&self.states, s2).ok_or_else(|| Error::UnknownState(s2.to_string()))?;
        let a = self.action_index(a)?;
        Ok(self.trans_probs[s1][a][s2])
    }

    /// The confusion mass `P(effective a' | requested a)`.
    pub fn confusion(&self, requested: &str, effective: &str) -> Result<f64> {
        let r = self.action_index(requested)?;
        let e = self.action_index(effective)?;
        Ok(self.action_confusion[r][e])
    }

    fn action_index(&self, action: &str) -> Result<usize> {
        self.actions
            .iter()
            .position(|a| a == action)
            .ok_or_else(|| Error::UnknownAction(action.to_string()))
    }
}

fn index_of(states: &[GridCell], name: &str) -> Option<usize> {
    states.iter().position(|s| s.name() == name)
}

/// Cursor over the whitespace-separated world description.
struct Tokens<'a> {
    iter: Peekable<SplitWhitespace<'a>>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            iter: text.split_whitespace().peekable(),
        }
    }

    fn next(&mut self, what: &str) -> Result<&'a str> {
        self.iter
            .next()
            .ok_or_else(|| Error::InvalidModel(format!("missing {what}")))
    }

    fn try_next(&mut self) -> Option<&'a str> {
        self.iter.next()
    }

    fn peek_is_int(&mut self) -> bool {
        match self.iter.peek() {
            Some(tok) => tok.parse::<i64>().is_ok(),
            // Running out of tokens mid-list surfaces as a missing-token
            // error on the following read.
            None => true,
        }
    }

    fn next_usize(&mut self, what: &str) -> Result<usize> {
        let tok = self.next(what)?;
        tok.parse()
            .map_err(|_| Error::InvalidModel(format!("{what}: '{tok}' is not a count")))
    }

    fn next_i64(&mut self, what: &str) -> Result<i64> {
        let tok = self.next(what)?;
        tok.parse()
            .map_err(|_| Error::InvalidModel(format!("{what}: '{tok}' is not an integer")))
    }

    fn next_f64(&mut self, what: &str) -> Result<f64> {
        let tok = self.next(what)?;
        tok.parse()
            .map_err(|_| Error::InvalidModel(format!("{what}: '{tok}' is not a number")))
    }
}
