//! The per-turn observation handed to a player.

use crate::mdps::{grid_world, GridCell, Mdp};

/// Side length of the square window of cells visible around the agent.
pub const NEIGHBORHOOD_SIZE: usize = 5;

type Window = [[Option<GridCell>; NEIGHBORHOOD_SIZE]; NEIGHBORHOOD_SIZE];

/// A read-only snapshot of one turn: the local window of cells, the legal
/// actions, the discount factor, and the score accumulated so far. Built
/// fresh every turn and consumed immediately; never persisted.
pub struct Percept {
    neighborhood: Window,
    current: GridCell,
    actions: Vec<String>,
    gamma: f64,
    score: f64,
}

impl Percept {
    /// Snapshot of the model as seen from `current`. Window positions whose
    /// coordinates fall outside the grid are `None`.
    pub fn new(mdp: &Mdp, current: &GridCell, score: f64) -> Self {
        let center = NEIGHBORHOOD_SIZE / 2;
        let mut neighborhood: Window = Default::default();
        if let Some((row, col)) = grid_world::cell_coords(current.name()) {
            for (i, window_row) in neighborhood.iter_mut().enumerate() {
                for (j, slot) in window_row.iter_mut().enumerate() {
                    let r = row - center as i64 + i as i64;
                    let c = col - center as i64 + j as i64;
                    if r >= 0 && c >= 0 {
                        *slot = mdp.cell(&grid_world::cell_name(r as usize, c as usize));
                    }
                }
            }
        }
        neighborhood[center][center] = Some(current.clone());

        Self {
            neighborhood,
            current: current.clone(),
            actions: mdp.actions(),
            gamma: mdp.gamma(),
            score,
        }
    }

    /// Builds a percept directly from its pieces. The window center is
    /// always the given cell, whatever the caller put there.
    pub fn from_parts(
        current: GridCell,
        mut neighborhood: Window,
        actions: Vec<String>,
        gamma: f64,
        score: f64,
    ) -> Self {
        let center = NEIGHBORHOOD_SIZE / 2;
        neighborhood[center][center] = Some(current.clone());
        Self {
            neighborhood,
            current,
            actions,
            gamma,
            score,
        }
    }

    pub fn neighborhood(&self) -> &Window {
        &self.neighborhood
    }

    /// The cell the agent stands on.
    pub fn current(&self) -> &GridCell {
        &self.current
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}
