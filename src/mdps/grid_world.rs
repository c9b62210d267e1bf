//! Grid-world plumbing around the transition model: the cell naming scheme,
//! a random world generator emitting the textual description `Mdp::parse`
//! consumes, and a fixed-width renderer for per-cell stat overlays.

use crate::config::WorldConfig;
use crate::error::{Error, Result};
use crate::mdps::grid_cell::GridCell;
use crate::mdps::mdp::Mdp;
use rand::prelude::*;
use std::collections::HashMap;
use std::fmt::Write;

/// The four cardinal moves, in confusion-matrix order.
pub const ACTIONS: [&str; 4] = ["N", "E", "S", "W"];

/// Canonical name of the cell at `(row, col)`.
pub fn cell_name(row: usize, col: usize) -> String {
    format!("{row}_{col}")
}

/// Inverse of [`cell_name`]. `None` for names outside the scheme.
pub fn cell_coords(name: &str) -> Option<(i64, i64)> {
    let (row, col) = name.split_once('_')?;
    Some((row.parse().ok()?, col.parse().ok()?))
}

/// Row/column displacement of a cardinal action.
fn offset(action: &str) -> (i64, i64) {
    match action {
        "N" => (-1, 0),
        "E" => (0, 1),
        "S" => (1, 0),
        _ => (0, -1),
    }
}

/// Generates a random world description: one goal, `cfg.holes` holes,
/// `cfg.obstacles` penalty cells, a normal start cell, and one nominal
/// transition per non-terminal cell and action (moves into a wall stay
/// put). The same seed yields the same world.
pub fn random_world(cfg: &WorldConfig, seed: u64) -> Result<String> {
    let total = cfg.rows * cfg.cols;
    let specials = 1 + cfg.holes + cfg.obstacles;
    if specials + 1 > total {
        return Err(Error::InvalidModel(format!(
            "{}x{} grid cannot hold {specials} special cells and a start",
            cfg.rows, cfg.cols
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let picks = rand::seq::index::sample(&mut rng, total, specials);
    let goal = picks.index(0);
    let holes: Vec<_> = (0..cfg.holes).map(|i| picks.index(1 + i)).collect();
    let obstacles: Vec<_> = (0..cfg.obstacles)
        .map(|i| picks.index(1 + cfg.holes + i))
        .collect();

    let mut rewards = vec![0i64; total];
    let mut terminal = vec![false; total];
    rewards[goal] = cfg.goal_reward;
    terminal[goal] = true;
    for &h in &holes {
        rewards[h] = cfg.hole_penalty;
        terminal[h] = true;
    }
    for &o in &obstacles {
        rewards[o] = cfg.obstacle_penalty;
    }

    let normal: Vec<_> = (0..total)
        .filter(|i| !terminal[*i] && rewards[*i] == 0)
        .collect();
    let start = normal[rng.gen_range(0..normal.len())];

    let name = |i: usize| cell_name(i / cfg.cols, i % cfg.cols);

    let mut out = String::new();
    let w = &mut out;

    writeln!(w, "{total}").ok();
    for i in 0..total {
        writeln!(w, "{} {}", name(i), rewards[i]).ok();
    }
    writeln!(w, "{}", name(goal)).ok();
    for &h in &holes {
        writeln!(w, "{}", name(h)).ok();
    }

    let veer = (1.0 - cfg.straight_prob) / 2.0;
    writeln!(w, "{}", ACTIONS.len()).ok();
    for (i, action) in ACTIONS.iter().enumerate() {
        write!(w, "{action}").ok();
        for j in 0..ACTIONS.len() {
            let p = if j == i {
                cfg.straight_prob
            } else if (j + 2) % ACTIONS.len() == i {
                // No reversal.
                0.0
            } else {
                veer
            };
            write!(w, " {p}").ok();
        }
        writeln!(w).ok();
    }

    let movers: Vec<_> = (0..total).filter(|i| !terminal[*i]).collect();
    writeln!(w, "{}", movers.len() * ACTIONS.len()).ok();
    for &i in &movers {
        let (row, col) = (i / cfg.cols, i % cfg.cols);
        for action in ACTIONS {
            let (dr, dc) = offset(action);
            let (r, c) = (row as i64 + dr, col as i64 + dc);
            let target = if r >= 0 && r < cfg.rows as i64 && c >= 0 && c < cfg.cols as i64 {
                cell_name(r as usize, c as usize)
            } else {
                name(i)
            };
            writeln!(w, "{} {action} {target}", name(i)).ok();
        }
    }

    writeln!(w, "{}", cfg.discount).ok();
    writeln!(w, "{}", name(start)).ok();

    Ok(out)
}

fn glyph(cell: &GridCell) -> &'static str {
    if cell.is_goal() {
        "+"
    } else if cell.is_hole() {
        "-"
    } else if cell.is_normal() {
        "."
    } else {
        "O"
    }
}

/// Renders the model's grid with one bracketed entry per cell. Cells
/// present in `overlay` show that text, the rest their terrain glyph.
pub fn render(mdp: &Mdp, overlay: &HashMap<String, String>) -> String {
    let cells = mdp.states();
    let mut texts: HashMap<(i64, i64), String> = HashMap::new();
    let (mut max_r, mut max_c) = (0, 0);
    for cell in &cells {
        let Some((r, c)) = cell_coords(cell.name()) else {
            continue;
        };
        max_r = max_r.max(r);
        max_c = max_c.max(c);
        let text = overlay
            .get(cell.name())
            .cloned()
            .unwrap_or_else(|| glyph(cell).to_string());
        texts.insert((r, c), text);
    }

    let width = texts.values().map(|t| t.len()).max().unwrap_or(1);
    let mut out = String::new();
    for r in 0..=max_r {
        for c in 0..=max_c {
            let text = texts.get(&(r, c)).map(String::as_str).unwrap_or("?");
            write!(out, "[{text:>width$}]").ok();
        }
        out.push('\n');
    }
    out
}
