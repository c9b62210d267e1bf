//! State abstraction: compresses a percept into a small hashable key so
//! that physically different grid positions with the same local pattern
//! share one learned value.

use crate::mdps::GridCell;
use crate::percepts::{Percept, NEIGHBORHOOD_SIZE};
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Classification alphabet for a cell as seen from the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CellClass {
    Goal,
    Hole,
    Normal,
    Obstacle,
    OffGrid,
}

impl CellClass {
    /// Total classification of a window slot; absent slots are off-grid.
    pub fn of(cell: Option<&GridCell>) -> Self {
        match cell {
            None => CellClass::OffGrid,
            Some(c) if c.is_goal() => CellClass::Goal,
            Some(c) if c.is_hole() => CellClass::Hole,
            Some(c) if c.is_normal() => CellClass::Normal,
            Some(_) => CellClass::Obstacle,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            CellClass::Goal => '+',
            CellClass::Hole => '-',
            CellClass::Normal => ' ',
            CellClass::Obstacle => 'O',
            CellClass::OffGrid => 'X',
        }
    }
}

impl fmt::Display for CellClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

/// A hashable learning key derived from a percept.
pub trait StateKey: Clone + Eq + Hash + fmt::Debug + fmt::Display {
    fn is_terminal(&self) -> bool;
}

/// Maps percepts to learning keys. Must be deterministic and total over
/// every reachable percept, including off-grid neighbors.
pub trait StateAbstraction {
    type State: StateKey;

    fn state_of(&self, percept: &Percept) -> Self::State;
}

/// The local-pattern key: the classification of the center cell and its
/// four cardinal neighbors.
///
/// Equality and hashing cover exactly the five classes — not coordinates,
/// not the terminal flag — so equivalent neighborhoods anywhere on the grid
/// collapse onto one table entry.
#[derive(Debug, Clone)]
pub struct LocalState {
    north: CellClass,
    east: CellClass,
    south: CellClass,
    west: CellClass,
    center: CellClass,
    terminal: bool,
}

impl PartialEq for LocalState {
    fn eq(&self, other: &Self) -> bool {
        self.north == other.north
            && self.east == other.east
            && self.south == other.south
            && self.west == other.west
            && self.center == other.center
    }
}

impl Eq for LocalState {}

impl Hash for LocalState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.north.hash(state);
        self.east.hash(state);
        self.south.hash(state);
        self.west.hash(state);
        self.center.hash(state);
    }
}

impl fmt::Display for LocalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.north, self.east, self.south, self.west, self.center
        )
    }
}

impl StateKey for LocalState {
    fn is_terminal(&self) -> bool {
        self.terminal
    }
}

/// Reference abstraction: classify the four cardinal neighbors and the
/// center. When the agent already stands on a non-normal cell, neighbor
/// detail no longer matters to the decision, so all four neighbor classes
/// collapse to the center class.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalAbstraction;

impl StateAbstraction for LocalAbstraction {
    type State = LocalState;

    fn state_of(&self, percept: &Percept) -> LocalState {
        let c = NEIGHBORHOOD_SIZE / 2;
        let nb = percept.neighborhood();
        let center = CellClass::of(Some(percept.current()));

        let (north, east, south, west) = if center != CellClass::Normal {
            (center, center, center, center)
        } else {
            (
                CellClass::of(nb[c - 1][c].as_ref()),
                CellClass::of(nb[c][c + 1].as_ref()),
                CellClass::of(nb[c + 1][c].as_ref()),
                CellClass::of(nb[c][c - 1].as_ref()),
            )
        };

        LocalState {
            north,
            east,
            south,
            west,
            center,
            terminal: percept.current().is_terminal(),
        }
    }
}
