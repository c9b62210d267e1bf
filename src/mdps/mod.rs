pub mod grid_cell;
pub mod grid_world;
pub mod mdp;

pub use grid_cell::GridCell;
pub use mdp::Mdp;
