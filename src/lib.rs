pub mod algos;
pub mod config;
pub mod error;
pub mod games;
pub mod mdps;
pub mod percepts;
pub mod states;

pub use error::{Error, Result};
