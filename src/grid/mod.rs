//! Tabulated quantities and their approximators.
//!
//! - `Grid`: one N-dimensional table plus axes, metadata and approximator
//! - `Approximator`: the techniques configured for a grid
//! - `Approximation`: the evaluation trait every technique implements

pub mod approximator;
pub mod table;

pub use approximator::*;
pub use table::*;
