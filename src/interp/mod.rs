//! Interpolation over regular (possibly unevenly spaced) meshes.
//!
//! Evaluation is piecewise multilinear: each query point is located in its
//! mesh cell and blended from the `2^N` corners of that cell.

pub mod regular_grid;

pub use regular_grid::*;
