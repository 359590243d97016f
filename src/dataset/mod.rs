//! Label-indexed collections of grids.
//!
//! A `DataSet` is assembled from three label-indexed sources (arrays, global
//! configuration, local configuration). Only labels present in all three are
//! built; the others are reported once as dropped.

pub mod assembly;

pub use assembly::*;
