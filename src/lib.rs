//! `grid-approx` library crate.
//!
//! Approximates quantities tabulated over regular N-dimensional meshes by
//! multilinear interpolation (`rgi`) or a stored closed-form formula (`eqn`).
//!
//! The binary (`gridx`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - datasets can be queried from other Rust code directly

pub mod app;
pub mod cli;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod expr;
pub mod grid;
pub mod interp;
pub mod io;
pub mod math;
pub mod regression;
pub mod report;

pub use dataset::DataSet;
pub use domain::{BuildOptions, Technique};
pub use error::GridError;
pub use grid::{Approximation, Grid};
