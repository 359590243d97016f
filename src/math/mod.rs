//! Dense linear algebra helpers.

pub mod ols;

pub use ols::*;
