//! Input/output helpers.
//!
//! - dataset container read/write (`container`)

pub mod container;

pub use container::*;
