//! Domain types shared by the approximation engine.
//!
//! This module defines:
//!
//! - the closed technique registry (`Technique`, `TechniqueFamily`)
//! - axis descriptors (`AxisRange`)
//! - the typed view of a grid's merged configuration (`GridConfig`)
//! - build-time policies (`BuildOptions`, `ShapePolicy`, `UnavailablePolicy`)

pub mod types;

pub use types::*;
