//! Fire Simulation Post-Processing Library
//!
//! Decodes the raw binary output of a coupled fire/air-flow simulation
//! into dense numeric fields and derives run-level analytics from them.
//!
//! ## What lives here
//!
//! - Declarative input parsing (grids, time bases, ignition geometry,
//!   output flags, wind sensors)
//! - Sparse-index and snapshot decoding for both on-disk layouts
//! - Ignition-zone rasterization for every supported geometry
//! - Wind resampling onto the fire print-interval grid
//! - Rate-of-spread / burned-area analytics and peak-power aggregation
//!
//! [`pipeline::run`] ties it all together over a run directory.

pub mod config;
pub mod decode;
pub mod energy;
pub mod error;
pub mod field;
pub mod grid;
pub mod ignition;
pub mod index;
pub mod pipeline;
mod raw;
pub mod spread;
pub mod wind;

// Re-export the types most callers touch
pub use config::{FireInputs, OutputFlags, PipelineOptions, SimParams};
pub use decode::{Layout, SnapshotDecoder};
pub use error::{PostError, Result};
pub use field::DenseField;
pub use grid::{FireGrid, GridShape, TimeBase};
pub use ignition::{IgnitionMask, IgnitionPoint, IgnitionSpec, MaskBounds};
pub use index::{GridIndex, VerticalGrid};
pub use pipeline::PipelineOutputs;
pub use spread::{SpreadDirection, SpreadRecord, SpreadSummary};
pub use wind::{WindSample, WindStep};
