//! Zoned Namespace FTL state
//!
//! Everything a namespace partition keeps about its zones:
//!
//! ```text
//! ┌──────────────────────────── FtlState ────────────────────────────┐
//! │ ZoneParams   sizes and limits, fixed at creation                 │
//! │ ZoneTable    one descriptor per zone + a zone report buffer      │
//! │ ZoneBufferSet (ZRWA)          optional, one per zone             │
//! │ ZoneBufferSet (write buffer)  optional, one per zone             │
//! │ ResourcePool Active / Open / ZRWA counters                       │
//! │ CellGeometrySet  Fast (SLC) and Baseline (QLC) profiles          │
//! │ timing model + storage mapping                                   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Zone descriptors and buffers are locked per zone; there is no
//! partition-wide lock on the I/O path.

pub mod buffer;
pub mod cell;
pub mod ftl;
pub mod params;
pub mod resource;
pub mod zone;

#[cfg(test)]
mod proptest;

pub use buffer::{ZoneBuffer, ZoneBufferSet};
pub use cell::{CellGeometry, CellGeometrySet, CellMode, FAST_MODE_DENSITY_RATIO};
pub use ftl::FtlState;
pub use params::ZoneParams;
pub use resource::{ResourceKind, ResourcePool, ResourceUsage};
pub use zone::{
    ZoneDescriptor, ZoneReport, ZoneState, ZoneTable, ZoneType, ZONE_DESCRIPTOR_SIZE,
    ZONE_REPORT_HEADER_SIZE,
};
