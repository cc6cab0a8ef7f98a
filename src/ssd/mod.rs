//! Flash device geometry and timing
//!
//! [`FlashGeometry`] is the layout/timing profile of a NAND array as the
//! timing engine sees it. The structural part ([`FlashLayout`]) holds the
//! primary dimensions and every aggregate derived from them; the NAND
//! latencies of a cell mode live in [`NandLatency`] so that per-mode profiles
//! can override them without touching the structure.
//!
//! The timing engine itself is an external collaborator reached through
//! [`DeviceTimingEngine`] / [`DeviceTimingModel`]. [`SsdTimingEngine`] is a
//! reference implementation with one "next free" clock per LUN and channel.

mod geometry;
mod model;

pub use geometry::{FirmwareTiming, FlashGeometry, FlashLayout, NandLatency};
pub use model::{
    DeviceTimingEngine, DeviceTimingModel, MediaTarget, SsdTimingEngine, SsdTimingModel,
};
