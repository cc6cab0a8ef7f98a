//! Per-cell-mode geometry profiles
//!
//! Each zone is programmed in one of two cell modes. The baseline mode is the
//! device's native high-density cell; the fast mode stores fewer bits per
//! cell, so a program unit covers a quarter of the logical pages and every
//! capacity aggregate shrinks accordingly.
//!
//! ```text
//!                    ┌──────────────────┐
//!                    │ base FlashGeometry│
//!                    └────────┬─────────┘
//!               to_fast_mode  │  to_baseline_mode
//!            ┌────────────────┴───────────────┐
//!            ▼                                ▼
//!   ┌────────────────┐               ┌────────────────┐
//!   │ Fast (SLC)     │               │ Baseline (QLC) │
//!   │ layout rebuilt │               │ layout copied  │
//!   │ fast latencies │               │ QLC latencies  │
//!   └────────────────┘               └────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::config::CellLatencyConfig;
use crate::error::{Error, Result};
use crate::ssd::{FlashGeometry, NandLatency};

/// Logical pages per program unit shrink by this factor in fast mode
pub const FAST_MODE_DENSITY_RATIO: u64 = 4;

/// Flash cell density mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CellMode {
    /// Low-density, low-latency (SLC)
    Fast,

    /// Native high-density (QLC)
    #[default]
    Baseline,
}

impl std::fmt::Display for CellMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellMode::Fast => write!(f, "SLC"),
            CellMode::Baseline => write!(f, "QLC"),
        }
    }
}

/// Geometry profile of one cell mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellGeometry {
    pub mode: CellMode,
    pub geometry: FlashGeometry,
}

impl CellGeometry {
    /// Fast-mode profile derived from `base`.
    pub fn to_fast_mode(base: &FlashGeometry, latency: &CellLatencyConfig) -> Result<Self> {
        let mut geometry = *base;
        let layout = &mut geometry.layout;

        layout.pages_per_oneshot = base.layout.pages_per_oneshot / FAST_MODE_DENSITY_RATIO;
        if layout.pages_per_oneshot == 0 {
            return Err(Error::Geometry(format!(
                "{} pages per program unit cannot be split for fast mode",
                base.layout.pages_per_oneshot
            )));
        }
        layout.flash_pages_per_block = base.layout.oneshots_per_block;
        layout.pages_per_block = layout.pages_per_oneshot * layout.oneshots_per_block;
        layout.recompute_sectors();
        layout.recompute_pages();

        geometry.nand = NandLatency {
            read_4kb_ns: latency.fast_read_latency_ns,
            read_ns: latency.fast_read_latency_ns,
            prog_ns: latency.fast_prog_latency_ns,
        };

        Ok(Self {
            mode: CellMode::Fast,
            geometry,
        })
    }

    /// Baseline-mode profile: `base` with the baseline latencies.
    pub fn to_baseline_mode(base: &FlashGeometry, latency: &CellLatencyConfig) -> Self {
        let geometry = FlashGeometry {
            nand: NandLatency {
                read_4kb_ns: latency.baseline_read_latency_ns,
                read_ns: latency.baseline_read_latency_ns,
                prog_ns: latency.baseline_prog_latency_ns,
            },
            ..*base
        };

        Self {
            mode: CellMode::Baseline,
            geometry,
        }
    }

    /// Erase blocks needed to hold `lbas` logical blocks in this mode.
    pub fn blocks_for_lbas(&self, lbas: u64) -> u64 {
        lbas.div_ceil(self.geometry.layout.secs_per_block)
    }
}

/// The two cell profiles of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellGeometrySet {
    fast: CellGeometry,
    baseline: CellGeometry,
}

impl CellGeometrySet {
    /// Derive both profiles from a finalized base geometry.
    pub fn derive(base: &FlashGeometry, latency: &CellLatencyConfig) -> Result<Self> {
        Ok(Self {
            fast: CellGeometry::to_fast_mode(base, latency)?,
            baseline: CellGeometry::to_baseline_mode(base, latency),
        })
    }

    pub fn get(&self, mode: CellMode) -> &CellGeometry {
        match mode {
            CellMode::Fast => &self.fast,
            CellMode::Baseline => &self.baseline,
        }
    }

    pub fn get_mut(&mut self, mode: CellMode) -> &mut CellGeometry {
        match mode {
            CellMode::Fast => &mut self.fast,
            CellMode::Baseline => &mut self.baseline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SsdConfig, GIB};

    fn base() -> FlashGeometry {
        FlashGeometry::from_config(&SsdConfig::default(), GIB, 1).unwrap()
    }

    #[test]
    fn test_fast_mode_quarters_program_unit() {
        let base = base();
        assert_eq!(base.layout.pages_per_oneshot, 32);

        let fast = CellGeometry::to_fast_mode(&base, &CellLatencyConfig::default()).unwrap();
        let l = fast.geometry.layout;

        assert_eq!(fast.mode, CellMode::Fast);
        assert_eq!(l.pages_per_oneshot, 8);
        assert_eq!(l.flash_pages_per_block, base.layout.oneshots_per_block);
        assert_eq!(l.pages_per_block, 8 * base.layout.oneshots_per_block);
        assert_eq!(l.secs_per_block, l.secs_per_page * l.pages_per_block);
        assert_eq!(l.total_secs, base.layout.total_secs / 4);
        assert_eq!(l.total_pages, base.layout.total_pages / 4);
        assert!(l.check_consistency().is_ok());
    }

    #[test]
    fn test_fast_mode_latencies() {
        let latency = CellLatencyConfig::default();
        let fast = CellGeometry::to_fast_mode(&base(), &latency).unwrap();

        assert_eq!(fast.geometry.nand.read_4kb_ns, latency.fast_read_latency_ns);
        assert_eq!(fast.geometry.nand.read_ns, latency.fast_read_latency_ns);
        assert_eq!(fast.geometry.nand.prog_ns, latency.fast_prog_latency_ns);
        // Firmware and link timing are not cell dependent
        assert_eq!(fast.geometry.firmware, base().firmware);
    }

    #[test]
    fn test_fast_mode_is_reproducible() {
        let base = base();
        let latency = CellLatencyConfig::default();
        let a = CellGeometry::to_fast_mode(&base, &latency).unwrap();
        let b = CellGeometry::to_fast_mode(&base, &latency).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fast_mode_rejects_tiny_program_unit() {
        let mut base = base();
        base.layout.pages_per_oneshot = 2;
        base.layout.pages_per_block = 2 * base.layout.oneshots_per_block;
        base.layout.recompute_aggregates();

        assert!(CellGeometry::to_fast_mode(&base, &CellLatencyConfig::default()).is_err());
    }

    #[test]
    fn test_baseline_mode_only_changes_latency() {
        let base = base();
        let latency = CellLatencyConfig::default();
        let baseline = CellGeometry::to_baseline_mode(&base, &latency);

        assert_eq!(baseline.mode, CellMode::Baseline);
        assert_eq!(baseline.geometry.layout, base.layout);
        assert_eq!(baseline.geometry.firmware, base.firmware);
        assert_eq!(baseline.geometry.erase_latency_ns, base.erase_latency_ns);
        assert_eq!(baseline.geometry.write_buffer_size, base.write_buffer_size);
        assert_ne!(baseline.geometry.nand, base.nand);
        assert_eq!(
            FlashGeometry {
                nand: base.nand,
                ..baseline.geometry
            },
            base
        );
    }

    #[test]
    fn test_profiles_are_independent() {
        let base = base();
        let mut set = CellGeometrySet::derive(&base, &CellLatencyConfig::default()).unwrap();
        let fast_before = *set.get(CellMode::Fast);

        set.get_mut(CellMode::Baseline).geometry.layout.channels = 1;
        set.get_mut(CellMode::Baseline).geometry.nand.prog_ns = 1;

        assert_eq!(*set.get(CellMode::Fast), fast_before);
        assert_eq!(base.layout.channels, 8);
        assert_eq!(set.get(CellMode::Baseline).geometry.layout.channels, 1);
    }

    #[test]
    fn test_blocks_for_lbas() {
        let set = CellGeometrySet::derive(&base(), &CellLatencyConfig::default()).unwrap();
        let baseline = set.get(CellMode::Baseline);
        let fast = set.get(CellMode::Fast);

        let zone_lbas = 128 * 1024 * 1024 / 512;
        assert_eq!(baseline.blocks_for_lbas(zone_lbas), 32);
        assert_eq!(fast.blocks_for_lbas(zone_lbas), 128);
    }

    #[test]
    fn test_cell_mode_display() {
        assert_eq!(CellMode::Fast.to_string(), "SLC");
        assert_eq!(CellMode::Baseline.to_string(), "QLC");
        assert_eq!(CellMode::default(), CellMode::Baseline);
    }
}
