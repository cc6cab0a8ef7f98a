//! Zone descriptors and the zone table
//!
//! # Zone Layout
//!
//! ```text
//!  LBA 0                                                        nr_zones * zone_lbas
//!  ├──────────────┬──────────────┬──────────────┬─────┬──────────────┤
//!  │    Zone 0    │    Zone 1    │    Zone 2    │ ... │  Zone N-1    │
//!  │ WP: start    │ WP: start    │ WP: start    │     │ WP: start    │
//!  └──────────────┴──────────────┴──────────────┴─────┴──────────────┘
//! ```
//!
//! Zones are contiguous and never overlap: zone `i` starts at
//! `i * zone_lbas`. Every descriptor sits behind its own lock, so handlers
//! working on different zones never contend.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cell::CellMode;
use super::params::ZoneParams;
use crate::error::{Error, Result};

/// Size of the zone report header in bytes
pub const ZONE_REPORT_HEADER_SIZE: usize = 64;

/// Size of one zone descriptor in a zone report
pub const ZONE_DESCRIPTOR_SIZE: usize = 64;

// =============================================================================
// Zone Types
// =============================================================================

/// State of a zone, with the NVMe ZNS encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ZoneState {
    #[default]
    Empty = 0x1,
    ImplicitOpen = 0x2,
    ExplicitOpen = 0x3,
    Closed = 0x4,
    ReadOnly = 0xD,
    Full = 0xE,
    Offline = 0xF,
}

impl std::fmt::Display for ZoneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneState::Empty => write!(f, "Empty"),
            ZoneState::ImplicitOpen => write!(f, "Implicitly Open"),
            ZoneState::ExplicitOpen => write!(f, "Explicitly Open"),
            ZoneState::Closed => write!(f, "Closed"),
            ZoneState::ReadOnly => write!(f, "Read Only"),
            ZoneState::Full => write!(f, "Full"),
            ZoneState::Offline => write!(f, "Offline"),
        }
    }
}

impl ZoneState {
    /// Zone holds an active resource (open or closed).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ZoneState::ImplicitOpen | ZoneState::ExplicitOpen | ZoneState::Closed
        )
    }

    /// Zone holds an open resource.
    pub fn is_open(&self) -> bool {
        matches!(self, ZoneState::ImplicitOpen | ZoneState::ExplicitOpen)
    }

    /// Check if writes are allowed in this state.
    pub fn can_write(&self) -> bool {
        matches!(
            self,
            ZoneState::Empty | ZoneState::ImplicitOpen | ZoneState::ExplicitOpen | ZoneState::Closed
        )
    }
}

/// Zone type. Only sequential-write-required zones exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ZoneType {
    #[default]
    SequentialWriteRequired = 0x2,
}

/// Descriptor of a single zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDescriptor {
    pub state: ZoneState,
    pub zone_type: ZoneType,
    start_lba: u64,
    write_pointer: u64,
    capacity_in_lbas: u64,
    pub cell_mode: CellMode,
}

impl ZoneDescriptor {
    /// Fresh, empty descriptor for zone `index`.
    pub fn new(index: u32, zone_lbas: u64) -> Self {
        let start_lba = u64::from(index) * zone_lbas;
        Self {
            state: ZoneState::Empty,
            zone_type: ZoneType::SequentialWriteRequired,
            start_lba,
            write_pointer: start_lba,
            capacity_in_lbas: zone_lbas,
            cell_mode: CellMode::Baseline,
        }
    }

    pub fn start_lba(&self) -> u64 {
        self.start_lba
    }

    pub fn capacity_in_lbas(&self) -> u64 {
        self.capacity_in_lbas
    }

    pub fn write_pointer(&self) -> u64 {
        self.write_pointer
    }

    /// Move the write pointer. It must stay within `[start_lba, end_lba]`.
    pub fn set_write_pointer(&mut self, wp: u64) -> Result<()> {
        if wp < self.start_lba || wp > self.end_lba() {
            return Err(Error::WritePointerOutOfRange {
                zone: self.index(),
                wp,
                start: self.start_lba,
                end: self.end_lba(),
            });
        }
        self.write_pointer = wp;
        Ok(())
    }

    /// First LBA past the zone.
    pub fn end_lba(&self) -> u64 {
        self.start_lba + self.capacity_in_lbas
    }

    /// Zone index derived from the start LBA.
    pub fn index(&self) -> u32 {
        (self.start_lba / self.capacity_in_lbas.max(1)) as u32
    }

    pub fn remaining_lbas(&self) -> u64 {
        self.end_lba() - self.write_pointer
    }

    pub fn contains(&self, lba: u64) -> bool {
        lba >= self.start_lba && lba < self.end_lba()
    }

    /// Return the zone to its freshly created condition.
    pub fn reset(&mut self) {
        self.state = ZoneState::Empty;
        self.write_pointer = self.start_lba;
    }
}

// =============================================================================
// Zone Report
// =============================================================================

/// Report buffer filled by zone-management-receive.
///
/// Sized at creation for a header plus one descriptor per zone; it never
/// grows beyond that.
#[derive(Debug, Clone)]
pub struct ZoneReport {
    descriptors: Vec<ZoneDescriptor>,
    capacity: usize,
}

impl ZoneReport {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            descriptors: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn clear(&mut self) {
        self.descriptors.clear();
    }

    /// Append a descriptor copy.
    pub fn push(&mut self, descriptor: ZoneDescriptor) -> Result<()> {
        if self.descriptors.len() >= self.capacity {
            return Err(Error::Internal(format!(
                "zone report is full ({} descriptors)",
                self.capacity
            )));
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Zone count written to the report header.
    pub fn nr_zones(&self) -> u64 {
        self.descriptors.len() as u64
    }

    pub fn descriptors(&self) -> &[ZoneDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of a full report in the NVMe wire layout.
    pub fn size_in_bytes(&self) -> usize {
        ZONE_REPORT_HEADER_SIZE + ZONE_DESCRIPTOR_SIZE * self.capacity
    }
}

// =============================================================================
// Zone Table
// =============================================================================

/// All zone descriptors of a namespace plus its report buffer.
#[derive(Debug)]
pub struct ZoneTable {
    zones: Vec<Mutex<ZoneDescriptor>>,
    report: Mutex<ZoneReport>,
    zone_lbas: u64,
}

impl ZoneTable {
    /// Build `params.nr_zones` empty zones in index order.
    pub fn new(params: &ZoneParams) -> Self {
        let nr_zones = params.nr_zones;
        let zone_lbas = params.lbas_per_zone;

        let zones = (0..nr_zones)
            .map(|i| {
                let zone = ZoneDescriptor::new(i, zone_lbas);
                debug!(
                    "[{}] zslba {:#x} zone capacity {:#x}, wp {:#x}",
                    i,
                    zone.start_lba(),
                    zone.capacity_in_lbas(),
                    zone.write_pointer()
                );
                Mutex::new(zone)
            })
            .collect();

        Self {
            zones,
            report: Mutex::new(ZoneReport::with_capacity(nr_zones as usize)),
            zone_lbas,
        }
    }

    pub fn len(&self) -> u32 {
        self.zones.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zone_lbas(&self) -> u64 {
        self.zone_lbas
    }

    /// Lock one zone's descriptor.
    pub fn lock(&self, zone: u32) -> Result<MutexGuard<'_, ZoneDescriptor>> {
        self.zones
            .get(zone as usize)
            .map(|z| z.lock())
            .ok_or(Error::ZoneOutOfRange {
                zone,
                nr_zones: self.len(),
            })
    }

    /// Copy of one zone's descriptor.
    pub fn get(&self, zone: u32) -> Result<ZoneDescriptor> {
        self.lock(zone).map(|z| *z)
    }

    /// Copies of all descriptors in index order.
    pub fn snapshot(&self) -> Vec<ZoneDescriptor> {
        self.zones.iter().map(|z| *z.lock()).collect()
    }

    /// Zone that contains `lba`.
    pub fn zone_of(&self, lba: u64) -> Option<u32> {
        let zone = lba / self.zone_lbas;
        (zone < u64::from(self.len())).then_some(zone as u32)
    }

    /// Lock the report buffer.
    pub fn report(&self) -> MutexGuard<'_, ZoneReport> {
        self.report.lock()
    }
}
