//! Zone resource quotas
//!
//! NVMe ZNS limits how many zones may be active, open and write-accelerated
//! at the same time. The pool only counts; the zone-management handlers
//! decide when a zone takes or gives back a resource and must keep
//! `Active ⊇ Open ⊇ WriteAccelerated`.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::nvme::StatusCode;

/// Resource class of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Active,
    Open,
    /// Zone with a ZRWA attached
    WriteAccelerated,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Active,
        ResourceKind::Open,
        ResourceKind::WriteAccelerated,
    ];

    fn index(self) -> usize {
        match self {
            ResourceKind::Active => 0,
            ResourceKind::Open => 1,
            ResourceKind::WriteAccelerated => 2,
        }
    }

    /// Status a handler reports when this resource is exhausted.
    pub fn exhausted_status(self) -> StatusCode {
        match self {
            ResourceKind::Active => StatusCode::ZONE_TOO_MANY_ACTIVE,
            ResourceKind::Open | ResourceKind::WriteAccelerated => StatusCode::ZONE_TOO_MANY_OPEN,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Active => write!(f, "Active"),
            ResourceKind::Open => write!(f, "Open"),
            ResourceKind::WriteAccelerated => write!(f, "ZRWA"),
        }
    }
}

#[derive(Debug)]
struct ResourceInfo {
    total: u32,
    acquired: AtomicU32,
}

impl ResourceInfo {
    fn new(total: u32) -> Self {
        Self {
            total,
            acquired: AtomicU32::new(0),
        }
    }
}

/// Counts for one resource kind at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub kind: ResourceKind,
    pub total: u32,
    pub acquired: u32,
}

/// Three independent counters, one per [`ResourceKind`].
#[derive(Debug)]
pub struct ResourcePool {
    infos: [ResourceInfo; 3],
}

impl ResourcePool {
    /// Pool where every kind may cover all `nr_zones` zones.
    pub fn new(nr_zones: u32) -> Self {
        Self::with_limits(nr_zones, nr_zones, nr_zones)
    }

    pub fn with_limits(active: u32, open: u32, write_accelerated: u32) -> Self {
        Self {
            infos: [
                ResourceInfo::new(active),
                ResourceInfo::new(open),
                ResourceInfo::new(write_accelerated),
            ],
        }
    }

    fn info(&self, kind: ResourceKind) -> &ResourceInfo {
        &self.infos[kind.index()]
    }

    /// Take one resource of `kind`.
    pub fn acquire(&self, kind: ResourceKind) -> Result<()> {
        let info = self.info(kind);
        info.acquired
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < info.total).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| Error::ResourceExhausted {
                kind,
                total: info.total,
            })
    }

    /// Return one resource of `kind`.
    pub fn release(&self, kind: ResourceKind) -> Result<()> {
        self.info(kind)
            .acquired
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| Error::ResourceUnderflow { kind })
    }

    pub fn total(&self, kind: ResourceKind) -> u32 {
        self.info(kind).total
    }

    pub fn acquired(&self, kind: ResourceKind) -> u32 {
        self.info(kind).acquired.load(Ordering::Acquire)
    }

    pub fn available(&self, kind: ResourceKind) -> u32 {
        self.total(kind) - self.acquired(kind)
    }

    pub fn snapshot(&self) -> Vec<ResourceUsage> {
        ResourceKind::ALL
            .iter()
            .map(|&kind| ResourceUsage {
                kind,
                total: self.total(kind),
                acquired: self.acquired(kind),
            })
            .collect()
    }
}
