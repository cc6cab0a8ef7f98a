use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info};

use super::FlashGeometry;
use crate::config::SsdConfig;
use crate::error::{Error, Result};

// =============================================================================
// Ports
// =============================================================================

/// Unit of the device that can be kept busy by a media operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaTarget {
    Lun { channel: u32, lun: u32 },
    Channel(u32),
    /// Host link (PCIe)
    Host,
}

/// A constructed timing model for one partition.
pub trait DeviceTimingModel: Send + Sync + Debug {
    /// Geometry the model was built from.
    fn geometry(&self) -> &FlashGeometry;

    /// Time at which every outstanding operation has completed.
    fn next_idle_time(&self) -> u64;

    /// Book `busy_ns` on `target`, starting no earlier than `start_ns`.
    ///
    /// Returns the completion time of the booked operation.
    fn reserve(&self, target: MediaTarget, start_ns: u64, busy_ns: u64) -> Result<u64>;

    /// Release the model's resources. Further reservations fail.
    fn shutdown(&self);
}

/// Factory for timing models.
pub trait DeviceTimingEngine: Send + Sync + Debug {
    /// Derive the geometry of one partition from the device capacity.
    fn derive_parameters(&self, capacity: u64, partitions: u32) -> Result<FlashGeometry>;

    /// Build the model for one partition.
    fn construct(
        &self,
        geometry: &FlashGeometry,
        capacity: u64,
        partitions: u32,
        dispatchers: u32,
    ) -> Result<Box<dyn DeviceTimingModel>>;
}

// =============================================================================
// Reference Engine
// =============================================================================

/// Timing engine backed by an [`SsdConfig`].
#[derive(Debug, Clone, Default)]
pub struct SsdTimingEngine {
    config: SsdConfig,
}

impl SsdTimingEngine {
    pub fn new(config: SsdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SsdConfig {
        &self.config
    }
}

impl DeviceTimingEngine for SsdTimingEngine {
    fn derive_parameters(&self, capacity: u64, partitions: u32) -> Result<FlashGeometry> {
        FlashGeometry::from_config(&self.config, capacity, partitions)
    }

    fn construct(
        &self,
        geometry: &FlashGeometry,
        capacity: u64,
        partitions: u32,
        dispatchers: u32,
    ) -> Result<Box<dyn DeviceTimingModel>> {
        geometry.validate()?;
        let model = SsdTimingModel::new(*geometry, dispatchers);
        info!(
            "Timing model: capacity={}MB partitions={} channels={} luns/ch={} dispatchers={}",
            capacity / (1024 * 1024),
            partitions,
            geometry.layout.channels,
            geometry.layout.luns_per_channel,
            dispatchers
        );
        Ok(Box::new(model))
    }
}

/// One "next free" timestamp per LUN, per channel and for the host link.
#[derive(Debug)]
pub struct SsdTimingModel {
    geometry: FlashGeometry,
    dispatchers: u32,
    luns: Vec<AtomicU64>,
    channels: Vec<AtomicU64>,
    host: AtomicU64,
    stopped: AtomicBool,
}

impl SsdTimingModel {
    pub fn new(geometry: FlashGeometry, dispatchers: u32) -> Self {
        let layout = geometry.layout;
        let luns = (0..layout.total_luns).map(|_| AtomicU64::new(0)).collect();
        let channels = (0..layout.channels).map(|_| AtomicU64::new(0)).collect();

        Self {
            geometry,
            dispatchers,
            luns,
            channels,
            host: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn dispatchers(&self) -> u32 {
        self.dispatchers
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn slot(&self, target: MediaTarget) -> Result<&AtomicU64> {
        let slot = match target {
            MediaTarget::Lun { channel, lun } => {
                let luns_per_channel = self.geometry.layout.luns_per_channel;
                if u64::from(lun) >= luns_per_channel {
                    None
                } else {
                    let index = u64::from(channel) * luns_per_channel + u64::from(lun);
                    self.luns.get(index as usize)
                }
            }
            MediaTarget::Channel(channel) => self.channels.get(channel as usize),
            MediaTarget::Host => Some(&self.host),
        };
        slot.ok_or_else(|| Error::Internal(format!("no such media target: {:?}", target)))
    }
}

impl DeviceTimingModel for SsdTimingModel {
    fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    fn next_idle_time(&self) -> u64 {
        self.luns
            .iter()
            .chain(self.channels.iter())
            .chain(std::iter::once(&self.host))
            .map(|t| t.load(Ordering::Acquire))
            .max()
            .unwrap_or(0)
    }

    fn reserve(&self, target: MediaTarget, start_ns: u64, busy_ns: u64) -> Result<u64> {
        if self.is_stopped() {
            return Err(Error::TimingModelStopped);
        }
        let slot = self.slot(target)?;

        let mut completion = 0;
        // fetch_update only fails when the closure returns None
        let _ = slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |free_at| {
            completion = free_at.max(start_ns).saturating_add(busy_ns);
            Some(completion)
        });
        Ok(completion)
    }

    fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            debug!("Timing model shut down (idle at {})", self.next_idle_time());
        }
    }
}
