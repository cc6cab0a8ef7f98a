//! Per-zone accelerator buffers
//!
//! A device may give every zone a ZRWA (zone random write area) buffer and a
//! write buffer. Each kind is enabled on its own by a non-zero size; a
//! disabled kind is simply absent (`Option::None` at the owner), so there is
//! nothing to dereference by mistake.

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{Error, Result};

/// Bounded byte budget of one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneBuffer {
    capacity: u64,
    remaining: u64,
}

impl ZoneBuffer {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            remaining: capacity,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Bytes currently held.
    pub fn used(&self) -> u64 {
        self.capacity - self.remaining
    }

    pub fn is_full(&self) -> bool {
        self.remaining == 0
    }

    /// Take up to `size` bytes; returns how many were granted.
    pub fn allocate(&mut self, size: u64) -> u64 {
        let granted = size.min(self.remaining);
        self.remaining -= granted;
        granted
    }

    /// Give back `size` bytes.
    pub fn release(&mut self, size: u64) -> Result<()> {
        if size > self.used() {
            return Err(Error::Buffer(format!(
                "release of {} bytes exceeds {} bytes in use",
                size,
                self.used()
            )));
        }
        self.remaining += size;
        Ok(())
    }

    /// Drop everything held.
    pub fn refill(&mut self) {
        self.remaining = self.capacity;
    }
}

/// One buffer per zone, all of the same size.
#[derive(Debug)]
pub struct ZoneBufferSet {
    buffers: Vec<Mutex<ZoneBuffer>>,
    buffer_size: u64,
}

impl ZoneBufferSet {
    /// Buffers for `nr_zones` zones, or `None` when `buffer_size` is zero.
    pub fn new(nr_zones: u32, buffer_size: u64) -> Option<Self> {
        if buffer_size == 0 {
            return None;
        }
        debug!("Allocating {} zone buffers of {} bytes", nr_zones, buffer_size);
        Some(Self {
            buffers: (0..nr_zones)
                .map(|_| Mutex::new(ZoneBuffer::new(buffer_size)))
                .collect(),
            buffer_size,
        })
    }

    pub fn buffer_size(&self) -> u64 {
        self.buffer_size
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Lock the buffer of `zone`.
    pub fn lock(&self, zone: u32) -> Result<MutexGuard<'_, ZoneBuffer>> {
        self.buffers
            .get(zone as usize)
            .map(|b| b.lock())
            .ok_or(Error::ZoneOutOfRange {
                zone,
                nr_zones: self.buffers.len() as u32,
            })
    }
}
