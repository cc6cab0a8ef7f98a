//! Backing storage mappings
//!
//! A namespace keeps a reference to the memory region that stands in for its
//! media. The FTL core never touches the data itself; the external zone I/O
//! handlers do, through [`StorageMapping`].
//!
//! - [`HostMapping`] - zeroed, 4KB-aligned heap region owned by the mapping
//! - [`DetachedMapping`] - length only, for timing-only simulation

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt::Debug;
use std::ptr::NonNull;
use std::slice;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Alignment of host mappings (one FTL page)
pub const MAPPING_ALIGNMENT: usize = 4096;

/// Byte-addressable backing store of a namespace.
pub trait StorageMapping: Send + Sync + Debug {
    /// Size of the mapping in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Copy `data` to the mapping starting at `offset`.
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()>;
}

fn check_range(len: u64, offset: u64, count: usize) -> Result<()> {
    let end = offset.checked_add(count as u64);
    match end {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::Internal(format!(
            "access [{:#x}, +{}) outside mapping of {} bytes",
            offset, count, len
        ))),
    }
}

// =============================================================================
// Host Mapping
// =============================================================================

/// Owned aligned allocation.
#[derive(Debug)]
struct Region {
    ptr: NonNull<u8>,
    size: usize,
    layout: Layout,
}

// SAFETY: Region owns its memory exclusively; access goes through the RwLock
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for size bytes for the lifetime of self
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for size bytes and we hold &mut self
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with this layout
        unsafe {
            dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

/// Zero-initialized, page-aligned memory owned by the mapping.
#[derive(Debug)]
pub struct HostMapping {
    region: RwLock<Region>,
}

impl HostMapping {
    /// Allocate a zeroed mapping of `size` bytes.
    pub fn new(size: u64) -> Result<Self> {
        let size = usize::try_from(size)
            .map_err(|_| Error::Internal(format!("mapping size {} exceeds usize", size)))?;
        if size == 0 {
            return Err(Error::Internal("mapping size must be greater than 0".into()));
        }

        let layout = Layout::from_size_align(size, MAPPING_ALIGNMENT)
            .map_err(|e| Error::Internal(format!("invalid mapping layout: {}", e)))?;

        // SAFETY: layout has non-zero size
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            Error::Internal(format!("failed to allocate {} byte mapping", size))
        })?;

        Ok(Self {
            region: RwLock::new(Region { ptr, size, layout }),
        })
    }

    /// Check if the base pointer is properly aligned.
    pub fn is_aligned(&self) -> bool {
        self.region.read().ptr.as_ptr() as usize % MAPPING_ALIGNMENT == 0
    }
}

impl StorageMapping for HostMapping {
    fn len(&self) -> u64 {
        self.region.read().size as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let region = self.region.read();
        check_range(region.size as u64, offset, buf.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&region.as_slice()[start..start + buf.len()]);
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut region = self.region.write();
        check_range(region.size as u64, offset, data.len())?;
        let start = offset as usize;
        region.as_mut_slice()[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}

// =============================================================================
// Detached Mapping
// =============================================================================

/// Mapping without memory: reads return zeroes, writes are dropped.
#[derive(Debug, Clone, Copy)]
pub struct DetachedMapping {
    len: u64,
}

impl DetachedMapping {
    pub fn new(len: u64) -> Self {
        Self { len }
    }
}

impl StorageMapping for DetachedMapping {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(self.len, offset, buf.len())?;
        buf.fill(0);
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_range(self.len, offset, data.len())
    }
}
