use serde::{Deserialize, Serialize};

use crate::config::SsdConfig;
use crate::error::{Error, Result};

// =============================================================================
// Layout
// =============================================================================

/// Structural dimensions of a flash array partition.
///
/// The first block of fields is primary; the rest are aggregates that must be
/// recomputed with [`FlashLayout::recompute_aggregates`] whenever a primary
/// field changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlashLayout {
    pub sector_size: u64,
    pub secs_per_page: u64,
    pub page_size: u64,

    pub pages_per_flash_page: u64,
    pub flash_pages_per_block: u64,
    /// Pages per program unit (one-shot page)
    pub pages_per_oneshot: u64,
    pub oneshots_per_block: u64,
    pub pages_per_block: u64,

    pub blocks_per_plane: u64,
    pub planes_per_lun: u64,
    pub luns_per_channel: u64,
    pub channels: u64,

    pub secs_per_block: u64,
    pub secs_per_plane: u64,
    pub secs_per_lun: u64,
    pub secs_per_channel: u64,
    pub total_secs: u64,

    pub pages_per_plane: u64,
    pub pages_per_lun: u64,
    pub pages_per_channel: u64,
    pub total_pages: u64,

    pub blocks_per_lun: u64,
    pub blocks_per_channel: u64,
    pub total_blocks: u64,

    pub planes_per_channel: u64,
    pub total_planes: u64,
    pub total_luns: u64,
}

impl FlashLayout {
    /// Rebuild the sector aggregates bottom-up from `pages_per_block`.
    pub fn recompute_sectors(&mut self) {
        self.secs_per_block = self.secs_per_page * self.pages_per_block;
        self.secs_per_plane = self.secs_per_block * self.blocks_per_plane;
        self.secs_per_lun = self.secs_per_plane * self.planes_per_lun;
        self.secs_per_channel = self.secs_per_lun * self.luns_per_channel;
        self.total_secs = self.secs_per_channel * self.channels;
    }

    /// Rebuild the page aggregates bottom-up from `pages_per_block`.
    pub fn recompute_pages(&mut self) {
        self.pages_per_plane = self.pages_per_block * self.blocks_per_plane;
        self.pages_per_lun = self.pages_per_plane * self.planes_per_lun;
        self.pages_per_channel = self.pages_per_lun * self.luns_per_channel;
        self.total_pages = self.pages_per_channel * self.channels;
    }

    /// Rebuild every aggregate from the primary fields.
    pub fn recompute_aggregates(&mut self) {
        self.recompute_sectors();
        self.recompute_pages();

        self.blocks_per_lun = self.blocks_per_plane * self.planes_per_lun;
        self.blocks_per_channel = self.blocks_per_lun * self.luns_per_channel;
        self.total_blocks = self.blocks_per_channel * self.channels;

        self.planes_per_channel = self.planes_per_lun * self.luns_per_channel;
        self.total_planes = self.planes_per_channel * self.channels;
        self.total_luns = self.luns_per_channel * self.channels;
    }

    /// Verify that every aggregate matches its primary fields.
    pub fn check_consistency(&self) -> Result<()> {
        let checks = [
            ("page_size", self.page_size, self.sector_size * self.secs_per_page),
            (
                "pages_per_block",
                self.pages_per_block,
                self.pages_per_oneshot * self.oneshots_per_block,
            ),
            ("secs_per_block", self.secs_per_block, self.secs_per_page * self.pages_per_block),
            ("secs_per_plane", self.secs_per_plane, self.secs_per_block * self.blocks_per_plane),
            ("secs_per_lun", self.secs_per_lun, self.secs_per_plane * self.planes_per_lun),
            ("secs_per_channel", self.secs_per_channel, self.secs_per_lun * self.luns_per_channel),
            ("total_secs", self.total_secs, self.secs_per_channel * self.channels),
            ("pages_per_plane", self.pages_per_plane, self.pages_per_block * self.blocks_per_plane),
            ("pages_per_lun", self.pages_per_lun, self.pages_per_plane * self.planes_per_lun),
            (
                "pages_per_channel",
                self.pages_per_channel,
                self.pages_per_lun * self.luns_per_channel,
            ),
            ("total_pages", self.total_pages, self.pages_per_channel * self.channels),
        ];

        for (name, actual, expected) in checks {
            if actual != expected {
                return Err(Error::Geometry(format!(
                    "{} is {} but the layout implies {}",
                    name, actual, expected
                )));
            }
        }
        Ok(())
    }

    /// Raw capacity of the partition in bytes.
    pub fn capacity_bytes(&self) -> u64 {
        self.total_secs * self.sector_size
    }
}

// =============================================================================
// Timing
// =============================================================================

/// NAND access latencies of one cell mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NandLatency {
    pub read_4kb_ns: u64,
    pub read_ns: u64,
    pub prog_ns: u64,
}

/// Controller firmware overheads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FirmwareTiming {
    pub read_4kb_ns: u64,
    pub read_ns: u64,
    pub wbuf_latency0_ns: u64,
    pub wbuf_latency1_ns: u64,
    pub ch_xfer_ns: u64,
}

/// Complete layout and timing profile used by the timing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlashGeometry {
    pub layout: FlashLayout,
    pub nand: NandLatency,
    pub erase_latency_ns: u64,
    pub firmware: FirmwareTiming,
    pub channel_bandwidth_mbps: u64,
    pub pcie_bandwidth_mbps: u64,
    pub max_channel_xfer_size: u64,
    pub write_buffer_size: u64,
}

impl FlashGeometry {
    /// Derive the geometry of one partition of a device of `capacity` bytes.
    ///
    /// Channels and capacity are split evenly across `partitions`; the block
    /// count per plane is rounded up so the array covers the capacity.
    pub fn from_config(config: &SsdConfig, capacity: u64, partitions: u32) -> Result<Self> {
        config.validate()?;

        if partitions == 0 {
            return Err(Error::Geometry("partition count must be > 0".into()));
        }
        let partitions = u64::from(partitions);
        let channels = u64::from(config.channels) / partitions;
        if channels == 0 {
            return Err(Error::Geometry(format!(
                "{} channels cannot be split across {} partitions",
                config.channels, partitions
            )));
        }
        let capacity = capacity / partitions;
        if capacity == 0 {
            return Err(Error::Geometry("partition capacity must be > 0".into()));
        }

        let page_size = config.page_size;
        if config.flash_page_size == 0
            || config.flash_page_size % page_size != 0
            || config.oneshot_page_size % page_size != 0
        {
            return Err(Error::Geometry(format!(
                "flash page {} and one-shot page {} must be multiples of page size {}",
                config.flash_page_size, config.oneshot_page_size, page_size
            )));
        }
        if config.oneshot_page_size == 0 || config.oneshot_page_size % config.flash_page_size != 0
        {
            return Err(Error::Geometry(format!(
                "one-shot page {} must be a non-zero multiple of flash page {}",
                config.oneshot_page_size, config.flash_page_size
            )));
        }

        let planes_per_lun = u64::from(config.planes_per_lun);
        let luns_per_channel = u64::from(config.luns_per_channel);
        let block_row = checked_product(&[
            config.block_size,
            planes_per_lun,
            luns_per_channel,
            channels,
        ])
        .ok_or_else(|| {
            Error::Geometry(format!(
                "{} channels x {} LUNs x {} planes of {} byte blocks overflows",
                channels, luns_per_channel, planes_per_lun, config.block_size
            ))
        })?;
        let blocks_per_plane = capacity.div_ceil(block_row);

        let pages_per_oneshot = config.oneshot_page_size / page_size;
        let oneshots_per_block = config.block_size.div_ceil(config.oneshot_page_size);

        // Every aggregate is bounded by the array size in bytes.
        checked_product(&[
            config.oneshot_page_size,
            oneshots_per_block,
            blocks_per_plane,
            planes_per_lun,
            luns_per_channel,
            channels,
        ])
        .ok_or_else(|| {
            Error::Geometry(format!(
                "array of {} blocks per plane overflows the address space",
                blocks_per_plane
            ))
        })?;

        let mut layout = FlashLayout {
            sector_size: config.sector_size,
            secs_per_page: page_size / config.sector_size,
            page_size,
            pages_per_flash_page: config.flash_page_size / page_size,
            flash_pages_per_block: (config.oneshot_page_size / config.flash_page_size)
                * oneshots_per_block,
            pages_per_oneshot,
            oneshots_per_block,
            pages_per_block: pages_per_oneshot * oneshots_per_block,
            blocks_per_plane,
            planes_per_lun,
            luns_per_channel,
            channels,
            secs_per_block: 0,
            secs_per_plane: 0,
            secs_per_lun: 0,
            secs_per_channel: 0,
            total_secs: 0,
            pages_per_plane: 0,
            pages_per_lun: 0,
            pages_per_channel: 0,
            total_pages: 0,
            blocks_per_lun: 0,
            blocks_per_channel: 0,
            total_blocks: 0,
            planes_per_channel: 0,
            total_planes: 0,
            total_luns: 0,
        };
        layout.recompute_aggregates();

        Ok(Self {
            layout,
            nand: NandLatency {
                read_4kb_ns: config.nand_4kb_read_latency_ns,
                read_ns: config.nand_read_latency_ns,
                prog_ns: config.nand_prog_latency_ns,
            },
            erase_latency_ns: config.nand_erase_latency_ns,
            firmware: FirmwareTiming {
                read_4kb_ns: config.fw_4kb_read_latency_ns,
                read_ns: config.fw_read_latency_ns,
                wbuf_latency0_ns: config.fw_wbuf_latency0_ns,
                wbuf_latency1_ns: config.fw_wbuf_latency1_ns,
                ch_xfer_ns: config.fw_ch_xfer_latency_ns,
            },
            channel_bandwidth_mbps: config.channel_bandwidth_mbps,
            pcie_bandwidth_mbps: config.pcie_bandwidth_mbps,
            max_channel_xfer_size: config.max_channel_xfer_size,
            write_buffer_size: config.effective_write_buffer_size()?,
        })
    }

    /// Validate the profile before it is handed to a timing model.
    pub fn validate(&self) -> Result<()> {
        self.layout.check_consistency()?;
        if self.layout.total_luns == 0 || self.layout.total_pages == 0 {
            return Err(Error::Geometry("geometry has no usable pages".into()));
        }
        Ok(())
    }
}

fn checked_product(factors: &[u64]) -> Option<u64> {
    factors.iter().try_fold(1u64, |acc, &f| acc.checked_mul(f))
}
