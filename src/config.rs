//! Device configuration
//!
//! A simulated device is described by three groups of settings:
//!
//! - [`SsdConfig`] - raw flash layout and base timing of the NAND array
//! - [`ZnsConfig`] - zone size and the optional ZRWA / write-buffer sizing
//! - [`CellLatencyConfig`] - read/program latencies per cell mode
//!
//! All groups implement `Default`, so a YAML file only needs to list the
//! fields it changes:
//!
//! ```yaml
//! ssd:
//!   channels: 4
//! zns:
//!   zone_size: 67108864
//!   zone_wb_size: 1048576
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

// =============================================================================
// Constants
// =============================================================================

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Logical block (sector) size
pub const DEFAULT_SECTOR_SIZE: u64 = 512;

/// Mapping unit of the FTL
pub const DEFAULT_PAGE_SIZE: u64 = 4 * KIB;

/// Default zone size
pub const DEFAULT_ZONE_SIZE: u64 = 128 * MIB;

// =============================================================================
// SSD Configuration
// =============================================================================

/// Flash array layout and base timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsdConfig {
    /// Logical block size in bytes
    pub sector_size: u64,

    /// FTL mapping page size in bytes
    pub page_size: u64,

    pub channels: u32,
    pub luns_per_channel: u32,
    pub planes_per_lun: u32,

    /// Physical flash page size in bytes
    pub flash_page_size: u64,

    /// Program unit (one-shot page) size in bytes
    pub oneshot_page_size: u64,

    /// Erase block size in bytes
    pub block_size: u64,

    pub nand_4kb_read_latency_ns: u64,
    pub nand_read_latency_ns: u64,
    pub nand_prog_latency_ns: u64,
    pub nand_erase_latency_ns: u64,

    pub fw_4kb_read_latency_ns: u64,
    pub fw_read_latency_ns: u64,
    pub fw_wbuf_latency0_ns: u64,
    pub fw_wbuf_latency1_ns: u64,
    pub fw_ch_xfer_latency_ns: u64,

    /// NAND channel bandwidth in MB/s
    pub channel_bandwidth_mbps: u64,

    /// Host link bandwidth in MB/s
    pub pcie_bandwidth_mbps: u64,

    pub max_channel_xfer_size: u64,

    /// Device-wide write buffer; 0 selects two program units per LUN
    pub write_buffer_size: u64,
}

impl Default for SsdConfig {
    fn default() -> Self {
        Self {
            sector_size: DEFAULT_SECTOR_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            channels: 8,
            luns_per_channel: 4,
            planes_per_lun: 1,
            flash_page_size: 32 * KIB,
            oneshot_page_size: 128 * KIB,
            block_size: 4 * MIB,
            nand_4kb_read_latency_ns: 35_760,
            nand_read_latency_ns: 36_013,
            nand_prog_latency_ns: 185_000,
            nand_erase_latency_ns: 3_500_000,
            fw_4kb_read_latency_ns: 20_000,
            fw_read_latency_ns: 13_000,
            fw_wbuf_latency0_ns: 5_600,
            fw_wbuf_latency1_ns: 600,
            fw_ch_xfer_latency_ns: 0,
            channel_bandwidth_mbps: 800,
            pcie_bandwidth_mbps: 3_200,
            max_channel_xfer_size: 16 * KIB,
            write_buffer_size: 0,
        }
    }
}

impl SsdConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.sector_size == 0 || self.page_size == 0 {
            return Err(Error::Config("sector_size and page_size must be > 0".into()));
        }
        if self.page_size % self.sector_size != 0 {
            return Err(Error::Config(format!(
                "page_size {} must be a multiple of sector_size {}",
                self.page_size, self.sector_size
            )));
        }
        if self.channels == 0 || self.luns_per_channel == 0 || self.planes_per_lun == 0 {
            return Err(Error::Config(
                "channels, luns_per_channel and planes_per_lun must be > 0".into(),
            ));
        }
        if self.block_size == 0 {
            return Err(Error::Config("block_size must be > 0".into()));
        }
        self.effective_write_buffer_size()?;
        Ok(())
    }

    /// Write buffer size with the default applied.
    pub fn effective_write_buffer_size(&self) -> Result<u64> {
        if self.write_buffer_size > 0 {
            return Ok(self.write_buffer_size);
        }
        u64::from(self.channels)
            .checked_mul(u64::from(self.luns_per_channel))
            .and_then(|n| n.checked_mul(self.oneshot_page_size))
            .and_then(|n| n.checked_mul(2))
            .ok_or_else(|| {
                Error::Config(format!(
                    "default write buffer for {} channels x {} LUNs x {} bytes overflows",
                    self.channels, self.luns_per_channel, self.oneshot_page_size
                ))
            })
    }
}

// =============================================================================
// ZNS Configuration
// =============================================================================

/// Zone sizing and the optional per-zone acceleration buffers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZnsConfig {
    /// Zone size in bytes
    pub zone_size: u64,

    /// Number of dies a zone is striped over
    pub dies_per_zone: u32,

    /// Maximum number of zones with a ZRWA attached
    pub max_zrwa_zones: u32,

    /// ZRWA size in bytes
    pub zrwa_size: u64,

    /// ZRWA flush granularity in bytes
    pub zrwafg_size: u64,

    /// Per-zone ZRWA buffer in bytes; 0 disables it
    pub zrwa_buffer_size: u64,

    /// Per-zone write buffer in bytes; 0 disables it
    pub zone_wb_size: u64,
}

impl Default for ZnsConfig {
    fn default() -> Self {
        Self {
            zone_size: DEFAULT_ZONE_SIZE,
            dies_per_zone: 1,
            max_zrwa_zones: 0,
            zrwa_size: 0,
            zrwafg_size: 0,
            zrwa_buffer_size: 0,
            zone_wb_size: 0,
        }
    }
}

impl ZnsConfig {
    /// Create a config with custom zone size.
    pub fn with_zone_size(zone_size: u64) -> Self {
        Self {
            zone_size,
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.zone_size == 0 {
            return Err(Error::Config("zone_size must be > 0".into()));
        }
        if self.dies_per_zone == 0 {
            return Err(Error::Config("dies_per_zone must be > 0".into()));
        }
        if self.zrwafg_size > 0 && self.zrwa_size % self.zrwafg_size != 0 {
            return Err(Error::Config(format!(
                "zrwa_size {} must be a multiple of zrwafg_size {}",
                self.zrwa_size, self.zrwafg_size
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Cell Latency Configuration
// =============================================================================

/// NAND latencies for the two cell modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellLatencyConfig {
    /// Fast (SLC) read latency, used for both 4KB and full-page reads
    pub fast_read_latency_ns: u64,
    pub fast_prog_latency_ns: u64,

    /// Baseline (QLC) read latency, used for both 4KB and full-page reads
    pub baseline_read_latency_ns: u64,
    pub baseline_prog_latency_ns: u64,
}

impl Default for CellLatencyConfig {
    fn default() -> Self {
        Self {
            fast_read_latency_ns: 20_000,
            fast_prog_latency_ns: 75_000,
            baseline_read_latency_ns: 85_000,
            baseline_prog_latency_ns: 1_500_000,
        }
    }
}

impl CellLatencyConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.fast_read_latency_ns > self.baseline_read_latency_ns {
            return Err(Error::Config(format!(
                "fast read latency {}ns exceeds baseline {}ns",
                self.fast_read_latency_ns, self.baseline_read_latency_ns
            )));
        }
        if self.fast_prog_latency_ns > self.baseline_prog_latency_ns {
            return Err(Error::Config(format!(
                "fast program latency {}ns exceeds baseline {}ns",
                self.fast_prog_latency_ns, self.baseline_prog_latency_ns
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Device Configuration
// =============================================================================

/// Complete description of a simulated ZNS device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub ssd: SsdConfig,
    pub zns: ZnsConfig,
    pub cell: CellLatencyConfig,
}

impl DeviceConfig {
    /// Parse a configuration from YAML and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: DeviceConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading device configuration from {}", path.display());
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Validate every group.
    pub fn validate(&self) -> Result<()> {
        self.ssd.validate()?;
        self.zns.validate()?;
        self.cell.validate()?;
        Ok(())
    }
}

/// Parse a byte count with an optional `K`, `M`, `G` or `T` suffix.
///
/// Suffixes are binary (`1K == 1024`); a trailing `iB` or `B` is accepted.
pub fn parse_byte_size(input: &str) -> Result<u64> {
    let s = input.trim();
    let s = s
        .strip_suffix("iB")
        .or_else(|| s.strip_suffix('B'))
        .unwrap_or(s);

    let (digits, multiplier) = match s.chars().last() {
        Some('K' | 'k') => (&s[..s.len() - 1], KIB),
        Some('M' | 'm') => (&s[..s.len() - 1], MIB),
        Some('G' | 'g') => (&s[..s.len() - 1], GIB),
        Some('T' | 't') => (&s[..s.len() - 1], GIB * 1024),
        _ => (s, 1),
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid size: {:?}", input)))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| Error::Config(format!("size overflows u64: {:?}", input)))
}
