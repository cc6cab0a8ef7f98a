use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ZnsConfig, MIB};
use crate::error::{Error, Result};
use crate::ssd::FlashLayout;

/// Zone parameters of one namespace partition.
///
/// Fixed at namespace creation. All sizes are bytes unless suffixed `lbas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneParams {
    pub zone_size: u64,
    pub nr_zones: u32,
    pub dies_per_zone: u32,

    pub nr_active_zones: u32,
    pub nr_open_zones: u32,
    pub nr_zrwa_zones: u32,

    pub zone_wb_size: u64,
    pub zrwa_size: u64,
    pub zrwafg_size: u64,
    pub zrwa_buffer_size: u64,

    pub lbas_per_zone: u64,
    pub lbas_per_zrwa: u64,
    pub lbas_per_zrwafg: u64,
}

impl ZoneParams {
    /// Compute the zone parameters for `capacity` bytes on `layout`.
    ///
    /// The capacity must be an exact multiple of the zone size and the zone
    /// size an exact multiple of the page size, so every zone boundary falls
    /// on a page and no zone is partial.
    pub fn derive(config: &ZnsConfig, layout: &FlashLayout, capacity: u64) -> Result<Self> {
        let zone_size = config.zone_size;
        if zone_size == 0 {
            return Err(Error::ZoneLayout("zone size must be > 0".into()));
        }
        if capacity % zone_size != 0 {
            return Err(Error::ZoneLayout(format!(
                "capacity {} is not a multiple of zone size {}",
                capacity, zone_size
            )));
        }
        if zone_size % layout.page_size != 0 {
            return Err(Error::ZoneLayout(format!(
                "zone size {} is not a multiple of page size {}",
                zone_size, layout.page_size
            )));
        }

        let nr_zones = u32::try_from(capacity / zone_size).map_err(|_| {
            Error::ZoneLayout(format!(
                "{} zones exceed the zone index range",
                capacity / zone_size
            ))
        })?;
        if nr_zones == 0 {
            return Err(Error::ZoneLayout("capacity holds no zones".into()));
        }

        let sector_size = layout.sector_size;
        let params = Self {
            zone_size,
            nr_zones,
            dies_per_zone: config.dies_per_zone,
            nr_active_zones: nr_zones,
            nr_open_zones: nr_zones,
            nr_zrwa_zones: config.max_zrwa_zones,
            zone_wb_size: config.zone_wb_size,
            zrwa_size: config.zrwa_size,
            zrwafg_size: config.zrwafg_size,
            zrwa_buffer_size: config.zrwa_buffer_size,
            lbas_per_zone: zone_size / sector_size,
            lbas_per_zrwa: config.zrwa_size / sector_size,
            lbas_per_zrwafg: config.zrwafg_size / sector_size,
        };

        info!(
            "zone_size={}(Byte),{}(MB), # zones={} # die/zone={}",
            params.zone_size,
            params.zone_size / MIB,
            params.nr_zones,
            params.dies_per_zone
        );

        Ok(params)
    }

    /// Whether a ZRWA buffer is configured per zone.
    pub fn has_zrwa_buffer(&self) -> bool {
        self.zrwa_buffer_size > 0
    }

    /// Whether a write buffer is configured per zone.
    pub fn has_zone_write_buffer(&self) -> bool {
        self.zone_wb_size > 0
    }
}
