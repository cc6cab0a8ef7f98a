use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::buffer::ZoneBufferSet;
use super::cell::{CellGeometry, CellGeometrySet, CellMode};
use super::params::ZoneParams;
use super::resource::ResourcePool;
use super::zone::ZoneTable;
use crate::config::DeviceConfig;
use crate::error::Result;
use crate::mapping::StorageMapping;
use crate::ssd::{DeviceTimingEngine, DeviceTimingModel, FlashGeometry};

/// FTL state of one namespace partition.
///
/// Built once when the namespace attaches and torn down once when it
/// detaches; nothing in it is resized in between.
#[derive(Debug)]
pub struct FtlState {
    params: ZoneParams,
    zones: ZoneTable,
    zrwa_buffers: Option<ZoneBufferSet>,
    zone_write_buffers: Option<ZoneBufferSet>,
    resources: ResourcePool,
    cells: CellGeometrySet,
    timing: Box<dyn DeviceTimingModel>,
    mapping: Arc<dyn StorageMapping>,
}

impl FtlState {
    /// Build the FTL state of a `capacity`-byte partition.
    ///
    /// Order matters: the timing model fixes the base geometry, zone
    /// parameters are checked against that geometry, and the cell profiles
    /// are derived last from the finalized base.
    #[instrument(skip(config, engine, mapping))]
    pub fn build(
        config: &DeviceConfig,
        engine: &dyn DeviceTimingEngine,
        capacity: u64,
        partitions: u32,
        mapping: Arc<dyn StorageMapping>,
        dispatchers: u32,
    ) -> Result<Self> {
        let geometry = engine.derive_parameters(capacity, partitions)?;
        geometry.validate()?;
        let timing = engine.construct(&geometry, capacity, partitions, dispatchers)?;

        match Self::build_on(config, capacity, timing.geometry()) {
            Ok((params, zones, zrwa_buffers, zone_write_buffers, resources, cells)) => {
                info!(
                    "FTL ready: {} zones of {} LBAs, zrwa_buffers={} zone_write_buffers={}",
                    params.nr_zones,
                    params.lbas_per_zone,
                    zrwa_buffers.is_some(),
                    zone_write_buffers.is_some()
                );
                Ok(Self {
                    params,
                    zones,
                    zrwa_buffers,
                    zone_write_buffers,
                    resources,
                    cells,
                    timing,
                    mapping,
                })
            }
            Err(e) => {
                warn!("FTL construction failed: {}", e);
                timing.shutdown();
                Err(e)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn build_on(
        config: &DeviceConfig,
        capacity: u64,
        base: &FlashGeometry,
    ) -> Result<(
        ZoneParams,
        ZoneTable,
        Option<ZoneBufferSet>,
        Option<ZoneBufferSet>,
        ResourcePool,
        CellGeometrySet,
    )> {
        let params = ZoneParams::derive(&config.zns, &base.layout, capacity)?;

        let zones = ZoneTable::new(&params);
        let zrwa_buffers = ZoneBufferSet::new(params.nr_zones, params.zrwa_buffer_size);
        let zone_write_buffers = ZoneBufferSet::new(params.nr_zones, params.zone_wb_size);

        let resources = ResourcePool::new(params.nr_zones);

        let cells = CellGeometrySet::derive(base, &config.cell)?;

        Ok((params, zones, zrwa_buffers, zone_write_buffers, resources, cells))
    }

    /// Release everything in reverse dependency order.
    pub fn teardown(self) {
        let Self {
            params,
            zones,
            zrwa_buffers,
            zone_write_buffers,
            resources,
            cells,
            timing,
            mapping,
        } = self;

        timing.shutdown();
        drop(timing);

        drop(zrwa_buffers);
        drop(zone_write_buffers);
        drop(zones);
        drop(resources);

        drop(cells);
        drop(mapping);

        debug!("FTL with {} zones torn down", params.nr_zones);
    }

    pub fn params(&self) -> &ZoneParams {
        &self.params
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    pub fn resources(&self) -> &ResourcePool {
        &self.resources
    }

    pub fn zrwa_buffers(&self) -> Option<&ZoneBufferSet> {
        self.zrwa_buffers.as_ref()
    }

    pub fn zone_write_buffers(&self) -> Option<&ZoneBufferSet> {
        self.zone_write_buffers.as_ref()
    }

    pub fn timing(&self) -> &dyn DeviceTimingModel {
        self.timing.as_ref()
    }

    pub fn mapping(&self) -> &Arc<dyn StorageMapping> {
        &self.mapping
    }

    /// Profile of one cell mode.
    pub fn cell_geometry(&self, mode: CellMode) -> &CellGeometry {
        self.cells.get(mode)
    }

    /// Profile that prices I/O to `zone`, selected by its current cell mode.
    pub fn zone_geometry(&self, zone: u32) -> Result<&CellGeometry> {
        let mode = self.zones.lock(zone)?.cell_mode;
        Ok(self.cells.get(mode))
    }

    /// Switch the cell mode `zone` is programmed in.
    pub fn set_zone_cell_mode(&self, zone: u32, mode: CellMode) -> Result<()> {
        self.zones.lock(zone)?.cell_mode = mode;
        Ok(())
    }
}
