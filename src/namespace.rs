//! Zoned namespace lifecycle
//!
//! A [`Namespace`] is created attached: its partitions' FTL state exists and
//! its dispatcher is installed. [`Namespace::remove`] detaches it exactly
//! once; afterwards the namespace keeps its identity but has no FTL state.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::clock::{Clock, MonotonicClock};
use crate::config::DeviceConfig;
use crate::dispatch::{IoCommandProcessor, ZnsDispatcher};
use crate::error::{Error, Result};
use crate::mapping::StorageMapping;
use crate::nvme::{CommandSet, IoRequest, IoResult};
use crate::ssd::{DeviceTimingEngine, SsdTimingEngine};
use crate::zns::FtlState;

/// Partitions of a zoned namespace.
pub const ZNS_PARTITIONS: u32 = 1;

/// Collaborators a namespace is created with.
#[derive(Debug)]
pub struct NamespaceBuilder {
    config: DeviceConfig,
    engine: Arc<dyn DeviceTimingEngine>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn IoCommandProcessor>,
}

impl NamespaceBuilder {
    /// Builder with the reference timing engine, the monotonic clock and a
    /// dispatcher without data-path handlers.
    pub fn new(config: DeviceConfig) -> Self {
        let engine = Arc::new(SsdTimingEngine::new(config.ssd.clone()));
        Self {
            config,
            engine,
            clock: Arc::new(MonotonicClock),
            dispatcher: Arc::new(ZnsDispatcher::default()),
        }
    }

    pub fn timing_engine(mut self, engine: Arc<dyn DeviceTimingEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn IoCommandProcessor>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Create namespace `id` of `capacity` bytes backed by `mapping`.
    #[instrument(skip(self, mapping))]
    pub fn create(
        self,
        id: u32,
        capacity: u64,
        mapping: Arc<dyn StorageMapping>,
        dispatchers: u32,
    ) -> Result<Namespace> {
        self.config.validate()?;
        if mapping.len() < capacity {
            return Err(Error::Config(format!(
                "mapping of {} bytes cannot back {} bytes",
                mapping.len(),
                capacity
            )));
        }

        let part_capacity = capacity / u64::from(ZNS_PARTITIONS);
        let ftls = (0..ZNS_PARTITIONS)
            .map(|_| {
                FtlState::build(
                    &self.config,
                    self.engine.as_ref(),
                    part_capacity,
                    ZNS_PARTITIONS,
                    Arc::clone(&mapping),
                    dispatchers,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Namespace {} created: {} bytes, {} partition(s), {} zones each",
            id,
            capacity,
            ZNS_PARTITIONS,
            ftls[0].params().nr_zones
        );

        Ok(Namespace {
            id,
            csi: CommandSet::Zoned,
            nr_parts: ZNS_PARTITIONS,
            size: capacity,
            ftls: Some(ftls),
            mapping,
            dispatcher: self.dispatcher,
            clock: self.clock,
        })
    }
}

/// A zoned namespace and the FTL state of its partitions.
#[derive(Debug)]
pub struct Namespace {
    id: u32,
    csi: CommandSet,
    nr_parts: u32,
    size: u64,
    ftls: Option<Vec<FtlState>>,
    mapping: Arc<dyn StorageMapping>,
    dispatcher: Arc<dyn IoCommandProcessor>,
    clock: Arc<dyn Clock>,
}

impl Namespace {
    /// Create with default collaborators.
    pub fn create(
        config: DeviceConfig,
        id: u32,
        capacity: u64,
        mapping: Arc<dyn StorageMapping>,
        dispatchers: u32,
    ) -> Result<Self> {
        NamespaceBuilder::new(config).create(id, capacity, mapping, dispatchers)
    }

    pub fn builder(config: DeviceConfig) -> NamespaceBuilder {
        NamespaceBuilder::new(config)
    }

    /// Tear down every partition. A second call is rejected.
    pub fn remove(&mut self) -> Result<()> {
        let ftls = self.ftls.take().ok_or(Error::NamespaceDetached(self.id))?;
        for ftl in ftls {
            ftl.teardown();
        }
        info!("Namespace {} removed", self.id);
        Ok(())
    }

    /// Route one command through the installed dispatcher.
    pub fn process_io_cmd(&self, req: &IoRequest, ret: &mut IoResult) -> Result<bool> {
        if !self.is_attached() {
            return Err(Error::NamespaceDetached(self.id));
        }
        self.dispatcher.process(self, req, ret)
    }

    pub fn is_attached(&self) -> bool {
        self.ftls.is_some()
    }

    /// FTL state of all partitions.
    pub fn partitions(&self) -> Result<&[FtlState]> {
        self.ftls
            .as_deref()
            .ok_or(Error::NamespaceDetached(self.id))
    }

    /// FTL state of the first partition.
    pub fn ftl(&self) -> Result<&FtlState> {
        self.partitions()?
            .first()
            .ok_or(Error::NamespaceDetached(self.id))
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn csi(&self) -> CommandSet {
        self.csi
    }

    pub fn nr_parts(&self) -> u32 {
        self.nr_parts
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mapping(&self) -> &Arc<dyn StorageMapping> {
        &self.mapping
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn dispatcher(&self) -> &Arc<dyn IoCommandProcessor> {
        &self.dispatcher
    }
}
