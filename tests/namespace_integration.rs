//! Zoned Namespace Integration Tests
//!
//! Drives namespaces end to end through their public surface:
//! - Lifecycle: create, remove, timing model shutdown
//! - Dispatch: routing, backpressure, unknown opcodes
//! - Flush: completion time against the clock and the timing model

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use parking_lot::Mutex;

use zns_ftl::clock::{Clock, ManualClock, MonotonicClock};
use zns_ftl::config::{DeviceConfig, GIB, KIB, MIB};
use zns_ftl::dispatch::{IoCommandProcessor, ZnsDispatcher, ZoneIoHandlers};
use zns_ftl::mapping::{DetachedMapping, HostMapping, StorageMapping};
use zns_ftl::nvme::{IoRequest, IoResult, Opcode, StatusCode};
use zns_ftl::ssd::{
    DeviceTimingEngine, DeviceTimingModel, FlashGeometry, MediaTarget, SsdTimingEngine,
    SsdTimingModel,
};
use zns_ftl::zns::{CellMode, ResourceKind, ZoneState};
use zns_ftl::{Error, Namespace, Result};

// =============================================================================
// Test Doubles
// =============================================================================

/// Handlers that record what they were asked to do.
///
/// Zone-management-send opens the zone at `slba`, taking an Active and an
/// Open resource.
#[derive(Debug, Default)]
struct RecordingHandlers {
    calls: Mutex<Vec<(&'static str, Opcode)>>,
    backpressure: AtomicBool,
}

impl RecordingHandlers {
    fn record(&self, route: &'static str, req: &IoRequest) {
        self.calls.lock().push((route, req.opcode));
    }

    fn calls(&self) -> Vec<(&'static str, Opcode)> {
        self.calls.lock().clone()
    }

    fn open_zone(ns: &Namespace, req: &IoRequest) -> std::result::Result<(), StatusCode> {
        let ftl = ns.ftl().map_err(|_| StatusCode::INTERNAL)?;
        let zone = ftl.zones().zone_of(req.slba).ok_or(StatusCode::LBA_RANGE)?;
        let mut descriptor = ftl.zones().lock(zone).map_err(|_| StatusCode::INTERNAL)?;

        ftl.resources()
            .acquire(ResourceKind::Active)
            .map_err(|_| ResourceKind::Active.exhausted_status())?;
        if ftl.resources().acquire(ResourceKind::Open).is_err() {
            let _ = ftl.resources().release(ResourceKind::Active);
            return Err(ResourceKind::Open.exhausted_status());
        }
        descriptor.state = ZoneState::ExplicitOpen;
        Ok(())
    }
}

impl ZoneIoHandlers for RecordingHandlers {
    fn write(&self, _ns: &Namespace, req: &IoRequest, ret: &mut IoResult) -> bool {
        self.record("write", req);
        if self.backpressure.load(Ordering::SeqCst) {
            return false;
        }
        ret.status = StatusCode::SUCCESS;
        ret.nsecs_target = req.nsecs_start + 1;
        true
    }

    fn read(&self, _ns: &Namespace, req: &IoRequest, ret: &mut IoResult) -> bool {
        self.record("read", req);
        if self.backpressure.load(Ordering::SeqCst) {
            return false;
        }
        ret.status = StatusCode::SUCCESS;
        true
    }

    fn zone_mgmt_send(&self, ns: &Namespace, req: &IoRequest, ret: &mut IoResult) {
        self.record("zone_mgmt_send", req);
        ret.status = match Self::open_zone(ns, req) {
            Ok(()) => StatusCode::SUCCESS,
            Err(status) => status,
        };
    }

    fn zone_mgmt_recv(&self, _ns: &Namespace, req: &IoRequest, ret: &mut IoResult) {
        self.record("zone_mgmt_recv", req);
        ret.status = StatusCode::SUCCESS;
    }
}

/// Timing model that counts shutdowns.
#[derive(Debug)]
struct CountingModel {
    inner: SsdTimingModel,
    shutdowns: Arc<AtomicU32>,
}

impl DeviceTimingModel for CountingModel {
    fn geometry(&self) -> &FlashGeometry {
        self.inner.geometry()
    }

    fn next_idle_time(&self) -> u64 {
        self.inner.next_idle_time()
    }

    fn reserve(&self, target: MediaTarget, start_ns: u64, busy_ns: u64) -> Result<u64> {
        self.inner.reserve(target, start_ns, busy_ns)
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.inner.shutdown();
    }
}

#[derive(Debug, Default)]
struct CountingEngine {
    inner: SsdTimingEngine,
    constructed: AtomicU32,
    shutdowns: Arc<AtomicU32>,
}

impl DeviceTimingEngine for CountingEngine {
    fn derive_parameters(&self, capacity: u64, partitions: u32) -> Result<FlashGeometry> {
        self.inner.derive_parameters(capacity, partitions)
    }

    fn construct(
        &self,
        geometry: &FlashGeometry,
        _capacity: u64,
        _partitions: u32,
        dispatchers: u32,
    ) -> Result<Box<dyn DeviceTimingModel>> {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingModel {
            inner: SsdTimingModel::new(*geometry, dispatchers),
            shutdowns: Arc::clone(&self.shutdowns),
        }))
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct Fixture {
    ns: Namespace,
    handlers: Arc<RecordingHandlers>,
    dispatcher: Arc<ZnsDispatcher>,
    clock: Arc<ManualClock>,
}

fn fixture(config: DeviceConfig, capacity: u64) -> Fixture {
    let handlers = Arc::new(RecordingHandlers::default());
    let dispatcher = Arc::new(ZnsDispatcher::new(handlers.clone()));
    let clock = Arc::new(ManualClock::new(1_000_000));

    let ns = Namespace::builder(config)
        .clock(clock.clone())
        .dispatcher(dispatcher.clone())
        .create(1, capacity, Arc::new(DetachedMapping::new(capacity)), 1)
        .unwrap();

    Fixture {
        ns,
        handlers,
        dispatcher,
        clock,
    }
}

fn default_fixture() -> Fixture {
    fixture(DeviceConfig::default(), GIB)
}

fn submit(ns: &Namespace, opcode: impl Into<Opcode>) -> (bool, IoResult) {
    let req = IoRequest::new(opcode, ns.id()).at(ns.clock().now_ns());
    let mut ret = IoResult::default();
    let handled = ns.process_io_cmd(&req, &mut ret).unwrap();
    (handled, ret)
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_1gib_namespace_has_8_zones() {
        let f = default_fixture();
        let ftl = f.ns.ftl().unwrap();

        assert_eq!(ftl.params().nr_zones, 8);
        assert_eq!(ftl.zones().len(), 8);
        assert_eq!(ftl.zones().report().capacity(), 8);
        assert_eq!(ftl.resources().total(ResourceKind::Active), 8);
        assert_eq!(ftl.resources().total(ResourceKind::Open), 8);
        assert_eq!(ftl.resources().total(ResourceKind::WriteAccelerated), 8);
        assert!(ftl.resources().snapshot().iter().all(|u| u.acquired == 0));
        assert!(ftl.zrwa_buffers().is_none());
        assert!(ftl.zone_write_buffers().is_none());

        let zones = ftl.zones().snapshot();
        let lbas = 128 * MIB / 512;
        for (i, zone) in zones.iter().enumerate() {
            assert_eq!(zone.start_lba(), i as u64 * lbas);
            assert_eq!(zone.write_pointer(), zone.start_lba());
            assert_eq!(zone.state, ZoneState::Empty);
            assert_eq!(zone.cell_mode, CellMode::Baseline);
        }
    }

    #[test]
    fn test_configured_buffers_are_allocated_per_zone() {
        let mut config = DeviceConfig::default();
        config.zns.zrwa_size = 64 * KIB;
        config.zns.zrwafg_size = 16 * KIB;
        config.zns.zrwa_buffer_size = 64 * KIB;

        let f = fixture(config, GIB);
        let ftl = f.ns.ftl().unwrap();

        let zrwa = ftl.zrwa_buffers().unwrap();
        assert_eq!(zrwa.len(), 8);
        assert_eq!(zrwa.buffer_size(), 64 * KIB);
        assert_eq!(zrwa.lock(7).unwrap().remaining(), 64 * KIB);
        assert!(ftl.zone_write_buffers().is_none());
        assert_eq!(ftl.params().lbas_per_zrwa, 128);
    }

    #[test]
    fn test_zone_write_buffers_without_zrwa() {
        let mut config = DeviceConfig::default();
        config.zns.zone_wb_size = 256 * KIB;

        let f = fixture(config, GIB);
        let ftl = f.ns.ftl().unwrap();

        let wb = ftl.zone_write_buffers().unwrap();
        assert_eq!(wb.len(), ftl.params().nr_zones as usize);
        assert_eq!(wb.buffer_size(), 256 * KIB);
        assert_eq!(wb.lock(7).unwrap().remaining(), 256 * KIB);
        assert!(wb.lock(8).is_err());
        assert!(ftl.zrwa_buffers().is_none());
    }

    #[test]
    fn test_zrwa_and_write_buffers_together() {
        let mut config = DeviceConfig::default();
        config.zns.zrwa_size = 64 * KIB;
        config.zns.zrwafg_size = 16 * KIB;
        config.zns.zrwa_buffer_size = 64 * KIB;
        config.zns.zone_wb_size = 256 * KIB;

        let f = fixture(config, GIB);
        let ftl = f.ns.ftl().unwrap();

        let zrwa = ftl.zrwa_buffers().unwrap();
        let wb = ftl.zone_write_buffers().unwrap();
        assert_eq!(zrwa.len(), 8);
        assert_eq!(wb.len(), 8);
        assert_eq!(zrwa.buffer_size(), 64 * KIB);
        assert_eq!(wb.buffer_size(), 256 * KIB);
        assert_eq!(wb.lock(0).unwrap().remaining(), 256 * KIB);
    }

    #[test]
    fn test_cell_profiles_follow_zone_mode() {
        let f = default_fixture();
        let ftl = f.ns.ftl().unwrap();

        let baseline = ftl.zone_geometry(3).unwrap().geometry;
        assert_eq!(baseline.layout, ftl.timing().geometry().layout);

        ftl.set_zone_cell_mode(3, CellMode::Fast).unwrap();
        let fast = ftl.zone_geometry(3).unwrap();
        assert_eq!(fast.mode, CellMode::Fast);
        assert_eq!(fast.geometry.layout.pages_per_oneshot * 4, baseline.layout.pages_per_oneshot);
        assert_eq!(ftl.zone_geometry(2).unwrap().mode, CellMode::Baseline);
        assert!(ftl.zone_geometry(8).is_err());
    }

    #[test]
    fn test_remove_shuts_timing_model_down_once() {
        let engine = Arc::new(CountingEngine::default());
        let mut ns = Namespace::builder(DeviceConfig::default())
            .timing_engine(engine.clone())
            .create(2, GIB, Arc::new(DetachedMapping::new(GIB)), 1)
            .unwrap();

        assert_eq!(engine.constructed.load(Ordering::SeqCst), 1);
        ns.remove().unwrap();
        assert_eq!(engine.shutdowns.load(Ordering::SeqCst), 1);

        assert_matches!(ns.remove(), Err(Error::NamespaceDetached(2)));
        assert_eq!(engine.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_zone_layout_shuts_timing_model_down() {
        let engine = Arc::new(CountingEngine::default());
        let capacity = GIB + 4 * MIB;
        let result = Namespace::builder(DeviceConfig::default())
            .timing_engine(engine.clone())
            .create(3, capacity, Arc::new(DetachedMapping::new(capacity)), 1);

        assert_matches!(result, Err(Error::ZoneLayout(_)));
        assert_eq!(engine.constructed.load(Ordering::SeqCst), 1);
        assert_eq!(engine.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detached_namespace_rejects_commands() {
        let mut f = default_fixture();
        f.ns.remove().unwrap();

        let req = IoRequest::new(Opcode::Flush, 1);
        let mut ret = IoResult::default();
        assert_matches!(
            f.ns.process_io_cmd(&req, &mut ret),
            Err(Error::NamespaceDetached(1))
        );
        assert_eq!(f.ns.id(), 1);
        assert_eq!(f.ns.size(), GIB);
    }

    #[test]
    fn test_host_mapping_backs_namespace() {
        let capacity = 256 * MIB;
        let mut config = DeviceConfig::default();
        config.zns.zone_size = 32 * MIB;

        let mapping: Arc<dyn StorageMapping> = Arc::new(HostMapping::new(capacity).unwrap());
        let ns = Namespace::create(config, 4, capacity, mapping.clone(), 1).unwrap();
        assert_eq!(ns.ftl().unwrap().params().nr_zones, 8);

        ns.mapping().write_at(4096, b"zone data").unwrap();
        let mut buf = [0u8; 9];
        mapping.read_at(4096, &mut buf).unwrap();
        assert_eq!(&buf, b"zone data");
    }
}

// =============================================================================
// Dispatch Tests
// =============================================================================

mod dispatch_tests {
    use super::*;

    #[test]
    fn test_write_and_append_share_write_handler() {
        let f = default_fixture();

        let (handled, ret) = submit(&f.ns, Opcode::Write);
        assert!(handled);
        assert_eq!(ret.status, StatusCode::SUCCESS);
        assert!(submit(&f.ns, Opcode::ZoneAppend).0);

        assert_eq!(
            f.handlers.calls(),
            vec![("write", Opcode::Write), ("write", Opcode::ZoneAppend)]
        );
        let stats = f.dispatcher.stats().snapshot();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.appends, 1);
    }

    #[test]
    fn test_read_and_zone_management_routes() {
        let f = default_fixture();

        assert!(submit(&f.ns, Opcode::Read).0);
        assert!(submit(&f.ns, Opcode::ZoneMgmtSend).0);
        assert!(submit(&f.ns, Opcode::ZoneMgmtRecv).0);

        assert_eq!(
            f.handlers.calls(),
            vec![
                ("read", Opcode::Read),
                ("zone_mgmt_send", Opcode::ZoneMgmtSend),
                ("zone_mgmt_recv", Opcode::ZoneMgmtRecv),
            ]
        );
    }

    #[test]
    fn test_raw_opcodes_route_like_named_ones() {
        let f = default_fixture();

        assert!(submit(&f.ns, 0x01u8).0);
        assert!(submit(&f.ns, 0x7du8).0);
        assert!(submit(&f.ns, 0x02u8).0);

        assert_eq!(
            f.handlers.calls(),
            vec![
                ("write", Opcode::Write),
                ("write", Opcode::ZoneAppend),
                ("read", Opcode::Read),
            ]
        );
    }

    #[test]
    fn test_backpressure_propagates() {
        let f = default_fixture();
        f.handlers.backpressure.store(true, Ordering::SeqCst);

        assert!(!submit(&f.ns, Opcode::Write).0);
        assert!(!submit(&f.ns, Opcode::Read).0);
        assert_eq!(f.dispatcher.stats().snapshot().deferred, 2);

        f.handlers.backpressure.store(false, Ordering::SeqCst);
        assert!(submit(&f.ns, Opcode::Write).0);
        assert_eq!(f.dispatcher.stats().snapshot().deferred, 2);
    }

    #[test]
    fn test_unknown_opcode_leaves_result_untouched() {
        let f = default_fixture();

        for opcode in [Opcode::Compare, Opcode::DatasetManagement, Opcode::Other(0xC3)] {
            let req = IoRequest::new(opcode, 1);
            let mut ret = IoResult {
                status: StatusCode(0x1234),
                nsecs_target: 77,
            };
            assert!(f.ns.process_io_cmd(&req, &mut ret).unwrap());
            assert_eq!(ret.status, StatusCode(0x1234));
            assert_eq!(ret.nsecs_target, 77);
        }

        assert!(f.handlers.calls().is_empty());
        assert_eq!(f.dispatcher.stats().snapshot().unsupported, 3);
    }

    #[test]
    fn test_zone_open_respects_resource_limits() {
        let f = default_fixture();
        let zone_lbas = f.ns.ftl().unwrap().params().lbas_per_zone;

        for zone in 0..8u64 {
            let req = IoRequest::new(Opcode::ZoneMgmtSend, 1).with_range(zone * zone_lbas, 0);
            let mut ret = IoResult::default();
            assert!(f.ns.process_io_cmd(&req, &mut ret).unwrap());
            assert_eq!(ret.status, StatusCode::SUCCESS);
        }

        let ftl = f.ns.ftl().unwrap();
        assert_eq!(ftl.resources().acquired(ResourceKind::Active), 8);
        assert_eq!(ftl.resources().acquired(ResourceKind::Open), 8);
        assert!(ftl
            .zones()
            .snapshot()
            .iter()
            .all(|z| z.state == ZoneState::ExplicitOpen));

        // Every zone already holds a resource, so a ninth open is refused.
        let req = IoRequest::new(Opcode::ZoneMgmtSend, 1).with_range(0, 0);
        let mut ret = IoResult::default();
        assert!(f.ns.process_io_cmd(&req, &mut ret).unwrap());
        assert_eq!(ret.status, StatusCode::ZONE_TOO_MANY_ACTIVE);
    }

    #[test]
    fn test_default_dispatcher_rejects_data_path() {
        let ns = Namespace::create(
            DeviceConfig::default(),
            1,
            GIB,
            Arc::new(DetachedMapping::new(GIB)),
            1,
        )
        .unwrap();

        let (handled, ret) = submit(&ns, Opcode::Write);
        assert!(handled);
        assert_eq!(ret.status, StatusCode::INVALID_OPCODE);

        let (handled, ret) = submit(&ns, Opcode::Flush);
        assert!(handled);
        assert_eq!(ret.status, StatusCode::SUCCESS);
    }

    #[test]
    fn test_dispatcher_shared_across_threads() {
        let f = default_fixture();
        let processor: Arc<dyn IoCommandProcessor> = f.dispatcher.clone();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..25 {
                        let req = IoRequest::new(Opcode::Write, 1);
                        let mut ret = IoResult::default();
                        assert!(processor.process(&f.ns, &req, &mut ret).unwrap());
                    }
                });
            }
        });

        assert_eq!(f.dispatcher.stats().snapshot().writes, 100);
        assert_eq!(f.handlers.calls().len(), 100);
    }
}

// =============================================================================
// Flush Tests
// =============================================================================

mod flush_tests {
    use super::*;

    #[test]
    fn test_idle_flush_completes_now() {
        let f = default_fixture();

        let (handled, ret) = submit(&f.ns, Opcode::Flush);
        assert!(handled);
        assert_eq!(ret.status, StatusCode::SUCCESS);
        assert_eq!(ret.nsecs_target, 1_000_000);
        assert!(f.handlers.calls().is_empty());
    }

    #[test]
    fn test_flush_waits_for_busiest_lane() {
        let f = default_fixture();
        let timing = f.ns.ftl().unwrap().timing();

        timing
            .reserve(MediaTarget::Lun { channel: 0, lun: 0 }, 1_000_000, 50_000)
            .unwrap();
        timing
            .reserve(MediaTarget::Lun { channel: 7, lun: 3 }, 1_000_000, 80_000)
            .unwrap();
        timing.reserve(MediaTarget::Host, 1_000_000, 10_000).unwrap();

        let (_, ret) = submit(&f.ns, Opcode::Flush);
        assert_eq!(ret.status, StatusCode::SUCCESS);
        assert_eq!(ret.nsecs_target, 1_080_000);
    }

    #[test]
    fn test_flush_never_completes_before_now() {
        let f = default_fixture();
        let timing = f.ns.ftl().unwrap().timing();
        timing.reserve(MediaTarget::Channel(2), 1_000_000, 5_000).unwrap();

        f.clock.advance(1_000_000);
        let (_, ret) = submit(&f.ns, Opcode::Flush);
        assert_eq!(ret.nsecs_target, 2_000_000);
        assert!(ret.nsecs_target >= timing.next_idle_time());
    }

    #[test]
    fn test_flush_with_monotonic_clock() {
        let ns = Namespace::builder(DeviceConfig::default())
            .clock(Arc::new(MonotonicClock))
            .create(1, GIB, Arc::new(DetachedMapping::new(GIB)), 1)
            .unwrap();

        let before = MonotonicClock.now_ns();
        let (_, ret) = submit(&ns, Opcode::Flush);
        assert_eq!(ret.status, StatusCode::SUCCESS);
        assert!(ret.nsecs_target >= before);
    }
}
