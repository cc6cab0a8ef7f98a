//! I/O command dispatch
//!
//! Every command a namespace receives goes through the [`IoCommandProcessor`]
//! installed at creation. The zoned dispatcher routes data and zone
//! management commands to pluggable [`ZoneIoHandlers`] and completes flush
//! itself:
//!
//! ```text
//!   write, zone-append ──► handlers.write
//!   read ────────────────► handlers.read
//!   zone-mgmt-send ──────► handlers.zone_mgmt_send
//!   zone-mgmt-recv ──────► handlers.zone_mgmt_recv
//!   flush ───────────────► completed here
//!   anything else ───────► logged, result left untouched
//! ```
//!
//! A `false` return means the command could not be accepted yet and the
//! caller should resubmit it later.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::namespace::Namespace;
use crate::nvme::{IoRequest, IoResult, Opcode, StatusCode};

/// Entry point a namespace hands every inbound I/O command to.
pub trait IoCommandProcessor: Send + Sync + Debug {
    /// Process `req` and fill in `ret`.
    ///
    /// Returns `Ok(true)` when the command was consumed and `Ok(false)` when
    /// it must be retried.
    fn process(&self, ns: &Namespace, req: &IoRequest, ret: &mut IoResult) -> Result<bool>;
}

/// Data-path and zone-management handlers the zoned dispatcher delegates to.
pub trait ZoneIoHandlers: Send + Sync + Debug {
    /// Write or zone append. `false` applies backpressure.
    fn write(&self, ns: &Namespace, req: &IoRequest, ret: &mut IoResult) -> bool;

    /// Read. `false` applies backpressure.
    fn read(&self, ns: &Namespace, req: &IoRequest, ret: &mut IoResult) -> bool;

    fn zone_mgmt_send(&self, ns: &Namespace, req: &IoRequest, ret: &mut IoResult);

    fn zone_mgmt_recv(&self, ns: &Namespace, req: &IoRequest, ret: &mut IoResult);
}

/// Handlers that reject every delegated command with `INVALID_OPCODE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedZoneIo;

impl UnsupportedZoneIo {
    fn reject(req: &IoRequest, ret: &mut IoResult) {
        warn!("No handler installed for {} on nsid {}", req.opcode, req.nsid);
        ret.status = StatusCode::INVALID_OPCODE;
    }
}

impl ZoneIoHandlers for UnsupportedZoneIo {
    fn write(&self, _ns: &Namespace, req: &IoRequest, ret: &mut IoResult) -> bool {
        Self::reject(req, ret);
        true
    }

    fn read(&self, _ns: &Namespace, req: &IoRequest, ret: &mut IoResult) -> bool {
        Self::reject(req, ret);
        true
    }

    fn zone_mgmt_send(&self, _ns: &Namespace, req: &IoRequest, ret: &mut IoResult) {
        Self::reject(req, ret);
    }

    fn zone_mgmt_recv(&self, _ns: &Namespace, req: &IoRequest, ret: &mut IoResult) {
        Self::reject(req, ret);
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Per-route command counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub writes: AtomicU64,
    pub appends: AtomicU64,
    pub reads: AtomicU64,
    pub flushes: AtomicU64,
    pub zone_mgmt_send: AtomicU64,
    pub zone_mgmt_recv: AtomicU64,
    /// Commands with an opcode no route exists for
    pub unsupported: AtomicU64,
    /// Commands a handler asked to be retried
    pub deferred: AtomicU64,
}

impl DispatchStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            writes: self.writes.load(Ordering::Relaxed),
            appends: self.appends.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            zone_mgmt_send: self.zone_mgmt_send.load(Ordering::Relaxed),
            zone_mgmt_recv: self.zone_mgmt_recv.load(Ordering::Relaxed),
            unsupported: self.unsupported.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatch statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStatsSnapshot {
    pub writes: u64,
    pub appends: u64,
    pub reads: u64,
    pub flushes: u64,
    pub zone_mgmt_send: u64,
    pub zone_mgmt_recv: u64,
    pub unsupported: u64,
    pub deferred: u64,
}

// =============================================================================
// Zoned dispatcher
// =============================================================================

/// Command router of a zoned namespace.
#[derive(Debug)]
pub struct ZnsDispatcher {
    handlers: Arc<dyn ZoneIoHandlers>,
    stats: DispatchStats,
}

impl Default for ZnsDispatcher {
    fn default() -> Self {
        Self::new(Arc::new(UnsupportedZoneIo))
    }
}

impl ZnsDispatcher {
    pub fn new(handlers: Arc<dyn ZoneIoHandlers>) -> Self {
        Self {
            handlers,
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    fn accepted(&self, accepted: bool) -> bool {
        if !accepted {
            DispatchStats::bump(&self.stats.deferred);
        }
        accepted
    }
}

/// Complete a flush once every partition's media has gone idle.
///
/// The completion time is never earlier than the current time.
pub fn flush(ns: &Namespace, ret: &mut IoResult) -> Result<()> {
    let start = ns.clock().now_ns();
    let latest = ns
        .partitions()?
        .iter()
        .map(|ftl| ftl.timing().next_idle_time())
        .fold(start, u64::max);

    ret.status = StatusCode::SUCCESS;
    ret.nsecs_target = latest;

    debug!("Flush on nsid {} completes in {} ns", ns.id(), latest - start);
    Ok(())
}

impl IoCommandProcessor for ZnsDispatcher {
    fn process(&self, ns: &Namespace, req: &IoRequest, ret: &mut IoResult) -> Result<bool> {
        let handled = match req.opcode {
            Opcode::Write => {
                DispatchStats::bump(&self.stats.writes);
                self.accepted(self.handlers.write(ns, req, ret))
            }
            Opcode::ZoneAppend => {
                DispatchStats::bump(&self.stats.appends);
                self.accepted(self.handlers.write(ns, req, ret))
            }
            Opcode::Read => {
                DispatchStats::bump(&self.stats.reads);
                self.accepted(self.handlers.read(ns, req, ret))
            }
            Opcode::Flush => {
                DispatchStats::bump(&self.stats.flushes);
                flush(ns, ret)?;
                true
            }
            Opcode::ZoneMgmtSend => {
                DispatchStats::bump(&self.stats.zone_mgmt_send);
                self.handlers.zone_mgmt_send(ns, req, ret);
                true
            }
            Opcode::ZoneMgmtRecv => {
                DispatchStats::bump(&self.stats.zone_mgmt_recv);
                self.handlers.zone_mgmt_recv(ns, req, ret);
                true
            }
            other => {
                DispatchStats::bump(&self.stats.unsupported);
                error!("Unimplemented command: {}", other);
                true
            }
        };

        Ok(handled)
    }
}
