//! NVMe command-set vocabulary
//!
//! Opcodes, status codes and the request/result pair that flows through the
//! dispatcher. Only the fields the FTL core and its handlers need are
//! modelled; the raw opcode byte is always preserved.

use serde::{Deserialize, Serialize};

/// Command set identifier of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandSet {
    Nvm = 0x00,
    KeyValue = 0x01,
    Zoned = 0x02,
}

// =============================================================================
// Opcodes
// =============================================================================

/// I/O command opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Flush,
    Write,
    Read,
    WriteUncorrectable,
    Compare,
    WriteZeroes,
    DatasetManagement,
    Verify,
    ReservationRegister,
    ReservationReport,
    ReservationAcquire,
    ReservationRelease,
    Copy,
    ZoneMgmtSend,
    ZoneMgmtRecv,
    ZoneAppend,
    /// Any value the command set does not define
    Other(u8),
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Opcode::Flush,
            0x01 => Opcode::Write,
            0x02 => Opcode::Read,
            0x04 => Opcode::WriteUncorrectable,
            0x05 => Opcode::Compare,
            0x08 => Opcode::WriteZeroes,
            0x09 => Opcode::DatasetManagement,
            0x0c => Opcode::Verify,
            0x0d => Opcode::ReservationRegister,
            0x0e => Opcode::ReservationReport,
            0x11 => Opcode::ReservationAcquire,
            0x15 => Opcode::ReservationRelease,
            0x19 => Opcode::Copy,
            0x79 => Opcode::ZoneMgmtSend,
            0x7a => Opcode::ZoneMgmtRecv,
            0x7d => Opcode::ZoneAppend,
            other => Opcode::Other(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        match opcode {
            Opcode::Flush => 0x00,
            Opcode::Write => 0x01,
            Opcode::Read => 0x02,
            Opcode::WriteUncorrectable => 0x04,
            Opcode::Compare => 0x05,
            Opcode::WriteZeroes => 0x08,
            Opcode::DatasetManagement => 0x09,
            Opcode::Verify => 0x0c,
            Opcode::ReservationRegister => 0x0d,
            Opcode::ReservationReport => 0x0e,
            Opcode::ReservationAcquire => 0x11,
            Opcode::ReservationRelease => 0x15,
            Opcode::Copy => 0x19,
            Opcode::ZoneMgmtSend => 0x79,
            Opcode::ZoneMgmtRecv => 0x7a,
            Opcode::ZoneAppend => 0x7d,
            Opcode::Other(value) => value,
        }
    }
}

impl Opcode {
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Flush => "nvme_cmd_flush",
            Opcode::Write => "nvme_cmd_write",
            Opcode::Read => "nvme_cmd_read",
            Opcode::WriteUncorrectable => "nvme_cmd_write_uncor",
            Opcode::Compare => "nvme_cmd_compare",
            Opcode::WriteZeroes => "nvme_cmd_write_zeroes",
            Opcode::DatasetManagement => "nvme_cmd_dsm",
            Opcode::Verify => "nvme_cmd_verify",
            Opcode::ReservationRegister => "nvme_cmd_resv_register",
            Opcode::ReservationReport => "nvme_cmd_resv_report",
            Opcode::ReservationAcquire => "nvme_cmd_resv_acquire",
            Opcode::ReservationRelease => "nvme_cmd_resv_release",
            Opcode::Copy => "nvme_cmd_copy",
            Opcode::ZoneMgmtSend => "nvme_cmd_zone_mgmt_send",
            Opcode::ZoneMgmtRecv => "nvme_cmd_zone_mgmt_recv",
            Opcode::ZoneAppend => "nvme_cmd_zone_append",
            Opcode::Other(_) => "unknown",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), u8::from(*self))
    }
}

// =============================================================================
// Status
// =============================================================================

/// NVMe completion status (status code type and status code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const SUCCESS: StatusCode = StatusCode(0x000);
    pub const INVALID_OPCODE: StatusCode = StatusCode(0x001);
    pub const INVALID_FIELD: StatusCode = StatusCode(0x002);
    pub const INTERNAL: StatusCode = StatusCode(0x006);
    pub const LBA_RANGE: StatusCode = StatusCode(0x080);
    pub const ZONE_BOUNDARY_ERROR: StatusCode = StatusCode(0x1b8);
    pub const ZONE_FULL: StatusCode = StatusCode(0x1b9);
    pub const ZONE_READ_ONLY: StatusCode = StatusCode(0x1ba);
    pub const ZONE_OFFLINE: StatusCode = StatusCode(0x1bb);
    pub const ZONE_INVALID_WRITE: StatusCode = StatusCode(0x1bc);
    pub const ZONE_TOO_MANY_ACTIVE: StatusCode = StatusCode(0x1bd);
    pub const ZONE_TOO_MANY_OPEN: StatusCode = StatusCode(0x1be);
    pub const ZONE_INVALID_TRANSITION: StatusCode = StatusCode(0x1bf);

    pub fn is_success(&self) -> bool {
        *self == StatusCode::SUCCESS
    }
}

// =============================================================================
// Request / Result
// =============================================================================

/// An inbound I/O command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoRequest {
    pub opcode: Opcode,
    pub nsid: u32,
    /// Starting LBA (zone start LBA for zone commands)
    pub slba: u64,
    /// Number of logical blocks, zero-based as on the wire
    pub nlb: u32,
    /// Time the command was fetched
    pub nsecs_start: u64,
}

impl IoRequest {
    pub fn new(opcode: impl Into<Opcode>, nsid: u32) -> Self {
        Self {
            opcode: opcode.into(),
            nsid,
            slba: 0,
            nlb: 0,
            nsecs_start: 0,
        }
    }

    pub fn with_range(mut self, slba: u64, nlb: u32) -> Self {
        self.slba = slba;
        self.nlb = nlb;
        self
    }

    pub fn at(mut self, nsecs_start: u64) -> Self {
        self.nsecs_start = nsecs_start;
        self
    }

    /// Number of logical blocks covered.
    pub fn block_count(&self) -> u64 {
        u64::from(self.nlb) + 1
    }
}

/// Outcome of a completed I/O command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoResult {
    pub status: StatusCode,
    /// Simulated completion time
    pub nsecs_target: u64,
}
