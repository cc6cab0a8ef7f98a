//! ZNS FTL - Zoned Namespace flash translation layer core
//!
//! Namespace-level state of a simulated NVMe ZNS device: zone layout, zone
//! descriptors, per-zone acceleration buffers, zone resource quotas, the
//! fast/baseline cell geometry profiles and the I/O command dispatcher.
//!
//! # Architecture
//!
//! ```text
//!              ┌─────────────┐
//!  IoRequest ─▶│  Namespace  │─▶ IoCommandProcessor (ZnsDispatcher)
//!              └──────┬──────┘        │            │
//!                     │          ZoneIoHandlers   flush
//!                     ▼                            │
//!               FtlState (per partition) ◀─────────┘
//!               ├─ ZoneTable / ZoneReport
//!               ├─ ZoneBufferSet (ZRWA, write buffer)
//!               ├─ ResourcePool
//!               ├─ CellGeometrySet
//!               └─ DeviceTimingModel
//! ```
//!
//! # Modules
//!
//! - [`clock`] - Time sources for completion timestamps
//! - [`config`] - Device configuration
//! - [`dispatch`] - Command routing and flush
//! - [`error`] - Error types
//! - [`mapping`] - Namespace backing storage
//! - [`namespace`] - Namespace create/remove
//! - [`nvme`] - Opcodes, status codes, requests
//! - [`ssd`] - Flash geometry and the timing engine seam
//! - [`zns`] - Zone state

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mapping;
pub mod namespace;
pub mod nvme;
pub mod ssd;
pub mod zns;

// Re-export commonly used types
pub use config::DeviceConfig;
pub use dispatch::{IoCommandProcessor, ZnsDispatcher, ZoneIoHandlers};
pub use error::{Error, Result};
pub use namespace::{Namespace, NamespaceBuilder};
pub use nvme::{IoRequest, IoResult, Opcode, StatusCode};
pub use zns::{CellMode, FtlState, ZoneParams};
