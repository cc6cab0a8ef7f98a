//! Error types for the ZNS FTL core

use thiserror::Error;

use crate::zns::resource::ResourceKind;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or driving a zoned namespace
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Layout / Geometry Errors (fatal at namespace creation)
    // =========================================================================
    /// Capacity, zone size and page size do not divide evenly
    #[error("Invalid zone layout: {0}")]
    ZoneLayout(String),

    /// Flash geometry could not be derived
    #[error("Invalid flash geometry: {0}")]
    Geometry(String),

    // =========================================================================
    // Resource Errors (recoverable)
    // =========================================================================
    /// No more zones of this kind may transition right now
    #[error("{kind} zone resources exhausted: {total} of {total} acquired")]
    ResourceExhausted { kind: ResourceKind, total: u32 },

    /// Release without a matching acquire
    #[error("{kind} zone resource released with nothing acquired")]
    ResourceUnderflow { kind: ResourceKind },

    // =========================================================================
    // Zone Errors
    // =========================================================================
    /// Zone index outside the zone table
    #[error("Zone {zone} out of range (namespace has {nr_zones} zones)")]
    ZoneOutOfRange { zone: u32, nr_zones: u32 },

    /// Write pointer would leave the zone's LBA range
    #[error("Write pointer {wp:#x} outside zone {zone} range [{start:#x}, {end:#x}]")]
    WritePointerOutOfRange {
        zone: u32,
        wp: u64,
        start: u64,
        end: u64,
    },

    /// Zone buffer accounting violated
    #[error("Zone buffer error: {0}")]
    Buffer(String),

    // =========================================================================
    // Namespace / Timing Errors
    // =========================================================================
    /// The namespace's FTL has already been removed
    #[error("Namespace {0} has no attached FTL")]
    NamespaceDetached(u32),

    /// The timing model has been shut down
    #[error("Timing model is shut down")]
    TimingModelStopped,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
