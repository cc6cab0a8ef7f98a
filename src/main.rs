//! zns-ftl
//!
//! Creates a zoned namespace from a device configuration, prints its zone
//! layout and cell profiles, flushes it and removes it again.
//!
//! ```text
//! zns-ftl --capacity 1G --zone-size 128M --format json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zns_ftl::config::{parse_byte_size, DeviceConfig, MIB};
use zns_ftl::mapping::DetachedMapping;
use zns_ftl::nvme::{IoRequest, IoResult, Opcode, StatusCode};
use zns_ftl::ssd::FlashLayout;
use zns_ftl::zns::{CellMode, ResourceUsage, ZoneParams};
use zns_ftl::Namespace;

// =============================================================================
// CLI Arguments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// ZNS FTL - inspect the zone layout of a simulated ZNS namespace
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Namespace capacity (K/M/G/T suffixes accepted)
    #[arg(long, env = "ZNS_CAPACITY", default_value = "1G")]
    capacity: String,

    /// Device configuration file (YAML)
    #[arg(long, env = "ZNS_CONFIG")]
    config: Option<PathBuf>,

    /// Zone size, overrides the configuration file
    #[arg(long, env = "ZNS_ZONE_SIZE")]
    zone_size: Option<String>,

    /// Namespace identifier
    #[arg(long, default_value = "1")]
    namespace_id: u32,

    /// Number of I/O dispatchers the timing model serves
    #[arg(long, default_value = "1")]
    dispatchers: u32,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Serialize)]
struct CellReport {
    mode: CellMode,
    read_latency_ns: u64,
    prog_latency_ns: u64,
    layout: FlashLayout,
}

#[derive(Debug, Serialize)]
struct NamespaceReport {
    nsid: u32,
    capacity: u64,
    zones: ZoneParams,
    zrwa_buffers: bool,
    zone_write_buffers: bool,
    resources: Vec<ResourceUsage>,
    cells: Vec<CellReport>,
    flush_status: StatusCode,
    flush_latency_ns: u64,
}

fn print_text(report: &NamespaceReport) {
    let zones = &report.zones;
    println!("namespace {}", report.nsid);
    println!("  capacity:        {} MiB", report.capacity / MIB);
    println!("  zone size:       {} MiB", zones.zone_size / MIB);
    println!("  zones:           {}", zones.nr_zones);
    println!("  LBAs per zone:   {}", zones.lbas_per_zone);
    println!("  ZRWA buffers:    {}", report.zrwa_buffers);
    println!("  write buffers:   {}", report.zone_write_buffers);
    for usage in &report.resources {
        println!(
            "  {:<6} resources {}/{}",
            usage.kind.to_string(),
            usage.acquired,
            usage.total
        );
    }
    for cell in &report.cells {
        println!(
            "  {}: {} pages/oneshot, {} pages/block, {} total pages, read {} ns, program {} ns",
            cell.mode,
            cell.layout.pages_per_oneshot,
            cell.layout.pages_per_block,
            cell.layout.total_pages,
            cell.read_latency_ns,
            cell.prog_latency_ns
        );
    }
    println!(
        "  flush:           status {:#x}, {} ns",
        report.flush_status.0, report.flush_latency_ns
    );
}

// =============================================================================
// Main
// =============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let mut config = match &args.config {
        Some(path) => DeviceConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => DeviceConfig::default(),
    };
    if let Some(zone_size) = &args.zone_size {
        config.zns.zone_size = parse_byte_size(zone_size)?;
    }
    let capacity = parse_byte_size(&args.capacity)?;

    info!("Creating namespace {} of {} bytes", args.namespace_id, capacity);
    let mut ns = Namespace::create(
        config,
        args.namespace_id,
        capacity,
        Arc::new(DetachedMapping::new(capacity)),
        args.dispatchers,
    )
    .context("creating namespace")?;

    let report = {
        let ftl = ns.ftl()?;

        let now = ns.clock().now_ns();
        let flush = IoRequest::new(Opcode::Flush, ns.id()).at(now);
        let mut ret = IoResult::default();
        ns.process_io_cmd(&flush, &mut ret)?;

        NamespaceReport {
            nsid: ns.id(),
            capacity: ns.size(),
            zones: *ftl.params(),
            zrwa_buffers: ftl.zrwa_buffers().is_some(),
            zone_write_buffers: ftl.zone_write_buffers().is_some(),
            resources: ftl.resources().snapshot(),
            cells: [CellMode::Fast, CellMode::Baseline]
                .into_iter()
                .map(|mode| {
                    let cell = ftl.cell_geometry(mode);
                    CellReport {
                        mode,
                        read_latency_ns: cell.geometry.nand.read_ns,
                        prog_latency_ns: cell.geometry.nand.prog_ns,
                        layout: cell.geometry.layout,
                    }
                })
                .collect(),
            flush_status: ret.status,
            flush_latency_ns: ret.nsecs_target.saturating_sub(now),
        }
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }

    ns.remove()?;
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Reports go to stdout, logs to stderr.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
