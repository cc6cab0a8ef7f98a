//! Property-Based Tests for Zone State
//!
//! # Test Properties
//!
//! 1. **Zone Tiling**: zones are contiguous, equally sized and cover the
//!    namespace exactly
//! 2. **Fast-Mode Consistency**: the fast profile's aggregates always match
//!    its primary fields and hold a quarter of the baseline pages
//! 3. **Determinism**: deriving the cell profiles twice gives equal results
//! 4. **Quota Bound**: a pool never grants more than its total

#![cfg(test)]

use proptest::prelude::*;

use super::cell::{CellGeometrySet, CellMode, FAST_MODE_DENSITY_RATIO};
use super::params::ZoneParams;
use super::resource::{ResourceKind, ResourcePool};
use super::zone::{ZoneState, ZoneTable};
use crate::config::{CellLatencyConfig, SsdConfig, ZnsConfig, GIB, KIB};
use crate::ssd::FlashGeometry;

// =============================================================================
// Property Strategies
// =============================================================================

/// (pages per zone, zone count) with 4 KiB pages.
fn zone_layout_strategy() -> impl Strategy<Value = (u64, u32)> {
    (1u64..=256, 1u32..=64)
}

/// SSD arrays with unusual but valid shapes.
fn ssd_config_strategy() -> impl Strategy<Value = (SsdConfig, u64)> {
    (
        prop::sample::select(vec![1u32, 2, 4, 8]),
        1u32..=4,
        1u32..=2,
        1u64..=4,
        prop::sample::select(vec![GIB / 2, GIB, 2 * GIB]),
    )
        .prop_map(|(channels, luns, planes, oneshot_flash_pages, capacity)| {
            let config = SsdConfig {
                channels,
                luns_per_channel: luns,
                planes_per_lun: planes,
                flash_page_size: 32 * KIB,
                oneshot_page_size: 32 * KIB * oneshot_flash_pages,
                ..Default::default()
            };
            (config, capacity)
        })
}

// =============================================================================
// Zone Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Zones tile the namespace without gaps or overlap.
    #[test]
    fn prop_zones_tile_namespace((pages_per_zone, nr_zones) in zone_layout_strategy()) {
        let zone_size = pages_per_zone * 4 * KIB;
        let capacity = zone_size * u64::from(nr_zones);
        let layout = FlashGeometry::from_config(&SsdConfig::default(), GIB, 1).unwrap().layout;
        let params = ZoneParams::derive(&ZnsConfig::with_zone_size(zone_size), &layout, capacity)
            .unwrap();
        prop_assert_eq!(params.nr_zones, nr_zones);

        let table = ZoneTable::new(&params);
        let zones = table.snapshot();
        prop_assert_eq!(zones.len(), nr_zones as usize);

        let mut next_lba = 0;
        for (i, zone) in zones.iter().enumerate() {
            prop_assert_eq!(zone.start_lba(), next_lba);
            prop_assert_eq!(zone.write_pointer(), zone.start_lba());
            prop_assert_eq!(zone.capacity_in_lbas(), params.lbas_per_zone);
            prop_assert_eq!(zone.state, ZoneState::Empty);
            prop_assert_eq!(zone.index() as usize, i);
            next_lba = zone.end_lba();
        }
        prop_assert_eq!(next_lba * 512, capacity);
        prop_assert_eq!(table.zone_of(next_lba), None);
    }

    /// A capacity with a partial trailing zone is always rejected.
    #[test]
    fn prop_partial_zone_rejected(
        (pages_per_zone, nr_zones) in zone_layout_strategy(),
        extra_pages in 1u64..=255,
    ) {
        prop_assume!(extra_pages < pages_per_zone);
        let zone_size = pages_per_zone * 4 * KIB;
        let capacity = zone_size * u64::from(nr_zones) + extra_pages * 4 * KIB;
        let layout = FlashGeometry::from_config(&SsdConfig::default(), GIB, 1).unwrap().layout;
        prop_assert!(
            ZoneParams::derive(&ZnsConfig::with_zone_size(zone_size), &layout, capacity).is_err()
        );
    }
}

// =============================================================================
// Cell Geometry Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fast_mode_is_consistent((config, capacity) in ssd_config_strategy()) {
        let base = FlashGeometry::from_config(&config, capacity, 1).unwrap();
        let cells = CellGeometrySet::derive(&base, &CellLatencyConfig::default()).unwrap();

        let fast = cells.get(CellMode::Fast).geometry.layout;
        prop_assert!(fast.check_consistency().is_ok());
        prop_assert_eq!(fast.flash_pages_per_block, base.layout.oneshots_per_block);
        prop_assert_eq!(fast.total_pages * FAST_MODE_DENSITY_RATIO, base.layout.total_pages);
        prop_assert_eq!(fast.blocks_per_plane, base.layout.blocks_per_plane);

        let baseline = cells.get(CellMode::Baseline).geometry.layout;
        prop_assert_eq!(baseline, base.layout);
    }

    #[test]
    fn prop_cell_derivation_is_deterministic((config, capacity) in ssd_config_strategy()) {
        let base = FlashGeometry::from_config(&config, capacity, 1).unwrap();
        let latency = CellLatencyConfig::default();
        let first = CellGeometrySet::derive(&base, &latency).unwrap();
        let second = CellGeometrySet::derive(&base, &latency).unwrap();
        prop_assert_eq!(first, second);
    }
}

// =============================================================================
// Resource Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_pool_never_oversubscribes(total in 0u32..=32, attempts in 0u32..=64) {
        let pool = ResourcePool::new(total);
        let granted = (0..attempts)
            .filter(|_| pool.acquire(ResourceKind::Active).is_ok())
            .count() as u32;

        prop_assert_eq!(granted, attempts.min(total));
        prop_assert_eq!(pool.acquired(ResourceKind::Active), granted);
        prop_assert_eq!(pool.available(ResourceKind::Active), total - granted);
        prop_assert_eq!(pool.acquired(ResourceKind::Open), 0);
    }
}
