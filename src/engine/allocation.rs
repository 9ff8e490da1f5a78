//! Capacity Planner
//!
//! Turns the selected disks and storage mode into the space budget that the
//! disko generator writes into the layout: boot partition size, `/nix`
//! quota, the atuin history volume, and what remains for `/home`.
//!
//! # Budget Rules
//!
//! | Item          | Size                                   |
//! |---------------|----------------------------------------|
//! | boot (ESP)    | 5 GiB, always outside the pool         |
//! | `/nix` quota  | 5% of the pool, at least 20 GiB        |
//! | atuin volume  | 0.05% of the pool, at least 1 GiB      |
//! | `/home`       | whatever is left                       |
//!
//! Raw capacity of a multi-disk selection is scaled by the parity overhead
//! first: `(N-1)/N` for raidz, `(N-2)/N` for raidz2. All arithmetic is
//! truncating integer math on whole GiB.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, TuinixError};
use crate::inventory::Inventory;
use crate::step::CommandRunner;
use crate::types::StorageMode;

/// Size of the EFI System Partition in GiB.
pub const BOOT_SIZE_GB: i64 = 5;
/// Lower bound of the `/nix` quota in GiB.
pub const MIN_NIX_GB: i64 = 20;
/// Lower bound of the atuin volume in GiB.
pub const MIN_ATUIN_GB: i64 = 1;
/// Capacity assumed when the measured total comes out as zero.
pub const DEFAULT_TOTAL_GB: i64 = 100;

/// One line of the space budget.
///
/// Serialized as the string disko expects (`"50G"`), `"(existing)"` or `""`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SpaceAllocation {
    /// A fixed size in GiB. Negative only for an over-committed `/home`.
    Gigabytes(i64),
    /// Reuses a partition the operator picked.
    Existing,
    /// No separate allocation in this layout.
    #[default]
    None,
}

impl SpaceAllocation {
    pub fn gigabytes(&self) -> Option<i64> {
        match self {
            Self::Gigabytes(gb) => Some(*gb),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for SpaceAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gigabytes(gb) => write!(f, "{}G", gb),
            Self::Existing => f.write_str("(existing)"),
            Self::None => Ok(()),
        }
    }
}

impl FromStr for SpaceAllocation {
    type Err = TuinixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Ok(Self::None),
            "(existing)" => Ok(Self::Existing),
            other => other
                .strip_suffix('G')
                .and_then(|n| n.parse().ok())
                .map(Self::Gigabytes)
                .ok_or_else(|| TuinixError::config(format!("invalid space allocation '{}'", s))),
        }
    }
}

impl From<SpaceAllocation> for String {
    fn from(value: SpaceAllocation) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for SpaceAllocation {
    type Error = TuinixError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// The space budget for one installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// EFI System Partition
    pub boot: SpaceAllocation,
    /// `/nix` dataset quota
    pub system_cache: SpaceAllocation,
    /// atuin history volume
    pub history_db: SpaceAllocation,
    /// `/home`, informational only (no quota is set)
    pub home: SpaceAllocation,
}

impl AllocationPlan {
    /// True when the fixed minimums exceed the pool and `/home` went negative.
    pub fn is_overcommitted(&self) -> bool {
        self.home.gigabytes().is_some_and(|gb| gb < 0)
    }

    /// Returns a summary of the plan for logging/display.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Space Allocation:".to_string(),
            format!("  Boot:  {}", display_or_dash(self.boot)),
            format!("  Nix:   {}", display_or_dash(self.system_cache)),
            format!("  Atuin: {}", display_or_dash(self.history_db)),
            format!("  Home:  {}", display_or_dash(self.home)),
        ];
        if self.is_overcommitted() {
            lines.push("  WARNING: disk too small for the minimum /nix and atuin sizes".to_string());
        }
        lines.join("\n")
    }
}

fn display_or_dash(alloc: SpaceAllocation) -> String {
    if alloc.is_none() {
        "-".to_string()
    } else {
        alloc.to_string()
    }
}

/// Usable capacity of the selection in GiB, before the boot partition is
/// taken out.
pub fn usable_capacity_gb(mode: StorageMode, disk_sizes_gb: &[i64]) -> i64 {
    let total = if mode.is_multi_disk() {
        let raw: i64 = disk_sizes_gb.iter().sum();
        let (num, den) = mode.redundancy_factor(disk_sizes_gb.len() as i64);
        raw * num / den
    } else {
        disk_sizes_gb.first().copied().unwrap_or(0)
    };

    if total == 0 { DEFAULT_TOTAL_GB } else { total }
}

/// Compute the space budget from disk sizes. Pure, no I/O.
///
/// Multi-disk modes use every size; single-disk modes use the first.
pub fn plan_allocation(mode: StorageMode, disk_sizes_gb: &[i64]) -> AllocationPlan {
    if mode.uses_partitions() {
        return AllocationPlan {
            boot: SpaceAllocation::Existing,
            ..AllocationPlan::default()
        };
    }

    let boot = SpaceAllocation::Gigabytes(BOOT_SIZE_GB);
    if !mode.is_zfs() {
        return AllocationPlan { boot, ..AllocationPlan::default() };
    }

    let pool = usable_capacity_gb(mode, disk_sizes_gb) - BOOT_SIZE_GB;
    let nix = (pool * 5 / 100).max(MIN_NIX_GB);
    let atuin = (pool * 5 / 10_000).max(MIN_ATUIN_GB);
    let home = pool - nix - atuin;

    let plan = AllocationPlan {
        boot,
        system_cache: SpaceAllocation::Gigabytes(nix),
        history_db: SpaceAllocation::Gigabytes(atuin),
        home: SpaceAllocation::Gigabytes(home),
    };

    if plan.is_overcommitted() {
        warn!(
            "Pool of {}G is smaller than the minimum nix ({}G) + atuin ({}G) budget; home would be {}G",
            pool, nix, atuin, home
        );
    }

    plan
}

/// Measure the selected disks and store the resulting plan in `config`.
///
/// Existing-partition installs need no measurement.
pub fn calculate_space_allocation<R: CommandRunner>(
    config: &mut Config,
    inventory: &Inventory<R>,
) -> AllocationPlan {
    let sizes: Vec<i64> = if config.storage_mode.uses_partitions() {
        Vec::new()
    } else {
        config
            .target_disks()
            .iter()
            .map(|disk| inventory.disk_size_gb(disk))
            .collect()
    };

    let plan = plan_allocation(config.storage_mode, &sizes);
    info!(
        "Space allocation for {} on {:?}: boot={} nix={} atuin={} home={}",
        config.storage_mode, sizes, plan.boot, plan.system_cache, plan.history_db, plan.home
    );
    config.allocation = plan;
    plan
}
