//! Type-safe configuration types for tuinix
//!
//! Storage layouts are proper Rust enums instead of strings, which gives
//! compile-time validation and exhaustive matching everywhere a layout
//! decision is made.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Storage layout selected in the wizard.
///
/// | Variant      | Disks | Pool      | Encrypted |
/// |--------------|-------|-----------|-----------|
/// | `Xfs`        | 1     | none      | no        |
/// | `Zfs`        | 1     | stripe    | yes       |
/// | `ZfsStripe`  | 2+    | stripe    | yes       |
/// | `ZfsRaidz`   | 2+    | raidz     | yes       |
/// | `ZfsRaidz2`  | 3+    | raidz2    | yes       |
/// | `Partitions` | 1     | none      | no        |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// Single disk, ESP + XFS root
    #[strum(serialize = "xfs")]
    Xfs,
    /// Single disk, encrypted ZFS pool
    #[default]
    #[strum(serialize = "zfs")]
    Zfs,
    /// Multiple disks striped together, no redundancy
    #[strum(serialize = "zfs-stripe")]
    ZfsStripe,
    /// Multiple disks with single parity
    #[strum(serialize = "zfs-raidz")]
    ZfsRaidz,
    /// Multiple disks with double parity
    #[strum(serialize = "zfs-raidz2")]
    ZfsRaidz2,
    /// Operator-chosen existing boot + root partitions
    #[strum(serialize = "partitions")]
    Partitions,
}

impl StorageMode {
    /// Check if this mode builds a ZFS pool
    pub fn is_zfs(&self) -> bool {
        matches!(
            self,
            Self::Zfs | Self::ZfsStripe | Self::ZfsRaidz | Self::ZfsRaidz2
        )
    }

    /// Check if this mode spans several disks
    pub fn is_multi_disk(&self) -> bool {
        matches!(self, Self::ZfsStripe | Self::ZfsRaidz | Self::ZfsRaidz2)
    }

    /// Check if this mode encrypts the pool.
    ///
    /// Every generated pool declares aes-256-gcm with a prompted passphrase.
    pub fn is_encrypted(&self) -> bool {
        self.is_zfs()
    }

    /// Check if this mode reuses existing partitions instead of a disko layout
    pub fn uses_partitions(&self) -> bool {
        matches!(self, Self::Partitions)
    }

    /// Minimum number of disks the wizard must select
    pub fn min_disks(&self) -> usize {
        match self {
            Self::Xfs | Self::Zfs | Self::Partitions => 1,
            Self::ZfsStripe | Self::ZfsRaidz => 2,
            Self::ZfsRaidz2 => 3,
        }
    }

    /// Value of the disko zpool `mode` attribute. Empty means stripe.
    ///
    /// `None` for layouts without a pool.
    pub fn pool_mode(&self) -> Option<&'static str> {
        match self {
            Self::Zfs | Self::ZfsStripe => Some(""),
            Self::ZfsRaidz => Some("raidz"),
            Self::ZfsRaidz2 => Some("raidz2"),
            Self::Xfs | Self::Partitions => None,
        }
    }

    /// Usable fraction of raw capacity for `disks` members, as
    /// `(numerator, denominator)`.
    pub fn redundancy_factor(&self, disks: i64) -> (i64, i64) {
        match self {
            Self::ZfsRaidz if disks > 0 => (disks - 1, disks),
            Self::ZfsRaidz2 if disks > 0 => (disks - 2, disks),
            _ => (1, 1),
        }
    }

    /// Short human title
    pub fn title(&self) -> &'static str {
        match self {
            Self::Xfs => "XFS (single disk)",
            Self::Zfs => "ZFS encrypted (single disk)",
            Self::ZfsStripe => "ZFS stripe (multi-disk)",
            Self::ZfsRaidz => "ZFS raidz (multi-disk)",
            Self::ZfsRaidz2 => "ZFS raidz2 (multi-disk)",
            Self::Partitions => "Existing partitions",
        }
    }

    /// One-line description shown next to the title
    pub fn description(&self) -> &'static str {
        match self {
            Self::Xfs => "Simple layout: EFI boot partition and an XFS root",
            Self::Zfs => "Encrypted ZFS pool with snapshot-friendly datasets",
            Self::ZfsStripe => "Combine all disks, full capacity, no fault tolerance",
            Self::ZfsRaidz => "Single parity, survives the loss of one disk",
            Self::ZfsRaidz2 => "Double parity, survives the loss of two disks",
            Self::Partitions => "Format an existing root partition with XFS, keep the boot partition",
        }
    }
}

/// Filesystem formats that appear in generated layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Filesystem {
    #[default]
    #[strum(serialize = "xfs")]
    Xfs,
    /// FAT filesystem for the EFI System Partition
    #[strum(serialize = "vfat")]
    Vfat,
}
