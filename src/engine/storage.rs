//! Provisioning plan.
//!
//! Translates a [`Config`] into an ordered sequence of atomic [`StorageOp`]
//! operations that the provisioner executes one by one.
//!
//! # Sequences
//!
//! | Mode                 | Operations Generated |
//! |----------------------|----------------------|
//! | Existing partitions  | FormatXfs(root) → Mount(root) → Mount(boot) |
//! | XFS                  | Unmount(children)* → Disko |
//! | ZFS (any)            | RegenerateHostId → Unmount(children)* → ExportPools → Disko |
//!
//! # Design
//!
//! - **Pure logic**: No I/O. Child devices are discovered by the caller and
//!   passed in, so the plan is fully determined by its inputs
//! - **Typed output**: Each `StorageOp` maps to one or two tool invocations
//! - **Failure policy lives on the op**: `Unmount` and `ExportPools` are
//!   best effort, everything else aborts the run

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Result, TuinixError};
use crate::types::StorageMode;

/// A single atomic storage operation in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// `mkfs.xfs -f`
    FormatXfs { device: PathBuf },

    /// Create the mountpoint, then `mount`
    Mount { device: PathBuf, mountpoint: PathBuf },

    /// Remove the stale `/etc/hostid`, then `zgenhostid`
    RegenerateHostId { host_id: String },

    /// `umount`, failure means "was not mounted"
    Unmount { device: PathBuf },

    /// `zpool export -a`, releases pools a previous attempt left imported
    ExportPools,

    /// `disko --mode disko`, destroys, partitions, formats and mounts
    Disko { config_path: PathBuf, encrypted: bool },
}

impl StorageOp {
    /// Failures are logged and the run continues.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::Unmount { .. } | Self::ExportPools)
    }

    /// Operation name used in errors and logs.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::FormatXfs { .. } => "mkfs.xfs",
            Self::Mount { .. } => "mount",
            Self::RegenerateHostId { .. } => "zgenhostid",
            Self::Unmount { .. } => "umount",
            Self::ExportPools => "zpool export",
            Self::Disko { .. } => "disko",
        }
    }

    /// The device, path or identifier the operation acts on.
    pub fn target(&self) -> String {
        match self {
            Self::FormatXfs { device } | Self::Unmount { device } => device.display().to_string(),
            Self::Mount { device, .. } => device.display().to_string(),
            Self::RegenerateHostId { host_id } => host_id.clone(),
            Self::ExportPools => "all pools".to_string(),
            Self::Disko { config_path, .. } => config_path.display().to_string(),
        }
    }
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FormatXfs { device } => write!(f, "FormatXfs({})", device.display()),
            Self::Mount { device, mountpoint } => {
                write!(f, "Mount({} -> {})", device.display(), mountpoint.display())
            }
            Self::RegenerateHostId { host_id } => write!(f, "RegenerateHostId({})", host_id),
            Self::Unmount { device } => write!(f, "Unmount({})", device.display()),
            Self::ExportPools => write!(f, "ExportPools"),
            Self::Disko { config_path, encrypted } => {
                write!(f, "Disko({}, encrypted={})", config_path.display(), encrypted)
            }
        }
    }
}

/// A complete provisioning plan: an ordered list of operations.
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    /// Ordered sequence of storage operations
    pub ops: Vec<StorageOp>,
    /// The layout that generated this plan
    pub mode: StorageMode,
    /// Target disks (empty for existing partitions)
    pub disks: Vec<String>,
    /// Whether disko needs the passphrase
    pub encrypted: bool,
}

impl ProvisionPlan {
    /// Returns true if this plan includes destructive operations.
    pub fn is_destructive(&self) -> bool {
        self.ops
            .iter()
            .any(|op| matches!(op, StorageOp::FormatXfs { .. } | StorageOp::Disko { .. }))
    }

    /// Returns a summary of the plan for logging/display.
    pub fn summary(&self) -> String {
        let targets = if self.disks.is_empty() {
            "(existing partitions)".to_string()
        } else {
            self.disks.join(", ")
        };
        let mut lines = vec![
            format!("Provision Plan: {}", self.mode.title()),
            format!("  Targets: {}", targets),
            format!("  Encrypted: {}", self.encrypted),
            format!("  Operations ({}):", self.ops.len()),
        ];
        for (i, op) in self.ops.iter().enumerate() {
            let note = if op.is_best_effort() { " [best effort]" } else { "" };
            lines.push(format!("    {}. {}{}", i + 1, op, note));
        }
        lines.join("\n")
    }
}

/// Calculate the provisioning plan.
///
/// `target_root` is where the new system is mounted (`/mnt` on the live
/// image). `children` lists the child devices of each target disk, in disk
/// order, as discovered right before provisioning.
///
/// # Errors
///
/// - Existing-partition installs without both partitions
/// - Disk layouts without a target disk
pub fn calculate_provision_plan(
    config: &Config,
    target_root: &Path,
    children: &[(String, Vec<PathBuf>)],
) -> Result<ProvisionPlan> {
    let mode = config.storage_mode;

    if mode.uses_partitions() {
        if config.root_partition.is_empty() || config.boot_partition.is_empty() {
            return Err(TuinixError::plan(
                "existing-partition install needs both a root and a boot partition",
            ));
        }
        let root = PathBuf::from(&config.root_partition);
        let ops = vec![
            StorageOp::FormatXfs { device: root.clone() },
            StorageOp::Mount {
                device: root,
                mountpoint: target_root.to_path_buf(),
            },
            StorageOp::Mount {
                device: PathBuf::from(&config.boot_partition),
                mountpoint: target_root.join("boot"),
            },
        ];
        return Ok(ProvisionPlan { ops, mode, disks: Vec::new(), encrypted: false });
    }

    let disks = config.target_disks();
    if disks.is_empty() {
        return Err(TuinixError::plan("no target disk selected"));
    }

    let mut ops = Vec::new();

    if mode.is_zfs() {
        ops.push(StorageOp::RegenerateHostId { host_id: config.host_id.clone() });
    }

    for disk in &disks {
        let devices = children
            .iter()
            .filter(|(d, _)| d == disk)
            .flat_map(|(_, devs)| devs.iter().cloned());
        ops.extend(devices.map(|device| StorageOp::Unmount { device }));
    }

    if mode.is_zfs() {
        ops.push(StorageOp::ExportPools);
    }

    ops.push(StorageOp::Disko {
        config_path: config.disko_config_path(),
        encrypted: mode.is_encrypted(),
    });

    Ok(ProvisionPlan {
        ops,
        mode,
        disks,
        encrypted: mode.is_encrypted(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: StorageMode) -> Config {
        Config {
            hostname: "box".to_string(),
            host_id: "0badf00d".to_string(),
            storage_mode: mode,
            disk: "/dev/sda".to_string(),
            disks: vec!["/dev/sda".to_string(), "/dev/sdb".to_string()],
            boot_partition: "/dev/sda1".to_string(),
            root_partition: "/dev/sda2".to_string(),
            ..Config::default()
        }
    }

    fn children() -> Vec<(String, Vec<PathBuf>)> {
        vec![
            (
                "/dev/sda".to_string(),
                vec![PathBuf::from("/dev/sda1"), PathBuf::from("/dev/sda2")],
            ),
            ("/dev/sdb".to_string(), vec![PathBuf::from("/dev/sdb1")]),
        ]
    }

    #[test]
    fn test_partitions_plan() {
        let plan =
            calculate_provision_plan(&config(StorageMode::Partitions), Path::new("/mnt"), &[])
                .expect("plan generation failed");
        assert_eq!(
            plan.ops,
            vec![
                StorageOp::FormatXfs { device: PathBuf::from("/dev/sda2") },
                StorageOp::Mount {
                    device: PathBuf::from("/dev/sda2"),
                    mountpoint: PathBuf::from("/mnt"),
                },
                StorageOp::Mount {
                    device: PathBuf::from("/dev/sda1"),
                    mountpoint: PathBuf::from("/mnt/boot"),
                },
            ]
        );
        assert!(!plan.encrypted);
        assert!(plan.is_destructive());
    }

    #[test]
    fn test_partitions_plan_requires_both_partitions() {
        let mut cfg = config(StorageMode::Partitions);
        cfg.boot_partition.clear();
        assert!(calculate_provision_plan(&cfg, Path::new("/mnt"), &[]).is_err());
    }

    #[test]
    fn test_stripe_plan_order() {
        let plan = calculate_provision_plan(
            &config(StorageMode::ZfsStripe),
            Path::new("/mnt"),
            &children(),
        )
        .expect("plan generation failed");

        let names: Vec<&str> = plan.ops.iter().map(StorageOp::operation).collect();
        assert_eq!(
            names,
            vec!["zgenhostid", "umount", "umount", "umount", "zpool export", "disko"]
        );
        assert_eq!(plan.ops[1].target(), "/dev/sda1");
        assert_eq!(plan.ops[3].target(), "/dev/sdb1");
        assert_eq!(
            plan.ops.last(),
            Some(&StorageOp::Disko {
                config_path: PathBuf::from("/home/nixos/tuinix/hosts/box/disks.nix"),
                encrypted: true,
            })
        );
        assert!(plan.encrypted);
    }

    #[test]
    fn test_single_disk_zfs_only_unmounts_its_disk() {
        let plan =
            calculate_provision_plan(&config(StorageMode::Zfs), Path::new("/mnt"), &children())
                .expect("plan generation failed");
        let unmounts = plan
            .ops
            .iter()
            .filter(|op| matches!(op, StorageOp::Unmount { .. }))
            .count();
        assert_eq!(unmounts, 2);
        assert_eq!(plan.disks, vec!["/dev/sda"]);
    }

    #[test]
    fn test_xfs_plan_skips_zfs_steps() {
        let plan =
            calculate_provision_plan(&config(StorageMode::Xfs), Path::new("/mnt"), &children())
                .expect("plan generation failed");
        assert!(!plan.ops.iter().any(|op| matches!(
            op,
            StorageOp::RegenerateHostId { .. } | StorageOp::ExportPools
        )));
        assert!(matches!(
            plan.ops.last(),
            Some(StorageOp::Disko { encrypted: false, .. })
        ));
    }

    #[test]
    fn test_best_effort_policy() {
        assert!(StorageOp::Unmount { device: PathBuf::from("/dev/sda1") }.is_best_effort());
        assert!(StorageOp::ExportPools.is_best_effort());
        assert!(!StorageOp::RegenerateHostId { host_id: "0".into() }.is_best_effort());
        assert!(!StorageOp::FormatXfs { device: PathBuf::from("/dev/sda2") }.is_best_effort());
    }

    #[test]
    fn test_empty_selection_is_an_error() {
        let mut cfg = config(StorageMode::ZfsRaidz);
        cfg.disks.clear();
        assert!(calculate_provision_plan(&cfg, Path::new("/mnt"), &[]).is_err());
    }

    #[test]
    fn test_plan_summary_marks_best_effort() {
        let plan = calculate_provision_plan(
            &config(StorageMode::ZfsRaidz),
            Path::new("/mnt"),
            &children(),
        )
        .expect("plan generation failed");
        let summary = plan.summary();
        assert!(summary.contains("ZFS raidz"));
        assert!(summary.contains("Unmount(/dev/sdb1) [best effort]"));
        assert!(summary.contains("Targets: /dev/sda, /dev/sdb"));
    }
}
