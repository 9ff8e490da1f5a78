//! Block device discovery.
//!
//! Queries `lsblk` and normalizes its output into [`DiskRecord`] and
//! [`PartitionRecord`] values for the wizard.
//!
//! # Degraded Mode
//!
//! Discovery never fails. If `lsblk` is missing, exits non-zero, or reports
//! nothing usable, the listing functions return exactly one placeholder
//! record and log a warning, so the wizard stays navigable in a container or
//! test VM. Size queries fall back to 100 GiB so the capacity planner never
//! sees zero.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::step::{run_tool, CommandRunner, ToolArgs};
use crate::tools::disk::{LsblkChildrenArgs, LsblkDisksArgs, LsblkPartitionsArgs, LsblkSizeArgs};

/// Size substituted when a disk size cannot be determined.
pub const FALLBACK_DISK_SIZE_GB: i64 = 100;

/// [`FALLBACK_DISK_SIZE_GB`] in bytes.
pub const FALLBACK_DISK_SIZE_BYTES: u64 = FALLBACK_DISK_SIZE_GB as u64 * GIB;

const GIB: u64 = 1024 * 1024 * 1024;

/// A whole disk as reported by `lsblk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskRecord {
    /// Device path, e.g. `/dev/nvme0n1`
    pub path: String,
    /// Human-readable size, e.g. `476.9G`
    pub size: String,
    /// Vendor model, may be empty
    pub model: String,
}

/// A partition of one disk as reported by `lsblk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    /// Full device path, e.g. `/dev/sda1`
    pub path: String,
    /// Human-readable size
    pub size: String,
    /// Filesystem signature, empty when unformatted
    pub fs_type: String,
    /// GPT partition label, may be empty
    pub label: String,
}

/// Device queries backed by a [`CommandRunner`].
pub struct Inventory<R> {
    runner: R,
}

impl<R: CommandRunner> Inventory<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// All whole disks, excluding partitions, loop devices, ROMs and the like.
    pub fn list_disks(&self) -> Vec<DiskRecord> {
        let Some(stdout) = self.query(&LsblkDisksArgs, "disks") else {
            warn!("Disk discovery unavailable, using placeholder disk");
            return vec![placeholder_disk("Test Disk")];
        };

        let disks = parse_disks(&stdout);
        if disks.is_empty() {
            warn!("lsblk reported no disks, using placeholder disk");
            return vec![placeholder_disk("No disks found")];
        }

        debug!("Discovered {} disk(s)", disks.len());
        disks
    }

    /// Partitions of `disk`, excluding the disk entry itself.
    pub fn list_partitions(&self, disk: &str) -> Vec<PartitionRecord> {
        let args = LsblkPartitionsArgs { disk: PathBuf::from(disk) };
        let Some(stdout) = self.query(&args, disk) else {
            warn!("Partition discovery unavailable for {}, using placeholder", disk);
            return vec![PartitionRecord {
                path: format!("{disk}1"),
                size: "500M".to_string(),
                fs_type: "vfat".to_string(),
                label: "EFI System".to_string(),
            }];
        };

        let partitions = parse_partitions(&stdout);
        if partitions.is_empty() {
            warn!("No partitions found on {}", disk);
            return vec![PartitionRecord {
                path: format!("{disk}1"),
                size: "unknown".to_string(),
                fs_type: String::new(),
                label: "No partitions found".to_string(),
            }];
        }

        partitions
    }

    /// Size of `disk` in bytes; [`FALLBACK_DISK_SIZE_BYTES`] when unknown or zero.
    pub fn disk_size_bytes(&self, disk: &str) -> u64 {
        let args = LsblkSizeArgs { disk: PathBuf::from(disk) };
        match self.query(&args, disk).and_then(|s| parse_size_bytes(&s)) {
            Some(bytes) if bytes > 0 => bytes,
            _ => {
                warn!(
                    "Could not determine size of {}, assuming {} GiB",
                    disk, FALLBACK_DISK_SIZE_GB
                );
                FALLBACK_DISK_SIZE_BYTES
            }
        }
    }

    /// Size of `disk` in whole GiB; disks under 1 GiB count as
    /// [`FALLBACK_DISK_SIZE_GB`].
    pub fn disk_size_gb(&self, disk: &str) -> i64 {
        bytes_to_gb(self.disk_size_bytes(disk))
    }

    /// Every device below `disk` (partitions, and anything stacked on them).
    ///
    /// Used by the unmount sweep, so it never fabricates placeholders: a
    /// failed query yields an empty list.
    pub fn child_devices(&self, disk: &str) -> Vec<PathBuf> {
        let args = LsblkChildrenArgs { disk: PathBuf::from(disk) };
        self.query(&args, disk)
            .map(|stdout| parse_child_devices(&stdout))
            .unwrap_or_default()
    }

    /// Run a read-only query, returning stdout only on success.
    fn query<T: ToolArgs>(&self, args: &T, target: &str) -> Option<String> {
        match run_tool(&self.runner, args, target) {
            Ok(out) if out.success => Some(out.stdout),
            Ok(out) => {
                debug!(
                    "{} {} exited with {:?}: {}",
                    args.program(),
                    target,
                    out.exit_code,
                    out.stderr.trim()
                );
                None
            }
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }
}

fn placeholder_disk(model: &str) -> DiskRecord {
    DiskRecord {
        path: "/dev/sda".to_string(),
        size: "100G".to_string(),
        model: model.to_string(),
    }
}

/// Parse `NAME SIZE TYPE MODEL...` rows, keeping `disk` rows.
pub fn parse_disks(output: &str) -> Vec<DiskRecord> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 || fields[2] != "disk" {
                return None;
            }
            Some(DiskRecord {
                path: format!("/dev/{}", fields[0]),
                size: fields[1].to_string(),
                model: fields[3..].join(" "),
            })
        })
        .collect()
}

/// Parse `NAME SIZE TYPE [FSTYPE] [PARTLABEL...]` rows, keeping `part` rows.
///
/// Trailing columns are optional; lsblk leaves them blank, which collapses
/// under whitespace splitting, so a four-field row has a filesystem but no
/// label.
pub fn parse_partitions(output: &str) -> Vec<PartitionRecord> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 || fields[2] != "part" {
                return None;
            }
            Some(PartitionRecord {
                path: fields[0].to_string(),
                size: fields[1].to_string(),
                fs_type: fields.get(3).map(|s| s.to_string()).unwrap_or_default(),
                label: fields.get(4..).map(|rest| rest.join(" ")).unwrap_or_default(),
            })
        })
        .collect()
}

/// Parse a byte count printed by `lsblk -b`.
pub fn parse_size_bytes(output: &str) -> Option<u64> {
    output.trim().lines().next()?.trim().parse().ok()
}

/// Parse `lsblk -nr -o NAME`: skip the first row (the disk) and blanks.
pub fn parse_child_devices(output: &str) -> Vec<PathBuf> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| Path::new("/dev").join(name))
        .collect()
}

/// Whole GiB, with 0 replaced by [`FALLBACK_DISK_SIZE_GB`].
pub fn bytes_to_gb(bytes: u64) -> i64 {
    match bytes / GIB {
        0 => FALLBACK_DISK_SIZE_GB,
        gb => gb as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{Step, StepOutput};

    /// Answers every query with the same canned result.
    struct Canned(std::io::Result<StepOutput>);

    impl CommandRunner for Canned {
        fn run(&self, _step: &Step) -> std::io::Result<StepOutput> {
            match &self.0 {
                Ok(out) => Ok(out.clone()),
                Err(e) => Err(std::io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn missing_tool() -> Inventory<Canned> {
        Inventory::new(Canned(Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "lsblk not found",
        ))))
    }

    #[test]
    fn test_parse_disks_filters_types_and_joins_model() {
        let out = "sda     931.5G disk Samsung SSD 860\n\
                   sr0      1024M rom  QEMU DVD-ROM\n\
                   nvme0n1 476.9G disk\n\
                   loop0    63.3M loop\n";
        let disks = parse_disks(out);
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].path, "/dev/sda");
        assert_eq!(disks[0].size, "931.5G");
        assert_eq!(disks[0].model, "Samsung SSD 860");
        assert_eq!(disks[1].path, "/dev/nvme0n1");
        assert_eq!(disks[1].model, "");
    }

    #[test]
    fn test_parse_partitions_optional_columns() {
        let out = "/dev/sda        931.5G disk\n\
                   /dev/sda1         512M part vfat EFI system partition\n\
                   /dev/sda2         200G part xfs\n\
                   /dev/sda3          10G part\n";
        let parts = parse_partitions(out);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].path, "/dev/sda1");
        assert_eq!(parts[0].fs_type, "vfat");
        assert_eq!(parts[0].label, "EFI system partition");
        assert_eq!(parts[1].fs_type, "xfs");
        assert_eq!(parts[1].label, "");
        assert_eq!(parts[2].fs_type, "");
    }

    #[test]
    fn test_parse_size_bytes() {
        assert_eq!(parse_size_bytes("500107862016\n"), Some(500_107_862_016));
        assert_eq!(parse_size_bytes("  42 "), Some(42));
        assert_eq!(parse_size_bytes(""), None);
        assert_eq!(parse_size_bytes("abc"), None);
    }

    #[test]
    fn test_parse_child_devices_skips_disk_row() {
        let out = "sdb\nsdb1\nsdb2\n\n";
        assert_eq!(
            parse_child_devices(out),
            vec![PathBuf::from("/dev/sdb1"), PathBuf::from("/dev/sdb2")]
        );
        assert!(parse_child_devices("sdb\n").is_empty());
    }

    #[test]
    fn test_bytes_to_gb() {
        assert_eq!(bytes_to_gb(500_107_862_016), 465);
        assert_eq!(bytes_to_gb(GIB - 1), FALLBACK_DISK_SIZE_GB);
        assert_eq!(bytes_to_gb(0), FALLBACK_DISK_SIZE_GB);
    }

    #[test]
    fn test_missing_lsblk_yields_one_placeholder_each() {
        let inv = missing_tool();

        let disks = inv.list_disks();
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].path, "/dev/sda");

        let parts = inv.list_partitions("/dev/vda");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].path, "/dev/vda1");
        assert_eq!(parts[0].fs_type, "vfat");
    }

    #[test]
    fn test_empty_listing_yields_placeholder() {
        let inv = Inventory::new(Canned(Ok(StepOutput::ok(""))));
        let disks = inv.list_disks();
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].model, "No disks found");

        let parts = inv.list_partitions("/dev/sdc");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].label, "No partitions found");
    }

    #[test]
    fn test_size_falls_back_on_failure_and_zero() {
        assert_eq!(missing_tool().disk_size_bytes("/dev/sda"), FALLBACK_DISK_SIZE_BYTES);
        assert_eq!(missing_tool().disk_size_gb("/dev/sda"), 100);

        let zero = Inventory::new(Canned(Ok(StepOutput::ok("0\n"))));
        assert_eq!(zero.disk_size_bytes("/dev/sda"), FALLBACK_DISK_SIZE_BYTES);

        let failed = Inventory::new(Canned(Ok(StepOutput::failed(32, "not a block device"))));
        assert_eq!(failed.disk_size_bytes("/dev/sda"), FALLBACK_DISK_SIZE_BYTES);
    }

    #[test]
    fn test_child_devices_empty_on_failure() {
        assert!(missing_tool().child_devices("/dev/sda").is_empty());
    }
}
