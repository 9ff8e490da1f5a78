//! Type-safe arguments for block device tools.
//!
//! - `lsblk` queries (read-only): [`LsblkDisksArgs`], [`LsblkPartitionsArgs`],
//!   [`LsblkSizeArgs`], [`LsblkChildrenArgs`]
//! - `umount` / `mount` / `mkfs.xfs`: [`UmountArgs`], [`MountArgs`], [`MkfsXfsArgs`]
//!
//! # Column Contracts
//!
//! The inventory parser splits lsblk rows on whitespace, so the column order
//! here and the field indices in `inventory.rs` must agree:
//!
//! | Query       | Columns                              |
//! |-------------|--------------------------------------|
//! | disks       | `NAME SIZE TYPE MODEL...`            |
//! | partitions  | `NAME SIZE TYPE [FSTYPE] [PARTLABEL...]` |
//! | size        | `SIZE` (bytes)                       |
//! | children    | `NAME` (raw, first row is the disk)  |

use std::path::PathBuf;

use crate::step::ToolArgs;

/// `lsblk -d -n -o NAME,SIZE,TYPE,MODEL`
#[derive(Debug, Clone, Copy, Default)]
pub struct LsblkDisksArgs;

impl ToolArgs for LsblkDisksArgs {
    fn program(&self) -> &'static str {
        "lsblk"
    }

    fn to_cli_args(&self) -> Vec<String> {
        ["-d", "-n", "-o", "NAME,SIZE,TYPE,MODEL"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// `lsblk -n -l -p -o NAME,SIZE,TYPE,FSTYPE,PARTLABEL <disk>`
///
/// `-p` gives full device paths and `-l` a flat list without tree glyphs.
#[derive(Debug, Clone)]
pub struct LsblkPartitionsArgs {
    pub disk: PathBuf,
}

impl ToolArgs for LsblkPartitionsArgs {
    fn program(&self) -> &'static str {
        "lsblk"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-n".to_string(),
            "-l".to_string(),
            "-p".to_string(),
            "-o".to_string(),
            "NAME,SIZE,TYPE,FSTYPE,PARTLABEL".to_string(),
            self.disk.display().to_string(),
        ]
    }
}

/// `lsblk -d -n -b -o SIZE <disk>` (size in bytes)
#[derive(Debug, Clone)]
pub struct LsblkSizeArgs {
    pub disk: PathBuf,
}

impl ToolArgs for LsblkSizeArgs {
    fn program(&self) -> &'static str {
        "lsblk"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-d".to_string(),
            "-n".to_string(),
            "-b".to_string(),
            "-o".to_string(),
            "SIZE".to_string(),
            self.disk.display().to_string(),
        ]
    }
}

/// `lsblk -nr -o NAME <disk>`: the disk followed by every child device.
#[derive(Debug, Clone)]
pub struct LsblkChildrenArgs {
    pub disk: PathBuf,
}

impl ToolArgs for LsblkChildrenArgs {
    fn program(&self) -> &'static str {
        "lsblk"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-nr".to_string(),
            "-o".to_string(),
            "NAME".to_string(),
            self.disk.display().to_string(),
        ]
    }
}

/// `umount <device>`
///
/// Callers treat failure as "was not mounted".
#[derive(Debug, Clone)]
pub struct UmountArgs {
    pub device: PathBuf,
}

impl ToolArgs for UmountArgs {
    fn program(&self) -> &'static str {
        "umount"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.device.display().to_string()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `mount <device> <mountpoint>`
///
/// The mountpoint directory is created by the caller beforehand.
#[derive(Debug, Clone)]
pub struct MountArgs {
    pub device: PathBuf,
    pub mountpoint: PathBuf,
}

impl ToolArgs for MountArgs {
    fn program(&self) -> &'static str {
        "mount"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            self.device.display().to_string(),
            self.mountpoint.display().to_string(),
        ]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `mkfs.xfs -f <device>`
///
/// `-f` overwrites any existing signature without asking.
#[derive(Debug, Clone)]
pub struct MkfsXfsArgs {
    pub device: PathBuf,
}

impl ToolArgs for MkfsXfsArgs {
    fn program(&self) -> &'static str {
        "mkfs.xfs"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-f".to_string(), self.device.display().to_string()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}
