//! Disko configuration synthesizer.
//!
//! Builds a typed description of the target storage layout from a
//! [`Config`], checks it for structural mistakes, and renders it to the
//! `hosts/<hostname>/disks.nix` file that `disko --mode disko` consumes.
//!
//! # Layouts
//!
//! | Mode              | disk0                 | disk1..        | Pool           |
//! |-------------------|-----------------------|----------------|----------------|
//! | `Xfs`             | ESP + XFS root        | -              | none           |
//! | `Zfs`             | ESP + pool member     | -              | stripe         |
//! | `ZfsStripe`       | ESP + pool member     | pool member    | stripe (`""`)  |
//! | `ZfsRaidz`        | ESP + pool member     | pool member    | `raidz`        |
//! | `ZfsRaidz2`       | ESP + pool member     | pool member    | `raidz2`       |
//! | `Partitions`      | no disko layout                                         |
//!
//! Every pool is encrypted with `keylocation = "prompt"`. The passphrase is
//! never part of the tree; disko reads it from stdin at provisioning time.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use super::allocation::SpaceAllocation;
use super::nix::{NixFile, NixValue};
use crate::config::{validate_pool_name, Config};
use crate::error::{Result, TuinixError};
use crate::types::{Filesystem, StorageMode};

/// GPT type code of the EFI System Partition.
pub const ESP_TYPE_CODE: &str = "EF00";

/// The complete layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskoConfig {
    /// First header comment line
    pub title: String,
    pub disks: Vec<DiskNode>,
    pub pools: Vec<PoolNode>,
}

/// One physical disk with a GPT label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskNode {
    /// Attribute name, `disk0`, `disk1`, ...
    pub name: String,
    pub device: String,
    pub partitions: Vec<PartitionNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNode {
    pub name: String,
    /// GPT type code, e.g. `EF00`
    pub type_code: Option<String>,
    /// `"5G"`, `"100%"`
    pub size: String,
    pub content: PartitionContent,
}

impl PartitionNode {
    pub fn is_esp(&self) -> bool {
        self.type_code.as_deref() == Some(ESP_TYPE_CODE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionContent {
    Filesystem(FilesystemNode),
    /// The partition is a vdev of the named pool.
    ZfsMember { pool: String },
}

/// A formatted, mounted filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemNode {
    pub format: Filesystem,
    pub mountpoint: String,
    pub mount_options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolNode {
    pub name: String,
    /// Empty for stripe, otherwise `raidz` / `raidz2`
    pub mode: String,
    pub options: Vec<(String, String)>,
    pub root_fs_options: Vec<(String, String)>,
    pub datasets: Vec<DatasetNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetNode {
    pub name: String,
    pub kind: DatasetKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetKind {
    /// `zfs_fs`
    Filesystem {
        mountpoint: String,
        options: Vec<(String, String)>,
        post_create_hook: Option<String>,
    },
    /// `zfs_volume` with a filesystem inside
    Volume { size: String, content: FilesystemNode },
}

const AUTO_SNAPSHOT: &str = "com.sun:auto-snapshot";

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn esp_partition(size: &str) -> PartitionNode {
    PartitionNode {
        name: "ESP".to_string(),
        type_code: Some(ESP_TYPE_CODE.to_string()),
        size: size.to_string(),
        content: PartitionContent::Filesystem(FilesystemNode {
            format: Filesystem::Vfat,
            mountpoint: "/boot".to_string(),
            mount_options: vec!["umask=0077".to_string()],
        }),
    }
}

fn pool_member(pool: &str) -> PartitionNode {
    PartitionNode {
        name: "zfs".to_string(),
        type_code: None,
        size: "100%".to_string(),
        content: PartitionContent::ZfsMember { pool: pool.to_string() },
    }
}

/// Allocation value that must be a concrete size for this layout.
fn required_size(alloc: SpaceAllocation, what: &str) -> Result<String> {
    match alloc {
        SpaceAllocation::Gigabytes(gb) if gb > 0 => Ok(alloc.to_string()),
        SpaceAllocation::Gigabytes(gb) => Err(TuinixError::plan(format!(
            "{} size must be positive, got {}G",
            what, gb
        ))),
        _ => Err(TuinixError::plan(format!(
            "{} size has not been calculated; run the space allocation first",
            what
        ))),
    }
}

/// The encrypted pool with tuinix's standard dataset set.
fn standard_pool(name: &str, mode: &str, nix_quota: &str, atuin_size: &str) -> PoolNode {
    let datasets = vec![
        DatasetNode {
            name: "root".to_string(),
            kind: DatasetKind::Filesystem {
                mountpoint: "/".to_string(),
                options: pairs(&[(AUTO_SNAPSHOT, "false"), ("mountpoint", "/")]),
                post_create_hook: Some(format!("zfs snapshot {}/root@blank", name)),
            },
        },
        DatasetNode {
            name: "nix".to_string(),
            kind: DatasetKind::Filesystem {
                mountpoint: "/nix".to_string(),
                options: pairs(&[(AUTO_SNAPSHOT, "false"), ("quota", nix_quota)]),
                post_create_hook: None,
            },
        },
        DatasetNode {
            name: "home".to_string(),
            kind: DatasetKind::Filesystem {
                mountpoint: "/home".to_string(),
                options: pairs(&[(AUTO_SNAPSHOT, "true")]),
                post_create_hook: None,
            },
        },
        DatasetNode {
            name: "overflow".to_string(),
            kind: DatasetKind::Filesystem {
                mountpoint: "/overflow".to_string(),
                options: pairs(&[(AUTO_SNAPSHOT, "true")]),
                post_create_hook: None,
            },
        },
        DatasetNode {
            name: "atuin".to_string(),
            kind: DatasetKind::Volume {
                size: atuin_size.to_string(),
                content: FilesystemNode {
                    format: Filesystem::Xfs,
                    mountpoint: "/var/atuin".to_string(),
                    mount_options: vec!["defaults".to_string(), "nofail".to_string()],
                },
            },
        },
    ];

    PoolNode {
        name: name.to_string(),
        mode: mode.to_string(),
        options: pairs(&[("ashift", "12"), ("autotrim", "on")]),
        root_fs_options: pairs(&[
            ("compression", "zstd"),
            ("acltype", "posixacl"),
            ("xattr", "sa"),
            ("relatime", "on"),
            ("mountpoint", "none"),
            ("encryption", "aes-256-gcm"),
            ("keyformat", "passphrase"),
            ("keylocation", "prompt"),
            (AUTO_SNAPSHOT, "false"),
        ]),
        datasets,
    }
}

/// Build the layout for `config`.
///
/// # Errors
///
/// - Existing-partition installs have no disko layout
/// - The allocation has not been calculated for the mode
/// - The pool is too small for the nix and atuin minimums
/// - No target disk is selected
pub fn build_disko_config(config: &Config) -> Result<DiskoConfig> {
    let mode = config.storage_mode;
    let disks = config.target_disks();
    if disks.is_empty() {
        return Err(TuinixError::plan("no target disk selected"));
    }

    match mode {
        StorageMode::Partitions => Err(TuinixError::plan(
            "existing-partition installs are formatted directly and have no disko layout",
        )),
        StorageMode::Xfs => {
            let boot = required_size(config.allocation.boot, "boot")?;
            Ok(DiskoConfig {
                title: "Disko configuration for tuinix - single disk XFS".to_string(),
                disks: vec![DiskNode {
                    name: "disk0".to_string(),
                    device: disks[0].clone(),
                    partitions: vec![
                        esp_partition(&boot),
                        PartitionNode {
                            name: "root".to_string(),
                            type_code: None,
                            size: "100%".to_string(),
                            content: PartitionContent::Filesystem(FilesystemNode {
                                format: Filesystem::Xfs,
                                mountpoint: "/".to_string(),
                                mount_options: Vec::new(),
                            }),
                        },
                    ],
                }],
                pools: Vec::new(),
            })
        }
        StorageMode::Zfs
        | StorageMode::ZfsStripe
        | StorageMode::ZfsRaidz
        | StorageMode::ZfsRaidz2 => {
            if config.allocation.is_overcommitted() {
                return Err(TuinixError::plan(format!(
                    "selected storage is too small: nix ({}) and atuin ({}) leave {} for home",
                    config.allocation.system_cache,
                    config.allocation.history_db,
                    config.allocation.home
                )));
            }
            let boot = required_size(config.allocation.boot, "boot")?;
            let nix = required_size(config.allocation.system_cache, "nix")?;
            let atuin = required_size(config.allocation.history_db, "atuin")?;
            let pool_name = config.zfs_pool_name.as_str();

            let disk_nodes = disks
                .iter()
                .enumerate()
                .map(|(i, device)| {
                    let mut partitions = Vec::with_capacity(2);
                    if i == 0 {
                        partitions.push(esp_partition(&boot));
                    }
                    partitions.push(pool_member(pool_name));
                    DiskNode {
                        name: format!("disk{}", i),
                        device: device.clone(),
                        partitions,
                    }
                })
                .collect();

            let title = if mode.is_multi_disk() {
                format!("Disko configuration for tuinix - multi-disk ZFS ({})", mode)
            } else {
                "Disko configuration for tuinix - single disk ZFS (encrypted)".to_string()
            };

            Ok(DiskoConfig {
                title,
                disks: disk_nodes,
                pools: vec![standard_pool(
                    pool_name,
                    mode.pool_mode().unwrap_or_default(),
                    &nix,
                    &atuin,
                )],
            })
        }
    }
}

impl DiskoConfig {
    /// Structural checks that disko itself would only report halfway through
    /// destroying the disks.
    pub fn validate(&self) -> Result<()> {
        if self.disks.is_empty() {
            return Err(TuinixError::validation("layout declares no disks"));
        }

        let mut names = std::collections::HashSet::new();
        for disk in &self.disks {
            if !names.insert(disk.name.as_str()) {
                return Err(TuinixError::validation(format!(
                    "disk name '{}' is declared twice",
                    disk.name
                )));
            }
            if !disk.device.starts_with("/dev/") {
                return Err(TuinixError::validation(format!(
                    "device '{}' must start with /dev/",
                    disk.device
                )));
            }
            if disk.partitions.is_empty() {
                return Err(TuinixError::validation(format!(
                    "{} has no partitions",
                    disk.name
                )));
            }
        }

        let esp_count = self
            .disks
            .iter()
            .flat_map(|d| &d.partitions)
            .filter(|p| p.is_esp())
            .count();
        if esp_count != 1 {
            return Err(TuinixError::validation(format!(
                "layout must have exactly one EFI System Partition, found {}",
                esp_count
            )));
        }

        for member_pool in self.member_pools() {
            if !self.pools.iter().any(|p| p.name == member_pool) {
                return Err(TuinixError::validation(format!(
                    "partition references undeclared pool '{}'",
                    member_pool
                )));
            }
        }

        for pool in &self.pools {
            validate_pool_name(&pool.name)?;
            let members = self.member_count(&pool.name);
            let required = match pool.mode.as_str() {
                "" => 1,
                "raidz" => 2,
                "raidz2" => 3,
                other => {
                    return Err(TuinixError::validation(format!(
                        "unsupported pool mode '{}'",
                        other
                    )))
                }
            };
            if members < required {
                return Err(TuinixError::validation(format!(
                    "pool '{}' ({}) needs at least {} member(s), has {}",
                    pool.name,
                    if pool.mode.is_empty() { "stripe" } else { pool.mode.as_str() },
                    required,
                    members
                )));
            }
        }

        Ok(())
    }

    fn member_pools(&self) -> impl Iterator<Item = &str> {
        self.disks
            .iter()
            .flat_map(|d| &d.partitions)
            .filter_map(|p| match &p.content {
                PartitionContent::ZfsMember { pool } => Some(pool.as_str()),
                PartitionContent::Filesystem(_) => None,
            })
    }

    /// Number of partitions that join `pool`.
    pub fn member_count(&self, pool: &str) -> usize {
        self.member_pools().filter(|p| *p == pool).count()
    }

    /// Convert to a Nix document.
    pub fn to_nix(&self) -> NixFile {
        let disks = NixValue::attrs(self.disks.iter().map(|d| (d.name.clone(), disk_value(d))));

        let mut devices = vec![("disk".to_string(), disks)];
        if !self.pools.is_empty() {
            devices.push((
                "zpool".to_string(),
                NixValue::attrs(self.pools.iter().map(|p| (p.name.clone(), pool_value(p)))),
            ));
        }

        NixFile {
            comments: vec![self.title.clone(), "Generated by tuinix installer".to_string()],
            function_args: Some("lib, ...".to_string()),
            body: NixValue::attrs([(
                "disko",
                NixValue::attrs([("devices", NixValue::Attrs(devices))]),
            )]),
        }
    }

    /// Rendered `disks.nix` text.
    pub fn render(&self) -> String {
        self.to_nix().to_string()
    }
}

fn options_value(options: &[(String, String)]) -> NixValue {
    NixValue::attrs(options.iter().map(|(k, v)| (k.clone(), NixValue::str(v.as_str()))))
}

fn filesystem_value(fs: &FilesystemNode) -> NixValue {
    let mut entries = vec![
        ("type".to_string(), NixValue::str("filesystem")),
        ("format".to_string(), NixValue::str(fs.format.to_string())),
        ("mountpoint".to_string(), NixValue::str(fs.mountpoint.as_str())),
    ];
    if !fs.mount_options.is_empty() {
        entries.push((
            "mountOptions".to_string(),
            NixValue::list(fs.mount_options.iter().map(String::as_str)),
        ));
    }
    NixValue::Attrs(entries)
}

fn partition_value(part: &PartitionNode) -> NixValue {
    let mut entries = Vec::new();
    if let Some(code) = &part.type_code {
        entries.push(("type".to_string(), NixValue::str(code.as_str())));
    }
    entries.push(("size".to_string(), NixValue::str(part.size.as_str())));
    let content = match &part.content {
        PartitionContent::Filesystem(fs) => filesystem_value(fs),
        PartitionContent::ZfsMember { pool } => NixValue::attrs([
            ("type", NixValue::str("zfs")),
            ("pool", NixValue::str(pool.as_str())),
        ]),
    };
    entries.push(("content".to_string(), content));
    NixValue::Attrs(entries)
}

fn disk_value(disk: &DiskNode) -> NixValue {
    NixValue::attrs([
        ("type", NixValue::str("disk")),
        ("device", NixValue::str(disk.device.as_str())),
        (
            "content",
            NixValue::attrs([
                ("type", NixValue::str("gpt")),
                (
                    "partitions",
                    NixValue::attrs(
                        disk.partitions.iter().map(|p| (p.name.clone(), partition_value(p))),
                    ),
                ),
            ]),
        ),
    ])
}

fn dataset_value(dataset: &DatasetNode) -> NixValue {
    match &dataset.kind {
        DatasetKind::Filesystem { mountpoint, options, post_create_hook } => {
            let mut entries = vec![
                ("type".to_string(), NixValue::str("zfs_fs")),
                ("mountpoint".to_string(), NixValue::str(mountpoint.as_str())),
                ("options".to_string(), options_value(options)),
            ];
            if let Some(hook) = post_create_hook {
                entries.push(("postCreateHook".to_string(), NixValue::lines(hook.as_str())));
            }
            NixValue::Attrs(entries)
        }
        DatasetKind::Volume { size, content } => NixValue::attrs([
            ("type", NixValue::str("zfs_volume")),
            ("size", NixValue::str(size.as_str())),
            ("content", filesystem_value(content)),
        ]),
    }
}

fn pool_value(pool: &PoolNode) -> NixValue {
    NixValue::attrs([
        ("type", NixValue::str("zpool")),
        ("mode", NixValue::str(pool.mode.as_str())),
        ("options", options_value(&pool.options)),
        ("rootFsOptions", options_value(&pool.root_fs_options)),
        (
            "datasets",
            NixValue::attrs(pool.datasets.iter().map(|d| (d.name.clone(), dataset_value(d)))),
        ),
    ])
}

/// Build, validate and write `<work_dir>/hosts/<hostname>/disks.nix`.
///
/// Returns the path written.
pub fn write_disko_config(config: &Config) -> Result<PathBuf> {
    let layout = build_disko_config(config)?;
    layout.validate()?;

    let path = config.disko_config_path();
    let host_dir = config.host_dir();
    fs::create_dir_all(&host_dir).map_err(|e| TuinixError::fs("mkdir", &host_dir, e))?;

    let text = layout.render();
    fs::write(&path, &text).map_err(|e| TuinixError::fs("write", &path, e))?;

    info!(
        "Wrote disko layout for {} ({} disk(s)) to {}",
        config.storage_mode,
        layout.disks.len(),
        path.display()
    );
    debug!("disks.nix:\n{}", text);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::allocation::plan_allocation;
    use crate::secret::Secret;

    fn zfs_config(mode: StorageMode, disks: &[&str]) -> Config {
        let mut config = Config {
            hostname: "tuinix".to_string(),
            storage_mode: mode,
            ..Config::default()
        };
        if mode.is_multi_disk() {
            config.disks = disks.iter().map(|d| d.to_string()).collect();
        } else {
            config.disk = disks[0].to_string();
        }
        config.allocation = plan_allocation(mode, &vec![1005; disks.len()]);
        config
    }

    #[test]
    fn test_raidz_layout_structure() {
        let config = zfs_config(StorageMode::ZfsRaidz, &["/dev/sda", "/dev/sdb", "/dev/sdc"]);
        let layout = build_disko_config(&config).unwrap();
        layout.validate().unwrap();

        assert_eq!(layout.disks.len(), 3);
        assert_eq!(layout.disks[0].name, "disk0");
        assert_eq!(layout.disks[0].partitions.len(), 2);
        assert!(layout.disks[0].partitions[0].is_esp());
        for disk in &layout.disks[1..] {
            assert_eq!(disk.partitions.len(), 1);
            assert_eq!(disk.partitions[0].name, "zfs");
            assert_eq!(disk.partitions[0].size, "100%");
        }
        assert_eq!(layout.pools.len(), 1);
        assert_eq!(layout.pools[0].name, "NIXROOT");
        assert_eq!(layout.pools[0].mode, "raidz");
        assert_eq!(layout.member_count("NIXROOT"), 3);
        assert!(layout.title.contains("multi-disk ZFS (zfs-raidz)"));
    }

    #[test]
    fn test_rendered_pool_matches_disko_schema() {
        let config = zfs_config(StorageMode::ZfsStripe, &["/dev/nvme0n1", "/dev/nvme1n1"]);
        let text = build_disko_config(&config).unwrap().render();

        assert!(text.starts_with("# Disko configuration for tuinix - multi-disk ZFS (zfs-stripe)\n"));
        assert!(text.contains("{ lib, ... }:\n{\n  disko = {\n    devices = {\n"));
        assert!(text.contains("mode = \"\";"));
        assert!(text.contains("type = \"EF00\";"));
        assert!(text.contains("size = \"5G\";"));
        assert!(text.contains("mountOptions = [ \"umask=0077\" ];"));
        assert!(text.contains("ashift = \"12\";"));
        assert!(text.contains("encryption = \"aes-256-gcm\";"));
        assert!(text.contains("keylocation = \"prompt\";"));
        assert!(text.contains("\"com.sun:auto-snapshot\" = \"false\";"));
        assert!(text.contains("zfs snapshot NIXROOT/root@blank"));
        assert!(text.contains("quota = \"100G\";"));
        assert!(text.contains("type = \"zfs_volume\";"));
        assert!(text.contains("mountOptions = [ \"defaults\" \"nofail\" ];"));
        assert!(text.contains("device = \"/dev/nvme1n1\";"));
        assert_eq!(text.matches('{').count(), text.matches('}').count());
    }

    #[test]
    fn test_single_disk_zfs_uses_stripe_pool() {
        let config = zfs_config(StorageMode::Zfs, &["/dev/vda"]);
        let layout = build_disko_config(&config).unwrap();
        layout.validate().unwrap();
        assert_eq!(layout.disks.len(), 1);
        assert_eq!(layout.pools[0].mode, "");
        assert_eq!(layout.member_count("NIXROOT"), 1);
    }

    #[test]
    fn test_xfs_layout_has_no_pool() {
        let mut config = Config {
            hostname: "box".to_string(),
            storage_mode: StorageMode::Xfs,
            disk: "/dev/sda".to_string(),
            ..Config::default()
        };
        config.allocation = plan_allocation(StorageMode::Xfs, &[100]);

        let layout = build_disko_config(&config).unwrap();
        layout.validate().unwrap();
        assert!(layout.pools.is_empty());
        let text = layout.render();
        assert!(!text.contains("zpool"));
        assert!(text.contains("format = \"xfs\";"));
        assert!(text.contains("mountpoint = \"/\";"));
    }

    #[test]
    fn test_partitions_mode_has_no_layout() {
        let config = Config {
            storage_mode: StorageMode::Partitions,
            disk: "/dev/sda".to_string(),
            ..Config::default()
        };
        assert!(matches!(build_disko_config(&config), Err(TuinixError::Plan(_))));
    }

    #[test]
    fn test_missing_allocation_is_rejected() {
        let config = Config {
            storage_mode: StorageMode::Zfs,
            disk: "/dev/sda".to_string(),
            ..Config::default()
        };
        let err = build_disko_config(&config).unwrap_err();
        assert!(err.to_string().contains("has not been calculated"));
    }

    #[test]
    fn test_passphrase_never_rendered() {
        let mut config = zfs_config(StorageMode::Zfs, &["/dev/sda"]);
        config.passphrase = Some(Secret::new("pool-passphrase-123"));
        let text = build_disko_config(&config).unwrap().render();
        assert!(!text.contains("pool-passphrase-123"));
    }

    #[test]
    fn test_validate_rejects_undersized_raidz2() {
        let config = zfs_config(StorageMode::ZfsRaidz2, &["/dev/sda", "/dev/sdb", "/dev/sdc"]);
        let mut layout = build_disko_config(&config).unwrap();
        layout.validate().unwrap();

        layout.disks.pop();
        let err = layout.validate().unwrap_err();
        assert!(err.to_string().contains("needs at least 3"));
    }

    #[test]
    fn test_validate_rejects_undeclared_pool_and_duplicate_esp() {
        let config = zfs_config(StorageMode::ZfsStripe, &["/dev/sda", "/dev/sdb"]);

        let mut layout = build_disko_config(&config).unwrap();
        layout.pools[0].name = "OTHER".to_string();
        assert!(layout.validate().unwrap_err().to_string().contains("undeclared pool"));

        let mut layout = build_disko_config(&config).unwrap();
        layout.disks[1].partitions.insert(0, esp_partition("5G"));
        assert!(layout.validate().unwrap_err().to_string().contains("exactly one EFI"));
    }

    #[test]
    fn test_overcommitted_pool_is_rejected() {
        let mut config = zfs_config(StorageMode::Zfs, &["/dev/sda"]);
        config.allocation = plan_allocation(StorageMode::Zfs, &[10]);
        assert!(config.allocation.is_overcommitted());

        let err = build_disko_config(&config).unwrap_err();
        assert!(matches!(err, TuinixError::Plan(_)));
        assert!(err.to_string().contains("-16G"));

        let dir = tempfile::tempdir().unwrap();
        config.work_dir = dir.path().to_path_buf();
        assert!(write_disko_config(&config).is_err());
        assert!(!config.disko_config_path().exists());
    }

    #[test]
    fn test_unsafe_pool_names_never_reach_the_layout_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["P; reboot #", "my pool"] {
            let mut config = zfs_config(StorageMode::Zfs, &["/dev/sda"]);
            config.work_dir = dir.path().to_path_buf();
            config.zfs_pool_name = name.to_string();

            let layout = build_disko_config(&config).unwrap();
            assert!(layout.validate().is_err(), "pool name {:?} should be rejected", name);
            assert!(write_disko_config(&config).is_err());
            assert!(!config.disko_config_path().exists());
        }
    }

    #[test]
    fn test_write_failure_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();

        let mut config = zfs_config(StorageMode::Zfs, &["/dev/sda"]);
        config.work_dir = blocker.clone();
        let err = write_disko_config(&config).unwrap_err();
        assert!(matches!(err, TuinixError::Fs { .. }));
        assert!(err.to_string().starts_with("mkdir "));
        assert!(err.to_string().contains(&blocker.display().to_string()));
    }

    #[test]
    fn test_write_disko_config_creates_host_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = zfs_config(StorageMode::Zfs, &["/dev/sda"]);
        config.work_dir = dir.path().to_path_buf();

        let path = write_disko_config(&config).unwrap();
        assert_eq!(path, dir.path().join("hosts/tuinix/disks.nix"));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Generated by tuinix installer"));
    }
}
