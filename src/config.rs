//! Installation record.
//!
//! Everything the wizard (or a config file) decides about one installation:
//! host identity, storage layout, target devices and the computed space
//! budget. Saved and loaded as JSON.
//!
//! The pool passphrase lives here only in memory. It is skipped by serde and
//! redacted by `Debug`, so neither a saved config nor a log line carries it.

use anyhow::{Context, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::allocation::AllocationPlan;
use crate::error::TuinixError;
use crate::secret::Secret;
use crate::types::StorageMode;

/// Default name of the ZFS pool.
pub const DEFAULT_POOL_NAME: &str = "NIXROOT";

/// Default location of the tuinix flake checkout on the live image.
pub const DEFAULT_WORK_DIR: &str = "/home/nixos/tuinix";

/// Installation configuration that can be saved/loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Host identity
    pub hostname: String,
    /// Eight hex digits, written to `/etc/hostid` for ZFS
    pub host_id: String,

    // Storage
    pub storage_mode: StorageMode,
    /// Target disk for single-disk layouts
    pub disk: String,
    /// Target disks for multi-disk layouts, in pool order
    pub disks: Vec<String>,
    /// Existing ESP for `Partitions` mode
    pub boot_partition: String,
    /// Existing partition reformatted as XFS root for `Partitions` mode
    pub root_partition: String,
    pub zfs_pool_name: String,
    /// Flake checkout; layouts go to `<work_dir>/hosts/<hostname>/disks.nix`
    pub work_dir: PathBuf,
    pub allocation: AllocationPlan,

    /// ZFS encryption passphrase, memory only
    #[serde(skip)]
    pub passphrase: Option<Secret>,

    // Account (consumed by later installer steps)
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub locale: String,
    pub keymap: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            host_id: String::new(),
            storage_mode: StorageMode::default(),
            disk: String::new(),
            disks: Vec::new(),
            boot_partition: String::new(),
            root_partition: String::new(),
            zfs_pool_name: DEFAULT_POOL_NAME.to_string(),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            allocation: AllocationPlan::default(),
            passphrase: None,
            username: String::new(),
            fullname: String::new(),
            email: String::new(),
            locale: "en_US.UTF-8".to_string(),
            keymap: "us".to_string(),
        }
    }
}

impl Config {
    /// Create a new configuration with a fresh host id
    pub fn new() -> crate::error::Result<Self> {
        Ok(Self {
            host_id: generate_host_id()?,
            ..Self::default()
        })
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Disks the layout is built on: `disks` for multi-disk modes, otherwise
    /// `disk` (if set).
    pub fn target_disks(&self) -> Vec<String> {
        if self.storage_mode.is_multi_disk() {
            self.disks.clone()
        } else if self.disk.is_empty() {
            Vec::new()
        } else {
            vec![self.disk.clone()]
        }
    }

    /// `<work_dir>/hosts/<hostname>`
    pub fn host_dir(&self) -> PathBuf {
        self.work_dir.join("hosts").join(&self.hostname)
    }

    /// `<work_dir>/hosts/<hostname>/disks.nix`
    pub fn disko_config_path(&self) -> PathBuf {
        self.host_dir().join("disks.nix")
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        validate_hostname(&self.hostname)?;

        if !is_host_id(&self.host_id) {
            return Err(TuinixError::validation(format!(
                "Host ID must be exactly 8 hexadecimal digits, got '{}'",
                self.host_id
            )));
        }

        if !self.username.is_empty() {
            validate_username(&self.username)?;
        }

        let mode = self.storage_mode;
        if mode.uses_partitions() {
            return self.validate_partitions();
        }

        if mode.is_zfs() {
            validate_pool_name(&self.zfs_pool_name)?;
        }

        let disks = self.target_disks();
        if disks.len() < mode.min_disks() {
            return Err(TuinixError::validation(format!(
                "{} needs at least {} disk(s), {} selected",
                mode.title(),
                mode.min_disks(),
                disks.len()
            )));
        }

        let mut seen = HashSet::new();
        for disk in &disks {
            validate_device_path(disk)?;
            if !seen.insert(disk.as_str()) {
                return Err(TuinixError::validation(format!(
                    "Disk {} is selected more than once",
                    disk
                )));
            }
        }

        Ok(())
    }

    fn validate_partitions(&self) -> crate::error::Result<()> {
        if self.boot_partition.is_empty() || self.root_partition.is_empty() {
            return Err(TuinixError::validation(
                "Both a boot partition and a root partition must be selected",
            ));
        }
        validate_device_path(&self.boot_partition)?;
        validate_device_path(&self.root_partition)?;
        if self.boot_partition == self.root_partition {
            return Err(TuinixError::validation(
                "Boot and root must be different partitions",
            ));
        }
        Ok(())
    }
}

fn validate_device_path(path: &str) -> crate::error::Result<()> {
    if path.starts_with("/dev/") && path.len() > "/dev/".len() {
        Ok(())
    } else {
        Err(TuinixError::validation(format!(
            "Invalid device path '{}' - must start with /dev/",
            path
        )))
    }
}

/// Hostname: 1-63 characters, starts with a letter, letters, digits and
/// hyphens only, no trailing hyphen.
fn validate_hostname(hostname: &str) -> crate::error::Result<()> {
    if hostname.is_empty() {
        return Err(TuinixError::validation("Hostname must be specified"));
    }
    if hostname.len() > 63 {
        return Err(TuinixError::validation("Hostname must be at most 63 characters long"));
    }
    if !hostname.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(TuinixError::validation("Hostname must start with a letter"));
    }
    if hostname.ends_with('-') {
        return Err(TuinixError::validation("Hostname must not end with a hyphen"));
    }
    if !hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(TuinixError::validation(
            "Hostname can only contain letters, numbers, and hyphens",
        ));
    }
    Ok(())
}

/// ZFS pool name: starts with a letter; letters, digits, `_`, `.`, `:` and
/// `-` only. The name ends up in shell hooks and attribute keys of the
/// generated layout.
pub fn validate_pool_name(name: &str) -> crate::error::Result<()> {
    if name.is_empty() {
        return Err(TuinixError::validation("ZFS pool name must be specified"));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(TuinixError::validation(format!(
            "ZFS pool name '{}' must start with a letter",
            name
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
    {
        return Err(TuinixError::validation(format!(
            "ZFS pool name '{}' can only contain letters, numbers, '_', '.', ':' and '-'",
            name
        )));
    }
    let lower = name.to_ascii_lowercase();
    if lower == "log"
        || ["mirror", "raidz", "draid", "spare"]
            .iter()
            .any(|reserved| lower.starts_with(reserved))
    {
        return Err(TuinixError::validation(format!(
            "ZFS pool name '{}' starts with a reserved word",
            name
        )));
    }
    Ok(())
}

fn validate_username(username: &str) -> crate::error::Result<()> {
    if username.len() > 32 {
        return Err(TuinixError::validation("Username must be at most 32 characters long"));
    }
    if !username.starts_with(|c: char| c.is_ascii_lowercase() || c == '_') {
        return Err(TuinixError::validation(
            "Username must start with a lowercase letter or underscore",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(TuinixError::validation(
            "Username can only contain lowercase letters, numbers, underscores and hyphens",
        ));
    }
    Ok(())
}

/// Exactly eight hexadecimal digits.
pub fn is_host_id(value: &str) -> bool {
    value.len() == 8 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Fresh random host identifier, eight lowercase hex digits.
///
/// Drawn from the OS random source. Fails instead of falling back to a
/// predictable value.
pub fn generate_host_id() -> crate::error::Result<String> {
    let mut buf = [0u8; 4];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| TuinixError::config(format!("Failed to generate a host id: {}", e)))?;
    Ok(format!("{:08x}", u32::from_ne_bytes(buf)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            hostname: "tuinix".to_string(),
            host_id: "8425e349".to_string(),
            disk: "/dev/sda".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.zfs_pool_name, "NIXROOT");
        assert_eq!(config.work_dir, PathBuf::from("/home/nixos/tuinix"));
        assert_eq!(config.storage_mode, StorageMode::Zfs);
        assert!(is_host_id(&Config::new().unwrap().host_id));
    }

    #[test]
    fn test_paths() {
        let config = valid_config();
        assert_eq!(config.host_dir(), PathBuf::from("/home/nixos/tuinix/hosts/tuinix"));
        assert_eq!(
            config.disko_config_path(),
            PathBuf::from("/home/nixos/tuinix/hosts/tuinix/disks.nix")
        );
    }

    #[test]
    fn test_target_disks_by_mode() {
        let mut config = valid_config();
        config.disks = vec!["/dev/sdb".to_string(), "/dev/sdc".to_string()];
        assert_eq!(config.target_disks(), vec!["/dev/sda"]);

        config.storage_mode = StorageMode::ZfsStripe;
        assert_eq!(config.target_disks(), vec!["/dev/sdb", "/dev/sdc"]);

        config.storage_mode = StorageMode::Xfs;
        config.disk.clear();
        assert!(config.target_disks().is_empty());
    }

    #[test]
    fn test_validate_accepts_single_disk() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn test_validate_hostname() {
        let mut config = valid_config();
        let long = "a".repeat(64);
        for bad in ["", "1host", "host_name", "host-", long.as_str()] {
            config.hostname = bad.to_string();
            assert!(config.validate().is_err(), "hostname {:?} should be rejected", bad);
        }
        config.hostname = "my-laptop2".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_host_id() {
        let mut config = valid_config();
        config.host_id = "xyz".to_string();
        assert!(config.validate().is_err());
        config.host_id = "DEADBEEF".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_disk_count_per_mode() {
        let mut config = valid_config();
        config.storage_mode = StorageMode::ZfsRaidz2;
        config.disks = vec!["/dev/sda".to_string(), "/dev/sdb".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least 3"));

        config.disks.push("/dev/sdc".to_string());
        config.validate().unwrap();

        config.disks.push("/dev/sda".to_string());
        assert!(config.validate().unwrap_err().to_string().contains("more than once"));
    }

    #[test]
    fn test_validate_pool_name() {
        let mut config = valid_config();
        for bad in ["", "P; reboot #", "my pool", "1pool", "pool/ds", "raidz1", "$(id)"] {
            config.zfs_pool_name = bad.to_string();
            assert!(config.validate().is_err(), "pool name {:?} should be rejected", bad);
        }
        for good in ["NIXROOT", "tank", "rpool_2", "data.fast:a-b"] {
            config.zfs_pool_name = good.to_string();
            config.validate().unwrap();
        }

        // Only ZFS layouts use the pool name
        config.storage_mode = StorageMode::Xfs;
        config.zfs_pool_name = "my pool".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_device_paths() {
        let mut config = valid_config();
        config.disk = "sda".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_partitions_mode() {
        let mut config = valid_config();
        config.storage_mode = StorageMode::Partitions;
        assert!(config.validate().is_err());

        config.boot_partition = "/dev/sda1".to_string();
        config.root_partition = "/dev/sda1".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("different"));

        config.root_partition = "/dev/sda2".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_save_load_never_persists_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("install.json");

        let mut config = valid_config();
        config.passphrase = Some(Secret::new("do-not-persist"));
        config.save_to_file(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("do-not-persist"));
        assert!(!text.contains("passphrase"));
        assert!(text.contains("\"storage_mode\": \"zfs\""));

        let loaded = Config::load_from_file(&path).unwrap();
        assert!(loaded.passphrase.is_none());
        assert_eq!(loaded.hostname, "tuinix");
        assert_eq!(loaded.disk, "/dev/sda");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"hostname": "box", "storage_mode": "zfs-raidz"}"#).unwrap();
        assert_eq!(config.storage_mode, StorageMode::ZfsRaidz);
        assert_eq!(config.zfs_pool_name, DEFAULT_POOL_NAME);
    }

    #[test]
    fn test_debug_redacts_passphrase() {
        let mut config = valid_config();
        config.passphrase = Some(Secret::new("hunter2"));
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_generate_host_id_format() {
        let ids: HashSet<String> = (0..16).map(|_| generate_host_id().unwrap()).collect();
        assert!(ids.iter().all(|id| is_host_id(id)));
        assert!(ids.len() > 1);
    }
}
