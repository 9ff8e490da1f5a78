//! Pre-flight sanity checks for runtime environment
//!
//! Verifies the live system before any disk is touched:
//! - Required runtime binaries for the selected layout are present
//! - Running with root privileges (EUID 0)

use crate::error::{Result, TuinixError};
use crate::process_guard::CommandProcessGroup;
use crate::types::StorageMode;
use std::process::Command;
use tracing::{debug, info, warn};

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }

    /// Operator-facing explanation of every failed check.
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        if !self.is_root {
            lines.push("Root privileges required".to_string());
            lines.push("  The installer must run as root to format disks.".to_string());
            lines.push("  Solution: sudo tuinix ...".to_string());
        }

        if !self.missing_binaries.is_empty() {
            lines.push("Missing required binaries:".to_string());
            for binary in &self.missing_binaries {
                lines.push(format!("  - {} (nixpkgs: {})", binary, package_for_binary(binary)));
            }
            let mut packages: Vec<&str> = self
                .missing_binaries
                .iter()
                .map(|b| package_for_binary(b))
                .collect();
            packages.dedup();
            lines.push(format!("  Solution: nix-shell -p {}", packages.join(" ")));
        }

        lines.join("\n")
    }
}

/// Binaries every layout needs
const BASE_BINARIES: &[&str] = &[
    "lsblk",    // Device discovery (util-linux)
    "mount",    // util-linux
    "umount",   // util-linux
    "mkpasswd", // Account password hashing
];

/// Binaries needed by `mode` in addition to the base set
pub fn required_binaries(mode: StorageMode) -> Vec<&'static str> {
    let mut binaries = BASE_BINARIES.to_vec();
    if mode.uses_partitions() || mode == StorageMode::Xfs {
        binaries.push("mkfs.xfs");
    }
    if !mode.uses_partitions() {
        binaries.push("disko");
    }
    if mode.is_zfs() {
        binaries.push("zpool");
        binaries.push("zgenhostid");
    }
    binaries
}

/// Check if a binary is available in PATH
fn binary_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .in_new_process_group()
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Check if running as root (EUID 0)
fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Perform all sanity checks for `mode` and return the result
pub fn verify_environment(mode: StorageMode) -> SanityCheckResult {
    let missing = required_binaries(mode)
        .into_iter()
        .filter(|binary| !binary_exists(binary))
        .map(str::to_string)
        .collect();

    SanityCheckResult {
        missing_binaries: missing,
        is_root: is_running_as_root(),
    }
}

/// Map binary names to their nixpkgs attribute
fn package_for_binary(binary: &str) -> &'static str {
    match binary {
        "lsblk" | "mount" | "umount" => "util-linux",
        "mkfs.xfs" => "xfsprogs",
        "disko" => "disko",
        "zpool" | "zgenhostid" => "zfs",
        "mkpasswd" => "mkpasswd",
        _ => "unknown",
    }
}

/// Skip root check (for development/testing)
/// Set TUINIX_SKIP_ROOT_CHECK=1 to skip
pub fn should_skip_root_check() -> bool {
    std::env::var("TUINIX_SKIP_ROOT_CHECK")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Run pre-flight checks, failing with the full report
pub fn run_preflight_checks(mode: StorageMode, skip_root: bool) -> Result<()> {
    debug!("Running pre-flight sanity checks for {} (skip_root={})", mode, skip_root);

    let mut result = verify_environment(mode);

    if skip_root || should_skip_root_check() {
        warn!("Root check skipped");
        result.is_root = true;
    }

    if !result.is_ok() {
        return Err(TuinixError::missing(format!(
            "pre-flight check failed\n{}",
            result.report()
        )));
    }

    info!("Pre-flight checks passed");
    Ok(())
}
