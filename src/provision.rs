//! Provisioning executor.
//!
//! Runs the destructive part of the installation: either formats and mounts
//! operator-chosen partitions, or hands a generated disko layout to `disko`
//! after clearing anything that would get in its way (mounted children,
//! imported pools, a stale host id).
//!
//! # Failure Policy
//!
//! | Operation          | On failure                               |
//! |--------------------|------------------------------------------|
//! | mkfs.xfs / mount   | abort with `StepFailed`                  |
//! | zgenhostid         | abort with `StepFailed`                  |
//! | umount             | log a warning, continue                  |
//! | zpool export -a    | log a warning, continue                  |
//! | disko              | log stdout + stderr, abort               |
//!
//! There is no retry and no rollback: a half-formatted disk is reported and
//! the operator starts over.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::storage::{calculate_provision_plan, ProvisionPlan, StorageOp};
use crate::error::{Result, TuinixError};
use crate::inventory::Inventory;
use crate::step::{run_tool, CommandRunner, StepOutput, ToolArgs};
use crate::tools::disk::{MkfsXfsArgs, MountArgs, UmountArgs};
use crate::tools::disko::DiskoArgs;
use crate::tools::zfs::{ZgenhostidArgs, ZpoolExportAllArgs};

/// Mount root of the new system on the live image.
pub const DEFAULT_TARGET_ROOT: &str = "/mnt";

/// File `zgenhostid` writes.
pub const DEFAULT_HOSTID_PATH: &str = "/etc/hostid";

/// Outcome of a completed provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Operations attempted, including best-effort ones that failed
    pub ops_run: usize,
    /// One line per best-effort operation that failed
    pub warnings: Vec<String>,
}

/// Executes provisioning plans through a [`CommandRunner`].
pub struct Provisioner<R> {
    runner: R,
    target_root: PathBuf,
    hostid_path: PathBuf,
    dry_run: bool,
}

impl<R: CommandRunner> Provisioner<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            target_root: PathBuf::from(DEFAULT_TARGET_ROOT),
            hostid_path: PathBuf::from(DEFAULT_HOSTID_PATH),
            dry_run: false,
        }
    }

    /// Mount the new system somewhere other than `/mnt`.
    pub fn with_target_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_root = path.into();
        self
    }

    /// Remove a different stale host id file.
    pub fn with_hostid_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hostid_path = path.into();
        self
    }

    /// Skip in-process filesystem changes (mountpoint creation, host id
    /// removal). Pair with a `DryRunRunner` so tools are skipped too.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Build the plan for `config`, discovering child devices of the
    /// target disks for the unmount sweep.
    pub fn plan(&self, config: &Config) -> Result<ProvisionPlan> {
        let children: Vec<(String, Vec<PathBuf>)> = if config.storage_mode.uses_partitions() {
            Vec::new()
        } else {
            let inventory = Inventory::new(&self.runner);
            config
                .target_disks()
                .into_iter()
                .map(|disk| {
                    let devices = inventory.child_devices(&disk);
                    (disk, devices)
                })
                .collect()
        };

        calculate_provision_plan(config, &self.target_root, &children)
    }

    /// Format and mount the target storage for `config`.
    ///
    /// # Errors
    ///
    /// - `MissingPrerequisite` if the disko layout has not been written, or
    ///   an encrypted layout has no passphrase; nothing has run yet
    /// - `StepFailed` / `Spawn` from the first fatal operation that fails
    pub fn format_disk(&self, config: &Config) -> Result<ProvisionReport> {
        info!("Provisioning storage: {}", config.storage_mode.title());

        if !config.storage_mode.uses_partitions() {
            self.check_disko_config(config)?;
        }

        if config.storage_mode.is_encrypted()
            && config.passphrase.as_ref().is_none_or(|p| p.is_empty())
        {
            return Err(TuinixError::missing(
                "an encryption passphrase is required for ZFS layouts",
            ));
        }

        let plan = self.plan(config)?;
        info!("{}", plan.summary());
        self.execute(&plan, config)
    }

    /// Run every op of `plan` in order.
    pub fn execute(&self, plan: &ProvisionPlan, config: &Config) -> Result<ProvisionReport> {
        let mut report = ProvisionReport::default();

        for (i, op) in plan.ops.iter().enumerate() {
            info!("[{}/{}] {}", i + 1, plan.ops.len(), op);
            report.ops_run += 1;

            if op.is_best_effort() {
                if let Some(warning) = self.run_best_effort(op) {
                    warn!("{}", warning);
                    report.warnings.push(warning);
                }
                continue;
            }

            self.run_fatal(op, config)?;
        }

        info!(
            "Provisioning completed: {} operation(s), {} warning(s)",
            report.ops_run,
            report.warnings.len()
        );
        Ok(report)
    }

    fn check_disko_config(&self, config: &Config) -> Result<()> {
        let path = config.disko_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => {
                debug!("{}:\n{}", path.display(), contents);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(TuinixError::missing(format!(
                "disko config does not exist: {}",
                path.display()
            ))),
            Err(e) => Err(TuinixError::fs("read", &path, e)),
        }
    }

    /// Returns a warning line if the op failed.
    fn run_best_effort(&self, op: &StorageOp) -> Option<String> {
        let result = match op {
            StorageOp::Unmount { device } => run_tool(
                &self.runner,
                &UmountArgs { device: device.clone() },
                &op.target(),
            ),
            StorageOp::ExportPools => run_tool(&self.runner, &ZpoolExportAllArgs, &op.target()),
            other => {
                return Some(format!("{} is not a best-effort operation, skipped", other));
            }
        };

        match result {
            Ok(out) if out.success => None,
            Ok(out) => Some(format!(
                "{} {} failed (exit code {}): {}",
                op.operation(),
                op.target(),
                out.exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                out.stderr.trim()
            )),
            Err(e) => Some(e.to_string()),
        }
    }

    fn run_fatal(&self, op: &StorageOp, config: &Config) -> Result<()> {
        let target = op.target();
        match op {
            StorageOp::FormatXfs { device } => {
                self.run_checked(&MkfsXfsArgs { device: device.clone() }, op.operation(), &target)
            }
            StorageOp::Mount { device, mountpoint } => {
                if !self.dry_run {
                    fs::create_dir_all(mountpoint)
                        .map_err(|e| TuinixError::fs("mkdir", mountpoint, e))?;
                }
                self.run_checked(
                    &MountArgs { device: device.clone(), mountpoint: mountpoint.clone() },
                    op.operation(),
                    &target,
                )
            }
            StorageOp::RegenerateHostId { host_id } => {
                self.remove_stale_hostid();
                self.run_checked(
                    &ZgenhostidArgs { host_id: host_id.clone() },
                    op.operation(),
                    &target,
                )
            }
            StorageOp::Disko { config_path, encrypted } => {
                let passphrase = if *encrypted { config.passphrase.clone() } else { None };
                let args = DiskoArgs { config: config_path.clone(), passphrase };
                let out = run_tool(&self.runner, &args, &target)?;
                if !out.success {
                    error!(
                        "disko failed with exit code {:?}\nstdout: {}\nstderr: {}",
                        out.exit_code, out.stdout, out.stderr
                    );
                } else {
                    debug!("disko output:\n{}", out.stdout);
                }
                out.ensure_success(op.operation(), &target).map(|_| ())
            }
            StorageOp::Unmount { .. } | StorageOp::ExportPools => {
                // Routed through run_best_effort by execute()
                Ok(())
            }
        }
    }

    fn run_checked<T: ToolArgs>(&self, args: &T, operation: &str, target: &str) -> Result<()> {
        let out: StepOutput = run_tool(&self.runner, args, target)?;
        out.ensure_success(operation, target).map(|_| ())
    }

    /// `zgenhostid` refuses to overwrite an existing file.
    fn remove_stale_hostid(&self) {
        if self.dry_run {
            info!("[dry-run] would remove {}", self.hostid_path.display());
            return;
        }
        match fs::remove_file(&self.hostid_path) {
            Ok(()) => debug!("Removed {}", self.hostid_path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", self.hostid_path.display(), e),
        }
    }
}
