//! tuinix - headless entry point for the storage provisioning core.

use anyhow::{bail, Context, Result};
use std::fs::OpenOptions;
use std::io::{self, BufRead};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use strum::IntoEnumIterator;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroizing;

use tuinix::cli::{Cli, Commands};
use tuinix::config::{generate_host_id, Config};
use tuinix::engine::allocation::calculate_space_allocation;
use tuinix::engine::disko::{build_disko_config, write_disko_config};
use tuinix::inventory::Inventory;
use tuinix::password::hash_password;
use tuinix::process_guard::{self, ProcessGuard};
use tuinix::provision::Provisioner;
use tuinix::sanity::run_preflight_checks;
use tuinix::secret::Secret;
use tuinix::step::{CommandRunner, DryRunRunner, SystemRunner};
use tuinix::types::StorageMode;

/// Initialize tracing: stderr always, plus an append-only log file if asked.
fn init_logging(cli: &Cli) -> Result<()> {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            let file_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Err(e) = init_logging(&cli) {
        eprintln!("✗ {:#}", e);
        return ExitCode::FAILURE;
    }
    info!("tuinix {} starting", env!("CARGO_PKG_VERSION"));

    // Terminate tool process groups if we receive SIGINT/SIGTERM/SIGHUP
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    if cli.dry_run {
        info!("Dry-run mode: destructive operations will be logged and skipped");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn make_runner(dry_run: bool) -> Box<dyn CommandRunner> {
    if dry_run {
        Box::new(DryRunRunner::new(SystemRunner))
    } else {
        Box::new(SystemRunner)
    }
}

fn run(cli: &Cli) -> Result<()> {
    let runner = make_runner(cli.dry_run);

    match &cli.command {
        Commands::Disks { json, partitions } => list_devices(runner.as_ref(), *json, partitions.as_deref()),
        Commands::Modes => {
            for mode in StorageMode::iter() {
                println!("{:<12} {:<30} {}", mode.to_string(), mode.title(), mode.description());
            }
            Ok(())
        }
        Commands::Plan { config, save } => plan(runner.as_ref(), config, *save),
        Commands::Render { config, stdout } => render(runner.as_ref(), config, *stdout),
        Commands::Provision { config, passphrase_stdin, yes } => {
            provision(runner.as_ref(), config, *passphrase_stdin, *yes, cli.dry_run)
        }
        Commands::HashPassword => {
            let password = read_secret_line().context("Failed to read password from stdin")?;
            let hash = hash_password(&SystemRunner, &password)?;
            println!("{}", hash);
            Ok(())
        }
        Commands::Validate { config } => {
            info!("Validating configuration file: {:?}", config);
            let loaded = Config::load_from_file(config)?;
            loaded.validate()?;
            println!("✓ Configuration file is valid: {}", config.display());
            Ok(())
        }
    }
}

fn list_devices(runner: &dyn CommandRunner, json: bool, partitions: Option<&str>) -> Result<()> {
    let inventory = Inventory::new(runner);

    match partitions {
        Some(disk) => {
            let parts = inventory.list_partitions(disk);
            if json {
                println!("{}", serde_json::to_string_pretty(&parts)?);
            } else {
                for p in &parts {
                    println!("{:<20} {:>8} {:<8} {}", p.path, p.size, p.fs_type, p.label);
                }
            }
        }
        None => {
            let disks = inventory.list_disks();
            if json {
                println!("{}", serde_json::to_string_pretty(&disks)?);
            } else {
                for d in &disks {
                    println!("{:<16} {:>8}  {}", d.path, d.size, d.model);
                }
            }
        }
    }
    Ok(())
}

/// Load, fill in a host id if missing, and validate.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_from_file(path)?;
    if config.host_id.is_empty() {
        config.host_id = generate_host_id()?;
        info!("Generated host id {}", config.host_id);
    }
    config.validate()?;
    Ok(config)
}

fn allocate(runner: &dyn CommandRunner, config: &mut Config) {
    let inventory = Inventory::new(runner);
    let allocation = calculate_space_allocation(config, &inventory);
    if allocation.is_overcommitted() {
        warn!("Selected storage is smaller than the minimum layout; /home has no space left");
    }
}

fn plan(runner: &dyn CommandRunner, path: &Path, save: bool) -> Result<()> {
    let mut config = load_config(path)?;
    allocate(runner, &mut config);

    println!("{}", config.allocation.summary());
    let plan = Provisioner::new(runner).plan(&config)?;
    println!("{}", plan.summary());

    if save {
        config.save_to_file(path)?;
        info!("Saved allocation to {}", path.display());
    }
    Ok(())
}

fn render(runner: &dyn CommandRunner, path: &Path, to_stdout: bool) -> Result<()> {
    let mut config = load_config(path)?;
    allocate(runner, &mut config);

    if to_stdout {
        let layout = build_disko_config(&config)?;
        layout.validate()?;
        print!("{}", layout.render());
    } else {
        let written = write_disko_config(&config)?;
        println!("✓ Wrote {}", written.display());
    }
    Ok(())
}

fn provision(
    runner: &dyn CommandRunner,
    path: &Path,
    passphrase_stdin: bool,
    yes: bool,
    dry_run: bool,
) -> Result<()> {
    let mut config = load_config(path)?;

    if passphrase_stdin {
        config.passphrase =
            Some(read_secret_line().context("Failed to read passphrase from stdin")?);
    }
    if config.storage_mode.is_encrypted() && config.passphrase.is_none() {
        bail!(
            "{} is encrypted; pass --passphrase-stdin and pipe the passphrase",
            config.storage_mode.title()
        );
    }

    if !yes && !dry_run {
        let targets = if config.storage_mode.uses_partitions() {
            config.root_partition.clone()
        } else {
            config.target_disks().join(", ")
        };
        bail!("Refusing to erase {} without --yes", targets);
    }

    if !dry_run {
        run_preflight_checks(config.storage_mode, false)?;
    }

    allocate(runner, &mut config);
    if !config.storage_mode.uses_partitions() {
        write_disko_config(&config)?;
    }

    let guard = ProcessGuard::new();
    let report = Provisioner::new(runner)
        .with_dry_run(dry_run)
        .format_disk(&config)?;
    debug!("Child processes still registered: {}", guard.child_count());

    for warning in &report.warnings {
        println!("! {}", warning);
    }
    println!("✓ Storage provisioned ({} operations)", report.ops_run);
    Ok(())
}

/// First line of stdin, without the line ending.
fn read_secret_line() -> Result<Secret> {
    let mut line = Zeroizing::new(String::new());
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim_end_matches(['\n', '\r']);
    if value.is_empty() {
        bail!("no input on stdin");
    }
    Ok(Secret::new(value))
}
