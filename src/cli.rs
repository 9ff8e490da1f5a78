use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tuinix - storage planning and provisioning for NixOS installs
#[derive(Parser, Debug)]
#[command(name = "tuinix")]
#[command(about = "Plan, render and provision disk layouts for a tuinix NixOS installation")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: show what would be executed without making changes.
    ///
    /// Destructive operations (mkfs, mount, zgenhostid, disko) are skipped
    /// and logged. Read-only queries (lsblk) still execute so the preview
    /// is realistic.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Verbose logging (debug level). RUST_LOG overrides.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also append logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List disks (or the partitions of one disk)
    Disks {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// List the partitions of this disk instead
        #[arg(long, value_name = "DISK")]
        partitions: Option<String>,
    },
    /// List the supported storage layouts
    Modes,
    /// Compute the space allocation and provisioning plan for a config
    Plan {
        /// Installation config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Write the computed allocation back into the config file
        #[arg(long)]
        save: bool,
    },
    /// Generate hosts/<hostname>/disks.nix from a config
    Render {
        /// Installation config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Print the layout instead of writing it
        #[arg(long)]
        stdout: bool,
    },
    /// Format and mount the target storage (DESTRUCTIVE)
    Provision {
        /// Installation config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Read the ZFS encryption passphrase from the first line of stdin
        #[arg(long)]
        passphrase_stdin: bool,

        /// Confirm that the target disks may be erased
        #[arg(long)]
        yes: bool,
    },
    /// Read a password from stdin and print its SHA-512 crypt hash
    HashPassword,
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tuinix", "provision", "--config", "install.json", "--yes", "--dry-run", "-v",
        ])
        .unwrap();
        assert!(cli.dry_run);
        assert!(cli.verbose);
        match cli.command {
            Commands::Provision { config, yes, passphrase_stdin } => {
                assert_eq!(config, PathBuf::from("install.json"));
                assert!(yes);
                assert!(!passphrase_stdin);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_disks_partitions_flag() {
        let cli = Cli::try_parse_from(["tuinix", "disks", "--json", "--partitions", "/dev/sda"])
            .unwrap();
        match cli.command {
            Commands::Disks { json, partitions } => {
                assert!(json);
                assert_eq!(partitions.as_deref(), Some("/dev/sda"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_hash_password_subcommand_name() {
        let cli = Cli::try_parse_from(["tuinix", "hash-password"]).unwrap();
        assert!(matches!(cli.command, Commands::HashPassword));
    }
}
