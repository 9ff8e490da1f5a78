//! Type-safe arguments for `disko`.
//!
//! # Security Model
//!
//! **CRITICAL**: The ZFS encryption passphrase is NEVER passed on the command
//! line (visible in `ps aux`) and NEVER written to a keyfile. The generated
//! pool declares `keylocation = "prompt"`, and `zfs create` reads the
//! passphrase twice (enter + confirm) from disko's stdin.

use std::path::PathBuf;

use crate::secret::Secret;
use crate::step::{StdinPayload, ToolArgs};

/// `disko --mode disko <config>`
///
/// | Rust Field   | CLI / stdin                     |
/// |--------------|---------------------------------|
/// | `config`     | positional path                 |
/// | `passphrase` | stdin, `pass\npass\n` when set  |
#[derive(Debug, Clone)]
pub struct DiskoArgs {
    /// Path to the generated `disks.nix`
    pub config: PathBuf,
    /// Pool passphrase for encrypted layouts
    pub passphrase: Option<Secret>,
}

impl ToolArgs for DiskoArgs {
    fn program(&self) -> &'static str {
        "disko"
    }

    /// `--mode disko` runs destroy, format and mount in one go.
    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "--mode".to_string(),
            "disko".to_string(),
            self.config.display().to_string(),
        ]
    }

    fn stdin_payload(&self) -> Option<StdinPayload> {
        self.passphrase
            .as_ref()
            .map(|p| StdinPayload::Secret(p.repeated_lines(2)))
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passphrase_never_in_cli_args() {
        let args = DiskoArgs {
            config: PathBuf::from("/home/nixos/tuinix/hosts/box/disks.nix"),
            passphrase: Some(Secret::new("s3cret-pass")),
        };
        let cli = args.to_cli_args();
        assert_eq!(cli, vec!["--mode", "disko", "/home/nixos/tuinix/hosts/box/disks.nix"]);
        assert!(cli.iter().all(|a| !a.contains("s3cret-pass")));
    }

    #[test]
    fn test_passphrase_sent_twice_on_stdin() {
        let args = DiskoArgs {
            config: PathBuf::from("disks.nix"),
            passphrase: Some(Secret::new("pw")),
        };
        match args.stdin_payload() {
            Some(StdinPayload::Secret(s)) => assert_eq!(s.expose(), "pw\npw\n"),
            other => panic!("expected secret payload, got {other:?}"),
        }
    }

    #[test]
    fn test_unencrypted_has_no_stdin() {
        let args = DiskoArgs { config: PathBuf::from("disks.nix"), passphrase: None };
        assert!(args.stdin_payload().is_none());
        assert!(args.is_destructive());
    }
}
