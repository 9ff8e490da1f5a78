//! Type-safe arguments for ZFS pool tools.

use crate::step::ToolArgs;

/// `zgenhostid <hostid>`
///
/// Writes `/etc/hostid`. Refuses to overwrite an existing file, so the
/// executor removes the stale one first.
#[derive(Debug, Clone)]
pub struct ZgenhostidArgs {
    /// Eight hexadecimal digits
    pub host_id: String,
}

impl ToolArgs for ZgenhostidArgs {
    fn program(&self) -> &'static str {
        "zgenhostid"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.host_id.clone()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}

/// `zpool export -a`
///
/// Best effort: fails harmlessly when no pool is imported.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZpoolExportAllArgs;

impl ToolArgs for ZpoolExportAllArgs {
    fn program(&self) -> &'static str {
        "zpool"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["export".to_string(), "-a".to_string()]
    }

    fn is_destructive(&self) -> bool {
        true
    }
}
