//! Type-safe arguments for account tools.

use crate::secret::Secret;
use crate::step::{StdinPayload, ToolArgs};

/// `mkpasswd -m sha-512 --stdin`
///
/// The plaintext goes to stdin only, never to argv or a temporary file.
#[derive(Debug, Clone)]
pub struct MkpasswdArgs {
    pub password: Secret,
}

impl ToolArgs for MkpasswdArgs {
    fn program(&self) -> &'static str {
        "mkpasswd"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-m".to_string(), "sha-512".to_string(), "--stdin".to_string()]
    }

    fn stdin_payload(&self) -> Option<StdinPayload> {
        Some(StdinPayload::Secret(self.password.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mkpasswd_args() {
        let args = MkpasswdArgs { password: Secret::new("pw") };
        assert_eq!(args.to_cli_args(), vec!["-m", "sha-512", "--stdin"]);
        assert!(args.stdin_payload().is_some_and(|p| p.is_secret()));
        assert!(!args.is_destructive());
    }
}
