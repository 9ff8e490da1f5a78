//! Account password hashing.
//!
//! Produces the SHA-512 crypt string (`$6$salt$hash`) that NixOS expects in
//! `users.users.<name>.hashedPassword`. The plaintext only ever travels on
//! `mkpasswd`'s stdin.

use tracing::{debug, error};

use crate::error::{Result, TuinixError};
use crate::secret::Secret;
use crate::step::{run_tool, CommandRunner};
use crate::tools::user::MkpasswdArgs;

/// Hash `password` with `mkpasswd -m sha-512 --stdin`.
///
/// # Errors
///
/// - `Spawn` if `mkpasswd` is not installed
/// - `StepFailed` on non-zero exit or empty output
pub fn hash_password<R: CommandRunner + ?Sized>(runner: &R, password: &Secret) -> Result<String> {
    let args = MkpasswdArgs { password: password.clone() };
    let out = run_tool(runner, &args, "password")?;

    if !out.success {
        error!("mkpasswd failed: {}", out.stderr.trim());
    }
    let out = out.ensure_success("mkpasswd", "password")?;

    let hash = out.stdout.trim().to_string();
    if hash.is_empty() {
        return Err(TuinixError::StepFailed {
            operation: "mkpasswd".to_string(),
            target: "password".to_string(),
            exit_code: out.exit_code,
            stderr: "empty output".to_string(),
        });
    }

    debug!("Password hashed ({} chars)", hash.len());
    Ok(hash)
}

/// Whether `hash` looks like a SHA-512 crypt string.
pub fn is_sha512_crypt(hash: &str) -> bool {
    let Some(rest) = hash.strip_prefix("$6$") else {
        return false;
    };
    // Optional "rounds=N$" then "salt$digest"
    let rest = match rest.strip_prefix("rounds=") {
        Some(r) => match r.split_once('$') {
            Some((rounds, tail)) if rounds.parse::<u32>().is_ok() => tail,
            _ => return false,
        },
        None => rest,
    };
    matches!(rest.split_once('$'), Some((salt, digest)) if !salt.is_empty() && !digest.is_empty())
}
