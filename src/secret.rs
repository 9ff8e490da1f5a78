//! In-memory secret wrapper for passphrases and account passwords.
//!
//! # Security Model
//!
//! **CRITICAL**: A `Secret` never leaves process memory except through a
//! child process's stdin (see [`crate::step::StdinPayload::Secret`]).
//!
//! - `Debug` and `Display` print a fixed redaction marker
//! - The buffer is zeroed on drop (`zeroize::Zeroizing`)
//! - There is no `Serialize` impl, so a config file can never carry it

use std::fmt;

use zeroize::Zeroizing;

/// Marker printed wherever a secret would otherwise appear.
pub const REDACTED: &str = "<redacted>";

/// A passphrase or password held only in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wrap a plaintext value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Borrow the plaintext. Callers must not log or persist it.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build a stdin payload that answers a prompt `times` times,
    /// one line per answer.
    ///
    /// ZFS asks for a new passphrase twice (enter + confirm).
    pub fn repeated_lines(&self, times: usize) -> Secret {
        let mut buf = Zeroizing::new(String::with_capacity((self.0.len() + 1) * times));
        for _ in 0..times {
            buf.push_str(&self.0);
            buf.push('\n');
        }
        Secret(buf)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
