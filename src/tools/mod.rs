//! Type-safe tool argument modules.
//!
//! This module contains structs that implement `ToolArgs` for each external
//! tool. Each struct maps Rust fields to the exact command line (and stdin)
//! the tool expects.

pub mod disk;
pub mod disko;
pub mod user;
pub mod zfs;
