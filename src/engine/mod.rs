//! Engine modules: the pure planning layer.
//!
//! The engine sits between the installation record (what the operator
//! chose) and execution (which tools run). Nothing here spawns a process.

pub mod allocation;
pub mod disko;
pub mod nix;
pub mod storage;
