//! tuinix storage core
//!
//! Device discovery, capacity planning, disko layout generation and the
//! destructive provisioning sequence for the tuinix NixOS installer.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod password;
pub mod process_guard;
pub mod provision;
pub mod sanity;
pub mod secret;
pub mod step;
pub mod tools;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use error::{Result, TuinixError};
pub use inventory::{DiskRecord, Inventory, PartitionRecord};
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use provision::{ProvisionReport, Provisioner};
pub use secret::Secret;
pub use step::{CommandRunner, DryRunRunner, Step, StepOutput, StdinPayload, SystemRunner, ToolArgs};
pub use types::{Filesystem, StorageMode};

// Planning engine
pub use engine::allocation::{
    calculate_space_allocation, plan_allocation, AllocationPlan, SpaceAllocation,
};
pub use engine::disko::{build_disko_config, write_disko_config, DiskoConfig};
pub use engine::storage::{calculate_provision_plan, ProvisionPlan, StorageOp};
pub use password::{hash_password, is_sha512_crypt};
