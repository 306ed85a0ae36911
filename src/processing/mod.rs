//! Migration logic.
//!
//! This module contains the business logic of the zone migration:
//! - [`migrator`] - Backup, validate, tear down and recreate one resource
//! - [`vm`] / [`load_balancer`] - The per-kind sequences behind the migrator
//! - [`zones`] - Supported-zone lookup and round-robin assignment
//! - [`rewire`] - Restoring load balancer memberships of rebuilt NICs
//! - [`batch`] - All VMs behind a load balancer in one run
//! - [`backup`] - Configuration backups
//! - [`error`] - The migration error taxonomy

mod backup;
mod batch;
mod error;
mod load_balancer;
mod migrator;
mod rewire;
mod vm;
mod zones;

// Re-export public types and functions
pub use backup::BackupStore;
pub use batch::{
    migrate_load_balancer_vms, migrate_vm_and_rewire, BatchOptions, BatchReport, VmResult,
};
pub use error::{ErrorKind, MigrationContext, MigrationError, Step};
pub use migrator::{MigrationOptions, MigrationOutcome, ResourceMigrator};
pub use rewire::{LoadBalancerRewirer, RewireSummary};
pub use zones::{ResourceDescriptor, ZoneAssigner};
