//! Move Azure VMs into availability zones and upgrade Basic load balancers to Standard.
//!
//! Both are destroy-and-recreate operations: the tool backs up the configuration,
//! validates everything it can up front, deletes the original and rebuilds it with
//! the same names, then reattaches load balancer memberships.

pub mod azure;
pub mod config;
pub mod models;
pub mod output;
pub mod processing;

pub use azure::{AzCliProvider, CloudProvider, InMemoryProvider};
pub use models::{MigrationRequest, ResourceRef};
pub use processing::{
    migrate_load_balancer_vms, migrate_vm_and_rewire, BackupStore, BatchOptions, BatchReport,
    MigrationError, MigrationOptions, MigrationOutcome, ResourceMigrator,
};
