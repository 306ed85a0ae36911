//! Domain models for Azure zone migration.
//!
//! This module contains the core data structures used throughout the application:
//! - [`ResourceId`] and [`ResourceKind`] - structured Azure identifiers
//! - [`VirtualMachine`], [`NetworkInterface`], [`PublicIpAddress`], [`LoadBalancer`] -
//!   typed views over provider-native documents
//! - [`MigrationRequest`], [`ZoneAssignment`], [`DependentAttachment`],
//!   [`ResourceSnapshot`] - migration bookkeeping
//! - [`spec`] - creation specs handed to the provider

mod document;
mod load_balancer;
mod migration;
mod network;
mod resource_id;
pub mod spec;
mod vm;

// Re-export public types
pub use document::{from_document, parse_zones, Sku, SubResource};
pub use load_balancer::{
    BackendAddressPool, FrontendIpConfiguration, InboundNatRule, LoadBalancer, LoadBalancingRule,
    Probe, ProbeProperties,
};
pub use migration::{
    DependentAttachment, MigrationRequest, MigrationTarget, PublicIpAttachment, ResourceSnapshot,
    RunState, ZoneAssignment,
};
pub use network::{AllocationMethod, IpConfiguration, NetworkInterface, PublicIpAddress};
pub use resource_id::{ResourceId, ResourceKind, ResourceRef};
pub use vm::{BootDiagnostics, DataDisk, OsDisk, VirtualMachine};
