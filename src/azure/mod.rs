//! Azure control plane access.
//!
//! This module handles everything that talks to (or stands in for) Azure:
//! - [`provider`] - The [`CloudProvider`] trait the migrations run against
//! - [`az_provider`] - Implementation over the `az` CLI
//! - [`memory`] - In-memory implementation for tests and offline rehearsal
//! - [`cli`] - Command execution for Azure CLI
//! - [`arm`] - ARM request bodies built from creation specs

mod arm;
mod az_provider;
mod cli;
mod memory;
mod provider;

// Re-export public types and functions
pub use az_provider::{supported_zones_from_skus, AzCliProvider, SkuCapability};
pub use cli::{is_not_found, run, run_json, CliError};
pub use memory::{Fixture, InMemoryProvider, ProviderCall, ZoneCatalogEntry};
pub use provider::{CloudProvider, ProviderResult};
