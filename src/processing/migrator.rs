//! Backup → validate → tear down → recreate → rewire, for one resource.

use super::backup::BackupStore;
use super::error::{ErrorKind, MigrationError, Step};
use super::{load_balancer, vm};
use crate::azure::CloudProvider;
use crate::models::{
    DependentAttachment, MigrationRequest, MigrationTarget, ResourceId, ResourceKind, ResourceRef,
    ResourceSnapshot,
};
use serde::Serialize;
use std::path::PathBuf;

/// Switches that change what a migration does beyond the required sequence.
#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Delete the intermediate disk snapshots once the VM is recreated.
    pub cleanup_snapshots: bool,
}

/// Result of a successful migration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub kind: ResourceKind,
    pub resource_id: ResourceId,
    pub target: MigrationTarget,
    /// Attachments of the rebuilt interfaces, with their new identifiers.
    pub attachments: Vec<DependentAttachment>,
    pub backup_path: PathBuf,
    /// Whether backend pool / NAT rule memberships were already restored.
    pub rewired: bool,
}

/// Runs the migration sequence against a [`CloudProvider`].
pub struct ResourceMigrator<'a> {
    pub(super) provider: &'a dyn CloudProvider,
    pub(super) backups: BackupStore,
    pub(super) options: MigrationOptions,
}

impl<'a> ResourceMigrator<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        backups: BackupStore,
        options: MigrationOptions,
    ) -> ResourceMigrator<'a> {
        ResourceMigrator {
            provider,
            backups,
            options,
        }
    }

    /// Migrate one resource, returning the identifier of its replacement.
    pub fn migrate(&self, request: &MigrationRequest) -> Result<MigrationOutcome, MigrationError> {
        log::info!(
            "#Start migrate {kind} {resource} to {target}",
            kind = request.kind,
            resource = request.resource,
            target = request.target
        );
        let outcome = match (request.kind, request.target) {
            (ResourceKind::VirtualMachine, MigrationTarget::Zone(zone)) => {
                vm::migrate_vm(self, &request.resource, zone)
            }
            (ResourceKind::LoadBalancer, MigrationTarget::StandardSku) => {
                load_balancer::migrate_load_balancer(self, &request.resource)
            }
            (kind, target) => Err(MigrationError::new(
                ErrorKind::PreconditionNotMet,
                &request.resource,
                Step::Validate,
                format!("migrating a {kind} to {target} is not supported"),
            )),
        };
        match &outcome {
            Ok(o) => log::info!("Migrated {} -> {}", request.resource, o.resource_id),
            Err(e) if e.is_fatal() => log::error!("{e}"),
            Err(e) => log::warn!("{e}"),
        }
        outcome
    }

    /// Write the configuration backup; nothing destructive may run unless this succeeds.
    pub(super) fn backup(
        &self,
        snapshot: &ResourceSnapshot,
        resource: &ResourceRef,
    ) -> Result<PathBuf, MigrationError> {
        self.backups.write(snapshot).map_err(|e| {
            MigrationError::new(
                ErrorKind::BackupFailed,
                resource,
                Step::Backup,
                format!("config backup not confirmed, nothing was deleted: {e}"),
            )
        })
    }
}
