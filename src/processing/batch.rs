//! Batch mode: every VM behind a Standard load balancer, spread across zones.

use super::backup::BackupStore;
use super::error::{ErrorKind, MigrationContext, MigrationError, Step};
use super::migrator::{MigrationOptions, MigrationOutcome, ResourceMigrator};
use super::rewire::{LoadBalancerRewirer, RewireSummary};
use super::zones::{ResourceDescriptor, ZoneAssigner};
use crate::azure::CloudProvider;
use crate::models::{
    DependentAttachment, LoadBalancer, MigrationRequest, NetworkInterface, ResourceId, ResourceKind,
    ResourceRef, VirtualMachine, ZoneAssignment,
};
use itertools::Itertools;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Keep going after a VM fails before its deletion step.
    pub continue_on_error: bool,
    pub cleanup_snapshots: bool,
}

/// One VM's result in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct VmResult {
    pub vm: ResourceId,
    pub zone: u8,
    pub result: Result<MigrationOutcome, MigrationError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub load_balancer: ResourceId,
    pub assignments: Vec<ZoneAssignment>,
    pub results: Vec<VmResult>,
    /// VMs never attempted because the batch stopped early.
    pub skipped: Vec<ResourceId>,
    pub rewire: Option<RewireSummary>,
    /// The failure that stopped the batch, if any.
    pub stopped_by: Option<MigrationError>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &MigrationOutcome> {
        self.results.iter().filter_map(|r| r.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &MigrationError> {
        self.results.iter().filter_map(|r| r.result.as_ref().err())
    }

    /// True when every VM migrated and rewiring completed.
    pub fn is_clean(&self) -> bool {
        self.failed().next().is_none() && self.skipped.is_empty() && self.stopped_by.is_none()
    }

    /// True when an original resource may be gone without a replacement.
    pub fn is_fatal(&self) -> bool {
        self.stopped_by.as_ref().map(|e| e.is_fatal()).unwrap_or(false)
    }
}

fn precondition(
    resource: &dyn std::fmt::Display,
    message: impl std::fmt::Display,
) -> MigrationError {
    MigrationError::new(ErrorKind::PreconditionNotMet, resource, Step::Validate, message)
}

/// VMs in backend pool order (pools, then members), without duplicates.
fn discover_vms(
    provider: &dyn CloudProvider,
    lb_ref: &ResourceRef,
    lb: &LoadBalancer,
) -> Result<Vec<ResourceId>, MigrationError> {
    let mut vms = Vec::new();
    for ipconfig in lb.backend_ip_configurations().into_iter().unique() {
        if !ipconfig.is_kind(ResourceKind::NetworkInterface) {
            return Err(MigrationError::new(
                ErrorKind::UnsupportedConfiguration,
                lb_ref,
                Step::Validate,
                format!("backend member {ipconfig} is not a NIC IP configuration"),
            ));
        }
        let nic_doc = provider
            .get_resource_by_id(ipconfig)
            .migration_err(ErrorKind::ProviderFailure, lb_ref, Step::Validate)?
            .ok_or_else(|| precondition(lb_ref, format!("NIC {} not found", ipconfig.name)))?;
        let nic = NetworkInterface::from_document(&nic_doc).map_err(|e| precondition(lb_ref, e))?;
        match &nic.properties.virtual_machine {
            Some(vm) => vms.push(vm.id.clone()),
            None => {
                log::warn!("NIC {} in a backend pool is not attached to a VM, skipping", nic.name)
            }
        }
    }
    Ok(vms.into_iter().unique().collect())
}

/// Size and region of a VM, refusing the whole batch if any NIC has a public IP.
fn describe_vm(
    provider: &dyn CloudProvider,
    lb_ref: &ResourceRef,
    vm_id: &ResourceId,
) -> Result<ResourceDescriptor, MigrationError> {
    let doc = provider
        .get_resource_by_id(vm_id)
        .migration_err(ErrorKind::ProviderFailure, lb_ref, Step::Validate)?
        .ok_or_else(|| precondition(vm_id, "virtual machine not found"))?;
    let vm = VirtualMachine::from_document(&doc).map_err(|e| precondition(vm_id, e))?;
    for nic_id in vm.nic_ids() {
        let nic_doc = provider
            .get_resource_by_id(nic_id)
            .migration_err(ErrorKind::ProviderFailure, lb_ref, Step::Validate)?
            .ok_or_else(|| precondition(vm_id, format!("NIC {} not found", nic_id.name)))?;
        let nic = NetworkInterface::from_document(&nic_doc).map_err(|e| precondition(vm_id, e))?;
        if nic.has_public_ip() {
            return Err(MigrationError::new(
                ErrorKind::UnsupportedConfiguration,
                lb_ref,
                Step::Validate,
                format!("VM {} has a public IP on NIC {}, batch refused", vm.name, nic.name),
            ));
        }
    }
    Ok(ResourceDescriptor {
        id: vm.id.clone(),
        size: vm.size().to_string(),
        location: vm.location.clone(),
    })
}

/// Migrate every VM behind a Standard load balancer into zones round-robin, then
/// restore their pool and NAT rule memberships.
///
/// Returns `Err` only when the batch is refused before anything is touched. Once
/// migrations start, per-VM failures are reported in the [`BatchReport`].
pub fn migrate_load_balancer_vms(
    provider: &dyn CloudProvider,
    backups: BackupStore,
    lb_ref: &ResourceRef,
    options: &BatchOptions,
) -> Result<BatchReport, MigrationError> {
    log::info!("#Start batch migration of VMs behind {lb_ref}");
    let lb_doc = provider
        .get_resource(ResourceKind::LoadBalancer, lb_ref)
        .migration_err(ErrorKind::ProviderFailure, lb_ref, Step::Validate)?
        .ok_or_else(|| precondition(lb_ref, "load balancer not found"))?;
    let lb = LoadBalancer::from_document(&lb_doc).map_err(|e| precondition(lb_ref, e))?;
    if !lb.is_standard() {
        return Err(precondition(
            lb_ref,
            "load balancer is Basic SKU, upgrade it to Standard first",
        ));
    }

    let vm_ids = discover_vms(provider, lb_ref, &lb)?;
    log::info!("Found {} VMs behind {}", vm_ids.len(), lb.name);
    let descriptors = vm_ids
        .iter()
        .map(|id| describe_vm(provider, lb_ref, id))
        .collect::<Result<Vec<_>, _>>()?;

    let assignments = ZoneAssigner::new(provider).assign_zones(&descriptors)?;

    let migrator = ResourceMigrator::new(
        provider,
        backups,
        MigrationOptions {
            cleanup_snapshots: options.cleanup_snapshots,
        },
    );
    let mut results = Vec::new();
    let mut stopped_by = None;
    let mut remaining = assignments.iter();
    for assignment in remaining.by_ref() {
        let request = MigrationRequest::vm_to_zone(
            &assignment.resource.resource_group,
            &assignment.resource.name,
            assignment.zone,
        );
        let result = migrator.migrate(&request);
        let stop = match &result {
            Ok(_) => false,
            Err(e) if e.is_fatal() => true,
            Err(_) => !options.continue_on_error,
        };
        if stop {
            stopped_by = result.as_ref().err().cloned();
        }
        results.push(VmResult {
            vm: assignment.resource.clone(),
            zone: assignment.zone,
            result,
        });
        if stop {
            log::error!("Stopping batch after failure on {}", assignment.resource.name);
            break;
        }
    }
    let skipped: Vec<ResourceId> = remaining.map(|a| a.resource.clone()).collect();

    let attachments: Vec<DependentAttachment> = results
        .iter()
        .filter_map(|r| r.result.as_ref().ok())
        .flat_map(|o| o.attachments.iter().cloned())
        .collect();
    let rewire = match LoadBalancerRewirer::new(provider).rewire(&attachments) {
        Ok(summary) => {
            for r in results.iter_mut() {
                if let Ok(outcome) = r.result.as_mut() {
                    outcome.rewired = true;
                }
            }
            Some(summary)
        }
        Err(e) => {
            log::error!("{e}");
            if stopped_by.as_ref().map(|s| !s.is_fatal()).unwrap_or(true) {
                stopped_by = Some(e);
            }
            None
        }
    };

    Ok(BatchReport {
        load_balancer: lb.id,
        assignments,
        results,
        skipped,
        rewire,
        stopped_by,
    })
}

/// Single VM mode: migrate, then restore the memberships of its rebuilt NICs.
pub fn migrate_vm_and_rewire(
    provider: &dyn CloudProvider,
    backups: BackupStore,
    request: &MigrationRequest,
    options: MigrationOptions,
) -> Result<MigrationOutcome, MigrationError> {
    let migrator = ResourceMigrator::new(provider, backups, options);
    let mut outcome = migrator.migrate(request)?;
    if !outcome.rewired {
        let summary = LoadBalancerRewirer::new(provider)
            .rewire(&outcome.attachments)
            .map_err(|e| e.with_backup(Some(outcome.backup_path.clone())))?;
        log::debug!("rewire summary {summary:?}");
        outcome.rewired = true;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::{InMemoryProvider, ProviderCall};

    fn provider() -> InMemoryProvider {
        InMemoryProvider::from_fixture_file("src/tests/test_data/fixture_lb_standard_01.json")
            .expect("Error loading fixture")
    }

    #[test]
    fn test_basic_load_balancer_refused() {
        let provider =
            InMemoryProvider::from_fixture_file("src/tests/test_data/fixture_lb_basic_01.json")
                .expect("Error loading fixture");
        let dir = tempfile::tempdir().unwrap();
        let err = migrate_load_balancer_vms(
            &provider,
            BackupStore::new(dir.path()),
            &ResourceRef::new("rg-app", "app-lb"),
            &BatchOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PreconditionNotMet);
        assert!(provider.mutating_calls().is_empty());
    }

    #[test]
    fn test_pre_deletion_failure_stops_batch() {
        let provider = provider();
        provider.fail_when(|c| matches!(c, ProviderCall::Stop(id) if id.name == "web-vm-2"));
        let dir = tempfile::tempdir().unwrap();
        let report = migrate_load_balancer_vms(
            &provider,
            BackupStore::new(dir.path()),
            &ResourceRef::new("rg-web", "web-lb"),
            &BatchOptions::default(),
        )
        .unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.succeeded().count(), 1);
        assert_eq!(report.stopped_by.as_ref().unwrap().kind, ErrorKind::ProviderFailure);
        assert!(!report.is_fatal());
        // The VM that did migrate is back in its pool.
        assert_eq!(report.rewire.as_ref().unwrap().interfaces, 1);
    }

    #[test]
    fn test_continue_on_error() {
        let provider = provider();
        provider.fail_when(|c| matches!(c, ProviderCall::Stop(id) if id.name == "web-vm-2"));
        let dir = tempfile::tempdir().unwrap();
        let report = migrate_load_balancer_vms(
            &provider,
            BackupStore::new(dir.path()),
            &ResourceRef::new("rg-web", "web-lb"),
            &BatchOptions {
                continue_on_error: true,
                cleanup_snapshots: false,
            },
        )
        .unwrap();
        assert_eq!(report.results.len(), 4);
        assert!(report.skipped.is_empty());
        assert_eq!(report.succeeded().count(), 3);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_post_deletion_failure_always_stops() {
        let provider = provider();
        provider
            .fail_when(|c| matches!(c, ProviderCall::CreateNic(id) if id.name == "web-vm-1-nic"));
        let dir = tempfile::tempdir().unwrap();
        let report = migrate_load_balancer_vms(
            &provider,
            BackupStore::new(dir.path()),
            &ResourceRef::new("rg-web", "web-lb"),
            &BatchOptions {
                continue_on_error: true,
                cleanup_snapshots: false,
            },
        )
        .unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.skipped.len(), 3);
        assert!(report.is_fatal());
        let err = report.stopped_by.as_ref().unwrap();
        assert_eq!(err.step, Step::RebuildNetwork);
        assert!(err.backup.is_some());
    }
}
