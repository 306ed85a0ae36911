//! Moving a regional virtual machine into an availability zone.

use super::error::{ErrorKind, MigrationContext, MigrationError, Step};
use super::migrator::{MigrationOutcome, ResourceMigrator};
use crate::azure::CloudProvider;
use crate::config;
use crate::models::spec::{
    AttachedDataDisk, AttachedOsDisk, DiskSpec, NicSpec, PublicIpSpec, ResourceSpec, SnapshotSpec,
    VmSpec,
};
use crate::models::{
    AllocationMethod, DependentAttachment, LoadBalancer, MigrationTarget, NetworkInterface,
    PublicIpAddress, ResourceId, ResourceKind, ResourceRef, ResourceSnapshot, RunState,
    VirtualMachine,
};
use itertools::Itertools;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Everything read during validation, captured before anything is touched.
struct VmPlan {
    vm: VirtualMachine,
    document: Value,
    /// Native NIC and public IP documents, for the backup.
    dependents: Vec<Value>,
    attachments: Vec<DependentAttachment>,
    /// Storage SKU per disk id, OS disk first.
    disk_skus: Vec<(ResourceId, String)>,
}

pub(super) fn migrate_vm(
    migrator: &ResourceMigrator,
    resource: &ResourceRef,
    zone: u8,
) -> Result<MigrationOutcome, MigrationError> {
    let plan = validate(migrator.provider, resource, zone)?;

    let snapshot = ResourceSnapshot::capture(
        &plan.vm.id,
        ResourceKind::VirtualMachine,
        &plan.document,
        plan.dependents.clone(),
    );
    let backup = migrator.backup(&snapshot, resource)?;

    execute(migrator, resource, plan, zone, backup)
}

fn precondition(resource: &ResourceRef, message: impl std::fmt::Display) -> MigrationError {
    MigrationError::new(ErrorKind::PreconditionNotMet, resource, Step::Validate, message)
}

fn unsupported(resource: &ResourceRef, message: impl std::fmt::Display) -> MigrationError {
    MigrationError::new(ErrorKind::UnsupportedConfiguration, resource, Step::Validate, message)
}

fn read(
    provider: &dyn CloudProvider,
    resource: &ResourceRef,
    id: &ResourceId,
) -> Result<Option<Value>, MigrationError> {
    provider
        .get_resource_by_id(id)
        .migration_err(ErrorKind::ProviderFailure, resource, Step::Validate)
}

fn validate(
    provider: &dyn CloudProvider,
    resource: &ResourceRef,
    zone: u8,
) -> Result<VmPlan, MigrationError> {
    // 1. Existence and state.
    let document = provider
        .get_resource(ResourceKind::VirtualMachine, resource)
        .migration_err(ErrorKind::ProviderFailure, resource, Step::Validate)?
        .ok_or_else(|| precondition(resource, "virtual machine not found"))?;
    let vm = VirtualMachine::from_document(&document).map_err(|e| precondition(resource, e))?;

    let state = provider
        .get_resource_status(ResourceKind::VirtualMachine, resource)
        .migration_err(ErrorKind::ProviderFailure, resource, Step::Validate)?;
    if state != RunState::Running {
        return Err(precondition(
            resource,
            format!("virtual machine is {state}, it must be running"),
        ));
    }
    let current_zones = vm.zones().map_err(|e| precondition(resource, e))?;
    if current_zones.contains(&zone) {
        return Err(precondition(resource, format!("already in zone {zone}")));
    }

    // 2. Configurations the rebuild cannot reproduce.
    let encrypted = vm.encrypted_disks();
    if !encrypted.is_empty() {
        return Err(unsupported(
            resource,
            format!("encrypted disks: {}", encrypted.join(", ")),
        ));
    }
    let unmanaged = vm.unmanaged_disks();
    if !unmanaged.is_empty() {
        return Err(unsupported(
            resource,
            format!("unmanaged disks: {}", unmanaged.join(", ")),
        ));
    }
    // The originals are the way back if the rebuild fails, so they must outlive the VM.
    let cascading = vm.disks_deleted_with_vm();
    if !cascading.is_empty() {
        return Err(unsupported(
            resource,
            format!(
                "disks {} are deleted with the VM, set their deleteOption to Detach first",
                cascading.join(", ")
            ),
        ));
    }
    for nic_id in vm.nics_deleted_with_vm() {
        log::warn!(
            "{resource}: NIC {} is deleted with the VM and will be recreated from the backup",
            nic_id.name
        );
    }

    let mut dependents = Vec::new();
    let mut attachments = Vec::new();
    for nic_id in vm.nic_ids() {
        let nic_doc = read(provider, resource, nic_id)?
            .ok_or_else(|| precondition(resource, format!("NIC {nic_id} not found")))?;
        let nic = NetworkInterface::from_document(&nic_doc).map_err(|e| precondition(resource, e))?;
        let ipconfig = nic.single_ip_configuration().map_err(|e| unsupported(resource, e))?;
        let props = &ipconfig.properties;
        if nic.has_public_ip() && nic.is_pooled() {
            return Err(unsupported(
                resource,
                format!("NIC {} has a public IP and sits in a backend pool", nic.name),
            ));
        }
        check_load_balancers_standard(provider, resource, &nic)?;

        let pip_doc = match &props.public_ip_address {
            Some(reference) => Some(read(provider, resource, &reference.id)?.ok_or_else(|| {
                precondition(resource, format!("public IP {} not found", reference.id))
            })?),
            None => None,
        };
        let pip = pip_doc
            .as_ref()
            .map(PublicIpAddress::from_document)
            .transpose()
            .map_err(|e| precondition(resource, e))?;
        let attachment = DependentAttachment::capture(&nic, pip.as_ref())
            .map_err(|e| precondition(resource, e))?;
        dependents.push(nic_doc);
        dependents.extend(pip_doc);
        attachments.push(attachment);
    }

    let mut disk_skus = Vec::new();
    let os = vm.os_disk();
    let os_params = os
        .managed_disk
        .as_ref()
        .ok_or_else(|| unsupported(resource, format!("disk {} is not managed", os.name)))?;
    let os_id = os_params.disk_id().map_err(|e| precondition(resource, e))?;
    disk_skus.push(disk_sku(provider, resource, os_id, os_params.storage_account_type.as_deref())?);
    for data in vm.data_disks() {
        let params = data
            .managed_disk
            .as_ref()
            .ok_or_else(|| unsupported(resource, format!("disk {} is not managed", data.name)))?;
        let id = params.disk_id().map_err(|e| precondition(resource, e))?;
        disk_skus.push(disk_sku(provider, resource, id, params.storage_account_type.as_deref())?);
    }

    // 3. Zone support for the size in this region.
    let supported: BTreeSet<u8> = provider
        .list_supported_zones(vm.size(), &vm.location)
        .migration_err(ErrorKind::ProviderFailure, resource, Step::Validate)?;
    if !supported.contains(&zone) {
        return Err(MigrationError::new(
            ErrorKind::ZoneUnsupported,
            resource,
            Step::Validate,
            format!(
                "{} does not offer zone {zone} in {} (supported: {:?})",
                vm.size(),
                vm.location,
                supported
            ),
        ));
    }

    Ok(VmPlan {
        vm,
        document,
        dependents,
        attachments,
        disk_skus,
    })
}

/// A zonal VM cannot join a Basic load balancer, so pooled NICs need Standard ones.
fn check_load_balancers_standard(
    provider: &dyn CloudProvider,
    resource: &ResourceRef,
    nic: &NetworkInterface,
) -> Result<(), MigrationError> {
    let lb_ids: Vec<ResourceId> = nic
        .properties
        .ip_configurations
        .iter()
        .flat_map(|c| {
            c.properties
                .load_balancer_backend_address_pools
                .iter()
                .chain(c.properties.load_balancer_inbound_nat_rules.iter())
        })
        .map(|s| s.id.top_level())
        .unique()
        .collect();
    for lb_id in lb_ids {
        let Some(lb_doc) = read(provider, resource, &lb_id)? else {
            return Err(precondition(resource, format!("load balancer {lb_id} not found")));
        };
        let lb = LoadBalancer::from_document(&lb_doc).map_err(|e| precondition(resource, e))?;
        if !lb.is_standard() {
            return Err(unsupported(
                resource,
                format!(
                    "NIC {} is attached to Basic load balancer {}, upgrade it to Standard first",
                    nic.name, lb.name
                ),
            ));
        }
    }
    Ok(())
}

fn disk_sku(
    provider: &dyn CloudProvider,
    resource: &ResourceRef,
    disk: &ResourceId,
    from_vm: Option<&str>,
) -> Result<(ResourceId, String), MigrationError> {
    if let Some(sku) = from_vm {
        return Ok((disk.clone(), sku.to_string()));
    }
    let sku = read(provider, resource, disk)?
        .and_then(|doc| doc["sku"]["name"].as_str().map(str::to_string))
        .ok_or_else(|| {
            precondition(resource, format!("storage SKU of disk {} unknown", disk.name))
        })?;
    Ok((disk.clone(), sku))
}

fn execute(
    migrator: &ResourceMigrator,
    resource: &ResourceRef,
    plan: VmPlan,
    zone: u8,
    backup: PathBuf,
) -> Result<MigrationOutcome, MigrationError> {
    let provider = migrator.provider;
    let vm = &plan.vm;
    let before = |e: MigrationError| e.with_backup(Some(backup.clone()));
    let after = |step: Step| {
        let backup = backup.clone();
        move |e: Box<dyn std::error::Error>| {
            MigrationError::new(ErrorKind::PostDeletionFailure, resource, step, e)
                .with_backup(Some(backup))
        }
    };

    log::info!("Stopping {resource}");
    provider
        .stop_resource(ResourceKind::VirtualMachine, resource)
        .migration_err(ErrorKind::ProviderFailure, resource, Step::Stop)
        .map_err(&before)?;

    let mut snapshots = Vec::new();
    let mut zonal_disks = Vec::new();
    for (disk, sku) in &plan.disk_skus {
        let snapshot = provider
            .create_snapshot_from_disk(
                disk,
                &SnapshotSpec {
                    name: config::snapshot_name(&disk.name),
                    location: vm.location.clone(),
                },
            )
            .migration_err(ErrorKind::ProviderFailure, resource, Step::CopyDisks)
            .map_err(&before)?;
        let zonal = provider
            .create_zonal_disk_from_snapshot(
                &snapshot,
                &DiskSpec {
                    name: config::zonal_disk_name(&disk.name, zone),
                    location: vm.location.clone(),
                    sku: sku.clone(),
                    zone,
                    tags: vm.tags.clone(),
                },
            )
            .migration_err(ErrorKind::ProviderFailure, resource, Step::CopyDisks)
            .map_err(&before)?;
        log::info!("Copied {} -> {} in zone {zone}", disk.name, zonal.name);
        snapshots.push(snapshot);
        zonal_disks.push(zonal);
    }

    log::warn!("Deleting {resource}, config backup {}", backup.display());
    provider
        .delete_resource(ResourceKind::VirtualMachine, resource)
        .map_err(after(Step::Delete))?;

    let mut attachments = Vec::with_capacity(plan.attachments.len());
    for att in &plan.attachments {
        let nic_id = rebuild_nic(provider, att, zone).map_err(after(Step::RebuildNetwork))?;
        attachments.push(DependentAttachment {
            nic: nic_id,
            ..att.clone()
        });
    }

    if vm.properties.availability_set.is_some() {
        log::warn!("{resource}: availability set membership dropped, zonal VMs cannot join one");
    }
    if vm.properties.proximity_placement_group.is_some() {
        log::warn!("{resource}: proximity placement group dropped");
    }
    let spec = vm_spec(vm, zone, &zonal_disks, &attachments);
    let new_id = provider
        .create_resource(&ResourceSpec::VirtualMachine(spec))
        .map_err(after(Step::Recreate))?;
    log::info!("Recreated {} in zone {zone}", new_id);

    if migrator.options.cleanup_snapshots {
        for snapshot in &snapshots {
            if let Err(e) = provider.delete_resource(ResourceKind::Snapshot, &snapshot.to_ref()) {
                log::warn!("{resource}: could not delete snapshot {}: {e}", snapshot.name);
            }
        }
    }

    Ok(MigrationOutcome {
        kind: ResourceKind::VirtualMachine,
        resource_id: new_id,
        target: MigrationTarget::Zone(zone),
        attachments,
        backup_path: backup,
        rewired: false,
    })
}

/// Delete and recreate one NIC (and its public IP) with the same names.
fn rebuild_nic(
    provider: &dyn CloudProvider,
    att: &DependentAttachment,
    zone: u8,
) -> Result<ResourceId, Box<dyn std::error::Error>> {
    // A NIC or public IP with deleteOption Delete went with the VM.
    if provider.get_resource_by_id(&att.nic)?.is_some() {
        provider.delete_network_interface(&att.nic)?;
    } else {
        log::info!("NIC {} already removed with the VM", att.nic.name);
    }

    let public_ip = match &att.public_ip {
        Some(pip) => {
            if provider.get_resource_by_id(&pip.id)?.is_some() {
                provider.delete_public_address(&pip.id)?;
            } else {
                log::info!("Public IP {} already removed with its NIC", pip.name);
            }
            let new_pip = provider.create_public_address(&PublicIpSpec {
                resource_group: pip.id.resource_group.clone(),
                name: pip.name.clone(),
                location: pip.location.clone(),
                tags: pip.tags.clone(),
                sku: "Standard".to_string(),
                allocation: AllocationMethod::Static,
                zones: vec![zone],
                domain_name_label: pip.domain_name_label.clone(),
                idle_timeout_in_minutes: pip.idle_timeout_in_minutes,
            })?;
            log::info!("Recreated public IP {} as Standard in zone {zone}", new_pip.name);
            Some(new_pip)
        }
        None => None,
    };

    let nic = provider.create_network_interface(&NicSpec::from_attachment(att, public_ip))?;
    log::info!(
        "Recreated NIC {} ({})",
        nic.name,
        att.pinned_private_ip().unwrap_or("dynamic")
    );
    Ok(nic)
}

fn vm_spec(
    vm: &VirtualMachine,
    zone: u8,
    zonal_disks: &[ResourceId],
    attachments: &[DependentAttachment],
) -> VmSpec {
    let os = vm.os_disk();
    let os_disk = AttachedOsDisk {
        disk: zonal_disks[0].clone(),
        name: zonal_disks[0].name.clone(),
        os_type: os.os_type.clone(),
        caching: os.caching.clone(),
        write_accelerator_enabled: os.write_accelerator_enabled,
    };
    let data_disks = vm
        .data_disks()
        .iter()
        .zip(zonal_disks.iter().skip(1))
        .map(|(d, disk)| AttachedDataDisk {
            lun: d.lun,
            disk: disk.clone(),
            name: disk.name.clone(),
            caching: d.caching.clone(),
            write_accelerator_enabled: d.write_accelerator_enabled,
        })
        .collect();

    VmSpec {
        resource_group: vm.id.resource_group.clone(),
        name: vm.name.clone(),
        location: vm.location.clone(),
        tags: vm.tags.clone(),
        size: vm.size().to_string(),
        zone,
        os_disk,
        data_disks,
        nics: attachments.iter().map(|a| a.nic.clone()).collect(),
        license_type: vm.properties.license_type.clone(),
        boot_diagnostics: vm
            .properties
            .diagnostics_profile
            .as_ref()
            .and_then(|d| d.boot_diagnostics.clone()),
    }
}
