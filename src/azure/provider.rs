//! The narrow capability surface the migrations need from the control plane.

use crate::models::spec::{
    DiskSpec, IpConfigUpdate, NicSpec, PublicIpSpec, ResourceSpec, SnapshotSpec,
};
use crate::models::{ResourceId, ResourceKind, ResourceRef, RunState};
use std::collections::BTreeSet;
use std::error::Error;

pub type ProviderResult<T> = Result<T, Box<dyn Error>>;

/// Read/create/delete operations over VMs, disks, snapshots, NICs, public IPs and
/// load balancers.
///
/// An implementation is constructed once with a resolved subscription and passed by
/// reference to every operation. Each call blocks until the provider reports the
/// operation complete.
pub trait CloudProvider {
    /// Subscription every identifier built by the migrations belongs to.
    fn subscription_id(&self) -> &str;

    /// Native document of a top level resource, `None` when it does not exist.
    fn get_resource(
        &self,
        kind: ResourceKind,
        resource: &ResourceRef,
    ) -> ProviderResult<Option<serde_json::Value>>;

    fn get_resource_status(
        &self,
        kind: ResourceKind,
        resource: &ResourceRef,
    ) -> ProviderResult<RunState>;

    /// Zones offered for a VM size in a region, after subscription restrictions.
    fn list_supported_zones(&self, size: &str, location: &str) -> ProviderResult<BTreeSet<u8>>;

    fn create_snapshot_from_disk(
        &self,
        disk: &ResourceId,
        spec: &SnapshotSpec,
    ) -> ProviderResult<ResourceId>;

    fn create_zonal_disk_from_snapshot(
        &self,
        snapshot: &ResourceId,
        spec: &DiskSpec,
    ) -> ProviderResult<ResourceId>;

    /// Stop and deallocate.
    fn stop_resource(&self, kind: ResourceKind, resource: &ResourceRef) -> ProviderResult<()>;

    fn delete_resource(&self, kind: ResourceKind, resource: &ResourceRef) -> ProviderResult<()>;

    fn create_network_interface(&self, spec: &NicSpec) -> ProviderResult<ResourceId>;

    fn delete_network_interface(&self, nic: &ResourceId) -> ProviderResult<()>;

    fn create_public_address(&self, spec: &PublicIpSpec) -> ProviderResult<ResourceId>;

    fn delete_public_address(&self, public_ip: &ResourceId) -> ProviderResult<()>;

    fn create_resource(&self, spec: &ResourceSpec) -> ProviderResult<ResourceId>;

    fn update_network_interface_ip_config(
        &self,
        nic: &ResourceId,
        update: &IpConfigUpdate,
    ) -> ProviderResult<()>;

    /// Native document behind an identifier. Only top level identifiers are valid.
    fn get_resource_by_id(&self, id: &ResourceId) -> ProviderResult<Option<serde_json::Value>> {
        let kind = id
            .kind()
            .ok_or_else(|| format!("Unsupported resource type in id {id}"))?;
        self.get_resource(kind, &id.top_level().to_ref())
    }
}
