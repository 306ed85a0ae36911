//! [`CloudProvider`] backed by the `az` CLI.
//!
//! Reads go through `az resource show` so documents come back in ARM shape; creates
//! are `az rest` PUTs of the bodies from [`super::arm`], followed by polling the
//! `provisioningState` until the control plane reports the resource ready.

use super::arm;
use super::cli::{self, is_not_found};
use super::provider::{CloudProvider, ProviderResult};
use crate::config;
use crate::models::spec::{
    DiskSpec, IpConfigUpdate, NicSpec, PublicIpSpec, ResourceSpec, SnapshotSpec,
};
use crate::models::{ResourceId, ResourceKind, ResourceRef, RunState};
use itertools::Itertools;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::io::Write;

const ARM_ENDPOINT: &str = "https://management.azure.com";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Account {
    id: String,
    name: String,
}

#[derive(Deserialize, Debug)]
struct CreatedResource {
    id: ResourceId,
}

/// Entry of `az vm list-skus` output.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SkuCapability {
    pub name: String,
    #[serde(default)]
    pub location_info: Vec<SkuLocationInfo>,
    #[serde(default)]
    pub restrictions: Vec<SkuRestriction>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SkuLocationInfo {
    pub location: String,
    #[serde(default)]
    pub zones: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SkuRestriction {
    #[serde(rename = "type")]
    pub restriction_type: String,
    #[serde(default)]
    pub reason_code: Option<String>,
    #[serde(default)]
    pub restriction_info: Option<SkuRestrictionInfo>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SkuRestrictionInfo {
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub zones: Vec<String>,
}

/// Zones offered for `size` in `location`, minus any the subscription is restricted from.
pub fn supported_zones_from_skus(
    skus: &[SkuCapability],
    size: &str,
    location: &str,
) -> BTreeSet<u8> {
    let mut zones = BTreeSet::new();
    for sku in skus.iter().filter(|s| s.name.eq_ignore_ascii_case(size)) {
        let restricted_everywhere = sku.restrictions.iter().any(|r| {
            r.restriction_type.eq_ignore_ascii_case("Location")
                && r.restriction_info
                    .as_ref()
                    .map(|i| i.locations.iter().any(|l| l.eq_ignore_ascii_case(location)))
                    .unwrap_or(false)
        });
        if restricted_everywhere {
            log::warn!("SKU {size} is restricted in {location} for this subscription");
            continue;
        }
        let restricted_zones: BTreeSet<&str> = sku
            .restrictions
            .iter()
            .filter(|r| r.restriction_type.eq_ignore_ascii_case("Zone"))
            .filter_map(|r| r.restriction_info.as_ref())
            .flat_map(|i| i.zones.iter().map(String::as_str))
            .collect();

        for info in sku
            .location_info
            .iter()
            .filter(|i| i.location.eq_ignore_ascii_case(location))
        {
            for zone in &info.zones {
                if restricted_zones.contains(zone.as_str()) {
                    log::debug!("Zone {zone} restricted for {size} in {location}");
                    continue;
                }
                match zone.parse::<u8>() {
                    Ok(z) => {
                        zones.insert(z);
                    }
                    Err(_) => log::warn!("Ignoring unparsable zone '{zone}' for {size}"),
                }
            }
        }
    }
    zones
}

/// Talks to Azure through the `az` CLI, pinned to one subscription.
#[derive(Debug)]
pub struct AzCliProvider {
    subscription_id: String,
}

impl AzCliProvider {
    /// Resolve the subscription once (the CLI's default when `None`) and pin every
    /// later call to it with `--subscription`.
    pub fn new(subscription: Option<&str>) -> Result<AzCliProvider, Box<dyn Error>> {
        let cmd = match subscription {
            Some(s) => format!("az account show --subscription {s} --output json"),
            None => "az account show --output json".to_string(),
        };
        let account: Account = cli::run_json(&cmd)?;
        log::info!(
            "Using subscription '{}' ({})",
            account.name,
            account.id
        );
        Ok(AzCliProvider {
            subscription_id: account.id,
        })
    }

    fn id_for(&self, kind: ResourceKind, resource: &ResourceRef) -> ResourceId {
        ResourceId::new(&self.subscription_id, &resource.resource_group, kind, &resource.name)
    }

    fn delete_by_id(&self, id: &ResourceId) -> ProviderResult<()> {
        let api_version = id.kind().map(|k| k.api_version()).unwrap_or(config::NETWORK_API_VERSION);
        cli::run(&format!(
            "az resource delete --ids {id} --api-version {api_version} --output none"
        ))?;
        log::info!("Deleted {id}");
        Ok(())
    }

    /// PUT an ARM body and wait for the resource to finish provisioning.
    fn put(
        &self,
        id: &ResourceId,
        kind: ResourceKind,
        body: &serde_json::Value,
    ) -> ProviderResult<ResourceId> {
        let mut file = tempfile::Builder::new()
            .prefix("azure-zone-migrate-")
            .suffix(".json")
            .tempfile()?;
        file.write_all(serde_json::to_string_pretty(body)?.as_bytes())?;
        file.flush()?;
        log::trace!("PUT {id} body={body:#}");

        let created: CreatedResource = cli::run_json(&format!(
            "az rest --method put --url {ARM_ENDPOINT}{id}?api-version={api_version} --body @{path} --output json",
            api_version = kind.api_version(),
            path = file.path().display(),
        ))?;
        self.wait_provisioned(&created.id, kind)?;
        Ok(created.id)
    }

    fn wait_provisioned(&self, id: &ResourceId, kind: ResourceKind) -> ProviderResult<()> {
        for attempt in 0..config::PROVISIONING_POLL_ATTEMPTS {
            let state = cli::run(&format!(
                "az resource show --ids {id} --api-version {api_version} --query properties.provisioningState --output tsv",
                api_version = kind.api_version()
            ))?;
            match state.trim() {
                "Succeeded" => {
                    log::debug!("{id} provisioned after {attempt} polls");
                    return Ok(());
                }
                "Failed" | "Canceled" => {
                    let state = state.trim();
                    return Err(format!("Provisioning of {id} ended in state {state}").into());
                }
                other => log::debug!("{id} provisioningState={other}, waiting ..."),
            }
            std::thread::sleep(std::time::Duration::from_millis(config::SLEEP_MSEC * 5));
        }
        Err(format!("Timed out waiting for {id} to provision").into())
    }
}

impl CloudProvider for AzCliProvider {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn get_resource(
        &self,
        kind: ResourceKind,
        resource: &ResourceRef,
    ) -> ProviderResult<Option<serde_json::Value>> {
        let id = self.id_for(kind, resource);
        let cmd = format!(
            "az resource show --ids {id} --api-version {api_version} --output json",
            api_version = kind.api_version()
        );
        match cli::run_json::<serde_json::Value>(&cmd) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if is_not_found(e.as_ref()) => {
                log::info!("{kind} {resource} not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn get_resource_status(
        &self,
        kind: ResourceKind,
        resource: &ResourceRef,
    ) -> ProviderResult<RunState> {
        if kind != ResourceKind::VirtualMachine {
            return match self.get_resource(kind, resource)? {
                Some(_) => Ok(RunState::Available),
                None => Err(format!("{kind} {resource} not found").into()),
            };
        }
        let codes: Vec<String> = cli::run_json(&format!(
            "az vm get-instance-view -g {rg} -n {name} --subscription {sub} --query 'instanceView.statuses[].code' --output json",
            rg = resource.resource_group,
            name = resource.name,
            sub = self.subscription_id,
        ))?;
        let state = codes
            .iter()
            .find(|c| c.starts_with("PowerState/"))
            .map(|c| RunState::from_power_state(c))
            .unwrap_or_else(|| RunState::Unknown(codes.join(",")));
        log::debug!("{resource} power state {state}");
        Ok(state)
    }

    fn list_supported_zones(&self, size: &str, location: &str) -> ProviderResult<BTreeSet<u8>> {
        let skus: Vec<SkuCapability> = cli::run_json(&format!(
            "az vm list-skus --location {location} --size {size} --resource-type virtualMachines --zone --all --subscription {sub} --output json",
            sub = self.subscription_id,
        ))?;
        let zones = supported_zones_from_skus(&skus, size, location);
        log::info!(
            "{size} in {location} supports zones [{}]",
            zones.iter().join(",")
        );
        Ok(zones)
    }

    fn create_snapshot_from_disk(
        &self,
        disk: &ResourceId,
        spec: &SnapshotSpec,
    ) -> ProviderResult<ResourceId> {
        let created: CreatedResource = cli::run_json(&format!(
            "az snapshot create -g {rg} -n {name} --source {disk} -l {location} --subscription {sub} --output json",
            rg = disk.resource_group,
            name = spec.name,
            location = spec.location,
            sub = self.subscription_id,
        ))?;
        log::info!("Created snapshot {}", created.id);
        Ok(created.id)
    }

    fn create_zonal_disk_from_snapshot(
        &self,
        snapshot: &ResourceId,
        spec: &DiskSpec,
    ) -> ProviderResult<ResourceId> {
        // Tags travel in the request body, so no shell quoting applies to them.
        let id = ResourceId::new(
            &self.subscription_id,
            &snapshot.resource_group,
            ResourceKind::Disk,
            &spec.name,
        );
        let created = self.put(&id, ResourceKind::Disk, &arm::disk_body(spec, snapshot))?;
        log::info!("Created zonal disk {created} in zone {}", spec.zone);
        Ok(created)
    }

    fn stop_resource(&self, kind: ResourceKind, resource: &ResourceRef) -> ProviderResult<()> {
        if kind != ResourceKind::VirtualMachine {
            return Err(format!("Cannot stop a {kind}").into());
        }
        cli::run(&format!(
            "az vm deallocate -g {rg} -n {name} --subscription {sub} --output none",
            rg = resource.resource_group,
            name = resource.name,
            sub = self.subscription_id,
        ))?;
        log::info!("Deallocated {resource}");
        Ok(())
    }

    fn delete_resource(&self, kind: ResourceKind, resource: &ResourceRef) -> ProviderResult<()> {
        self.delete_by_id(&self.id_for(kind, resource))
    }

    fn create_network_interface(&self, spec: &NicSpec) -> ProviderResult<ResourceId> {
        let id = ResourceId::new(
            &self.subscription_id,
            &spec.resource_group,
            ResourceKind::NetworkInterface,
            &spec.name,
        );
        self.put(&id, ResourceKind::NetworkInterface, &arm::nic_body(spec))
    }

    fn delete_network_interface(&self, nic: &ResourceId) -> ProviderResult<()> {
        self.delete_by_id(nic)
    }

    fn create_public_address(&self, spec: &PublicIpSpec) -> ProviderResult<ResourceId> {
        let id = ResourceId::new(
            &self.subscription_id,
            &spec.resource_group,
            ResourceKind::PublicIpAddress,
            &spec.name,
        );
        self.put(&id, ResourceKind::PublicIpAddress, &arm::public_ip_body(spec))
    }

    fn delete_public_address(&self, public_ip: &ResourceId) -> ProviderResult<()> {
        self.delete_by_id(public_ip)
    }

    fn create_resource(&self, spec: &ResourceSpec) -> ProviderResult<ResourceId> {
        let id = ResourceId::new(
            &self.subscription_id,
            spec.resource_group(),
            spec.kind(),
            spec.name(),
        );
        let body = match spec {
            ResourceSpec::VirtualMachine(vm) => arm::vm_body(vm),
            ResourceSpec::LoadBalancer(lb) => arm::load_balancer_body(lb, &id),
        };
        self.put(&id, spec.kind(), &body)
    }

    fn update_network_interface_ip_config(
        &self,
        nic: &ResourceId,
        update: &IpConfigUpdate,
    ) -> ProviderResult<()> {
        for pool in &update.add_backend_pools {
            cli::run(&format!(
                "az network nic ip-config address-pool add --address-pool {pool} --ip-config-name {ipconfig} --nic-name {nic_name} -g {rg} --subscription {sub} --output none",
                ipconfig = update.ip_config_name,
                nic_name = nic.name,
                rg = nic.resource_group,
                sub = self.subscription_id,
            ))?;
            log::info!(
                "Added {}/{} to backend pool {}",
                nic.name,
                update.ip_config_name,
                pool.leaf_name()
            );
        }
        for rule in &update.add_nat_rules {
            cli::run(&format!(
                "az network nic ip-config inbound-nat-rule add --inbound-nat-rule {rule} --ip-config-name {ipconfig} --nic-name {nic_name} -g {rg} --subscription {sub} --output none",
                ipconfig = update.ip_config_name,
                nic_name = nic.name,
                rg = nic.resource_group,
                sub = self.subscription_id,
            ))?;
            log::info!(
                "Bound NAT rule {} to {}/{}",
                rule.leaf_name(),
                nic.name,
                update.ip_config_name
            );
        }
        Ok(())
    }
}
