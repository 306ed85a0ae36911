//! [`CloudProvider`] over an in-memory resource map.
//!
//! Loaded from a JSON fixture it lets an operator rehearse a migration offline; the
//! test-suite drives it directly. Every call is recorded in order, and a failure can
//! be injected on any call to exercise the abort paths.

use super::arm;
use super::provider::{CloudProvider, ProviderResult};
use crate::models::spec::{
    DiskSpec, IpConfigUpdate, NicSpec, PublicIpSpec, ResourceSpec, SnapshotSpec,
};
use crate::models::{AllocationMethod, ResourceId, ResourceKind, ResourceRef, RunState};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;

/// One entry of the zone catalog.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ZoneCatalogEntry {
    pub size: String,
    pub location: String,
    pub zones: Vec<u8>,
}

/// On-disk description of a control plane.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Fixture {
    pub subscription_id: String,
    /// ARM documents; each must carry `id` and `name`.
    #[serde(default)]
    pub resources: Vec<Value>,
    /// VM id -> power state code (`PowerState/running`). VMs default to running.
    #[serde(default)]
    pub power_states: BTreeMap<String, String>,
    #[serde(default)]
    pub zones: Vec<ZoneCatalogEntry>,
}

/// A recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    GetResource(ResourceId),
    GetStatus(ResourceId),
    ListZones { size: String, location: String },
    CreateSnapshot { disk: ResourceId, snapshot: ResourceId },
    CreateDisk { snapshot: ResourceId, disk: ResourceId, zone: u8 },
    Stop(ResourceId),
    Delete(ResourceId),
    CreateNic(ResourceId),
    DeleteNic(ResourceId),
    CreatePublicIp(ResourceId),
    DeletePublicIp(ResourceId),
    CreateResource(ResourceId),
    UpdateIpConfig { nic: ResourceId, ip_config: String },
}

impl ProviderCall {
    /// True for calls that change provider state.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            ProviderCall::GetResource(_)
                | ProviderCall::GetStatus(_)
                | ProviderCall::ListZones { .. }
        )
    }

    /// True for calls that destroy a resource.
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            ProviderCall::Delete(_) | ProviderCall::DeleteNic(_) | ProviderCall::DeletePublicIp(_)
        )
    }
}

impl fmt::Display for ProviderCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

type FailurePredicate = Box<dyn Fn(&ProviderCall) -> bool>;

#[derive(Default)]
struct State {
    resources: BTreeMap<String, Value>,
    power: BTreeMap<String, RunState>,
    zones: BTreeMap<(String, String), BTreeSet<u8>>,
    calls: Vec<ProviderCall>,
}

/// In-memory control plane.
pub struct InMemoryProvider {
    subscription_id: String,
    state: RefCell<State>,
    fail_when: RefCell<Option<FailurePredicate>>,
    next_address: Cell<u8>,
}

/// True when `value` is an id string strictly below `prefix` (lowercased, ending in `/`).
fn id_under(value: &Value, prefix: &str) -> bool {
    value
        .as_str()
        .map(|s| s.to_ascii_lowercase().starts_with(prefix))
        .unwrap_or(false)
}

/// True when an IP configuration or frontend points at `public_ip`.
fn references_public_ip(config: &Value, public_ip: &ResourceId) -> bool {
    same_id(&config["properties"]["publicIPAddress"]["id"], public_ip)
}

fn key(id: &ResourceId) -> String {
    id.to_string().to_ascii_lowercase()
}

fn same_id(value: &Value, id: &ResourceId) -> bool {
    value
        .as_str()
        .map(|s| s.eq_ignore_ascii_case(&id.to_string()))
        .unwrap_or(false)
}

impl InMemoryProvider {
    pub fn new(subscription_id: &str) -> InMemoryProvider {
        InMemoryProvider {
            subscription_id: subscription_id.to_string(),
            state: RefCell::new(State::default()),
            fail_when: RefCell::new(None),
            next_address: Cell::new(10),
        }
    }

    pub fn from_fixture(fixture: Fixture) -> Result<InMemoryProvider, Box<dyn Error>> {
        let provider = InMemoryProvider::new(&fixture.subscription_id);
        for doc in fixture.resources {
            provider.insert_document(doc)?;
        }
        for (id, code) in &fixture.power_states {
            let id = ResourceId::parse(id)?;
            provider.set_power_state(&id, RunState::from_power_state(code));
        }
        for entry in &fixture.zones {
            provider.set_supported_zones(&entry.size, &entry.location, entry.zones.iter().copied());
        }
        Ok(provider)
    }

    pub fn from_fixture_file(path: &str) -> Result<InMemoryProvider, Box<dyn Error>> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading fixture file {path}: {e}"))?;
        let mut deserializer = serde_json::Deserializer::from_str(&json);
        let fixture: Fixture = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|e| format!("Error parsing fixture {path}: path={} error={}", e.path(), e))?;
        log::info!(
            "Loaded fixture {path} with {} resources",
            fixture.resources.len()
        );
        InMemoryProvider::from_fixture(fixture)
    }

    /// Add or replace a document; it must carry a parsable `id`.
    pub fn insert_document(&self, doc: Value) -> Result<ResourceId, Box<dyn Error>> {
        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .ok_or("Document without id")?;
        let id = ResourceId::parse(id)?;
        self.state.borrow_mut().resources.insert(key(&id), doc);
        Ok(id)
    }

    pub fn set_power_state(&self, vm: &ResourceId, state: RunState) {
        self.state.borrow_mut().power.insert(key(vm), state);
    }

    pub fn set_supported_zones(
        &self,
        size: &str,
        location: &str,
        zones: impl IntoIterator<Item = u8>,
    ) {
        self.state.borrow_mut().zones.insert(
            (size.to_ascii_lowercase(), location.to_ascii_lowercase()),
            zones.into_iter().collect(),
        );
    }

    /// Make every call matching `predicate` fail after being recorded.
    pub fn fail_when(&self, predicate: impl Fn(&ProviderCall) -> bool + 'static) {
        *self.fail_when.borrow_mut() = Some(Box::new(predicate));
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.borrow().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<ProviderCall> {
        self.calls().into_iter().filter(|c| c.is_mutating()).collect()
    }

    pub fn document(&self, id: &ResourceId) -> Option<Value> {
        self.state.borrow().resources.get(&key(id)).cloned()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.state.borrow().resources.contains_key(&key(id))
    }

    fn record(&self, call: ProviderCall) -> ProviderResult<()> {
        log::debug!("provider call {call}");
        let failing = self
            .fail_when
            .borrow()
            .as_ref()
            .map(|p| p(&call))
            .unwrap_or(false);
        self.state.borrow_mut().calls.push(call.clone());
        if failing {
            return Err(format!("injected failure on {call}").into());
        }
        Ok(())
    }

    fn id_for(&self, kind: ResourceKind, resource_group: &str, name: &str) -> ResourceId {
        ResourceId::new(&self.subscription_id, resource_group, kind, name)
    }

    fn require(&self, id: &ResourceId) -> ProviderResult<Value> {
        self.document(id)
            .ok_or_else(|| format!("(ResourceNotFound) {id} was not found").into())
    }

    fn store_new(&self, id: &ResourceId, mut doc: Value) -> ProviderResult<ResourceId> {
        if self.contains(id) {
            return Err(format!("(Conflict) {id} already exists").into());
        }
        doc["id"] = json!(id.to_string());
        doc["name"] = json!(id.name);
        doc["properties"]["provisioningState"] = json!("Succeeded");
        self.state.borrow_mut().resources.insert(key(id), doc);
        Ok(id.clone())
    }

    fn remove(&self, id: &ResourceId) -> ProviderResult<()> {
        self.require(id)?;
        self.state.borrow_mut().resources.remove(&key(id));
        self.state.borrow_mut().power.remove(&key(id));
        Ok(())
    }

    /// Apply `f` to every stored document.
    fn for_each_document(&self, mut f: impl FnMut(&mut Value)) {
        let mut state = self.state.borrow_mut();
        for doc in state.resources.values_mut() {
            f(doc);
        }
    }

    fn allocate_address(&self) -> String {
        let n = self.next_address.get();
        self.next_address.set(n.wrapping_add(1));
        format!("20.5.0.{n}")
    }

    /// Drop references to any child of `parent` from every NIC IP configuration.
    fn detach_nics_from(&self, parent: &ResourceId) {
        let prefix = format!("{}/", key(parent));
        let under_parent = |v: &Value| id_under(&v["id"], &prefix);
        self.for_each_document(|doc| {
            if let Some(ipconfigs) = doc
                .pointer_mut("/properties/ipConfigurations")
                .and_then(Value::as_array_mut)
            {
                for ipconfig in ipconfigs {
                    for list in ["loadBalancerBackendAddressPools", "loadBalancerInboundNatRules"] {
                        if let Some(items) = ipconfig
                            .pointer_mut(&format!("/properties/{list}"))
                            .and_then(Value::as_array_mut)
                        {
                            items.retain(|v| !under_parent(v));
                        }
                    }
                }
            }
        });
    }

    /// Drop references to the IP configurations of `nic` from every load balancer.
    /// What Azure removes together with a VM: disks and NICs marked
    /// `deleteOption: Delete`, and public IPs so marked on those NICs.
    fn deleted_with_vm(&self, vm: &Value) -> Vec<ResourceId> {
        let marked = |v: &Value| {
            v["deleteOption"]
                .as_str()
                .map(|o| o.eq_ignore_ascii_case("Delete"))
                .unwrap_or(false)
        };
        let parse = |v: &Value| v.as_str().and_then(|s| ResourceId::parse(s).ok());

        let mut ids = Vec::new();
        let storage = &vm["properties"]["storageProfile"];
        let data_disks = storage["dataDisks"].as_array().into_iter().flatten();
        let disks = std::iter::once(&storage["osDisk"]).chain(data_disks);
        ids.extend(disks.filter(|d| marked(d)).filter_map(|d| parse(&d["managedDisk"]["id"])));

        let nics = vm["properties"]["networkProfile"]["networkInterfaces"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|n| marked(&n["properties"]));
        for nic in nics {
            let Some(nic_id) = parse(&nic["id"]) else {
                continue;
            };
            if let Some(nic_doc) = self.document(&nic_id) {
                let ipconfigs = nic_doc["properties"]["ipConfigurations"].as_array();
                for ipconfig in ipconfigs.into_iter().flatten() {
                    let pip = &ipconfig["properties"]["publicIPAddress"];
                    if marked(&pip["properties"]) {
                        ids.extend(parse(&pip["id"]));
                    }
                }
            }
            ids.push(nic_id);
        }
        ids
    }

    fn detach_lbs_from(&self, nic: &ResourceId) {
        let prefix = format!("{}/", key(nic));
        let under_nic = |v: &Value| id_under(v, &prefix);
        self.for_each_document(|doc| {
            if let Some(pools) = doc
                .pointer_mut("/properties/backendAddressPools")
                .and_then(Value::as_array_mut)
            {
                for pool in pools {
                    if let Some(members) = pool
                        .pointer_mut("/properties/backendIPConfigurations")
                        .and_then(Value::as_array_mut)
                    {
                        members.retain(|m| !under_nic(&m["id"]));
                    }
                }
            }
            if let Some(rules) = doc
                .pointer_mut("/properties/inboundNatRules")
                .and_then(Value::as_array_mut)
            {
                for rule in rules {
                    if under_nic(&rule["properties"]["backendIPConfiguration"]["id"]) {
                        if let Some(props) = rule["properties"].as_object_mut() {
                            props.remove("backendIPConfiguration");
                        }
                    }
                }
            }
        });
    }

    fn set_child_ids(doc: &mut Value, lb_id: &ResourceId) {
        for (list, child_type) in [
            ("frontendIPConfigurations", "frontendIPConfigurations"),
            ("backendAddressPools", "backendAddressPools"),
            ("probes", "probes"),
            ("loadBalancingRules", "loadBalancingRules"),
            ("inboundNatRules", "inboundNatRules"),
        ] {
            if let Some(items) = doc
                .pointer_mut(&format!("/properties/{list}"))
                .and_then(Value::as_array_mut)
            {
                for item in items {
                    let name = item["name"].as_str().unwrap_or_default().to_string();
                    item["id"] = json!(lb_id.child(child_type, &name).to_string());
                }
            }
        }
    }

    /// Find the child of a load balancer document by id and hand it to `f`.
    fn with_lb_child(
        &self,
        child: &ResourceId,
        list: &str,
        f: impl FnOnce(&mut Value),
    ) -> ProviderResult<()> {
        let lb_key = key(&child.top_level());
        let mut state = self.state.borrow_mut();
        let lb = state
            .resources
            .get_mut(&lb_key)
            .ok_or_else(|| format!("(ResourceNotFound) {} was not found", child.top_level()))?;
        let item = lb
            .pointer_mut(&format!("/properties/{list}"))
            .and_then(Value::as_array_mut)
            .and_then(|items| {
                items
                    .iter_mut()
                    .find(|i| {
                        i["name"]
                            .as_str()
                            .map(|n| n.eq_ignore_ascii_case(child.leaf_name()))
                            .unwrap_or(false)
                    })
            })
            .ok_or_else(|| format!("(NotFound) {child} was not found"))?;
        f(item);
        Ok(())
    }
}

impl CloudProvider for InMemoryProvider {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn get_resource(
        &self,
        kind: ResourceKind,
        resource: &ResourceRef,
    ) -> ProviderResult<Option<Value>> {
        let id = self.id_for(kind, &resource.resource_group, &resource.name);
        self.record(ProviderCall::GetResource(id.clone()))?;
        Ok(self.document(&id))
    }

    fn get_resource_status(
        &self,
        kind: ResourceKind,
        resource: &ResourceRef,
    ) -> ProviderResult<RunState> {
        let id = self.id_for(kind, &resource.resource_group, &resource.name);
        self.record(ProviderCall::GetStatus(id.clone()))?;
        self.require(&id)?;
        if kind != ResourceKind::VirtualMachine {
            return Ok(RunState::Available);
        }
        Ok(self
            .state
            .borrow()
            .power
            .get(&key(&id))
            .cloned()
            .unwrap_or(RunState::Running))
    }

    fn list_supported_zones(&self, size: &str, location: &str) -> ProviderResult<BTreeSet<u8>> {
        self.record(ProviderCall::ListZones {
            size: size.to_string(),
            location: location.to_string(),
        })?;
        Ok(self
            .state
            .borrow()
            .zones
            .get(&(size.to_ascii_lowercase(), location.to_ascii_lowercase()))
            .cloned()
            .unwrap_or_default())
    }

    fn create_snapshot_from_disk(
        &self,
        disk: &ResourceId,
        spec: &SnapshotSpec,
    ) -> ProviderResult<ResourceId> {
        let id = self.id_for(ResourceKind::Snapshot, &disk.resource_group, &spec.name);
        self.record(ProviderCall::CreateSnapshot {
            disk: disk.clone(),
            snapshot: id.clone(),
        })?;
        let source = self.require(disk)?;
        self.store_new(
            &id,
            json!({
                "location": spec.location,
                "sku": source.get("sku").cloned().unwrap_or(Value::Null),
                "properties": {
                    "creationData": { "createOption": "Copy", "sourceResourceId": disk.to_string() }
                }
            }),
        )
    }

    fn create_zonal_disk_from_snapshot(
        &self,
        snapshot: &ResourceId,
        spec: &DiskSpec,
    ) -> ProviderResult<ResourceId> {
        let id = self.id_for(ResourceKind::Disk, &snapshot.resource_group, &spec.name);
        self.record(ProviderCall::CreateDisk {
            snapshot: snapshot.clone(),
            disk: id.clone(),
            zone: spec.zone,
        })?;
        self.require(snapshot)?;
        self.store_new(&id, arm::disk_body(spec, snapshot))
    }

    fn stop_resource(&self, kind: ResourceKind, resource: &ResourceRef) -> ProviderResult<()> {
        let id = self.id_for(kind, &resource.resource_group, &resource.name);
        self.record(ProviderCall::Stop(id.clone()))?;
        self.require(&id)?;
        if kind != ResourceKind::VirtualMachine {
            return Err(format!("Cannot stop a {kind}").into());
        }
        self.set_power_state(&id, RunState::Deallocated);
        Ok(())
    }

    fn delete_resource(&self, kind: ResourceKind, resource: &ResourceRef) -> ProviderResult<()> {
        let id = self.id_for(kind, &resource.resource_group, &resource.name);
        self.record(ProviderCall::Delete(id.clone()))?;
        let doc = self.require(&id)?;
        self.remove(&id)?;
        match kind {
            ResourceKind::VirtualMachine => {
                for dependent in self.deleted_with_vm(&doc) {
                    log::debug!("{dependent} deleted along with {id}");
                    self.state.borrow_mut().resources.remove(&key(&dependent));
                    self.detach_lbs_from(&dependent);
                }
                self.for_each_document(|doc| {
                    if same_id(&doc["properties"]["virtualMachine"]["id"], &id) {
                        if let Some(props) = doc["properties"].as_object_mut() {
                            props.remove("virtualMachine");
                        }
                    }
                })
            }
            ResourceKind::LoadBalancer => self.detach_nics_from(&id),
            _ => {}
        }
        Ok(())
    }

    fn create_network_interface(&self, spec: &NicSpec) -> ProviderResult<ResourceId> {
        let id = self.id_for(ResourceKind::NetworkInterface, &spec.resource_group, &spec.name);
        self.record(ProviderCall::CreateNic(id.clone()))?;
        if let Some(pip) = &spec.public_ip {
            self.require(pip)?;
        }
        let mut doc = arm::nic_body(spec);
        if let Some(ipconfigs) = doc["properties"]["ipConfigurations"].as_array_mut() {
            for ipconfig in ipconfigs {
                let name = ipconfig["name"].as_str().unwrap_or_default().to_string();
                ipconfig["id"] = json!(id.child("ipConfigurations", &name).to_string());
                if ipconfig["properties"]["privateIPAddress"].is_null() {
                    ipconfig["properties"]["privateIPAddress"] = json!("10.99.0.4");
                }
            }
        }
        self.store_new(&id, doc)
    }

    fn delete_network_interface(&self, nic: &ResourceId) -> ProviderResult<()> {
        self.record(ProviderCall::DeleteNic(nic.clone()))?;
        let doc = self.require(nic)?;
        if let Some(vm) = doc["properties"]["virtualMachine"]["id"].as_str() {
            return Err(format!("(NicInUse) {nic} is attached to {vm}").into());
        }
        self.remove(nic)?;
        self.detach_lbs_from(nic);
        Ok(())
    }

    fn create_public_address(&self, spec: &PublicIpSpec) -> ProviderResult<ResourceId> {
        let id = self.id_for(ResourceKind::PublicIpAddress, &spec.resource_group, &spec.name);
        self.record(ProviderCall::CreatePublicIp(id.clone()))?;
        let mut doc = arm::public_ip_body(spec);
        if spec.allocation == AllocationMethod::Static {
            doc["properties"]["ipAddress"] = json!(self.allocate_address());
        }
        self.store_new(&id, doc)
    }

    fn delete_public_address(&self, public_ip: &ResourceId) -> ProviderResult<()> {
        self.record(ProviderCall::DeletePublicIp(public_ip.clone()))?;
        let in_use = self.state.borrow().resources.values().any(|doc| {
            let nic_refs = doc["properties"]["ipConfigurations"]
                .as_array()
                .map(|c| c.iter().any(|i| references_public_ip(i, public_ip)))
                .unwrap_or(false);
            let lb_refs = doc["properties"]["frontendIPConfigurations"]
                .as_array()
                .map(|c| c.iter().any(|f| references_public_ip(f, public_ip)))
                .unwrap_or(false);
            nic_refs || lb_refs
        });
        if in_use {
            return Err(format!("(PublicIPAddressInUse) {public_ip} is in use").into());
        }
        self.remove(public_ip)
    }

    fn create_resource(&self, spec: &ResourceSpec) -> ProviderResult<ResourceId> {
        let id = self.id_for(spec.kind(), spec.resource_group(), spec.name());
        self.record(ProviderCall::CreateResource(id.clone()))?;
        match spec {
            ResourceSpec::VirtualMachine(vm) => {
                self.require(&vm.os_disk.disk)?;
                for d in &vm.data_disks {
                    self.require(&d.disk)?;
                }
                for nic in &vm.nics {
                    let doc = self.require(nic)?;
                    if let Some(other) = doc["properties"]["virtualMachine"]["id"].as_str() {
                        return Err(format!("(NicInUse) {nic} is attached to {other}").into());
                    }
                }
                self.store_new(&id, arm::vm_body(vm))?;
                let nic_keys: Vec<String> = vm.nics.iter().map(key).collect();
                let mut state = self.state.borrow_mut();
                for k in &nic_keys {
                    if let Some(nic) = state.resources.get_mut(k) {
                        nic["properties"]["virtualMachine"] = json!({ "id": id.to_string() });
                    }
                }
                state.power.insert(key(&id), RunState::Running);
            }
            ResourceSpec::LoadBalancer(lb) => {
                for f in &lb.frontends {
                    if let Some(pip) = &f.public_ip {
                        self.require(pip)?;
                    }
                }
                let mut doc = arm::load_balancer_body(lb, &id);
                Self::set_child_ids(&mut doc, &id);
                self.store_new(&id, doc)?;
            }
        }
        Ok(id)
    }

    fn update_network_interface_ip_config(
        &self,
        nic: &ResourceId,
        update: &IpConfigUpdate,
    ) -> ProviderResult<()> {
        self.record(ProviderCall::UpdateIpConfig {
            nic: nic.clone(),
            ip_config: update.ip_config_name.clone(),
        })?;
        let ipconfig_id = nic.child("ipConfigurations", &update.ip_config_name);

        for pool in &update.add_backend_pools {
            self.with_lb_child(pool, "backendAddressPools", |item| {
                let members = &mut item["properties"]["backendIPConfigurations"];
                if !members.is_array() {
                    *members = json!([]);
                }
                if let Some(list) = members.as_array_mut() {
                    if !list.iter().any(|m| same_id(&m["id"], &ipconfig_id)) {
                        list.push(json!({ "id": ipconfig_id.to_string() }));
                    }
                }
            })?;
        }
        for rule in &update.add_nat_rules {
            self.with_lb_child(rule, "inboundNatRules", |item| {
                item["properties"]["backendIPConfiguration"] =
                    json!({ "id": ipconfig_id.to_string() });
            })?;
        }

        let mut state = self.state.borrow_mut();
        let doc = state
            .resources
            .get_mut(&key(nic))
            .ok_or_else(|| format!("(ResourceNotFound) {nic} was not found"))?;
        let ipconfig = doc["properties"]["ipConfigurations"]
            .as_array_mut()
            .and_then(|c| {
                c.iter_mut().find(|i| {
                    i["name"]
                        .as_str()
                        .map(|n| n.eq_ignore_ascii_case(&update.ip_config_name))
                        .unwrap_or(false)
                })
            })
            .ok_or_else(|| format!("(NotFound) {ipconfig_id} was not found"))?;
        for (list, ids) in [
            ("loadBalancerBackendAddressPools", &update.add_backend_pools),
            ("loadBalancerInboundNatRules", &update.add_nat_rules),
        ] {
            let entries = &mut ipconfig["properties"][list];
            if !entries.is_array() {
                *entries = json!([]);
            }
            if let Some(entries) = entries.as_array_mut() {
                for id in ids {
                    if !entries.iter().any(|e| same_id(&e["id"], id)) {
                        entries.push(json!({ "id": id.to_string() }));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUB: &str = "0000-1111";

    fn vm_id() -> ResourceId {
        ResourceId::new(SUB, "rg", ResourceKind::VirtualMachine, "vm1")
    }

    #[test]
    fn test_get_and_record() {
        let provider = InMemoryProvider::new(SUB);
        provider
            .insert_document(json!({ "id": vm_id().to_string(), "name": "vm1" }))
            .unwrap();
        let doc = provider
            .get_resource(ResourceKind::VirtualMachine, &ResourceRef::new("RG", "VM1"))
            .unwrap();
        assert!(doc.is_some());
        assert_eq!(provider.calls(), vec![ProviderCall::GetResource(vm_id())]);
        assert!(provider.mutating_calls().is_empty());
        assert_eq!(
            provider
                .get_resource_status(ResourceKind::VirtualMachine, &ResourceRef::new("rg", "vm1"))
                .unwrap(),
            RunState::Running
        );
    }

    #[test]
    fn test_missing_resource() {
        let provider = InMemoryProvider::new(SUB);
        let doc = provider
            .get_resource(ResourceKind::LoadBalancer, &ResourceRef::new("rg", "nope"))
            .unwrap();
        assert!(doc.is_none());
        assert!(provider
            .delete_resource(ResourceKind::LoadBalancer, &ResourceRef::new("rg", "nope"))
            .is_err());
    }

    #[test]
    fn test_injected_failure_is_recorded() {
        let provider = InMemoryProvider::new(SUB);
        provider.set_supported_zones("Standard_B2s", "eastus", [1, 2, 3]);
        provider.fail_when(|c| matches!(c, ProviderCall::ListZones { .. }));
        assert!(provider.list_supported_zones("Standard_B2s", "eastus").is_err());
        assert_eq!(provider.calls().len(), 1);
    }

    #[test]
    fn test_zone_catalog_case_insensitive() {
        let provider = InMemoryProvider::new(SUB);
        provider.set_supported_zones("Standard_B2s", "EastUS", [3, 1]);
        let zones = provider.list_supported_zones("standard_b2s", "eastus").unwrap();
        assert_eq!(zones.into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_fixture_file() {
        let provider = InMemoryProvider::from_fixture_file("src/tests/test_data/fixture_vm_01.json")
            .expect("Error loading fixture");
        assert_eq!(provider.subscription_id(), "0000-1111");
        let vm = ResourceId::new(SUB, "rg-app", ResourceKind::VirtualMachine, "app-vm-01");
        assert!(provider.contains(&vm));
    }

    #[test]
    fn test_vm_delete_cascades_to_marked_dependents() {
        let provider = InMemoryProvider::new(SUB);
        let disk = |name: &str| ResourceId::new(SUB, "rg", ResourceKind::Disk, name);
        let nic = ResourceId::new(SUB, "rg", ResourceKind::NetworkInterface, "nic1");
        let pip = ResourceId::new(SUB, "rg", ResourceKind::PublicIpAddress, "pip1");
        for id in [disk("os"), disk("data"), pip.clone()] {
            provider
                .insert_document(json!({ "id": id.to_string(), "name": id.name }))
                .unwrap();
        }
        provider
            .insert_document(json!({
                "id": nic.to_string(),
                "name": "nic1",
                "properties": {
                    "ipConfigurations": [{
                        "name": "ipconfig1",
                        "properties": {
                            "publicIPAddress": {
                                "id": pip.to_string(),
                                "properties": { "deleteOption": "Delete" }
                            }
                        }
                    }],
                    "virtualMachine": { "id": vm_id().to_string() }
                }
            }))
            .unwrap();
        provider
            .insert_document(json!({
                "id": vm_id().to_string(),
                "name": "vm1",
                "properties": {
                    "storageProfile": {
                        "osDisk": {
                            "managedDisk": { "id": disk("os").to_string() },
                            "deleteOption": "Delete"
                        },
                        "dataDisks": [{
                            "managedDisk": { "id": disk("data").to_string() },
                            "deleteOption": "Detach"
                        }]
                    },
                    "networkProfile": {
                        "networkInterfaces": [{
                            "id": nic.to_string(),
                            "properties": { "deleteOption": "Delete" }
                        }]
                    }
                }
            }))
            .unwrap();

        provider
            .delete_resource(ResourceKind::VirtualMachine, &ResourceRef::new("rg", "vm1"))
            .unwrap();
        assert!(!provider.contains(&vm_id()));
        assert!(!provider.contains(&disk("os")));
        assert!(provider.contains(&disk("data")));
        assert!(!provider.contains(&nic));
        assert!(!provider.contains(&pip));
    }
}
