//! Creation specs handed to the provider.
//!
//! These describe *what* to create; turning them into provider request bodies is the
//! adapter's job.

use super::load_balancer::ProbeProperties;
use super::migration::DependentAttachment;
use super::network::AllocationMethod;
use super::vm::BootDiagnostics;
use super::{ResourceId, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSpec {
    pub name: String,
    pub location: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DiskSpec {
    pub name: String,
    pub location: String,
    pub sku: String,
    pub zone: u8,
    pub tags: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicIpSpec {
    pub resource_group: String,
    pub name: String,
    pub location: String,
    pub tags: BTreeMap<String, String>,
    pub sku: String,
    pub allocation: AllocationMethod,
    /// Empty means zone-redundant (Standard) or regional (Basic).
    pub zones: Vec<u8>,
    pub domain_name_label: Option<String>,
    pub idle_timeout_in_minutes: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NicSpec {
    pub resource_group: String,
    pub name: String,
    pub location: String,
    pub tags: BTreeMap<String, String>,
    pub ip_config_name: String,
    pub subnet: ResourceId,
    pub network_security_group: Option<ResourceId>,
    /// `Some` pins a static address, `None` lets the provider allocate.
    pub private_ip_address: Option<String>,
    pub public_ip: Option<ResourceId>,
    pub accelerated_networking: bool,
    pub ip_forwarding: bool,
    pub dns_servers: Vec<String>,
}

impl NicSpec {
    /// Same name, subnet, NSG and address allocation as the captured NIC.
    pub fn from_attachment(att: &DependentAttachment, public_ip: Option<ResourceId>) -> NicSpec {
        NicSpec {
            resource_group: att.nic.resource_group.clone(),
            name: att.nic.name.clone(),
            location: att.location.clone(),
            tags: att.tags.clone(),
            ip_config_name: att.ip_config_name.clone(),
            subnet: att.subnet.clone(),
            network_security_group: att.network_security_group.clone(),
            private_ip_address: att.pinned_private_ip().map(str::to_string),
            public_ip,
            accelerated_networking: att.accelerated_networking,
            ip_forwarding: att.ip_forwarding,
            dns_servers: att.dns_servers.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttachedOsDisk {
    pub disk: ResourceId,
    pub name: String,
    pub os_type: Option<String>,
    pub caching: Option<String>,
    pub write_accelerator_enabled: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttachedDataDisk {
    pub lun: u32,
    pub disk: ResourceId,
    pub name: String,
    pub caching: Option<String>,
    pub write_accelerator_enabled: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VmSpec {
    pub resource_group: String,
    pub name: String,
    pub location: String,
    pub tags: BTreeMap<String, String>,
    pub size: String,
    pub zone: u8,
    pub os_disk: AttachedOsDisk,
    pub data_disks: Vec<AttachedDataDisk>,
    /// In order; the first one is the primary interface.
    pub nics: Vec<ResourceId>,
    pub license_type: Option<String>,
    pub boot_diagnostics: Option<BootDiagnostics>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FrontendSpec {
    pub name: String,
    pub public_ip: Option<ResourceId>,
    pub subnet: Option<ResourceId>,
    pub private_ip_address: Option<String>,
    pub private_ip_allocation: Option<AllocationMethod>,
    pub zones: Vec<u8>,
}

/// Load balancing rule with its frontend, pool and probe referenced by name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancingRuleSpec {
    pub name: String,
    pub frontend: String,
    pub backend_pool: Option<String>,
    pub probe: Option<String>,
    pub protocol: String,
    pub frontend_port: u16,
    pub backend_port: u16,
    pub idle_timeout_in_minutes: Option<u32>,
    pub enable_floating_ip: Option<bool>,
    pub load_distribution: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InboundNatRuleSpec {
    pub name: String,
    pub frontend: String,
    pub protocol: String,
    pub frontend_port: u16,
    pub backend_port: u16,
    pub idle_timeout_in_minutes: Option<u32>,
    pub enable_floating_ip: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub name: String,
    pub properties: ProbeProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoadBalancerSpec {
    pub resource_group: String,
    pub name: String,
    pub location: String,
    pub tags: BTreeMap<String, String>,
    pub sku: String,
    pub frontends: Vec<FrontendSpec>,
    pub backend_pools: Vec<String>,
    pub probes: Vec<ProbeSpec>,
    pub rules: Vec<LoadBalancingRuleSpec>,
    pub nat_rules: Vec<InboundNatRuleSpec>,
}

/// A top level resource to create.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ResourceSpec {
    VirtualMachine(VmSpec),
    LoadBalancer(LoadBalancerSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::VirtualMachine(_) => ResourceKind::VirtualMachine,
            ResourceSpec::LoadBalancer(_) => ResourceKind::LoadBalancer,
        }
    }

    pub fn resource_group(&self) -> &str {
        match self {
            ResourceSpec::VirtualMachine(s) => &s.resource_group,
            ResourceSpec::LoadBalancer(s) => &s.resource_group,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceSpec::VirtualMachine(s) => &s.name,
            ResourceSpec::LoadBalancer(s) => &s.name,
        }
    }
}

/// Memberships to add to one IP configuration of an existing NIC.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IpConfigUpdate {
    pub ip_config_name: String,
    pub add_backend_pools: Vec<ResourceId>,
    pub add_nat_rules: Vec<ResourceId>,
}
