//! Migration requests, zone assignments and captured attachments.

use super::network::{AllocationMethod, IpConfiguration, NetworkInterface, PublicIpAddress};
use super::{ResourceId, ResourceKind, ResourceRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// Power / availability state reported by the provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
    Deallocated,
    Starting,
    Stopping,
    /// Non-compute resources have no power state.
    Available,
    Unknown(String),
}

impl RunState {
    /// Map an instance view status code such as `PowerState/running`.
    pub fn from_power_state(code: &str) -> RunState {
        let state = code.rsplit('/').next().unwrap_or(code);
        match state.to_ascii_lowercase().as_str() {
            "running" => RunState::Running,
            "stopped" => RunState::Stopped,
            "deallocated" => RunState::Deallocated,
            "starting" => RunState::Starting,
            "stopping" | "deallocating" => RunState::Stopping,
            _ => RunState::Unknown(code.to_string()),
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Unknown(code) => write!(f, "unknown ({code})"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

/// What the resource should become.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationTarget {
    /// Pin to this availability zone.
    Zone(u8),
    /// Replace a Basic SKU resource with its Standard SKU equivalent.
    StandardSku,
}

impl fmt::Display for MigrationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationTarget::Zone(z) => write!(f, "zone {z}"),
            MigrationTarget::StandardSku => write!(f, "Standard SKU"),
        }
    }
}

/// The operator's intent for one resource.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    pub kind: ResourceKind,
    pub resource: ResourceRef,
    pub target: MigrationTarget,
}

impl MigrationRequest {
    pub fn vm_to_zone(resource_group: &str, name: &str, zone: u8) -> MigrationRequest {
        MigrationRequest {
            kind: ResourceKind::VirtualMachine,
            resource: ResourceRef::new(resource_group, name),
            target: MigrationTarget::Zone(zone),
        }
    }

    pub fn load_balancer_to_standard(resource_group: &str, name: &str) -> MigrationRequest {
        MigrationRequest {
            kind: ResourceKind::LoadBalancer,
            resource: ResourceRef::new(resource_group, name),
            target: MigrationTarget::StandardSku,
        }
    }
}

/// A resource paired with the zone it will be moved into.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ZoneAssignment {
    pub resource: ResourceId,
    pub zone: u8,
}

/// Public IP details needed to recreate the address as Standard.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicIpAttachment {
    pub id: ResourceId,
    pub name: String,
    pub location: String,
    pub tags: BTreeMap<String, String>,
    pub domain_name_label: Option<String>,
    pub idle_timeout_in_minutes: Option<u32>,
}

impl PublicIpAttachment {
    pub fn capture(pip: &PublicIpAddress) -> PublicIpAttachment {
        PublicIpAttachment {
            id: pip.id.clone(),
            name: pip.name.clone(),
            location: pip.location.clone(),
            tags: pip.tags.clone(),
            domain_name_label: pip.domain_name_label().map(str::to_string),
            idle_timeout_in_minutes: pip.properties.idle_timeout_in_minutes,
        }
    }
}

/// Everything a NIC's single IP configuration was attached to before deletion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DependentAttachment {
    /// The NIC. Names are preserved on recreation so this id stays valid.
    pub nic: ResourceId,
    pub location: String,
    pub tags: BTreeMap<String, String>,
    pub ip_config_name: String,
    pub subnet: ResourceId,
    pub network_security_group: Option<ResourceId>,
    pub public_ip: Option<PublicIpAttachment>,
    pub backend_pools: Vec<ResourceId>,
    pub nat_rules: Vec<ResourceId>,
    pub private_ip_address: Option<String>,
    pub private_ip_allocation: AllocationMethod,
    pub accelerated_networking: bool,
    pub ip_forwarding: bool,
    pub dns_servers: Vec<String>,
}

impl DependentAttachment {
    /// Capture the attachment record from the original NIC (and its public IP).
    pub fn capture(
        nic: &NetworkInterface,
        public_ip: Option<&PublicIpAddress>,
    ) -> Result<DependentAttachment, Box<dyn Error>> {
        let ipconfig = nic.single_ip_configuration()?;
        DependentAttachment::capture_ip_configuration(nic, ipconfig, public_ip)
    }

    /// Capture one named IP configuration of a NIC that may carry several.
    pub fn capture_ip_configuration(
        nic: &NetworkInterface,
        ipconfig: &IpConfiguration,
        public_ip: Option<&PublicIpAddress>,
    ) -> Result<DependentAttachment, Box<dyn Error>> {
        let props = &ipconfig.properties;
        let public_ip = match (&props.public_ip_address, public_ip) {
            (Some(reference), Some(pip)) if reference.id == pip.id => {
                Some(PublicIpAttachment::capture(pip))
            }
            (Some(reference), _) => {
                return Err(format!(
                    "NIC {} references public IP {} which was not supplied",
                    nic.name, reference.id
                )
                .into())
            }
            (None, _) => None,
        };

        Ok(DependentAttachment {
            nic: nic.id.clone(),
            location: nic.location.clone(),
            tags: nic.tags.clone(),
            ip_config_name: ipconfig.name.clone(),
            subnet: props.subnet.id.clone(),
            network_security_group: nic
                .properties
                .network_security_group
                .as_ref()
                .map(|n| n.id.clone()),
            public_ip,
            backend_pools: props
                .load_balancer_backend_address_pools
                .iter()
                .map(|p| p.id.clone())
                .collect(),
            nat_rules: props
                .load_balancer_inbound_nat_rules
                .iter()
                .map(|r| r.id.clone())
                .collect(),
            private_ip_address: props.private_ip_address.clone(),
            private_ip_allocation: props.private_ip_allocation_method,
            accelerated_networking: nic.properties.enable_accelerated_networking.unwrap_or(false),
            ip_forwarding: nic.properties.enable_ip_forwarding.unwrap_or(false),
            dns_servers: nic
                .properties
                .dns_settings
                .as_ref()
                .map(|d| d.dns_servers.clone())
                .unwrap_or_default(),
        })
    }

    /// Private address to pin on recreation: static addresses are reused, dynamic
    /// ones are left to the provider's allocator.
    pub fn pinned_private_ip(&self) -> Option<&str> {
        match self.private_ip_allocation {
            AllocationMethod::Static => self.private_ip_address.as_deref(),
            AllocationMethod::Dynamic => None,
        }
    }

    /// True when the rewirer has something to reattach.
    pub fn needs_rewire(&self) -> bool {
        !self.backend_pools.is_empty() || !self.nat_rules.is_empty()
    }
}

/// Point-in-time capture of a resource's full configuration, written before any
/// destructive step.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResourceSnapshot {
    pub resource_id: ResourceId,
    pub kind: ResourceKind,
    pub captured_at: DateTime<Utc>,
    /// The provider-native document, passed through untouched.
    pub document: serde_json::Value,
    /// Native documents of dependents destroyed along with the resource (NICs, public IPs).
    #[serde(default)]
    pub dependents: Vec<serde_json::Value>,
}

impl ResourceSnapshot {
    pub fn capture(
        resource_id: &ResourceId,
        kind: ResourceKind,
        document: &serde_json::Value,
        dependents: Vec<serde_json::Value>,
    ) -> ResourceSnapshot {
        ResourceSnapshot {
            resource_id: resource_id.clone(),
            kind,
            captured_at: Utc::now(),
            document: document.clone(),
            dependents,
        }
    }
}
