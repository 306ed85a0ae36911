//! Typed view over an ARM load balancer document.

use super::document::{from_document, Sku, SubResource};
use super::network::AllocationMethod;
use super::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoadBalancer {
    pub id: ResourceId,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub sku: Option<Sku>,
    pub properties: LoadBalancerProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerProperties {
    #[serde(default, rename = "frontendIPConfigurations")]
    pub frontend_ip_configurations: Vec<FrontendIpConfiguration>,
    #[serde(default)]
    pub backend_address_pools: Vec<BackendAddressPool>,
    #[serde(default)]
    pub probes: Vec<Probe>,
    #[serde(default)]
    pub load_balancing_rules: Vec<LoadBalancingRule>,
    #[serde(default)]
    pub inbound_nat_rules: Vec<InboundNatRule>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FrontendIpConfiguration {
    pub name: String,
    #[serde(default)]
    pub zones: Vec<String>,
    pub properties: FrontendIpProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FrontendIpProperties {
    #[serde(default, rename = "privateIPAddress")]
    pub private_ip_address: Option<String>,
    #[serde(default, rename = "privateIPAllocationMethod")]
    pub private_ip_allocation_method: Option<AllocationMethod>,
    #[serde(default)]
    pub subnet: Option<SubResource>,
    #[serde(default, rename = "publicIPAddress")]
    pub public_ip_address: Option<SubResource>,
    #[serde(default, rename = "publicIPPrefix")]
    pub public_ip_prefix: Option<SubResource>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackendAddressPool {
    #[serde(default)]
    pub id: Option<ResourceId>,
    pub name: String,
    #[serde(default)]
    pub properties: BackendPoolProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackendPoolProperties {
    #[serde(default, rename = "backendIPConfigurations")]
    pub backend_ip_configurations: Vec<SubResource>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Probe {
    pub name: String,
    pub properties: ProbeProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeProperties {
    pub protocol: String,
    pub port: u16,
    #[serde(default)]
    pub interval_in_seconds: Option<u32>,
    #[serde(default)]
    pub number_of_probes: Option<u32>,
    #[serde(default)]
    pub request_path: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoadBalancingRule {
    pub name: String,
    pub properties: LoadBalancingRuleProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancingRuleProperties {
    #[serde(rename = "frontendIPConfiguration")]
    pub frontend_ip_configuration: SubResource,
    #[serde(default)]
    pub backend_address_pool: Option<SubResource>,
    #[serde(default)]
    pub probe: Option<SubResource>,
    pub protocol: String,
    pub frontend_port: u16,
    pub backend_port: u16,
    #[serde(default)]
    pub idle_timeout_in_minutes: Option<u32>,
    #[serde(default, rename = "enableFloatingIP")]
    pub enable_floating_ip: Option<bool>,
    #[serde(default)]
    pub load_distribution: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InboundNatRule {
    #[serde(default)]
    pub id: Option<ResourceId>,
    pub name: String,
    pub properties: InboundNatRuleProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InboundNatRuleProperties {
    #[serde(rename = "frontendIPConfiguration")]
    pub frontend_ip_configuration: SubResource,
    #[serde(default, rename = "backendIPConfiguration")]
    pub backend_ip_configuration: Option<SubResource>,
    pub protocol: String,
    pub frontend_port: u16,
    pub backend_port: u16,
    #[serde(default)]
    pub idle_timeout_in_minutes: Option<u32>,
    #[serde(default, rename = "enableFloatingIP")]
    pub enable_floating_ip: Option<bool>,
}

impl LoadBalancer {
    pub fn from_document(document: &serde_json::Value) -> Result<LoadBalancer, Box<dyn Error>> {
        from_document("load balancer", document)
    }

    pub fn is_standard(&self) -> bool {
        self.sku.as_ref().map(|s| s.is_standard()).unwrap_or(false)
    }

    /// NIC IP configurations in backend pool order, pools first then members.
    pub fn backend_ip_configurations(&self) -> Vec<&ResourceId> {
        self.properties
            .backend_address_pools
            .iter()
            .flat_map(|p| p.properties.backend_ip_configurations.iter())
            .map(|s| &s.id)
            .collect()
    }

    /// Id of a child resource of this load balancer, by type and name.
    pub fn child_id(&self, child_type: &str, name: &str) -> ResourceId {
        self.id.child(child_type, name)
    }
}
