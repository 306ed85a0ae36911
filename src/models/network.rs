//! Typed views over ARM network interface and public IP documents.

use super::document::{from_document, parse_zones, Sku, SubResource};
use super::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// Static or dynamic address allocation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMethod {
    Static,
    Dynamic,
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationMethod::Static => write!(f, "Static"),
            AllocationMethod::Dynamic => write!(f, "Dynamic"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NetworkInterface {
    pub id: ResourceId,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub properties: NicProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NicProperties {
    #[serde(default)]
    pub ip_configurations: Vec<IpConfiguration>,
    #[serde(default)]
    pub network_security_group: Option<SubResource>,
    #[serde(default)]
    pub enable_accelerated_networking: Option<bool>,
    #[serde(default, rename = "enableIPForwarding")]
    pub enable_ip_forwarding: Option<bool>,
    #[serde(default)]
    pub dns_settings: Option<NicDnsSettings>,
    #[serde(default)]
    pub virtual_machine: Option<SubResource>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NicDnsSettings {
    #[serde(default)]
    pub dns_servers: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IpConfiguration {
    #[serde(default)]
    pub id: Option<ResourceId>,
    pub name: String,
    pub properties: IpConfigurationProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IpConfigurationProperties {
    #[serde(default, rename = "privateIPAddress")]
    pub private_ip_address: Option<String>,
    #[serde(rename = "privateIPAllocationMethod")]
    pub private_ip_allocation_method: AllocationMethod,
    pub subnet: SubResource,
    #[serde(default, rename = "publicIPAddress")]
    pub public_ip_address: Option<SubResource>,
    #[serde(default)]
    pub load_balancer_backend_address_pools: Vec<SubResource>,
    #[serde(default)]
    pub load_balancer_inbound_nat_rules: Vec<SubResource>,
    #[serde(default)]
    pub primary: Option<bool>,
}

impl NetworkInterface {
    pub fn from_document(document: &serde_json::Value) -> Result<NetworkInterface, Box<dyn Error>> {
        from_document("network interface", document)
    }

    /// The single IP configuration this tool supports per interface.
    pub fn single_ip_configuration(&self) -> Result<&IpConfiguration, Box<dyn Error>> {
        match self.properties.ip_configurations.as_slice() {
            [ipconfig] => Ok(ipconfig),
            [] => Err(format!("NIC {} has no IP configuration", self.name).into()),
            many => Err(format!(
                "NIC {} has {} IP configurations, only one is supported",
                self.name,
                many.len()
            )
            .into()),
        }
    }

    pub fn ip_configuration(&self, name: &str) -> Option<&IpConfiguration> {
        self.properties
            .ip_configurations
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// True when any IP configuration carries a public IP.
    pub fn has_public_ip(&self) -> bool {
        self.properties
            .ip_configurations
            .iter()
            .any(|c| c.properties.public_ip_address.is_some())
    }

    /// True when any IP configuration sits in a load balancer backend pool.
    pub fn is_pooled(&self) -> bool {
        self.properties
            .ip_configurations
            .iter()
            .any(|c| !c.properties.load_balancer_backend_address_pools.is_empty())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PublicIpAddress {
    pub id: ResourceId,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default)]
    pub sku: Option<Sku>,
    pub properties: PublicIpProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpProperties {
    #[serde(rename = "publicIPAllocationMethod")]
    pub public_ip_allocation_method: AllocationMethod,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default, rename = "publicIPAddressVersion")]
    pub public_ip_address_version: Option<String>,
    #[serde(default)]
    pub dns_settings: Option<PublicIpDnsSettings>,
    #[serde(default)]
    pub idle_timeout_in_minutes: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpDnsSettings {
    #[serde(default)]
    pub domain_name_label: Option<String>,
}

impl PublicIpAddress {
    pub fn from_document(document: &serde_json::Value) -> Result<PublicIpAddress, Box<dyn Error>> {
        from_document("public IP address", document)
    }

    pub fn zones(&self) -> Result<Vec<u8>, Box<dyn Error>> {
        parse_zones(&self.zones)
    }

    pub fn is_standard(&self) -> bool {
        self.sku.as_ref().map(|s| s.is_standard()).unwrap_or(false)
    }

    pub fn domain_name_label(&self) -> Option<&str> {
        self.properties
            .dns_settings
            .as_ref()
            .and_then(|d| d.domain_name_label.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;

    fn sample_nic() -> serde_json::Value {
        let json = std::fs::read_to_string("src/tests/test_data/nic_show_01.json")
            .expect("Error reading nic sample");
        serde_json::from_str(&json).expect("Error parsing nic sample")
    }

    #[test]
    fn test_parse_nic_sample() {
        let nic = NetworkInterface::from_document(&sample_nic()).expect("Error parsing nic");
        assert_eq!(nic.name, "app-vm-01-nic");
        let ipconfig = nic.single_ip_configuration().unwrap();
        assert_eq!(ipconfig.name, "ipconfig1");
        assert_eq!(
            ipconfig.properties.private_ip_allocation_method,
            AllocationMethod::Static
        );
        assert_eq!(
            ipconfig.properties.private_ip_address.as_deref(),
            Some("10.20.1.4")
        );
        assert!(nic.is_pooled());
        assert!(!nic.has_public_ip());
        assert_eq!(ipconfig.properties.load_balancer_inbound_nat_rules.len(), 1);
        assert!(nic.properties.network_security_group.is_some());
    }

    #[test]
    fn test_multiple_ip_configurations_rejected() {
        let mut doc = sample_nic();
        let first = doc["properties"]["ipConfigurations"][0].clone();
        let mut second = first.clone();
        second["name"] = serde_json::json!("ipconfig2");
        doc["properties"]["ipConfigurations"] = serde_json::json!([first, second]);
        let nic = NetworkInterface::from_document(&doc).unwrap();
        let err = nic.single_ip_configuration().unwrap_err();
        assert!(err.to_string().contains("2 IP configurations"));
        assert!(nic.ip_configuration("IPCONFIG2").is_some());
    }

    #[test]
    fn test_parse_public_ip() {
        let doc = serde_json::json!({
            "id": ResourceId::new("s", "rg", ResourceKind::PublicIpAddress, "pip1").to_string(),
            "name": "pip1",
            "location": "australiaeast",
            "sku": { "name": "Basic", "tier": "Regional" },
            "properties": {
                "publicIPAllocationMethod": "Dynamic",
                "dnsSettings": { "domainNameLabel": "app01" }
            }
        });
        let pip = PublicIpAddress::from_document(&doc).unwrap();
        assert!(!pip.is_standard());
        assert_eq!(pip.domain_name_label(), Some("app01"));
        assert_eq!(
            pip.properties.public_ip_allocation_method,
            AllocationMethod::Dynamic
        );
    }
}
