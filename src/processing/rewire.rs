//! Reattach recreated NICs to load balancer backend pools and NAT rules.

use super::error::{ErrorKind, MigrationContext, MigrationError, Step};
use crate::azure::CloudProvider;
use crate::models::spec::IpConfigUpdate;
use crate::models::{DependentAttachment, NetworkInterface};
use serde::Serialize;

/// What the rewirer restored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewireSummary {
    pub interfaces: usize,
    pub pool_memberships: usize,
    pub nat_bindings: usize,
}

pub struct LoadBalancerRewirer<'a> {
    provider: &'a dyn CloudProvider,
}

impl<'a> LoadBalancerRewirer<'a> {
    pub fn new(provider: &'a dyn CloudProvider) -> LoadBalancerRewirer<'a> {
        LoadBalancerRewirer { provider }
    }

    /// Restore every captured pool membership and NAT rule binding.
    ///
    /// The IP configuration is matched by name on the new NIC. Any failure here is a
    /// `PostDeletionFailure`: the originals are already gone.
    pub fn rewire(
        &self,
        attachments: &[DependentAttachment],
    ) -> Result<RewireSummary, MigrationError> {
        let mut summary = RewireSummary::default();

        for att in attachments.iter().filter(|a| a.needs_rewire()) {
            let fail = |message: String| {
                MigrationError::new(ErrorKind::PostDeletionFailure, &att.nic, Step::Rewire, message)
            };

            let document = self
                .provider
                .get_resource_by_id(&att.nic)
                .migration_err(ErrorKind::PostDeletionFailure, &att.nic, Step::Rewire)?
                .ok_or_else(|| fail(format!("NIC {} not found", att.nic.name)))?;
            let nic = NetworkInterface::from_document(&document).map_err(|e| fail(e.to_string()))?;
            let ipconfig = nic.ip_configuration(&att.ip_config_name).ok_or_else(|| {
                fail(format!(
                    "NIC {} has no IP configuration named {}",
                    nic.name, att.ip_config_name
                ))
            })?;

            let update = IpConfigUpdate {
                ip_config_name: ipconfig.name.clone(),
                add_backend_pools: att.backend_pools.clone(),
                add_nat_rules: att.nat_rules.clone(),
            };
            self.provider
                .update_network_interface_ip_config(&nic.id, &update)
                .migration_err(ErrorKind::PostDeletionFailure, &att.nic, Step::Rewire)?;
            log::info!(
                "Rewired {}/{}: {} pools, {} NAT rules",
                nic.name,
                ipconfig.name,
                update.add_backend_pools.len(),
                update.add_nat_rules.len()
            );

            summary.interfaces += 1;
            summary.pool_memberships += update.add_backend_pools.len();
            summary.nat_bindings += update.add_nat_rules.len();
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::{InMemoryProvider, ProviderCall};
    use crate::models::{AllocationMethod, ResourceId, ResourceKind};
    use serde_json::json;

    const SUB: &str = "s";

    fn lb_id() -> ResourceId {
        ResourceId::new(SUB, "rg", ResourceKind::LoadBalancer, "lb")
    }

    fn setup() -> (InMemoryProvider, DependentAttachment) {
        let provider = InMemoryProvider::new(SUB);
        let lb = lb_id();
        provider
            .insert_document(json!({
                "id": lb.to_string(),
                "name": "lb",
                "location": "australiaeast",
                "sku": { "name": "Standard" },
                "properties": {
                    "frontendIPConfigurations": [{ "name": "fe", "properties": {} }],
                    "backendAddressPools": [{ "name": "pool", "properties": {} }],
                    "inboundNatRules": [{
                        "name": "ssh",
                        "properties": {
                            "frontendIPConfiguration": {
                                "id": lb.child("frontendIPConfigurations", "fe").to_string()
                            },
                            "protocol": "Tcp", "frontendPort": 50001, "backendPort": 22
                        }
                    }]
                }
            }))
            .unwrap();
        let nic = ResourceId::new(SUB, "rg", ResourceKind::NetworkInterface, "nic1");
        let subnet = ResourceId::parse(concat!(
            "/subscriptions/s/resourceGroups/rg",
            "/providers/Microsoft.Network/virtualNetworks/vnet/subnets/default"
        ))
        .unwrap();
        provider
            .insert_document(json!({
                "id": nic.to_string(),
                "name": "nic1",
                "location": "australiaeast",
                "properties": {
                    "ipConfigurations": [{
                        "name": "ipconfig1",
                        "properties": {
                            "privateIPAllocationMethod": "Dynamic",
                            "subnet": { "id": subnet.to_string() }
                        }
                    }]
                }
            }))
            .unwrap();
        let att = DependentAttachment {
            nic,
            location: "australiaeast".to_string(),
            tags: Default::default(),
            ip_config_name: "ipconfig1".to_string(),
            subnet,
            network_security_group: None,
            public_ip: None,
            backend_pools: vec![lb.child("backendAddressPools", "pool")],
            nat_rules: vec![lb.child("inboundNatRules", "ssh")],
            private_ip_address: Some("10.0.0.4".to_string()),
            private_ip_allocation: AllocationMethod::Dynamic,
            accelerated_networking: false,
            ip_forwarding: false,
            dns_servers: vec![],
        };
        (provider, att)
    }

    #[test]
    fn test_rewire_pool_and_nat_rule() {
        let (provider, att) = setup();
        let summary = LoadBalancerRewirer::new(&provider).rewire(&[att.clone()]).unwrap();
        assert_eq!(
            summary,
            RewireSummary {
                interfaces: 1,
                pool_memberships: 1,
                nat_bindings: 1
            }
        );
        let lb = provider.document(&lb_id()).unwrap();
        let pool = &lb["properties"]["backendAddressPools"][0];
        let member = pool["properties"]["backendIPConfigurations"][0]["id"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(member.ends_with("/nic1/ipConfigurations/ipconfig1"));
        let rule = &lb["properties"]["inboundNatRules"][0];
        let bound = rule["properties"]["backendIPConfiguration"]["id"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(bound.ends_with("/nic1/ipConfigurations/ipconfig1"));
    }

    #[test]
    fn test_nothing_to_rewire() {
        let (provider, mut att) = setup();
        att.backend_pools.clear();
        att.nat_rules.clear();
        let summary = LoadBalancerRewirer::new(&provider).rewire(&[att]).unwrap();
        assert_eq!(summary, RewireSummary::default());
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn test_missing_ip_configuration_is_post_deletion_failure() {
        let (provider, mut att) = setup();
        att.ip_config_name = "ipconfig-renamed".to_string();
        let err = LoadBalancerRewirer::new(&provider).rewire(&[att]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PostDeletionFailure);
        assert_eq!(err.step, Step::Rewire);
        assert!(!provider
            .calls()
            .iter()
            .any(|c| matches!(c, ProviderCall::UpdateIpConfig { .. })));
    }
}
