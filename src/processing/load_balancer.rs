//! Replacing a Basic load balancer (and its Basic public IPs) with Standard ones.

use super::error::{ErrorKind, MigrationContext, MigrationError, Step};
use super::migrator::{MigrationOutcome, ResourceMigrator};
use super::rewire::LoadBalancerRewirer;
use crate::azure::CloudProvider;
use crate::models::spec::{
    FrontendSpec, InboundNatRuleSpec, LoadBalancerSpec, LoadBalancingRuleSpec, ProbeSpec,
    PublicIpSpec, ResourceSpec,
};
use crate::models::{
    parse_zones, AllocationMethod, DependentAttachment, LoadBalancer, MigrationTarget,
    NetworkInterface, PublicIpAddress, PublicIpAttachment, ResourceId, ResourceKind, ResourceRef,
    ResourceSnapshot,
};
use itertools::Itertools;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

struct LoadBalancerPlan {
    lb: LoadBalancer,
    document: Value,
    /// Frontend name -> its Basic public IP.
    public_ips: BTreeMap<String, PublicIpAttachment>,
    pip_documents: Vec<Value>,
    attachments: Vec<DependentAttachment>,
}

pub(super) fn migrate_load_balancer(
    migrator: &ResourceMigrator,
    resource: &ResourceRef,
) -> Result<MigrationOutcome, MigrationError> {
    let plan = validate(migrator.provider, resource)?;

    let snapshot = ResourceSnapshot::capture(
        &plan.lb.id,
        ResourceKind::LoadBalancer,
        &plan.document,
        plan.pip_documents.clone(),
    );
    let backup = migrator.backup(&snapshot, resource)?;

    execute(migrator.provider, resource, plan, backup)
}

fn precondition(resource: &ResourceRef, message: impl std::fmt::Display) -> MigrationError {
    MigrationError::new(ErrorKind::PreconditionNotMet, resource, Step::Validate, message)
}

fn unsupported(resource: &ResourceRef, message: impl std::fmt::Display) -> MigrationError {
    MigrationError::new(ErrorKind::UnsupportedConfiguration, resource, Step::Validate, message)
}

fn validate(
    provider: &dyn CloudProvider,
    resource: &ResourceRef,
) -> Result<LoadBalancerPlan, MigrationError> {
    let document = provider
        .get_resource(ResourceKind::LoadBalancer, resource)
        .migration_err(ErrorKind::ProviderFailure, resource, Step::Validate)?
        .ok_or_else(|| precondition(resource, "load balancer not found"))?;
    let lb = LoadBalancer::from_document(&document).map_err(|e| precondition(resource, e))?;
    if lb.is_standard() {
        return Err(precondition(resource, "load balancer is already Standard SKU"));
    }

    let mut public_ips = BTreeMap::new();
    let mut pip_documents = Vec::new();
    for frontend in &lb.properties.frontend_ip_configurations {
        if frontend.properties.public_ip_prefix.is_some() {
            return Err(unsupported(
                resource,
                format!("frontend {} uses a public IP prefix", frontend.name),
            ));
        }
        if let Some(reference) = &frontend.properties.public_ip_address {
            let pip_doc = provider
                .get_resource_by_id(&reference.id)
                .migration_err(ErrorKind::ProviderFailure, resource, Step::Validate)?
                .ok_or_else(|| {
                    precondition(resource, format!("public IP {} not found", reference.id))
                })?;
            let pip =
                PublicIpAddress::from_document(&pip_doc).map_err(|e| precondition(resource, e))?;
            public_ips.insert(frontend.name.clone(), PublicIpAttachment::capture(&pip));
            pip_documents.push(pip_doc);
        }
    }

    let attachments = capture_attachments(provider, resource, &lb)?;
    // Anything the rebuild cannot express must fail while the original still exists.
    standard_spec(&lb, &BTreeMap::new()).map_err(|e| precondition(resource, e))?;

    Ok(LoadBalancerPlan {
        lb,
        document,
        public_ips,
        pip_documents,
        attachments,
    })
}

/// Attachments as seen from the load balancer: pool members and NAT rule targets,
/// grouped per IP configuration, in pool order.
fn capture_attachments(
    provider: &dyn CloudProvider,
    resource: &ResourceRef,
    lb: &LoadBalancer,
) -> Result<Vec<DependentAttachment>, MigrationError> {
    let mut pools: HashMap<ResourceId, Vec<ResourceId>> = HashMap::new();
    let mut nat_rules: HashMap<ResourceId, Vec<ResourceId>> = HashMap::new();
    let mut order: Vec<ResourceId> = Vec::new();

    for pool in &lb.properties.backend_address_pools {
        for member in &pool.properties.backend_ip_configurations {
            pools
                .entry(member.id.clone())
                .or_default()
                .push(lb.child_id("backendAddressPools", &pool.name));
            order.push(member.id.clone());
        }
    }
    for rule in &lb.properties.inbound_nat_rules {
        if let Some(target) = &rule.properties.backend_ip_configuration {
            nat_rules
                .entry(target.id.clone())
                .or_default()
                .push(lb.child_id("inboundNatRules", &rule.name));
            order.push(target.id.clone());
        }
    }

    let mut attachments = Vec::new();
    for ipconfig_id in order.into_iter().unique() {
        if !ipconfig_id.is_kind(ResourceKind::NetworkInterface) || ipconfig_id.children.len() != 1 {
            return Err(unsupported(
                resource,
                format!("backend member {ipconfig_id} is not a NIC IP configuration"),
            ));
        }
        let nic_doc = provider
            .get_resource_by_id(&ipconfig_id)
            .migration_err(ErrorKind::ProviderFailure, resource, Step::Validate)?
            .ok_or_else(|| precondition(resource, format!("NIC {} not found", ipconfig_id.name)))?;
        let nic = NetworkInterface::from_document(&nic_doc).map_err(|e| precondition(resource, e))?;
        let ipconfig = nic.ip_configuration(ipconfig_id.leaf_name()).ok_or_else(|| {
            precondition(
                resource,
                format!("NIC {} has no IP configuration {}", nic.name, ipconfig_id.leaf_name()),
            )
        })?;
        if ipconfig.properties.public_ip_address.is_some() {
            return Err(unsupported(
                resource,
                format!("backend NIC {} carries a public IP", nic.name),
            ));
        }
        let mut attachment = DependentAttachment::capture_ip_configuration(&nic, ipconfig, None)
            .map_err(|e| precondition(resource, e))?;
        attachment.backend_pools = pools.remove(&ipconfig_id).unwrap_or_default();
        attachment.nat_rules = nat_rules.remove(&ipconfig_id).unwrap_or_default();
        attachments.push(attachment);
    }
    Ok(attachments)
}

fn execute(
    provider: &dyn CloudProvider,
    resource: &ResourceRef,
    plan: LoadBalancerPlan,
    backup: PathBuf,
) -> Result<MigrationOutcome, MigrationError> {
    let after = |step: Step| {
        let backup = backup.clone();
        move |e: Box<dyn std::error::Error>| {
            MigrationError::new(ErrorKind::PostDeletionFailure, resource, step, e)
                .with_backup(Some(backup))
        }
    };
    let lb = &plan.lb;

    log::warn!("Deleting {resource}, config backup {}", backup.display());
    provider
        .delete_resource(ResourceKind::LoadBalancer, resource)
        .map_err(after(Step::Delete))?;

    let mut new_public_ips = BTreeMap::new();
    for (frontend, pip) in &plan.public_ips {
        let id = recreate_public_ip(provider, pip).map_err(after(Step::RebuildNetwork))?;
        new_public_ips.insert(frontend.clone(), id);
    }

    let spec = standard_spec(lb, &new_public_ips).map_err(after(Step::Recreate))?;
    let new_id = provider
        .create_resource(&ResourceSpec::LoadBalancer(spec))
        .map_err(after(Step::Recreate))?;
    log::info!("Recreated {new_id} as Standard");
    log::warn!(
        "{resource}: Standard load balancers deny inbound traffic unless an NSG allows it, \
         and give no default outbound access"
    );

    LoadBalancerRewirer::new(provider)
        .rewire(&plan.attachments)
        .map_err(|e| e.with_backup(Some(backup.clone())))?;

    Ok(MigrationOutcome {
        kind: ResourceKind::LoadBalancer,
        resource_id: new_id,
        target: MigrationTarget::StandardSku,
        attachments: plan.attachments,
        backup_path: backup,
        rewired: true,
    })
}

fn recreate_public_ip(
    provider: &dyn CloudProvider,
    pip: &PublicIpAttachment,
) -> Result<ResourceId, Box<dyn std::error::Error>> {
    provider.delete_public_address(&pip.id)?;
    let id = provider.create_public_address(&PublicIpSpec {
        resource_group: pip.id.resource_group.clone(),
        name: pip.name.clone(),
        location: pip.location.clone(),
        tags: pip.tags.clone(),
        sku: "Standard".to_string(),
        allocation: AllocationMethod::Static,
        zones: Vec::new(),
        domain_name_label: pip.domain_name_label.clone(),
        idle_timeout_in_minutes: pip.idle_timeout_in_minutes,
    })?;
    log::info!("Recreated public IP {} as Standard", id.name);
    Ok(id)
}

/// Same children, by name, on a Standard SKU.
fn standard_spec(
    lb: &LoadBalancer,
    public_ips: &BTreeMap<String, ResourceId>,
) -> Result<LoadBalancerSpec, Box<dyn std::error::Error>> {
    let props = &lb.properties;

    let mut frontends = Vec::new();
    for f in &props.frontend_ip_configurations {
        let public_ip = public_ips.get(&f.name).cloned();
        // Private addressing only applies to internal frontends.
        let allocation = match (&public_ip, &f.properties.subnet) {
            (None, Some(_)) => f.properties.private_ip_allocation_method,
            _ => None,
        };
        frontends.push(FrontendSpec {
            name: f.name.clone(),
            public_ip,
            subnet: f.properties.subnet.as_ref().map(|s| s.id.clone()),
            private_ip_address: match allocation {
                Some(AllocationMethod::Static) => f.properties.private_ip_address.clone(),
                _ => None,
            },
            private_ip_allocation: allocation,
            zones: parse_zones(&f.zones)?,
        });
    }

    let rules = props
        .load_balancing_rules
        .iter()
        .map(|r| LoadBalancingRuleSpec {
            name: r.name.clone(),
            frontend: r.properties.frontend_ip_configuration.id.leaf_name().to_string(),
            backend_pool: r
                .properties
                .backend_address_pool
                .as_ref()
                .map(|p| p.id.leaf_name().to_string()),
            probe: r.properties.probe.as_ref().map(|p| p.id.leaf_name().to_string()),
            protocol: r.properties.protocol.clone(),
            frontend_port: r.properties.frontend_port,
            backend_port: r.properties.backend_port,
            idle_timeout_in_minutes: r.properties.idle_timeout_in_minutes,
            enable_floating_ip: r.properties.enable_floating_ip,
            load_distribution: r.properties.load_distribution.clone(),
        })
        .collect();

    let nat_rules = props
        .inbound_nat_rules
        .iter()
        .map(|r| InboundNatRuleSpec {
            name: r.name.clone(),
            frontend: r.properties.frontend_ip_configuration.id.leaf_name().to_string(),
            protocol: r.properties.protocol.clone(),
            frontend_port: r.properties.frontend_port,
            backend_port: r.properties.backend_port,
            idle_timeout_in_minutes: r.properties.idle_timeout_in_minutes,
            enable_floating_ip: r.properties.enable_floating_ip,
        })
        .collect();

    Ok(LoadBalancerSpec {
        resource_group: lb.id.resource_group.clone(),
        name: lb.name.clone(),
        location: lb.location.clone(),
        tags: lb.tags.clone(),
        sku: "Standard".to_string(),
        frontends,
        backend_pools: props.backend_address_pools.iter().map(|p| p.name.clone()).collect(),
        probes: props
            .probes
            .iter()
            .map(|p| ProbeSpec {
                name: p.name.clone(),
                properties: p.properties.clone(),
            })
            .collect(),
        rules,
        nat_rules,
    })
}
