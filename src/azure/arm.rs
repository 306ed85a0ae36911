//! ARM request bodies built from creation specs.
//!
//! The same bodies are PUT by the `az` adapter and stored by the in-memory provider,
//! so a resource created through either reads back through the same typed views.

use crate::models::spec::{DiskSpec, LoadBalancerSpec, NicSpec, PublicIpSpec, VmSpec};
use crate::models::ResourceId;
use serde_json::{json, Value};

/// Drop `null` members so optional fields are omitted rather than sent as null.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for v in map.values_mut() {
                strip_nulls(v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

fn zone_strings(zones: &[u8]) -> Vec<String> {
    zones.iter().map(|z| z.to_string()).collect()
}

fn id_ref(id: &ResourceId) -> Value {
    json!({ "id": id.to_string() })
}

pub fn vm_body(spec: &VmSpec) -> Value {
    let data_disks: Vec<Value> = spec
        .data_disks
        .iter()
        .map(|d| {
            json!({
                "lun": d.lun,
                "name": d.name,
                "caching": d.caching,
                "createOption": "Attach",
                "managedDisk": id_ref(&d.disk),
                "writeAcceleratorEnabled": d.write_accelerator_enabled,
            })
        })
        .collect();

    let nics: Vec<Value> = spec
        .nics
        .iter()
        .enumerate()
        .map(|(i, nic)| {
            json!({
                "id": nic.to_string(),
                "properties": { "primary": i == 0 },
            })
        })
        .collect();

    let mut body = json!({
        "location": spec.location,
        "tags": spec.tags,
        "zones": zone_strings(&[spec.zone]),
        "properties": {
            "hardwareProfile": { "vmSize": spec.size },
            "storageProfile": {
                "osDisk": {
                    "name": spec.os_disk.name,
                    "osType": spec.os_disk.os_type,
                    "caching": spec.os_disk.caching,
                    "createOption": "Attach",
                    "managedDisk": id_ref(&spec.os_disk.disk),
                    "writeAcceleratorEnabled": spec.os_disk.write_accelerator_enabled,
                },
                "dataDisks": data_disks,
            },
            "networkProfile": { "networkInterfaces": nics },
            "licenseType": spec.license_type,
            "diagnosticsProfile": spec.boot_diagnostics.as_ref().map(|b| json!({
                "bootDiagnostics": {
                    "enabled": b.enabled,
                    "storageUri": b.storage_uri,
                }
            })),
        }
    });
    strip_nulls(&mut body);
    body
}

/// A managed disk copied from `snapshot` into a single zone.
pub fn disk_body(spec: &DiskSpec, snapshot: &ResourceId) -> Value {
    json!({
        "location": spec.location,
        "tags": spec.tags,
        "zones": zone_strings(&[spec.zone]),
        "sku": { "name": spec.sku },
        "properties": {
            "creationData": {
                "createOption": "Copy",
                "sourceResourceId": snapshot.to_string(),
            }
        }
    })
}

pub fn nic_body(spec: &NicSpec) -> Value {
    let allocation = if spec.private_ip_address.is_some() {
        "Static"
    } else {
        "Dynamic"
    };
    let mut body = json!({
        "location": spec.location,
        "tags": spec.tags,
        "properties": {
            "ipConfigurations": [{
                "name": spec.ip_config_name,
                "properties": {
                    "primary": true,
                    "privateIPAllocationMethod": allocation,
                    "privateIPAddress": spec.private_ip_address,
                    "subnet": id_ref(&spec.subnet),
                    "publicIPAddress": spec.public_ip.as_ref().map(id_ref),
                }
            }],
            "networkSecurityGroup": spec.network_security_group.as_ref().map(id_ref),
            "enableAcceleratedNetworking": spec.accelerated_networking,
            "enableIPForwarding": spec.ip_forwarding,
            "dnsSettings": { "dnsServers": spec.dns_servers },
        }
    });
    strip_nulls(&mut body);
    body
}

pub fn public_ip_body(spec: &PublicIpSpec) -> Value {
    let mut body = json!({
        "location": spec.location,
        "tags": spec.tags,
        "zones": zone_strings(&spec.zones),
        "sku": { "name": spec.sku, "tier": "Regional" },
        "properties": {
            "publicIPAllocationMethod": spec.allocation.to_string(),
            "publicIPAddressVersion": "IPv4",
            "idleTimeoutInMinutes": spec.idle_timeout_in_minutes,
            "dnsSettings": spec.domain_name_label.as_ref().map(|l| json!({ "domainNameLabel": l })),
        }
    });
    strip_nulls(&mut body);
    body
}

/// Children of the new load balancer are referenced by id under `lb_id`.
pub fn load_balancer_body(spec: &LoadBalancerSpec, lb_id: &ResourceId) -> Value {
    let child = |child_type: &str, name: &str| id_ref(&lb_id.child(child_type, name));

    let frontends: Vec<Value> = spec
        .frontends
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "zones": zone_strings(&f.zones),
                "properties": {
                    "publicIPAddress": f.public_ip.as_ref().map(id_ref),
                    "subnet": f.subnet.as_ref().map(id_ref),
                    "privateIPAddress": f.private_ip_address,
                    "privateIPAllocationMethod": f.private_ip_allocation.map(|a| a.to_string()),
                }
            })
        })
        .collect();

    let pools: Vec<Value> = spec
        .backend_pools
        .iter()
        .map(|name| json!({ "name": name }))
        .collect();

    let probes: Vec<Value> = spec
        .probes
        .iter()
        .map(|p| json!({ "name": p.name, "properties": p.properties }))
        .collect();

    let rules: Vec<Value> = spec
        .rules
        .iter()
        .map(|r| {
            json!({
                "name": r.name,
                "properties": {
                    "frontendIPConfiguration": child("frontendIPConfigurations", &r.frontend),
                    "backendAddressPool": r
                        .backend_pool
                        .as_ref()
                        .map(|p| child("backendAddressPools", p)),
                    "probe": r.probe.as_ref().map(|p| child("probes", p)),
                    "protocol": r.protocol,
                    "frontendPort": r.frontend_port,
                    "backendPort": r.backend_port,
                    "idleTimeoutInMinutes": r.idle_timeout_in_minutes,
                    "enableFloatingIP": r.enable_floating_ip,
                    "loadDistribution": r.load_distribution,
                }
            })
        })
        .collect();

    let nat_rules: Vec<Value> = spec
        .nat_rules
        .iter()
        .map(|r| {
            json!({
                "name": r.name,
                "properties": {
                    "frontendIPConfiguration": child("frontendIPConfigurations", &r.frontend),
                    "protocol": r.protocol,
                    "frontendPort": r.frontend_port,
                    "backendPort": r.backend_port,
                    "idleTimeoutInMinutes": r.idle_timeout_in_minutes,
                    "enableFloatingIP": r.enable_floating_ip,
                }
            })
        })
        .collect();

    let mut body = json!({
        "location": spec.location,
        "tags": spec.tags,
        "sku": { "name": spec.sku, "tier": "Regional" },
        "properties": {
            "frontendIPConfigurations": frontends,
            "backendAddressPools": pools,
            "probes": probes,
            "loadBalancingRules": rules,
            "inboundNatRules": nat_rules,
        }
    });
    strip_nulls(&mut body);
    body
}
