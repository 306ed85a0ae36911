//! Integration tests for azure-zone-migrate
//!
//! These tests run complete migrations against the in-memory provider loaded from
//! the JSON fixtures under `src/tests/test_data/`.

use azure_zone_migrate::azure::{CloudProvider, InMemoryProvider, ProviderCall};
use azure_zone_migrate::models::{
    LoadBalancer, MigrationRequest, ResourceId, ResourceKind, ResourceRef,
};
use azure_zone_migrate::processing::{
    migrate_load_balancer_vms, migrate_vm_and_rewire, BackupStore, BatchOptions, ErrorKind,
    MigrationOptions, ResourceMigrator, Step,
};
use serde_json::json;

const SUB: &str = "0000-1111";

fn load(fixture: &str) -> InMemoryProvider {
    InMemoryProvider::from_fixture_file(&format!("src/tests/test_data/{fixture}"))
        .expect("Failed to load fixture")
}

fn id(rg: &str, kind: ResourceKind, name: &str) -> ResourceId {
    ResourceId::new(SUB, rg, kind, name)
}

fn migrate_vm(
    provider: &InMemoryProvider,
    dir: &std::path::Path,
    rg: &str,
    name: &str,
    zone: u8,
) -> Result<azure_zone_migrate::MigrationOutcome, azure_zone_migrate::MigrationError> {
    migrate_vm_and_rewire(
        provider,
        BackupStore::new(dir),
        &MigrationRequest::vm_to_zone(rg, name, zone),
        MigrationOptions::default(),
    )
}

#[test]
fn test_single_disk_vm_with_public_ip_to_zone_2() {
    let provider = load("fixture_vm_02.json");
    let dir = tempfile::tempdir().unwrap();

    let outcome = migrate_vm(&provider, dir.path(), "rg-v1", "v1", 2).expect("Migration failed");
    assert_eq!(outcome.resource_id, id("rg-v1", ResourceKind::VirtualMachine, "v1"));

    let vm = provider.document(&outcome.resource_id).unwrap();
    assert_eq!(vm["zones"], json!(["2"]));
    assert_eq!(vm["properties"]["licenseType"], "Windows_Server");
    let os_disk = &vm["properties"]["storageProfile"]["osDisk"];
    assert_eq!(os_disk["createOption"], "Attach");
    assert!(os_disk["managedDisk"]["id"]
        .as_str()
        .unwrap()
        .ends_with("/disks/v1_OsDisk_1-az2"));

    // Dynamic address stays dynamic.
    let nic = provider
        .document(&id("rg-v1", ResourceKind::NetworkInterface, "v1-nic"))
        .unwrap();
    let ipconfig = &nic["properties"]["ipConfigurations"][0];
    assert_eq!(ipconfig["name"], "ipconfig1");
    assert_eq!(ipconfig["properties"]["privateIPAllocationMethod"], "Dynamic");

    // Public IP recreated as Standard, static, in the target zone, same name and label.
    let pip = provider
        .document(&id("rg-v1", ResourceKind::PublicIpAddress, "v1-pip"))
        .unwrap();
    assert_eq!(pip["sku"]["name"], "Standard");
    assert_eq!(pip["properties"]["publicIPAllocationMethod"], "Static");
    assert_eq!(pip["zones"], json!(["2"]));
    assert_eq!(pip["properties"]["dnsSettings"]["domainNameLabel"], "v1-app");

    // The backup holds the VM and the NIC and public IP destroyed with it.
    let backup = BackupStore::read(&outcome.backup_path).unwrap();
    assert_eq!(backup.resource_id.name, "v1");
    assert_eq!(backup.dependents.len(), 2);
    assert_eq!(backup.document["properties"]["hardwareProfile"]["vmSize"], "Standard_B2s");
}

#[test]
fn test_batch_spreads_four_vms_over_two_zones() {
    let provider = load("fixture_lb_standard_01.json");
    let dir = tempfile::tempdir().unwrap();

    let report = migrate_load_balancer_vms(
        &provider,
        BackupStore::new(dir.path()),
        &ResourceRef::new("rg-web", "web-lb"),
        &BatchOptions::default(),
    )
    .expect("Batch refused");

    let plan: Vec<(String, u8)> = report
        .assignments
        .iter()
        .map(|a| (a.resource.name.clone(), a.zone))
        .collect();
    assert_eq!(
        plan,
        vec![
            ("web-vm-1".to_string(), 1),
            ("web-vm-2".to_string(), 2),
            ("web-vm-3".to_string(), 1),
            ("web-vm-4".to_string(), 2),
        ]
    );
    assert!(report.is_clean());
    assert_eq!(report.succeeded().count(), 4);

    for (name, zone) in &plan {
        let vm = provider
            .document(&id("rg-web", ResourceKind::VirtualMachine, name))
            .unwrap();
        assert_eq!(vm["zones"], json!([zone.to_string()]));
    }

    // Every NIC is back in the pool and the NAT rule is bound by IP configuration name.
    let lb_doc = provider
        .document(&id("rg-web", ResourceKind::LoadBalancer, "web-lb"))
        .unwrap();
    let lb = LoadBalancer::from_document(&lb_doc).unwrap();
    let members: Vec<String> = lb
        .backend_ip_configurations()
        .iter()
        .map(|m| format!("{}/{}", m.name, m.leaf_name()))
        .collect();
    assert_eq!(members.len(), 4);
    assert!(members.contains(&"web-vm-3-nic/ipconfig1".to_string()));
    let nat = lb.properties.inbound_nat_rules[0]
        .properties
        .backend_ip_configuration
        .as_ref()
        .expect("NAT rule left unbound");
    assert_eq!(nat.id.name, "web-vm-1-nic");
    assert_eq!(nat.id.leaf_name(), "ipconfig1");

    let rewire = report.rewire.unwrap();
    assert_eq!(rewire.interfaces, 4);
    assert_eq!(rewire.pool_memberships, 4);
    assert_eq!(rewire.nat_bindings, 1);
}

#[test]
fn test_unsupported_configuration_touches_nothing() {
    let provider = load("fixture_vm_01.json");
    let vm_id = id("rg-app", ResourceKind::VirtualMachine, "app-vm-01");
    let mut vm = provider.document(&vm_id).unwrap();
    vm["properties"]["storageProfile"]["osDisk"]["encryptionSettings"] = json!({ "enabled": true });
    provider.insert_document(vm).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = migrate_vm(&provider, dir.path(), "rg-app", "app-vm-01", 1).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedConfiguration);
    assert!(provider.mutating_calls().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_zone_unsupported_before_any_change() {
    let provider = load("fixture_vm_01.json");
    provider.set_supported_zones("Standard_D2s_v3", "australiaeast", [1, 2]);
    let dir = tempfile::tempdir().unwrap();

    let err = migrate_vm(&provider, dir.path(), "rg-app", "app-vm-01", 3).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ZoneUnsupported);
    assert_eq!(err.step, Step::Validate);
    assert!(provider.mutating_calls().is_empty());
    assert!(provider.contains(&id("rg-app", ResourceKind::VirtualMachine, "app-vm-01")));
}

#[test]
fn test_backup_failure_aborts_before_destruction() {
    let provider = load("fixture_vm_01.json");
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("backups");
    std::fs::write(&blocker, "not a directory").unwrap();

    let err = migrate_vm(&provider, &blocker, "rg-app", "app-vm-01", 1).unwrap_err();
    assert_eq!(err.kind, ErrorKind::BackupFailed);
    assert_eq!(err.step, Step::Backup);
    assert!(provider.mutating_calls().is_empty());
}

#[test]
fn test_backup_written_before_first_delete() {
    let provider = load("fixture_vm_01.json");
    let dir = tempfile::tempdir().unwrap();
    let backup_path = dir.path().join("app-vm-01-configbackup.json");
    let seen = std::rc::Rc::new(std::cell::Cell::new(None));
    let seen_in_hook = seen.clone();
    let path_in_hook = backup_path.clone();
    // Never fails; records whether the backup existed when the first delete arrived.
    provider.fail_when(move |call| {
        if call.is_delete() && seen_in_hook.get().is_none() {
            seen_in_hook.set(Some(path_in_hook.exists()));
        }
        false
    });

    migrate_vm(&provider, dir.path(), "rg-app", "app-vm-01", 1).expect("Migration failed");
    assert_eq!(seen.get(), Some(true));
}

#[test]
fn test_data_disk_luns_preserved() {
    let provider = load("fixture_vm_01.json");
    let vm_id = id("rg-app", ResourceKind::VirtualMachine, "app-vm-01");
    let disk5 = id("rg-app", ResourceKind::Disk, "app-vm-01-data5");
    provider
        .insert_document(json!({
            "id": disk5.to_string(),
            "name": "app-vm-01-data5",
            "location": "australiaeast",
            "sku": { "name": "Premium_LRS" },
            "properties": { "diskSizeGB": 256 }
        }))
        .unwrap();
    let mut vm = provider.document(&vm_id).unwrap();
    vm["properties"]["storageProfile"]["dataDisks"]
        .as_array_mut()
        .unwrap()
        .push(json!({
            "lun": 5,
            "name": "app-vm-01-data5",
            "createOption": "Attach",
            "caching": "ReadWrite",
            "writeAcceleratorEnabled": false,
            "managedDisk": { "id": disk5.to_string() }
        }));
    provider.insert_document(vm).unwrap();
    let dir = tempfile::tempdir().unwrap();

    migrate_vm(&provider, dir.path(), "rg-app", "app-vm-01", 1).expect("Migration failed");

    let vm = provider.document(&vm_id).unwrap();
    let disks = vm["properties"]["storageProfile"]["dataDisks"].as_array().unwrap();
    let luns: Vec<u64> = disks.iter().map(|d| d["lun"].as_u64().unwrap()).collect();
    assert_eq!(luns, vec![0, 2, 5]);
    let names: Vec<&str> = disks.iter().map(|d| d["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["app-vm-01-data1-az1", "app-vm-01-data2-az1", "app-vm-01-data5-az1"]
    );
    assert_eq!(disks[0]["caching"], "ReadOnly");
    assert_eq!(disks[2]["caching"], "ReadWrite");

    // The data disk without a SKU on the VM keeps the disk's own SKU.
    let copy = provider
        .document(&id("rg-app", ResourceKind::Disk, "app-vm-01-data5-az1"))
        .unwrap();
    assert_eq!(copy["sku"]["name"], "Premium_LRS");
    assert_eq!(copy["zones"], json!(["1"]));
}

#[test]
fn test_nic_order_primary_and_addressing() {
    let provider = load("fixture_vm_01.json");
    let vm_id = id("rg-app", ResourceKind::VirtualMachine, "app-vm-01");
    let nic2 = id("rg-app", ResourceKind::NetworkInterface, "app-vm-01-nic2");
    let subnet = concat!(
        "/subscriptions/0000-1111/resourceGroups/rg-app",
        "/providers/Microsoft.Network/virtualNetworks/vnet-app/subnets/snet-backend"
    );
    provider
        .insert_document(json!({
            "id": nic2.to_string(),
            "name": "app-vm-01-nic2",
            "location": "australiaeast",
            "properties": {
                "ipConfigurations": [{
                    "name": "ipconfig-backend",
                    "properties": {
                        "privateIPAddress": "10.20.2.9",
                        "privateIPAllocationMethod": "Dynamic",
                        "subnet": { "id": subnet }
                    }
                }],
                "virtualMachine": { "id": vm_id.to_string() }
            }
        }))
        .unwrap();
    let mut vm = provider.document(&vm_id).unwrap();
    vm["properties"]["networkProfile"]["networkInterfaces"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "id": nic2.to_string(), "properties": { "primary": false } }));
    provider.insert_document(vm).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let outcome =
        migrate_vm(&provider, dir.path(), "rg-app", "app-vm-01", 2).expect("Migration failed");
    assert_eq!(outcome.attachments.len(), 2);

    let vm = provider.document(&vm_id).unwrap();
    let nics = vm["properties"]["networkProfile"]["networkInterfaces"].as_array().unwrap();
    let names: Vec<String> = nics
        .iter()
        .map(|n| ResourceId::parse(n["id"].as_str().unwrap()).unwrap().name)
        .collect();
    assert_eq!(names, vec!["app-vm-01-nic", "app-vm-01-nic2"]);
    assert_eq!(nics[0]["properties"]["primary"], true);
    assert_eq!(nics[1]["properties"]["primary"], false);

    // Static address pinned, dynamic one left to the allocator.
    let first = provider
        .document(&id("rg-app", ResourceKind::NetworkInterface, "app-vm-01-nic"))
        .unwrap();
    let first = &first["properties"]["ipConfigurations"][0]["properties"];
    assert_eq!(first["privateIPAllocationMethod"], "Static");
    assert_eq!(first["privateIPAddress"], "10.20.1.4");
    let second = provider.document(&nic2).unwrap();
    let second = &second["properties"]["ipConfigurations"][0];
    assert_eq!(second["name"], "ipconfig-backend");
    assert_eq!(second["properties"]["privateIPAllocationMethod"], "Dynamic");
}

#[test]
fn test_failure_after_delete_is_post_deletion() {
    let provider = load("fixture_vm_01.json");
    provider.fail_when(|call| matches!(call, ProviderCall::CreateResource(_)));
    let dir = tempfile::tempdir().unwrap();

    let err = migrate_vm(&provider, dir.path(), "rg-app", "app-vm-01", 1).unwrap_err();
    assert_eq!(err.kind, ErrorKind::PostDeletionFailure);
    assert_eq!(err.step, Step::Recreate);
    assert!(err.is_fatal());
    let backup = err.backup.clone().expect("Backup path missing from error");
    assert!(backup.exists());
    assert!(err.to_string().contains("app-vm-01-configbackup.json"));

    // The original is gone; the zonal disk copies are what is left to recover from.
    assert!(!provider.contains(&id("rg-app", ResourceKind::VirtualMachine, "app-vm-01")));
    assert!(provider.contains(&id("rg-app", ResourceKind::Disk, "app-vm-01_OsDisk_1-az1")));
}

#[test]
fn test_batch_refused_when_a_vm_has_public_ip() {
    let provider = load("fixture_lb_standard_01.json");
    let nic_id = id("rg-web", ResourceKind::NetworkInterface, "web-vm-3-nic");
    let mut nic = provider.document(&nic_id).unwrap();
    let pip = id("rg-web", ResourceKind::PublicIpAddress, "web-vm-3-pip");
    nic["properties"]["ipConfigurations"][0]["properties"]["publicIPAddress"] =
        json!({ "id": pip.to_string() });
    provider.insert_document(nic).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = migrate_load_balancer_vms(
        &provider,
        BackupStore::new(dir.path()),
        &ResourceRef::new("rg-web", "web-lb"),
        &BatchOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedConfiguration);
    assert!(provider.mutating_calls().is_empty());
}

#[test]
fn test_basic_load_balancer_upgrade_then_batch() {
    let provider = load("fixture_lb_basic_01.json");
    let dir = tempfile::tempdir().unwrap();
    let lb_ref = ResourceRef::new("rg-app", "app-lb");

    // A Basic load balancer cannot front zonal VMs.
    let backups = BackupStore::new(dir.path());
    let err = migrate_load_balancer_vms(&provider, backups, &lb_ref, &BatchOptions::default())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PreconditionNotMet);

    let migrator = ResourceMigrator::new(
        &provider,
        BackupStore::new(dir.path()),
        MigrationOptions::default(),
    );
    let outcome = migrator
        .migrate(&MigrationRequest::load_balancer_to_standard("rg-app", "app-lb"))
        .expect("Load balancer upgrade failed");
    assert!(dir.path().join("app-lb-configbackup.json").exists());
    assert_eq!(outcome.attachments.len(), 2);

    let backups = BackupStore::new(dir.path());
    let report = migrate_load_balancer_vms(&provider, backups, &lb_ref, &BatchOptions::default())
        .expect("Batch refused");
    assert!(report.is_clean());
    let zones: Vec<u8> = report.assignments.iter().map(|a| a.zone).collect();
    assert_eq!(zones, vec![1, 2]);

    let lb_doc = provider.get_resource(ResourceKind::LoadBalancer, &lb_ref).unwrap().unwrap();
    let lb = LoadBalancer::from_document(&lb_doc).unwrap();
    assert!(lb.is_standard());
    let nat: Vec<(String, String)> = lb
        .properties
        .inbound_nat_rules
        .iter()
        .map(|r| {
            let target = &r.properties.backend_ip_configuration.as_ref().unwrap().id;
            (r.name.clone(), target.name.clone())
        })
        .collect();
    assert_eq!(
        nat,
        vec![
            ("ssh-vm01".to_string(), "app-vm-01-nic".to_string()),
            ("ssh-vm02".to_string(), "app-vm-02-nic".to_string()),
        ]
    );
}

#[test]
fn test_nic_and_public_ip_deleted_with_vm() {
    let provider = load("fixture_vm_02.json");
    let vm_id = id("rg-v1", ResourceKind::VirtualMachine, "v1");
    let nic_id = id("rg-v1", ResourceKind::NetworkInterface, "v1-nic");
    let pip_id = id("rg-v1", ResourceKind::PublicIpAddress, "v1-pip");
    let mut vm = provider.document(&vm_id).unwrap();
    let nic_ref = &mut vm["properties"]["networkProfile"]["networkInterfaces"][0];
    nic_ref["properties"]["deleteOption"] = json!("Delete");
    provider.insert_document(vm).unwrap();
    let mut nic = provider.document(&nic_id).unwrap();
    nic["properties"]["ipConfigurations"][0]["properties"]["publicIPAddress"] = json!({
        "id": pip_id.to_string(),
        "properties": { "deleteOption": "Delete" }
    });
    provider.insert_document(nic).unwrap();
    let dir = tempfile::tempdir().unwrap();

    migrate_vm(&provider, dir.path(), "rg-v1", "v1", 2).expect("Migration failed");

    // Both went with the VM; the rebuild recreates them instead of deleting again.
    assert!(!provider
        .calls()
        .iter()
        .any(|c| matches!(c, ProviderCall::DeleteNic(_) | ProviderCall::DeletePublicIp(_))));
    let pip = provider.document(&pip_id).unwrap();
    assert_eq!(pip["sku"]["name"], "Standard");
    assert_eq!(pip["zones"], json!(["2"]));
    let nic = provider.document(&nic_id).unwrap();
    assert_eq!(
        nic["properties"]["ipConfigurations"][0]["properties"]["publicIPAddress"]["id"],
        pip_id.to_string()
    );

    // The backup still holds the public IP as it was.
    let backup = BackupStore::read(&dir.path().join("v1-configbackup.json")).unwrap();
    assert!(backup
        .dependents
        .iter()
        .any(|d| d["name"] == "v1-pip" && d["sku"]["name"] == "Basic"));
}
