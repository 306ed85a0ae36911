//! Typed view over an ARM virtual machine document.

use super::document::{from_document, parse_zones, SubResource};
use super::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;

/// The parts of a virtual machine the zone migration reads.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VirtualMachine {
    pub id: ResourceId,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub zones: Vec<String>,
    pub properties: VmProperties,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    pub hardware_profile: HardwareProfile,
    pub storage_profile: StorageProfile,
    pub network_profile: NetworkProfile,
    #[serde(default)]
    pub availability_set: Option<SubResource>,
    #[serde(default)]
    pub proximity_placement_group: Option<SubResource>,
    #[serde(default)]
    pub license_type: Option<String>,
    #[serde(default)]
    pub diagnostics_profile: Option<DiagnosticsProfile>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    pub vm_size: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    pub os_disk: OsDisk,
    #[serde(default)]
    pub data_disks: Vec<DataDisk>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDiskParameters {
    #[serde(default)]
    pub id: Option<ResourceId>,
    #[serde(default)]
    pub storage_account_type: Option<String>,
    #[serde(default)]
    pub disk_encryption_set: Option<SubResource>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VirtualHardDisk {
    pub uri: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EncryptionSettings {
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    pub name: String,
    #[serde(default)]
    pub os_type: Option<String>,
    #[serde(default)]
    pub caching: Option<String>,
    #[serde(default)]
    pub managed_disk: Option<ManagedDiskParameters>,
    #[serde(default)]
    pub vhd: Option<VirtualHardDisk>,
    #[serde(default)]
    pub encryption_settings: Option<EncryptionSettings>,
    #[serde(default)]
    pub write_accelerator_enabled: Option<bool>,
    /// `Delete` means Azure removes the disk together with the VM.
    #[serde(default)]
    pub delete_option: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DataDisk {
    pub lun: u32,
    pub name: String,
    #[serde(default)]
    pub caching: Option<String>,
    #[serde(default)]
    pub managed_disk: Option<ManagedDiskParameters>,
    #[serde(default)]
    pub vhd: Option<VirtualHardDisk>,
    #[serde(default)]
    pub write_accelerator_enabled: Option<bool>,
    #[serde(default)]
    pub delete_option: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default)]
    pub network_interfaces: Vec<NicReference>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NicReference {
    pub id: ResourceId,
    #[serde(default)]
    pub properties: Option<NicReferenceProperties>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NicReferenceProperties {
    #[serde(default)]
    pub primary: Option<bool>,
    #[serde(default)]
    pub delete_option: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsProfile {
    #[serde(default)]
    pub boot_diagnostics: Option<BootDiagnostics>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BootDiagnostics {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub storage_uri: Option<String>,
}

impl VirtualMachine {
    pub fn from_document(document: &serde_json::Value) -> Result<VirtualMachine, Box<dyn Error>> {
        from_document("virtual machine", document)
    }

    pub fn size(&self) -> &str {
        &self.properties.hardware_profile.vm_size
    }

    pub fn zones(&self) -> Result<Vec<u8>, Box<dyn Error>> {
        parse_zones(&self.zones)
    }

    pub fn os_disk(&self) -> &OsDisk {
        &self.properties.storage_profile.os_disk
    }

    pub fn data_disks(&self) -> &[DataDisk] {
        &self.properties.storage_profile.data_disks
    }

    pub fn nic_ids(&self) -> Vec<&ResourceId> {
        self.properties
            .network_profile
            .network_interfaces
            .iter()
            .map(|n| &n.id)
            .collect()
    }

    /// Names of disks carrying Azure Disk Encryption settings or a customer-managed
    /// disk encryption set. Snapshot copies of those would not keep the keys.
    pub fn encrypted_disks(&self) -> Vec<&str> {
        let os = self.os_disk();
        let ade = os
            .encryption_settings
            .as_ref()
            .and_then(|e| e.enabled)
            .unwrap_or(false);
        let mut names = Vec::new();
        if ade || has_encryption_set(os.managed_disk.as_ref()) {
            names.push(os.name.as_str());
        }
        names.extend(
            self.data_disks()
                .iter()
                .filter(|d| has_encryption_set(d.managed_disk.as_ref()))
                .map(|d| d.name.as_str()),
        );
        names
    }

    /// Names of disks Azure deletes along with the VM.
    pub fn disks_deleted_with_vm(&self) -> Vec<&str> {
        let os = self.os_disk();
        let mut names = Vec::new();
        if is_delete(os.delete_option.as_deref()) {
            names.push(os.name.as_str());
        }
        names.extend(
            self.data_disks()
                .iter()
                .filter(|d| is_delete(d.delete_option.as_deref()))
                .map(|d| d.name.as_str()),
        );
        names
    }

    /// NICs Azure deletes along with the VM.
    pub fn nics_deleted_with_vm(&self) -> Vec<&ResourceId> {
        self.properties
            .network_profile
            .network_interfaces
            .iter()
            .filter(|n| {
                let option = n.properties.as_ref().and_then(|p| p.delete_option.as_deref());
                is_delete(option)
            })
            .map(|n| &n.id)
            .collect()
    }

    /// Names of any disks stored as VHD blobs rather than managed disks.
    pub fn unmanaged_disks(&self) -> Vec<&str> {
        let os = self.os_disk();
        let mut names = Vec::new();
        if os.vhd.is_some() || os.managed_disk.as_ref().and_then(|m| m.id.as_ref()).is_none() {
            names.push(os.name.as_str());
        }
        for d in self.data_disks() {
            if d.vhd.is_some() || d.managed_disk.as_ref().and_then(|m| m.id.as_ref()).is_none() {
                names.push(d.name.as_str());
            }
        }
        names
    }
}

fn has_encryption_set(managed: Option<&ManagedDiskParameters>) -> bool {
    managed.map(|m| m.disk_encryption_set.is_some()).unwrap_or(false)
}

fn is_delete(option: Option<&str>) -> bool {
    option.map(|o| o.eq_ignore_ascii_case("Delete")).unwrap_or(false)
}

impl ManagedDiskParameters {
    pub fn disk_id(&self) -> Result<&ResourceId, Box<dyn Error>> {
        self.id
            .as_ref()
            .ok_or_else(|| "Managed disk without id".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> serde_json::Value {
        let json = std::fs::read_to_string("src/tests/test_data/vm_show_01.json")
            .expect("Error reading vm sample");
        serde_json::from_str(&json).expect("Error parsing vm sample")
    }

    #[test]
    fn test_parse_vm_sample() {
        let vm = VirtualMachine::from_document(&sample()).expect("Error parsing vm");
        assert_eq!(vm.name, "app-vm-01");
        assert_eq!(vm.size(), "Standard_D2s_v3");
        assert_eq!(vm.location, "australiaeast");
        assert!(vm.zones().unwrap().is_empty());
        assert_eq!(vm.os_disk().name, "app-vm-01_OsDisk_1");
        let luns: Vec<u32> = vm.data_disks().iter().map(|d| d.lun).collect();
        assert_eq!(luns, vec![0, 2]);
        assert_eq!(vm.nic_ids().len(), 1);
        assert!(vm.properties.availability_set.is_some());
        assert!(vm.encrypted_disks().is_empty());
        assert!(vm.disks_deleted_with_vm().is_empty());
        assert!(vm.nics_deleted_with_vm().is_empty());
        assert!(vm.unmanaged_disks().is_empty());
    }

    #[test]
    fn test_encrypted_and_unmanaged() {
        let mut doc = sample();
        doc["properties"]["storageProfile"]["osDisk"]["encryptionSettings"] =
            serde_json::json!({ "enabled": true });
        let data = &mut doc["properties"]["storageProfile"]["dataDisks"][1];
        data["managedDisk"] = serde_json::Value::Null;
        data["vhd"] = serde_json::json!({ "uri": "https://sa.blob.core.windows.net/vhds/d.vhd" });
        let vm = VirtualMachine::from_document(&doc).unwrap();
        assert_eq!(vm.encrypted_disks(), vec!["app-vm-01_OsDisk_1"]);
        assert_eq!(vm.unmanaged_disks(), vec!["app-vm-01-data2"]);
    }

    #[test]
    fn test_encrypted_data_disk() {
        let mut doc = sample();
        let des = concat!(
            "/subscriptions/0000-1111/resourceGroups/rg-app",
            "/providers/Microsoft.Compute/diskEncryptionSets/des"
        );
        doc["properties"]["storageProfile"]["dataDisks"][0]["managedDisk"]["diskEncryptionSet"] =
            serde_json::json!({ "id": des });
        let vm = VirtualMachine::from_document(&doc).unwrap();
        assert_eq!(vm.encrypted_disks(), vec!["app-vm-01-data1"]);
    }

    #[test]
    fn test_delete_options() {
        let mut doc = sample();
        doc["properties"]["storageProfile"]["dataDisks"][1]["deleteOption"] =
            serde_json::json!("Delete");
        doc["properties"]["networkProfile"]["networkInterfaces"][0]["properties"]["deleteOption"] =
            serde_json::json!("Delete");
        let vm = VirtualMachine::from_document(&doc).unwrap();
        assert_eq!(vm.disks_deleted_with_vm(), vec!["app-vm-01-data2"]);
        assert_eq!(vm.nics_deleted_with_vm(), vm.nic_ids());
    }
}
