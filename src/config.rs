//! Tunables shared by the Azure adapter and the migration steps.

/// Base pause used between polls of the control plane.
pub const SLEEP_MSEC: u64 = 1000;

/// How many times a freshly created resource is polled for `provisioningState`.
pub const PROVISIONING_POLL_ATTEMPTS: u32 = 120;

/// Suffix of the per-resource configuration backup file.
pub const BACKUP_FILE_SUFFIX: &str = "-configbackup.json";

/// Default directory for configuration backups.
pub const DEFAULT_BACKUP_DIR: &str = ".";

/// Largest `az` stdout accepted before the command is treated as runaway.
pub const MAX_CLI_OUTPUT_BYTES: usize = 5_000_000;

/// ARM API versions used for `az resource show` / `az rest`.
pub const COMPUTE_API_VERSION: &str = "2023-09-01";
pub const DISK_API_VERSION: &str = "2023-04-02";
pub const NETWORK_API_VERSION: &str = "2023-09-01";

/// Name of the intermediate snapshot taken from a disk.
pub fn snapshot_name(disk_name: &str) -> String {
    format!("{disk_name}-snapshot")
}

/// Name of the zonal copy of a disk.
pub fn zonal_disk_name(disk_name: &str, zone: u8) -> String {
    format!("{disk_name}-az{zone}")
}
