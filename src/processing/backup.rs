//! Configuration backups written before anything is destroyed.

use crate::config;
use crate::models::ResourceSnapshot;
use std::error::Error;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory holding one `<name>-configbackup.json` per migrated resource.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> BackupStore {
        BackupStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, resource_name: &str) -> PathBuf {
        self.dir
            .join(format!("{resource_name}{}", config::BACKUP_FILE_SUFFIX))
    }

    /// Write the snapshot and confirm it by reading it back.
    ///
    /// An existing backup of the same resource is never overwritten: it may be the
    /// only copy of a configuration from an earlier, interrupted run.
    pub fn write(&self, snapshot: &ResourceSnapshot) -> Result<PathBuf, Box<dyn Error>> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| format!("Error creating backup dir {}: {e}", self.dir.display()))?;

        let mut path = self.path_for(&snapshot.resource_id.name);
        if path.exists() {
            let stamped = self.dir.join(format!(
                "{}-{}{}",
                snapshot.resource_id.name,
                snapshot.captured_at.format("%Y%m%dT%H%M%S"),
                config::BACKUP_FILE_SUFFIX
            ));
            log::warn!(
                "Backup {} already exists, writing {} instead",
                path.display(),
                stamped.display()
            );
            path = stamped;
        }

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| format!("Error serializing backup: {e}"))?;
        let mut file = File::create(&path)
            .map_err(|e| format!("Error creating backup file {}: {e}", path.display()))?;
        file.write_all(json.as_bytes())
            .map_err(|e| format!("Error writing backup file {}: {e}", path.display()))?;
        file.sync_all()
            .map_err(|e| format!("Error syncing backup file {}: {e}", path.display()))?;

        let written = fs::read_to_string(&path)
            .map_err(|e| format!("Error re-reading backup file {}: {e}", path.display()))?;
        if written != json {
            let message = format!("Backup file {} does not match what was written", path.display());
            return Err(message.into());
        }

        log::info!("Wrote config backup {}", path.display());
        Ok(path)
    }

    /// Read a backup back, e.g. for manual recovery.
    pub fn read(path: &Path) -> Result<ResourceSnapshot, Box<dyn Error>> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Error reading backup file {}: {e}", path.display()))?;
        let mut deserializer = serde_json::Deserializer::from_str(&json);
        let snapshot = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|e| {
                format!("Error parsing backup {}: path={} error={}", path.display(), e.path(), e)
            })?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceId, ResourceKind};

    fn snapshot() -> ResourceSnapshot {
        let id = ResourceId::new("s", "rg", ResourceKind::VirtualMachine, "vm1");
        ResourceSnapshot::capture(
            &id,
            ResourceKind::VirtualMachine,
            &serde_json::json!({ "id": id.to_string(), "name": "vm1", "properties": { "x": 1 } }),
            vec![serde_json::json!({ "name": "nic1" })],
        )
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        let path = store.write(&snapshot()).expect("Error writing backup");
        assert_eq!(path, dir.path().join("vm1-configbackup.json"));

        let back = BackupStore::read(&path).unwrap();
        assert_eq!(back.resource_id.name, "vm1");
        assert_eq!(back.document["properties"]["x"], 1);
        assert_eq!(back.dependents.len(), 1);
    }

    #[test]
    fn test_existing_backup_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path());
        let first = store.write(&snapshot()).unwrap();
        let second = store.write(&snapshot()).unwrap();
        assert_ne!(first, second);
        assert!(second
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("-configbackup.json"));
    }

    #[test]
    fn test_unwritable_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let store = BackupStore::new(blocker.join("backups"));
        assert!(store.write(&snapshot()).is_err());
    }
}
