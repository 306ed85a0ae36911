//! Migration error taxonomy.

use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Which class of failure stopped a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Resource missing or not in the required state. Nothing touched.
    PreconditionNotMet,
    /// Resource uses a feature this migration cannot handle. Nothing touched.
    UnsupportedConfiguration,
    /// Target zone not offered for the size/region. Nothing touched.
    ZoneUnsupported,
    /// Configuration backup could not be confirmed. Nothing destroyed.
    BackupFailed,
    /// A provider call failed before the original was deleted; it still exists.
    ProviderFailure,
    /// The original is gone and a later step failed. Needs the operator.
    PostDeletionFailure,
}

impl ErrorKind {
    /// True when the original resource may already be gone.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::PostDeletionFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Step of the migration sequence a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    Validate,
    Backup,
    Stop,
    CopyDisks,
    Delete,
    RebuildNetwork,
    Recreate,
    Rewire,
    Cleanup,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Abort of one resource's migration.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("[{kind}] {resource} at step {step}: {message}{}", backup_hint(.backup))]
pub struct MigrationError {
    pub kind: ErrorKind,
    pub resource: String,
    pub step: Step,
    pub message: String,
    /// Configuration backup to recover from, once one has been written.
    pub backup: Option<PathBuf>,
}

fn backup_hint(backup: &Option<PathBuf>) -> String {
    match backup {
        Some(path) => format!(" (config backup: {})", path.display()),
        None => String::new(),
    }
}

impl MigrationError {
    pub fn new(
        kind: ErrorKind,
        resource: impl fmt::Display,
        step: Step,
        message: impl fmt::Display,
    ) -> MigrationError {
        MigrationError {
            kind,
            resource: resource.to_string(),
            step,
            message: message.to_string(),
            backup: None,
        }
    }

    pub fn with_backup(mut self, backup: Option<PathBuf>) -> MigrationError {
        self.backup = backup;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

/// Attach kind/resource/step context to a boxed adapter error.
pub trait MigrationContext<T> {
    fn migration_err(
        self,
        kind: ErrorKind,
        resource: &dyn fmt::Display,
        step: Step,
    ) -> Result<T, MigrationError>;
}

impl<T> MigrationContext<T> for Result<T, Box<dyn Error>> {
    fn migration_err(
        self,
        kind: ErrorKind,
        resource: &dyn fmt::Display,
        step: Step,
    ) -> Result<T, MigrationError> {
        self.map_err(|e| MigrationError::new(kind, resource, step, e))
    }
}
