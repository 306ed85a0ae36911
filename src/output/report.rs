//! Operator-facing summary of migration results.

use super::terminal::{format_field, status_label};
use crate::processing::{BatchReport, MigrationError, MigrationOutcome, VmResult};
use colored::Colorize;

/// One quoted row per migrated resource.
pub fn outcome_row(outcome: &MigrationOutcome) -> String {
    format!(
        "{status},{name},{target},{nics},{backup}",
        status = status_label(Ok(())),
        name = format_field(&outcome.resource_id.name, 20),
        target = format_field(outcome.target, 14),
        nics = format_field(outcome.attachments.len(), 4),
        backup = format_field(outcome.backup_path.display(), 0),
    )
}

pub fn error_row(error: &MigrationError) -> String {
    format!(
        "{status},{resource},{step},{message}",
        status = status_label(Err(error.kind)),
        resource = format_field(&error.resource, 20),
        step = format_field(error.step, 14),
        message = format_field(&error.message, 0),
    )
}

fn vm_row(result: &VmResult) -> String {
    match &result.result {
        Ok(outcome) => outcome_row(outcome),
        Err(error) => error_row(error),
    }
}

pub fn print_outcome(outcome: &MigrationOutcome) {
    println!("{}", outcome_row(outcome));
}

/// Print an abort, with the recovery hint when the original may be gone.
pub fn print_error(error: &MigrationError) {
    println!("{}", error_row(error));
    if error.is_fatal() {
        println!(
            "#{}# {} was deleted and not fully recreated, recover from {}",
            "ACTION".on_red(),
            error.resource,
            error
                .backup
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "the provider's activity log".to_string())
        );
    }
}

pub fn print_batch_report(report: &BatchReport) {
    log::info!(
        "#Batch {} results={} skipped={}",
        report.load_balancer.name,
        report.results.len(),
        report.skipped.len()
    );
    for result in &report.results {
        println!("{}", vm_row(result));
    }
    for vm in &report.skipped {
        println!("{},{}", "SKIPPED".yellow(), format_field(&vm.name, 20));
    }
    if let Some(rewire) = &report.rewire {
        println!(
            "#Rewired {} NICs: {} pool memberships, {} NAT rules",
            rewire.interfaces, rewire.pool_memberships, rewire.nat_bindings
        );
    }
    if let Some(error) = &report.stopped_by {
        println!("#{}# batch stopped", "NOTE".on_red());
        print_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MigrationTarget, ResourceId, ResourceKind};
    use crate::processing::{ErrorKind, Step};
    use std::path::PathBuf;

    #[test]
    fn test_outcome_row() {
        colored::control::set_override(false);
        let outcome = MigrationOutcome {
            kind: ResourceKind::VirtualMachine,
            resource_id: ResourceId::new("s", "rg", ResourceKind::VirtualMachine, "vm1"),
            target: MigrationTarget::Zone(3),
            attachments: vec![],
            backup_path: PathBuf::from("vm1-configbackup.json"),
            rewired: true,
        };
        let row = outcome_row(&outcome);
        assert!(row.starts_with("OK,"));
        assert!(row.contains("\"zone 3\""));
        assert!(row.ends_with("\"vm1-configbackup.json\""));
    }

    #[test]
    fn test_error_row() {
        colored::control::set_override(false);
        let err =
            MigrationError::new(ErrorKind::ZoneUnsupported, "rg/vm1", Step::Validate, "no zones");
        assert_eq!(
            error_row(&err),
            format!(
                "REFUSED,{},{},\"no zones\"",
                format_field("rg/vm1", 20),
                format_field("Validate", 14)
            )
        );
    }
}
