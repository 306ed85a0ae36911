//! Terminal output helpers.

use crate::processing::ErrorKind;
use colored::{ColoredString, Colorize};

/// Format a value as a quoted, right-aligned field.
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let quoted = format!("\"{}\"", value.to_string());
    if quoted.len() >= width {
        quoted
    } else {
        format!("{quoted:>width$}")
    }
}

/// Short colored status for a result row.
pub fn status_label(result: Result<(), ErrorKind>) -> ColoredString {
    match result {
        Ok(()) => "OK".green(),
        Err(ErrorKind::PostDeletionFailure) => "FATAL".on_red(),
        Err(ErrorKind::ProviderFailure) | Err(ErrorKind::BackupFailed) => "FAILED".red(),
        Err(_) => "REFUSED".yellow(),
    }
}
