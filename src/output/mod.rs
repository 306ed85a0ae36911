//! Output formatting for migration results.
//!
//! - [`report`] - Rows for outcomes, aborts and batch reports
//! - [`terminal`] - Field and status formatting with colors

mod report;
mod terminal;

pub use report::{error_row, outcome_row, print_batch_report, print_error, print_outcome};
pub use terminal::{format_field, status_label};
