//! Azure CLI command execution.
//!
//! Provides utilities for running Azure CLI commands and parsing their output.

use crate::config;
use colored::Colorize;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::process::Command;
use std::sync::OnceLock;

/// Regex for splitting command strings while preserving quoted substrings.
static COMMAND_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_command_regex() -> &'static Regex {
    COMMAND_REGEX.get_or_init(|| {
        Regex::new(r#"'([^']*)'\s*|\"([^\"]*)\"\s*|([^'\s]*)\s*"#).expect("Invalid Regex")
    })
}

/// Failure of an `az` invocation.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to execute command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ERROR running: {cmd}: {stderr}")]
    Failed {
        cmd: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Response too large: {len} bytes for command: {cmd}")]
    TooLarge { cmd: String, len: usize },
    #[error("Invalid UTF-8 in output of: {cmd}")]
    Utf8 { cmd: String },
    #[error("Empty command")]
    Empty,
}

impl CliError {
    /// True when `az` reported that the target resource does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            CliError::Failed { stderr, .. } => {
                stderr.contains("ResourceNotFound")
                    || stderr.contains("NotFound")
                    || stderr.contains("was not found")
                    || stderr.contains("could not be found")
            }
            _ => false,
        }
    }
}

/// True when a boxed error is an `az` "not found" failure.
pub fn is_not_found(err: &(dyn Error + 'static)) -> bool {
    err.downcast_ref::<CliError>()
        .map(|e| e.is_not_found())
        .unwrap_or(false)
}

/// Run a shell command and return its stdout.
///
/// The command string is split on spaces, with quoted substrings preserved.
///
/// # Arguments
/// * `cmd` - The command string to execute
///
/// # Returns
/// * `Ok(String)` - The stdout output on success
/// * `Err` - A boxed [`CliError`] if the command fails or produces too much output
pub fn run(cmd: &str) -> Result<String, Box<dyn Error>> {
    log::debug!("run({cmd})", cmd = cmd.on_blue());

    let cmds: Vec<&str> = split_and_strip(cmd);
    log::trace!("split cmds={:?}", cmds);

    let program = cmds.first().ok_or(CliError::Empty)?;
    let mut command = Command::new(program);
    for arg in cmds.iter().skip(1) {
        command.arg(arg);
    }

    let output = command.output().map_err(|e| {
        log::error!("Command execution failed: {}", e);
        CliError::Spawn(e)
    })?;

    if output.status.success() {
        log::debug!("Success cmd: {cmd}");
        log::debug!("Success output.stdout.len(): {}", output.stdout.len());

        if output.stdout.len() > config::MAX_CLI_OUTPUT_BYTES {
            return Err(CliError::TooLarge {
                cmd: cmd.to_string(),
                len: output.stdout.len(),
            }
            .into());
        }
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        log::trace!(
            "code={code:?}, status={status}\n┎######\nstderr=\n{stderr}\n┖######",
            code = output.status.code(),
            status = output.status,
            stderr = stderr.red()
        );
        log::warn!(
            "{failed} to run {cmd}",
            failed = "failed".on_red(),
            cmd = cmd.on_blue()
        );
        return Err(CliError::Failed {
            cmd: cmd.to_string(),
            code: output.status.code(),
            stderr,
        }
        .into());
    }

    let stdout = String::from_utf8(output.stdout).map_err(|_| CliError::Utf8 {
        cmd: cmd.to_string(),
    })?;

    Ok(stdout)
}

/// Run a command that prints JSON and deserialize it, reporting the JSON path on
/// schema mismatches.
pub fn run_json<T: DeserializeOwned>(cmd: &str) -> Result<T, Box<dyn Error>> {
    let output = run(cmd)?;
    let mut deserializer = serde_json::Deserializer::from_str(&output);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        log::error!("OUTPUT START:\n\n{}\n\nOUTPUT END\n", output);
        format!("Error parsing output of '{cmd}': path={} error={}", e.path(), e).into()
    })
}

/// Split a command string on spaces, preserving quoted substrings.
fn split_and_strip(input: &str) -> Vec<&str> {
    get_command_regex()
        .find_iter(input)
        .map(|m| m.as_str().trim().trim_matches('\'').trim_matches('"'))
        .collect()
}
