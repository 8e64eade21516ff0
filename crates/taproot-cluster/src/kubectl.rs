//! Thin wrapper around the `kubectl` binary.
//!
//! All cluster access goes through these two helpers so failure handling
//! (exit status, stderr capture) lives in one place. Commands never
//! prompt; stdin is only used to feed manifests to `apply`/`create`.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::ClusterError;

const KUBECTL: &str = "kubectl";

/// Check that `kubectl` is present and runnable.
///
/// Called once before any mutation; a missing binary is fatal to the
/// whole run, so this surfaces `PrerequisiteMissing` rather than a
/// generic command failure.
pub fn ensure_available() -> Result<(), ClusterError> {
    let result = Command::new(KUBECTL)
        .args(["version", "--client", "--output=yaml"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(status) if status.success() => Ok(()),
        _ => Err(ClusterError::PrerequisiteMissing {
            tool: KUBECTL.to_string(),
        }),
    }
}

/// Run `kubectl` with the given arguments and return trimmed stdout.
pub fn run(args: &[&str]) -> Result<String, ClusterError> {
    tracing::debug!(args = ?args, "kubectl");
    let output = Command::new(KUBECTL).args(args).output()?;

    if !output.status.success() {
        return Err(ClusterError::CommandFailed {
            program: format!("{KUBECTL} {}", args.join(" ")),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run `kubectl` feeding `input` on stdin (for `create -f -` / `apply -f -`).
pub fn run_with_stdin(args: &[&str], input: &str) -> Result<String, ClusterError> {
    tracing::debug!(args = ?args, "kubectl (stdin)");
    let mut child = Command::new(KUBECTL)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    child
        .stdin
        .take()
        .ok_or_else(|| ClusterError::CommandFailed {
            program: KUBECTL.to_string(),
            detail: "stdin unavailable".to_string(),
        })?
        .write_all(input.as_bytes())?;

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(ClusterError::CommandFailed {
            program: format!("{KUBECTL} {}", args.join(" ")),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
