//! CLI command handlers.
//!
//! Handlers wire the rotation core to the kubectl-backed collaborators
//! and own everything interactive: confirmation prompts, output
//! formatting, exit behavior. The core never prompts.

pub mod probes;
pub mod rotate;

use std::io::Write;
use std::time::Duration;

use taproot_cluster::{KubectlStore, KubectlWorkloads};
use taproot_pki::RotationWorkspace;

use crate::cli::Cli;

/// Everything a handler needs, resolved once from the CLI.
pub struct Context {
    pub ws: RotationWorkspace,
    pub store: KubectlStore,
    pub workloads: KubectlWorkloads,
    pub root_days: i64,
    pub intermediate_days: i64,
    pub settle: Duration,
    pub settle_secs: u64,
    pub ready_timeout_secs: u64,
    pub yes: bool,
    pub json: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Self {
        let workdir = cli
            .workdir
            .clone()
            .unwrap_or_else(taproot_common::paths::default_workdir);
        Self {
            ws: RotationWorkspace::new(workdir),
            store: KubectlStore::new(cli.mesh_namespace.as_str()),
            workloads: KubectlWorkloads::new(cli.probe_namespace.as_str()),
            root_days: cli.root_days,
            intermediate_days: cli.intermediate_days,
            settle: Duration::from_secs(cli.settle_secs),
            settle_secs: cli.settle_secs,
            ready_timeout_secs: cli.ready_timeout_secs,
            yes: cli.yes,
            json: cli.json,
        }
    }
}

/// Blocking yes/no confirmation gate.
///
/// Every phase transition passes through this before anything mutates;
/// `--yes` answers for scripted runs. Returns `false` when the operator
/// declines.
pub fn confirm(prompt: &str, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    eprint!("{prompt} [y/N] ");
    let _ = std::io::stderr().flush();

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Print a serializable value as JSON, handling serialization errors
/// gracefully instead of panicking.
pub fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: failed to serialize response: {e}"),
    }
}
