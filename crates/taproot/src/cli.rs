use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Default namespace holding the control plane's signing records.
pub const DEFAULT_MESH_NAMESPACE: &str = "mesh-system";

/// Default namespace the probe workloads run in.
pub const DEFAULT_PROBE_NAMESPACE: &str = "mesh-probes";

#[derive(Parser, Debug)]
#[command(
    name = "taproot",
    version,
    about = "Zero-downtime rotation of a service mesh's root certificate authority"
)]
pub struct Cli {
    /// Rotation work directory (default: platform data dir)
    #[arg(long, env = "TAPROOT_WORKDIR", global = true)]
    pub workdir: Option<PathBuf>,

    /// Namespace holding the control-plane signing records
    #[arg(long, env = "TAPROOT_MESH_NAMESPACE", default_value = DEFAULT_MESH_NAMESPACE, global = true)]
    pub mesh_namespace: String,

    /// Namespace the probe workloads run in
    #[arg(long, env = "TAPROOT_PROBE_NAMESPACE", default_value = DEFAULT_PROBE_NAMESPACE, global = true)]
    pub probe_namespace: String,

    /// Root certificate validity period in days
    #[arg(long, default_value_t = 3650, global = true)]
    pub root_days: i64,

    /// Intermediate certificate validity period in days
    #[arg(long, default_value_t = 365, global = true)]
    pub intermediate_days: i64,

    /// Fixed settle interval after configuration changes, in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub settle_secs: u64,

    /// Upper bound on workload-restart readiness waits, in seconds
    #[arg(long, default_value_t = 120, global = true)]
    pub ready_timeout_secs: u64,

    /// Answer yes to confirmation prompts (non-interactive use)
    #[arg(long, global = true)]
    pub yes: bool,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "TAPROOT_LOG", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract the live root, generate root B and its intermediate,
    /// write the workspace, and take the pre-rotation snapshot
    Prepare,
    /// Apply the next phase's signing configuration and verify it
    Advance {
        /// Target phase: phase1, phase2, or phase3
        #[arg(long)]
        to: String,
    },
    /// Inspect the live configuration (read-only)
    Status,
    /// Restore the pre-rotation snapshot
    Rollback,
    /// Walk all phases end-to-end, confirming each one
    Run,
    /// Probe workload test harness
    Probes(ProbesCommand),
}

#[derive(Args, Debug)]
pub struct ProbesCommand {
    #[command(subcommand)]
    pub command: ProbesSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ProbesSubcommand {
    /// Deploy the probe client/server pair and wait for readiness
    Start,
    /// Show recent probe requests and the pair's active certificates
    Status,
    /// Truncate the probe request log
    ResetLog,
    /// Run the full three-step connectivity verification
    Verify {
        /// Label recorded with the verification (e.g. the phase name)
        label: String,
    },
    /// Remove the probe workloads
    Stop,
}
