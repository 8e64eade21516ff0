//! The workload orchestrator collaborator.
//!
//! The rotation core needs exactly four capabilities from the cluster's
//! workload layer: rolling-restart a deployable unit, block until its
//! rollout completes, run a command inside a unit's container, and
//! apply/remove a manifest (for the probe workloads). Everything else the
//! orchestrator can do is out of scope.

use crate::error::ClusterError;
use crate::kubectl;

/// Narrow workload-orchestrator contract.
pub trait WorkloadApi {
    /// Trigger a rolling restart of the named unit.
    fn rolling_restart(&self, unit: &str) -> Result<(), ClusterError>;

    /// Block until the named unit's rollout completes, up to
    /// `timeout_secs`. Exceeding the bound is `RolloutTimeout`.
    fn wait_ready(&self, unit: &str, timeout_secs: u64) -> Result<(), ClusterError>;

    /// Run a shell command inside the unit's container, returning stdout.
    fn exec(&self, unit: &str, command: &str) -> Result<String, ClusterError>;

    /// Apply a manifest (create or update the resources it describes).
    fn apply_manifest(&self, manifest: &str) -> Result<(), ClusterError>;

    /// Delete the resources a manifest describes. Absent resources are
    /// not an error.
    fn delete_manifest(&self, manifest: &str) -> Result<(), ClusterError>;
}

/// `kubectl`-backed workload orchestrator scoped to one namespace.
pub struct KubectlWorkloads {
    namespace: String,
}

impl KubectlWorkloads {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl WorkloadApi for KubectlWorkloads {
    fn rolling_restart(&self, unit: &str) -> Result<(), ClusterError> {
        tracing::info!(unit, namespace = %self.namespace, "Rolling restart");
        kubectl::run(&[
            "-n",
            &self.namespace,
            "rollout",
            "restart",
            &format!("deployment/{unit}"),
        ])?;
        Ok(())
    }

    fn wait_ready(&self, unit: &str, timeout_secs: u64) -> Result<(), ClusterError> {
        let timeout = format!("--timeout={timeout_secs}s");
        let result = kubectl::run(&[
            "-n",
            &self.namespace,
            "rollout",
            "status",
            &format!("deployment/{unit}"),
            &timeout,
        ]);

        match result {
            Ok(_) => Ok(()),
            Err(ClusterError::CommandFailed { detail, .. }) if detail.contains("timed out") => {
                Err(ClusterError::RolloutTimeout {
                    unit: unit.to_string(),
                    secs: timeout_secs,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn exec(&self, unit: &str, command: &str) -> Result<String, ClusterError> {
        kubectl::run(&[
            "-n",
            &self.namespace,
            "exec",
            &format!("deploy/{unit}"),
            "--",
            "sh",
            "-c",
            command,
        ])
    }

    fn apply_manifest(&self, manifest: &str) -> Result<(), ClusterError> {
        kubectl::run_with_stdin(&["-n", &self.namespace, "apply", "-f", "-"], manifest)?;
        Ok(())
    }

    fn delete_manifest(&self, manifest: &str) -> Result<(), ClusterError> {
        kubectl::run_with_stdin(
            &[
                "-n",
                &self.namespace,
                "delete",
                "--ignore-not-found",
                "-f",
                "-",
            ],
            manifest,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollout_timeout_display_names_unit_and_bound() {
        let err = ClusterError::RolloutTimeout {
            unit: "probe-client".to_string(),
            secs: 120,
        };
        let msg = err.to_string();
        assert!(msg.contains("probe-client"));
        assert!(msg.contains("120"));
    }
}
