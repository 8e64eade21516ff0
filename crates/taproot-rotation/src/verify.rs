//! Connectivity verification protocol.
//!
//! Certificate trust is validated per-connection and workload
//! certificates rotate independently of the control-plane trust bundle,
//! so the only way to be confident a just-applied configuration is safe
//! is to force and observe every certificate-age pairing between a
//! client and a server:
//!
//! 1. **old client ↔ old server**: neither workload restarted; proves
//!    not-yet-rotated certificates still interoperate.
//! 2. **new client ↔ old server**: client restarted so it picks up a
//!    certificate under the current configuration; the mixed case.
//! 3. **new client ↔ new server**: server restarted too; the fully
//!    migrated case.
//!
//! The first failing step aborts the protocol with its accumulated
//! failure detail; later steps are meaningless once an earlier,
//! less-demanding one has failed. Three green steps are necessary but
//! not sufficient — a longer soak before the destructive final phase is
//! an operator call, not enforced here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use taproot_cluster::{ClusterError, WorkloadApi};

use crate::error::RotationError;

/// Deployable unit names for the probe pair.
pub const PROBE_CLIENT_UNIT: &str = "probe-client";
pub const PROBE_SERVER_UNIT: &str = "probe-server";

/// Where the probe client appends its one-line-per-request log.
pub const PROBE_LOG_PATH: &str = "/var/log/probe/requests.log";

/// One request observation from the probe client's append-only log.
///
/// Line format: `<rfc3339> OK <status>` or `<rfc3339> FAIL <status> <detail...>`.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub ok: bool,
    pub status: Option<u16>,
    pub detail: Option<String>,
}

impl ProbeLogEntry {
    /// Parse one log line; unparseable lines yield `None` and are
    /// skipped (the log is shared with a busy writer, torn lines happen).
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(4, ' ');
        let timestamp = parts.next()?.parse::<DateTime<Utc>>().ok()?;
        let verdict = parts.next()?;
        let status = parts.next().and_then(|s| s.parse::<u16>().ok());
        let detail = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        match verdict {
            "OK" => Some(Self {
                timestamp,
                ok: true,
                status,
                detail,
            }),
            "FAIL" => Some(Self {
                timestamp,
                ok: false,
                status,
                detail,
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProbeLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.ok { "OK" } else { "FAIL" };
        write!(f, "{} {verdict}", self.timestamp.to_rfc3339())?;
        if let Some(status) = self.status {
            write!(f, " {status}")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " {detail}")?;
        }
        Ok(())
    }
}

/// Which probe workload an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeRole {
    Client,
    Server,
}

impl ProbeRole {
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Client => PROBE_CLIENT_UNIT,
            Self::Server => PROBE_SERVER_UNIT,
        }
    }
}

impl std::fmt::Display for ProbeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.unit())
    }
}

/// Narrow contract the protocol needs from the probe pair. Kept this
/// small so the protocol itself is testable against a fake.
pub trait ProbeHarness {
    fn restart(&mut self, role: ProbeRole) -> Result<(), ClusterError>;
    fn wait_ready(&mut self, role: ProbeRole, timeout_secs: u64) -> Result<(), ClusterError>;
    fn reset_log(&mut self) -> Result<(), ClusterError>;
    fn read_log(&mut self) -> Result<Vec<ProbeLogEntry>, ClusterError>;
}

/// A verification step that observed zero failures.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub name: &'static str,
    pub observed: usize,
}

/// Result of a full three-step pass.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub label: String,
    pub steps: Vec<StepOutcome>,
    pub completed_at: DateTime<Utc>,
}

/// A step observed failing requests. Carries the full failing entries
/// (timestamps, HTTP status, transport error text); the operator gets
/// no second chance to look at them.
#[derive(Debug, Clone, thiserror::Error)]
#[error("verification step '{step}' observed {} failing request(s) out of {observed}", .failures.len())]
pub struct VerificationFailure {
    pub step: &'static str,
    pub observed: usize,
    pub failures: Vec<ProbeLogEntry>,
}

struct StepSpec {
    name: &'static str,
    restart: Option<ProbeRole>,
}

const STEPS: [StepSpec; 3] = [
    StepSpec {
        name: "old-client/old-server",
        restart: None,
    },
    StepSpec {
        name: "new-client/old-server",
        restart: Some(ProbeRole::Client),
    },
    StepSpec {
        name: "new-client/new-server",
        restart: Some(ProbeRole::Server),
    },
];

/// Drive the three-step protocol. Each step: optional restart + bounded
/// readiness wait, log reset, a settle-sized observation window, then a
/// zero-failure assertion over the window.
///
/// The observation window must span several of the probe's one-second
/// send intervals: log resets race with in-flight appends, so a
/// too-small window can read an empty snapshot and prove nothing.
pub fn verify_phase(
    harness: &mut dyn ProbeHarness,
    label: &str,
    settle_secs: u64,
    ready_timeout_secs: u64,
) -> Result<VerificationReport, RotationError> {
    let mut steps = Vec::with_capacity(STEPS.len());

    for spec in &STEPS {
        tracing::info!(label, step = spec.name, "Verification step starting");

        if let Some(role) = spec.restart {
            harness.restart(role)?;
            match harness.wait_ready(role, ready_timeout_secs) {
                Ok(()) => {}
                Err(ClusterError::RolloutTimeout { unit, secs }) => {
                    return Err(RotationError::ReadyTimeout { unit, secs });
                }
                Err(e) => return Err(e.into()),
            }
        }

        harness.reset_log()?;
        std::thread::sleep(Duration::from_secs(settle_secs));
        let entries = harness.read_log()?;

        let failures: Vec<ProbeLogEntry> =
            entries.iter().filter(|e| !e.ok).cloned().collect();
        if !failures.is_empty() {
            tracing::error!(
                label,
                step = spec.name,
                failing = failures.len(),
                observed = entries.len(),
                "Verification step failed"
            );
            return Err(VerificationFailure {
                step: spec.name,
                observed: entries.len(),
                failures,
            }
            .into());
        }

        tracing::info!(
            label,
            step = spec.name,
            observed = entries.len(),
            "Verification step passed"
        );
        steps.push(StepOutcome {
            name: spec.name,
            observed: entries.len(),
        });
    }

    Ok(VerificationReport {
        label: label.to_string(),
        steps,
        completed_at: Utc::now(),
    })
}

// ── Workload-backed harness ──────────────────────────────────────────

/// Probe harness over the real workload orchestrator. The probe pair is
/// reached only by restart and by reading/resetting its log file — never
/// by direct RPC.
pub struct WorkloadProbeHarness<'a> {
    workloads: &'a dyn WorkloadApi,
}

impl<'a> WorkloadProbeHarness<'a> {
    pub fn new(workloads: &'a dyn WorkloadApi) -> Self {
        Self { workloads }
    }
}

impl ProbeHarness for WorkloadProbeHarness<'_> {
    fn restart(&mut self, role: ProbeRole) -> Result<(), ClusterError> {
        self.workloads.rolling_restart(role.unit())
    }

    fn wait_ready(&mut self, role: ProbeRole, timeout_secs: u64) -> Result<(), ClusterError> {
        self.workloads.wait_ready(role.unit(), timeout_secs)
    }

    fn reset_log(&mut self) -> Result<(), ClusterError> {
        self.workloads
            .exec(PROBE_CLIENT_UNIT, &format!(": > {PROBE_LOG_PATH}"))?;
        Ok(())
    }

    fn read_log(&mut self) -> Result<Vec<ProbeLogEntry>, ClusterError> {
        let raw = self.workloads.exec(
            PROBE_CLIENT_UNIT,
            &format!("cat {PROBE_LOG_PATH} 2>/dev/null || true"),
        )?;
        Ok(raw.lines().filter_map(ProbeLogEntry::parse).collect())
    }
}
