//! Rotation error taxonomy.
//!
//! Nothing here is retried automatically. Trust decisions are
//! irreversible enough that every failure stops the run, surfaces its
//! full context, and waits for an explicit operator command.

use std::path::PathBuf;

use taproot_cluster::ClusterError;
use taproot_pki::PkiError;

use crate::phase::Phase;
use crate::verify::VerificationFailure;

#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error(transparent)]
    Pki(#[from] PkiError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(
        "applied trust bundle does not match the expected bundle\n  expected anchors: {expected:?}\n  actual anchors:   {actual:?}"
    )]
    ReadbackMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error(transparent)]
    Verification(#[from] VerificationFailure),

    /// A restart's readiness wait exceeded its bound. Distinct from a
    /// verification failure: it signals an orchestration problem, not a
    /// trust problem.
    #[error("workload {unit} did not become ready within {secs}s")]
    ReadyTimeout { unit: String, secs: u64 },

    #[error("a snapshot already exists at {0} — refusing to overwrite it")]
    SnapshotExists(PathBuf),

    #[error("no snapshot found at {0} — nothing to roll back to")]
    SnapshotMissing(PathBuf),

    #[error("workspace at {0} is not prepared — run `prepare` first")]
    NotPrepared(PathBuf),

    #[error("cannot advance from {current} to {requested}; the only valid next phase is {}",
            .current.next().map(|p| p.to_string()).unwrap_or_else(|| "none (rotation complete)".to_string()))]
    InvalidTarget { current: Phase, requested: Phase },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
