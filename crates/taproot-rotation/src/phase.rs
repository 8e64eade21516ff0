//! The trust state machine.
//!
//! Four totally-ordered phases walk the mesh from trusting only root A
//! to trusting only root B. The trust bundle grows monotonically until
//! the final phase, which is the sole destructive step: it removes A's
//! anchor, and only workloads already holding B-signed certificates
//! survive it. Every phase maps to exactly one signing configuration.

use serde::{Deserialize, Serialize};

use taproot_pki::RootId;

/// A named point in the rotation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Pre-rotation: root A signs, only A trusted.
    Initial,
    /// Root B's anchor added; A still signs.
    Phase1,
    /// B's intermediate signs; bundle carries A and B (B doubled).
    Phase2,
    /// A's anchor removed; B-only trust.
    Phase3,
}

/// Which identity signs new workload certificates in a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signer {
    /// The pre-rotation root A (or the intermediate it already uses).
    RootA,
    /// The freshly-issued intermediate under root B.
    IntermediateB,
}

/// The (signer, anchors) pair a phase requires to be live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSpec {
    pub signer: Signer,
    pub anchors: &'static [RootId],
}

/// The phase table. One row per phase; the executor builds the concrete
/// record from this plus the workspace materials.
pub fn signing_config_for(phase: Phase) -> ConfigSpec {
    use RootId::{A, B};
    match phase {
        Phase::Initial => ConfigSpec {
            signer: Signer::RootA,
            anchors: &[A],
        },
        Phase::Phase1 => ConfigSpec {
            signer: Signer::RootA,
            anchors: &[A, B],
        },
        Phase::Phase2 => ConfigSpec {
            signer: Signer::IntermediateB,
            anchors: &[A, B, B],
        },
        Phase::Phase3 => ConfigSpec {
            signer: Signer::IntermediateB,
            anchors: &[B],
        },
    }
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Initial, Phase::Phase1, Phase::Phase2, Phase::Phase3];

    /// The next phase in the forward order, if any.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Initial => Some(Phase::Phase1),
            Phase::Phase1 => Some(Phase::Phase2),
            Phase::Phase2 => Some(Phase::Phase3),
            Phase::Phase3 => None,
        }
    }

    /// Only the final transition narrows the trust bundle. Every earlier
    /// transition adds trust or changes the signer while old trust
    /// remains, and is non-disruptive by construction.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Phase::Phase3)
    }

    /// Operator-facing entry condition, shown before confirmation.
    pub fn entry_condition(&self) -> &'static str {
        match self {
            Phase::Initial => "none",
            Phase::Phase1 => "root B and its intermediate generated in the workspace",
            Phase::Phase2 => "phase1 applied, propagated, and verified",
            Phase::Phase3 => {
                "phase2 applied, and the operator attests every live workload \
                 certificate is signed under root B"
            }
        }
    }

    /// Parse operator input.
    pub fn from_str_loose(s: &str) -> Option<Phase> {
        match s.to_lowercase().as_str() {
            "initial" | "0" => Some(Phase::Initial),
            "phase1" | "1" => Some(Phase::Phase1),
            "phase2" | "2" => Some(Phase::Phase2),
            "phase3" | "3" => Some(Phase::Phase3),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Initial => write!(f, "initial"),
            Phase::Phase1 => write!(f, "phase1"),
            Phase::Phase2 => write!(f, "phase2"),
            Phase::Phase3 => write!(f, "phase3"),
        }
    }
}

impl std::fmt::Display for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signer::RootA => write!(f, "root A"),
            Signer::IntermediateB => write!(f, "intermediate of B"),
        }
    }
}

/// Diagnostic phase inference from a live bundle's anchors.
///
/// Never the source of truth (the declared phase in `state.json` is) —
/// this exists so `status` can cross-check what the cluster actually
/// holds. One-anchor bundles are ambiguous between Initial and Phase3
/// and are disambiguated against the known root certificates when the
/// workspace has them.
pub fn infer_phase(
    anchors: &[Vec<u8>],
    root_a_der: Option<&[u8]>,
    root_b_der: Option<&[u8]>,
) -> Option<Phase> {
    match anchors.len() {
        2 => Some(Phase::Phase1),
        3 => Some(Phase::Phase2),
        1 => {
            let anchor = anchors[0].as_slice();
            if root_b_der == Some(anchor) {
                Some(Phase::Phase3)
            } else if root_a_der == Some(anchor) || root_b_der.is_none() {
                Some(Phase::Initial)
            } else {
                None
            }
        }
        _ => None,
    }
}
