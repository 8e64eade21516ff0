//! Core of the root rotation: the trust state machine, the phase
//! transition executor, the connectivity verification protocol, and the
//! snapshot/rollback manager.
//!
//! The flow is strictly operator-driven: every transition is proposed
//! (pure), confirmed by the caller, committed against the cluster config
//! store, and then empirically verified by driving a probe pair through
//! every certificate-age pairing. Nothing in this crate retries
//! automatically — failures surface with full context and wait for an
//! explicit next command.

pub mod audit;
pub mod error;
pub mod executor;
pub mod phase;
pub mod snapshot;
pub mod state;
pub mod verify;

pub use error::RotationError;
pub use executor::{
    commit_transition, load_materials, propose_transition, read_back_anchors, AppliedConfig,
    RotationMaterials, TransitionPlan,
};
pub use phase::{infer_phase, signing_config_for, ConfigSpec, Phase, Signer};
pub use snapshot::{load_snapshot, rollback, take_snapshot, Snapshot};
pub use state::{load_state, save_state, RotationState};
pub use verify::{
    verify_phase, ProbeHarness, ProbeLogEntry, ProbeRole, VerificationFailure, VerificationReport,
    WorkloadProbeHarness,
};
