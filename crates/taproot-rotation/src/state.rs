//! Declared-phase persistence.
//!
//! The current phase is an explicit value the operator's commands carry
//! forward, persisted in the workspace as `state.json`. The live
//! bundle's anchor count is never the source of truth — it survives
//! only as the `status` command's diagnostic cross-check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taproot_pki::RotationWorkspace;

use crate::error::RotationError;
use crate::phase::Phase;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationState {
    pub phase: Phase,
    pub updated_at: DateTime<Utc>,
}

/// Load the declared phase, `None` before `prepare` has run.
pub fn load_state(ws: &RotationWorkspace) -> Result<Option<RotationState>, RotationError> {
    Ok(taproot_common::persist::read_json_if_exists(
        &ws.state_path(),
    )?)
}

/// Persist a newly-declared phase.
pub fn save_state(ws: &RotationWorkspace, phase: Phase) -> Result<RotationState, RotationError> {
    let state = RotationState {
        phase,
        updated_at: Utc::now(),
    };
    taproot_common::persist::write_json_pretty(&ws.state_path(), &state)?;
    tracing::info!(%phase, "Declared phase updated");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taproot_common::test::scratch_dir;

    #[test]
    fn state_is_absent_before_prepare() {
        let ws = RotationWorkspace::new(scratch_dir("state"));
        assert!(load_state(&ws).unwrap().is_none());
    }

    #[test]
    fn state_roundtrips() {
        let ws = RotationWorkspace::new(scratch_dir("state-rt"));
        save_state(&ws, Phase::Phase2).unwrap();

        let state = load_state(&ws).unwrap().unwrap();
        assert_eq!(state.phase, Phase::Phase2);
    }

    #[test]
    fn save_overwrites_previous_phase() {
        let ws = RotationWorkspace::new(scratch_dir("state-ow"));
        save_state(&ws, Phase::Phase1).unwrap();
        save_state(&ws, Phase::Phase2).unwrap();

        let state = load_state(&ws).unwrap().unwrap();
        assert_eq!(state.phase, Phase::Phase2);
    }
}
