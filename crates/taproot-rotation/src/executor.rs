//! Phase transition executor.
//!
//! Transitions are a two-step protocol so the human confirmation gate
//! stays a caller concern: `propose_transition` is pure and returns
//! exactly what would change; `commit_transition` applies it. A commit
//! replaces the signing record as one logical unit, sleeps a fixed
//! settle interval for data-plane propagation, then reads the trust
//! bundle back and compares it anchor-for-anchor against the plan. A
//! mismatch is fatal and never retried — the operator must inspect and
//! decide.
//!
//! The executor never infers the current phase from cluster state; the
//! caller supplies the declared phase and owns its persistence.

use std::time::Duration;

use chrono::{DateTime, Utc};

use taproot_cluster::secret::{FIELD_TRUST_BUNDLE, SIGNING_RECORD};
use taproot_cluster::{ConfigStore, SecretRecord};
use taproot_pki::bundle::anchor_ders;
use taproot_pki::identity::fingerprint_sha256;
use taproot_pki::{IntermediateIdentity, RootIdentity, RotationWorkspace};

use crate::error::RotationError;
use crate::phase::{signing_config_for, Phase, Signer};

/// Everything `propose_transition` needs, loaded once from the prepared
/// workspace.
#[derive(Debug)]
pub struct RotationMaterials {
    pub root_a: RootIdentity,
    pub root_b: RootIdentity,
    pub intermediate_b: IntermediateIdentity,
    pub trust_ab: String,
    pub trust_abb: String,
}

/// Load rotation materials from a prepared workspace.
pub fn load_materials(ws: &RotationWorkspace) -> Result<RotationMaterials, RotationError> {
    if !ws.is_prepared() {
        return Err(RotationError::NotPrepared(ws.path().to_path_buf()));
    }
    Ok(RotationMaterials {
        root_a: ws.read_root(taproot_pki::RootId::A)?,
        root_b: ws.read_root(taproot_pki::RootId::B)?,
        intermediate_b: ws.read_intermediate()?,
        trust_ab: ws.read_trust_ab()?,
        trust_abb: ws.read_trust_abb()?,
    })
}

/// A proposed transition: the full record that would be applied plus the
/// read-back expectation. Building one has no side effects.
#[derive(Debug)]
pub struct TransitionPlan {
    pub current: Phase,
    pub target: Phase,
    pub signer: Signer,
    pub destructive: bool,
    pub record: SecretRecord,
    expected_anchors: Vec<Vec<u8>>,
}

impl TransitionPlan {
    pub fn expected_anchor_count(&self) -> usize {
        self.expected_anchors.len()
    }

    pub fn expected_anchor_fingerprints(&self) -> Vec<String> {
        self.expected_anchors
            .iter()
            .map(|der| fingerprint_sha256(der))
            .collect()
    }
}

/// The read-back-confirmed result of a committed transition.
#[derive(Debug, Clone)]
pub struct AppliedConfig {
    pub phase: Phase,
    pub anchor_count: usize,
    pub applied_at: DateTime<Utc>,
}

/// Build the transition plan for `target`, given the declared current
/// phase. Only the immediate next phase is a valid target — transitions
/// are strictly forward and single-step.
pub fn propose_transition(
    materials: &RotationMaterials,
    current: Phase,
    target: Phase,
) -> Result<TransitionPlan, RotationError> {
    if current.next() != Some(target) {
        return Err(RotationError::InvalidTarget {
            current,
            requested: target,
        });
    }

    let spec = signing_config_for(target);
    let (signing_cert, signing_key, chain) = match spec.signer {
        Signer::RootA => (
            materials.root_a.cert_pem.clone(),
            materials.root_a.key_pem.clone(),
            materials.root_a.cert_pem.clone(),
        ),
        Signer::IntermediateB => (
            materials.intermediate_b.cert_pem.clone(),
            materials.intermediate_b.key_pem.clone(),
            materials.intermediate_b.chain_pem.clone(),
        ),
    };

    let bundle_pem = match target {
        Phase::Initial => materials.root_a.cert_pem.clone(),
        Phase::Phase1 => materials.trust_ab.clone(),
        Phase::Phase2 => materials.trust_abb.clone(),
        Phase::Phase3 => materials.root_b.cert_pem.clone(),
    };
    let expected_anchors = anchor_ders(bundle_pem.as_bytes())?;

    Ok(TransitionPlan {
        current,
        target,
        signer: spec.signer,
        destructive: target.is_destructive(),
        record: SecretRecord::signing_config(signing_cert, signing_key, bundle_pem, chain),
        expected_anchors,
    })
}

/// Apply a plan against the live store.
///
/// The record swap is delete-then-recreate, so a brief window with no
/// signing record exists; the control plane is expected to serve its
/// last-known-good configuration through it.
pub fn commit_transition(
    store: &dyn ConfigStore,
    plan: &TransitionPlan,
    settle: Duration,
) -> Result<AppliedConfig, RotationError> {
    tracing::info!(
        target = %plan.target,
        signer = %plan.signer,
        anchors = plan.expected_anchor_count(),
        "Applying signing configuration"
    );
    store.replace(SIGNING_RECORD, &plan.record)?;

    tracing::info!(secs = settle.as_secs(), "Waiting for propagation");
    std::thread::sleep(settle);

    let actual = read_back_anchors(store)?;
    if actual != plan.expected_anchors {
        return Err(RotationError::ReadbackMismatch {
            expected: plan.expected_anchor_fingerprints(),
            actual: actual.iter().map(|der| fingerprint_sha256(der)).collect(),
        });
    }

    tracing::info!(phase = %plan.target, "Transition applied and read back");
    Ok(AppliedConfig {
        phase: plan.target,
        anchor_count: plan.expected_anchors.len(),
        applied_at: Utc::now(),
    })
}

/// Fetch the live record's trust-bundle anchors. The rotation path reads
/// nothing else back.
pub fn read_back_anchors(store: &dyn ConfigStore) -> Result<Vec<Vec<u8>>, RotationError> {
    let record = store
        .get(SIGNING_RECORD)?
        .ok_or_else(|| RotationError::ReadbackMismatch {
            expected: Vec::new(),
            actual: Vec::new(),
        })?;
    let bundle = record.require_field(SIGNING_RECORD, FIELD_TRUST_BUNDLE)?;
    Ok(anchor_ders(bundle)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taproot_cluster::MemoryStore;
    use taproot_common::test::scratch_dir;
    use taproot_pki::{create_intermediate_identity, create_root_identity, RootId};

    fn prepared() -> (RotationWorkspace, RotationMaterials) {
        let ws = RotationWorkspace::new(scratch_dir("executor"));
        ws.ensure_layout().unwrap();

        let root_a = create_root_identity(RootId::A, 3650).unwrap();
        let root_b = create_root_identity(RootId::B, 3650).unwrap();
        let intermediate = create_intermediate_identity(&root_b, 365).unwrap();

        ws.write_root(&root_a).unwrap();
        ws.write_root(&root_b).unwrap();
        ws.write_intermediate(&intermediate, &root_b).unwrap();
        ws.write_trust_bundles(&root_a, &root_b).unwrap();

        let materials = load_materials(&ws).unwrap();
        (ws, materials)
    }

    #[test]
    fn unprepared_workspace_is_rejected() {
        let ws = RotationWorkspace::new(scratch_dir("executor-empty"));
        let err = load_materials(&ws).unwrap_err();
        assert!(matches!(err, RotationError::NotPrepared(_)));
    }

    #[test]
    fn propose_rejects_non_adjacent_targets() {
        let (_ws, materials) = prepared();

        let err = propose_transition(&materials, Phase::Initial, Phase::Phase2).unwrap_err();
        assert!(matches!(err, RotationError::InvalidTarget { .. }));

        let err = propose_transition(&materials, Phase::Phase2, Phase::Phase1).unwrap_err();
        assert!(matches!(err, RotationError::InvalidTarget { .. }));

        let err = propose_transition(&materials, Phase::Phase3, Phase::Phase3).unwrap_err();
        assert!(matches!(err, RotationError::InvalidTarget { .. }));
    }

    #[test]
    fn propose_is_side_effect_free() {
        let (_ws, materials) = prepared();
        let store = MemoryStore::new();

        propose_transition(&materials, Phase::Initial, Phase::Phase1).unwrap();
        assert!(store.dump().is_empty());
    }

    #[test]
    fn phase1_keeps_signer_and_widens_trust() {
        let (_ws, materials) = prepared();
        let plan = propose_transition(&materials, Phase::Initial, Phase::Phase1).unwrap();

        assert_eq!(plan.signer, Signer::RootA);
        assert!(!plan.destructive);
        assert_eq!(plan.expected_anchor_count(), 2);

        let cert = plan
            .record
            .field(taproot_cluster::secret::FIELD_SIGNING_CERT)
            .unwrap();
        assert_eq!(cert, materials.root_a.cert_pem.as_bytes());
    }

    #[test]
    fn phase2_switches_signer_to_intermediate() {
        let (_ws, materials) = prepared();
        let plan = propose_transition(&materials, Phase::Phase1, Phase::Phase2).unwrap();

        assert_eq!(plan.signer, Signer::IntermediateB);
        assert_eq!(plan.expected_anchor_count(), 3);

        let chain = plan
            .record
            .field(taproot_cluster::secret::FIELD_CERT_CHAIN)
            .unwrap();
        assert_eq!(chain, materials.intermediate_b.chain_pem.as_bytes());
    }

    #[test]
    fn phase3_is_destructive_and_b_only() {
        let (_ws, materials) = prepared();
        let plan = propose_transition(&materials, Phase::Phase2, Phase::Phase3).unwrap();

        assert!(plan.destructive);
        assert_eq!(plan.signer, Signer::IntermediateB);
        assert_eq!(plan.expected_anchor_count(), 1);
        assert_eq!(
            plan.expected_anchor_fingerprints(),
            vec![materials.root_b.fingerprint.clone()]
        );
    }

    #[test]
    fn commit_applies_and_reads_back() {
        let (_ws, materials) = prepared();
        let store = MemoryStore::new();

        let plan = propose_transition(&materials, Phase::Initial, Phase::Phase1).unwrap();
        let applied = commit_transition(&store, &plan, Duration::ZERO).unwrap();

        assert_eq!(applied.phase, Phase::Phase1);
        assert_eq!(applied.anchor_count, 2);

        let anchors = read_back_anchors(&store).unwrap();
        assert_eq!(anchors.len(), 2);
    }

    #[test]
    fn commit_detects_readback_mismatch() {
        let (_ws, materials) = prepared();

        // Store that silently swaps in a different bundle on write.
        struct TamperingStore {
            inner: MemoryStore,
            bundle_override: Vec<u8>,
        }
        impl ConfigStore for TamperingStore {
            fn get(&self, name: &str) -> Result<Option<SecretRecord>, taproot_cluster::ClusterError> {
                self.inner.get(name)
            }
            fn replace(
                &self,
                name: &str,
                record: &SecretRecord,
            ) -> Result<(), taproot_cluster::ClusterError> {
                let mut tampered = record.clone();
                tampered
                    .fields
                    .insert(FIELD_TRUST_BUNDLE.to_string(), self.bundle_override.clone());
                self.inner.replace(name, &tampered)
            }
            fn delete(&self, name: &str) -> Result<(), taproot_cluster::ClusterError> {
                self.inner.delete(name)
            }
        }

        let store = TamperingStore {
            inner: MemoryStore::new(),
            bundle_override: materials.root_a.cert_pem.clone().into_bytes(),
        };
        let plan = propose_transition(&materials, Phase::Initial, Phase::Phase1).unwrap();
        let err = commit_transition(&store, &plan, Duration::ZERO).unwrap_err();

        let RotationError::ReadbackMismatch { expected, actual } = err else {
            panic!("expected readback mismatch");
        };
        assert_eq!(expected.len(), 2);
        assert_eq!(actual.len(), 1);
    }

    #[test]
    fn read_back_never_mutates_the_store() {
        let (_ws, materials) = prepared();
        let store = MemoryStore::new();

        let plan = propose_transition(&materials, Phase::Initial, Phase::Phase1).unwrap();
        commit_transition(&store, &plan, Duration::ZERO).unwrap();

        let before = store.dump();
        read_back_anchors(&store).unwrap();
        read_back_anchors(&store).unwrap();
        assert_eq!(store.dump(), before, "inspection must be read-only");
    }

    #[test]
    fn full_forward_walk_reaches_b_only_trust() {
        let (_ws, materials) = prepared();
        let store = MemoryStore::new();

        let mut current = Phase::Initial;
        for target in [Phase::Phase1, Phase::Phase2, Phase::Phase3] {
            let plan = propose_transition(&materials, current, target).unwrap();
            commit_transition(&store, &plan, Duration::ZERO).unwrap();
            current = target;
        }

        let anchors = read_back_anchors(&store).unwrap();
        assert_eq!(anchors.len(), 1);
        assert_eq!(
            fingerprint_sha256(&anchors[0]),
            materials.root_b.fingerprint
        );
    }
}
