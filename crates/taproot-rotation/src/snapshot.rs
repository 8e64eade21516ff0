//! Pre-rotation snapshot and rollback.
//!
//! Exactly one snapshot exists per rotation: the signing configuration
//! as it stood before the first transition. It is the sole state
//! rollback needs, it is written once under `backup/`, and it is never
//! overwritten — a second `prepare` against a populated backup refuses.
//!
//! Rollback restores the snapshotted record through the same
//! delete-then-recreate path a forward transition uses, then reads every
//! field back and requires byte-identity.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taproot_cluster::secret::{BUILTIN_RECORD, SIGNING_RECORD};
use taproot_cluster::{ConfigStore, SecretRecord};
use taproot_pki::identity::fingerprint_sha256;
use taproot_pki::source::detect_root_source;
use taproot_pki::RotationWorkspace;

use crate::error::RotationError;

const MANIFEST_FILE: &str = "manifest.json";

/// Snapshot metadata, persisted next to the field files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub taken_at: DateTime<Utc>,
    /// Which record the snapshot came from (operator-managed or built-in).
    pub record_name: String,
    /// Field names, in stored order; each is a file in `backup/`.
    pub fields: Vec<String>,
}

/// An immutable copy of the pre-rotation signing configuration.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub manifest: SnapshotManifest,
    pub record: SecretRecord,
}

/// Capture the live configuration into `backup/`.
///
/// Fails with `SnapshotExists` if a snapshot is already present: the
/// pre-rotation state is the only state worth keeping, and overwriting
/// it mid-rotation would destroy the rollback target.
pub fn take_snapshot(
    store: &dyn ConfigStore,
    ws: &RotationWorkspace,
) -> Result<Snapshot, RotationError> {
    let backup_dir = ws.backup_dir();
    let manifest_path = backup_dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        return Err(RotationError::SnapshotExists(manifest_path));
    }

    let (source, record) = detect_root_source(store)?;
    std::fs::create_dir_all(&backup_dir)?;

    let mut fields = Vec::with_capacity(record.fields.len());
    for (name, bytes) in &record.fields {
        let path = backup_dir.join(name);
        std::fs::write(&path, bytes)?;
        set_readonly(&path)?;
        fields.push(name.clone());
    }

    let manifest = SnapshotManifest {
        taken_at: Utc::now(),
        record_name: source.record_name().to_string(),
        fields,
    };
    taproot_common::persist::write_json_pretty(&manifest_path, &manifest)?;
    set_readonly(&manifest_path)?;

    tracing::info!(
        record = %manifest.record_name,
        fields = manifest.fields.len(),
        path = %backup_dir.display(),
        "Pre-rotation snapshot taken"
    );

    Ok(Snapshot { manifest, record })
}

/// Load the snapshot back from `backup/`.
pub fn load_snapshot(ws: &RotationWorkspace) -> Result<Snapshot, RotationError> {
    let backup_dir = ws.backup_dir();
    let manifest_path = backup_dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(RotationError::SnapshotMissing(manifest_path));
    }

    let manifest: SnapshotManifest = taproot_common::persist::read_json(&manifest_path)?;
    let mut record = SecretRecord::new();
    for name in &manifest.fields {
        let bytes = std::fs::read(backup_dir.join(name))?;
        record.fields.insert(name.clone(), bytes);
    }

    Ok(Snapshot { manifest, record })
}

/// Restore the snapshotted configuration, from any phase.
///
/// If the snapshot came from the control plane's built-in root, the
/// operator-managed record created during the rotation is removed as
/// well, so the control plane falls back to its bootstrap identity.
pub fn rollback(
    store: &dyn ConfigStore,
    ws: &RotationWorkspace,
    settle: Duration,
) -> Result<Snapshot, RotationError> {
    let snapshot = load_snapshot(ws)?;
    let record_name = snapshot.manifest.record_name.as_str();

    tracing::warn!(record = record_name, "Rolling back to pre-rotation snapshot");
    store.replace(record_name, &snapshot.record)?;
    if record_name == BUILTIN_RECORD {
        store.delete(SIGNING_RECORD)?;
    }

    std::thread::sleep(settle);

    let live = store
        .get(record_name)?
        .ok_or_else(|| mismatch_error(&snapshot.record, &SecretRecord::new()))?;
    if live != snapshot.record {
        return Err(mismatch_error(&snapshot.record, &live));
    }

    tracing::info!(record = record_name, "Rollback applied and read back");
    Ok(snapshot)
}

fn mismatch_error(expected: &SecretRecord, actual: &SecretRecord) -> RotationError {
    let describe = |record: &SecretRecord| {
        record
            .fields
            .iter()
            .map(|(name, bytes)| format!("{name}={}", &fingerprint_sha256(bytes)[..12]))
            .collect::<Vec<_>>()
    };
    RotationError::ReadbackMismatch {
        expected: describe(expected),
        actual: describe(actual),
    }
}

fn set_readonly(path: &std::path::Path) -> std::io::Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(path, perms)
}
