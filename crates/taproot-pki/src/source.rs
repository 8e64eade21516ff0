//! Detection and normalization of the currently-live root.
//!
//! A mesh that has never been given an operator-managed CA runs on a
//! self-signed root the control plane bootstrapped for itself; a mesh
//! with a plugged-in CA keeps its signing identity in the operator
//! record. These are two on-wire shapes of the same logical thing — the
//! identity that signs workload certificates today. The variant is
//! resolved once, here, so nothing downstream branches on it.

use taproot_cluster::secret::{
    BUILTIN_RECORD, FIELD_BUILTIN_CERT, FIELD_BUILTIN_KEY, FIELD_SIGNING_CERT, FIELD_SIGNING_KEY,
    SIGNING_RECORD,
};
use taproot_cluster::{ConfigStore, SecretRecord};

use crate::error::PkiError;
use crate::identity::{fingerprint_from_pem, not_after_from_pem, RootId, RootIdentity};

/// Where the live root was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentRootSource {
    /// Operator-managed signing record (plugged-in CA).
    OperatorManaged,
    /// Control plane's bootstrap self-signed root.
    BuiltIn,
}

impl std::fmt::Display for CurrentRootSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OperatorManaged => write!(f, "operator-managed"),
            Self::BuiltIn => write!(f, "built-in self-signed"),
        }
    }
}

impl CurrentRootSource {
    /// Name of the cluster record this source lives in.
    pub fn record_name(&self) -> &'static str {
        match self {
            Self::OperatorManaged => SIGNING_RECORD,
            Self::BuiltIn => BUILTIN_RECORD,
        }
    }
}

/// Probe the store for the live root, operator-managed record first.
///
/// Neither record present is `ConfigurationNotFound` — fatal, no retry:
/// a mesh with no discoverable root is not a mesh this tool can rotate.
pub fn detect_root_source(
    store: &dyn ConfigStore,
) -> Result<(CurrentRootSource, SecretRecord), PkiError> {
    if let Some(record) = store.get(SIGNING_RECORD)? {
        tracing::info!(record = SIGNING_RECORD, "Live root: operator-managed record");
        return Ok((CurrentRootSource::OperatorManaged, record));
    }
    if let Some(record) = store.get(BUILTIN_RECORD)? {
        tracing::info!(record = BUILTIN_RECORD, "Live root: built-in self-signed record");
        return Ok((CurrentRootSource::BuiltIn, record));
    }
    Err(PkiError::ConfigurationNotFound)
}

/// Extract the live signing identity, normalized to a `RootIdentity`
/// with id A regardless of which representation it came from.
pub fn extract_current_root(store: &dyn ConfigStore) -> Result<RootIdentity, PkiError> {
    let (source, record) = detect_root_source(store)?;

    let (cert_field, key_field) = match source {
        CurrentRootSource::OperatorManaged => (FIELD_SIGNING_CERT, FIELD_SIGNING_KEY),
        CurrentRootSource::BuiltIn => (FIELD_BUILTIN_CERT, FIELD_BUILTIN_KEY),
    };

    let record_name = source.record_name();
    let cert_pem = String::from_utf8(record.require_field(record_name, cert_field)?.to_vec())
        .map_err(|e| PkiError::InvalidPem(e.to_string()))?;
    let key_pem = String::from_utf8(record.require_field(record_name, key_field)?.to_vec())
        .map_err(|e| PkiError::InvalidPem(e.to_string()))?;

    let not_after = not_after_from_pem(&cert_pem)?;
    let fingerprint = fingerprint_from_pem(&cert_pem)?;
    tracing::info!(%source, fingerprint, "Current root extracted");

    Ok(RootIdentity {
        id: RootId::A,
        cert_pem,
        key_pem,
        not_after,
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::create_root_identity;
    use taproot_cluster::MemoryStore;

    fn builtin_record(root: &RootIdentity) -> SecretRecord {
        let mut record = SecretRecord::new();
        record
            .fields
            .insert(FIELD_BUILTIN_CERT.to_string(), root.cert_pem.clone().into_bytes());
        record
            .fields
            .insert(FIELD_BUILTIN_KEY.to_string(), root.key_pem.clone().into_bytes());
        record
    }

    #[test]
    fn neither_record_is_configuration_not_found() {
        let store = MemoryStore::new();
        let err = extract_current_root(&store).unwrap_err();
        assert!(matches!(err, PkiError::ConfigurationNotFound));
    }

    #[test]
    fn builtin_record_is_detected_and_normalized() {
        let store = MemoryStore::new();
        let root = create_root_identity(RootId::A, 3650).unwrap();
        store.insert(BUILTIN_RECORD, builtin_record(&root));

        let extracted = extract_current_root(&store).unwrap();
        assert_eq!(extracted.id, RootId::A);
        assert_eq!(extracted.cert_pem, root.cert_pem);
        assert_eq!(extracted.fingerprint, root.fingerprint);
    }

    #[test]
    fn operator_record_wins_over_builtin() {
        let store = MemoryStore::new();
        let plugged = create_root_identity(RootId::A, 3650).unwrap();
        let builtin = create_root_identity(RootId::A, 3650).unwrap();

        store.insert(
            SIGNING_RECORD,
            SecretRecord::signing_config(
                plugged.cert_pem.clone(),
                plugged.key_pem.clone(),
                plugged.cert_pem.clone(),
                plugged.cert_pem.clone(),
            ),
        );
        store.insert(BUILTIN_RECORD, builtin_record(&builtin));

        let (source, _) = detect_root_source(&store).unwrap();
        assert_eq!(source, CurrentRootSource::OperatorManaged);

        let extracted = extract_current_root(&store).unwrap();
        assert_eq!(extracted.fingerprint, plugged.fingerprint);
    }

    #[test]
    fn missing_key_field_is_surfaced() {
        let store = MemoryStore::new();
        let root = create_root_identity(RootId::A, 3650).unwrap();
        let mut record = builtin_record(&root);
        record.fields.remove(FIELD_BUILTIN_KEY);
        store.insert(BUILTIN_RECORD, record);

        let err = extract_current_root(&store).unwrap_err();
        assert!(matches!(err, PkiError::Cluster(_)));
    }
}
