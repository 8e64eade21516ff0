//! The cluster config store: named, namespaced records of byte-string
//! fields (Kubernetes secrets in the real implementation).
//!
//! The mesh control plane reads its signing identity and trust anchors
//! from one well-known record. Replacing that record is the unit of
//! atomic transition for a rotation — implemented as delete-then-recreate,
//! which leaves a short window with no record present (an accepted
//! limitation of the store, not something this layer hides).

use std::collections::BTreeMap;
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::ClusterError;
use crate::kubectl;

/// Record holding the mesh's operator-managed signing configuration.
pub const SIGNING_RECORD: &str = "mesh-ca-signing";

/// Record the control plane writes when it bootstraps its own
/// self-signed root (no operator-managed CA present).
pub const BUILTIN_RECORD: &str = "mesh-ca-builtin";

/// Certificate the control plane signs workload certificates with.
pub const FIELD_SIGNING_CERT: &str = "signing-cert.pem";
/// Private key for [`FIELD_SIGNING_CERT`]. Never logged.
pub const FIELD_SIGNING_KEY: &str = "signing-key.pem";
/// Concatenated root certificates trusted as anchors, order-preserving.
pub const FIELD_TRUST_BUNDLE: &str = "trust-bundle.pem";
/// Chain from the signing certificate up to its root.
pub const FIELD_CERT_CHAIN: &str = "cert-chain.pem";

/// Fields of the control plane's built-in self-signed root record.
pub const FIELD_BUILTIN_CERT: &str = "ca-cert.pem";
pub const FIELD_BUILTIN_KEY: &str = "ca-key.pem";

/// A named record of byte-string fields, as stored in the cluster.
///
/// Field order is stable (BTreeMap) so snapshots and comparisons are
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecretRecord {
    pub fields: BTreeMap<String, Vec<u8>>,
}

impl SecretRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the four-field signing configuration record.
    pub fn signing_config(
        signing_cert: impl Into<Vec<u8>>,
        signing_key: impl Into<Vec<u8>>,
        trust_bundle: impl Into<Vec<u8>>,
        cert_chain: impl Into<Vec<u8>>,
    ) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(FIELD_SIGNING_CERT.to_string(), signing_cert.into());
        fields.insert(FIELD_SIGNING_KEY.to_string(), signing_key.into());
        fields.insert(FIELD_TRUST_BUNDLE.to_string(), trust_bundle.into());
        fields.insert(FIELD_CERT_CHAIN.to_string(), cert_chain.into());
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&[u8]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// Fetch a field or fail with the record name in the error.
    pub fn require_field(&self, record: &str, name: &str) -> Result<&[u8], ClusterError> {
        self.field(name).ok_or_else(|| ClusterError::FieldMissing {
            record: record.to_string(),
            field: name.to_string(),
        })
    }
}

/// Narrow contract the rotation core uses to reach the cluster config
/// store. `replace` is delete-then-recreate; there is no partial update.
pub trait ConfigStore {
    /// Fetch a record, `None` if absent.
    fn get(&self, name: &str) -> Result<Option<SecretRecord>, ClusterError>;

    /// Replace a record as one logical unit (delete if present, recreate).
    fn replace(&self, name: &str, record: &SecretRecord) -> Result<(), ClusterError>;

    /// Delete a record. Absent records are not an error.
    fn delete(&self, name: &str) -> Result<(), ClusterError>;
}

// ── kubectl-backed store ─────────────────────────────────────────────

/// Config store backed by Kubernetes secrets in one namespace.
pub struct KubectlStore {
    namespace: String,
}

impl KubectlStore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn secret_manifest(&self, name: &str, record: &SecretRecord) -> String {
        let data: BTreeMap<&str, String> = record
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), BASE64.encode(v)))
            .collect();

        serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": name, "namespace": self.namespace },
            "type": "Opaque",
            "data": data,
        })
        .to_string()
    }
}

impl ConfigStore for KubectlStore {
    fn get(&self, name: &str) -> Result<Option<SecretRecord>, ClusterError> {
        let result = kubectl::run(&[
            "-n",
            &self.namespace,
            "get",
            "secret",
            name,
            "-o",
            "json",
        ]);

        let raw = match result {
            Ok(raw) => raw,
            Err(ClusterError::CommandFailed { detail, .. }) if detail.contains("NotFound") => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| ClusterError::MalformedResponse(e.to_string()))?;

        let mut record = SecretRecord::new();
        if let Some(data) = value.get("data").and_then(|d| d.as_object()) {
            for (key, encoded) in data {
                let encoded = encoded.as_str().ok_or_else(|| {
                    ClusterError::MalformedResponse(format!("field {key} is not a string"))
                })?;
                let bytes = BASE64
                    .decode(encoded)
                    .map_err(|e| ClusterError::MalformedResponse(format!("field {key}: {e}")))?;
                record.fields.insert(key.clone(), bytes);
            }
        }
        Ok(Some(record))
    }

    fn replace(&self, name: &str, record: &SecretRecord) -> Result<(), ClusterError> {
        self.delete(name)?;
        let manifest = self.secret_manifest(name, record);
        kubectl::run_with_stdin(&["-n", &self.namespace, "create", "-f", "-"], &manifest)?;
        tracing::info!(record = name, namespace = %self.namespace, "Record replaced");
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), ClusterError> {
        kubectl::run(&[
            "-n",
            &self.namespace,
            "delete",
            "secret",
            name,
            "--ignore-not-found",
        ])?;
        Ok(())
    }
}

// ── in-memory store (tests, dry runs) ────────────────────────────────

/// In-memory config store with the same replace semantics.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, SecretRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, SecretRecord>> {
        // Poisoning only matters if a writer panicked; the map is still
        // coherent for our delete/insert usage.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a record directly (test setup).
    pub fn insert(&self, name: &str, record: SecretRecord) {
        self.locked().insert(name.to_string(), record);
    }

    /// Byte-exact dump of all records, for idempotence assertions.
    pub fn dump(&self) -> BTreeMap<String, SecretRecord> {
        self.locked().clone()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<SecretRecord>, ClusterError> {
        Ok(self.locked().get(name).cloned())
    }

    fn replace(&self, name: &str, record: &SecretRecord) -> Result<(), ClusterError> {
        let mut records = self.locked();
        records.remove(name);
        records.insert(name.to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), ClusterError> {
        self.locked().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> SecretRecord {
        SecretRecord::signing_config(b"CERT".to_vec(), b"KEY".to_vec(), b"BUNDLE".to_vec(), b"CHAIN".to_vec())
    }

    #[test]
    fn signing_config_has_exactly_four_fields() {
        let record = sample_record();
        assert_eq!(record.fields.len(), 4);
        assert_eq!(record.field(FIELD_SIGNING_CERT), Some(&b"CERT"[..]));
        assert_eq!(record.field(FIELD_SIGNING_KEY), Some(&b"KEY"[..]));
        assert_eq!(record.field(FIELD_TRUST_BUNDLE), Some(&b"BUNDLE"[..]));
        assert_eq!(record.field(FIELD_CERT_CHAIN), Some(&b"CHAIN"[..]));
    }

    #[test]
    fn require_field_names_record_and_field() {
        let record = SecretRecord::new();
        let err = record.require_field("mesh-ca-signing", FIELD_TRUST_BUNDLE).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("mesh-ca-signing"));
        assert!(msg.contains(FIELD_TRUST_BUNDLE));
    }

    #[test]
    fn memory_store_get_absent_is_none() {
        let store = MemoryStore::new();
        assert!(store.get(SIGNING_RECORD).unwrap().is_none());
    }

    #[test]
    fn memory_store_replace_overwrites() {
        let store = MemoryStore::new();
        store.insert(SIGNING_RECORD, sample_record());

        let mut updated = sample_record();
        updated
            .fields
            .insert(FIELD_TRUST_BUNDLE.to_string(), b"NEW".to_vec());
        store.replace(SIGNING_RECORD, &updated).unwrap();

        let back = store.get(SIGNING_RECORD).unwrap().unwrap();
        assert_eq!(back.field(FIELD_TRUST_BUNDLE), Some(&b"NEW"[..]));
    }

    #[test]
    fn memory_store_delete_absent_is_ok() {
        let store = MemoryStore::new();
        store.delete("never-existed").unwrap();
    }

    #[test]
    fn kubectl_manifest_encodes_fields_base64() {
        let store = KubectlStore::new("mesh-system");
        let manifest = store.secret_manifest(SIGNING_RECORD, &sample_record());
        let value: serde_json::Value = serde_json::from_str(&manifest).unwrap();

        assert_eq!(value["kind"], "Secret");
        assert_eq!(value["metadata"]["name"], SIGNING_RECORD);
        assert_eq!(value["metadata"]["namespace"], "mesh-system");
        assert_eq!(value["data"][FIELD_SIGNING_CERT], BASE64.encode(b"CERT"));
    }
}
