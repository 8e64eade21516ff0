//! On-disk rotation workspace layout.
//!
//! Everything the rotation produces or consumes lives under one work
//! directory, laid out to match the legacy tooling bit-for-bit:
//!
//! ```text
//! <workdir>/
//!   backup/                     pre-rotation signing config snapshot
//!   rootA/                      current root + current signing identity
//!     root-cert.pem
//!     root-key.pem
//!   rootB/                      new root
//!     root-cert.pem
//!     root-key.pem
//!     intermediate/             new signing identity
//!       ca-cert.pem
//!       ca-key.pem
//!       cert-chain.pem          intermediate ∥ root B
//!       root-cert.pem           its own copy of root B
//!   trust-bundle-ab.pem         root A ∥ root B
//!   trust-bundle-abb.pem        root A ∥ root B ∥ root B
//!   state.json                  declared current phase
//!   audit.log                   append-only operation log
//! ```
//!
//! Private keys are written with 0600 permissions on Unix.

use std::path::{Path, PathBuf};

use crate::bundle::build_trust_bundle;
use crate::error::PkiError;
use crate::identity::{
    fingerprint_from_pem, not_after_from_pem, IntermediateIdentity, RootId, RootIdentity,
};

const BACKUP_DIR: &str = "backup";
const ROOT_A_DIR: &str = "rootA";
const ROOT_B_DIR: &str = "rootB";
const INTERMEDIATE_DIR: &str = "intermediate";

const ROOT_CERT_FILE: &str = "root-cert.pem";
const ROOT_KEY_FILE: &str = "root-key.pem";
const INT_CERT_FILE: &str = "ca-cert.pem";
const INT_KEY_FILE: &str = "ca-key.pem";
const INT_CHAIN_FILE: &str = "cert-chain.pem";

const TRUST_AB_FILE: &str = "trust-bundle-ab.pem";
const TRUST_ABB_FILE: &str = "trust-bundle-abb.pem";

const STATE_FILE: &str = "state.json";
const AUDIT_FILE: &str = "audit.log";

/// Handle to the rotation work directory.
#[derive(Debug, Clone)]
pub struct RotationWorkspace {
    root: PathBuf,
}

impl RotationWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    pub fn root_dir(&self, id: RootId) -> PathBuf {
        match id {
            RootId::A => self.root.join(ROOT_A_DIR),
            RootId::B => self.root.join(ROOT_B_DIR),
        }
    }

    pub fn intermediate_dir(&self) -> PathBuf {
        self.root_dir(RootId::B).join(INTERMEDIATE_DIR)
    }

    pub fn trust_ab_path(&self) -> PathBuf {
        self.root.join(TRUST_AB_FILE)
    }

    pub fn trust_abb_path(&self) -> PathBuf {
        self.root.join(TRUST_ABB_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn audit_path(&self) -> PathBuf {
        self.root.join(AUDIT_FILE)
    }

    /// Create the directory skeleton.
    pub fn ensure_layout(&self) -> Result<(), PkiError> {
        std::fs::create_dir_all(self.backup_dir())?;
        std::fs::create_dir_all(self.root_dir(RootId::A))?;
        std::fs::create_dir_all(self.intermediate_dir())?;
        Ok(())
    }

    /// True once `prepare` has populated the workspace.
    pub fn is_prepared(&self) -> bool {
        self.root_dir(RootId::A).join(ROOT_CERT_FILE).exists()
            && self.intermediate_dir().join(INT_CERT_FILE).exists()
            && self.trust_ab_path().exists()
            && self.trust_abb_path().exists()
    }

    /// Persist a root identity under its directory.
    pub fn write_root(&self, root: &RootIdentity) -> Result<(), PkiError> {
        let dir = self.root_dir(root.id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(ROOT_CERT_FILE), &root.cert_pem)?;
        write_key(&dir.join(ROOT_KEY_FILE), &root.key_pem)?;
        tracing::info!(root = %root.id, path = %dir.display(), "Root identity written");
        Ok(())
    }

    /// Load a root identity back from its directory.
    pub fn read_root(&self, id: RootId) -> Result<RootIdentity, PkiError> {
        let dir = self.root_dir(id);
        let cert_pem = std::fs::read_to_string(dir.join(ROOT_CERT_FILE))?;
        let key_pem = std::fs::read_to_string(dir.join(ROOT_KEY_FILE))?;
        Ok(RootIdentity {
            id,
            not_after: not_after_from_pem(&cert_pem)?,
            fingerprint: fingerprint_from_pem(&cert_pem)?,
            cert_pem,
            key_pem,
        })
    }

    /// Persist the new intermediate under `rootB/intermediate/`, with its
    /// own copy of the issuing root.
    pub fn write_intermediate(
        &self,
        intermediate: &IntermediateIdentity,
        issuing_root: &RootIdentity,
    ) -> Result<(), PkiError> {
        let dir = self.intermediate_dir();
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(INT_CERT_FILE), &intermediate.cert_pem)?;
        write_key(&dir.join(INT_KEY_FILE), &intermediate.key_pem)?;
        std::fs::write(dir.join(INT_CHAIN_FILE), &intermediate.chain_pem)?;
        std::fs::write(dir.join(ROOT_CERT_FILE), &issuing_root.cert_pem)?;
        tracing::info!(path = %dir.display(), "Intermediate identity written");
        Ok(())
    }

    pub fn read_intermediate(&self) -> Result<IntermediateIdentity, PkiError> {
        let dir = self.intermediate_dir();
        let cert_pem = std::fs::read_to_string(dir.join(INT_CERT_FILE))?;
        let key_pem = std::fs::read_to_string(dir.join(INT_KEY_FILE))?;
        let chain_pem = std::fs::read_to_string(dir.join(INT_CHAIN_FILE))?;
        Ok(IntermediateIdentity {
            issuer: RootId::B,
            not_after: not_after_from_pem(&cert_pem)?,
            fingerprint: fingerprint_from_pem(&cert_pem)?,
            cert_pem,
            key_pem,
            chain_pem,
        })
    }

    /// Precompute and persist the two transition bundles: A∥B and A∥B∥B.
    pub fn write_trust_bundles(
        &self,
        root_a: &RootIdentity,
        root_b: &RootIdentity,
    ) -> Result<(), PkiError> {
        let ab = build_trust_bundle(&[root_a, root_b]);
        let abb = build_trust_bundle(&[root_a, root_b, root_b]);
        std::fs::write(self.trust_ab_path(), ab.to_concatenated_pem())?;
        std::fs::write(self.trust_abb_path(), abb.to_concatenated_pem())?;
        Ok(())
    }

    pub fn read_trust_ab(&self) -> Result<String, PkiError> {
        Ok(std::fs::read_to_string(self.trust_ab_path())?)
    }

    pub fn read_trust_abb(&self) -> Result<String, PkiError> {
        Ok(std::fs::read_to_string(self.trust_abb_path())?)
    }
}

fn write_key(path: &Path, key_pem: &str) -> Result<(), PkiError> {
    std::fs::write(path, key_pem)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::anchor_ders;
    use crate::identity::{create_intermediate_identity, create_root_identity};
    use taproot_common::test::scratch_dir;

    fn prepared_workspace() -> (RotationWorkspace, RootIdentity, RootIdentity) {
        let ws = RotationWorkspace::new(scratch_dir("workdir"));
        ws.ensure_layout().unwrap();
        let a = create_root_identity(RootId::A, 3650).unwrap();
        let b = create_root_identity(RootId::B, 3650).unwrap();
        (ws, a, b)
    }

    #[test]
    fn layout_contains_expected_directories() {
        let (ws, _, _) = prepared_workspace();
        assert!(ws.backup_dir().is_dir());
        assert!(ws.root_dir(RootId::A).is_dir());
        assert!(ws.root_dir(RootId::B).is_dir());
        assert!(ws.intermediate_dir().is_dir());
        assert!(ws.intermediate_dir().starts_with(ws.root_dir(RootId::B)));
    }

    #[test]
    fn root_roundtrips_through_disk() {
        let (ws, a, _) = prepared_workspace();
        ws.write_root(&a).unwrap();

        let back = ws.read_root(RootId::A).unwrap();
        assert_eq!(back.cert_pem, a.cert_pem);
        assert_eq!(back.key_pem, a.key_pem);
        assert_eq!(back.fingerprint, a.fingerprint);
    }

    #[cfg(unix)]
    #[test]
    fn private_keys_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (ws, a, _) = prepared_workspace();
        ws.write_root(&a).unwrap();

        let mode = std::fs::metadata(ws.root_dir(RootId::A).join("root-key.pem"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn intermediate_roundtrips_with_root_copy() {
        let (ws, _, b) = prepared_workspace();
        let intermediate = create_intermediate_identity(&b, 365).unwrap();
        ws.write_intermediate(&intermediate, &b).unwrap();

        let back = ws.read_intermediate().unwrap();
        assert_eq!(back.cert_pem, intermediate.cert_pem);
        assert_eq!(back.chain_pem, intermediate.chain_pem);

        let root_copy =
            std::fs::read_to_string(ws.intermediate_dir().join("root-cert.pem")).unwrap();
        assert_eq!(root_copy, b.cert_pem);
    }

    #[test]
    fn bundle_files_have_expected_anchor_counts() {
        let (ws, a, b) = prepared_workspace();
        ws.write_trust_bundles(&a, &b).unwrap();

        let ab = anchor_ders(ws.read_trust_ab().unwrap().as_bytes()).unwrap();
        assert_eq!(ab.len(), 2);

        let abb = anchor_ders(ws.read_trust_abb().unwrap().as_bytes()).unwrap();
        assert_eq!(abb.len(), 3);
        assert_eq!(abb[1], abb[2], "root B must appear twice, verbatim");
    }

    #[test]
    fn is_prepared_requires_full_population() {
        let (ws, a, b) = prepared_workspace();
        assert!(!ws.is_prepared());

        ws.write_root(&a).unwrap();
        ws.write_root(&b).unwrap();
        let intermediate = create_intermediate_identity(&b, 365).unwrap();
        ws.write_intermediate(&intermediate, &b).unwrap();
        assert!(!ws.is_prepared());

        ws.write_trust_bundles(&a, &b).unwrap();
        assert!(ws.is_prepared());
    }
}
