//! Certificate material store for the root rotation.
//!
//! Generates the two root identities and the intermediate signing
//! identity (rcgen), assembles order-preserving trust bundles, detects
//! and normalizes the two representations of the currently-live root,
//! and owns the on-disk workspace layout everything is persisted under.

pub mod bundle;
pub mod error;
pub mod identity;
pub mod source;
pub mod workdir;

pub use bundle::{anchor_ders, build_trust_bundle, TrustBundle};
pub use error::PkiError;
pub use identity::{
    create_intermediate_identity, create_root_identity, fingerprint_sha256, verify_issued_by,
    IntermediateIdentity, RootId, RootIdentity,
};
pub use source::{detect_root_source, extract_current_root, CurrentRootSource};
pub use workdir::RotationWorkspace;
