//! Trust bundle assembly and comparison.
//!
//! A trust bundle is an ordered sequence of root certificates, rendered
//! as concatenated PEM. Order is preserved and duplicates are NOT
//! deduplicated: the live transition format requires the exact legacy
//! byte layout, including the doubled new-root entry in the three-anchor
//! bundle, so the sequence is reproduced verbatim.

use crate::error::PkiError;
use crate::identity::{RootId, RootIdentity};

/// An ordered sequence of trust anchors.
#[derive(Debug, Clone)]
pub struct TrustBundle {
    anchors: Vec<(RootId, String)>,
}

/// Build a bundle from roots in the given order. Duplicates allowed.
pub fn build_trust_bundle(roots: &[&RootIdentity]) -> TrustBundle {
    TrustBundle {
        anchors: roots
            .iter()
            .map(|r| (r.id, r.cert_pem.clone()))
            .collect(),
    }
}

impl TrustBundle {
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn anchor_ids(&self) -> Vec<RootId> {
        self.anchors.iter().map(|(id, _)| *id).collect()
    }

    /// Render as concatenated PEM, order-preserving.
    pub fn to_concatenated_pem(&self) -> String {
        let mut out = String::new();
        for (_, cert_pem) in &self.anchors {
            out.push_str(cert_pem);
            if !cert_pem.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Parse the DER bytes of every CERTIFICATE block in a concatenated PEM,
/// in order. This is the comparison form for read-back checks: two
/// bundles are the same configuration iff their DER sequences are equal.
pub fn anchor_ders(pem_bytes: &[u8]) -> Result<Vec<Vec<u8>>, PkiError> {
    let blocks = pem::parse_many(pem_bytes)?;
    let ders: Vec<Vec<u8>> = blocks
        .into_iter()
        .filter(|b| b.tag() == "CERTIFICATE")
        .map(|b| b.into_contents())
        .collect();
    if ders.is_empty() {
        return Err(PkiError::InvalidPem(
            "no CERTIFICATE blocks found".to_string(),
        ));
    }
    Ok(ders)
}
