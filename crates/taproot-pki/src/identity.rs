//! Root and intermediate identity generation.
//!
//! Roots are self-signed ECDSA P-256 CA certificates created with
//! `rcgen`; the intermediate is issued by a root and carries
//! `pathlen:0`, separating root-key exposure from day-to-day workload
//! signing. Key material never leaves the returned structs and is never
//! logged.

use chrono::{DateTime, Duration, Utc};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

use crate::error::PkiError;

const ORGANIZATION: &str = "taproot";

/// Which of the two rotation roots an identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootId {
    A,
    B,
}

impl std::fmt::Display for RootId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// A self-signed trust anchor: certificate plus private key.
#[derive(Debug, Clone)]
pub struct RootIdentity {
    pub id: RootId,
    pub cert_pem: String,
    /// Private key PEM. Sensitive — written with 0600 permissions,
    /// never logged.
    pub key_pem: String,
    pub not_after: DateTime<Utc>,
    pub fingerprint: String,
}

/// A signing certificate issued by a root, used for workload issuance.
#[derive(Debug, Clone)]
pub struct IntermediateIdentity {
    pub issuer: RootId,
    pub cert_pem: String,
    pub key_pem: String,
    /// Intermediate followed by its issuing root, in that order.
    pub chain_pem: String,
    pub not_after: DateTime<Utc>,
    pub fingerprint: String,
}

/// SHA-256 fingerprint of DER bytes as lowercase hex.
pub fn fingerprint_sha256(der: &[u8]) -> String {
    let digest = Sha256::digest(der);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn to_offset(dt: DateTime<Utc>) -> ::time::OffsetDateTime {
    ::time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .unwrap_or(::time::OffsetDateTime::now_utc())
}

fn ca_params(common_name: &str, validity_days: i64, constraints: BasicConstraints) -> CertificateParams {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params
        .distinguished_name
        .push(DnType::OrganizationName, ORGANIZATION);

    params.is_ca = IsCa::Ca(constraints);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

    let not_before = Utc::now();
    let not_after = not_before + Duration::days(validity_days);
    params.not_before = to_offset(not_before);
    params.not_after = to_offset(not_after);
    params
}

/// Create a new self-signed root identity.
///
/// Roots assert `CA:true` with keyCertSign and cRLSign, unconstrained
/// path length.
pub fn create_root_identity(id: RootId, validity_days: i64) -> Result<RootIdentity, PkiError> {
    let key_pair = KeyPair::generate()?;
    let params = ca_params(
        &format!("Mesh Root CA {id}"),
        validity_days,
        BasicConstraints::Unconstrained,
    );
    let not_after = Utc::now() + Duration::days(validity_days);

    let cert = params.self_signed(&key_pair)?;
    let fingerprint = fingerprint_sha256(cert.der());

    tracing::info!(root = %id, fingerprint, "Root identity created");

    Ok(RootIdentity {
        id,
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        not_after,
        fingerprint,
    })
}

/// Create an intermediate signing identity issued by `root`.
///
/// Intermediates assert `CA:true` with `pathlen:0` in addition to
/// keyCertSign/cRLSign: they may sign workload certificates but not
/// further CAs. The returned chain is intermediate ∥ root.
pub fn create_intermediate_identity(
    root: &RootIdentity,
    validity_days: i64,
) -> Result<IntermediateIdentity, PkiError> {
    // Rebuild the issuer's rcgen state from its PEM key. The issuer
    // certificate only contributes its subject DN and signing key here,
    // both of which are deterministic for a given root.
    let issuer_key = KeyPair::from_pem(&root.key_pem)?;
    let issuer_params = ca_params(
        &format!("Mesh Root CA {}", root.id),
        1, // placeholder validity; the stored root cert is authoritative
        BasicConstraints::Unconstrained,
    );
    let issuer_cert = issuer_params.self_signed(&issuer_key)?;

    let key_pair = KeyPair::generate()?;
    let params = ca_params(
        &format!("Mesh Signing CA {}", root.id),
        validity_days,
        BasicConstraints::Constrained(0),
    );
    let not_after = Utc::now() + Duration::days(validity_days);

    let cert = params.signed_by(&key_pair, &issuer_cert, &issuer_key)?;
    let fingerprint = fingerprint_sha256(cert.der());
    let cert_pem = cert.pem();
    let chain_pem = format!("{cert_pem}{}", root.cert_pem);

    tracing::info!(issuer = %root.id, fingerprint, "Intermediate identity created");

    Ok(IntermediateIdentity {
        issuer: root.id,
        cert_pem,
        key_pem: key_pair.serialize_pem(),
        chain_pem,
        not_after,
        fingerprint,
    })
}

/// Verify that `cert_pem` was issued by `issuer_pem`.
///
/// Checks the issuer/subject DN binding and verifies the signature with
/// the issuer's public key. Used positively on the new intermediate and
/// negatively in tests (a chain from B must be rejected by a verifier
/// trusting only A).
pub fn verify_issued_by(cert_pem: &str, issuer_pem: &str) -> Result<(), PkiError> {
    let cert_der = ::pem::parse(cert_pem)?.into_contents();
    let issuer_der = ::pem::parse(issuer_pem)?.into_contents();

    let (_, cert) = X509Certificate::from_der(&cert_der)
        .map_err(|e| PkiError::Certificate(format!("subject parse: {e}")))?;
    let (_, issuer) = X509Certificate::from_der(&issuer_der)
        .map_err(|e| PkiError::Certificate(format!("issuer parse: {e}")))?;

    let mismatch = || PkiError::NotIssuedBy {
        subject: cert.subject().to_string(),
        issuer: issuer.subject().to_string(),
    };

    if cert.issuer().as_raw() != issuer.subject().as_raw() {
        return Err(mismatch());
    }
    cert.verify_signature(Some(issuer.public_key()))
        .map_err(|_| mismatch())
}

/// Read the notAfter timestamp out of a PEM certificate.
pub fn not_after_from_pem(cert_pem: &str) -> Result<DateTime<Utc>, PkiError> {
    let der = ::pem::parse(cert_pem)?.into_contents();
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| PkiError::Certificate(format!("parse: {e}")))?;
    let ts = cert.validity().not_after.timestamp();
    Ok(DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or_else(Utc::now))
}

/// Fingerprint of the first certificate in a PEM string.
pub fn fingerprint_from_pem(cert_pem: &str) -> Result<String, PkiError> {
    let der = ::pem::parse(cert_pem)?.into_contents();
    Ok(fingerprint_sha256(&der))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_identity_is_self_signed_ca() {
        let root = create_root_identity(RootId::A, 3650).unwrap();
        assert!(root.cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(root.key_pem.contains("BEGIN PRIVATE KEY"));
        assert_eq!(root.fingerprint.len(), 64);

        // A self-signed cert validates against itself
        verify_issued_by(&root.cert_pem, &root.cert_pem).unwrap();
    }

    #[test]
    fn root_asserts_ca_and_cert_sign() {
        let root = create_root_identity(RootId::B, 3650).unwrap();
        let der = ::pem::parse(&root.cert_pem).unwrap().into_contents();
        let (_, cert) = X509Certificate::from_der(&der).unwrap();

        let bc = cert.basic_constraints().unwrap().expect("basicConstraints");
        assert!(bc.value.ca);

        let ku = cert.key_usage().unwrap().expect("keyUsage");
        assert!(ku.value.key_cert_sign());
        assert!(ku.value.crl_sign());
    }

    #[test]
    fn intermediate_carries_pathlen_zero() {
        let root = create_root_identity(RootId::B, 3650).unwrap();
        let intermediate = create_intermediate_identity(&root, 365).unwrap();

        let der = ::pem::parse(&intermediate.cert_pem).unwrap().into_contents();
        let (_, cert) = X509Certificate::from_der(&der).unwrap();
        let bc = cert.basic_constraints().unwrap().expect("basicConstraints");
        assert!(bc.value.ca);
        assert_eq!(bc.value.path_len_constraint, Some(0));
    }

    #[test]
    fn intermediate_chain_validates_to_its_root() {
        let root = create_root_identity(RootId::B, 3650).unwrap();
        let intermediate = create_intermediate_identity(&root, 365).unwrap();

        verify_issued_by(&intermediate.cert_pem, &root.cert_pem).unwrap();

        // Chain ordering: intermediate first, root second
        let blocks = ::pem::parse_many(intermediate.chain_pem.as_bytes()).unwrap();
        assert_eq!(blocks.len(), 2);
        let int_der = ::pem::parse(&intermediate.cert_pem).unwrap().into_contents();
        assert_eq!(blocks[0].contents(), int_der.as_slice());
    }

    #[test]
    fn intermediate_rejected_by_foreign_root() {
        let root_a = create_root_identity(RootId::A, 3650).unwrap();
        let root_b = create_root_identity(RootId::B, 3650).unwrap();
        let intermediate_b = create_intermediate_identity(&root_b, 365).unwrap();

        let err = verify_issued_by(&intermediate_b.cert_pem, &root_a.cert_pem).unwrap_err();
        assert!(matches!(err, PkiError::NotIssuedBy { .. }));
    }

    #[test]
    fn two_roots_have_distinct_material() {
        let a = create_root_identity(RootId::A, 3650).unwrap();
        let b = create_root_identity(RootId::B, 3650).unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
        assert_ne!(a.key_pem, b.key_pem);
    }

    #[test]
    fn not_after_roundtrips_through_cert() {
        let root = create_root_identity(RootId::A, 30).unwrap();
        let parsed = not_after_from_pem(&root.cert_pem).unwrap();
        let days = (parsed - Utc::now()).num_days();
        assert!((29..=30).contains(&days), "expected ~30 days, got {days}");
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let fp1 = fingerprint_sha256(b"certificate bytes");
        let fp2 = fingerprint_sha256(b"certificate bytes");
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.len(), 64);
    }
}
