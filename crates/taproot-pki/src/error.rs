//! PKI domain error types.

use taproot_cluster::ClusterError;

#[derive(Debug, thiserror::Error)]
pub enum PkiError {
    #[error(
        "no live root found — neither an operator-managed signing record \
         nor a built-in self-signed root exists in the cluster"
    )]
    ConfigurationNotFound,

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("invalid PEM material: {0}")]
    InvalidPem(String),

    #[error("certificate '{subject}' was not issued by '{issuer}'")]
    NotIssuedBy { subject: String, issuer: String },

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rcgen::Error> for PkiError {
    fn from(e: rcgen::Error) -> Self {
        Self::Certificate(e.to_string())
    }
}

impl From<pem::PemError> for PkiError {
    fn from(e: pem::PemError) -> Self {
        Self::InvalidPem(e.to_string())
    }
}
