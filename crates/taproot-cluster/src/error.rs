//! Cluster collaborator error types.

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("required tool not found: {tool} — install it and re-run")]
    PrerequisiteMissing { tool: String },

    #[error("{program} failed: {detail}")]
    CommandFailed { program: String, detail: String },

    #[error("record {record} is missing field {field}")]
    FieldMissing { record: String, field: String },

    #[error("rollout of {unit} did not become ready within {secs}s")]
    RolloutTimeout { unit: String, secs: u64 },

    #[error("malformed response from cluster: {0}")]
    MalformedResponse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
