//! External collaborators of the rotation core: the cluster config store
//! (a named, namespaced secret-like record) and the workload orchestrator
//! (rolling restarts, rollout waits, in-container exec).
//!
//! Both are narrow traits with a `kubectl`-backed implementation for real
//! clusters and an in-memory implementation for tests. The rotation core
//! never talks to `kubectl` directly.

pub mod error;
pub mod kubectl;
pub mod secret;
pub mod workload;

pub use error::ClusterError;
pub use secret::{ConfigStore, KubectlStore, MemoryStore, SecretRecord};
pub use workload::{KubectlWorkloads, WorkloadApi};
