//! Shared plumbing for the taproot workspace: data-directory paths,
//! atomic JSON persistence, and test scratch-dir helpers.

pub mod paths;
pub mod persist;
