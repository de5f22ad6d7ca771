//! Provisioning adapter.
//!
//! Applies an infrastructure definition and reads named outputs back from the
//! applied state. The check treats provisioning as a black box behind the
//! `Provisioner` trait: `TerraformProvisioner` drives the real CLI and
//! `fakes::MemoryProvisioner` stands in for it in tests.

mod terraform;

pub use terraform::TerraformProvisioner;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Error type for provisioning operations
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Provisioning did not converge in {dir}: {reason}")]
    Provisioning { dir: String, reason: String },

    #[error("Output \"{key}\" not found in provisioned state")]
    OutputNotFound { key: String },

    #[error("Malformed output listing: {0}")]
    MalformedOutput(String),

    #[error("Failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
}

/// Token for a successfully applied configuration, valid for one check run.
#[derive(Debug, Clone)]
pub struct ProvisionHandle {
    dir: PathBuf,
    applied_at: DateTime<Utc>,
}

impl ProvisionHandle {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            applied_at: Utc::now(),
        }
    }

    /// Definition directory the handle was applied from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn applied_at(&self) -> DateTime<Utc> {
        self.applied_at
    }
}

#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Apply the definition in `dir` until it is stable.
    async fn provision(&self, dir: &Path) -> Result<ProvisionHandle, ProvisionError>;

    /// Read the named output from the state behind `handle`.
    async fn output(&self, handle: &ProvisionHandle, key: &str) -> Result<String, ProvisionError>;
}
