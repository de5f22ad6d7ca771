use crate::config::ConfigError;
use crate::provision::ProvisionError;
use crate::target::TargetError;
use crate::verify::{ProbeFailure, VerifyError};

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("Bad target from provisioning output: {0}")]
    Target(#[from] TargetError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Timeout(#[from] VerifyError),

    #[error("Endpoint {url} unhealthy after {attempts} attempt(s); last error: {last_failure}")]
    UnhealthyEndpoint {
        url: String,
        attempts: u32,
        last_failure: ProbeFailure,
    },
}

impl CheckError {
    /// Process exit code for this failure. Healthy runs exit 0.
    pub fn exit_code(&self) -> u8 {
        match self {
            CheckError::HttpClient(_) => 1,
            CheckError::Config(_) => 2,
            CheckError::Provision(ProvisionError::OutputNotFound { .. }) => 4,
            CheckError::Provision(_) => 3,
            CheckError::Target(_) => 5,
            CheckError::UnhealthyEndpoint { .. } => 6,
            CheckError::Timeout(_) => 7,
        }
    }
}
