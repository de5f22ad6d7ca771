//! Provisioner backed by the terraform (or compatible) CLI.
//!
//! Provisioning runs `init` and `apply`, then optionally re-plans with
//! `-detailed-exitcode`: any change still pending after apply means the
//! definition did not converge. Outputs are read from `output -json`.

use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::instrument;

use super::{ProvisionError, ProvisionHandle, Provisioner};
use crate::config::ProvisionConfig;

/// `plan -detailed-exitcode` status when the plan contains changes
const PLAN_EXIT_CHANGES_PENDING: i32 = 2;

/// Lines of stderr kept when reporting a failed command
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct TerraformProvisioner {
    binary: String,
    idempotency_check: bool,
}

impl TerraformProvisioner {
    pub fn new(binary: impl Into<String>, idempotency_check: bool) -> Self {
        Self {
            binary: binary.into(),
            idempotency_check,
        }
    }

    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self::new(config.binary.clone(), config.idempotency_check)
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> Result<Output, ProvisionError> {
        tracing::debug!(binary = %self.binary, ?args, "Running provisioning command");
        Command::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .env("TF_IN_AUTOMATION", "1")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProvisionError::Spawn {
                binary: self.binary.clone(),
                source,
            })
    }

    /// Run a step that must exit 0.
    async fn step(&self, dir: &Path, step: &str, args: &[&str]) -> Result<Output, ProvisionError> {
        let output = self.run(dir, args).await?;
        if !output.status.success() {
            return Err(ProvisionError::Provisioning {
                dir: dir.display().to_string(),
                reason: format!("{} failed ({}): {}", step, output.status, stderr_tail(&output)),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl Provisioner for TerraformProvisioner {
    #[instrument(name = "provision.apply", skip(self), fields(binary = %self.binary))]
    async fn provision(&self, dir: &Path) -> Result<ProvisionHandle, ProvisionError> {
        self.step(dir, "init", &["init", "-input=false", "-no-color"])
            .await?;
        tracing::info!("Initialized");

        self.step(
            dir,
            "apply",
            &["apply", "-auto-approve", "-input=false", "-no-color"],
        )
        .await?;
        tracing::info!("Applied");

        if self.idempotency_check {
            let output = self
                .run(
                    dir,
                    &["plan", "-detailed-exitcode", "-input=false", "-no-color"],
                )
                .await?;
            match output.status.code() {
                Some(0) => tracing::info!("Re-plan shows no pending changes"),
                Some(PLAN_EXIT_CHANGES_PENDING) => {
                    return Err(ProvisionError::Provisioning {
                        dir: dir.display().to_string(),
                        reason: "changes still pending after apply".to_string(),
                    });
                }
                _ => {
                    return Err(ProvisionError::Provisioning {
                        dir: dir.display().to_string(),
                        reason: format!(
                            "plan failed ({}): {}",
                            output.status,
                            stderr_tail(&output)
                        ),
                    });
                }
            }
        }

        Ok(ProvisionHandle::new(dir))
    }

    #[instrument(name = "provision.output", skip(self, handle), fields(dir = %handle.dir().display()))]
    async fn output(&self, handle: &ProvisionHandle, key: &str) -> Result<String, ProvisionError> {
        let output = self
            .step(handle.dir(), "output", &["output", "-json", "-no-color"])
            .await?;
        let listing = String::from_utf8_lossy(&output.stdout);
        let value = extract_output(&listing, key)?;
        tracing::info!(value = %value, "Read output");
        Ok(value)
    }
}

/// Pull `key` out of an `output -json` listing.
///
/// The listing maps each output name to `{"value": ..., "type": ..., "sensitive": ...}`.
/// String values are returned as-is, anything else as its JSON text.
fn extract_output(listing: &str, key: &str) -> Result<String, ProvisionError> {
    let outputs: serde_json::Map<String, serde_json::Value> = serde_json::from_str(listing)
        .map_err(|e| ProvisionError::MalformedOutput(e.to_string()))?;

    let entry = outputs
        .get(key)
        .ok_or_else(|| ProvisionError::OutputNotFound {
            key: key.to_string(),
        })?;

    match entry.get("value") {
        Some(serde_json::Value::String(value)) => Ok(value.clone()),
        Some(serde_json::Value::Null) | None => Err(ProvisionError::OutputNotFound {
            key: key.to_string(),
        }),
        Some(other) => Ok(other.to_string()),
    }
}

fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
