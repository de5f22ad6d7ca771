//! End-to-end check: provision, derive the target, verify it.
//!
//! Provisioning and output failures abort before any probe is sent. The
//! verifier's verdict is turned into a `CheckReport` or a `CheckError`
//! carrying the attempt count and last failure.

use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{AppConfig, ConfigError};
use crate::error::CheckError;
use crate::probe::Probe;
use crate::provision::Provisioner;
use crate::target::TargetUrl;
use crate::verify::{RetryPolicy, Verdict, Verifier};

/// Outcome of a healthy check
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub url: TargetUrl,
    pub status: u16,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Run one full check against the definition named in `config`.
pub async fn run_check<Pv, P>(
    config: &AppConfig,
    provisioner: &Pv,
    probe: P,
) -> Result<CheckReport, CheckError>
where
    Pv: Provisioner + ?Sized,
    P: Probe,
{
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "check",
        %run_id,
        dir = %config.provision.dir.display(),
    );
    execute(config, provisioner, probe).instrument(span).await
}

async fn execute<Pv, P>(
    config: &AppConfig,
    provisioner: &Pv,
    probe: P,
) -> Result<CheckReport, CheckError>
where
    Pv: Provisioner + ?Sized,
    P: Probe,
{
    let policy = RetryPolicy::from_config(&config.verify).ok_or_else(|| {
        ConfigError::Validation("verify.max_attempts must be at least 1".to_string())
    })?;

    let handle = provisioner.provision(&config.provision.dir).await?;
    tracing::info!(applied_at = %handle.applied_at(), "Provisioning complete");

    let value = provisioner
        .output(&handle, &config.provision.output_key)
        .await?;
    let url = TargetUrl::from_output(&config.verify.scheme, &value, &config.verify.path)?;
    tracing::info!(
        url = %url,
        max_attempts = policy.max_attempts.get(),
        interval = ?policy.interval,
        request_timeout = ?policy.request_timeout,
        deadline = ?config.verify.deadline(),
        "Verifying endpoint"
    );

    let started = Instant::now();
    let verifier = Verifier::new(probe, policy);
    let verdict = verifier
        .verify_within(&url, config.verify.deadline())
        .await?;

    match verdict {
        Verdict::Healthy { status, attempts } => Ok(CheckReport {
            url,
            status,
            attempts,
            elapsed: started.elapsed(),
        }),
        Verdict::Unhealthy {
            last_failure,
            attempts,
        } => Err(CheckError::UnhealthyEndpoint {
            url: url.to_string(),
            attempts,
            last_failure,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryProvisioner, ScriptedProbe};
    use crate::provision::ProvisionError;
    use crate::verify::ProbeFailure;
    use std::sync::Arc;

    fn config(extra: &str) -> AppConfig {
        AppConfig::from_toml(&format!(
            "[provision]\ndir = \"infra\"\n\n[verify]\ninterval_seconds = 10\n{extra}"
        ))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_check_reports_target_and_attempts() {
        let provisioner =
            MemoryProvisioner::new().with_output("alb_dns_name", "web-alb.example.com");
        let probe = Arc::new(ScriptedProbe::new([Ok(503), Ok(200)]));

        let report = run_check(&config(""), &provisioner, probe.clone())
            .await
            .unwrap();

        assert_eq!(report.url.as_str(), "http://web-alb.example.com/");
        assert_eq!(report.status, 200);
        assert_eq!(report.attempts, 2);
        assert!(report.elapsed >= Duration::from_secs(10), "{:?}", report.elapsed);
        assert!(report.elapsed < Duration::from_secs(20), "{:?}", report.elapsed);
        assert_eq!(provisioner.applies(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provisioning_failure_sends_no_probe() {
        let provisioner = MemoryProvisioner::new().failing("drift detected");
        let probe = Arc::new(ScriptedProbe::repeating(Ok(200)));

        let err = run_check(&config(""), &provisioner, probe.clone())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckError::Provision(ProvisionError::Provisioning { .. })
        ));
        assert_eq!(err.exit_code(), 3);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_output_sends_no_probe() {
        let provisioner = MemoryProvisioner::new().with_output("other", "x.example.com");
        let probe = Arc::new(ScriptedProbe::repeating(Ok(200)));

        let err = run_check(&config(""), &provisioner, probe.clone())
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("alb_dns_name"));
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_output_is_target_error() {
        let provisioner = MemoryProvisioner::new().with_output("alb_dns_name", "");
        let probe = Arc::new(ScriptedProbe::repeating(Ok(200)));

        let err = run_check(&config(""), &provisioner, probe.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckError::Target(_)));
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_is_unhealthy_endpoint() {
        let provisioner =
            MemoryProvisioner::new().with_output("alb_dns_name", "web-alb.example.com");
        let probe = Arc::new(ScriptedProbe::repeating(Ok(503)));

        let err = run_check(&config("max_attempts = 3\n"), &provisioner, probe.clone())
            .await
            .unwrap_err();

        match &err {
            CheckError::UnhealthyEndpoint {
                attempts,
                last_failure,
                ..
            } => {
                assert_eq!(*attempts, 3);
                assert_eq!(*last_failure, ProbeFailure::Status(503));
            }
            other => panic!("expected unhealthy endpoint, got {other:?}"),
        }
        assert_eq!(err.exit_code(), 6);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_surfaces_as_timeout() {
        let provisioner =
            MemoryProvisioner::new().with_output("alb_dns_name", "web-alb.example.com");
        let probe = Arc::new(ScriptedProbe::repeating(Ok(502)));

        let err = run_check(
            &config("max_attempts = 10\ndeadline_seconds = 15\n"),
            &provisioner,
            probe.clone(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CheckError::Timeout(_)));
        assert_eq!(err.exit_code(), 7);
        assert!(err.to_string().contains("status 502"), "{err}");
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_path_is_probed() {
        let provisioner =
            MemoryProvisioner::new().with_output("alb_dns_name", "web-alb.example.com");
        let probe = Arc::new(ScriptedProbe::repeating(Ok(200)));

        let report = run_check(
            &config("scheme = \"https\"\npath = \"/health\"\n"),
            &provisioner,
            probe,
        )
        .await
        .unwrap();

        assert_eq!(report.url.as_str(), "https://web-alb.example.com/health");
        assert_eq!(report.attempts, 1);
    }
}
