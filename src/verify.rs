//! Bounded endpoint verification.
//!
//! Polls a target sequentially until it answers with status 200 or the
//! attempt budget runs out. Between attempts the task sleeps for a fixed
//! interval. An optional overall deadline cancels the loop wherever it is,
//! mid-probe or mid-sleep.
//!
//! Only status 200 counts as healthy. Any other status is retried exactly
//! like a transport error, but the verdict keeps which of the two was seen
//! last.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::instrument;

use crate::config::VerifyConfig;
use crate::probe::{Probe, ProbeError};
use crate::target::TargetUrl;

/// The only status code accepted as healthy
pub const HEALTHY_STATUS: u16 = 200;

/// Attempt budget and timing for one verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: NonZeroU32,
    /// Pause between attempts; zero disables the pause
    pub interval: Duration,
    /// Bound on each individual probe
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: NonZeroU32, interval: Duration, request_timeout: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            request_timeout,
        }
    }

    /// Build from config. Returns `None` when `max_attempts` is zero.
    pub fn from_config(config: &VerifyConfig) -> Option<Self> {
        Some(Self::new(
            NonZeroU32::new(config.max_attempts)?,
            config.interval(),
            config.request_timeout(),
        ))
    }
}

/// Why a single attempt did not count as healthy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// No response was obtained
    Transport(ProbeError),
    /// A response arrived with a status other than 200
    Status(u16),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::Transport(e) => write!(f, "{}", e),
            ProbeFailure::Status(status) => write!(f, "status {}", status),
        }
    }
}

/// One probe and its outcome. Lives only for a single loop iteration.
#[derive(Debug, Clone)]
pub struct ProbeAttempt {
    pub index: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: Result<u16, ProbeError>,
}

impl ProbeAttempt {
    /// `None` when the attempt was healthy
    fn failure(&self) -> Option<ProbeFailure> {
        match &self.outcome {
            Ok(HEALTHY_STATUS) => None,
            Ok(status) => Some(ProbeFailure::Status(*status)),
            Err(e) => Some(ProbeFailure::Transport(e.clone())),
        }
    }
}

/// Terminal result of a verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Healthy { status: u16, attempts: u32 },
    Unhealthy { last_failure: ProbeFailure, attempts: u32 },
}

impl Verdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Verdict::Healthy { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Verdict::Healthy { attempts, .. } | Verdict::Unhealthy { attempts, .. } => *attempts,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(
        "verification of {url} exceeded its {deadline:?} deadline after {attempts} attempt(s); last outcome: {}",
        describe_last(.last_failure)
    )]
    Timeout {
        url: String,
        deadline: Duration,
        attempts: u32,
        last_failure: Option<ProbeFailure>,
    },
}

fn describe_last(last: &Option<ProbeFailure>) -> String {
    match last {
        Some(failure) => failure.to_string(),
        None => "no probe completed".to_string(),
    }
}

/// Loop state visible to the caller even if the loop is cancelled
#[derive(Debug, Default)]
struct Progress {
    attempts: u32,
    last_failure: Option<ProbeFailure>,
}

/// Runs the bounded polling protocol against a target with a given probe.
pub struct Verifier<P> {
    probe: P,
    policy: RetryPolicy,
}

impl<P: Probe> Verifier<P> {
    pub fn new(probe: P, policy: RetryPolicy) -> Self {
        Self { probe, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Poll `target` until healthy or the attempt budget is spent.
    pub async fn verify(&self, target: &TargetUrl) -> Verdict {
        let mut progress = Progress::default();
        self.poll(target, &mut progress).await
    }

    /// Like [`Verifier::verify`], but abort with [`VerifyError::Timeout`] once
    /// `deadline` elapses. `None` means no overall deadline.
    pub async fn verify_within(
        &self,
        target: &TargetUrl,
        deadline: Option<Duration>,
    ) -> Result<Verdict, VerifyError> {
        let Some(deadline) = deadline else {
            return Ok(self.verify(target).await);
        };

        let mut progress = Progress::default();
        let outcome = tokio::time::timeout(deadline, self.poll(target, &mut progress)).await;

        match outcome {
            Ok(verdict) => Ok(verdict),
            Err(_) => {
                tracing::warn!(
                    url = %target,
                    ?deadline,
                    attempts = progress.attempts,
                    "Verification deadline exceeded"
                );
                Err(VerifyError::Timeout {
                    url: target.to_string(),
                    deadline,
                    attempts: progress.attempts,
                    last_failure: progress.last_failure,
                })
            }
        }
    }

    #[instrument(
        name = "verify.poll",
        skip(self, target, progress),
        fields(url = %target, max_attempts = self.policy.max_attempts.get())
    )]
    async fn poll(&self, target: &TargetUrl, progress: &mut Progress) -> Verdict {
        let max_attempts = self.policy.max_attempts.get();
        let started = Instant::now();

        loop {
            progress.attempts += 1;
            let attempt = ProbeAttempt {
                index: progress.attempts,
                started_at: Utc::now(),
                outcome: self
                    .probe
                    .get(target.as_str(), self.policy.request_timeout)
                    .await,
            };

            let Some(failure) = attempt.failure() else {
                tracing::info!(
                    attempt = attempt.index,
                    elapsed = ?started.elapsed(),
                    "Endpoint healthy"
                );
                return Verdict::Healthy {
                    status: HEALTHY_STATUS,
                    attempts: attempt.index,
                };
            };

            tracing::warn!(
                attempt = attempt.index,
                max_attempts,
                started_at = %attempt.started_at,
                error = %failure,
                "Probe failed"
            );
            progress.last_failure = Some(failure.clone());

            if attempt.index >= max_attempts {
                tracing::error!(
                    attempts = attempt.index,
                    last_error = %failure,
                    elapsed = ?started.elapsed(),
                    "Attempt budget exhausted"
                );
                return Verdict::Unhealthy {
                    last_failure: failure,
                    attempts: attempt.index,
                };
            }

            if !self.policy.interval.is_zero() {
                tokio::time::sleep(self.policy.interval).await;
            }
        }
    }
}
