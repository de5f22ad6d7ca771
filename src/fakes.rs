//! In-memory fakes for the probe and provisioning traits (testing only)
//!
//! `ScriptedProbe` replays a fixed sequence of probe outcomes and
//! `MemoryProvisioner` serves outputs from a map, so the verifier and the
//! check flow can be exercised without network or infrastructure.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::probe::{Probe, ProbeError};
use crate::provision::{ProvisionError, ProvisionHandle, Provisioner};

// ---------------------------------------------------------------------------
// ScriptedProbe
// ---------------------------------------------------------------------------

/// Probe that answers from a script, one entry per call.
///
/// Once the script is used up, the `repeat` outcome (if any) is returned for
/// every further call; otherwise calls fail with a transport error.
#[derive(Debug)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<u16, ProbeError>>>,
    repeat: Option<Result<u16, ProbeError>>,
    latency: Duration,
    calls: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

impl ScriptedProbe {
    pub fn new(script: impl IntoIterator<Item = Result<u16, ProbeError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            repeat: None,
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
        }
    }

    /// Probe that returns `outcome` on every call
    pub fn repeating(outcome: Result<u16, ProbeError>) -> Self {
        Self {
            repeat: Some(outcome),
            ..Self::new(VecDeque::<Result<u16, ProbeError>>::new())
        }
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of probes issued so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of probes that were outstanding at the same time
    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Result<u16, ProbeError> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        match script.pop_front() {
            Some(outcome) => outcome,
            None => self.repeat.clone().unwrap_or_else(|| {
                Err(ProbeError::Transport("probe script exhausted".to_string()))
            }),
        }
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn get(&self, _url: &str, _timeout: Duration) -> Result<u16, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let outcome = self.next_outcome();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

// ---------------------------------------------------------------------------
// MemoryProvisioner
// ---------------------------------------------------------------------------

/// Provisioner whose "state" is a map of output values.
#[derive(Debug, Default)]
pub struct MemoryProvisioner {
    outputs: HashMap<String, String>,
    failure: Option<String>,
    applies: AtomicU32,
}

impl MemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, key: &str, value: &str) -> Self {
        self.outputs.insert(key.to_string(), value.to_string());
        self
    }

    /// Make every apply fail to converge with `reason`
    pub fn failing(mut self, reason: &str) -> Self {
        self.failure = Some(reason.to_string());
        self
    }

    /// Number of apply calls so far
    pub fn applies(&self) -> u32 {
        self.applies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for MemoryProvisioner {
    async fn provision(&self, dir: &Path) -> Result<ProvisionHandle, ProvisionError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(ProvisionError::Provisioning {
                dir: dir.display().to_string(),
                reason: reason.clone(),
            });
        }
        Ok(ProvisionHandle::new(dir))
    }

    async fn output(&self, _handle: &ProvisionHandle, key: &str) -> Result<String, ProvisionError> {
        self.outputs
            .get(key)
            .cloned()
            .ok_or_else(|| ProvisionError::OutputNotFound {
                key: key.to_string(),
            })
    }
}
