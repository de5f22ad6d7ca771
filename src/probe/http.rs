//! reqwest-backed HTTP probe

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Probe, ProbeError};
use crate::config::PROBE_USER_AGENT;

/// HTTP probe that issues plain GET requests through a shared reqwest client.
///
/// Redirects are followed with reqwest's default policy; the status reported
/// is that of the final response. The body is never read.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(PROBE_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Like [`HttpProbe::new`], but ignore proxy settings from the environment
    pub fn direct() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(PROBE_USER_AGENT)
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError> {
        debug!(url, ?timeout, "HTTP probe requesting");

        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(url, status, "HTTP probe returned status");
                Ok(status)
            }
            Err(e) if e.is_timeout() => {
                debug!(url, ?timeout, "HTTP probe timed out");
                Err(ProbeError::Timeout(timeout))
            }
            Err(e) => {
                let cause = describe(&e);
                debug!(url, error = %cause, "HTTP probe failed");
                Err(ProbeError::Transport(cause))
            }
        }
    }
}

/// Flatten a reqwest error and its source chain into one line.
///
/// reqwest's own message only says the request failed; the useful part
/// (connection refused, DNS failure) sits further down the chain.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
