//! HTTP liveness probing.
//!
//! A `Probe` issues exactly one GET per call and reports either the response
//! status code or why no status was obtained. Judging whether a status is
//! healthy is left to the verifier.

mod http;

pub use http::HttpProbe;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Error for a probe that produced no HTTP status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// A single bounded HTTP GET against a target
#[async_trait]
pub trait Probe: Send + Sync {
    /// Request `url` once, giving up after `timeout`.
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError>;
}

#[async_trait]
impl<T: Probe + ?Sized> Probe for Arc<T> {
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError> {
        (**self).get(url, timeout).await
    }
}
