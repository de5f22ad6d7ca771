//! Target URL derived from a provisioning output.

use std::fmt;

use reqwest::Url;

/// Error building a target URL from an output value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("output value is empty")]
    EmptyOutput,

    #[error("invalid target URL \"{url}\": {reason}")]
    Invalid { url: String, reason: String },
}

/// Absolute http(s) URL of the endpoint under verification. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl(Url);

impl TargetUrl {
    /// Build the target from an output value such as a load balancer DNS name.
    ///
    /// `scheme` is prefixed unless the value already carries a scheme of its
    /// own (in any case). `path` is applied when the value itself names no path.
    pub fn from_output(scheme: &str, value: &str, path: &str) -> Result<Self, TargetError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(TargetError::EmptyOutput);
        }

        let raw = if value.contains("://") {
            value.to_string()
        } else {
            format!("{scheme}://{value}")
        };

        let mut target = Self::parse(&raw)?;
        if target.0.path() == "/" && path != "/" {
            target.0.set_path(path);
        }
        Ok(target)
    }

    /// Parse an already complete URL.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let url = Url::parse(raw).map_err(|e| TargetError::Invalid {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(TargetError::Invalid {
                url: raw.to_string(),
                reason: format!("unsupported scheme \"{}\"", url.scheme()),
            });
        }
        if url.host_str().is_none() {
            return Err(TargetError::Invalid {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
