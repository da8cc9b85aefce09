//! Delivery to a remote slave by HTTP form POST.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::actions::SlaveActions;
use crate::config::ConnectionParams;
use crate::error::ConduitError;
use crate::plugin::Sender;

use super::wire::{FORM_CONTENT_TYPE, encode_form, is_success};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings read from a client's `params` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgiPostParams {
    pub url: Url,
    pub timeout: Duration,
    pub use_system_proxy: bool,
}

impl CgiPostParams {
    pub fn from_params(params: &ConnectionParams) -> Result<Self, ConduitError> {
        let config_error = |message: String| ConduitError::Config(anyhow::anyhow!(message));

        let raw_url = params
            .get("url")
            .ok_or_else(|| config_error("ExternalCGIPost needs a 'url' parameter".to_string()))?;
        let url = Url::parse(raw_url)
            .map_err(|e| config_error(format!("invalid url '{}': {}", raw_url, e)))?;

        let timeout_secs = match params.get("timeout_secs") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(config_error(format!(
                        "timeout_secs must be a positive number of seconds, got '{}'",
                        raw
                    )));
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        let use_system_proxy = match params.get("use_system_proxy").map(String::as_str) {
            None | Some("false") => false,
            Some("true") => true,
            Some(other) => {
                return Err(config_error(format!(
                    "use_system_proxy must be true or false, got '{}'",
                    other
                )));
            }
        };

        Ok(Self {
            url,
            timeout: Duration::from_secs(timeout_secs),
            use_system_proxy,
        })
    }
}

/// Sender posting to a slave's `conduit-slave.cgi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalCgiPost;

impl Sender for ExternalCgiPost {
    fn send(
        &self,
        user: &str,
        actions: &SlaveActions,
        params: &ConnectionParams,
    ) -> Result<(), ConduitError> {
        let params = CgiPostParams::from_params(params)?;
        let target = params.url.to_string();
        let transport = |message: String| ConduitError::Transport {
            target: target.clone(),
            message,
        };

        let body = encode_form(user, actions)?;
        let mut builder = reqwest::blocking::Client::builder().timeout(params.timeout);
        if !params.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!("Posting {} action(s) to {}", actions.len(), target);
        let describe = |e: reqwest::Error| {
            if e.is_timeout() {
                format!("timed out after {}s", params.timeout.as_secs())
            } else {
                e.to_string()
            }
        };
        let response = client
            .post(params.url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .map_err(|e| transport(describe(e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            let detail = detail.trim();
            return Err(transport(if detail.is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, detail)
            }));
        }
        let text = response.text().map_err(|e| transport(describe(e)))?;
        if !is_success(&text) {
            return Err(ConduitError::RemoteFailure {
                target,
                body: text.trim_end().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ConnectionParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let parsed = CgiPostParams::from_params(&params(&[("url", "http://slave/conduit-slave.cgi")]))
            .unwrap();
        assert_eq!(parsed.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(!parsed.use_system_proxy);
    }

    #[test]
    fn test_url_is_required() {
        let err = CgiPostParams::from_params(&params(&[])).unwrap_err();
        assert!(matches!(err, ConduitError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_timeout_and_proxy_flag() {
        let url = ("url", "http://slave/conduit-slave.cgi");
        assert!(CgiPostParams::from_params(&params(&[url, ("timeout_secs", "0")])).is_err());
        assert!(CgiPostParams::from_params(&params(&[url, ("timeout_secs", "soon")])).is_err());
        assert!(CgiPostParams::from_params(&params(&[url, ("use_system_proxy", "yes")])).is_err());
        let parsed =
            CgiPostParams::from_params(&params(&[url, ("timeout_secs", "5"), ("use_system_proxy", "true")]))
                .unwrap();
        assert_eq!(parsed.timeout, Duration::from_secs(5));
        assert!(parsed.use_system_proxy);
    }
}
