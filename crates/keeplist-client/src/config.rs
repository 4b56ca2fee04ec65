//! Client configuration and HTTP client construction.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Url};

use crate::error::{ClientError, ClientResult};

/// Default base URL of the checklist service.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api/";
/// Default request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Header carrying the per-invocation correlation id.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Settings required to talk to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL every endpoint path is joined onto; always ends in `/`.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Optional correlation id sent as `x-request-id` on every request.
    pub request_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let base_url = parse_base_url(DEFAULT_API_URL)
            .unwrap_or_else(|err| unreachable!("default API URL must parse: {err}"));
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            request_id: None,
        }
    }
}

impl ClientConfig {
    /// Build a configuration for the given base URL with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the URL cannot be parsed.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let base_url = parse_base_url(base_url).map_err(ClientError::Config)?;
        Ok(Self {
            base_url,
            ..Self::default()
        })
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach a correlation id to every outbound request.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Construct the underlying `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the request id is not a valid
    /// header value or the TLS backend cannot be initialised.
    pub fn build_http_client(&self) -> ClientResult<Client> {
        let mut default_headers = HeaderMap::new();
        if let Some(request_id) = &self.request_id {
            let value = HeaderValue::from_str(request_id).map_err(|_| {
                ClientError::Config("request identifier contains invalid characters".to_string())
            })?;
            default_headers.insert(HEADER_REQUEST_ID, value);
        }

        Client::builder()
            .timeout(self.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build HTTP client: {err}")))
    }
}

/// Parse a base URL, normalising it to end with `/` so relative endpoint paths
/// resolve beneath it.
///
/// # Errors
///
/// Returns a human-readable message when the input is not an absolute URL.
pub fn parse_base_url(input: &str) -> Result<Url, String> {
    let trimmed = input.trim();
    let normalised = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = normalised
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))?;
    if url.cannot_be_a_base() {
        return Err(format!("invalid URL '{input}': cannot be used as a base"));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_base_url_appends_trailing_slash() {
        let url = parse_base_url("http://localhost:8080/api").expect("valid URL");
        assert_eq!(url.as_str(), "http://localhost:8080/api/");
        assert_eq!(
            url.join("checklist/4/item").expect("join").as_str(),
            "http://localhost:8080/api/checklist/4/item"
        );
    }

    #[test]
    fn parse_base_url_rejects_invalid_input() {
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("mailto:someone@example.com").is_err());
    }

    #[test]
    fn default_config_points_at_local_api() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn build_http_client_rejects_invalid_request_id() {
        let config = ClientConfig::default().with_request_id("bad\nvalue");
        assert!(matches!(
            config.build_http_client(),
            Err(ClientError::Config(_))
        ));
        let config = ClientConfig::default().with_request_id("trace-1");
        assert!(config.build_http_client().is_ok());
    }
}
