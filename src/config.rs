use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

/// Response-size cap applied to issuer metadata discovery.
pub const DEFAULT_DISCOVERY_MAX_RESPONSE_SIZE: usize = 4 * 1024;
/// Timeout applied to issuer metadata discovery.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_REQUEST_MAX_RESPONSE_SIZE: usize = 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration.
///
/// Every field has a default, so an empty document deserializes to [ClientConfig::default].
///
/// ```ignore
/// let config: ClientConfig = serde_json::from_value(json!({
///     "discovery": { "timeout_ms": 2000, "max_response_size": 8192 }
/// }))?;
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Limits for the issuer metadata GET.
    #[serde(default = "RequestLimits::discovery")]
    pub discovery: RequestLimits,
    /// Limits for the token and credential endpoint POSTs.
    #[serde(default = "RequestLimits::request")]
    pub request: RequestLimits,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            discovery: RequestLimits::discovery(),
            request: RequestLimits::request(),
        }
    }
}

/// Bounds placed on a single HTTP exchange.
///
/// Also attached to outgoing [http::Request]s as an extension so that
/// [AsyncHttpClient](crate::core::util::AsyncHttpClient) implementations can enforce the cap
/// while reading the body.
#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timeout_ms")]
    pub timeout: Duration,
    pub max_response_size: usize,
}

impl RequestLimits {
    pub fn new(timeout: Duration, max_response_size: usize) -> Self {
        Self {
            timeout,
            max_response_size,
        }
    }

    pub fn discovery() -> Self {
        Self::new(DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_DISCOVERY_MAX_RESPONSE_SIZE)
    }

    pub fn request() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT, DEFAULT_REQUEST_MAX_RESPONSE_SIZE)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ClientConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.discovery.timeout, Duration::from_secs(5));
        assert_eq!(config.discovery.max_response_size, 4096);
    }

    #[test]
    fn overrides() {
        let config: ClientConfig = serde_json::from_value(json!({
            "discovery": { "timeout_ms": 250, "max_response_size": 512 }
        }))
        .unwrap();
        assert_eq!(
            config.discovery,
            RequestLimits::new(Duration::from_millis(250), 512)
        );
        assert_eq!(config.request, RequestLimits::request());
    }
}
