use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::{header::ACCEPT, Request, Response};
use serde_json::Value as Json;
use tracing::debug;

use crate::{config::RequestLimits, error::Error};

use super::object::UntypedObject;

/// Generic HTTP client.
///
/// A trait is used here so to facilitate native HTTP/TLS when compiled for mobile applications.
///
/// Requests sent by this crate carry a [RequestLimits] extension. Implementations should stop
/// reading a response body once it grows past [RequestLimits::max_response_size]; the caller
/// enforces the timeout and re-checks the body length regardless.
#[async_trait]
pub trait AsyncHttpClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

pub(crate) fn base_request() -> http::request::Builder {
    Request::builder().header(ACCEPT, "application/json")
}

/// Execute `request`, failing once `limits` are exceeded instead of waiting or buffering
/// indefinitely.
pub(crate) async fn send_bounded<C: AsyncHttpClient + ?Sized>(
    client: &C,
    mut request: Request<Vec<u8>>,
    limits: RequestLimits,
) -> Result<Response<Vec<u8>>> {
    request.extensions_mut().insert(limits);
    debug!("{} {}", request.method(), request.uri());

    let response = tokio::time::timeout(limits.timeout, client.execute(request))
        .await
        .with_context(|| {
            format!(
                "request timed out after {} ms",
                limits.timeout.as_millis()
            )
        })?
        .context("http request failed")?;

    let length = response.body().len();
    if length > limits.max_response_size {
        bail!(
            "response body of {length} bytes exceeds the limit of {} bytes",
            limits.max_response_size
        )
    }

    Ok(response)
}

/// Parse a response body that must be JSON, whatever the status code.
pub(crate) fn json_body(body: &[u8]) -> Result<Json, Error> {
    if body.is_empty() {
        return Err(Error::malformed("response body is empty"));
    }
    serde_json::from_slice(body)
        .map_err(|e| Error::malformed(format!("response body is not JSON: {e}")))
}

/// Parse a response body that must be a JSON object.
pub(crate) fn json_object_body(body: &[u8]) -> Result<UntypedObject, Error> {
    match json_body(body)? {
        Json::Object(map) => Ok(UntypedObject(map)),
        other => Err(Error::malformed(format!(
            "expected a JSON object, received {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestClient(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestClient {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl From<reqwest::Client> for ReqwestClient {
    fn from(client: reqwest::Client) -> Self {
        Self(client)
    }
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("unable to build http_client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let limits = request.extensions().get::<RequestLimits>().copied();
        let mut request: reqwest::Request =
            request.try_into().context("unable to convert request")?;
        if let Some(limits) = limits {
            *request.timeout_mut() = Some(limits.timeout);
        }
        let max_response_size = limits.map(|l| l.max_response_size);

        let mut response = self
            .0
            .execute(request)
            .await
            .context("http request failed")?;

        if let (Some(max), Some(length)) = (max_response_size, response.content_length()) {
            if length > max as u64 {
                bail!("response body of {length} bytes exceeds the limit of {max} bytes")
            }
        }

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .context("failed to extract response body")?
        {
            if let Some(max) = max_response_size {
                if body.len() + chunk.len() > max {
                    bail!("response body exceeds the limit of {max} bytes")
                }
            }
            body.extend_from_slice(&chunk);
        }

        builder.body(body).context("unable to construct response")
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    struct Slow;

    #[async_trait]
    impl AsyncHttpClient for Slow {
        async fn execute(&self, _request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Response::builder().status(200).body(vec![])?)
        }
    }

    struct Echo;

    #[async_trait]
    impl AsyncHttpClient for Echo {
        async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
            let limits = request
                .extensions()
                .get::<RequestLimits>()
                .context("missing limits")?;
            let body = serde_json::to_vec(&json!({
                "accept": request.headers()[ACCEPT].to_str()?,
                "max": limits.max_response_size,
            }))?;
            Ok(Response::builder().status(200).body(body)?)
        }
    }

    fn get() -> Request<Vec<u8>> {
        base_request()
            .method("GET")
            .uri("https://example.com/")
            .body(vec![])
            .unwrap()
    }

    #[tokio::test]
    async fn times_out() {
        let limits = RequestLimits::new(Duration::from_millis(20), 1024);
        let err = send_bounded(&Slow, get(), limits).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn attaches_limits_and_accept() {
        let limits = RequestLimits::new(Duration::from_secs(1), 1024);
        let response = send_bounded(&Echo, get(), limits).await.unwrap();
        let body = json_body(response.body()).unwrap();
        assert_eq!(body, json!({"accept": "application/json", "max": 1024}));
    }

    #[tokio::test]
    async fn rejects_oversized_body() {
        let limits = RequestLimits::new(Duration::from_secs(1), 8);
        let err = send_bounded(&Echo, get(), limits).await.unwrap_err();
        assert!(err.to_string().contains("exceeds the limit of 8 bytes"));
    }

    #[test]
    fn body_must_be_json() {
        assert!(matches!(json_body(b""), Err(Error::MalformedResponse(_))));
        assert!(matches!(
            json_body(b"<html></html>"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            json_object_body(b"[1, 2]"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(json_object_body(br#"{"a": 1}"#).is_ok());
    }
}
