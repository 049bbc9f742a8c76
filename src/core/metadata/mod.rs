use std::ops::Deref;

use anyhow::Error as AnyError;
use http::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::RequestLimits,
    error::{Error, ErrorResponse, Operation},
};

use self::parameters::{CredentialEndpoint, Issuer, TokenEndpoint};

use super::{
    object::{ParsingErrorContext, UntypedObject},
    util::{base_request, json_object_body, send_bounded, AsyncHttpClient},
};

pub mod parameters;

/// The well-known suffix of OAuth 2.0 Authorization Server Metadata (RFC 8414).
pub const OAUTH_AUTHORIZATION_SERVER: &str = "oauth-authorization-server";

/// Validated issuer discovery metadata.
///
/// Members beyond `issuer`, `token_endpoint` and `credential_endpoint` stay available through
/// [Deref] to the underlying [UntypedObject], e.g. `metadata.get_optional::<JwksUri>()`.
///
/// Deserializing checks the shape of the members but not where the document was published.
/// Use it for metadata that was already validated, e.g. a stored copy; metadata fetched from
/// the network goes through [resolve] or [IssuerMetadata::from_discovery_document].
///
/// [JwksUri]: parameters::JwksUri
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "UntypedObject", into = "UntypedObject")]
pub struct IssuerMetadata(
    UntypedObject,
    Issuer,
    TokenEndpoint,
    Option<CredentialEndpoint>,
);

impl IssuerMetadata {
    pub fn issuer(&self) -> &Issuer {
        &self.1
    }

    pub fn token_endpoint(&self) -> &Url {
        &self.2 .0
    }

    /// Not every authorization server advertises a credential endpoint, so this is only
    /// required once a credential is requested.
    pub fn credential_endpoint(&self) -> Option<&Url> {
        self.3.as_ref().map(|e| &e.0)
    }

    /// Validate a discovery document fetched from `issuer_config_url`.
    ///
    /// Checks run in order: `issuer` shape, `issuer` against the configuration URL, then the
    /// endpoints. The first failure is reported.
    pub fn from_discovery_document(
        document: UntypedObject,
        issuer_config_url: &str,
    ) -> Result<Self, Error> {
        let issuer: Issuer = document
            .get()
            .parsing_error()
            .map_err(|e| Error::malformed(format!("{e:#}")))?;

        let Some(suffix) = well_known_suffix(issuer_config_url) else {
            return Err(Error::malformed(format!(
                "'{issuer_config_url}' is not a well-known configuration URL"
            )));
        };
        let expected = well_known_url(issuer.url(), suffix);
        if expected != issuer_config_url {
            warn!(
                issuer = issuer.as_str(),
                expected = expected.as_str(),
                "issuer does not match configuration URL"
            );
            return Err(Error::malformed(format!(
                "issuer does not match configuration URL: expected '{expected}', \
                 received '{issuer_config_url}'"
            )));
        }

        Self::try_from(document).map_err(|e| Error::malformed(format!("{e:#}")))
    }
}

impl From<IssuerMetadata> for UntypedObject {
    fn from(value: IssuerMetadata) -> Self {
        let mut inner = value.0;
        inner.insert(value.1);
        inner.insert(value.2);
        if let Some(credential_endpoint) = value.3 {
            inner.insert(credential_endpoint);
        }
        inner
    }
}

impl TryFrom<UntypedObject> for IssuerMetadata {
    type Error = AnyError;

    fn try_from(value: UntypedObject) -> Result<Self, Self::Error> {
        let issuer = value.get().parsing_error()?;
        let token_endpoint = value.get().parsing_error()?;
        let credential_endpoint = value.get_optional()?;
        Ok(Self(value, issuer, token_endpoint, credential_endpoint))
    }
}

impl Deref for IssuerMetadata {
    type Target = UntypedObject;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Insert the well-known `suffix` between the origin and the path of `issuer` (RFC 8414
/// Section 3.1).
///
/// A root path is omitted, so `https://example.com` maps to
/// `https://example.com/.well-known/<suffix>` and `https://example.com/tenant/a` to
/// `https://example.com/.well-known/<suffix>/tenant/a`.
pub fn well_known_url(issuer: &Url, suffix: &str) -> String {
    let origin = issuer.origin().ascii_serialization();
    match issuer.path() {
        "/" | "" => format!("{origin}/.well-known/{suffix}"),
        path => format!("{origin}/.well-known/{suffix}{path}"),
    }
}

/// The path segment immediately following `/.well-known/`.
fn well_known_suffix(config_url: &str) -> Option<&str> {
    let (_, rest) = config_url.split_once("/.well-known/")?;
    rest.split(['/', '?', '#']).next().filter(|s| !s.is_empty())
}

/// Fetch and strictly validate issuer metadata published at `issuer_config_url`.
pub async fn resolve<C: AsyncHttpClient + ?Sized>(
    http_client: &C,
    limits: RequestLimits,
    issuer_config_url: &str,
) -> Result<IssuerMetadata, Error> {
    if issuer_config_url.is_empty() {
        return Err(Error::type_mismatch(
            "issuer configuration URL must be a non-empty string",
        ));
    }
    let url: Url = issuer_config_url.parse().map_err(|e| {
        Error::type_mismatch(format!(
            "'{issuer_config_url}' is not a valid issuer configuration URL: {e}"
        ))
    })?;

    debug!(%url, "fetching issuer metadata");

    let request = base_request()
        .method(Method::GET)
        .uri(url.as_str())
        .body(vec![])
        .map_err(|e| Error::failed(Operation::Discovery, e))?;
    let response = send_bounded(http_client, request, limits)
        .await
        .map_err(|e| Error::failed(Operation::Discovery, e))?;

    let status = response.status();
    let document = json_object_body(response.body())?;
    if !status.is_success() {
        warn!(%status, "issuer metadata request was unsuccessful");
        return Err(Error::rejected(
            Operation::Discovery,
            status,
            ErrorResponse::from_json(document.into()),
        ));
    }

    IssuerMetadata::from_discovery_document(document, issuer_config_url)
}
