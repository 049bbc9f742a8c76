use anyhow::{bail, Context, Error};
use serde_json::Value as Json;
use url::Url;

use crate::core::object::TypedParameter;

/// The `issuer` identifier of an authorization server.
///
/// Always an `https` URL without query or fragment. The identifier is kept as published since
/// it is used verbatim as the audience of proofs of possession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer(String, Url);

impl Issuer {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn url(&self) -> &Url {
        &self.1
    }
}

impl TypedParameter for Issuer {
    const KEY: &'static str = "issuer";
}

impl TryFrom<Json> for Issuer {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        let Json::String(issuer) = value else {
            bail!("expected a string")
        };
        if !issuer.starts_with("https://") {
            bail!("'{issuer}' is not an https URL")
        }
        let url: Url = issuer
            .parse()
            .with_context(|| format!("'{issuer}' is not a valid URL"))?;
        if url.query().is_some() || url.fragment().is_some() {
            bail!("'{issuer}' must not contain a query or fragment")
        }
        Ok(Self(issuer, url))
    }
}

impl From<Issuer> for Json {
    fn from(value: Issuer) -> Json {
        Json::String(value.0)
    }
}

fn endpoint(value: Json) -> Result<Url, Error> {
    let Json::String(endpoint) = value else {
        bail!("expected a string")
    };
    if endpoint.is_empty() {
        bail!("expected a non-empty string")
    }
    endpoint
        .parse()
        .with_context(|| format!("'{endpoint}' is not a valid URL"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEndpoint(pub Url);

impl TypedParameter for TokenEndpoint {
    const KEY: &'static str = "token_endpoint";
}

impl TryFrom<Json> for TokenEndpoint {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        endpoint(value).map(Self)
    }
}

impl From<TokenEndpoint> for Json {
    fn from(value: TokenEndpoint) -> Json {
        Json::String(value.0.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEndpoint(pub Url);

impl TypedParameter for CredentialEndpoint {
    const KEY: &'static str = "credential_endpoint";
}

impl TryFrom<Json> for CredentialEndpoint {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        endpoint(value).map(Self)
    }
}

impl From<CredentialEndpoint> for Json {
    fn from(value: CredentialEndpoint) -> Json {
        Json::String(value.0.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwksUri(pub Url);

impl TypedParameter for JwksUri {
    const KEY: &'static str = "jwks_uri";
}

impl TryFrom<Json> for JwksUri {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        endpoint(value).map(Self)
    }
}

impl From<JwksUri> for Json {
    fn from(value: JwksUri) -> Json {
        Json::String(value.0.into())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::core::object::UntypedObject;

    use super::*;

    fn metadata() -> UntypedObject {
        serde_json::from_value(json!({
            "issuer": "https://example.com/tenant/a",
            "token_endpoint": "https://example.com/tenant/a/token",
            "credential_endpoint": "https://example.com/tenant/a/credential",
            "jwks_uri": "https://example.com/tenant/a/jwks"
        }))
        .unwrap()
    }

    #[test]
    fn issuer() {
        let issuer: Issuer = metadata().get().unwrap().unwrap();
        assert_eq!(issuer.as_str(), "https://example.com/tenant/a");
        assert_eq!(issuer.url().path(), "/tenant/a");
    }

    #[test]
    fn issuer_must_be_https() {
        assert!(Issuer::try_from(json!("http://example.com")).is_err());
        assert!(Issuer::try_from(json!(42)).is_err());
        assert!(Issuer::try_from(json!("https://example.com?x=1")).is_err());
    }

    #[test]
    fn endpoints() {
        let TokenEndpoint(token) = metadata().get().unwrap().unwrap();
        assert_eq!(token.as_str(), "https://example.com/tenant/a/token");

        let CredentialEndpoint(credential) = metadata().get().unwrap().unwrap();
        assert_eq!(credential.as_str(), "https://example.com/tenant/a/credential");

        let JwksUri(jwks) = metadata().get().unwrap().unwrap();
        assert_eq!(jwks.as_str(), "https://example.com/tenant/a/jwks");
    }

    #[test]
    fn empty_endpoint() {
        assert!(TokenEndpoint::try_from(json!("")).is_err());
        assert!(TokenEndpoint::try_from(json!(null)).is_err());
    }
}
