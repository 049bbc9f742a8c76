use anyhow::{bail, Error};
use serde_json::Value as Json;

use crate::core::object::TypedParameter;

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl TypedParameter for AccessToken {
    const KEY: &'static str = "access_token";
}

impl TryFrom<Json> for AccessToken {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        let Json::String(token) = value else {
            bail!("expected a string")
        };
        Ok(Self(token))
    }
}

impl From<AccessToken> for Json {
    fn from(value: AccessToken) -> Json {
        Json::String(value.0)
    }
}

/// The `token_type` of an access token response. Only `bearer` is supported, matched
/// case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Bearer,
}

impl TokenType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TokenType::Bearer => "bearer",
        }
    }
}

impl TypedParameter for TokenType {
    const KEY: &'static str = "token_type";
}

impl TryFrom<Json> for TokenType {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        match value {
            Json::String(s) if s == TokenType::Bearer.as_str() => Ok(TokenType::Bearer),
            other => bail!("expected \"bearer\", received {other}"),
        }
    }
}

impl From<TokenType> for Json {
    fn from(value: TokenType) -> Json {
        Json::String(value.as_str().to_owned())
    }
}

/// Lifetime of the access token in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiresIn(pub u64);

impl TypedParameter for ExpiresIn {
    const KEY: &'static str = "expires_in";
}

impl TryFrom<Json> for ExpiresIn {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<ExpiresIn> for Json {
    fn from(value: ExpiresIn) -> Json {
        value.0.into()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(pub String);

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshToken(<redacted>)")
    }
}

impl TypedParameter for RefreshToken {
    const KEY: &'static str = "refresh_token";
}

impl TryFrom<Json> for RefreshToken {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_value(value)?))
    }
}

impl From<RefreshToken> for Json {
    fn from(value: RefreshToken) -> Json {
        Json::String(value.0)
    }
}
