use std::time::Duration;

use anyhow::Error as AnyError;
use http::{header::CONTENT_TYPE, Method};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::{ClientConfig, RequestLimits},
    error::{Error, ErrorResponse, Operation},
};

use self::parameters::{AccessToken, ExpiresIn, RefreshToken, TokenType};

use super::{
    metadata::{resolve, well_known_url, IssuerMetadata, OAUTH_AUTHORIZATION_SERVER},
    object::{ParsingErrorContext, UntypedObject},
    util::{base_request, json_object_body, send_bounded, AsyncHttpClient},
};

pub mod parameters;

/// Grant types this client can exchange at a token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    PreAuthorizedCode,
    AuthorizationCode,
}

impl GrantType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GrantType::PreAuthorizedCode => "urn:ietf:params:oauth:grant-type:pre-authorized_code",
            GrantType::AuthorizationCode => "authorization_code",
        }
    }
}

/// Form body of a token request.
#[derive(Debug, Serialize)]
#[serde(tag = "grant_type")]
enum TokenRequest<'a> {
    #[serde(rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code")]
    PreAuthorizedCode {
        #[serde(rename = "pre-authorized_code")]
        pre_authorized_code: &'a str,
        /// Omitted, rather than empty, when the offer did not require a PIN.
        #[serde(skip_serializing_if = "Option::is_none")]
        user_pin: Option<&'a str>,
    },
    #[serde(rename = "authorization_code")]
    AuthorizationCode {
        code: &'a str,
        code_verifier: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        redirect_uri: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<&'a str>,
    },
}

impl TokenRequest<'_> {
    fn grant_type(&self) -> GrantType {
        match self {
            TokenRequest::PreAuthorizedCode { .. } => GrantType::PreAuthorizedCode,
            TokenRequest::AuthorizationCode { .. } => GrantType::AuthorizationCode,
        }
    }
}

/// A bearer access token returned by a token endpoint.
///
/// `c_nonce` and `c_nonce_expires_in` in the token response are ignored. The proof nonce is
/// only taken from a credential endpoint challenge.
#[derive(Debug, Clone)]
pub struct AccessTokenGrant {
    access_token: AccessToken,
    token_type: TokenType,
    expires_in: Option<ExpiresIn>,
    refresh_token: Option<RefreshToken>,
    received_at: OffsetDateTime,
}

impl AccessTokenGrant {
    pub fn access_token(&self) -> &str {
        &self.access_token.0
    }

    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in.map(|ExpiresIn(secs)| Duration::from_secs(secs))
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.0.as_str())
    }

    /// `None` when the token carries no `expires_in`, or one too large to represent.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        let lifetime = time::Duration::try_from(self.expires_in()?).ok()?;
        self.received_at.checked_add(lifetime)
    }

    /// Whether the token lifetime has elapsed. Tokens without a representable expiry never
    /// expire here; the server remains the authority.
    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .is_some_and(|expires_at| expires_at <= OffsetDateTime::now_utc())
    }
}

impl TryFrom<UntypedObject> for AccessTokenGrant {
    type Error = AnyError;

    fn try_from(value: UntypedObject) -> Result<Self, Self::Error> {
        Ok(Self {
            access_token: value.get().parsing_error()?,
            token_type: value.get().parsing_error()?,
            expires_in: value.get_optional()?,
            refresh_token: value.get_optional()?,
            received_at: OffsetDateTime::now_utc(),
        })
    }
}

/// Parameters of an authorization code exchange, supplied by whoever ran the authorization
/// redirect.
#[derive(Clone, Default)]
pub struct AuthorizationCodeExchange {
    /// PKCE `code_verifier` matching the challenge sent with the authorization request.
    pub code_verifier: String,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    /// When set, the `state` of the redirect must match.
    pub state: Option<String>,
}

impl std::fmt::Debug for AuthorizationCodeExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodeExchange")
            .field("code_verifier", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("client_id", &self.client_id)
            .field("state", &self.state)
            .finish()
    }
}

/// Exchange a pre-authorized code for an access token.
///
/// Metadata is discovered at `<origin>/.well-known/oauth-authorization-server<path>` of
/// `issuer_base_url`. `user_pin` is only sent when supplied.
pub async fn acquire_pre_authorized<C: AsyncHttpClient + ?Sized>(
    http_client: &C,
    config: &ClientConfig,
    issuer_base_url: &str,
    pre_authorized_code: &str,
    user_pin: Option<&str>,
) -> Result<(AccessTokenGrant, IssuerMetadata), Error> {
    if issuer_base_url.is_empty() {
        return Err(Error::type_mismatch(
            "issuer URL must be a non-empty string",
        ));
    }
    if pre_authorized_code.is_empty() {
        return Err(Error::type_mismatch(
            "pre-authorized code must be a non-empty string",
        ));
    }
    let issuer_base_url: Url = issuer_base_url.parse().map_err(|e| {
        Error::type_mismatch(format!("'{issuer_base_url}' is not a valid issuer URL: {e}"))
    })?;

    let discovery_url = well_known_url(&issuer_base_url, OAUTH_AUTHORIZATION_SERVER);
    let metadata = resolve(http_client, config.discovery, &discovery_url).await?;

    let grant = request_token(
        http_client,
        config.request,
        metadata.token_endpoint(),
        TokenRequest::PreAuthorizedCode {
            pre_authorized_code,
            user_pin,
        },
    )
    .await?;

    Ok((grant, metadata))
}

/// Exchange the authorization code carried by `redirect_url` for an access token.
///
/// The authorization redirect itself happens elsewhere; this only covers the token endpoint
/// half of the flow.
pub async fn acquire_by_authorization_code<C: AsyncHttpClient + ?Sized>(
    http_client: &C,
    config: &ClientConfig,
    metadata: &IssuerMetadata,
    redirect_url: &Url,
    exchange: &AuthorizationCodeExchange,
) -> Result<AccessTokenGrant, Error> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in redirect_url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        let mut details = ErrorResponse::new(error);
        details.error_description = error_description;
        return Err(Error::NotAllowed {
            message: format!("authorization was rejected: {}", details.error),
            details: Some(details),
        });
    }
    if exchange.state.is_some() && exchange.state != state {
        return Err(Error::NotAllowed {
            message: "authorization response state does not match".into(),
            details: None,
        });
    }
    let Some(code) = code.filter(|c| !c.is_empty()) else {
        return Err(Error::type_mismatch(
            "redirect URL does not carry an authorization code",
        ));
    };
    if exchange.code_verifier.is_empty() {
        return Err(Error::type_mismatch(
            "PKCE code verifier must be a non-empty string",
        ));
    }

    request_token(
        http_client,
        config.request,
        metadata.token_endpoint(),
        TokenRequest::AuthorizationCode {
            code: &code,
            code_verifier: &exchange.code_verifier,
            redirect_uri: exchange.redirect_uri.as_deref(),
            client_id: exchange.client_id.as_deref(),
        },
    )
    .await
}

async fn request_token<C: AsyncHttpClient + ?Sized>(
    http_client: &C,
    limits: RequestLimits,
    token_endpoint: &Url,
    body: TokenRequest<'_>,
) -> Result<AccessTokenGrant, Error> {
    debug!(
        grant_type = body.grant_type().as_str(),
        %token_endpoint,
        "requesting access token"
    );

    let form = serde_urlencoded::to_string(&body)
        .map_err(|e| Error::failed(Operation::TokenAcquisition, e))?;
    let request = base_request()
        .method(Method::POST)
        .uri(token_endpoint.as_str())
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(form.into_bytes())
        .map_err(|e| Error::failed(Operation::TokenAcquisition, e))?;
    let response = send_bounded(http_client, request, limits)
        .await
        .map_err(|e| Error::failed(Operation::TokenAcquisition, e))?;

    let status = response.status();
    let object = json_object_body(response.body())?;
    if !status.is_success() {
        let details = ErrorResponse::from_json(object.into());
        warn!(%status, error = details.error.as_str(), "token request was unsuccessful");
        return Err(Error::rejected(Operation::TokenAcquisition, status, details));
    }

    AccessTokenGrant::try_from(object).map_err(|e| Error::malformed(format!("{e:#}")))
}
