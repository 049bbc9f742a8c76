use std::{fmt, sync::Arc};

use http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Method, StatusCode,
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::ClientConfig,
    core::{
        credential::{CredentialRequest, CredentialResponse, ProofChallenge, ProofOfPossession},
        metadata::IssuerMetadata,
        proof::{ProofJwtBuilder, ProofSigner},
        token::{
            acquire_by_authorization_code, acquire_pre_authorized, AccessTokenGrant,
            AuthorizationCodeExchange,
        },
        util::{base_request, json_body, send_bounded, AsyncHttpClient},
    },
    error::{Error, ErrorResponse, Operation},
};

/// Credential requests sent per delivery: the initial one, plus one retry carrying a proof.
///
/// A challenge received in answer to the retry is treated as a failure rather than looping.
pub const MAX_ATTEMPTS: usize = 2;

/// The identity a proof of possession is made for.
#[derive(Clone)]
pub struct Holder {
    did: String,
    signer: Arc<dyn ProofSigner + Send + Sync>,
}

impl Holder {
    pub fn new(did: impl Into<String>, signer: Arc<dyn ProofSigner + Send + Sync>) -> Self {
        Self {
            did: did.into(),
            signer,
        }
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn signer(&self) -> &(dyn ProofSigner + Send + Sync) {
        self.signer.as_ref()
    }
}

/// Requests credentials from an issuer on behalf of a holder, using an access token that has
/// already been obtained.
///
/// The client holds no mutable state and can be shared between concurrent deliveries.
#[derive(Clone)]
pub struct DeliveryClient {
    http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
    config: ClientConfig,
    metadata: IssuerMetadata,
    grant: AccessTokenGrant,
}

enum Submission {
    Issued(CredentialResponse),
    Rejected {
        status: StatusCode,
        details: ErrorResponse,
    },
}

impl DeliveryClient {
    pub fn new(
        http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
        config: ClientConfig,
        metadata: IssuerMetadata,
        grant: AccessTokenGrant,
    ) -> Self {
        Self {
            http_client,
            config,
            metadata,
            grant,
        }
    }

    /// Discover the issuer at `issuer_url` and redeem a pre-authorized code.
    pub async fn from_pre_authorized_code(
        http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
        config: ClientConfig,
        issuer_url: &str,
        pre_authorized_code: &str,
        user_pin: Option<&str>,
    ) -> Result<Self, Error> {
        let (grant, metadata) = acquire_pre_authorized(
            http_client.as_ref(),
            &config,
            issuer_url,
            pre_authorized_code,
            user_pin,
        )
        .await?;
        Ok(Self::new(http_client, config, metadata, grant))
    }

    /// Redeem the authorization code carried by an authorization redirect.
    pub async fn from_authorization_code(
        http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
        config: ClientConfig,
        metadata: IssuerMetadata,
        redirect_url: &Url,
        exchange: &AuthorizationCodeExchange,
    ) -> Result<Self, Error> {
        let grant = acquire_by_authorization_code(
            http_client.as_ref(),
            &config,
            &metadata,
            redirect_url,
            exchange,
        )
        .await?;
        Ok(Self::new(http_client, config, metadata, grant))
    }

    pub fn metadata(&self) -> &IssuerMetadata {
        &self.metadata
    }

    pub fn access_token_grant(&self) -> &AccessTokenGrant {
        &self.grant
    }

    /// Request a credential.
    ///
    /// If the credential endpoint answers with an `invalid_or_missing_proof` challenge, a proof
    /// of possession is built for `holder` with the returned `c_nonce` and the request is sent
    /// once more. Without a `holder` the challenge fails with [Error::NotAllowed].
    pub async fn request_delivery(
        &self,
        mut request: CredentialRequest,
        holder: Option<&Holder>,
    ) -> Result<CredentialResponse, Error> {
        let endpoint = self.metadata.credential_endpoint().ok_or_else(|| {
            Error::malformed("issuer metadata does not advertise a credential_endpoint")
        })?;

        let mut attempt = 1;
        loop {
            debug!(attempt, %endpoint, "requesting credential");

            let (status, details) = match self.submit(endpoint, &request).await? {
                Submission::Issued(response) => return Ok(response),
                Submission::Rejected { status, details } => (status, details),
            };

            let challenge = if status == StatusCode::BAD_REQUEST {
                ProofChallenge::from_error(&details)
            } else {
                None
            };

            match challenge {
                Some(challenge) if attempt < MAX_ATTEMPTS => {
                    debug!("credential endpoint requires a proof of possession");
                    let Some(holder) = holder else {
                        return Err(Error::NotAllowed {
                            message: "credential endpoint requires a proof of possession, \
                                      but no holder was supplied"
                                .into(),
                            details: Some(details),
                        });
                    };
                    request.proof = Some(self.prove(holder, challenge).await?);
                    attempt += 1;
                }
                Some(_) => {
                    warn!("credential endpoint rejected the proof of possession");
                    return Err(Error::rejected(Operation::Delivery, status, details));
                }
                None => {
                    warn!(%status, error = details.error.as_str(), "credential request was unsuccessful");
                    return Err(Error::rejected(Operation::Delivery, status, details));
                }
            }
        }
    }

    async fn prove(
        &self,
        holder: &Holder,
        challenge: ProofChallenge,
    ) -> Result<ProofOfPossession, Error> {
        if holder.did().is_empty() {
            return Err(Error::type_mismatch("holder DID must be a non-empty string"));
        }
        let jwt = ProofJwtBuilder::new(
            challenge.nonce,
            holder.did(),
            self.metadata.issuer().as_str(),
        )
        .build(holder.signer())
        .await
        .map_err(|e| Error::failed(Operation::Delivery, e))?;
        Ok(ProofOfPossession::jwt(jwt))
    }

    async fn submit(
        &self,
        endpoint: &Url,
        request: &CredentialRequest,
    ) -> Result<Submission, Error> {
        let body =
            serde_json::to_vec(request).map_err(|e| Error::failed(Operation::Delivery, e))?;
        let http_request = base_request()
            .method(Method::POST)
            .uri(endpoint.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.grant.access_token()),
            )
            .body(body)
            .map_err(|e| Error::failed(Operation::Delivery, e))?;
        let response = send_bounded(self.http_client.as_ref(), http_request, self.config.request)
            .await
            .map_err(|e| Error::failed(Operation::Delivery, e))?;

        let status = response.status();
        let body = json_body(response.body())?;
        if status.is_success() {
            let response = serde_json::from_value(body)
                .map_err(|e| Error::malformed(format!("invalid credential response: {e}")))?;
            return Ok(Submission::Issued(response));
        }

        Ok(Submission::Rejected {
            status,
            details: ErrorResponse::from_json(body),
        })
    }
}

impl fmt::Debug for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("did", &self.did)
            .field("algorithm", &self.signer.algorithm())
            .field("kid", &self.signer.id())
            .finish()
    }
}

impl fmt::Debug for DeliveryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryClient")
            .field("config", &self.config)
            .field("metadata", &self.metadata)
            .field("grant", &self.grant)
            .finish_non_exhaustive()
    }
}
