use std::{collections::VecDeque, sync::Mutex};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::{header::AUTHORIZATION, Request, Response};
use openid4vci::{core::proof::ProofSigner, core::util::AsyncHttpClient};
use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use serde_json::{json, Value as Json};

pub const ISSUER: &str = "https://issuer.example/exchangers/z19uMCiPNET4YbcPpBcab5mEE";
pub const CONFIG_URL: &str =
    "https://issuer.example/.well-known/oauth-authorization-server/exchangers/z19uMCiPNET4YbcPpBcab5mEE";
pub const HOLDER_DID: &str = "did:key:zDnaeaDj3YpPR4JXos2kCCNPS86hdELeN5PZh97KGkoFzUtGn";

/// A request received by [MockIssuer].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn json(&self) -> Json {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn form(&self) -> Vec<(String, String)> {
        serde_urlencoded::from_bytes(&self.body).unwrap()
    }
}

/// An issuance server answering discovery, token and credential requests from scripted
/// responses.
pub struct MockIssuer {
    metadata: Json,
    token: (u16, Json),
    credential: Mutex<VecDeque<(u16, Vec<u8>)>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockIssuer {
    pub fn new() -> Self {
        Self {
            metadata: json!({
                "issuer": ISSUER,
                "token_endpoint": format!("{ISSUER}/token"),
                "credential_endpoint": format!("{ISSUER}/credential"),
                "jwks_uri": format!("{ISSUER}/jwks"),
            }),
            token: (
                200,
                json!({
                    "access_token": "abc",
                    "token_type": "bearer",
                    "expires_in": 86400
                }),
            ),
            credential: Default::default(),
            requests: Default::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: Json) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_token_response(mut self, status: u16, body: Json) -> Self {
        self.token = (status, body);
        self
    }

    /// Queue the next credential endpoint response.
    pub fn then_credential(self, status: u16, body: Json) -> Self {
        self.then_credential_raw(status, serde_json::to_vec(&body).unwrap())
    }

    pub fn then_credential_raw(self, status: u16, body: Vec<u8>) -> Self {
        self.credential.lock().unwrap().push_back((status, body));
        self
    }

    pub fn requests(&self, suffix: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path.ends_with(suffix))
            .cloned()
            .collect()
    }
}

pub fn challenge(nonce: &str) -> Json {
    json!({
        "error": "invalid_or_missing_proof",
        "error_description": "Credential request must include a proof of possession.",
        "c_nonce": nonce,
        "c_nonce_expires_in": 300
    })
}

pub fn degree() -> Json {
    json!({
        "format": "ldp_vc",
        "credential": {
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiableCredential", "UniversityDegreeCredential"],
            "credentialSubject": { "id": HOLDER_DID }
        }
    })
}

#[async_trait]
impl AsyncHttpClient for MockIssuer {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let path = request.uri().path().to_owned();
        self.requests.lock().unwrap().push(Recorded {
            path: path.clone(),
            authorization: request
                .headers()
                .get(AUTHORIZATION)
                .map(|v| v.to_str().unwrap().to_owned()),
            body: request.body().clone(),
        });

        let (status, body) = if path.starts_with("/.well-known/oauth-authorization-server") {
            (200, serde_json::to_vec(&self.metadata)?)
        } else if path.ends_with("/token") {
            (self.token.0, serde_json::to_vec(&self.token.1)?)
        } else if path.ends_with("/credential") {
            self.credential
                .lock()
                .unwrap()
                .pop_front()
                .context("no credential response queued")?
        } else {
            bail!("unexpected request to {path}")
        };

        Response::builder()
            .status(status)
            .body(body)
            .context("failed to build response")
    }
}

/// ES256 signer over a fixed test key. Has no `Debug` impl.
pub struct P256Signer {
    key: SigningKey,
    id: String,
}

impl P256Signer {
    pub fn new() -> Self {
        Self {
            key: SigningKey::from_slice(&[7u8; 32]).unwrap(),
            id: format!("{HOLDER_DID}#{}", HOLDER_DID.trim_start_matches("did:key:")),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey::from(&self.key)
    }
}

#[async_trait]
impl ProofSigner for P256Signer {
    fn algorithm(&self) -> &str {
        "ES256"
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let sig: Signature = self.key.sign(payload);
        Ok(sig.to_vec())
    }
}
