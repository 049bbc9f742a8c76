use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::ErrorResponse;

use super::proof::PROOF_TYPE_JWT;

/// Body of a credential endpoint request.
///
/// `proof` is left empty by callers; the delivery client fills it in after a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRequest {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ProofOfPossession>,
}

impl CredentialRequest {
    pub fn new(credential_type: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            credential_type: credential_type.into(),
            format: format.into(),
            proof: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfPossession {
    pub proof_type: String,
    pub jwt: String,
}

impl ProofOfPossession {
    pub fn jwt(jwt: String) -> Self {
        Self {
            proof_type: PROOF_TYPE_JWT.to_owned(),
            jwt,
        }
    }
}

/// A `c_nonce` the credential endpoint wants embedded in the next proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofChallenge {
    pub nonce: String,
}

impl ProofChallenge {
    /// Extract a challenge from an `invalid_or_missing_proof` error body.
    pub fn from_error(response: &ErrorResponse) -> Option<Self> {
        if !response.is_invalid_or_missing_proof() {
            return None;
        }
        let nonce = response.c_nonce.as_deref().filter(|n| !n.is_empty())?;
        Some(Self {
            nonce: nonce.to_owned(),
        })
    }
}

/// A successful credential endpoint response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub format: String,
    pub credential: Map<String, Json>,
}
