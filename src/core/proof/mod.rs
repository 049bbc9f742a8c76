use anyhow::Result;
use async_trait::async_trait;
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Lifetime of a proof when no expiry is supplied.
pub const DEFAULT_PROOF_LIFETIME: Duration = Duration::seconds(300);

/// The only `proof_type` this client produces.
pub const PROOF_TYPE_JWT: &str = "jwt";

/// Capability that signs proofs of possession on behalf of the holder.
///
/// Key material stays with the implementor; this crate only sees the algorithm, the key
/// identifier and the produced signature.
#[async_trait]
pub trait ProofSigner {
    /// The JWS algorithm that will be used to sign, e.g. `ES256`.
    fn algorithm(&self) -> &str;
    /// The key identifier placed in the `kid` header, typically a DID URL.
    fn id(&self) -> &str;
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofHeader {
    pub alg: String,
    pub kid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofClaims {
    pub iss: String,
    pub aud: String,
    pub nonce: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Builds the compact JWS a holder sends to prove control of its DID, bound to a `c_nonce`.
///
/// `nbf` defaults to now and `exp` to now plus [DEFAULT_PROOF_LIFETIME]. `iat` is set to `nbf`,
/// so the output only varies with the signature for fixed inputs.
#[derive(Debug, Clone)]
pub struct ProofJwtBuilder {
    nonce: String,
    issuer: String,
    audience: String,
    expires_at: Option<OffsetDateTime>,
    not_before: Option<OffsetDateTime>,
}

impl ProofJwtBuilder {
    pub fn new(
        nonce: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            nonce: nonce.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            expires_at: None,
            not_before: None,
        }
    }

    pub fn expires_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn not_before(mut self, not_before: OffsetDateTime) -> Self {
        self.not_before = Some(not_before);
        self
    }

    pub fn claims(&self) -> ProofClaims {
        let now = OffsetDateTime::now_utc();
        let nbf = self.not_before.unwrap_or(now).unix_timestamp();
        let exp = self
            .expires_at
            .unwrap_or(now + DEFAULT_PROOF_LIFETIME)
            .unix_timestamp();
        ProofClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            nonce: self.nonce.clone(),
            iat: nbf,
            nbf,
            exp,
        }
    }

    /// Sign the proof. Errors from `signer` are returned as they are.
    pub async fn build<S: ProofSigner + ?Sized>(&self, signer: &S) -> Result<String> {
        let header = ProofHeader {
            alg: signer.algorithm().to_owned(),
            kid: signer.id().to_owned(),
        };
        make_jwt(&header, &self.claims(), signer).await
    }
}

async fn make_jwt<S: ProofSigner + ?Sized>(
    header: &ProofHeader,
    claims: &ProofClaims,
    signer: &S,
) -> Result<String> {
    let header_b64: String =
        serde_json::to_vec(header).map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))?;
    let body_b64 = serde_json::to_vec(claims).map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))?;
    let payload = [header_b64.as_bytes(), b".", body_b64.as_bytes()].concat();
    let signature = signer.sign(&payload).await?;
    let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{header_b64}.{body_b64}.{signature_b64}"))
}

#[cfg(test)]
mod test {
    use anyhow::bail;
    use time::macros::datetime;

    use super::*;

    /// Signs by reversing the input, enough to check what was signed.
    #[derive(Debug)]
    struct Reverse;

    #[async_trait]
    impl ProofSigner for Reverse {
        fn algorithm(&self) -> &str {
            "ES256"
        }

        fn id(&self) -> &str {
            "did:example:holder#key-1"
        }

        async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
            Ok(payload.iter().rev().copied().collect())
        }
    }

    #[derive(Debug)]
    struct Broken;

    #[async_trait]
    impl ProofSigner for Broken {
        fn algorithm(&self) -> &str {
            "ES256"
        }

        fn id(&self) -> &str {
            "did:example:holder#key-1"
        }

        async fn sign(&self, _payload: &[u8]) -> Result<Vec<u8>> {
            bail!("key is locked")
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(part: &str) -> T {
        serde_json::from_slice(&BASE64_URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap()
    }

    fn builder() -> ProofJwtBuilder {
        ProofJwtBuilder::new("abc123", "did:example:holder", "https://issuer.example")
            .not_before(datetime!(2024-01-01 00:00 UTC))
            .expires_at(datetime!(2024-01-01 00:05 UTC))
    }

    #[tokio::test]
    async fn compact_serialization() {
        let jwt = builder().build(&Reverse).await.unwrap();
        assert_eq!(jwt.matches('.').count(), 2);

        let parts: Vec<&str> = jwt.split('.').collect();
        let header: ProofHeader = decode(parts[0]);
        assert_eq!(
            header,
            ProofHeader {
                alg: "ES256".into(),
                kid: "did:example:holder#key-1".into()
            }
        );

        let claims: ProofClaims = decode(parts[1]);
        assert_eq!(
            claims,
            ProofClaims {
                iss: "did:example:holder".into(),
                aud: "https://issuer.example".into(),
                nonce: "abc123".into(),
                iat: 1704067200,
                nbf: 1704067200,
                exp: 1704067500,
            }
        );

        let signing_input = format!("{}.{}", parts[0], parts[1]);
        let signature = BASE64_URL_SAFE_NO_PAD.decode(parts[2]).unwrap();
        let expected: Vec<u8> = signing_input.bytes().rev().collect();
        assert_eq!(signature, expected);
    }

    #[tokio::test]
    async fn deterministic_for_fixed_inputs() {
        let a = builder().build(&Reverse).await.unwrap();
        let b = builder().build(&Reverse).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn default_lifetime() {
        let claims = ProofJwtBuilder::new("n", "iss", "aud").claims();
        assert_eq!(claims.exp - claims.nbf, 300);
        assert_eq!(claims.iat, claims.nbf);
    }

    #[tokio::test]
    async fn signer_error_propagates() {
        let err = builder().build(&Broken).await.unwrap_err();
        assert_eq!(err.to_string(), "key is locked");
    }
}
