//! This library provides a wallet-side client for [OpenID4VCI] credential delivery using the
//! pre-authorized code flow.
//!
//! [OpenID4VCI]: <https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0.html>
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use openid4vci::config::ClientConfig;
//! use openid4vci::core::credential::CredentialRequest;
//! use openid4vci::core::util::ReqwestClient;
//! use openid4vci::delivery::{DeliveryClient, Holder};
//!
//! // Discover the issuer and redeem the pre-authorized code from a credential offer.
//! let client = DeliveryClient::from_pre_authorized_code(
//!     Arc::new(ReqwestClient::new()?),
//!     ClientConfig::default(),
//!     "https://issuer.example.com/exchangers/z19uMCiPNET4YbcPpBcab5mEE",
//!     "SplxlOBeZQQYbYS6WxSbIA",
//!     None,
//! )
//! .await?;
//!
//! // Request the credential. If the issuer asks for a proof of possession, one is signed by
//! // `signer` for the holder DID and the request is retried once.
//! let holder = Holder::new("did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK", signer);
//! let response = client
//!     .request_delivery(
//!         CredentialRequest::new("UniversityDegreeCredential", "ldp_vc"),
//!         Some(&holder),
//!     )
//!     .await?;
//! ```
//!
//! # Protocol Overview
//!
//! 1. *Discovery*: issuer metadata is fetched from
//!    `<origin>/.well-known/oauth-authorization-server<path>` and the published `issuer` is
//!    checked against that URL as required by RFC 8414. See [`core::metadata`].
//! 2. *Token*: the pre-authorized code (and optional PIN) is exchanged at the
//!    `token_endpoint` for a bearer [`AccessTokenGrant`]. See [`core::token`].
//! 3. *Credential*: the [`CredentialRequest`] is posted to the `credential_endpoint`. An
//!    `invalid_or_missing_proof` answer carries a `c_nonce`, which is embedded in a proof JWT
//!    built by [`ProofJwtBuilder`] before the single retry. See [`delivery`].
//!
//! Failures are reported as [`Error`], whose [`kind`](Error::kind) distinguishes caller
//! mistakes, malformed server responses, refused authorization, and failed operations.
//!
//! [`AccessTokenGrant`]: crate::core::token::AccessTokenGrant
//! [`CredentialRequest`]: crate::core::credential::CredentialRequest
//! [`ProofJwtBuilder`]: crate::core::proof::ProofJwtBuilder

pub mod config;
pub mod core;
pub mod delivery;
pub mod error;

pub use error::{Error, ErrorKind};
