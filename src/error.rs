use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Boxed lower-level cause carried by [Error::OperationFailed].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The `error` code a credential endpoint returns when it demands a proof of possession.
pub const INVALID_OR_MISSING_PROOF: &str = "invalid_or_missing_proof";

/// Errors surfaced by the public operations of this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller supplied a malformed argument.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A server body failed shape or content validation.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The server demands something the caller cannot supply, or rejected the authorization.
    #[error("not allowed: {message}")]
    NotAllowed {
        message: String,
        details: Option<ErrorResponse>,
    },

    /// An outer operation could not complete.
    #[error("{operation} failed: {cause}")]
    OperationFailed {
        operation: Operation,
        details: Option<ErrorResponse>,
        #[source]
        cause: BoxError,
    },
}

/// Discriminant of [Error], for callers that only care about the class of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TypeMismatch,
    MalformedResponse,
    NotAllowed,
    OperationFailed,
}

/// The outer operation an [Error::OperationFailed] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Discovery,
    TokenAcquisition,
    Delivery,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Discovery => f.write_str("issuer metadata discovery"),
            Operation::TokenAcquisition => f.write_str("access token acquisition"),
            Operation::Delivery => f.write_str("credential delivery"),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Error::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Error::NotAllowed { .. } => ErrorKind::NotAllowed,
            Error::OperationFailed { .. } => ErrorKind::OperationFailed,
        }
    }

    /// The error body returned by the server, if the failure carried one.
    pub fn details(&self) -> Option<&ErrorResponse> {
        match self {
            Error::NotAllowed { details, .. } | Error::OperationFailed { details, .. } => {
                details.as_ref()
            }
            Error::TypeMismatch(_) | Error::MalformedResponse(_) => None,
        }
    }

    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        Error::TypeMismatch(message.into())
    }

    pub(crate) fn malformed(message: impl fmt::Display) -> Self {
        Error::MalformedResponse(message.to_string())
    }

    pub(crate) fn failed(operation: Operation, cause: impl Into<BoxError>) -> Self {
        Error::OperationFailed {
            operation,
            details: None,
            cause: cause.into(),
        }
    }

    pub(crate) fn rejected(
        operation: Operation,
        status: http::StatusCode,
        details: ErrorResponse,
    ) -> Self {
        Error::OperationFailed {
            operation,
            cause: format!("server responded with status {status}: {}", details.error).into(),
            details: Some(details),
        }
    }
}

/// An OAuth 2.0 style error body, as returned by token and credential endpoints.
///
/// Members are read one by one. A known member with an unexpected type is left in `other`
/// instead of failing the whole body, so `error` and `c_nonce` survive a sloppy
/// `c_nonce_expires_in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Json")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_nonce_expires_in: Option<u64>,
    #[serde(flatten)]
    pub other: Map<String, Json>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: None,
            c_nonce: None,
            c_nonce_expires_in: None,
            other: Map::new(),
        }
    }

    /// Parse an error body, falling back to a synthetic `error` when the body is not an error
    /// object so the server's payload is never lost.
    pub(crate) fn from_json(value: Json) -> Self {
        let mut members = match value {
            Json::Object(members) if members.get("error").is_some_and(Json::is_string) => members,
            value => {
                let mut response = ErrorResponse::new("unknown_error");
                response.other.insert("body".into(), value);
                return response;
            }
        };

        let error = take(&mut members, "error", as_string).unwrap_or_default();
        Self {
            error,
            error_description: take(&mut members, "error_description", as_string),
            c_nonce: take(&mut members, "c_nonce", as_string),
            c_nonce_expires_in: take(&mut members, "c_nonce_expires_in", Json::as_u64),
            other: members,
        }
    }

    pub fn is_invalid_or_missing_proof(&self) -> bool {
        self.error == INVALID_OR_MISSING_PROOF
    }
}

impl From<Json> for ErrorResponse {
    fn from(value: Json) -> Self {
        Self::from_json(value)
    }
}

/// Remove `key` from `members` if `parse` accepts its value.
fn take<T>(
    members: &mut Map<String, Json>,
    key: &str,
    parse: impl Fn(&Json) -> Option<T>,
) -> Option<T> {
    let value = members.get(key).and_then(parse)?;
    members.remove(key);
    Some(value)
}

fn as_string(value: &Json) -> Option<String> {
    value.as_str().map(str::to_owned)
}
