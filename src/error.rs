//! Error taxonomy shared by the token manager and the resource fetcher.
//!
//! - `TransportError`: connection or timeout failures below HTTP.
//! - `AuthError`: anything that goes wrong while obtaining a token.
//! - `FetchError`: failures of authenticated resource calls.

use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connect or overall request timeout elapsed.
    Timeout(String),
    /// DNS, TLS, socket or protocol failure.
    Connection(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout(s) => write!(f, "request timed out: {}", s),
            TransportError::Connection(s) => write!(f, "connection error: {}", s),
        }
    }
}

impl Error for TransportError {}

impl From<ureq::Error> for TransportError {
    fn from(value: ureq::Error) -> Self {
        match value {
            err @ ureq::Error::Timeout(_) => TransportError::Timeout(err.to_string()),
            other => TransportError::Connection(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    Network(TransportError),
    /// The legacy authorize endpoint answered without a redirect.
    InvalidCredentials { status: u16, body: String },
    /// The redirect carried no usable `code` query parameter.
    CodeExtractionFailed { headers: String },
    /// The token endpoint refused the code (or refresh token).
    TokenRejected { status: u16, body: String },
    MalformedTokenResponse(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Network(e) => write!(f, "network error during login: {}", e),
            AuthError::InvalidCredentials { status, body } => {
                write!(f, "invalid credentials or consumer key (http {}): {}", status, body)
            }
            AuthError::CodeExtractionFailed { headers } => {
                write!(f, "failed extracting authorization code, headers: {}", headers)
            }
            AuthError::TokenRejected { status, body } => write!(f, "token endpoint http {}: {}", status, body),
            AuthError::MalformedTokenResponse(e) => write!(f, "malformed token response: {}", e),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AuthError::Network(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for AuthError {
    fn from(value: TransportError) -> Self {
        AuthError::Network(value)
    }
}

#[derive(Debug)]
pub enum FetchError {
    Transport(TransportError),
    Auth(AuthError),
    /// Non-success status together with the raw response body.
    Http { status: u16, body: String },
    /// Body did not match the expected shape; `path` points at the offending field.
    Decode { path: String, message: String },
    /// The status endpoint kept answering 202 for every allowed attempt.
    PollingExhausted { attempts: u32 },
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(e) => write!(f, "transport error: {}", e),
            FetchError::Auth(e) => write!(f, "auth error: {}", e),
            FetchError::Http { status, body } => write!(f, "http {}: {}", status, body),
            FetchError::Decode { path, message } => write!(f, "json error at {}: {}", path, message),
            FetchError::PollingExhausted { attempts } => {
                write!(f, "status still pending after {} attempt(s)", attempts)
            }
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FetchError::Transport(e) => Some(e),
            FetchError::Auth(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(value: TransportError) -> Self {
        FetchError::Transport(value)
    }
}

impl From<AuthError> for FetchError {
    fn from(value: AuthError) -> Self {
        FetchError::Auth(value)
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for FetchError {
    fn from(value: serde_path_to_error::Error<serde_json::Error>) -> Self {
        FetchError::Decode {
            path: value.path().to_string(),
            message: value.into_inner().to_string(),
        }
    }
}
