//! Credential and token management for the Toon API.
//!
//! Login uses the provider's legacy flow, since its OAuth server offers no
//! redirect a headless client can intercept:
//! 1. POST the account credentials to `/authorize/legacy`; the answer is a 302
//!    whose `Location` carries an authorization `code`.
//! 2. Pull `code` out of the redirect target.
//! 3. Exchange the code at `/token` for an access/refresh token pair.
//!
//! Expiry instants are shortened by [`EXPIRY_MARGIN_SECS`] so a token is never
//! used during its last moments of validity.

use chrono::{DateTime, Duration, Utc};
use http::StatusCode;
use log::{debug, info, warn};
use serde::Deserialize;
use url::Url;

use crate::endpoints::Endpoints;
use crate::error::AuthError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::utils::de_lenient_secs;

pub const EXPIRY_MARGIN_SECS: i64 = 180;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Tenant the account belongs to (e.g. `eneco`, `viesgo`).
    pub tenant_id: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        tenant_id: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
            tenant_id: tenant_id.into(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

impl Token {
    /// Both the access and the refresh token must still be ahead of `now`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at > now && self.access_expires_at > now
    }

    pub fn can_refresh(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at > now
    }
}

impl core::fmt::Debug for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_token", &"<redacted>")
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(deserialize_with = "de_lenient_secs")]
    expires_in: i64,
    refresh_token: String,
    #[serde(deserialize_with = "de_lenient_secs")]
    refresh_token_expires_in: i64,
}

impl TokenResponse {
    fn into_token(self, issued_at: DateTime<Utc>) -> Result<Token, AuthError> {
        Ok(Token {
            access_expires_at: expiry_after(issued_at, self.expires_in, "expires_in")?,
            refresh_expires_at: expiry_after(issued_at, self.refresh_token_expires_in, "refresh_token_expires_in")?,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        })
    }
}

/// `issued_at + lifetime - EXPIRY_MARGIN_SECS`, rejecting lifetimes chrono cannot represent.
fn expiry_after(issued_at: DateTime<Utc>, lifetime_secs: i64, field: &str) -> Result<DateTime<Utc>, AuthError> {
    lifetime_secs
        .checked_sub(EXPIRY_MARGIN_SECS)
        .and_then(Duration::try_seconds)
        .and_then(|d| issued_at.checked_add_signed(d))
        .ok_or_else(|| AuthError::MalformedTokenResponse(format!("{}: lifetime out of range: {}", field, lifetime_secs)))
}

/// Run the full legacy login and return a fresh token pair.
pub fn acquire_token<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoints: &Endpoints,
    credentials: &Credentials,
) -> Result<Token, AuthError> {
    let code = request_authorization_code(transport, endpoints, credentials)?;
    debug!("Authorization code received; exchanging for token");

    let issued_at = Utc::now();
    let req = HttpRequest::post_form(
        endpoints.token(),
        vec![
            ("client_id", credentials.consumer_key.clone()),
            ("client_secret", credentials.consumer_secret.clone()),
            ("grant_type", "authorization_code".to_string()),
            ("code", code),
        ],
    )
    .header("accept", "application/json");
    let token = parse_token_response(&transport.send(&req)?, issued_at)?;

    info!(
        "Logged in to Toon API as {} (tenant {}), access token valid until {}",
        credentials.username, credentials.tenant_id, token.access_expires_at
    );
    Ok(token)
}

fn request_authorization_code<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoints: &Endpoints,
    credentials: &Credentials,
) -> Result<String, AuthError> {
    let authorize_url = endpoints.authorize_legacy();
    let req = HttpRequest::post_form(
        authorize_url.clone(),
        vec![
            ("client_id", credentials.consumer_key.clone()),
            ("tenant_id", credentials.tenant_id.clone()),
            ("username", credentials.username.clone()),
            ("password", credentials.password.clone()),
            ("response_type", "code".to_string()),
            ("state", String::new()),
            ("scope", String::new()),
        ],
    );
    let resp = transport.send(&req)?;

    if !is_login_redirect(resp.status) {
        return Err(AuthError::InvalidCredentials {
            status: resp.status.as_u16(),
            body: resp.body,
        });
    }

    extract_code(&authorize_url, &resp).ok_or_else(|| AuthError::CodeExtractionFailed {
        headers: resp.describe_headers(),
    })
}

/// Redirect codes that carry a `Location`; 300 and 304 do not count.
fn is_login_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Resolve `Location` against the authorize URL and read its `code` parameter.
fn extract_code(authorize_url: &str, resp: &HttpResponse) -> Option<String> {
    let location = resp.header("location")?;
    let target = Url::parse(authorize_url).ok()?.join(location).ok()?;
    target
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .filter(|code| !code.is_empty())
}

fn parse_token_response(resp: &HttpResponse, issued_at: DateTime<Utc>) -> Result<Token, AuthError> {
    if resp.status != StatusCode::OK {
        return Err(AuthError::TokenRejected {
            status: resp.status.as_u16(),
            body: resp.body.clone(),
        });
    }
    let de = &mut serde_json::Deserializer::from_str(&resp.body);
    let parsed: TokenResponse =
        serde_path_to_error::deserialize(de).map_err(|e| AuthError::MalformedTokenResponse(e.to_string()))?;
    parsed.into_token(issued_at)
}

/// Optional shortcut for renewing an expired access token without a full
/// login. Returning `Ok(None)` means "not supported, log in again".
pub trait TokenRenewal: Send + Sync {
    fn renew(
        &self,
        transport: &dyn HttpTransport,
        endpoints: &Endpoints,
        credentials: &Credentials,
        token: &Token,
    ) -> Result<Option<Token>, AuthError>;
}

/// Never renews; every expiry leads to a full login.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenewal;

impl TokenRenewal for NoRenewal {
    fn renew(
        &self,
        _transport: &dyn HttpTransport,
        _endpoints: &Endpoints,
        _credentials: &Credentials,
        _token: &Token,
    ) -> Result<Option<Token>, AuthError> {
        Ok(None)
    }
}

/// OAuth2 `refresh_token` grant against the token endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshGrant;

impl TokenRenewal for RefreshGrant {
    fn renew(
        &self,
        transport: &dyn HttpTransport,
        endpoints: &Endpoints,
        credentials: &Credentials,
        token: &Token,
    ) -> Result<Option<Token>, AuthError> {
        let issued_at = Utc::now();
        let req = HttpRequest::post_form(
            endpoints.token(),
            vec![
                ("client_id", credentials.consumer_key.clone()),
                ("client_secret", credentials.consumer_secret.clone()),
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", token.refresh_token.clone()),
            ],
        )
        .header("accept", "application/json");
        let renewed = parse_token_response(&transport.send(&req)?, issued_at)?;
        debug!("Access token renewed, valid until {}", renewed.access_expires_at);
        Ok(Some(renewed))
    }
}

/// Return `current` if it is still valid, otherwise a renewed or newly
/// acquired token. The caller stores the result in place of `current`.
pub fn ensure_valid(
    transport: &dyn HttpTransport,
    endpoints: &Endpoints,
    credentials: &Credentials,
    renewal: &dyn TokenRenewal,
    current: Option<&Token>,
    now: DateTime<Utc>,
) -> Result<Token, AuthError> {
    match current {
        Some(token) if token.is_valid(now) => return Ok(token.clone()),
        Some(token) if token.can_refresh(now) => match renewal.renew(transport, endpoints, credentials, token) {
            Ok(Some(renewed)) => return Ok(renewed),
            Ok(None) => debug!("Access token expired; logging in again"),
            Err(e) => warn!("Token renewal failed, falling back to full login: {}", e),
        },
        Some(_) => debug!("Refresh token expired; logging in again"),
        None => debug!("No token yet; logging in"),
    }
    acquire_token(transport, endpoints, credentials)
}
