//! Single-account client for the Toon API.
//!
//! - Blocking; every call returns once a terminal response is obtained.
//! - Holds the current token and runs `ensure_valid` before each resource
//!   call, logging in again when needed.
//! - The token lives in a `RefCell`, so a client is `!Sync`; wrap it in a
//!   `Mutex` to share it between threads.

use chrono::{DateTime, Utc};
use std::cell::RefCell;

use crate::auth::{self, Credentials, NoRenewal, RefreshGrant, Token, TokenRenewal};
use crate::config::Config;
use crate::endpoints::Endpoints;
use crate::error::{AuthError, FetchError};
use crate::models::toon::{Agreement, AgreementId, FlowChannel, FlowData, StatusSnapshot};
use crate::resources::{self, PollPolicy};
use crate::transport::{HttpTransport, UreqTransport};

pub struct ToonClient<T: HttpTransport = UreqTransport> {
    transport: T,
    endpoints: Endpoints,
    credentials: Credentials,
    poll: PollPolicy,
    renewal: Box<dyn TokenRenewal>,
    token: RefCell<Option<Token>>,
}

impl ToonClient<UreqTransport> {
    /// Client against the public API with default timeouts and polling.
    pub fn new(credentials: Credentials) -> Self {
        ToonClient::with_transport(credentials, UreqTransport::default())
    }

    pub fn from_config(cfg: &Config) -> Self {
        let client = ToonClient::with_transport(cfg.credentials.clone(), UreqTransport::new(cfg.timeouts))
            .with_endpoints(Endpoints::new(cfg.base_url.clone()))
            .with_poll_policy(cfg.status_poll);
        if cfg.refresh_grant {
            client.with_renewal(RefreshGrant)
        } else {
            client
        }
    }
}

impl<T: HttpTransport> ToonClient<T> {
    pub fn with_transport(credentials: Credentials, transport: T) -> Self {
        ToonClient {
            transport,
            endpoints: Endpoints::default(),
            credentials,
            poll: PollPolicy::default(),
            renewal: Box::new(NoRenewal),
            token: RefCell::new(None),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_renewal(mut self, renewal: impl TokenRenewal + 'static) -> Self {
        self.renewal = Box::new(renewal);
        self
    }

    /// Current token, if a login has happened and has not been discarded.
    pub fn token(&self) -> Option<Token> {
        self.token.borrow().clone()
    }

    /// Run the full login flow regardless of the current token.
    pub fn acquire_token(&self) -> Result<Token, AuthError> {
        let result = auth::acquire_token(&self.transport, &self.endpoints, &self.credentials);
        self.store(result)
    }

    pub fn ensure_valid(&self) -> Result<Token, AuthError> {
        self.ensure_valid_at(Utc::now())
    }

    fn ensure_valid_at(&self, now: DateTime<Utc>) -> Result<Token, AuthError> {
        let current = self.token.borrow().clone();
        let result = auth::ensure_valid(
            &self.transport,
            &self.endpoints,
            &self.credentials,
            self.renewal.as_ref(),
            current.as_ref(),
            now,
        );
        self.store(result)
    }

    fn store(&self, result: Result<Token, AuthError>) -> Result<Token, AuthError> {
        let mut slot = self.token.borrow_mut();
        match result {
            Ok(token) => {
                *slot = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                *slot = None;
                Err(e)
            }
        }
    }

    pub fn list_agreements(&self) -> Result<Vec<Agreement>, FetchError> {
        let token = self.ensure_valid()?;
        resources::list_agreements(&self.transport, &self.endpoints, &token)
    }

    pub fn get_status(&self, agreement_id: &AgreementId) -> Result<StatusSnapshot, FetchError> {
        let token = self.ensure_valid()?;
        resources::get_status(&self.transport, &self.endpoints, &token, agreement_id, &self.poll)
    }

    pub fn get_gas_flow(
        &self,
        agreement_id: &AgreementId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<FlowData, FetchError> {
        self.get_flow(agreement_id, FlowChannel::Gas, from, to)
    }

    pub fn get_electricity_flow(
        &self,
        agreement_id: &AgreementId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<FlowData, FetchError> {
        self.get_flow(agreement_id, FlowChannel::Electricity, from, to)
    }

    pub fn get_flow(
        &self,
        agreement_id: &AgreementId,
        channel: FlowChannel,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<FlowData, FetchError> {
        let token = self.ensure_valid()?;
        resources::get_flow(&self.transport, &self.endpoints, &token, agreement_id, channel, from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::ScriptedTransport;
    use chrono::Duration;
    use std::num::NonZeroU32;
    use std::time::Duration as StdDuration;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/data/{name}")).expect("fixture present")
    }

    fn client(t: &ScriptedTransport) -> ToonClient<ScriptedTransport> {
        let creds = Credentials::new("user", "pass", "eneco", "key", "secret");
        ToonClient::with_transport(creds, t.clone())
            .with_endpoints(Endpoints::new("https://api.example.test"))
            .with_poll_policy(PollPolicy {
                max_attempts: NonZeroU32::new(3).unwrap(),
                delay: StdDuration::ZERO,
            })
    }

    fn script_login(t: &ScriptedTransport) {
        t.push_with_headers(302, &[("location", "/cb?code=c0de")], "")
            .push(200, &fixture("token.json"));
    }

    #[test]
    fn logs_in_once_and_reuses_token() {
        let t = ScriptedTransport::new();
        script_login(&t);
        t.push(200, &fixture("agreements.json")).push(200, &fixture("agreements.json"));

        let c = client(&t);
        assert!(c.token().is_none());
        assert_eq!(c.list_agreements().unwrap().len(), 2);
        assert!(c.token().is_some());
        assert_eq!(c.list_agreements().unwrap().len(), 2);

        let urls: Vec<String> = t.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://api.example.test/authorize/legacy",
                "https://api.example.test/token",
                "https://api.example.test/toon/v3/agreements",
                "https://api.example.test/toon/v3/agreements",
            ]
        );
    }

    #[test]
    fn relogs_after_expiry() {
        let t = ScriptedTransport::new();
        script_login(&t);
        script_login(&t);

        let c = client(&t);
        let first = c.ensure_valid().unwrap();
        c.ensure_valid_at(first.access_expires_at + Duration::seconds(1)).unwrap();
        assert_eq!(t.requests().len(), 4);
    }

    #[test]
    fn status_goes_through_polling() {
        let t = ScriptedTransport::new();
        script_login(&t);
        t.push(202, "").push(200, &fixture("status.json"));

        let c = client(&t);
        let status = c.get_status(&AgreementId("1234567".into())).unwrap();
        assert!(status.gas_usage.is_some());
        assert_eq!(t.requests().len(), 4);
    }

    #[test]
    fn failed_login_leaves_no_token() {
        let t = ScriptedTransport::new();
        t.push(401, "bad consumer key");

        let c = client(&t);
        match c.get_gas_flow(&AgreementId("1".into()), None, None) {
            Err(FetchError::Auth(AuthError::InvalidCredentials { status, .. })) => assert_eq!(status, 401),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(c.token().is_none());
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn client_can_be_shared_behind_a_mutex() {
        assert_send::<ToonClient<UreqTransport>>();
        let shared = std::sync::Arc::new(std::sync::Mutex::new(ToonClient::new(Credentials::new(
            "user", "pass", "eneco", "key", "secret",
        ))));
        let worker = {
            let shared = std::sync::Arc::clone(&shared);
            std::thread::spawn(move || shared.lock().map(|c| c.token().is_none()).unwrap_or(false))
        };
        assert!(worker.join().unwrap());
    }

    #[test]
    fn refresh_grant_is_used_when_configured() {
        let t = ScriptedTransport::new();
        script_login(&t);
        t.push(200, &fixture("token.json"));

        let c = client(&t).with_renewal(RefreshGrant);
        let first = c.acquire_token().unwrap();
        c.ensure_valid_at(first.access_expires_at).unwrap();

        let reqs = t.requests();
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[2].form_value("grant_type"), Some("refresh_token"));
    }
}
