//! Authenticated reads against the Toon v3 resource endpoints.
//!
//! Every function takes an already valid [`Token`]; obtaining one is the job of
//! [`crate::auth`]. Nothing here retries on failure. The only repeated request
//! is the status poll, where the server answers 202 while it assembles the
//! snapshot.

use chrono::{DateTime, Utc};
use http::StatusCode;
use log::debug;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::thread;
use std::time::Duration;

use crate::auth::Token;
use crate::endpoints::Endpoints;
use crate::error::FetchError;
use crate::models::toon::{Agreement, AgreementId, FlowChannel, FlowData, StatusSnapshot};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::utils::epoch_millis_param;

pub const DEFAULT_STATUS_MAX_ATTEMPTS: NonZeroU32 = NonZeroU32::new(30).unwrap();
pub const DEFAULT_STATUS_POLL_DELAY: Duration = Duration::from_secs(1);

/// Bounds the 202 polling loop of the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Total number of requests, including the first one.
    pub max_attempts: NonZeroU32,
    /// Pause between a 202 answer and the next request.
    pub delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            max_attempts: DEFAULT_STATUS_MAX_ATTEMPTS,
            delay: DEFAULT_STATUS_POLL_DELAY,
        }
    }
}

fn authorized_get(url: String, token: &Token) -> HttpRequest {
    HttpRequest::get(url)
        .header("authorization", format!("Bearer {}", token.access_token))
        .header("accept", "application/json")
        .header("content-type", "application/json")
        .header("cache-control", "no-cache")
}

fn expect_ok(resp: HttpResponse) -> Result<HttpResponse, FetchError> {
    if resp.status == StatusCode::OK {
        Ok(resp)
    } else {
        Err(FetchError::Http {
            status: resp.status.as_u16(),
            body: resp.body,
        })
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    let de = &mut serde_json::Deserializer::from_str(body);
    Ok(serde_path_to_error::deserialize(de)?)
}

pub fn list_agreements<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoints: &Endpoints,
    token: &Token,
) -> Result<Vec<Agreement>, FetchError> {
    let resp = expect_ok(transport.send(&authorized_get(endpoints.agreements(), token))?)?;
    let agreements: Vec<Agreement> = decode(&resp.body)?;
    debug!("Fetched {} agreement(s)", agreements.len());
    Ok(agreements)
}

/// Fetch the status snapshot, re-requesting while the server answers 202.
pub fn get_status<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoints: &Endpoints,
    token: &Token,
    agreement_id: &AgreementId,
    poll: &PollPolicy,
) -> Result<StatusSnapshot, FetchError> {
    let req = authorized_get(endpoints.status(agreement_id), token);
    let max_attempts = poll.max_attempts.get();

    for attempt in 1..=max_attempts {
        let resp = transport.send(&req)?;
        match resp.status {
            StatusCode::OK => return decode(&resp.body),
            StatusCode::ACCEPTED => {
                debug!(
                    "Status of agreement {} not ready (attempt {}/{})",
                    agreement_id, attempt, max_attempts
                );
                if attempt < max_attempts && !poll.delay.is_zero() {
                    thread::sleep(poll.delay);
                }
            }
            other => {
                return Err(FetchError::Http {
                    status: other.as_u16(),
                    body: resp.body,
                });
            }
        }
    }

    Err(FetchError::PollingExhausted {
        attempts: max_attempts,
    })
}

/// Fetch time-bucketed consumption for one channel.
///
/// `from`/`to` are sent as `fromTime`/`toTime` in epoch milliseconds; `None` or
/// the Unix epoch leaves the bound to the server (usually the last hour).
pub fn get_flow<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoints: &Endpoints,
    token: &Token,
    agreement_id: &AgreementId,
    channel: FlowChannel,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<FlowData, FetchError> {
    let mut req = authorized_get(endpoints.flows(agreement_id, channel), token);
    if let Some(ms) = epoch_millis_param(from) {
        req = req.query("fromTime", ms);
    }
    if let Some(ms) = epoch_millis_param(to) {
        req = req.query("toTime", ms);
    }

    let resp = expect_ok(transport.send(&req)?)?;
    decode(&resp.body)
}

pub fn get_gas_flow<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoints: &Endpoints,
    token: &Token,
    agreement_id: &AgreementId,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<FlowData, FetchError> {
    get_flow(transport, endpoints, token, agreement_id, FlowChannel::Gas, from, to)
}

pub fn get_electricity_flow<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoints: &Endpoints,
    token: &Token,
    agreement_id: &AgreementId,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<FlowData, FetchError> {
    get_flow(transport, endpoints, token, agreement_id, FlowChannel::Electricity, from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::scripted::ScriptedTransport;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/data/{name}")).expect("fixture present")
    }

    fn token() -> Token {
        let now = Utc::now();
        Token {
            access_token: "access-123".into(),
            access_expires_at: now + ChronoDuration::minutes(5),
            refresh_token: "refresh-456".into(),
            refresh_expires_at: now + ChronoDuration::days(30),
        }
    }

    fn endpoints() -> Endpoints {
        Endpoints::new("https://api.example.test")
    }

    fn no_delay(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            max_attempts: NonZeroU32::new(max_attempts).unwrap(),
            delay: Duration::ZERO,
        }
    }

    fn agreement() -> AgreementId {
        AgreementId("1234567".into())
    }

    #[test]
    fn list_agreements_sends_bearer_headers() {
        let t = ScriptedTransport::new();
        t.push(200, &fixture("agreements.json"));

        let agreements = list_agreements(&t, &endpoints(), &token()).unwrap();
        assert_eq!(agreements.len(), 2);

        let req = &t.requests()[0];
        assert_eq!(req.url, "https://api.example.test/toon/v3/agreements");
        assert_eq!(req.header_value("authorization"), Some("Bearer access-123"));
        assert_eq!(req.header_value("accept"), Some("application/json"));
        assert_eq!(req.header_value("content-type"), Some("application/json"));
        assert_eq!(req.header_value("cache-control"), Some("no-cache"));
    }

    #[test]
    fn list_agreements_keeps_status_and_body_on_failure() {
        let t = ScriptedTransport::new();
        t.push(500, "upstream broke");
        match list_agreements(&t, &endpoints(), &token()) {
            Err(FetchError::Http { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "upstream broke");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn list_agreements_reports_decode_path() {
        let t = ScriptedTransport::new();
        t.push(200, r#"[{"agreementId":"1","isToonSolar":"maybe"}]"#);
        match list_agreements(&t, &endpoints(), &token()) {
            Err(FetchError::Decode { path, .. }) => assert_eq!(path, "[0].isToonSolar"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn status_polls_until_ready() {
        let t = ScriptedTransport::new();
        t.push(202, "").push(202, "").push(200, &fixture("status.json"));

        let status = get_status(&t, &endpoints(), &token(), &agreement(), &no_delay(5)).unwrap();
        assert_eq!(status.thermostat_info.and_then(|i| i.current_display_temp), Some(2112));

        let reqs = t.requests();
        assert_eq!(reqs.len(), 3);
        assert!(reqs.iter().all(|r| r == &reqs[0]));
        assert_eq!(reqs[0].url, "https://api.example.test/toon/v3/1234567/status");
    }

    #[test]
    fn status_fails_fast_on_other_codes() {
        let t = ScriptedTransport::new();
        t.push(404, "no such agreement").push(200, &fixture("status.json"));

        match get_status(&t, &endpoints(), &token(), &agreement(), &no_delay(5)) {
            Err(FetchError::Http { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such agreement");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(t.requests().len(), 1);
    }

    #[test]
    fn status_polling_is_bounded() {
        let t = ScriptedTransport::new();
        t.push(202, "").push(202, "").push(202, "");

        match get_status(&t, &endpoints(), &token(), &agreement(), &no_delay(2)) {
            Err(FetchError::PollingExhausted { attempts }) => assert_eq!(attempts, 2),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(t.requests().len(), 2);
    }

    #[test]
    fn status_transport_errors_propagate() {
        let t = ScriptedTransport::new();
        t.push(202, "").push_error(TransportError::Connection("reset".into()));
        assert!(matches!(
            get_status(&t, &endpoints(), &token(), &agreement(), &no_delay(5)),
            Err(FetchError::Transport(TransportError::Connection(_)))
        ));
    }

    #[test]
    fn gas_flow_omits_unset_bounds() {
        let t = ScriptedTransport::new();
        t.push(200, &fixture("gas-flow.json")).push(200, &fixture("gas-flow.json"));

        get_gas_flow(&t, &endpoints(), &token(), &agreement(), None, None).unwrap();
        get_gas_flow(
            &t,
            &endpoints(),
            &token(),
            &agreement(),
            Some(DateTime::<Utc>::UNIX_EPOCH),
            Some(DateTime::<Utc>::UNIX_EPOCH),
        )
        .unwrap();

        for req in t.requests() {
            assert_eq!(req.url, "https://api.example.test/toon/v3/1234567/consumption/gas/flows");
            assert!(req.query.is_empty());
        }
    }

    #[test]
    fn gas_flow_sends_millisecond_bounds() {
        let t = ScriptedTransport::new();
        t.push(200, &fixture("gas-flow.json"));

        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let flow = get_gas_flow(&t, &endpoints(), &token(), &agreement(), Some(from), Some(to)).unwrap();
        assert_eq!(flow.hours.len(), 3);

        let req = &t.requests()[0];
        assert_eq!(req.query_value("fromTime"), Some("1704067200000"));
        assert_eq!(req.query_value("toTime"), Some("1704153600000"));
    }

    #[test]
    fn gas_flow_keeps_status_and_body_on_failure() {
        let t = ScriptedTransport::new();
        t.push(401, r#"{"fault":"expired"}"#);
        match get_gas_flow(&t, &endpoints(), &token(), &agreement(), None, None) {
            Err(FetchError::Http { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, r#"{"fault":"expired"}"#);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn electricity_flow_uses_its_own_path() {
        let t = ScriptedTransport::new();
        t.push(200, r#"{"hours":[]}"#);
        let flow = get_electricity_flow(&t, &endpoints(), &token(), &agreement(), None, None).unwrap();
        assert!(flow.hours.is_empty());
        assert!(t.requests()[0].url.ends_with("/consumption/electricity/flows"));
    }
}
