//! HTTP boundary of the client.
//!
//! - `HttpTransport` is the only thing the token manager and the resource
//!   fetcher talk to; it returns status, headers and body verbatim and never
//!   treats a non-2xx status as an error.
//! - `UreqTransport` is the blocking production implementation. Redirects are
//!   never followed, since the legacy login flow reads the `Location` header of
//!   the 302 itself.

use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;

use crate::error::TransportError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub query: Vec<(&'static str, String)>,
    /// Sent as `application/x-www-form-urlencoded`; only used with POST.
    pub form: Vec<(&'static str, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        HttpRequest {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(&'static str, String)>) -> Self {
        HttpRequest {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            form,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn query(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.query.push((name, value.into()));
        self
    }

    #[cfg(test)]
    pub(crate) fn header_value(&self, name: &str) -> Option<&str> {
        lookup(&self.headers, name)
    }

    #[cfg(test)]
    pub(crate) fn query_value(&self, name: &str) -> Option<&str> {
        lookup(&self.query, name)
    }

    #[cfg(test)]
    pub(crate) fn form_value(&self, name: &str) -> Option<&str> {
        lookup(&self.form, name)
    }
}

#[cfg(test)]
fn lookup<'a>(pairs: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Headers rendered as `name: value` pairs, for diagnostics.
    pub fn describe_headers(&self) -> String {
        self.headers
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v.to_str().unwrap_or("<binary>")))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub trait HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            connect: DEFAULT_CONNECT_TIMEOUT,
            request: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeouts: Timeouts) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(timeouts.connect))
            .timeout_global(Some(timeouts.request))
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .build();

        UreqTransport {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        UreqTransport::new(Timeouts::default())
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = if request.method == Method::GET {
            let mut req = self.agent.get(&request.url);
            for (k, v) in &request.headers {
                req = req.header(*k, v.as_str());
            }
            for (k, v) in &request.query {
                req = req.query(*k, v);
            }
            req.call()
        } else if request.method == Method::POST {
            let mut req = self.agent.post(&request.url);
            for (k, v) in &request.headers {
                req = req.header(*k, v.as_str());
            }
            for (k, v) in &request.query {
                req = req.query(*k, v);
            }
            req.send_form(request.form.iter().map(|(k, v)| (*k, v.as_str())))
        } else {
            return Err(TransportError::Connection(format!("unsupported method {}", request.method)));
        };

        let (parts, mut body) = result?.into_parts();
        let body = body.read_to_string()?;
        Ok(HttpResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::scripted::ScriptedTransport;
    use super::*;

    #[test]
    fn request_lookups_are_case_insensitive() {
        let req = HttpRequest::get("https://example.test/x")
            .header("Authorization", "Bearer abc")
            .query("fromTime", "1");
        assert_eq!(req.header_value("authorization"), Some("Bearer abc"));
        assert_eq!(req.query_value("fromtime"), Some("1"));
        assert_eq!(req.query_value("toTime"), None);
    }

    #[test]
    fn scripted_transport_replays_in_order() {
        let t = ScriptedTransport::new();
        t.push(202, "").push_with_headers(302, &[("location", "/cb?code=x")], "");

        let req = HttpRequest::get("https://example.test/a");
        assert_eq!(t.send(&req).unwrap().status, StatusCode::ACCEPTED);
        let second = t.send(&req).unwrap();
        assert_eq!(second.header("Location"), Some("/cb?code=x"));
        assert!(t.send(&req).is_err());
        assert_eq!(t.requests().len(), 3);
    }
}
