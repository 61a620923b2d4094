use crate::models::toon::{AgreementId, FlowChannel};

pub const DEFAULT_BASE_URL: &str = "https://api.toon.eu";

const API_PREFIX: &str = "/toon/v3";

/// URLs of every endpoint the client talks to, relative to one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints::new(DEFAULT_BASE_URL)
    }
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base = base_url.into();
        while base.ends_with('/') {
            base.pop();
        }
        Endpoints { base }
    }

    pub fn authorize_legacy(&self) -> String {
        format!("{}/authorize/legacy", self.base)
    }

    pub fn token(&self) -> String {
        format!("{}/token", self.base)
    }

    pub fn agreements(&self) -> String {
        format!("{}{}/agreements", self.base, API_PREFIX)
    }

    pub fn status(&self, agreement_id: &AgreementId) -> String {
        format!("{}{}/{}/status", self.base, API_PREFIX, agreement_id.0)
    }

    pub fn flows(&self, agreement_id: &AgreementId, channel: FlowChannel) -> String {
        format!(
            "{}{}/{}/consumption/{}/flows",
            self.base,
            API_PREFIX,
            agreement_id.0,
            channel.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_urls_from_trimmed_base() {
        let e = Endpoints::new("http://127.0.0.1:1234/");
        let id = AgreementId("42".into());
        assert_eq!(e.authorize_legacy(), "http://127.0.0.1:1234/authorize/legacy");
        assert_eq!(e.token(), "http://127.0.0.1:1234/token");
        assert_eq!(e.agreements(), "http://127.0.0.1:1234/toon/v3/agreements");
        assert_eq!(e.status(&id), "http://127.0.0.1:1234/toon/v3/42/status");
        assert_eq!(
            e.flows(&id, FlowChannel::Gas),
            "http://127.0.0.1:1234/toon/v3/42/consumption/gas/flows"
        );
        assert_eq!(
            e.flows(&id, FlowChannel::Electricity),
            "http://127.0.0.1:1234/toon/v3/42/consumption/electricity/flows"
        );
    }
}
