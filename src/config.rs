//! Runtime configuration read from the process environment.
//! Defaults target the public Toon API with the Eneco tenant.

use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::Credentials;
use crate::endpoints::DEFAULT_BASE_URL;
use crate::resources::{DEFAULT_STATUS_MAX_ATTEMPTS, DEFAULT_STATUS_POLL_DELAY, PollPolicy};
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, Timeouts};

pub const DEFAULT_TENANT_ID: &str = "eneco";

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub base_url: String,
    pub timeouts: Timeouts,
    /// Bounds for re-requesting the status endpoint while it answers 202.
    pub status_poll: PollPolicy,
    /// Renew expired access tokens with the refresh token instead of logging in.
    pub refresh_grant: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| var(key).ok_or_else(|| format!("Missing required setting: set {}", key));

        let credentials = Credentials::new(
            required("TOON_USERNAME")?,
            required("TOON_PASSWORD")?,
            var("TOON_TENANT_ID").unwrap_or_else(|| DEFAULT_TENANT_ID.to_string()),
            required("TOON_CONSUMER_KEY")?,
            required("TOON_CONSUMER_SECRET")?,
        );

        let base_url = var("TOON_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let connect = parse_or::<u64>(var("TOON_CONNECT_TIMEOUT_SECS"), "TOON_CONNECT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let request = parse_or::<u64>(var("TOON_REQUEST_TIMEOUT_SECS"), "TOON_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let max_attempts = parse_or::<NonZeroU32>(var("TOON_STATUS_MAX_ATTEMPTS"), "TOON_STATUS_MAX_ATTEMPTS")?
            .unwrap_or(DEFAULT_STATUS_MAX_ATTEMPTS);
        let delay = parse_or::<u64>(var("TOON_STATUS_POLL_DELAY_MS"), "TOON_STATUS_POLL_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_STATUS_POLL_DELAY);

        let refresh_grant = var("TOON_REFRESH_GRANT")
            .map(|s| matches!(s.as_str(), "1" | "true" | "TRUE"))
            .unwrap_or(false);

        Ok(Config {
            credentials,
            base_url,
            timeouts: Timeouts { connect, request },
            status_poll: PollPolicy { max_attempts, delay },
            refresh_grant,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str) -> Result<Option<T>, String> {
    match value {
        None => Ok(None),
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{} has an invalid value: {}", key, s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("TOON_USERNAME", "user"),
        ("TOON_PASSWORD", "pass"),
        ("TOON_CONSUMER_KEY", "key"),
        ("TOON_CONSUMER_SECRET", "secret"),
    ];

    #[test]
    fn applies_defaults() {
        let cfg = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.credentials.tenant_id, "eneco");
        assert_eq!(cfg.base_url, "https://api.toon.eu");
        assert_eq!(cfg.timeouts, Timeouts::default());
        assert_eq!(cfg.status_poll, PollPolicy::default());
        assert!(!cfg.refresh_grant);
    }

    #[test]
    fn reads_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("TOON_TENANT_ID", "viesgo"),
            ("TOON_API_BASE_URL", "http://localhost:9000"),
            ("TOON_CONNECT_TIMEOUT_SECS", "2"),
            ("TOON_REQUEST_TIMEOUT_SECS", "20"),
            ("TOON_STATUS_MAX_ATTEMPTS", "4"),
            ("TOON_STATUS_POLL_DELAY_MS", "250"),
            ("TOON_REFRESH_GRANT", "true"),
        ]);
        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.credentials.tenant_id, "viesgo");
        assert_eq!(cfg.base_url, "http://localhost:9000");
        assert_eq!(cfg.timeouts.connect, Duration::from_secs(2));
        assert_eq!(cfg.timeouts.request, Duration::from_secs(20));
        assert_eq!(cfg.status_poll.max_attempts.get(), 4);
        assert_eq!(cfg.status_poll.delay, Duration::from_millis(250));
        assert!(cfg.refresh_grant);
    }

    #[test]
    fn rejects_missing_and_malformed_values() {
        let err = Config::from_lookup(lookup(&REQUIRED[..3])).unwrap_err();
        assert!(err.contains("TOON_CONSUMER_SECRET"));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TOON_STATUS_MAX_ATTEMPTS", "0"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.contains("TOON_STATUS_MAX_ATTEMPTS"));
    }
}
