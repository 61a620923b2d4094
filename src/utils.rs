use chrono::{DateTime, Utc};
use serde::Deserializer;

/// Render an optional timestamp as a millisecond epoch query value.
///
/// `None` and the Unix epoch itself both mean "not set", in which case the
/// parameter is left out and the server applies its own default window.
pub fn epoch_millis_param(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.timestamp_millis())
        .filter(|ms| *ms != 0)
        .map(|ms| ms.to_string())
}

/// Deserialize a number of seconds that may be sent either as a JSON number or
/// as a decimal string (the token endpoint does the latter).
pub fn de_lenient_secs<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct V;
    impl<'de> serde::de::Visitor<'de> for V {
        type Value = i64;

        fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
            write!(f, "a whole number of seconds, as a number or a string")
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            i64::try_from(value).map_err(|_| E::invalid_value(serde::de::Unexpected::Unsigned(value), &self))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            value
                .trim()
                .parse::<i64>()
                .map_err(|_| E::invalid_value(serde::de::Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_any(V)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn epoch_millis_param_omits_zero_sentinel() {
        assert_eq!(epoch_millis_param(None), None);
        assert_eq!(epoch_millis_param(Some(DateTime::<Utc>::UNIX_EPOCH)), None);
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(epoch_millis_param(Some(from)).as_deref(), Some("1704067200000"));
    }

    #[test]
    fn lenient_secs_accepts_numbers_and_strings() {
        #[derive(serde::Deserialize)]
        struct R {
            #[serde(deserialize_with = "de_lenient_secs")]
            v: i64,
        }
        let a: R = serde_json::from_str(r#"{"v":"600"}"#).unwrap();
        let b: R = serde_json::from_str(r#"{"v":600}"#).unwrap();
        assert_eq!(a.v, 600);
        assert_eq!(b.v, 600);
        assert!(serde_json::from_str::<R>(r#"{"v":"ten"}"#).is_err());
    }
}
