//! Wire models of the Toon v3 API (agreements, status, consumption flows).
//!
//! Notes
//! - Timestamps are Unix epoch integers on the wire; the unit depends on the
//!   field (milliseconds for display updates and flow points, seconds for
//!   `thermostatInfo.nextTime`).
//! - `isSmart` arrives as `0`/`1` or `true`/`false`, see [`Flag`].

use chrono::serde::{ts_milliseconds, ts_milliseconds_option, ts_seconds_option};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =====================
// Scalars
// =====================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgreementId(pub String);

impl core::fmt::Display for AgreementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Boolean that the API encodes either as `0`/`1` or `true`/`false`, bare or
/// quoted. Always serialized as a JSON boolean.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Flag(pub bool);

impl serde::Serialize for Flag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bool(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Flag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;
        impl<'de> serde::de::Visitor<'de> for V {
            type Value = Flag;

            fn expecting(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                write!(f, "one of 0, 1, true or false")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Flag(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match value {
                    0 => Ok(Flag(false)),
                    1 => Ok(Flag(true)),
                    other => Err(E::invalid_value(serde::de::Unexpected::Signed(other), &self)),
                }
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match value {
                    0 => Ok(Flag(false)),
                    1 => Ok(Flag(true)),
                    other => Err(E::invalid_value(serde::de::Unexpected::Unsigned(other), &self)),
                }
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match value {
                    "0" | "false" => Ok(Flag(false)),
                    "1" | "true" => Ok(Flag(true)),
                    other => Err(E::invalid_value(serde::de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}

// =====================
// Agreements
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    pub agreement_id: AgreementId,
    pub agreement_id_checksum: Option<String>,
    pub heating_type: Option<String>,
    pub display_common_name: Option<String>,
    pub display_hardware_version: Option<String>,
    pub display_software_version: Option<String>,
    #[serde(default)]
    pub is_toon_solar: bool,
    #[serde(default)]
    pub is_toonly: bool,
}

// =====================
// Status
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub thermostat_states: Option<ThermostatStates>,
    pub thermostat_info: Option<ThermostatInfo>,
    pub power_usage: Option<PowerUsage>,
    pub gas_usage: Option<GasUsage>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub last_update_from_display: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatStates {
    #[serde(default)]
    pub state: Vec<ThermostatState>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub last_updated_from_display: Option<DateTime<Utc>>,
}

/// One program preset (comfort, home, sleep, away, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatState {
    pub id: Option<i64>,
    /// Hundredths of a degree Celsius.
    pub temp_value: Option<i64>,
    pub dhw: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatInfo {
    pub current_setpoint: Option<i64>,
    pub current_display_temp: Option<i64>,
    pub program_state: Option<i64>,
    pub active_state: Option<i64>,
    pub next_program: Option<i64>,
    pub next_state: Option<i64>,
    #[serde(default, with = "ts_seconds_option")]
    pub next_time: Option<DateTime<Utc>>,
    pub next_setpoint: Option<i64>,
    pub error_found: Option<i64>,
    pub boiler_module_connected: Option<i64>,
    pub real_change: Option<i64>,
    pub burner_info: Option<String>,
    pub ot_comm_error: Option<String>,
    pub current_modulation_level: Option<i64>,
    pub have_ot_boiler: Option<i64>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub last_updated_from_display: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PowerUsage {
    pub value: Option<f64>,
    pub day_cost: Option<f64>,
    pub value_produced: Option<f64>,
    pub day_usage: Option<f64>,
    pub day_low_usage: Option<f64>,
    pub avg_value: Option<f64>,
    pub meter_reading: Option<f64>,
    pub meter_reading_low: Option<f64>,
    pub meter_reading_produ: Option<f64>,
    pub meter_reading_low_produ: Option<f64>,
    pub value_solar: Option<f64>,
    pub avg_solar_value: Option<f64>,
    pub max_solar: Option<f64>,
    pub solar_produced_today: Option<f64>,
    pub lowest_day_value: Option<f64>,
    pub is_smart: Option<Flag>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub last_updated_from_display: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GasUsage {
    pub value: Option<f64>,
    pub day_cost: Option<f64>,
    pub day_usage: Option<f64>,
    pub avg_value: Option<f64>,
    pub meter_reading: Option<f64>,
    pub is_smart: Option<Flag>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub last_updated_from_display: Option<DateTime<Utc>>,
}

// =====================
// Consumption flows
// =====================

/// Metered quantity a flow series is requested for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FlowChannel {
    Gas,
    Electricity,
}

impl FlowChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowChannel::Gas => "gas",
            FlowChannel::Electricity => "electricity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FlowData {
    #[serde(default)]
    pub hours: Vec<FlowPoint>,
    #[serde(default)]
    pub days: Vec<FlowPoint>,
    #[serde(default)]
    pub weeks: Vec<FlowPoint>,
    #[serde(default)]
    pub months: Vec<FlowPoint>,
    #[serde(default)]
    pub years: Vec<FlowPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPoint {
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub unit: Option<String>,
    pub value: Option<f64>,
}
