use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Opaque sensor identifier as used by the station API (`esp1`, `esp2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(String);

impl SensorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the identifier the server derives from a sensor number (`3` -> `esp3`).
    #[must_use]
    pub fn from_number(number: &str) -> Self {
        Self(format!("esp{}", number.trim()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Suffix of the per-sensor history endpoint: `esp2` -> `2` (`/api/history2`).
    #[must_use]
    pub fn history_key(&self) -> &str {
        self.0.strip_prefix("esp").unwrap_or(&self.0)
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Date scope passed as `?date=` to history and aggregate endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateFilter(String);

impl DateFilter {
    pub const TODAY: &'static str = "today";

    /// Blank input means "today".
    pub fn new(date: impl Into<String>) -> Self {
        let date = date.into();
        let trimmed = date.trim();
        if trimmed.is_empty() {
            Self::default()
        } else {
            Self(trimmed.to_string())
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DateFilter {
    fn default() -> Self {
        Self(Self::TODAY.to_string())
    }
}

impl fmt::Display for DateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `type=` of `/api/statistical`; one comparison chart each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Temperature,
    Pressure,
    Humidity,
}

impl AggregateKind {
    pub const ALL: [Self; 3] = [Self::Temperature, Self::Pressure, Self::Humidity];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
            Self::Humidity => "humidity",
        }
    }

    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Pressure => "hPa",
            Self::Humidity => "%",
        }
    }
}

/// Number, numeric string, or anything else (`null`, `"NULL"`, garbage) as `None`.
pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Strings pass through, numbers are printed, everything else is absent.
pub(crate) fn value_as_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?
        .as_ref()
        .and_then(value_as_f64))
}

fn de_opt_label<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?
        .as_ref()
        .and_then(value_as_label))
}

pub(crate) fn de_opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?
        .as_ref()
        .and_then(value_as_f64)
        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32))
}

/// Response from `/api/sensors` (legacy): bare table names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacySensorsResponse {
    #[serde(default)]
    pub sensors: Vec<String>,
}

/// Response from `/api/sensors/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorsStatusResponse {
    #[serde(default)]
    pub sensors: Vec<SensorStatusEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorStatusEntry {
    /// Table name, e.g. `esp1`. Older servers only send `number`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_label")]
    pub number: Option<String>,
    /// Custom name configured from the admin view
    #[serde(default)]
    pub name: Option<String>,
    /// `YYYY-MM-DD` of the last sample
    #[serde(default)]
    pub last_date: Option<String>,
    /// `HH:MM:SS` of the last sample
    #[serde(default)]
    pub last_hour: Option<String>,
    // `status` and `status_text` are not read: the server labels sensors with
    // its own window, the dashboard derives status from the sample time.
}

/// One value of the `/api/all/latest` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestValues {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub pressure: Option<f64>,
}

/// Response from `/api/all/latest`, keyed by sensor id.
pub type AllLatestResponse = BTreeMap<String, LatestValues>;

/// Capteur record from `/api/mesures/latest`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapteurLatest {
    pub id: i64,
    #[serde(default)]
    pub esp_id: Option<String>,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub localisation: Option<String>,
    /// ISO-8601, with or without offset
    #[serde(default)]
    pub derniere_connexion: Option<String>,
    #[serde(default)]
    pub mesures: CapteurMesures,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapteurMesures {
    #[serde(default)]
    pub temperature: Option<MesureValue>,
    #[serde(default)]
    pub humidite: Option<MesureValue>,
    #[serde(default)]
    pub pression: Option<MesureValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MesureValue {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub valeur: Option<f64>,
    #[serde(default)]
    pub unite: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Response from `/api/history<N>`. Arrays are kept loose: the aligner decides
/// what a missing array or a malformed slot means.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSeries {
    #[serde(default)]
    pub date: Option<Vec<Value>>,
    #[serde(default)]
    pub hour: Option<Vec<Value>>,
    #[serde(default)]
    pub temperature: Option<Vec<Value>>,
    #[serde(default)]
    pub humidity: Option<Vec<Value>>,
    #[serde(default)]
    pub pressure: Option<Vec<Value>>,
}

/// Response from `/api/statistical`: one hour axis, one dataset per sensor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticalResponse {
    #[serde(default)]
    pub hours: Vec<Value>,
    #[serde(default)]
    pub data1: Vec<Value>,
    #[serde(default)]
    pub data2: Vec<Value>,
}

/// Response from `/api/esp32/devices`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<Esp32Device>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Esp32Device {
    pub mac_address: String,
    /// `online`, `recent`, `offline` or `unknown`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub sensor_number: Option<u32>,
}

/// Body of `POST /api/esp32/configure`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigureDeviceRequest {
    pub mac_address: String,
    pub sensor_number: u32,
    pub name: String,
}

/// Body of `POST /api/esp32/delete`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteDeviceRequest {
    pub mac_address: String,
}

/// Body of `POST /api/capteurs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCapteur {
    pub esp_id: String,
    pub nom: String,
    #[serde(default)]
    pub localisation: Option<String>,
}

/// Capteur as returned by `POST /api/capteurs`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capteur {
    pub id: i64,
    #[serde(default)]
    pub esp_id: String,
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub localisation: Option<String>,
    #[serde(default)]
    pub actif: Option<bool>,
    #[serde(default)]
    pub derniere_connexion: Option<String>,
}

/// `{error: string}` body of a failed request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
