use serde::{de, Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// One telemetry sample as published by the plant device under `data/{auto-id}`.
///
/// Every field is optional on the wire; the device firmware has been seen
/// omitting light intensity when the sensor is unplugged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    #[serde(rename = "light intensity")]
    pub light_intensity: Option<f64>,
    /// Device clock at publication; the ordering key for every query.
    #[serde(default)]
    pub timestamp: f64,
}

/// Photo resolved by the capture handshake. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoAsset {
    /// Retrievable URL; may expire.
    pub url: String,
    /// Parsed from `captured_image_<label>.jpg`, `"Unknown"` otherwise.
    pub label: String,
}

/// The record under `default`. Always written as a whole.
///
/// Older records hold the form's text (`"40"`), so numeric strings are read
/// as numbers too. Writes always send numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultThresholds {
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub humidity: f64,
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub light_intensity: f64,
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub temperature: f64,
}

fn number_or_numeric_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("not a number: {text:?}"))),
    }
}

/// Denormalized profile document stored next to the identity-provider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub surname: String,
    pub plant: String,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Display metrics
// ---------------------------------------------------------------------------

/// A metric shown on the dashboard: either a number or a placeholder text.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEntry {
    pub label: &'static str,
    pub value: MetricValue,
}

impl SensorReading {
    /// Flattens the reading into dashboard rows. Missing humidity and
    /// temperature show as `0`, missing light intensity as `"N/A"`.
    pub fn metrics(&self) -> Vec<MetricEntry> {
        vec![
            MetricEntry {
                label: "Humidity",
                value: MetricValue::Number(self.humidity.unwrap_or(0.0)),
            },
            MetricEntry {
                label: "Temperature",
                value: MetricValue::Number(self.temperature.unwrap_or(0.0)),
            },
            MetricEntry {
                label: "Light Intensity",
                value: self
                    .light_intensity
                    .map(MetricValue::Number)
                    .unwrap_or_else(|| MetricValue::Text("N/A".to_owned())),
            },
        ]
    }
}
