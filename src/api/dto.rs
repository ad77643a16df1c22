use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    identity::Registration,
    models::{DefaultThresholds, MetricEntry, MetricValue, PhotoAsset, Profile, SensorReading},
    session::Session,
};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login` and `POST /auth/verification`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for `POST /auth/signup`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    /// Name of the plant being monitored.
    #[serde(default)]
    pub plant: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl SignupRequest {
    pub fn profile(&self) -> Profile {
        Profile {
            name: self.name.clone(),
            surname: self.surname.clone(),
            plant: self.plant.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionDto {
    pub uid: String,
    pub email: String,
}

impl From<Session> for SessionDto {
    fn from(s: Session) -> Self {
        Self {
            uid: s.uid,
            email: s.email,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationDto {
    pub uid: String,
    /// ID of the profile document in the `users` collection.
    pub profile_id: String,
    pub message: String,
}

impl From<Registration> for RegistrationDto {
    fn from(r: Registration) -> Self {
        Self {
            uid: r.uid,
            profile_id: r.profile_id,
            message: "Verification email sent. Please check your inbox.".to_owned(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageDto {
    pub message: String,
}

impl MessageDto {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

/// One dashboard row, e.g. `{"label":"Humidity","value":41.5}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetricEntryDto {
    pub label: String,
    /// A number, or `"N/A"` when the device did not report it.
    pub value: MetricValue,
}

impl From<MetricEntry> for MetricEntryDto {
    fn from(m: MetricEntry) -> Self {
        Self {
            label: m.label.to_owned(),
            value: m.value,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorReadingDto {
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    pub light_intensity: Option<f64>,
    /// Device timestamp (seconds)
    pub timestamp: f64,
}

impl From<SensorReading> for SensorReadingDto {
    fn from(r: SensorReading) -> Self {
        Self {
            humidity: r.humidity,
            temperature: r.temperature,
            light_intensity: r.light_intensity,
            timestamp: r.timestamp,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Number of readings, capped at the configured history size.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PhotoDto {
    pub url: String,
    pub label: String,
}

impl From<PhotoAsset> for PhotoDto {
    fn from(p: PhotoAsset) -> Self {
        Self {
            url: p.url,
            label: p.label,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Request body for `PUT /watering`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WateringRequest {
    pub on: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DefaultsDto {
    pub humidity: f64,
    pub light_intensity: f64,
    pub temperature: f64,
}

impl From<DefaultThresholds> for DefaultsDto {
    fn from(t: DefaultThresholds) -> Self {
        Self {
            humidity: t.humidity,
            light_intensity: t.light_intensity,
            temperature: t.temperature,
        }
    }
}

impl From<DefaultsDto> for DefaultThresholds {
    fn from(d: DefaultsDto) -> Self {
        Self {
            humidity: d.humidity,
            light_intensity: d.light_intensity,
            temperature: d.temperature,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDto {
    /// Alert title, e.g. `"No data found"` or `"Login Error"`.
    pub title: String,
    pub error: String,
}
