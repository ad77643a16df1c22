use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// CaptureMode
// ---------------------------------------------------------------------------

/// How `TelemetryService::capture_photo` waits for the camera device after
/// raising the `image` trigger flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Poll the photo folder until a new object shows up, bounded by a timeout.
    Ack,
    /// Sleep for a fixed delay, then take whatever is newest in the folder.
    Delay,
}

impl FromStr for CaptureMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ack" => Ok(Self::Ack),
            "delay" => Ok(Self::Delay),
            other => Err(anyhow::anyhow!("unknown capture mode: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub firebase_api_key: String,
    pub firebase_project_id: String,
    /// e.g. `https://<project>-default-rtdb.europe-west1.firebasedatabase.app`
    pub database_url: String,
    pub storage_bucket: String,
    pub identity_base_url: String,
    pub secure_token_base_url: String,
    pub storage_base_url: String,
    pub firestore_base_url: String,
    pub gcs_base_url: String,
    /// HMAC key pair for V4 signed photo URLs. Both must be set to enable signing.
    pub gcs_hmac: Option<HmacCredentials>,
    pub signed_url_ttl_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub capture: CaptureSettings,
    /// Upper bound (and default) for history queries.
    pub history_limit: usize,
    pub alerts: AlertThresholds,
    /// Auto-refresh interval for the latest reading. `0` disables the loop.
    pub poll_interval_secs: u64,
    pub notify_webhook_url: Option<String>,
    /// Directory for raw response dumps. Unset disables dumping.
    pub response_dump_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HmacCredentials {
    pub access_id: String,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub mode: CaptureMode,
    pub delay: Duration,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Ack,
            delay: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

/// Readings strictly above these values raise a local notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub humidity_above: f64,
    pub temperature_above: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            humidity_above: 40.0,
            temperature_above: 10.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            firebase_api_key: required("FIREBASE_API_KEY")?,
            firebase_project_id: required("FIREBASE_PROJECT_ID")?,
            database_url: trim_base(required("FIREBASE_DATABASE_URL")?),
            storage_bucket: required("FIREBASE_STORAGE_BUCKET")?,
            identity_base_url: trim_base(optional(
                "IDENTITY_BASE_URL",
                "https://identitytoolkit.googleapis.com",
            )),
            secure_token_base_url: trim_base(optional(
                "SECURE_TOKEN_BASE_URL",
                "https://securetoken.googleapis.com",
            )),
            storage_base_url: trim_base(optional(
                "STORAGE_BASE_URL",
                "https://firebasestorage.googleapis.com",
            )),
            firestore_base_url: trim_base(optional(
                "FIRESTORE_BASE_URL",
                "https://firestore.googleapis.com",
            )),
            gcs_base_url: trim_base(optional("GCS_BASE_URL", "https://storage.googleapis.com")),
            gcs_hmac: parse_hmac(
                std::env::var("GCS_HMAC_ACCESS_ID").ok(),
                std::env::var("GCS_HMAC_SECRET").ok(),
            )?,
            signed_url_ttl_secs: optional("SIGNED_URL_TTL_SECS", "900")
                .parse()
                .context("SIGNED_URL_TTL_SECS must be a positive integer")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            capture: CaptureSettings {
                mode: optional("CAPTURE_MODE", "ack")
                    .trim()
                    .parse()
                    .context("CAPTURE_MODE must be 'ack' or 'delay'")?,
                delay: Duration::from_secs(
                    optional("CAPTURE_DELAY_SECS", "5")
                        .parse()
                        .context("CAPTURE_DELAY_SECS must be a positive integer")?,
                ),
                timeout: Duration::from_secs(positive(
                    "CAPTURE_TIMEOUT_SECS",
                    &optional("CAPTURE_TIMEOUT_SECS", "30"),
                )?),
                poll_interval: Duration::from_millis(positive(
                    "CAPTURE_POLL_MS",
                    &optional("CAPTURE_POLL_MS", "1000"),
                )?),
            },
            history_limit: positive("HISTORY_LIMIT", &optional("HISTORY_LIMIT", "50"))? as usize,
            alerts: AlertThresholds {
                humidity_above: optional("HUMIDITY_ALERT_ABOVE", "40")
                    .parse()
                    .context("HUMIDITY_ALERT_ABOVE must be a number")?,
                temperature_above: optional("TEMPERATURE_ALERT_ABOVE", "10")
                    .parse()
                    .context("TEMPERATURE_ALERT_ABOVE must be a number")?,
            },
            poll_interval_secs: optional("POLL_INTERVAL_SECS", "0")
                .parse()
                .context("POLL_INTERVAL_SECS must be a non-negative integer")?,
            notify_webhook_url: non_empty(std::env::var("NOTIFY_WEBHOOK_URL").ok()),
            response_dump_dir: non_empty(std::env::var("RESPONSE_DUMP_DIR").ok()),
        })
    }
}

/// Both halves of the HMAC key pair must be present, or neither.
fn parse_hmac(access_id: Option<String>, secret: Option<String>) -> Result<Option<HmacCredentials>> {
    match (non_empty(access_id), non_empty(secret)) {
        (Some(access_id), Some(secret)) => Ok(Some(HmacCredentials { access_id, secret })),
        (None, None) => Ok(None),
        _ => Err(anyhow::anyhow!(
            "GCS_HMAC_ACCESS_ID and GCS_HMAC_SECRET must be set together"
        )),
    }
}

/// Parses `raw` as an integer greater than zero.
fn positive(key: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(anyhow::anyhow!("{key} must be a positive integer, got {raw:?}")),
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_owned()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
