use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error envelopes
//
// Google APIs (Identity Toolkit, Storage, Firestore) fail with
//   { "error": { "code": 400, "message": "EMAIL_NOT_FOUND", ... } }
// while the Realtime Database fails with
//   { "error": "Permission denied" }
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed { message: String },
    Plain(String),
}

/// Extracts the backend's own error message from a failed response body.
pub fn error_message(bytes: &[u8]) -> Option<String> {
    let envelope = serde_json::from_slice::<ErrorEnvelope>(bytes).ok()?;
    Some(match envelope.error {
        ErrorBody::Detailed { message } => message,
        ErrorBody::Plain(message) => message,
    })
}

/// Identity Toolkit returns token lifetimes as decimal strings.
fn parse_expires_in(raw: &str) -> Result<i64> {
    raw.parse()
        .with_context(|| format!("expiresIn is not an integer: {raw:?}"))
}

// ---------------------------------------------------------------------------
// Identity Toolkit: POST /v1/accounts:signInWithPassword | accounts:signUp
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

/// Shared by sign-in and sign-up responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResponse {
    pub local_id: String,
    #[serde(default)]
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    /// Seconds, as a string (typically `"3600"`).
    pub expires_in: String,
}

impl PasswordResponse {
    pub fn expires_in_secs(&self) -> Result<i64> {
        parse_expires_in(&self.expires_in)
    }
}

// ---------------------------------------------------------------------------
// Identity Toolkit: accounts:lookup | accounts:sendOobCode | accounts:delete
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdTokenRequest<'a> {
    pub id_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OobCodeRequest<'a> {
    /// `"VERIFY_EMAIL"` for verification mails.
    pub request_type: &'a str,
    pub id_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupUser {
    pub local_id: String,
    #[serde(default)]
    pub email_verified: bool,
}

// ---------------------------------------------------------------------------
// Secure Token: POST /v1/token
//
// Unlike Identity Toolkit this endpoint answers in snake_case.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub grant_type: &'a str,
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
}

impl RefreshResponse {
    pub fn expires_in_secs(&self) -> Result<i64> {
        parse_expires_in(&self.expires_in)
    }
}

// ---------------------------------------------------------------------------
// Firebase Storage: GET /v0/b/{bucket}/o?prefix=..&delimiter=/
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[serde(default)]
    pub items: Vec<StorageItem>,
    #[serde(default)]
    pub prefixes: Vec<String>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StorageItem {
    /// Full object path inside the bucket.
    pub name: String,
    pub bucket: String,
}

// ---------------------------------------------------------------------------
// Firebase Storage: GET /v0/b/{bucket}/o/{object}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub name: String,
    /// Comma-separated list; absent when the object was uploaded without one.
    pub download_tokens: Option<String>,
}

impl ObjectMetadata {
    pub fn first_download_token(&self) -> Option<&str> {
        self.download_tokens
            .as_deref()?
            .split(',')
            .map(str::trim)
            .find(|t| !t.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Firestore: POST /v1/projects/{p}/databases/(default)/documents/{collection}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FirestoreDocument {
    /// `projects/{p}/databases/(default)/documents/users/{id}`
    pub name: String,
}

impl FirestoreDocument {
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
