//! Narrow interfaces to the hosted backend services.
//!
//! The services in `telemetry`, `control` and `identity` only talk to these
//! traits. `main` wires the Firebase REST implementations from `firebase`;
//! tests wire in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Hosted key-path value store (realtime database).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Point read. `None` when nothing is stored at `path`.
    async fn read(&self, path: &str) -> Result<Option<Value>>;

    /// Point write; replaces whatever is stored at `path`.
    async fn write(&self, path: &str, value: &Value) -> Result<()>;

    /// The last `limit` children of `path` ordered by the child field
    /// `order_by`, returned as `(key, value)` pairs in ascending order.
    async fn query_last(&self, path: &str, order_by: &str, limit: usize)
        -> Result<Vec<(String, Value)>>;
}

/// An object in the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Full path inside the bucket, e.g. `imageofPlant/captured_image_leaf.jpg`.
    pub full_path: String,
}

impl ObjectRef {
    pub fn new(full_path: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
        }
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.full_path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.full_path)
    }
}

/// Hosted blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object directly under `prefix`, in the store's listing order.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectRef>>;

    /// A URL the app can fetch the object from. May be time-limited.
    async fn resolve_url(&self, object: &ObjectRef) -> Result<String>;
}

/// Result of a credential exchange or account creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
}

/// Fresh tokens from a refresh-token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Hosted identity provider (e-mail + password accounts).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser>;

    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser>;

    /// Whether the account behind `id_token` has a verified e-mail address.
    async fn email_verified(&self, id_token: &str) -> Result<bool>;

    async fn send_email_verification(&self, id_token: &str) -> Result<()>;

    async fn delete_account(&self, id_token: &str) -> Result<()>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant>;
}

/// Document store holding the `users` profile collection.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Adds a profile document with a store-assigned id and returns that id.
    async fn create_profile(&self, id_token: &str, profile: &crate::models::Profile)
        -> Result<String>;
}
