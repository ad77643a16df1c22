use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::info;

use crate::backend::{AuthUser, IdentityProvider};

/// The signed-in user and their current tokens.
#[derive(Debug, Clone)]
pub struct Session {
    pub uid: String,
    pub email: String,
    id_token: String,
    refresh_token: String,
    /// Unix timestamp (seconds) when `id_token` expires
    expires_at: i64,
}

impl Session {
    fn from_user(user: &AuthUser, now: i64) -> Self {
        Self {
            uid: user.uid.clone(),
            email: user.email.clone(),
            id_token: user.id_token.clone(),
            refresh_token: user.refresh_token.clone(),
            expires_at: now + user.expires_in,
        }
    }
}

/// In-memory holder of the single signed-in session.
///
/// Cheap to clone; every clone sees the same session. The REST clients ask it
/// for a bearer token before each call.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
    identity: Arc<dyn IdentityProvider>,
}

impl SessionStore {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            identity,
        }
    }

    pub async fn start(&self, user: &AuthUser) {
        let now = chrono::Utc::now().timestamp();
        *self.inner.write().await = Some(Session::from_user(user, now));
        info!(uid = %user.uid, "Session started");
    }

    /// Sign-out. The identity provider keeps no server-side session for
    /// password accounts, so dropping the tokens is all there is to it.
    pub async fn clear(&self) {
        if let Some(session) = self.inner.write().await.take() {
            info!(uid = %session.uid, "Session cleared");
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.inner.read().await.clone()
    }

    pub async fn is_signed_in(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// Returns a valid ID token, refreshing it if necessary.
    /// `None` when nobody is signed in.
    pub async fn id_token(&self) -> Result<Option<String>> {
        let mut guard = self.inner.write().await;
        let now = chrono::Utc::now().timestamp();

        let Some(session) = guard.as_mut() else {
            return Ok(None);
        };

        // Refresh 60 s before expiry
        if session.expires_at > now + 60 {
            return Ok(Some(session.id_token.clone()));
        }

        info!(uid = %session.uid, "Refreshing ID token");
        let grant = self.identity.refresh(&session.refresh_token).await?;
        session.id_token = grant.id_token;
        session.refresh_token = grant.refresh_token;
        session.expires_at = now + grant.expires_in;

        Ok(Some(session.id_token.clone()))
    }
}
