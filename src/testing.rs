//! In-memory fakes of the backend traits, shared by the unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::{
    backend::{AuthUser, IdentityProvider, ObjectRef, ObjectStore, ProfileStore, RemoteStore, TokenGrant},
    models::Profile,
    notify::{Alert, Notifier},
};

// ---------------------------------------------------------------------------
// RemoteStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    values: Mutex<HashMap<String, Value>>,
    /// Children served by `query_last`, in ascending store order.
    children: Mutex<Vec<(String, Value)>>,
    writes: Mutex<Vec<(String, Value)>>,
    fail_with: Mutex<Option<String>>,
}

impl FakeStore {
    pub fn with_children(children: Vec<(String, Value)>) -> Self {
        let store = Self::default();
        *store.children.lock().unwrap() = children;
        store
    }

    pub fn set(&self, path: &str, value: Value) {
        self.values.lock().unwrap().insert(path.to_owned(), value);
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.values.lock().unwrap().get(path).cloned()
    }

    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_owned());
    }

    fn check(&self) -> Result<()> {
        match self.fail_with.lock().unwrap().as_ref() {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn read(&self, path: &str) -> Result<Option<Value>> {
        self.check()?;
        Ok(self.get(path))
    }

    async fn write(&self, path: &str, value: &Value) -> Result<()> {
        self.check()?;
        self.writes
            .lock()
            .unwrap()
            .push((path.to_owned(), value.clone()));
        self.set(path, value.clone());
        Ok(())
    }

    async fn query_last(
        &self,
        _path: &str,
        _order_by: &str,
        limit: usize,
    ) -> Result<Vec<(String, Value)>> {
        self.check()?;
        let children = self.children.lock().unwrap();
        let skip = children.len().saturating_sub(limit);
        Ok(children.iter().skip(skip).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// Serves a scripted sequence of listings; the last one repeats forever.
#[derive(Default)]
pub struct FakeObjects {
    listings: Mutex<VecDeque<Vec<ObjectRef>>>,
    list_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    fail_resolve: Mutex<Option<String>>,
}

impl FakeObjects {
    pub fn new(listings: Vec<Vec<&str>>) -> Self {
        let fake = Self::default();
        *fake.listings.lock().unwrap() = listings
            .into_iter()
            .map(|names| names.into_iter().map(ObjectRef::new).collect())
            .collect();
        fake
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn fail_resolve(&self, message: &str) {
        *self.fail_resolve.lock().unwrap() = Some(message.to_owned());
    }
}

#[async_trait]
impl ObjectStore for FakeObjects {
    async fn list(&self, _prefix: &str) -> Result<Vec<ObjectRef>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut listings = self.listings.lock().unwrap();
        let current = if listings.len() > 1 {
            listings.pop_front().unwrap_or_default()
        } else {
            listings.front().cloned().unwrap_or_default()
        };
        Ok(current)
    }

    async fn resolve_url(&self, object: &ObjectRef) -> Result<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.fail_resolve.lock().unwrap().as_ref() {
            return Err(anyhow!("{msg}"));
        }
        Ok(format!("https://cdn.test/{}", object.full_path))
    }
}

// ---------------------------------------------------------------------------
// IdentityProvider
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeIdentity {
    pub verified: bool,
    pub fail_sign_in: Option<String>,
    pub fail_lookup: Option<String>,
    pub fail_create: Option<String>,
    pub fail_verification_email: Option<String>,
    pub fail_delete: Option<String>,
    pub refresh_calls: AtomicUsize,
    pub verification_emails: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeIdentity {
    pub fn verified() -> Self {
        Self {
            verified: true,
            ..Default::default()
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn verification_emails(&self) -> usize {
        self.verification_emails.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn user(email: &str) -> AuthUser {
        AuthUser {
            uid: format!("uid-{email}"),
            email: email.to_owned(),
            id_token: format!("token-{email}"),
            refresh_token: format!("refresh-{email}"),
            expires_in: 3600,
        }
    }
}

fn fail(message: &Option<String>) -> Result<()> {
    match message {
        Some(msg) => Err(anyhow!("{msg}")),
        None => Ok(()),
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self, email: &str, _password: &str) -> Result<AuthUser> {
        fail(&self.fail_sign_in)?;
        Ok(Self::user(email))
    }

    async fn create_account(&self, email: &str, _password: &str) -> Result<AuthUser> {
        fail(&self.fail_create)?;
        Ok(Self::user(email))
    }

    async fn email_verified(&self, _id_token: &str) -> Result<bool> {
        fail(&self.fail_lookup)?;
        Ok(self.verified)
    }

    async fn send_email_verification(&self, _id_token: &str) -> Result<()> {
        fail(&self.fail_verification_email)?;
        self.verification_emails.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_account(&self, id_token: &str) -> Result<()> {
        fail(&self.fail_delete)?;
        self.deleted.lock().unwrap().push(id_token.to_owned());
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TokenGrant {
            id_token: format!("refreshed-{refresh_token}"),
            refresh_token: refresh_token.to_owned(),
            expires_in: 3600,
        })
    }
}

// ---------------------------------------------------------------------------
// ProfileStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeProfiles {
    pub fail_with: Option<String>,
    pub created: Mutex<Vec<Profile>>,
}

impl FakeProfiles {
    pub fn created(&self) -> Vec<Profile> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn create_profile(&self, _id_token: &str, profile: &Profile) -> Result<String> {
        fail(&self.fail_with)?;
        let mut created = self.created.lock().unwrap();
        created.push(profile.clone());
        Ok(format!("doc-{}", created.len()))
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, alert: Alert) -> usize {
        self.sent().into_iter().filter(|a| *a == alert).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: Alert) {
        self.sent.lock().unwrap().push(alert);
    }
}
