//! Firebase REST implementations of the `backend` traits.

pub mod auth;
pub mod database;
pub mod firestore;
pub mod models;
pub mod storage;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::response_store::ResponseStore;

/// Shared HTTP plumbing for every Firebase client: send, dump the raw body,
/// and turn error envelopes into errors carrying the backend's own message.
#[derive(Debug, Clone)]
pub struct FirebaseHttp {
    client: Client,
    dumps: ResponseStore,
}

impl FirebaseHttp {
    pub fn new(dumps: ResponseStore) -> Self {
        Self {
            client: Client::new(),
            dumps,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Sends `request` and returns the body of a successful response.
    ///
    /// - `endpoint`: short name used in error context and dump directories.
    /// - `suffix`: dump file suffix, e.g. the database path.
    pub async fn execute(
        &self,
        endpoint: &str,
        suffix: &str,
        request: RequestBuilder,
    ) -> Result<Vec<u8>> {
        let resp = request
            .send()
            .await
            .with_context(|| format!("Firebase {endpoint} request failed"))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read Firebase {endpoint} response body"))?
            .to_vec();

        self.dumps.save(endpoint, suffix, &bytes).await;
        debug!(endpoint, status = status.as_u16(), bytes = bytes.len(), "Firebase response");

        if !status.is_success() {
            let message = models::error_message(&bytes)
                .unwrap_or_else(|| format!("Firebase {endpoint} returned {status}"));
            return Err(anyhow!(message));
        }

        Ok(bytes)
    }

    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        suffix: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let bytes = self.execute(endpoint, suffix, request).await?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to deserialize Firebase {endpoint} response"))
    }
}

/// RFC 3986 percent-encoding of everything but unreserved characters.
/// With `keep_slash`, `/` is left as a path separator.
pub(crate) fn percent_encode(raw: &str, keep_slash: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            b'/' if keep_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
