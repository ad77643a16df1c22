use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{RequestBuilder, Url};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{
    models::{ListResponse, ObjectMetadata},
    percent_encode, FirebaseHttp,
};
use crate::{
    backend::{ObjectRef, ObjectStore},
    config::HmacCredentials,
    session::SessionStore,
};

type HmacSha256 = Hmac<Sha256>;

/// Cloud Storage for Firebase over its REST interface.
///
/// URLs are resolved either as signed V4 URLs (when an HMAC key is
/// configured) or as tokenized download URLs read from object metadata.
#[derive(Clone)]
pub struct FirebaseStorage {
    http: FirebaseHttp,
    base_url: String,
    bucket: String,
    session: SessionStore,
    signer: Option<UrlSigner>,
}

impl FirebaseStorage {
    pub fn new(
        http: FirebaseHttp,
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        session: SessionStore,
        signer: Option<UrlSigner>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            bucket: bucket.into(),
            session,
            signer,
        }
    }

    fn objects_url(&self) -> String {
        format!("{}/v0/b/{}/o", self.base_url, self.bucket)
    }

    fn object_url(&self, full_path: &str) -> String {
        format!("{}/{}", self.objects_url(), percent_encode(full_path, false))
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.session.id_token().await? {
            Some(token) => request.header("Authorization", format!("Firebase {token}")),
            None => request,
        })
    }
}

#[async_trait]
impl ObjectStore for FirebaseStorage {
    /// Follows `nextPageToken` until the whole folder has been listed.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectRef>> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = Url::parse(&self.objects_url()).context("invalid storage URL")?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("prefix", prefix);
                query.append_pair("delimiter", "/");
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }
            debug!(prefix = %prefix, page = ?page_token, "Listing storage folder");

            let request = self.authorize(self.http.client().get(url)).await?;
            let page: ListResponse = self.http.execute_json("list", prefix, request).await?;

            objects.extend(page.items.into_iter().map(|item| ObjectRef::new(item.name)));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn resolve_url(&self, object: &ObjectRef) -> Result<String> {
        if let Some(signer) = &self.signer {
            debug!(object = %object.full_path, "Signing photo URL");
            return signer.sign(&self.bucket, &object.full_path, Utc::now());
        }

        let url = self.object_url(&object.full_path);
        let request = self.authorize(self.http.client().get(&url)).await?;
        let metadata: ObjectMetadata = self
            .http
            .execute_json("metadata", &object.full_path, request)
            .await?;

        let token = metadata
            .first_download_token()
            .with_context(|| format!("object {} has no download token", metadata.name))?;

        Ok(format!("{url}?alt=media&token={}", percent_encode(token, false)))
    }
}

// ---------------------------------------------------------------------------
// Signing helpers
// ---------------------------------------------------------------------------

/// Produces `GOOG4-HMAC-SHA256` V4 signed URLs with an HMAC key pair.
///
/// Signing specification:
/// <https://cloud.google.com/storage/docs/authentication/signatures>
#[derive(Debug, Clone)]
pub struct UrlSigner {
    credentials: HmacCredentials,
    /// Scheme and host, e.g. `https://storage.googleapis.com`
    base_url: String,
    host: String,
    ttl_secs: u64,
}

/// Deterministic signing inputs used by tests.
#[derive(Debug)]
pub(crate) struct SigningContext<'a> {
    pub bucket: &'a str,
    pub object: &'a str,
    /// `%Y%m%dT%H%M%SZ`
    pub datetime: &'a str,
    /// `%Y%m%d`
    pub date: &'a str,
    pub expires_secs: u64,
}

impl UrlSigner {
    pub fn new(credentials: HmacCredentials, base_url: &str, ttl_secs: u64) -> Result<Self> {
        let parsed = Url::parse(base_url).with_context(|| format!("invalid GCS base URL: {base_url}"))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => anyhow::bail!("GCS base URL has no host: {base_url}"),
        };
        Ok(Self {
            credentials,
            base_url: base_url.trim_end_matches('/').to_owned(),
            host,
            ttl_secs,
        })
    }

    pub fn sign(&self, bucket: &str, object: &str, now: DateTime<Utc>) -> Result<String> {
        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let ctx = SigningContext {
            bucket,
            object,
            datetime: &datetime,
            date: &date,
            expires_secs: self.ttl_secs,
        };
        Ok(self.sign_inner(&ctx))
    }

    /// Inner implementation that accepts an explicit `SigningContext` so that
    /// unit tests can inject a fixed timestamp.
    pub(crate) fn sign_inner(&self, ctx: &SigningContext<'_>) -> String {
        let SigningContext { bucket, object, datetime, date, expires_secs } = ctx;
        let scope = format!("{date}/auto/storage/goog4_request");
        let credential = format!("{}/{scope}", self.credentials.access_id);

        // 1. Canonical request.
        //    Query parameters must already be sorted by name.
        let canonical_uri = format!("/{bucket}/{}", percent_encode(object, true));
        let canonical_query = format!(
            "X-Goog-Algorithm=GOOG4-HMAC-SHA256\
             &X-Goog-Credential={}\
             &X-Goog-Date={datetime}\
             &X-Goog-Expires={expires_secs}\
             &X-Goog-SignedHeaders=host",
            percent_encode(&credential, false),
        );
        let canonical_request = format!(
            "GET\n{canonical_uri}\n{canonical_query}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            self.host
        );

        // 2. String to sign.
        let hashed_request = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign =
            format!("GOOG4-HMAC-SHA256\n{datetime}\n{scope}\n{hashed_request}");

        // 3. Derive the signing key: date → region → service → request type.
        let mut key = hmac(format!("GOOG4{}", self.credentials.secret).as_bytes(), date.as_bytes());
        for part in ["auto", "storage", "goog4_request"] {
            key = hmac(&key, part.as_bytes());
        }

        // 4. Lowercase hex signature.
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

        format!(
            "{}{canonical_uri}?{canonical_query}&X-Goog-Signature={signature}",
            self.base_url
        )
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
