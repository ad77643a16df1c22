use std::cmp::Ordering;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use super::FirebaseHttp;
use crate::{backend::RemoteStore, session::SessionStore};

/// Realtime Database over its REST interface (`{base}/{path}.json`).
#[derive(Clone)]
pub struct RealtimeDatabase {
    http: FirebaseHttp,
    base_url: String,
    session: SessionStore,
}

impl RealtimeDatabase {
    pub fn new(http: FirebaseHttp, base_url: impl Into<String>, session: SessionStore) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            session,
        }
    }

    /// `{base}/{path}.json?{params}&auth={id_token}`
    async fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}.json",
            self.base_url,
            path.trim_matches('/')
        ))
        .with_context(|| format!("invalid database URL for path {path:?}"))?;

        // Fetched before the serializer is opened; it must not live across an await.
        let token = self.session.id_token().await?;
        {
            let mut query = url.query_pairs_mut();
            for (k, v) in params {
                query.append_pair(k, v);
            }
            if let Some(token) = &token {
                query.append_pair("auth", token);
            }
        }
        // An empty query_pairs_mut() still leaves a trailing '?'.
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(url)
    }
}

#[async_trait]
impl RemoteStore for RealtimeDatabase {
    async fn read(&self, path: &str) -> Result<Option<Value>> {
        let url = self.url(path, &[]).await?;
        debug!(path = %path, "Reading database path");

        let value: Value = self
            .http
            .execute_json("read", path, self.http.client().get(url))
            .await?;

        Ok((!value.is_null()).then_some(value))
    }

    async fn write(&self, path: &str, value: &Value) -> Result<()> {
        let url = self.url(path, &[]).await?;
        debug!(path = %path, value = %value, "Writing database path");

        self.http
            .execute("write", path, self.http.client().put(url).json(value))
            .await?;
        Ok(())
    }

    async fn query_last(
        &self,
        path: &str,
        order_by: &str,
        limit: usize,
    ) -> Result<Vec<(String, Value)>> {
        // orderBy takes a JSON string literal, quotes included.
        let params = [
            ("orderBy", format!("\"{order_by}\"")),
            ("limitToLast", limit.to_string()),
        ];
        let url = self.url(path, &params).await?;
        debug!(path = %path, order_by = %order_by, limit, "Querying database path");

        let value: Value = self
            .http
            .execute_json("query", path, self.http.client().get(url))
            .await?;

        Ok(sort_children(value, order_by))
    }
}

/// The REST API returns filtered results as an unordered JSON object; restore
/// ascending order on the child field, falling back to the key.
fn sort_children(value: Value, order_by: &str) -> Vec<(String, Value)> {
    let Value::Object(map) = value else {
        return Vec::new();
    };

    let mut children: Vec<(String, Value)> = map.into_iter().collect();
    children.sort_by(|(ka, va), (kb, vb)| {
        let a = va.get(order_by).and_then(Value::as_f64);
        let b = vb.get(order_by).and_then(Value::as_f64);
        match (a, b) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            // Children without the field sort first, as the database does.
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| ka.cmp(kb))
    });
    children
}
