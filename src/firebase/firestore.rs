use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{models::FirestoreDocument, FirebaseHttp};
use crate::{backend::ProfileStore, models::Profile};

/// Cloud Firestore REST client for the `users` profile collection.
#[derive(Clone)]
pub struct Firestore {
    http: FirebaseHttp,
    base_url: String,
    project_id: String,
}

impl Firestore {
    pub fn new(http: FirebaseHttp, base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            project_id: project_id.into(),
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents/{collection}",
            self.base_url, self.project_id
        )
    }
}

/// Firestore documents wrap every field in a typed value object.
fn profile_document(profile: &Profile) -> Value {
    json!({
        "fields": {
            "name":    { "stringValue": profile.name },
            "surname": { "stringValue": profile.surname },
            "plant":   { "stringValue": profile.plant },
            "email":   { "stringValue": profile.email },
        }
    })
}

#[async_trait]
impl ProfileStore for Firestore {
    async fn create_profile(&self, id_token: &str, profile: &Profile) -> Result<String> {
        let request = self
            .http
            .client()
            .post(self.collection_url("users"))
            .bearer_auth(id_token)
            .json(&profile_document(profile));

        let doc: FirestoreDocument = self.http.execute_json("create_profile", "users", request).await?;
        info!(document = %doc.id(), "Profile document created");
        Ok(doc.id().to_owned())
    }
}
