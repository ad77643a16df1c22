use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

/// Local notifications raised by the telemetry alert rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    Humidity,
    Temperature,
}

impl Alert {
    pub fn title(&self) -> &'static str {
        match self {
            Alert::Humidity => "Humidity Alert",
            Alert::Temperature => "Temperature Alert",
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            Alert::Humidity => "Humidity Level Increased Significantly.",
            Alert::Temperature => "High Temperature for your plant.",
        }
    }
}

/// Fire-and-forget notification surface. Implementations never report
/// delivery; failures are logged and dropped.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: Alert);
}

/// Writes alerts to the log only.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, alert: Alert) {
        warn!(title = alert.title(), body = alert.body(), "Plant alert");
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    id: Uuid,
    title: &'a str,
    body: &'a str,
    sent_at: DateTime<Utc>,
}

/// Logs the alert and POSTs it as JSON to a configured webhook
/// (e.g. a push-notification relay).
///
/// The POST runs on its own task; `notify` returns as soon as the alert is
/// logged, whatever the webhook does.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }

    async fn deliver(&self, alert: Alert) {
        let payload = WebhookPayload {
            id: Uuid::new_v4(),
            title: alert.title(),
            body: alert.body(),
            sent_at: Utc::now(),
        };

        let result = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        match result {
            Ok(_) => debug!(id = %payload.id, title = payload.title, "Alert delivered to webhook"),
            Err(e) => warn!(title = payload.title, error = %e, "Alert webhook call failed"),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: Alert) {
        TracingNotifier.notify(alert).await;

        let webhook = self.clone();
        tokio::spawn(async move { webhook.deliver(alert).await });
    }
}
