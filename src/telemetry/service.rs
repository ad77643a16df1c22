use std::{collections::HashSet, sync::Arc, time::Duration};

use serde_json::Value;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use super::photo::photo_label;
use crate::{
    backend::{ObjectRef, ObjectStore, RemoteStore},
    busy::BusyFlag,
    config::{AlertThresholds, CaptureMode, CaptureSettings},
    error::{MonitorError, MonitorResult},
    models::{MetricEntry, PhotoAsset, SensorReading},
    notify::{Alert, Notifier},
    session::SessionStore,
};

/// Realtime path the device appends readings to (`data/{auto-id}`).
pub const READINGS_PATH: &str = "data";
/// Child field readings are ordered by.
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Trigger flag the camera device watches.
pub const CAPTURE_FLAG_PATH: &str = "image";
/// Storage folder the camera uploads to.
pub const PHOTO_PREFIX: &str = "imageofPlant/";

pub struct TelemetryService {
    store: Arc<dyn RemoteStore>,
    objects: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    alerts: AlertThresholds,
    capture: CaptureSettings,
    history_limit: usize,
}

impl TelemetryService {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        objects: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        alerts: AlertThresholds,
        capture: CaptureSettings,
        history_limit: usize,
    ) -> Self {
        Self {
            store,
            objects,
            notifier,
            alerts,
            capture,
            history_limit: history_limit.max(1),
        }
    }

    /// Reads the newest reading, raises the alert rules against it and
    /// returns it as dashboard rows.
    ///
    /// Alerts are not de-duplicated: every call that observes a reading above
    /// a threshold notifies again.
    pub async fn fetch_latest(&self) -> MonitorResult<Vec<MetricEntry>> {
        let reading = self
            .query_readings(1)
            .await?
            .pop()
            .ok_or(MonitorError::NoData)?;
        debug!(?reading, "Fetched latest reading");

        self.raise_alerts(&reading).await;
        Ok(reading.metrics())
    }

    /// The last `limit` readings, newest first. `None` uses the configured
    /// history size, which is also the upper bound.
    pub async fn fetch_history(&self, limit: Option<usize>) -> MonitorResult<Vec<SensorReading>> {
        let limit = limit
            .unwrap_or(self.history_limit)
            .clamp(1, self.history_limit);

        let mut readings = self.query_readings(limit).await?;
        if readings.is_empty() {
            return Err(MonitorError::NoData);
        }

        readings.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
        info!(count = readings.len(), "Fetched reading history");
        Ok(readings)
    }

    /// Asks the camera for a fresh photo and resolves it.
    ///
    /// The trigger flag is raised, the service waits according to the
    /// configured `CaptureMode`, then lowers the flag again. The device never
    /// acknowledges the trigger itself.
    pub async fn capture_photo(&self) -> MonitorResult<PhotoAsset> {
        let newest = match self.capture.mode {
            CaptureMode::Delay => self.capture_with_delay().await?,
            CaptureMode::Ack => self.capture_with_ack().await?,
        };

        let url = self.objects.resolve_url(&newest).await?;
        let label = photo_label(newest.name());
        info!(object = %newest.full_path, label = %label, "Photo resolved");

        Ok(PhotoAsset { url, label })
    }

    /// Re-reads the latest reading every `interval` while someone is signed
    /// in and the dashboard is idle. Spawn this via `tokio::spawn`.
    pub async fn run_refresh_loop(
        self: Arc<Self>,
        session: SessionStore,
        busy: BusyFlag,
        interval: Duration,
    ) {
        info!(interval_secs = interval.as_secs(), "Auto-refresh loop started");
        let mut ticker = time::interval(interval);

        loop {
            ticker.tick().await;

            if !session.is_signed_in().await {
                debug!("Nobody signed in; skipping auto-refresh");
                continue;
            }
            let Ok(_guard) = busy.try_acquire() else {
                debug!("Dashboard busy; skipping auto-refresh");
                continue;
            };

            if let Err(e) = self.fetch_latest().await {
                error!(error = %e, "Auto-refresh failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Readings
    // -----------------------------------------------------------------------

    /// The last `limit` readings in ascending timestamp order. Children that
    /// are not reading objects are skipped.
    async fn query_readings(&self, limit: usize) -> MonitorResult<Vec<SensorReading>> {
        let rows = self
            .store
            .query_last(READINGS_PATH, TIMESTAMP_FIELD, limit)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, value)| parse_reading(&key, value))
            .collect())
    }

    /// Rules are evaluated one after the other on the reading in hand.
    async fn raise_alerts(&self, reading: &SensorReading) {
        let humidity = reading.humidity.unwrap_or(0.0);
        if humidity > self.alerts.humidity_above {
            info!(humidity, threshold = self.alerts.humidity_above, "Humidity above threshold");
            self.notifier.notify(Alert::Humidity).await;
        }

        let temperature = reading.temperature.unwrap_or(0.0);
        if temperature > self.alerts.temperature_above {
            info!(temperature, threshold = self.alerts.temperature_above, "Temperature above threshold");
            self.notifier.notify(Alert::Temperature).await;
        }
    }

    // -----------------------------------------------------------------------
    // Photo capture
    // -----------------------------------------------------------------------

    async fn set_capture_flag(&self, on: bool) -> MonitorResult<()> {
        self.store
            .write(CAPTURE_FLAG_PATH, &Value::from(on as i64))
            .await?;
        debug!(on, "Capture flag written");
        Ok(())
    }

    /// Raise, sleep, lower, then take whatever the folder lists last.
    ///
    /// Nothing guarantees the device finished uploading within the delay;
    /// kept for firmware that cannot be observed any other way.
    async fn capture_with_delay(&self) -> MonitorResult<ObjectRef> {
        self.set_capture_flag(true).await?;
        time::sleep(self.capture.delay).await;
        self.set_capture_flag(false).await?;

        self.objects
            .list(PHOTO_PREFIX)
            .await?
            .pop()
            .ok_or(MonitorError::NoImage)
    }

    /// Raise, wait until an object that was not there before appears, lower.
    async fn capture_with_ack(&self) -> MonitorResult<ObjectRef> {
        let baseline: HashSet<String> = self
            .objects
            .list(PHOTO_PREFIX)
            .await?
            .into_iter()
            .map(|o| o.full_path)
            .collect();

        self.set_capture_flag(true).await?;
        let waited = self.wait_for_new_photo(&baseline).await;
        // The flag goes back down whatever happened while waiting.
        let lowered = self.set_capture_flag(false).await;

        let newest = waited?;
        lowered?;
        Ok(newest)
    }

    async fn wait_for_new_photo(&self, baseline: &HashSet<String>) -> MonitorResult<ObjectRef> {
        let deadline = Instant::now() + self.capture.timeout;

        loop {
            time::sleep(self.capture.poll_interval).await;

            let listing = self.objects.list(PHOTO_PREFIX).await?;
            if let Some(new) = listing
                .iter()
                .rev()
                .find(|o| !baseline.contains(&o.full_path))
            {
                return Ok(new.clone());
            }

            if Instant::now() >= deadline {
                warn!(
                    timeout_secs = self.capture.timeout.as_secs(),
                    listed = listing.len(),
                    "No new photo before capture timeout"
                );
                return Err(if listing.is_empty() {
                    MonitorError::NoImage
                } else {
                    MonitorError::CaptureTimeout(self.capture.timeout)
                });
            }
        }
    }
}

fn parse_reading(key: &str, value: Value) -> Option<SensorReading> {
    match serde_json::from_value::<SensorReading>(value) {
        Ok(reading) => Some(reading),
        Err(e) => {
            warn!(key = %key, error = %e, "Skipping malformed reading");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        backend::AuthUser,
        models::MetricValue,
        notify::WebhookNotifier,
        testing::{FakeIdentity, FakeObjects, FakeStore, RecordingNotifier},
    };

    struct Harness {
        store: Arc<FakeStore>,
        objects: Arc<FakeObjects>,
        notifier: Arc<RecordingNotifier>,
        service: Arc<TelemetryService>,
    }

    fn harness(store: FakeStore, objects: FakeObjects, mode: CaptureMode) -> Harness {
        let store = Arc::new(store);
        let objects = Arc::new(objects);
        let notifier = Arc::new(RecordingNotifier::default());
        let service = Arc::new(TelemetryService::new(
            store.clone(),
            objects.clone(),
            notifier.clone(),
            AlertThresholds::default(),
            CaptureSettings {
                mode,
                ..CaptureSettings::default()
            },
            50,
        ));
        Harness {
            store,
            objects,
            notifier,
            service,
        }
    }

    fn reading(key: &str, humidity: f64, temperature: f64, timestamp: i64) -> (String, Value) {
        (
            key.to_owned(),
            json!({
                "humidity": humidity,
                "temperature": temperature,
                "light intensity": 300,
                "timestamp": timestamp,
            }),
        )
    }

    fn readings(n: i64) -> Vec<(String, Value)> {
        (1..=n).map(|i| reading(&format!("-k{i:03}"), 30.0, 5.0, i)).collect()
    }

    // --- fetch_latest --------------------------------------------------------

    #[tokio::test]
    async fn latest_maps_metrics() {
        let h = harness(
            FakeStore::with_children(vec![reading("-a", 35.5, 8.0, 1)]),
            FakeObjects::default(),
            CaptureMode::Ack,
        );

        let m = h.service.fetch_latest().await.unwrap();
        assert_eq!(m[0].value, MetricValue::Number(35.5));
        assert_eq!(m[1].value, MetricValue::Number(8.0));
        assert_eq!(m[2].value, MetricValue::Number(300.0));
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn latest_on_empty_store_is_no_data() {
        let h = harness(FakeStore::default(), FakeObjects::default(), CaptureMode::Ack);
        assert!(matches!(h.service.fetch_latest().await, Err(MonitorError::NoData)));
    }

    #[tokio::test]
    async fn humidity_alert_fires_once_per_call_without_suppression() {
        let h = harness(
            FakeStore::with_children(vec![reading("-a", 41.0, 5.0, 1)]),
            FakeObjects::default(),
            CaptureMode::Ack,
        );

        h.service.fetch_latest().await.unwrap();
        assert_eq!(h.notifier.count(Alert::Humidity), 1);

        h.service.fetch_latest().await.unwrap();
        h.service.fetch_latest().await.unwrap();
        assert_eq!(h.notifier.count(Alert::Humidity), 3);
        assert_eq!(h.notifier.count(Alert::Temperature), 0);
    }

    #[tokio::test]
    async fn both_alerts_fire_independently() {
        let h = harness(
            FakeStore::with_children(vec![reading("-a", 80.0, 25.0, 1)]),
            FakeObjects::default(),
            CaptureMode::Ack,
        );

        h.service.fetch_latest().await.unwrap();
        assert_eq!(h.notifier.sent(), vec![Alert::Humidity, Alert::Temperature]);
    }

    #[tokio::test]
    async fn thresholds_are_strict() {
        let h = harness(
            FakeStore::with_children(vec![reading("-a", 40.0, 10.0, 1)]),
            FakeObjects::default(),
            CaptureMode::Ack,
        );

        h.service.fetch_latest().await.unwrap();
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn latest_uses_newest_reading() {
        let h = harness(
            FakeStore::with_children(vec![reading("-a", 10.0, 1.0, 1), reading("-b", 60.0, 2.0, 2)]),
            FakeObjects::default(),
            CaptureMode::Ack,
        );

        let m = h.service.fetch_latest().await.unwrap();
        assert_eq!(m[0].value, MetricValue::Number(60.0));
    }

    #[tokio::test]
    async fn latest_remote_failure_is_verbatim() {
        let store = FakeStore::default();
        store.fail_with("Permission denied");
        let h = harness(store, FakeObjects::default(), CaptureMode::Ack);

        let err = h.service.fetch_latest().await.unwrap_err();
        assert_eq!(err.to_string(), "Permission denied");
    }

    #[tokio::test]
    async fn latest_does_not_wait_for_alert_webhook() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let service = TelemetryService::new(
            Arc::new(FakeStore::with_children(vec![reading("-a", 80.0, 25.0, 1)])),
            Arc::new(FakeObjects::default()),
            Arc::new(WebhookNotifier::new(format!("http://{addr}/alerts"))),
            AlertThresholds::default(),
            CaptureSettings::default(),
            50,
        );

        let latest = time::timeout(Duration::from_secs(2), service.fetch_latest()).await;
        assert!(matches!(latest, Ok(Ok(_))));
    }

    // --- fetch_history -------------------------------------------------------

    #[tokio::test]
    async fn history_is_capped_and_newest_first() {
        let h = harness(
            FakeStore::with_children(readings(70)),
            FakeObjects::default(),
            CaptureMode::Ack,
        );

        let history = h.service.fetch_history(Some(50)).await.unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].timestamp, 70.0);
        assert_eq!(history[49].timestamp, 21.0);
        assert!(history.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
    }

    #[tokio::test]
    async fn history_limit_above_configured_is_clamped() {
        let h = harness(
            FakeStore::with_children(readings(70)),
            FakeObjects::default(),
            CaptureMode::Ack,
        );

        assert_eq!(h.service.fetch_history(Some(500)).await.unwrap().len(), 50);
        assert_eq!(h.service.fetch_history(None).await.unwrap().len(), 50);
        assert_eq!(h.service.fetch_history(Some(5)).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn history_never_alerts() {
        let h = harness(
            FakeStore::with_children(vec![reading("-a", 99.0, 99.0, 1)]),
            FakeObjects::default(),
            CaptureMode::Ack,
        );

        h.service.fetch_history(None).await.unwrap();
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn history_skips_malformed_children() {
        let mut children = readings(2);
        children.insert(1, ("-junk".into(), json!("not a reading")));
        let h = harness(FakeStore::with_children(children), FakeObjects::default(), CaptureMode::Ack);

        assert_eq!(h.service.fetch_history(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_history_is_no_data() {
        let h = harness(FakeStore::default(), FakeObjects::default(), CaptureMode::Ack);
        assert!(matches!(h.service.fetch_history(None).await, Err(MonitorError::NoData)));
    }

    // --- capture_photo: delay mode -------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn delay_capture_toggles_flag_and_takes_last_listed() {
        let h = harness(
            FakeStore::default(),
            FakeObjects::new(vec![vec![
                "imageofPlant/captured_image_old.jpg",
                "imageofPlant/captured_image_sunlight.jpg",
            ]]),
            CaptureMode::Delay,
        );

        let started = Instant::now();
        let photo = h.service.capture_photo().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(photo.label, "sunlight");
        assert_eq!(
            photo.url,
            "https://cdn.test/imageofPlant/captured_image_sunlight.jpg"
        );
        assert_eq!(
            h.store.writes(),
            vec![("image".to_owned(), json!(1)), ("image".to_owned(), json!(0))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delay_capture_empty_listing_is_no_image_without_resolving() {
        let h = harness(FakeStore::default(), FakeObjects::new(vec![vec![]]), CaptureMode::Delay);

        let err = h.service.capture_photo().await.unwrap_err();
        assert!(matches!(err, MonitorError::NoImage));
        assert_eq!(h.objects.resolve_calls(), 0);
        assert_eq!(h.store.get("image"), Some(json!(0)));
    }

    // --- capture_photo: ack mode ---------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn ack_capture_waits_for_new_object() {
        let h = harness(
            FakeStore::default(),
            FakeObjects::new(vec![
                vec!["imageofPlant/captured_image_old.jpg"],
                vec!["imageofPlant/captured_image_old.jpg"],
                vec![
                    "imageofPlant/captured_image_old.jpg",
                    "imageofPlant/captured_image_fresh.jpg",
                ],
            ]),
            CaptureMode::Ack,
        );

        let photo = h.service.capture_photo().await.unwrap();

        assert_eq!(photo.label, "fresh");
        assert_eq!(h.objects.list_calls(), 3);
        assert_eq!(h.store.get("image"), Some(json!(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn ack_capture_picks_new_object_even_if_not_last_listed() {
        let h = harness(
            FakeStore::default(),
            FakeObjects::new(vec![
                vec!["imageofPlant/captured_image_zz.jpg"],
                vec![
                    "imageofPlant/captured_image_aa.jpg",
                    "imageofPlant/captured_image_zz.jpg",
                ],
            ]),
            CaptureMode::Ack,
        );

        assert_eq!(h.service.capture_photo().await.unwrap().label, "aa");
    }

    #[tokio::test(start_paused = true)]
    async fn ack_capture_empty_listing_is_no_image_without_resolving() {
        let h = harness(FakeStore::default(), FakeObjects::new(vec![vec![]]), CaptureMode::Ack);

        let err = h.service.capture_photo().await.unwrap_err();
        assert!(matches!(err, MonitorError::NoImage));
        assert_eq!(h.objects.resolve_calls(), 0);
        assert_eq!(h.store.get("image"), Some(json!(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn ack_capture_times_out_when_nothing_new_arrives() {
        let h = harness(
            FakeStore::default(),
            FakeObjects::new(vec![vec!["imageofPlant/captured_image_old.jpg"]]),
            CaptureMode::Ack,
        );

        let err = h.service.capture_photo().await.unwrap_err();
        assert!(matches!(err, MonitorError::CaptureTimeout(d) if d == Duration::from_secs(30)));
        assert_eq!(h.objects.resolve_calls(), 0);
        assert_eq!(h.store.get("image"), Some(json!(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_failure_is_verbatim() {
        let objects = FakeObjects::new(vec![vec!["imageofPlant/captured_image_a.jpg"]]);
        objects.fail_resolve("storage/object-not-found");
        let h = harness(FakeStore::default(), objects, CaptureMode::Delay);

        let err = h.service.capture_photo().await.unwrap_err();
        assert_eq!(err.to_string(), "storage/object-not-found");
    }

    // --- run_refresh_loop ----------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn refresh_loop_alerts_on_every_tick_while_signed_in() {
        let h = harness(
            FakeStore::with_children(vec![reading("-a", 55.0, 5.0, 1)]),
            FakeObjects::default(),
            CaptureMode::Ack,
        );
        let session = SessionStore::new(Arc::new(FakeIdentity::verified()));
        session
            .start(&AuthUser {
                uid: "u".into(),
                email: "a@b.c".into(),
                id_token: "t".into(),
                refresh_token: "r".into(),
                expires_in: 3600,
            })
            .await;

        let handle = tokio::spawn(h.service.clone().run_refresh_loop(
            session,
            BusyFlag::new(),
            Duration::from_secs(10),
        ));
        time::sleep(Duration::from_secs(25)).await;
        handle.abort();

        // Ticks at 0 s, 10 s and 20 s.
        assert_eq!(h.notifier.count(Alert::Humidity), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_loop_idles_when_signed_out() {
        let h = harness(
            FakeStore::with_children(vec![reading("-a", 55.0, 5.0, 1)]),
            FakeObjects::default(),
            CaptureMode::Ack,
        );
        let session = SessionStore::new(Arc::new(FakeIdentity::default()));

        let handle = tokio::spawn(h.service.clone().run_refresh_loop(
            session,
            BusyFlag::new(),
            Duration::from_secs(10),
        ));
        time::sleep(Duration::from_secs(25)).await;
        handle.abort();

        assert!(h.notifier.sent().is_empty());
    }
}
