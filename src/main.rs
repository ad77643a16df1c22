use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use plant_monitor_service::{
    api::{self, AppState},
    busy::BusyFlag,
    config::Config,
    control::CommandDispatcher,
    firebase::{
        auth::FirebaseAuth, database::RealtimeDatabase, firestore::Firestore,
        storage::{FirebaseStorage, UrlSigner},
        FirebaseHttp,
    },
    identity::AccountService,
    notify::{Notifier, TracingNotifier, WebhookNotifier},
    response_store::ResponseStore,
    session::SessionStore,
    telemetry::TelemetryService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    info!(
        database = %config.database_url,
        bucket = %config.storage_bucket,
        capture_mode = ?config.capture.mode,
        "Configuration loaded"
    );

    let http = FirebaseHttp::new(ResponseStore::new(config.response_dump_dir.as_deref()));

    // Identity first: the session refreshes tokens through it
    let identity = Arc::new(FirebaseAuth::new(
        http.clone(),
        &config.identity_base_url,
        &config.secure_token_base_url,
        &config.firebase_api_key,
    ));
    let session = SessionStore::new(identity.clone());

    let store = Arc::new(RealtimeDatabase::new(
        http.clone(),
        &config.database_url,
        session.clone(),
    ));

    let signer = config
        .gcs_hmac
        .clone()
        .map(|creds| UrlSigner::new(creds, &config.gcs_base_url, config.signed_url_ttl_secs))
        .transpose()?;
    if signer.is_some() {
        info!(ttl_secs = config.signed_url_ttl_secs, "Photo URLs will be V4-signed");
    }
    let objects = Arc::new(FirebaseStorage::new(
        http.clone(),
        &config.storage_base_url,
        &config.storage_bucket,
        session.clone(),
        signer,
    ));

    let profiles = Arc::new(Firestore::new(
        http,
        &config.firestore_base_url,
        &config.firebase_project_id,
    ));

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(TracingNotifier),
    };

    let telemetry = Arc::new(TelemetryService::new(
        store.clone(),
        objects,
        notifier,
        config.alerts,
        config.capture.clone(),
        config.history_limit,
    ));

    let state = AppState {
        telemetry: telemetry.clone(),
        dispatcher: Arc::new(CommandDispatcher::new(store)),
        accounts: Arc::new(AccountService::new(identity, profiles, session.clone())),
        session: session.clone(),
        dashboard_busy: BusyFlag::new(),
        login_busy: BusyFlag::new(),
        signup_busy: BusyFlag::new(),
    };

    if config.poll_interval_secs > 0 {
        tokio::spawn(telemetry.run_refresh_loop(
            session,
            state.dashboard_busy.clone(),
            Duration::from_secs(config.poll_interval_secs),
        ));
    }

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
