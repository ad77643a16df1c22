pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    busy::BusyFlag, control::CommandDispatcher, identity::AccountService, session::SessionStore,
    telemetry::TelemetryService,
};

/// Everything the handlers need, built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub telemetry: Arc<TelemetryService>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub accounts: Arc<AccountService>,
    pub session: SessionStore,
    /// Guards latest, history and capture.
    pub dashboard_busy: BusyFlag,
    pub login_busy: BusyFlag,
    pub signup_busy: BusyFlag,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/auth/login", post(handlers::login))
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/verification", post(handlers::resend_verification))
        .route("/sensors/latest", get(handlers::get_latest))
        .route("/sensors/history", get(handlers::get_history))
        .route("/photo/capture", post(handlers::capture_photo))
        .route("/watering", put(handlers::set_watering))
        .route(
            "/defaults",
            get(handlers::get_defaults).put(handlers::put_defaults),
        )
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
