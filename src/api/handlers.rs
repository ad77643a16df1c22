use axum::{
    extract::{Query, State},
    Json,
};
use utoipa::OpenApi;

use super::{
    dto::{
        CredentialsRequest, DefaultsDto, ErrorDto, HistoryParams, MessageDto, MetricEntryDto,
        PhotoDto, RegistrationDto, SensorReadingDto, SessionDto, SignupRequest, WateringRequest,
    },
    errors::AppError,
    AppState,
};
use crate::{error::MonitorError, models::MetricValue};

/// Dashboard and command routes refuse to run without a signed-in user.
async fn require_session(state: &AppState) -> Result<(), AppError> {
    if state.session.is_signed_in().await {
        Ok(())
    } else {
        Err(MonitorError::NotSignedIn.into())
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Sign in with e-mail and password. Unverified accounts are refused and
/// left signed out.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionDto),
        (status = 400, description = "Missing e-mail or password", body = ErrorDto),
        (status = 403, description = "E-mail not verified", body = ErrorDto),
        (status = 409, description = "A login is already in progress", body = ErrorDto),
        (status = 502, description = "Identity provider rejected the request", body = ErrorDto),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<SessionDto>, AppError> {
    let titled = AppError::titled("Login Error");
    let _guard = state.login_busy.try_acquire().map_err(&titled)?;

    let session = state
        .accounts
        .sign_in(&body.email, &body.password)
        .await
        .map_err(&titled)?;
    Ok(Json(session.into()))
}

/// Create an account, store the profile and send the verification e-mail.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created; verification e-mail sent", body = RegistrationDto),
        (status = 400, description = "A field is missing", body = ErrorDto),
        (status = 409, description = "A signup is already in progress", body = ErrorDto),
        (status = 502, description = "Backend rejected the request", body = ErrorDto),
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<Json<RegistrationDto>, AppError> {
    let titled = AppError::titled("Signup Error");
    let _guard = state.signup_busy.try_acquire().map_err(&titled)?;

    let registration = state
        .accounts
        .sign_up(&body.profile(), &body.password)
        .await
        .map_err(&titled)?;
    Ok(Json(registration.into()))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = MessageDto),
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>) -> Json<MessageDto> {
    state.accounts.sign_out().await;
    Json(MessageDto::new("Signed out"))
}

/// Re-send the verification e-mail for an account that cannot sign in yet.
#[utoipa::path(
    post,
    path = "/auth/verification",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Verification e-mail sent", body = MessageDto),
        (status = 400, description = "Missing e-mail or password", body = ErrorDto),
        (status = 502, description = "Identity provider rejected the request", body = ErrorDto),
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<MessageDto>, AppError> {
    let titled = AppError::titled("Login Error");
    let _guard = state.login_busy.try_acquire().map_err(&titled)?;

    state
        .accounts
        .resend_verification(&body.email, &body.password)
        .await
        .map_err(&titled)?;
    Ok(Json(MessageDto::new("Verification email sent. Please check your inbox.")))
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Latest reading as dashboard rows. Raises humidity and temperature alerts.
#[utoipa::path(
    get,
    path = "/sensors/latest",
    responses(
        (status = 200, description = "Humidity, Temperature and Light Intensity", body = Vec<MetricEntryDto>),
        (status = 401, description = "Not signed in", body = ErrorDto),
        (status = 404, description = "No readings yet", body = ErrorDto),
        (status = 409, description = "Dashboard busy", body = ErrorDto),
        (status = 502, description = "Realtime database error", body = ErrorDto),
    ),
    tag = "sensors"
)]
pub async fn get_latest(State(state): State<AppState>) -> Result<Json<Vec<MetricEntryDto>>, AppError> {
    require_session(&state).await?;
    let _guard = state.dashboard_busy.try_acquire()?;

    let metrics = state.telemetry.fetch_latest().await?;
    Ok(Json(metrics.into_iter().map(Into::into).collect()))
}

/// The last readings, newest first.
#[utoipa::path(
    get,
    path = "/sensors/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Readings, newest first", body = Vec<SensorReadingDto>),
        (status = 401, description = "Not signed in", body = ErrorDto),
        (status = 404, description = "No readings yet", body = ErrorDto),
        (status = 409, description = "Dashboard busy", body = ErrorDto),
        (status = 502, description = "Realtime database error", body = ErrorDto),
    ),
    tag = "sensors"
)]
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<SensorReadingDto>>, AppError> {
    require_session(&state).await?;
    let _guard = state.dashboard_busy.try_acquire()?;

    let readings = state.telemetry.fetch_history(params.limit).await?;
    Ok(Json(readings.into_iter().map(Into::into).collect()))
}

/// Trigger the camera and return the photo it uploads.
#[utoipa::path(
    post,
    path = "/photo/capture",
    responses(
        (status = 200, description = "Resolved photo", body = PhotoDto),
        (status = 401, description = "Not signed in", body = ErrorDto),
        (status = 404, description = "Photo folder is empty", body = ErrorDto),
        (status = 409, description = "Dashboard busy", body = ErrorDto),
        (status = 502, description = "Backend error", body = ErrorDto),
        (status = 504, description = "No new photo before the capture timeout", body = ErrorDto),
    ),
    tag = "photo"
)]
pub async fn capture_photo(State(state): State<AppState>) -> Result<Json<PhotoDto>, AppError> {
    require_session(&state).await?;
    let _guard = state.dashboard_busy.try_acquire()?;

    let photo = state.telemetry.capture_photo().await?;
    Ok(Json(photo.into()))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/watering",
    request_body = WateringRequest,
    responses(
        (status = 200, description = "Watering flag written", body = MessageDto),
        (status = 401, description = "Not signed in", body = ErrorDto),
        (status = 502, description = "Realtime database error", body = ErrorDto),
    ),
    tag = "commands"
)]
pub async fn set_watering(
    State(state): State<AppState>,
    Json(body): Json<WateringRequest>,
) -> Result<Json<MessageDto>, AppError> {
    require_session(&state).await?;

    state.dispatcher.set_watering(body.on).await?;
    let message = if body.on { "Watering started" } else { "Watering stopped" };
    Ok(Json(MessageDto::new(message)))
}

#[utoipa::path(
    get,
    path = "/defaults",
    responses(
        (status = 200, description = "Saved default thresholds", body = DefaultsDto),
        (status = 401, description = "Not signed in", body = ErrorDto),
        (status = 404, description = "Nothing saved yet", body = ErrorDto),
    ),
    tag = "commands"
)]
pub async fn get_defaults(State(state): State<AppState>) -> Result<Json<DefaultsDto>, AppError> {
    require_session(&state).await?;

    let defaults = state.dispatcher.get_defaults().await?;
    Ok(Json(defaults.into()))
}

/// Overwrite the default thresholds record.
#[utoipa::path(
    put,
    path = "/defaults",
    request_body = DefaultsDto,
    responses(
        (status = 200, description = "Thresholds saved", body = MessageDto),
        (status = 401, description = "Not signed in", body = ErrorDto),
        (status = 502, description = "Realtime database error", body = ErrorDto),
    ),
    tag = "commands"
)]
pub async fn put_defaults(
    State(state): State<AppState>,
    Json(body): Json<DefaultsDto>,
) -> Result<Json<MessageDto>, AppError> {
    require_session(&state).await?;

    state.dispatcher.set_defaults(body.into()).await?;
    Ok(Json(MessageDto::new("Default values updated successfully")))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        login, signup, logout, resend_verification,
        get_latest, get_history, capture_photo,
        set_watering, get_defaults, put_defaults,
        health
    ),
    components(schemas(
        CredentialsRequest, SignupRequest, SessionDto, RegistrationDto, MessageDto,
        MetricEntryDto, MetricValue, SensorReadingDto, PhotoDto,
        WateringRequest, DefaultsDto, ErrorDto
    )),
    tags(
        (name = "auth",     description = "Sign-in, sign-up and verification"),
        (name = "sensors",  description = "Telemetry from the plant device"),
        (name = "photo",    description = "Camera capture"),
        (name = "commands", description = "Watering and default thresholds"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Plant Monitor API",
        version = "0.1.0",
        description = "REST API for the plant monitoring app"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
