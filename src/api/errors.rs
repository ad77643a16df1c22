use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use super::dto::ErrorDto;
use crate::error::MonitorError;

#[derive(Debug)]
pub struct AppError {
    pub error: MonitorError,
    title: Option<&'static str>,
}

impl AppError {
    /// Replaces the generic "Error" title with a screen-specific one.
    /// Errors with their own title keep it.
    pub fn titled(title: &'static str) -> impl Fn(MonitorError) -> Self {
        move |error| {
            let title = (error.title() == "Error").then_some(title);
            Self { error, title }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.error {
            MonitorError::NoData | MonitorError::NoImage => StatusCode::NOT_FOUND,
            MonitorError::Remote(_) => StatusCode::BAD_GATEWAY,
            MonitorError::VerificationRequired => StatusCode::FORBIDDEN,
            MonitorError::Busy => StatusCode::CONFLICT,
            MonitorError::CaptureTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            MonitorError::NotSignedIn => StatusCode::UNAUTHORIZED,
            MonitorError::MissingField(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let title = self.title.unwrap_or_else(|| self.error.title());
        warn!(status = status.as_u16(), title, error = %self.error, "Request failed");

        let body = Json(ErrorDto {
            title: title.to_owned(),
            error: self.error.to_string(),
        });
        (status, body).into_response()
    }
}

impl<E: Into<MonitorError>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self {
            error: e.into(),
            title: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_title_only_replaces_generic_title() {
        let err = AppError::titled("Login Error")(MonitorError::Remote("INVALID_PASSWORD".into()));
        assert_eq!(err.title, Some("Login Error"));

        let err = AppError::titled("Login Error")(MonitorError::VerificationRequired);
        assert_eq!(err.title, None);
    }

    #[test]
    fn statuses() {
        assert_eq!(AppError::from(MonitorError::NoData).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(MonitorError::Busy).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(MonitorError::Remote("x".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
