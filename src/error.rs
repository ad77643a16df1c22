use std::time::Duration;

use thiserror::Error;

/// Every failure a user action can end in.
///
/// Each variant is caught at the action that produced it and turned into a
/// dismissable alert by the API layer; nothing is retried.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The realtime store returned no readings (or no record) for the query.
    #[error("No data found")]
    NoData,

    /// The photo folder listing was empty.
    #[error("No images found in the folder.")]
    NoImage,

    /// A backend call failed; the message is passed through as received.
    #[error("{0}")]
    Remote(String),

    /// Credentials were accepted but the e-mail address is not verified yet.
    #[error("Please verify your email before logging in.")]
    VerificationRequired,

    /// The same screen already has an action in flight.
    #[error("Another request is already in progress")]
    Busy,

    /// The camera device did not deliver a new photo in time.
    #[error("No new photo arrived within {} s", .0.as_secs())]
    CaptureTimeout(Duration),

    #[error("You must be logged in")]
    NotSignedIn,

    #[error("{0} is required")]
    MissingField(&'static str),
}

impl MonitorError {
    /// Title of the alert shown for this error.
    pub fn title(&self) -> &'static str {
        match self {
            MonitorError::NoData => "No data found",
            MonitorError::VerificationRequired => "Email Not Verified",
            MonitorError::NotSignedIn => "Not Logged In",
            MonitorError::MissingField(_) => "Missing Field",
            _ => "Error",
        }
    }
}

/// Remote failures keep their full context chain so the backend's own message
/// is never hidden behind ours.
impl From<anyhow::Error> for MonitorError {
    fn from(e: anyhow::Error) -> Self {
        MonitorError::Remote(format!("{e:#}"))
    }
}

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_message_passes_through_verbatim() {
        let err: MonitorError = anyhow::anyhow!("INVALID_LOGIN_CREDENTIALS").into();
        assert_eq!(err.to_string(), "INVALID_LOGIN_CREDENTIALS");
    }

    #[test]
    fn remote_message_keeps_context_chain() {
        let err: MonitorError = anyhow::anyhow!("connection refused")
            .context("Realtime database request failed")
            .into();
        assert_eq!(
            err.to_string(),
            "Realtime database request failed: connection refused"
        );
    }

    #[test]
    fn capture_timeout_message() {
        let err = MonitorError::CaptureTimeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "No new photo arrived within 30 s");
    }

    #[test]
    fn titles() {
        assert_eq!(MonitorError::NoData.title(), "No data found");
        assert_eq!(MonitorError::VerificationRequired.title(), "Email Not Verified");
        assert_eq!(MonitorError::NoImage.title(), "Error");
    }
}
