use std::path::PathBuf;
use std::time::Duration;

/// The scheduling input broke its contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRequest {
    #[error("team member list is empty")]
    EmptyMembers,
    #[error("duration must be at least one week, got {0}")]
    NonPositiveDuration(i64),
    #[error("rotation runs past the supported calendar range")]
    DateOutOfRange,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("unable to parse generated parameters: {reply:?}")]
    ParseFailure { reply: String },
    #[error("unable to parse start date {value:?}: {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("text generator failed: {0}")]
    Generator(String),
    #[error("invalid request: {0}")]
    Invalid(#[from] InvalidRequest),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("client secret file not found at {0}")]
    CredentialsNotFound(PathBuf),
    #[error("invalid client secret file: {0}")]
    InvalidCredentials(String),
    #[error("unable to listen for the authorization callback on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("authorization denied: {0}")]
    Denied(String),
    #[error("no authorization callback received within {0:?}")]
    TimedOut(Duration),
    #[error("authorization cancelled")]
    Cancelled,
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("no calendar named {0:?} is accessible to this account")]
    NotFound(String),
    #[error("calendar access token rejected")]
    Unauthorized,
    #[error("calendar API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid calendar API url: {0}")]
    InvalidUrl(String),
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
}

/// One event failed to be created.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("calendar access token rejected")]
    Unauthorized,
    #[error("calendar API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid calendar API url: {0}")]
    InvalidUrl(String),
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error("confirmation prompt failed: {0}")]
    Prompt(#[from] inquire::InquireError),
    #[error("schedule not confirmed, nothing was created")]
    Declined,
    #[error("aborted")]
    Cancelled,
    #[error("{failed} of {total} events failed, {skipped} skipped")]
    Incomplete {
        failed: usize,
        skipped: usize,
        total: usize,
    },
}
