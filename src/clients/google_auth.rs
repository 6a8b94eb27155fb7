//! OAuth2 installed-app flow for the Calendar API.
//!
//! The cached token keeps the `access_token` / `token_type` /
//! `refresh_token` / `expiry` layout used by common OAuth2 client libraries,
//! so an existing `token.json` is picked up as is. A zero-value expiry
//! (`0001-01-01T00:00:00Z`) is read as "never expires".

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::clients::callback_server::CallbackServer;
use crate::clients::google_calendar::{http_client, REQUEST_TIMEOUT};
use crate::error::AuthError;
use crate::shutdown::Shutdown;

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Client-secret descriptor downloaded from the cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecretFile {
    #[serde(default)]
    pub installed: Option<AppCredentials>,
    #[serde(default)]
    pub web: Option<AppCredentials>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppCredentials {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_expiry",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn deserialize_expiry<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let expiry = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(expiry.filter(|e| e.year() > 1))
}

impl StoredToken {
    /// Expired, or within a minute of expiring. A token without expiry
    /// never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now + chrono::Duration::seconds(60),
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(default_token_type),
            refresh_token: self.refresh_token.or(previous_refresh),
            expiry: self
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }
}

pub fn load_credentials(path: &Path) -> Result<AppCredentials, AuthError> {
    if !path.exists() {
        return Err(AuthError::CredentialsNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_credentials(&content)
        .map_err(|e| AuthError::InvalidCredentials(format!("{}: {}", path.display(), e)))
}

fn parse_credentials(content: &str) -> Result<AppCredentials, String> {
    let file: ClientSecretFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
    file.installed
        .or(file.web)
        .ok_or_else(|| "expected an \"installed\" or \"web\" section".to_string())
}

/// Returns `None` when no token has been cached yet.
pub fn load_token(path: &Path) -> Result<Option<StoredToken>, AuthError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

pub fn save_token(path: &Path, token: &StoredToken) -> Result<(), AuthError> {
    tracing::info!(path = %path.display(), "saving credential file");
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(token)?)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

pub fn authorization_url(
    creds: &AppCredentials,
    redirect_uri: &str,
    state: &str,
) -> Result<String, AuthError> {
    let url = reqwest::Url::parse_with_params(
        &creds.auth_uri,
        &[
            ("client_id", creds.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", CALENDAR_SCOPE),
            ("access_type", "offline"),
            ("state", state),
        ],
    )
    .map_err(|e| AuthError::InvalidCredentials(format!("auth_uri: {}", e)))?;
    Ok(url.to_string())
}

pub async fn exchange_code(
    http: &reqwest::Client,
    creds: &AppCredentials,
    code: &str,
    redirect_uri: &str,
) -> Result<StoredToken, AuthError> {
    let mut form = vec![
        ("code", code),
        ("client_id", creds.client_id.as_str()),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];
    if let Some(secret) = creds.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }
    let resp = http.post(&creds.token_uri).form(&form).send().await?;
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(AuthError::Exchange(format!("HTTP {}: {}", status, body)));
    }
    let parsed: TokenResponse = serde_json::from_str(&body)?;
    Ok(parsed.into_token(None))
}

pub async fn refresh_token(
    http: &reqwest::Client,
    creds: &AppCredentials,
    token: &StoredToken,
) -> Result<StoredToken, AuthError> {
    let refresh = token
        .refresh_token
        .as_deref()
        .ok_or_else(|| AuthError::Refresh("no refresh token cached".to_string()))?;
    let mut form = vec![
        ("client_id", creds.client_id.as_str()),
        ("refresh_token", refresh),
        ("grant_type", "refresh_token"),
    ];
    if let Some(secret) = creds.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }
    let resp = http.post(&creds.token_uri).form(&form).send().await?;
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(AuthError::Refresh(format!("HTTP {}: {}", status, body)));
    }
    let parsed: TokenResponse = serde_json::from_str(&body)?;
    Ok(parsed.into_token(token.refresh_token.clone()))
}

/// Hands out a usable access token, running the consent flow when the cache
/// is empty or cannot be refreshed.
pub struct GoogleAuthorizer {
    http: reqwest::Client,
    credentials_file: PathBuf,
    token_file: PathBuf,
    callback_port: u16,
    timeout: Duration,
}

impl GoogleAuthorizer {
    pub fn new(
        credentials_file: PathBuf,
        token_file: PathBuf,
        callback_port: u16,
        timeout: Duration,
    ) -> Self {
        Self {
            http: http_client(REQUEST_TIMEOUT),
            credentials_file,
            token_file,
            callback_port,
            timeout,
        }
    }

    pub async fn access_token(&self, shutdown: &Shutdown) -> Result<String, AuthError> {
        let creds = load_credentials(&self.credentials_file)?;

        let cached = load_token(&self.token_file).unwrap_or_else(|err| {
            tracing::warn!(
                path = %self.token_file.display(),
                error = %err,
                "cached token is unreadable, asking for consent again"
            );
            None
        });
        let token = match cached {
            Some(cached) if !cached.is_expired(Utc::now()) => return Ok(cached.access_token),
            Some(cached) if cached.refresh_token.is_some() => {
                match refresh_token(&self.http, &creds, &cached).await {
                    Ok(refreshed) => refreshed,
                    Err(err) => {
                        tracing::warn!(error = %err, "cached token could not be refreshed, asking for consent again");
                        self.consent(&creds, shutdown).await?
                    }
                }
            }
            _ => self.consent(&creds, shutdown).await?,
        };

        save_token(&self.token_file, &token)?;
        Ok(token.access_token)
    }

    async fn consent(
        &self,
        creds: &AppCredentials,
        shutdown: &Shutdown,
    ) -> Result<StoredToken, AuthError> {
        let state = uuid::Uuid::new_v4().to_string();
        let server = CallbackServer::bind(self.callback_port, state.clone()).await?;
        let redirect_uri = server.redirect_uri();
        let auth_url = authorization_url(creds, &redirect_uri, &state)?;

        println!("Go to the following link in your browser:\n{}", auth_url);
        let code = server.wait_for_code(self.timeout, shutdown).await?;
        tracing::info!("authorization code received");
        exchange_code(&self.http, creds, &code, &redirect_uri).await
    }
}
