//! Google Calendar API v3: calendar lookup and event insertion.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, PublishError};
use crate::models::rotation::RotationEvent;
use crate::service::publisher::{CalendarSink, EventHandle};

/// Google only knows event colors "1" to "11".
const EVENT_COLOR_COUNT: u32 = 11;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client whose requests give up after `timeout`.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to a default HTTP client");
            reqwest::Client::new()
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarListEntry {
    id: String,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBody<'a> {
    id: &'a str,
    summary: &'a str,
    start: EventDate,
    end: EventDate,
    recurrence: Vec<String>,
    color_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDate {
    date: String,
    time_zone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    id: String,
    #[serde(default)]
    html_link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(exponent)
                .min(self.max_backoff_ms),
        )
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Maps a 1-based rotation color tag onto Google's event palette.
pub fn color_id(color_tag: u32) -> String {
    (((color_tag.max(1) - 1) % EVENT_COLOR_COUNT) + 1).to_string()
}

pub struct GoogleCalendarClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    retry: RetryPolicy,
}

impl GoogleCalendarClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: http_client(REQUEST_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.http = http_client(timeout);
        self
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, String> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| format!("{} cannot be a base url", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Looks a calendar up by its display name among the caller's calendars.
    pub async fn find_calendar_id(&self, name: &str) -> Result<String, CalendarError> {
        let url = self
            .url(&["users", "me", "calendarList"])
            .map_err(CalendarError::InvalidUrl)?;
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(url.clone()).bearer_auth(&self.access_token);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let resp = request.send().await?;
            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED {
                return Err(CalendarError::Unauthorized);
            }
            if !status.is_success() {
                return Err(CalendarError::Api {
                    status: status.as_u16(),
                    message: resp.text().await.unwrap_or_default(),
                });
            }

            let body: CalendarListResponse = resp.json().await?;
            if let Some(entry) = body.items.into_iter().find(|c| c.summary == name) {
                tracing::debug!(calendar = name, id = %entry.id, "calendar resolved");
                return Ok(entry.id);
            }
            match body.next_page_token {
                Some(next) => page_token = Some(next),
                None => return Err(CalendarError::NotFound(name.to_string())),
            }
        }
    }

    async fn insert_event(
        &self,
        event: &RotationEvent,
        calendar_id: &str,
    ) -> Result<EventHandle, PublishError> {
        let url = self
            .url(&["calendars", calendar_id, "events"])
            .map_err(PublishError::InvalidUrl)?;
        let event_id = uuid::Uuid::new_v4().simple().to_string();
        let body = EventBody {
            id: &event_id,
            summary: &event.title,
            start: EventDate {
                date: event.start_date.format("%Y-%m-%d").to_string(),
                time_zone: event.time_zone.clone(),
            },
            end: EventDate {
                date: event.end_date.format("%Y-%m-%d").to_string(),
                time_zone: event.time_zone.clone(),
            },
            recurrence: vec![event.recurrence.to_string()],
            color_id: color_id(event.color_tag),
        };

        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let sent = self
                .http
                .post(url.clone())
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await;

            let resp = match sent {
                Ok(resp) => resp,
                Err(err) if (err.is_timeout() || err.is_connect()) && attempt < attempts => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(attempt, attempts, error = %err, ?delay, "retrying event insert");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                Err(err) => return Err(PublishError::Http(err)),
            };

            let status = resp.status();
            if status.is_success() {
                let inserted: InsertedEvent = resp.json().await?;
                return Ok(EventHandle {
                    id: inserted.id,
                    html_link: inserted.html_link,
                });
            }
            // The id is ours, so a conflict after a retry means the earlier
            // attempt went through.
            if status == StatusCode::CONFLICT && attempt > 1 {
                return Ok(EventHandle {
                    id: event_id,
                    html_link: None,
                });
            }
            if status == StatusCode::UNAUTHORIZED {
                return Err(PublishError::Unauthorized);
            }
            if is_retryable(status) && attempt < attempts {
                let delay = self.retry.delay(attempt);
                tracing::warn!(attempt, attempts, %status, ?delay, "retrying event insert");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return Err(PublishError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
    }
}

#[async_trait]
impl CalendarSink for GoogleCalendarClient {
    async fn publish(
        &self,
        event: &RotationEvent,
        calendar_id: &str,
    ) -> Result<EventHandle, PublishError> {
        let handle = self.insert_event(event, calendar_id).await?;
        tracing::info!(
            member = %event.member,
            link = handle.html_link.as_deref().unwrap_or(""),
            "event created"
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_tags_wrap_onto_the_palette() {
        assert_eq!(color_id(1), "1");
        assert_eq!(color_id(11), "11");
        assert_eq!(color_id(12), "1");
        assert_eq!(color_id(23), "1");
    }

    #[test]
    fn calendar_ids_are_escaped_as_one_segment() {
        let client = GoogleCalendarClient::new("https://www.googleapis.com/calendar/v3/", "t");
        let url = client
            .url(&["calendars", "team/roles@group.calendar.google.com", "events"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team%2Froles@group.calendar.google.com/events"
        );
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(250));
        assert_eq!(policy.delay(2), Duration::from_millis(500));
        assert_eq!(policy.delay(5), Duration::from_millis(2_000));
    }
}
