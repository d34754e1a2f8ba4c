//! Rumble Live Stream API source.
//!
//! The API is a single authenticated JSON document holding the most recent
//! followers, subscribers and livestreams (with their recent rants). One
//! response is cached for [`RumbleSourceConfig::cache_ttl`] so that the four
//! queries of a poll tick cost a single request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use super::{Cursor, EventSource, SessionHandle, SourceResult};
use crate::error::{Error, Result, SourceError};
use crate::event::Event;

/// Configuration for [`RumbleApiSource`].
#[derive(Debug, Clone)]
pub struct RumbleSourceConfig {
    /// How long one API response is reused.
    pub cache_ttl: Duration,
    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl Default for RumbleSourceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_millis(9_500),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RumbleSourceConfig {
    /// Cache responses for just under the given poll interval.
    pub fn for_refresh_interval(refresh: Duration) -> Self {
        Self {
            cache_ttl: refresh.saturating_sub(Duration::from_millis(500)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    followers: Followers,
    #[serde(default)]
    subscribers: Subscribers,
    #[serde(default)]
    livestreams: Vec<Livestream>,
}

#[derive(Debug, Default, Deserialize)]
struct Followers {
    #[serde(default)]
    recent_followers: Vec<FollowerRecord>,
}

#[derive(Debug, Deserialize)]
struct FollowerRecord {
    username: String,
    followed_on: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct Subscribers {
    #[serde(default)]
    recent_subscribers: Vec<SubscriberRecord>,
}

#[derive(Debug, Deserialize)]
struct SubscriberRecord {
    username: String,
    amount_cents: u64,
    subscribed_on: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Livestream {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    chat: Chat,
}

#[derive(Debug, Default, Deserialize)]
struct Chat {
    #[serde(default)]
    recent_rants: Vec<RantRecord>,
}

#[derive(Debug, Deserialize)]
struct RantRecord {
    username: String,
    text: String,
    amount_cents: u64,
    created_on: DateTime<Utc>,
}

fn parse_response(body: &str) -> SourceResult<ApiResponse> {
    serde_json::from_str(body)
        .map_err(|e| SourceError::connectivity(format!("malformed API response: {e}")))
}

/// The API URL being polled, and its host for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    url: String,
    host: String,
}

impl Endpoint {
    fn parse(api_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(api_url.trim())
            .map_err(|e| Error::config(format!("invalid API URL: {e}")))?;
        Ok(Self {
            host: parsed.host_str().unwrap_or_default().to_string(),
            url: parsed.to_string(),
        })
    }
}

/// [`EventSource`] backed by the Rumble Live Stream API.
pub struct RumbleApiSource {
    client: Client,
    endpoint: Mutex<Endpoint>,
    cache_ttl: Mutex<Duration>,
    cache: Mutex<Option<(Instant, Arc<ApiResponse>)>>,
}

impl RumbleApiSource {
    /// Create a source for an API URL (including its key).
    pub fn new(api_url: &str, config: RumbleSourceConfig) -> Result<Self> {
        let endpoint = Endpoint::parse(api_url)?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("live-alerts/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: Mutex::new(endpoint),
            cache_ttl: Mutex::new(config.cache_ttl),
            cache: Mutex::new(None),
        })
    }

    /// Whether this source talks to `api_url`.
    pub fn is_for_url(&self, api_url: &str) -> bool {
        url::Url::parse(api_url.trim()).is_ok_and(|u| u.as_str() == self.endpoint.lock().url)
    }

    async fn fetch(&self) -> SourceResult<Arc<ApiResponse>> {
        let ttl = *self.cache_ttl.lock();
        let endpoint = self.endpoint.lock().clone();
        let cached = self
            .cache
            .lock()
            .as_ref()
            .filter(|(fetched_at, _)| fetched_at.elapsed() < ttl)
            .map(|(_, response)| response.clone());
        if let Some(response) = cached {
            trace!(host = %endpoint.host, "Using cached API response");
            return Ok(response);
        }

        debug!(host = %endpoint.host, "Requesting Live Stream API");
        let response = self
            .client
            .get(&endpoint.url)
            .send()
            .await
            .map_err(|e| SourceError::connectivity(e.without_url().to_string()))?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(SourceError::auth(format!("API key rejected ({status})")));
        }
        if !status.is_success() {
            return Err(SourceError::connectivity(format!("API returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::connectivity(e.without_url().to_string()))?;
        let parsed = Arc::new(parse_response(&body)?);

        // A response for a URL replaced mid-request is not cached.
        if *self.endpoint.lock() == endpoint {
            *self.cache.lock() = Some((Instant::now(), parsed.clone()));
        }
        Ok(parsed)
    }

    #[cfg(test)]
    fn with_cached_body(body: &str) -> Self {
        let source = Self::new(
            "https://rumble.com/-livestream-api/get-data?key=test",
            RumbleSourceConfig {
                cache_ttl: Duration::from_secs(3600),
                ..Default::default()
            },
        )
        .unwrap();
        *source.cache.lock() = Some((Instant::now(), Arc::new(parse_response(body).unwrap())));
        source
    }
}

#[async_trait]
impl EventSource for RumbleApiSource {
    fn name(&self) -> &str {
        "rumble"
    }

    fn min_poll_interval(&self) -> Duration {
        *self.cache_ttl.lock()
    }

    fn apply_settings(&self, api_url: &str, refresh: Duration) -> Result<()> {
        if !self.is_for_url(api_url) {
            let endpoint = Endpoint::parse(api_url)?;
            info!(host = %endpoint.host, "Live Stream API URL changed");
            *self.endpoint.lock() = endpoint;
            *self.cache.lock() = None;
        }
        *self.cache_ttl.lock() = RumbleSourceConfig::for_refresh_interval(refresh).cache_ttl;
        Ok(())
    }

    async fn new_followers_since(&self, cursor: &mut Cursor) -> SourceResult<Vec<Event>> {
        let response = self.fetch().await?;
        Ok(cursor.take_new(
            response
                .followers
                .recent_followers
                .iter()
                .map(|f| (f.followed_on, Event::follower(&f.username))),
        ))
    }

    async fn new_subscribers_since(&self, cursor: &mut Cursor) -> SourceResult<Vec<Event>> {
        let response = self.fetch().await?;
        Ok(cursor.take_new(
            response
                .subscribers
                .recent_subscribers
                .iter()
                .map(|s| (s.subscribed_on, Event::subscriber(&s.username, s.amount_cents))),
        ))
    }

    async fn current_session(&self) -> SourceResult<Option<SessionHandle>> {
        let response = self.fetch().await?;
        Ok(response.livestreams.first().map(|l| SessionHandle {
            id: l.id.clone(),
            title: l.title.clone(),
        }))
    }

    async fn new_rants_since(
        &self,
        session: &SessionHandle,
        cursor: &mut Cursor,
    ) -> SourceResult<Vec<Event>> {
        let response = self.fetch().await?;
        let livestream = response
            .livestreams
            .iter()
            .find(|l| l.id == session.id)
            .ok_or_else(|| SourceError::SessionEnded(session.id.clone()))?;

        Ok(cursor.take_new(livestream.chat.recent_rants.iter().map(|r| {
            (
                r.created_on,
                Event::rant(&r.username, &r.text, r.amount_cents),
            )
        })))
    }
}
