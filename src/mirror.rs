//! Best-effort copy of subscribe events into object storage.
//!
//! Each deployment appends newline-delimited JSON to a single object. The
//! append is a read-modify-write of the whole object and is only fit for low
//! volume with a single writer.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::domain::NewSubscriber;

const NDJSON: &str = "application/x-ndjson";
/// Tokens are refreshed this long before the metadata server says they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(thiserror::Error, Debug)]
pub enum MirrorError {
    #[error("failed to serialize the mirror event")]
    Serialize(#[from] serde_json::Error),
    #[error("object store request failed")]
    Request(#[from] reqwest::Error),
    #[error("object store answered {status} while trying to {operation}")]
    UnexpectedStatus {
        status: StatusCode,
        operation: &'static str,
    },
    #[error("{0} cannot be used as an object store base url")]
    InvalidBaseUrl(String),
}

/// Whole-object reads and writes, the only primitives the mirror needs.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MirrorError>;

    async fn write(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), MirrorError>;
}

/// One line of the mirror log.
#[derive(Debug, Serialize)]
pub struct SubscriptionEvent<'a> {
    pub email: &'a str,
    pub source: &'a str,
    pub subscribed_at: DateTime<Utc>,
    pub user_agent: Option<&'a str>,
    pub job_id: &'a str,
}

impl<'a> SubscriptionEvent<'a> {
    pub fn new(subscriber: &'a NewSubscriber, job_id: &'a str) -> Self {
        Self {
            email: subscriber.email.as_ref(),
            source: &subscriber.source,
            subscribed_at: subscriber.subscribed_at,
            user_agent: subscriber.user_agent.as_deref(),
            job_id,
        }
    }
}

#[derive(Clone)]
pub struct Mirror {
    store: Arc<dyn ObjectStore>,
    object_key: String,
}

impl Mirror {
    pub fn new(store: Arc<dyn ObjectStore>, job_id: &str) -> Self {
        Self {
            store,
            object_key: format!("subscribers/{}/emails.jsonl", job_id),
        }
    }

    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    // Concurrent appends can lose lines: there is no lock around the read and the write.
    #[tracing::instrument(
        name = "Mirroring subscribe event",
        skip_all,
        fields(object = %self.object_key)
    )]
    pub async fn append(&self, event: &SubscriptionEvent<'_>) -> Result<(), MirrorError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut contents = self.store.read(&self.object_key).await?.unwrap_or_default();
        contents.extend_from_slice(&line);
        self.store.write(&self.object_key, contents, NDJSON).await
    }
}

/// Google Cloud Storage through its JSON API.
pub struct GcsObjectStore {
    http_client: reqwest::Client,
    base_url: Url,
    bucket: String,
    token_url: Option<String>,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

impl GcsObjectStore {
    pub fn new(
        base_url: &str,
        bucket: String,
        token_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MirrorError> {
        let base_url =
            Url::parse(base_url).map_err(|_| MirrorError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(MirrorError::InvalidBaseUrl(base_url.to_string()));
        }
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            bucket,
            token_url,
            token: Mutex::new(None),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, MirrorError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MirrorError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, MirrorError> {
        let Some(token_url) = &self.token_url else {
            return Ok(request);
        };
        let token = match self.cached_token() {
            Some(token) => token,
            None => self.fetch_token(token_url).await?,
        };
        Ok(request.bearer_auth(token))
    }

    fn cached_token(&self) -> Option<String> {
        let cached = self.token.lock().ok()?;
        cached
            .as_ref()
            .filter(|token| token.refresh_at > Instant::now())
            .map(|token| token.value.clone())
    }

    async fn fetch_token(&self, token_url: &str) -> Result<String, MirrorError> {
        let token = self
            .http_client
            .get(token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json::<AccessToken>()
            .await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        if let Ok(mut cached) = self.token.lock() {
            *cached = Some(CachedToken {
                value: token.access_token.clone(),
                refresh_at: Instant::now() + lifetime,
            });
        }
        Ok(token.access_token)
    }
}

#[async_trait::async_trait]
impl ObjectStore for GcsObjectStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MirrorError> {
        let mut url = self.url(&["storage", "v1", "b", self.bucket.as_str(), "o", key])?;
        url.query_pairs_mut().append_pair("alt", "media");
        let response = self.authorize(self.http_client.get(url)).await?.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            status => Err(MirrorError::UnexpectedStatus {
                status,
                operation: "read the mirror object",
            }),
        }
    }

    async fn write(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), MirrorError> {
        let mut url = self.url(&["upload", "storage", "v1", "b", self.bucket.as_str(), "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        let request = self
            .http_client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        let response = self.authorize(request).await?.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::UnexpectedStatus {
                status,
                operation: "write the mirror object",
            });
        }
        Ok(())
    }
}
