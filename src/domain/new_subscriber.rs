use actix_web::http::header::{self, HeaderMap};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::SubscriberEmail;

/// Body of `POST /subscribe`.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    pub source: Option<String>,
    pub subscribed_at: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
}

/// A validated subscribe request with every default filled in.
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub email: SubscriberEmail,
    pub source: String,
    pub user_agent: Option<String>,
    pub subscribed_at: DateTime<Utc>,
}

impl NewSubscriber {
    /// Missing `source` falls back to the `Origin` header (or an empty string),
    /// missing `user_agent` to the `User-Agent` header, missing `subscribed_at` to `now`.
    pub fn from_request(
        request: SubscribeRequest,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<Self, String> {
        let email = SubscriberEmail::parse(request.email)?;
        let source = request
            .source
            .filter(|source| !source.is_empty())
            .unwrap_or_else(|| header_value(headers, &header::ORIGIN).unwrap_or_default());
        let user_agent = request
            .user_agent
            .or_else(|| header_value(headers, &header::USER_AGENT));
        Ok(Self {
            email,
            source,
            user_agent,
            subscribed_at: request.subscribed_at.unwrap_or(now),
        })
    }
}

fn header_value(headers: &HeaderMap, name: &header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}
