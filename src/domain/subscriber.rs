use chrono::{DateTime, Utc};
use serde::Serialize;

/// A row of the `subscribers` table as exposed by the listing endpoints.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscriber {
    pub email: String,
    pub source: Option<String>,
    pub user_agent: Option<String>,
    pub job_id: Option<String>,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}
