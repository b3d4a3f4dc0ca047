use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::configuration::DatabaseConfig;
use crate::domain::{NewSubscriber, Subscriber};

#[derive(thiserror::Error, Debug)]
#[error("{context}")]
pub struct StoreError {
    context: &'static str,
    #[source]
    source: sqlx::Error,
}

trait Context<T> {
    fn context(self, context: &'static str) -> Result<T, StoreError>;
}

impl<T> Context<T> for Result<T, sqlx::Error> {
    fn context(self, context: &'static str) -> Result<T, StoreError> {
        self.map_err(|source| StoreError { context, source })
    }
}

/// Builds the pool lazily so the process starts even while Postgres is down.
pub fn get_connection_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    Ok(PgPoolOptions::new()
        .min_connections(config.pool_size)
        .max_connections(config.pool_size + config.max_overflow)
        .test_before_acquire(true)
        .max_lifetime(config.recycle_after())
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy_with(config.with_db()?))
}

/// Access to the `subscribers` table. Every call runs in its own transaction,
/// which is rolled back when dropped on an error path.
#[derive(Clone)]
pub struct SubscriberStore {
    pool: PgPool,
}

impl SubscriberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(name = "Saving subscriber details in the database", skip_all)]
    pub async fn upsert(&self, subscriber: &NewSubscriber, job_id: &str) -> Result<(), StoreError> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("failed to acquire a connection to the subscriber store")?;
        sqlx::query(
            r#"
            INSERT INTO subscribers (email, source, user_agent, job_id, subscribed_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email_norm) DO UPDATE SET
                source = COALESCE(EXCLUDED.source, subscribers.source),
                user_agent = COALESCE(EXCLUDED.user_agent, subscribers.user_agent),
                job_id = COALESCE(EXCLUDED.job_id, subscribers.job_id)
            "#,
        )
        .bind(subscriber.email.as_ref())
        .bind(subscriber.source.as_str())
        .bind(subscriber.user_agent.as_deref())
        .bind(job_id)
        .bind(subscriber.subscribed_at)
        .execute(&mut *transaction)
        .await
        .context("failed to save the subscriber")?;
        transaction
            .commit()
            .await
            .context("failed to commit the subscriber")
    }

    /// One page ordered by `subscribed_at` descending, plus the table's row count.
    #[tracing::instrument(name = "Fetching a page of subscribers", skip(self))]
    pub async fn page(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Subscriber>, i64), StoreError> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("failed to acquire a connection to the subscriber store")?;
        let rows = sqlx::query_as::<_, Subscriber>(
            r#"
            SELECT email, source, user_agent, job_id, subscribed_at, unsubscribed_at
            FROM subscribers
            ORDER BY subscribed_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *transaction)
        .await
        .context("failed to fetch subscribers")?;
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subscribers")
            .fetch_one(&mut *transaction)
            .await
            .context("failed to count subscribers")?;
        transaction
            .commit()
            .await
            .context("failed to close the read transaction")?;
        Ok((rows, total))
    }

    #[tracing::instrument(name = "Fetching every subscriber", skip(self))]
    pub async fn all(&self) -> Result<Vec<Subscriber>, StoreError> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .context("failed to acquire a connection to the subscriber store")?;
        let rows = sqlx::query_as::<_, Subscriber>(
            r#"
            SELECT email, source, user_agent, job_id, subscribed_at, unsubscribed_at
            FROM subscribers
            ORDER BY subscribed_at DESC
            "#,
        )
        .fetch_all(&mut *transaction)
        .await
        .context("failed to fetch subscribers")?;
        transaction
            .commit()
            .await
            .context("failed to close the read transaction")?;
        Ok(rows)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
