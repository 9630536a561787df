use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use sqlx::postgres::{PgListener, PgPool};

use super::{ChangeEvent, ChangeFeed, ChangeFilter};
use crate::error::BackendError;

// ============================================================================
// Postgres Change Feed
// ============================================================================
//
// Row triggers (migrations/0001_pos_schema.sql) publish every change on the
// `pos_changes` channel as JSON:
//
//   {"table": "orders", "type": "UPDATE", "restaurant_id": 3, "record": {...}}
//
// Each subscription opens its own listener connection. PgListener reconnects
// on its own; notifications sent while it was down are lost, which is fine
// because every change triggers a full refetch anyway.
//
// ============================================================================

pub const CHANNEL: &str = "pos_changes";

const SCHEMA: &str = include_str!("../../migrations/0001_pos_schema.sql");

pub struct PgChangeFeed {
    database_url: String,
}

impl PgChangeFeed {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Create the tables and notify triggers if they are missing
    pub async fn install_schema(&self) -> Result<(), BackendError> {
        let pool = PgPool::connect(&self.database_url).await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        pool.close().await;

        tracing::info!(channel = CHANNEL, "Change-feed schema installed");
        Ok(())
    }
}

/// Decode one notification payload; foreign or malformed payloads yield None
pub fn parse_notification(payload: &str, filter: &ChangeFilter) -> Option<ChangeEvent> {
    match serde_json::from_str::<ChangeEvent>(payload) {
        Ok(event) if filter.matches(&event) => Some(event),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unrecognised change notification");
            None
        }
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<BoxStream<'static, ChangeEvent>, BackendError> {
        let mut listener = PgListener::connect(&self.database_url).await?;
        listener.listen(CHANNEL).await?;

        tracing::info!(
            table = filter.table.as_str(),
            restaurant_id = filter.restaurant_id,
            kind = filter.kind.as_str(),
            "Subscribed to change feed"
        );

        let stream = listener.into_stream().filter_map(move |notification| {
            let event = match notification {
                Ok(notification) => parse_notification(notification.payload(), &filter),
                Err(e) => {
                    tracing::warn!(error = %e, "Change feed connection error");
                    None
                }
            };
            async move { event }
        });

        Ok(stream.boxed())
    }
}
