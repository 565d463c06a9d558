use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::{debug, info};

use crate::{
    config::Config,
    models::candidate::{NotificationKind, SourceTable},
    pipeline::CursorStore,
};

/// Durable scan cursors, one redis key per (source, kind) pair. A missing key
/// reads as 0 so a fresh deployment scans the registry from the beginning.
pub struct RedisCursorStore {
    connection: MultiplexedConnection,
}

impl RedisCursorStore {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to Redis");

        let client = Client::open(config.redis_url.as_str())
            .map_err(|_| anyhow!("Failed to create redis client"))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|_| anyhow!("Failed to connect to redis client"))?;

        info!("Redis connection established");

        Ok(Self { connection })
    }

    fn key(source: SourceTable, kind: NotificationKind) -> String {
        format!("notify:cursor:{}:{}", source.as_str(), kind.as_str())
    }
}

#[async_trait]
impl CursorStore for RedisCursorStore {
    async fn last_event_id(
        &self,
        source: SourceTable,
        kind: NotificationKind,
    ) -> Result<i64, Error> {
        let key = Self::key(source, kind);
        let mut conn = self.connection.clone();

        let value: Option<i64> = conn
            .get(&key)
            .await
            .map_err(|e| anyhow!("Failed to read cursor {}: {}", key, e))?;

        Ok(value.unwrap_or(0))
    }

    async fn advance(
        &self,
        source: SourceTable,
        kind: NotificationKind,
        event_id: i64,
    ) -> Result<(), Error> {
        let key = Self::key(source, kind);
        let mut conn = self.connection.clone();

        conn.set::<_, _, ()>(&key, event_id)
            .await
            .map_err(|e| anyhow!("Failed to advance cursor {}: {}", key, e))?;

        debug!(key, event_id, "Cursor advanced");

        Ok(())
    }
}
