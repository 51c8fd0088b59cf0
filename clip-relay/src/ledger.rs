//! Append-only sync ledger.

use crate::error::{StorageError, SyncError, SyncResult};
use crate::model::SyncEntry;
use crate::storage::{corrupt, now_millis, Database};
use async_trait::async_trait;
use cliplink_types::{ChannelId, DeviceId, EntryId, SyncAction};

/// Audit trail of synchronization-relevant actions, per channel.
#[async_trait]
pub trait SyncLedger: Send + Sync {
    /// Record an action. The action label is not validated.
    async fn append(
        &self,
        device: &DeviceId,
        channel: &ChannelId,
        action: SyncAction,
        content: &str,
    ) -> SyncResult<SyncEntry>;

    /// Entries of `channel`, newest first. The caller bounds `limit`; 0 is
    /// read as 1.
    async fn list_by_channel(
        &self,
        channel: &ChannelId,
        limit: u32,
        offset: u64,
    ) -> SyncResult<Vec<SyncEntry>>;

    /// Entries of `channel`.
    async fn count(&self, channel: &ChannelId) -> SyncResult<u64>;
}

/// SQLite-backed [`SyncLedger`].
#[derive(Clone)]
pub struct SqliteSyncLedger {
    db: Database,
}

impl SqliteSyncLedger {
    /// Create a ledger over `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncLedger for SqliteSyncLedger {
    async fn append(
        &self,
        device: &DeviceId,
        channel: &ChannelId,
        action: SyncAction,
        content: &str,
    ) -> SyncResult<SyncEntry> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO sync_history (channel_id, device_id, action, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, channel_id, device_id, action, content, created_at
            "#,
        )
        .bind(channel.as_str())
        .bind(device.as_str())
        .bind(action.as_str())
        .bind(content)
        .bind(now_millis())
        .fetch_one(self.db.pool())
        .await?;

        Ok(row.try_into()?)
    }

    async fn list_by_channel(
        &self,
        channel: &ChannelId,
        limit: u32,
        offset: u64,
    ) -> SyncResult<Vec<SyncEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT id, channel_id, device_id, action, content, created_at
            FROM sync_history
            WHERE channel_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(channel.as_str())
        .bind(limit.max(1) as i64)
        .bind(offset.min(i64::MAX as u64) as i64)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|row| row.try_into().map_err(SyncError::from))
            .collect()
    }

    async fn count(&self, channel: &ChannelId) -> SyncResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_history WHERE channel_id = ?1")
            .bind(channel.as_str())
            .fetch_one(self.db.pool())
            .await?;
        Ok(count as u64)
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: i64,
    channel_id: String,
    device_id: String,
    action: String,
    content: String,
    created_at: i64,
}

impl TryFrom<EntryRow> for SyncEntry {
    type Error = StorageError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(SyncEntry {
            id: EntryId::new(row.id as u64),
            channel_id: ChannelId::try_from(row.channel_id).map_err(corrupt("sync_history"))?,
            device_id: DeviceId::try_from(row.device_id).map_err(corrupt("sync_history"))?,
            action: SyncAction::from(row.action),
            content: row.content,
            created_at: row.created_at,
        })
    }
}
