//! Channel registry: creation, existence and per-channel statistics.

use crate::clipboard::ClipboardStore;
use crate::config::ConflictPolicy;
use crate::devices::DeviceDirectory;
use crate::error::{Entity, StorageError, SyncError, SyncResult};
use crate::ledger::SyncLedger;
use crate::model::{Channel, Creation};
use crate::storage::{corrupt, now_millis, Database};
use async_trait::async_trait;
use cliplink_types::{ChannelId, ContentType};
use serde::Serialize;
use std::collections::BTreeMap;

/// Channel registry.
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    /// Create a channel. `None` or an empty id generates a random one.
    async fn create(&self, id: Option<&str>) -> SyncResult<Creation>;

    /// Whether a channel with this id exists.
    ///
    /// Empty or malformed ids are simply absent.
    async fn exists(&self, id: &str) -> SyncResult<bool>;

    /// Fetch a channel.
    async fn get(&self, id: &ChannelId) -> SyncResult<Channel>;

    /// Number of channels.
    async fn count(&self) -> SyncResult<u64>;
}

/// SQLite-backed [`ChannelRegistry`].
#[derive(Clone)]
pub struct SqliteChannelRegistry {
    db: Database,
    on_conflict: ConflictPolicy,
}

impl SqliteChannelRegistry {
    /// Create a registry over `db`.
    pub fn new(db: Database, on_conflict: ConflictPolicy) -> Self {
        Self { db, on_conflict }
    }
}

#[async_trait]
impl ChannelRegistry for SqliteChannelRegistry {
    async fn create(&self, id: Option<&str>) -> SyncResult<Creation> {
        let id = match id.filter(|raw| !raw.is_empty()) {
            Some(raw) => ChannelId::parse(raw)?,
            None => ChannelId::random(),
        };
        let now = now_millis();

        let inserted = sqlx::query(
            r#"
            INSERT INTO channels (id, created_at)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id.as_str())
        .bind(now)
        .execute(self.db.pool())
        .await?
        .rows_affected();

        if inserted == 1 {
            tracing::info!(channel_id = %id, "channel created");
            return Ok(Creation::Created(Channel { id, created_at: now }));
        }

        match self.on_conflict {
            ConflictPolicy::ReturnExisting => Ok(Creation::Existing(self.get(&id).await?)),
            ConflictPolicy::Reject => Err(SyncError::AlreadyExists {
                channel_id: id.to_string(),
            }),
        }
    }

    async fn exists(&self, id: &str) -> SyncResult<bool> {
        let Ok(id) = ChannelId::parse(id) else {
            return Ok(false);
        };

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channels WHERE id = ?1")
            .bind(id.as_str())
            .fetch_one(self.db.pool())
            .await?;

        Ok(count > 0)
    }

    async fn get(&self, id: &ChannelId) -> SyncResult<Channel> {
        let row = sqlx::query_as::<_, ChannelRow>(
            "SELECT id, created_at FROM channels WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(row.try_into()?),
            None => Err(SyncError::not_found(Entity::Channel, id)),
        }
    }

    async fn count(&self) -> SyncResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channels")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count as u64)
    }
}

#[derive(sqlx::FromRow)]
struct ChannelRow {
    id: String,
    created_at: i64,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = StorageError;

    fn try_from(row: ChannelRow) -> Result<Self, Self::Error> {
        Ok(Channel {
            id: ChannelId::try_from(row.id).map_err(corrupt("channels"))?,
            created_at: row.created_at,
        })
    }
}

/// Read-only aggregate over one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    /// Channel the numbers belong to.
    pub channel_id: ChannelId,
    /// Items currently stored.
    pub item_count: u64,
    /// Item counts keyed by content type name; every type is present.
    pub items_by_type: BTreeMap<&'static str, u64>,
    /// Member devices whose global presence is online.
    pub online_device_count: u64,
    /// Member devices.
    pub total_device_count: u64,
    /// Ledger entries.
    pub sync_count: u64,
    /// Channel creation time (Unix ms).
    pub created_at: i64,
}

/// Gather [`ChannelStats`] for a channel.
///
/// Fails with `NotFound` before any other component is queried when the
/// channel does not exist.
pub async fn collect_stats(
    id: &ChannelId,
    registry: &dyn ChannelRegistry,
    clipboard: &dyn ClipboardStore,
    devices: &dyn DeviceDirectory,
    ledger: &dyn SyncLedger,
) -> SyncResult<ChannelStats> {
    let channel = registry.get(id).await?;

    let item_count = clipboard.count(id).await?;
    let mut items_by_type = BTreeMap::new();
    for content_type in ContentType::ALL {
        let count = clipboard.count_by_type(content_type, id).await?;
        items_by_type.insert(content_type.as_str(), count);
    }

    Ok(ChannelStats {
        channel_id: channel.id,
        item_count,
        items_by_type,
        online_device_count: devices.count_online(id).await?,
        total_device_count: devices.count_total(id).await?,
        sync_count: ledger.count(id).await?,
        created_at: channel.created_at,
    })
}
