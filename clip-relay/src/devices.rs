//! Device directory: registration, global presence and channel membership.

use crate::error::{Entity, StorageError, SyncError, SyncResult};
use crate::model::{Device, DeviceView, Membership};
use crate::storage::{corrupt, now_millis, Database};
use async_trait::async_trait;
use cliplink_types::{ChannelId, DeviceId, DeviceType};

/// Device directory.
///
/// Device presence (`is_online`) is global; membership presence
/// (`is_active`) is per channel. The two are updated independently.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Register a device, or refresh it if the id is already known.
    ///
    /// A missing id generates one. The device comes back online either way.
    async fn register(
        &self,
        name: &str,
        device_type: DeviceType,
        id: Option<&DeviceId>,
    ) -> SyncResult<Device>;

    /// Fetch a device.
    async fn get(&self, id: &DeviceId) -> SyncResult<Device>;

    /// Change a device's name and optionally its type.
    async fn rename(
        &self,
        id: &DeviceId,
        name: &str,
        device_type: Option<DeviceType>,
    ) -> SyncResult<Device>;

    /// Delete a device together with all of its memberships.
    async fn remove(&self, id: &DeviceId) -> SyncResult<()>;

    /// Join a channel, or reactivate an existing membership.
    async fn add_to_channel(&self, device: &DeviceId, channel: &ChannelId)
        -> SyncResult<Membership>;

    /// Leave a channel. The device itself is kept.
    async fn remove_from_channel(&self, device: &DeviceId, channel: &ChannelId) -> SyncResult<()>;

    /// Set global presence and refresh `last_seen_at`.
    async fn update_presence(&self, device: &DeviceId, is_online: bool) -> SyncResult<Device>;

    /// Set channel-local presence and refresh the membership's `last_seen_at`.
    async fn update_in_channel(
        &self,
        device: &DeviceId,
        channel: &ChannelId,
        is_active: bool,
    ) -> SyncResult<Membership>;

    /// Whether the device is a member of the channel.
    async fn is_in_channel(&self, device: &DeviceId, channel: &ChannelId) -> SyncResult<bool>;

    /// A member device as seen from one channel.
    async fn get_in_channel(&self, device: &DeviceId, channel: &ChannelId)
        -> SyncResult<DeviceView>;

    /// Members of a channel, most recently seen in the channel first.
    async fn list_by_channel(&self, channel: &ChannelId) -> SyncResult<Vec<DeviceView>>;

    /// Members whose global presence is online.
    async fn count_online(&self, channel: &ChannelId) -> SyncResult<u64>;

    /// All members.
    async fn count_total(&self, channel: &ChannelId) -> SyncResult<u64>;
}

/// SQLite-backed [`DeviceDirectory`].
#[derive(Clone)]
pub struct SqliteDeviceDirectory {
    db: Database,
}

impl SqliteDeviceDirectory {
    /// Create a directory over `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn membership_key(device: &DeviceId, channel: &ChannelId) -> String {
    format!("{device}@{channel}")
}

const VIEW_SELECT: &str = r#"
    SELECT d.id, d.name, d.device_type, dc.channel_id, d.is_online, dc.is_active,
           d.last_seen_at, dc.last_seen_at AS last_seen_in_channel, dc.joined_at, d.created_at
    FROM device_channels dc
    JOIN devices d ON d.id = dc.device_id
"#;

#[async_trait]
impl DeviceDirectory for SqliteDeviceDirectory {
    async fn register(
        &self,
        name: &str,
        device_type: DeviceType,
        id: Option<&DeviceId>,
    ) -> SyncResult<Device> {
        let id = id.cloned().unwrap_or_else(DeviceId::generate);
        let now = now_millis();

        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            INSERT INTO devices (id, name, device_type, last_seen_at, is_online, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?4, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                device_type = excluded.device_type,
                last_seen_at = excluded.last_seen_at,
                is_online = 1,
                updated_at = excluded.updated_at
            RETURNING id, name, device_type, last_seen_at, is_online, created_at, updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(name)
        .bind(device_type.as_str())
        .bind(now)
        .fetch_one(self.db.pool())
        .await?;

        tracing::debug!(device_id = %id, "device registered");
        Ok(row.try_into()?)
    }

    async fn get(&self, id: &DeviceId) -> SyncResult<Device> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT id, name, device_type, last_seen_at, is_online, created_at, updated_at
            FROM devices
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(row.try_into()?),
            None => Err(SyncError::not_found(Entity::Device, id)),
        }
    }

    async fn rename(
        &self,
        id: &DeviceId,
        name: &str,
        device_type: Option<DeviceType>,
    ) -> SyncResult<Device> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            UPDATE devices
            SET name = ?2,
                device_type = COALESCE(?3, device_type),
                updated_at = ?4
            WHERE id = ?1
            RETURNING id, name, device_type, last_seen_at, is_online, created_at, updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(name)
        .bind(device_type.map(|t| t.as_str()))
        .bind(now_millis())
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(row.try_into()?),
            None => Err(SyncError::not_found(Entity::Device, id)),
        }
    }

    async fn remove(&self, id: &DeviceId) -> SyncResult<()> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM device_channels WHERE device_id = ?1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM devices WHERE id = ?1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(SyncError::not_found(Entity::Device, id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn add_to_channel(
        &self,
        device: &DeviceId,
        channel: &ChannelId,
    ) -> SyncResult<Membership> {
        self.get(device).await?;

        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            INSERT INTO device_channels (device_id, channel_id, is_active, joined_at, last_seen_at)
            VALUES (?1, ?2, 1, ?3, ?3)
            ON CONFLICT(device_id, channel_id) DO UPDATE SET
                is_active = 1,
                last_seen_at = excluded.last_seen_at
            RETURNING device_id, channel_id, is_active, joined_at, last_seen_at
            "#,
        )
        .bind(device.as_str())
        .bind(channel.as_str())
        .bind(now_millis())
        .fetch_one(self.db.pool())
        .await?;

        Ok(row.try_into()?)
    }

    async fn remove_from_channel(&self, device: &DeviceId, channel: &ChannelId) -> SyncResult<()> {
        let deleted =
            sqlx::query("DELETE FROM device_channels WHERE device_id = ?1 AND channel_id = ?2")
                .bind(device.as_str())
                .bind(channel.as_str())
                .execute(self.db.pool())
                .await?
                .rows_affected();

        if deleted == 0 {
            return Err(SyncError::not_found(
                Entity::Membership,
                membership_key(device, channel),
            ));
        }
        Ok(())
    }

    async fn update_presence(&self, device: &DeviceId, is_online: bool) -> SyncResult<Device> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            UPDATE devices
            SET is_online = ?2, last_seen_at = ?3, updated_at = ?3
            WHERE id = ?1
            RETURNING id, name, device_type, last_seen_at, is_online, created_at, updated_at
            "#,
        )
        .bind(device.as_str())
        .bind(is_online)
        .bind(now_millis())
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(row.try_into()?),
            None => Err(SyncError::not_found(Entity::Device, device)),
        }
    }

    async fn update_in_channel(
        &self,
        device: &DeviceId,
        channel: &ChannelId,
        is_active: bool,
    ) -> SyncResult<Membership> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            UPDATE device_channels
            SET is_active = ?3, last_seen_at = ?4
            WHERE device_id = ?1 AND channel_id = ?2
            RETURNING device_id, channel_id, is_active, joined_at, last_seen_at
            "#,
        )
        .bind(device.as_str())
        .bind(channel.as_str())
        .bind(is_active)
        .bind(now_millis())
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(row.try_into()?),
            None => Err(SyncError::not_found(
                Entity::Membership,
                membership_key(device, channel),
            )),
        }
    }

    async fn is_in_channel(&self, device: &DeviceId, channel: &ChannelId) -> SyncResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM device_channels WHERE device_id = ?1 AND channel_id = ?2",
        )
        .bind(device.as_str())
        .bind(channel.as_str())
        .fetch_one(self.db.pool())
        .await?;

        Ok(count > 0)
    }

    async fn get_in_channel(
        &self,
        device: &DeviceId,
        channel: &ChannelId,
    ) -> SyncResult<DeviceView> {
        let sql = format!("{VIEW_SELECT} WHERE dc.device_id = ?1 AND dc.channel_id = ?2");
        let row = sqlx::query_as::<_, DeviceViewRow>(&sql)
            .bind(device.as_str())
            .bind(channel.as_str())
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(row) => Ok(row.try_into()?),
            None => Err(SyncError::not_found(
                Entity::Membership,
                membership_key(device, channel),
            )),
        }
    }

    async fn list_by_channel(&self, channel: &ChannelId) -> SyncResult<Vec<DeviceView>> {
        let sql = format!(
            "{VIEW_SELECT} WHERE dc.channel_id = ?1 ORDER BY dc.last_seen_at DESC, dc.rowid DESC"
        );
        let rows = sqlx::query_as::<_, DeviceViewRow>(&sql)
            .bind(channel.as_str())
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter()
            .map(|row| row.try_into().map_err(SyncError::from))
            .collect()
    }

    async fn count_online(&self, channel: &ChannelId) -> SyncResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM device_channels dc
            JOIN devices d ON d.id = dc.device_id
            WHERE dc.channel_id = ?1 AND d.is_online = 1
            "#,
        )
        .bind(channel.as_str())
        .fetch_one(self.db.pool())
        .await?;

        Ok(count as u64)
    }

    async fn count_total(&self, channel: &ChannelId) -> SyncResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM device_channels WHERE channel_id = ?1")
            .bind(channel.as_str())
            .fetch_one(self.db.pool())
            .await?;

        Ok(count as u64)
    }
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    id: String,
    name: String,
    device_type: String,
    last_seen_at: i64,
    is_online: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<DeviceRow> for Device {
    type Error = StorageError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        Ok(Device {
            id: DeviceId::try_from(row.id).map_err(corrupt("devices"))?,
            name: row.name,
            device_type: row.device_type.parse().map_err(corrupt("devices"))?,
            last_seen_at: row.last_seen_at,
            is_online: row.is_online,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    device_id: String,
    channel_id: String,
    is_active: bool,
    joined_at: i64,
    last_seen_at: i64,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = StorageError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(Membership {
            device_id: DeviceId::try_from(row.device_id).map_err(corrupt("device_channels"))?,
            channel_id: ChannelId::try_from(row.channel_id).map_err(corrupt("device_channels"))?,
            is_active: row.is_active,
            joined_at: row.joined_at,
            last_seen_at: row.last_seen_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DeviceViewRow {
    id: String,
    name: String,
    device_type: String,
    channel_id: String,
    is_online: bool,
    is_active: bool,
    last_seen_at: i64,
    last_seen_in_channel: i64,
    joined_at: i64,
    created_at: i64,
}

impl TryFrom<DeviceViewRow> for DeviceView {
    type Error = StorageError;

    fn try_from(row: DeviceViewRow) -> Result<Self, Self::Error> {
        Ok(DeviceView {
            id: DeviceId::try_from(row.id).map_err(corrupt("devices"))?,
            name: row.name,
            device_type: row.device_type.parse().map_err(corrupt("devices"))?,
            channel_id: ChannelId::try_from(row.channel_id).map_err(corrupt("device_channels"))?,
            is_online: row.is_online,
            is_active: row.is_active,
            last_seen_at: row.last_seen_at,
            last_seen_in_channel: row.last_seen_in_channel,
            joined_at: row.joined_at,
            created_at: row.created_at,
        })
    }
}
