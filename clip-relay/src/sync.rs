//! Synchronization façade.
//!
//! [`ClipSync`] composes the channel registry, device directory, clipboard
//! store and sync ledger. It is the only entry point used by the HTTP layer.

use crate::channels::{collect_stats, ChannelRegistry, ChannelStats, SqliteChannelRegistry};
use crate::clipboard::{ClipboardStore, ItemFilter, ItemOrder, SqliteClipboardStore};
use crate::config::Config;
use crate::devices::{DeviceDirectory, SqliteDeviceDirectory};
use crate::error::{SyncError, SyncResult};
use crate::ledger::{SqliteSyncLedger, SyncLedger};
use crate::model::{
    Channel, ClipboardItem, Creation, Device, DeviceView, ItemPatch, NewItem, Page, PageRequest,
    SyncEntry,
};
use crate::storage::Database;
use cliplink_types::{ChannelId, ContentType, DeviceId, DeviceType, ItemId, SyncAction};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Content of the item seeded into new channels when enabled.
pub const WELCOME_CONTENT: &str =
    "Welcome to your shared clipboard! Copy something on one of your devices to get started.";

/// Device id recorded on system-generated items.
pub const SYSTEM_DEVICE: &str = "system";

/// Operational counters.
///
/// Monotonically increasing, reset only on restart.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Channels created.
    pub channels_created: AtomicU64,
    /// Device joins (including rejoins).
    pub devices_joined: AtomicU64,
    /// Clipboard items saved.
    pub items_saved: AtomicU64,
    /// Clipboard items updated.
    pub items_updated: AtomicU64,
    /// Clipboard items deleted.
    pub items_deleted: AtomicU64,
    /// Favorite flag changes.
    pub favorites_toggled: AtomicU64,
    /// Ledger appends that failed and were dropped.
    pub ledger_failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// The four components [`ClipSync`] is built from.
#[derive(Clone)]
pub struct Components {
    /// Channel registry.
    pub channels: Arc<dyn ChannelRegistry>,
    /// Device directory.
    pub devices: Arc<dyn DeviceDirectory>,
    /// Clipboard store.
    pub clipboard: Arc<dyn ClipboardStore>,
    /// Sync ledger.
    pub ledger: Arc<dyn SyncLedger>,
}

impl Components {
    /// SQLite implementations sharing one database handle.
    pub fn sqlite(db: &Database, config: &Config) -> Self {
        Self {
            channels: Arc::new(SqliteChannelRegistry::new(
                db.clone(),
                config.channels.on_conflict,
            )),
            devices: Arc::new(SqliteDeviceDirectory::new(db.clone())),
            clipboard: Arc::new(SqliteClipboardStore::new(db.clone())),
            ledger: Arc::new(SqliteSyncLedger::new(db.clone())),
        }
    }
}

/// An item as submitted by a device, before validation.
///
/// Unknown `type` and `device_type` values are coerced rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDraft {
    /// Optional title.
    #[serde(default)]
    pub title: Option<String>,
    /// Payload.
    pub content: String,
    /// Content type name.
    #[serde(default, rename = "type")]
    pub content_type: String,
    /// Submitting device.
    pub device_id: String,
    /// Device type name.
    #[serde(default)]
    pub device_type: String,
}

/// Multi-tenant clipboard synchronization core.
pub struct ClipSync {
    config: Config,
    channels: Arc<dyn ChannelRegistry>,
    devices: Arc<dyn DeviceDirectory>,
    clipboard: Arc<dyn ClipboardStore>,
    ledger: Arc<dyn SyncLedger>,
    metrics: SyncMetrics,
}

impl std::fmt::Debug for ClipSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipSync")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl ClipSync {
    /// Build from explicit components.
    pub fn new(config: Config, components: Components) -> Self {
        Self {
            config,
            channels: components.channels,
            devices: components.devices,
            clipboard: components.clipboard,
            ledger: components.ledger,
            metrics: SyncMetrics::default(),
        }
    }

    /// Build with SQLite components over `db`.
    pub fn from_database(config: Config, db: &Database) -> Self {
        let components = Components::sqlite(db, &config);
        Self::new(config, components)
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Operational counters.
    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    fn page(&self, page: u32, size: u32) -> PageRequest {
        let limits = &self.config.pagination;
        PageRequest::with_limits(page, size, limits.default_size, limits.max_size)
    }

    fn limit(&self, limit: u32) -> u32 {
        let limits = &self.config.pagination;
        let limit = if limit == 0 { limits.default_size } else { limit };
        limit.clamp(1, limits.max_size.max(1))
    }

    async fn require_channel(&self, channel: &ChannelId) -> SyncResult<Channel> {
        self.channels.get(channel).await
    }

    /// Append to the ledger, logging and counting failures instead of
    /// returning them.
    async fn record(&self, device: &DeviceId, channel: &ChannelId, action: SyncAction, content: &str) {
        if let Err(err) = self.ledger.append(device, channel, action.clone(), content).await {
            bump(&self.metrics.ledger_failures);
            tracing::warn!(
                channel_id = %channel,
                device_id = %device,
                action = %action,
                error = %err,
                "ledger append failed"
            );
        }
    }

    // ---- channels ----

    /// Create a channel, seeding a welcome item when configured.
    pub async fn create_channel(&self, id: Option<&str>) -> SyncResult<Creation> {
        let creation = self.channels.create(id).await?;

        if let Creation::Created(channel) = &creation {
            bump(&self.metrics.channels_created);
            if self.config.channels.seed_welcome {
                self.seed_welcome(&channel.id).await;
            }
        }
        Ok(creation)
    }

    async fn seed_welcome(&self, channel: &ChannelId) {
        let item = NewItem {
            channel_id: channel.clone(),
            title: None,
            content: WELCOME_CONTENT.to_string(),
            content_type: ContentType::Text,
            device_id: DeviceId::parse(SYSTEM_DEVICE).unwrap_or_else(|_| DeviceId::generate()),
            device_type: DeviceType::Other,
        };
        if let Err(err) = self.clipboard.save(item).await {
            tracing::warn!(channel_id = %channel, error = %err, "failed to seed welcome item");
        }
    }

    /// Fetch a channel.
    pub async fn get_channel(&self, id: &ChannelId) -> SyncResult<Channel> {
        self.channels.get(id).await
    }

    /// Whether a channel exists. Malformed ids are simply absent.
    pub async fn channel_exists(&self, id: &str) -> SyncResult<bool> {
        self.channels.exists(id).await
    }

    /// Number of channels.
    pub async fn channel_count(&self) -> SyncResult<u64> {
        self.channels.count().await
    }

    /// Aggregate statistics for a channel.
    pub async fn channel_stats(&self, id: &ChannelId) -> SyncResult<ChannelStats> {
        collect_stats(
            id,
            self.channels.as_ref(),
            self.clipboard.as_ref(),
            self.devices.as_ref(),
            self.ledger.as_ref(),
        )
        .await
    }

    // ---- devices ----

    /// Register a device (or refresh a known one) and join it to `channel`.
    pub async fn join_channel(
        &self,
        channel: &ChannelId,
        name: &str,
        device_type: &str,
        device_id: Option<&str>,
    ) -> SyncResult<DeviceView> {
        if name.is_empty() {
            return Err(SyncError::invalid("device name is required"));
        }
        self.require_channel(channel).await?;

        let device_id = match device_id.filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(DeviceId::parse(raw)?),
            None => None,
        };
        let device = self
            .devices
            .register(name, DeviceType::coerce(device_type), device_id.as_ref())
            .await?;
        self.devices.add_to_channel(&device.id, channel).await?;
        bump(&self.metrics.devices_joined);

        tracing::debug!(channel_id = %channel, device_id = %device.id, "device joined");
        self.record(&device.id, channel, SyncAction::Connect, &format!("{} connected", device.name))
            .await;

        self.devices.get_in_channel(&device.id, channel).await
    }

    /// Remove a device from `channel`. The device record is kept.
    pub async fn leave_channel(&self, channel: &ChannelId, device: &DeviceId) -> SyncResult<()> {
        self.require_channel(channel).await?;
        self.devices.remove_from_channel(device, channel).await?;
        tracing::debug!(channel_id = %channel, device_id = %device, "device left");
        self.record(device, channel, SyncAction::Disconnect, "device disconnected")
            .await;
        Ok(())
    }

    /// Update global presence, then channel-local presence.
    ///
    /// A device that is not a member of `channel` still gets its global
    /// presence updated.
    pub async fn set_presence(
        &self,
        channel: &ChannelId,
        device: &DeviceId,
        online: bool,
    ) -> SyncResult<Device> {
        self.require_channel(channel).await?;
        let updated = self.devices.update_presence(device, online).await?;

        match self.devices.update_in_channel(device, channel, online).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                tracing::debug!(channel_id = %channel, device_id = %device, "presence for non-member");
            }
            Err(err) => return Err(err),
        }
        Ok(updated)
    }

    /// Rename a device; an empty or missing type keeps the current one.
    pub async fn rename_device(
        &self,
        device: &DeviceId,
        name: &str,
        device_type: Option<&str>,
    ) -> SyncResult<Device> {
        if name.is_empty() {
            return Err(SyncError::invalid("device name is required"));
        }
        let device_type = device_type
            .filter(|raw| !raw.is_empty())
            .map(DeviceType::coerce);
        self.devices.rename(device, name, device_type).await
    }

    /// A member device as seen from `channel`.
    pub async fn get_device(&self, channel: &ChannelId, device: &DeviceId) -> SyncResult<DeviceView> {
        self.require_channel(channel).await?;
        self.devices.get_in_channel(device, channel).await
    }

    /// Members of `channel`, most recently seen first.
    pub async fn list_devices(&self, channel: &ChannelId) -> SyncResult<Vec<DeviceView>> {
        self.require_channel(channel).await?;
        self.devices.list_by_channel(channel).await
    }

    /// Delete a device and all of its memberships.
    pub async fn remove_device(&self, device: &DeviceId) -> SyncResult<()> {
        self.devices.remove(device).await
    }

    // ---- clipboard writes ----

    /// Save an item pushed by a device.
    pub async fn save_item(&self, channel: &ChannelId, draft: ItemDraft) -> SyncResult<ClipboardItem> {
        self.require_channel(channel).await?;

        let item = NewItem {
            channel_id: channel.clone(),
            title: draft.title,
            content: draft.content,
            content_type: ContentType::coerce(&draft.content_type),
            device_id: DeviceId::parse(&draft.device_id)?,
            device_type: DeviceType::coerce(&draft.device_type),
        };
        let saved = self.clipboard.save(item).await?;
        bump(&self.metrics.items_saved);

        tracing::debug!(channel_id = %channel, item_id = %saved.id, "item saved");
        Ok(saved)
    }

    /// Apply a partial update, then record it in the ledger.
    pub async fn update_item(
        &self,
        channel: &ChannelId,
        id: &ItemId,
        patch: ItemPatch,
    ) -> SyncResult<ClipboardItem> {
        self.require_channel(channel).await?;
        let actor = patch.device_id.clone();
        let updated = self.clipboard.update(id, channel, patch).await?;
        bump(&self.metrics.items_updated);

        let actor = actor.unwrap_or_else(|| updated.device_id.clone());
        self.record(
            &actor,
            channel,
            SyncAction::Update,
            &format!("updated clipboard item: {}", updated.content_type),
        )
        .await;

        self.clipboard.get(id, channel).await
    }

    /// Delete an item, then record it in the ledger under its origin device.
    pub async fn delete_item(&self, channel: &ChannelId, id: &ItemId) -> SyncResult<ClipboardItem> {
        self.require_channel(channel).await?;
        let removed = self.clipboard.delete(id, channel).await?;
        bump(&self.metrics.items_deleted);

        self.record(
            &removed.device_id,
            channel,
            SyncAction::Delete,
            &format!("deleted clipboard item: {}", removed.content_type),
        )
        .await;
        Ok(removed)
    }

    /// Set or flip the favorite flag, then record it in the ledger.
    ///
    /// Concurrent toggles are last-writer-wins.
    pub async fn toggle_favorite(
        &self,
        channel: &ChannelId,
        id: &ItemId,
        explicit: Option<bool>,
        device: Option<&DeviceId>,
    ) -> SyncResult<ClipboardItem> {
        self.require_channel(channel).await?;
        let item = self.clipboard.toggle_favorite(id, channel, explicit).await?;
        bump(&self.metrics.favorites_toggled);

        let actor = device.unwrap_or(&item.device_id);
        self.record(
            actor,
            channel,
            SyncAction::for_favorite(item.favorite),
            item.title.as_deref().unwrap_or_default(),
        )
        .await;
        Ok(item)
    }

    // ---- clipboard reads ----

    /// Fetch one item of `channel`.
    pub async fn get_item(&self, channel: &ChannelId, id: &ItemId) -> SyncResult<ClipboardItem> {
        self.require_channel(channel).await?;
        self.clipboard.get(id, channel).await
    }

    /// Newest items first. A `limit` of 0 uses the default page size.
    pub async fn latest(&self, channel: &ChannelId, limit: u32) -> SyncResult<Vec<ClipboardItem>> {
        self.require_channel(channel).await?;
        self.clipboard.latest(channel, self.limit(limit)).await
    }

    /// The newest item, if any.
    pub async fn current(&self, channel: &ChannelId) -> SyncResult<Option<ClipboardItem>> {
        self.require_channel(channel).await?;
        Ok(self.clipboard.latest(channel, 1).await?.into_iter().next())
    }

    /// All items, newest first.
    pub async fn history(
        &self,
        channel: &ChannelId,
        page: u32,
        size: u32,
    ) -> SyncResult<Page<ClipboardItem>> {
        self.require_channel(channel).await?;
        let filter = ItemFilter::new(channel.clone());
        self.clipboard
            .list(&filter, ItemOrder::Newest, self.page(page, size))
            .await
    }

    /// Items of one content type. Unknown type names are rejected.
    pub async fn by_type(
        &self,
        channel: &ChannelId,
        content_type: &str,
        page: u32,
        size: u32,
    ) -> SyncResult<Page<ClipboardItem>> {
        let content_type: ContentType = content_type.parse()?;
        self.require_channel(channel).await?;
        let filter = ItemFilter::new(channel.clone()).content_type(content_type);
        self.clipboard
            .list(&filter, ItemOrder::Newest, self.page(page, size))
            .await
    }

    /// Items pushed from one device type. Unknown type names are rejected.
    pub async fn by_device_type(
        &self,
        channel: &ChannelId,
        device_type: &str,
        page: u32,
        size: u32,
    ) -> SyncResult<Page<ClipboardItem>> {
        let device_type: DeviceType = device_type.parse()?;
        self.require_channel(channel).await?;
        let filter = ItemFilter::new(channel.clone()).device_type(device_type);
        self.clipboard
            .list(&filter, ItemOrder::Newest, self.page(page, size))
            .await
    }

    /// Items matching both optional filters. Missing or unrecognized values
    /// do not filter.
    pub async fn filtered(
        &self,
        channel: &ChannelId,
        content_type: Option<&str>,
        device_type: Option<&str>,
        page: u32,
        size: u32,
    ) -> SyncResult<Page<ClipboardItem>> {
        self.require_channel(channel).await?;
        let mut filter = ItemFilter::new(channel.clone());
        if let Some(content_type) = content_type.and_then(|raw| raw.parse::<ContentType>().ok()) {
            filter = filter.content_type(content_type);
        }
        if let Some(device_type) = device_type.and_then(|raw| raw.parse::<DeviceType>().ok()) {
            filter = filter.device_type(device_type);
        }
        self.clipboard
            .list(&filter, ItemOrder::Newest, self.page(page, size))
            .await
    }

    /// Favorite items, most recently changed first.
    pub async fn favorites(
        &self,
        channel: &ChannelId,
        page: u32,
        size: u32,
    ) -> SyncResult<Page<ClipboardItem>> {
        self.require_channel(channel).await?;
        let filter = ItemFilter::new(channel.clone()).favorite(true);
        self.clipboard
            .list(&filter, ItemOrder::RecentlyUpdated, self.page(page, size))
            .await
    }

    /// Keyword search; a blank keyword yields an empty page.
    pub async fn search(
        &self,
        channel: &ChannelId,
        keyword: &str,
        page: u32,
        size: u32,
    ) -> SyncResult<Page<ClipboardItem>> {
        self.require_channel(channel).await?;
        self.clipboard
            .search(channel, keyword, self.page(page, size))
            .await
    }

    // ---- ledger ----

    /// Ledger entries of `channel`, newest first.
    pub async fn sync_history(
        &self,
        channel: &ChannelId,
        limit: u32,
        offset: u64,
    ) -> SyncResult<Vec<SyncEntry>> {
        self.require_channel(channel).await?;
        self.ledger
            .list_by_channel(channel, self.limit(limit), offset)
            .await
    }

    /// Record an explicit sync reported by a device.
    pub async fn log_sync(
        &self,
        channel: &ChannelId,
        device: &DeviceId,
        content: &str,
    ) -> SyncResult<SyncEntry> {
        self.require_channel(channel).await?;
        self.ledger
            .append(device, channel, SyncAction::Sync, content)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Entity, StorageError};
    use async_trait::async_trait;

    async fn core(config: Config) -> (ClipSync, ChannelId) {
        let db = Database::in_memory().await.unwrap();
        let sync = ClipSync::from_database(config, &db);
        let channel = sync
            .create_channel(Some("c1"))
            .await
            .unwrap()
            .into_channel()
            .id;
        (sync, channel)
    }

    fn draft(content: &str) -> ItemDraft {
        ItemDraft {
            title: None,
            content: content.to_string(),
            content_type: "text".into(),
            device_id: "d1".into(),
            device_type: "phone".into(),
        }
    }

    /// Ledger that is always unavailable.
    struct BrokenLedger;

    #[async_trait]
    impl SyncLedger for BrokenLedger {
        async fn append(
            &self,
            _device: &DeviceId,
            _channel: &ChannelId,
            _action: SyncAction,
            _content: &str,
        ) -> SyncResult<SyncEntry> {
            Err(StorageError::Database(sqlx::Error::PoolClosed).into())
        }

        async fn list_by_channel(
            &self,
            _channel: &ChannelId,
            _limit: u32,
            _offset: u64,
        ) -> SyncResult<Vec<SyncEntry>> {
            Err(StorageError::Database(sqlx::Error::PoolClosed).into())
        }

        async fn count(&self, _channel: &ChannelId) -> SyncResult<u64> {
            Err(StorageError::Database(sqlx::Error::PoolClosed).into())
        }
    }

    #[tokio::test]
    async fn save_coerces_unknown_types() {
        let (sync, channel) = core(Config::default()).await;

        let mut bogus = draft("x");
        bogus.content_type = "bogus".into();
        bogus.device_type = "bogus".into();
        let item = sync.save_item(&channel, bogus).await.unwrap();

        assert_eq!(item.content_type, ContentType::Text);
        assert_eq!(item.device_type, DeviceType::Other);
        assert_eq!(sync.metrics().items_saved.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn save_requires_channel_and_device() {
        let (sync, _) = core(Config::default()).await;

        let err = sync
            .save_item(&ChannelId::parse("nope").unwrap(), draft("x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::NotFound {
                entity: Entity::Channel,
                ..
            }
        ));

        let mut anonymous = draft("x");
        anonymous.device_id = String::new();
        let err = sync
            .save_item(&ChannelId::parse("c1").unwrap(), anonymous)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn save_does_not_touch_ledger() {
        let (sync, channel) = core(Config::default()).await;
        sync.save_item(&channel, draft("x")).await.unwrap();
        assert!(sync.sync_history(&channel, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutations_are_recorded() {
        let (sync, channel) = core(Config::default()).await;
        let item = sync.save_item(&channel, draft("x")).await.unwrap();
        let other = DeviceId::parse("d2").unwrap();

        sync.update_item(
            &channel,
            &item.id,
            ItemPatch {
                content: Some("y".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        sync.toggle_favorite(&channel, &item.id, None, Some(&other))
            .await
            .unwrap();
        sync.toggle_favorite(&channel, &item.id, None, None)
            .await
            .unwrap();
        sync.delete_item(&channel, &item.id).await.unwrap();

        let history = sync.sync_history(&channel, 10, 0).await.unwrap();
        let actions: Vec<_> = history.iter().map(|e| e.action.clone()).collect();
        assert_eq!(
            actions,
            vec![
                SyncAction::Delete,
                SyncAction::Unfavorite,
                SyncAction::Favorite,
                SyncAction::Update
            ]
        );
        assert_eq!(history[2].device_id, other);
        assert_eq!(history[1].device_id.as_str(), "d1");
        assert_eq!(history[0].content, "deleted clipboard item: text");
    }

    #[tokio::test]
    async fn ledger_failure_does_not_fail_mutation() {
        let db = Database::in_memory().await.unwrap();
        let config = Config::default();
        let mut components = Components::sqlite(&db, &config);
        components.ledger = Arc::new(BrokenLedger);
        let sync = ClipSync::new(config, components);

        let channel = sync.create_channel(Some("c1")).await.unwrap().into_channel().id;
        let item = sync.save_item(&channel, draft("x")).await.unwrap();

        let favored = sync
            .toggle_favorite(&channel, &item.id, Some(true), None)
            .await
            .unwrap();
        assert!(favored.favorite);
        sync.delete_item(&channel, &item.id).await.unwrap();
        assert!(sync.get_item(&channel, &item.id).await.unwrap_err().is_not_found());

        assert_eq!(sync.metrics().ledger_failures.load(Ordering::Relaxed), 2);

        let err = sync
            .log_sync(&channel, &DeviceId::parse("d1").unwrap(), "explicit")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Storage(_)));
    }

    #[tokio::test]
    async fn join_and_leave_channel() {
        let (sync, channel) = core(Config::default()).await;

        let view = sync
            .join_channel(&channel, "laptop", "desktop", Some("dev-1"))
            .await
            .unwrap();
        assert_eq!(view.id.as_str(), "dev-1");
        assert_eq!(view.device_type, DeviceType::Desktop);
        assert!(view.is_active);
        assert_eq!(sync.list_devices(&channel).await.unwrap().len(), 1);

        sync.leave_channel(&channel, &view.id).await.unwrap();
        assert!(sync.list_devices(&channel).await.unwrap().is_empty());

        let history = sync.sync_history(&channel, 10, 0).await.unwrap();
        assert_eq!(history[0].action, SyncAction::Disconnect);
        assert_eq!(history[1].action, SyncAction::Connect);
    }

    #[tokio::test]
    async fn join_unknown_channel_fails_before_registering() {
        let (sync, _) = core(Config::default()).await;
        let ghost = ChannelId::parse("ghost").unwrap();

        let err = sync
            .join_channel(&ghost, "phone", "phone", Some("dev-9"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        let err = sync
            .rename_device(&DeviceId::parse("dev-9").unwrap(), "x", None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn presence_for_non_member_is_not_fatal() {
        let (sync, channel) = core(Config::default()).await;
        let view = sync
            .join_channel(&channel, "tab", "tablet", None)
            .await
            .unwrap();
        let other = sync.create_channel(Some("c2")).await.unwrap().into_channel().id;

        let device = sync.set_presence(&other, &view.id, false).await.unwrap();
        assert!(!device.is_online);

        let view = sync.get_device(&channel, &view.id).await.unwrap();
        assert!(!view.is_online);
        assert!(view.is_active);

        let err = sync
            .set_presence(&channel, &DeviceId::parse("ghost").unwrap(), true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn strict_and_lenient_type_filters() {
        let (sync, channel) = core(Config::default()).await;
        let mut link = draft("https://example.com");
        link.content_type = "link".into();
        sync.save_item(&channel, link).await.unwrap();
        sync.save_item(&channel, draft("plain")).await.unwrap();

        assert_eq!(sync.by_type(&channel, "link", 1, 10).await.unwrap().total, 1);
        assert!(matches!(
            sync.by_type(&channel, "bogus", 1, 10).await.unwrap_err(),
            SyncError::InvalidInput { .. }
        ));
        assert!(matches!(
            sync.by_device_type(&channel, "toaster", 1, 10)
                .await
                .unwrap_err(),
            SyncError::InvalidInput { .. }
        ));
        assert_eq!(
            sync.by_device_type(&channel, "phone", 1, 10)
                .await
                .unwrap()
                .total,
            2
        );

        let page = sync
            .filtered(&channel, Some("bogus"), Some("phone"), 1, 10)
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        let page = sync
            .filtered(&channel, Some("text"), None, 1, 10)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn page_size_limits_follow_config() {
        let mut config = Config::default();
        config.pagination.default_size = 2;
        config.pagination.max_size = 3;
        let (sync, channel) = core(config).await;
        for i in 0..5 {
            sync.save_item(&channel, draft(&format!("n{i}"))).await.unwrap();
        }

        let page = sync.history(&channel, 0, 0).await.unwrap();
        assert_eq!((page.page, page.size, page.items.len()), (1, 2, 2));
        assert_eq!(page.total_pages, 3);

        let page = sync.history(&channel, 1, 50).await.unwrap();
        assert_eq!(page.size, 3);
        assert_eq!(sync.latest(&channel, 0).await.unwrap().len(), 2);
        assert_eq!(sync.latest(&channel, 99).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn current_is_newest_or_none() {
        let (sync, channel) = core(Config::default()).await;
        assert!(sync.current(&channel).await.unwrap().is_none());

        sync.save_item(&channel, draft("first")).await.unwrap();
        sync.save_item(&channel, draft("second")).await.unwrap();
        assert_eq!(sync.current(&channel).await.unwrap().unwrap().content, "second");
    }

    #[tokio::test]
    async fn welcome_item_seeded_when_enabled() {
        let mut config = Config::default();
        config.channels.seed_welcome = true;
        let (sync, channel) = core(config).await;

        let current = sync.current(&channel).await.unwrap().unwrap();
        assert_eq!(current.content, WELCOME_CONTENT);
        assert_eq!(current.device_id.as_str(), SYSTEM_DEVICE);

        sync.create_channel(Some("c1")).await.unwrap();
        assert_eq!(sync.history(&channel, 1, 10).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn welcome_item_absent_by_default() {
        let (sync, channel) = core(Config::default()).await;
        assert!(sync.latest(&channel, 10).await.unwrap().is_empty());
        assert_eq!(sync.metrics().channels_created.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn favorites_are_paginated_by_update_time() {
        let (sync, channel) = core(Config::default()).await;
        let a = sync.save_item(&channel, draft("a")).await.unwrap();
        let b = sync.save_item(&channel, draft("b")).await.unwrap();
        sync.save_item(&channel, draft("c")).await.unwrap();

        sync.toggle_favorite(&channel, &b.id, Some(true), None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        sync.toggle_favorite(&channel, &a.id, Some(true), None)
            .await
            .unwrap();

        let page = sync.favorites(&channel, 1, 10).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn log_sync_appends_sync_entry() {
        let (sync, channel) = core(Config::default()).await;
        let entry = sync
            .log_sync(&channel, &DeviceId::parse("d1").unwrap(), "pulled 3 items")
            .await
            .unwrap();
        assert_eq!(entry.action, SyncAction::Sync);
        assert_eq!(sync.sync_history(&channel, 0, 0).await.unwrap(), vec![entry]);
    }

    fn is_missing_channel(result: SyncResult<impl std::fmt::Debug>) -> bool {
        matches!(
            result,
            Err(SyncError::NotFound {
                entity: Entity::Channel,
                ..
            })
        )
    }

    #[tokio::test]
    async fn unknown_channel_is_rejected_before_storage() {
        let (sync, _) = core(Config::default()).await;
        let ghost = ChannelId::parse("ghost").unwrap();
        let device = DeviceId::parse("d1").unwrap();
        let item = ItemId::new();

        assert!(is_missing_channel(sync.log_sync(&ghost, &device, "x").await));
        assert_eq!(sync.ledger.count(&ghost).await.unwrap(), 0);

        assert!(is_missing_channel(sync.history(&ghost, 1, 10).await));
        assert!(is_missing_channel(sync.latest(&ghost, 10).await));
        assert!(is_missing_channel(sync.current(&ghost).await));
        assert!(is_missing_channel(sync.search(&ghost, "x", 1, 10).await));
        assert!(is_missing_channel(sync.favorites(&ghost, 1, 10).await));
        assert!(is_missing_channel(sync.by_type(&ghost, "text", 1, 10).await));
        assert!(is_missing_channel(
            sync.filtered(&ghost, None, None, 1, 10).await
        ));
        assert!(is_missing_channel(sync.sync_history(&ghost, 10, 0).await));
        assert!(is_missing_channel(sync.list_devices(&ghost).await));
        assert!(is_missing_channel(sync.get_item(&ghost, &item).await));
        assert!(is_missing_channel(
            sync.toggle_favorite(&ghost, &item, None, None).await
        ));
        assert!(is_missing_channel(sync.delete_item(&ghost, &item).await));
        assert!(is_missing_channel(
            sync.set_presence(&ghost, &device, true).await
        ));
    }

    #[tokio::test]
    async fn configured_cap_above_hundred_reaches_every_list() {
        let mut config = Config::default();
        config.pagination.max_size = 150;
        let (sync, channel) = core(config).await;
        let device = DeviceId::parse("d1").unwrap();
        for i in 0..120 {
            sync.save_item(&channel, draft(&format!("n{i}"))).await.unwrap();
            sync.log_sync(&channel, &device, &format!("s{i}")).await.unwrap();
        }

        assert_eq!(sync.history(&channel, 1, 500).await.unwrap().items.len(), 120);
        assert_eq!(sync.latest(&channel, 500).await.unwrap().len(), 120);
        assert_eq!(sync.sync_history(&channel, 500, 0).await.unwrap().len(), 120);
    }

    #[tokio::test]
    async fn rename_device_validates_name() {
        let (sync, channel) = core(Config::default()).await;
        let view = sync
            .join_channel(&channel, "old", "phone", None)
            .await
            .unwrap();

        let err = sync.rename_device(&view.id, "", None).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput { .. }));

        let renamed = sync
            .rename_device(&view.id, "new", Some(""))
            .await
            .unwrap();
        assert_eq!(renamed.name, "new");
        assert_eq!(renamed.device_type, DeviceType::Phone);
    }
}
