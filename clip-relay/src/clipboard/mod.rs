//! Clipboard store: channel-scoped clipboard items.
//!
//! Every read and write is keyed by `(item id, channel id)`; an item id that
//! exists in another channel is treated as absent.

mod filter;

pub use filter::{Condition, ItemFilter, ItemOrder};

use crate::error::{Entity, StorageError, SyncError, SyncResult};
use crate::model::{ClipboardItem, ItemPatch, NewItem, Page, PageRequest};
use crate::storage::{corrupt, now_millis, Database};
use async_trait::async_trait;
use cliplink_types::{ChannelId, ContentType, DeviceId, ItemId};
use sqlx::{QueryBuilder, Sqlite};

const ITEM_COLUMNS: &str =
    "id, channel_id, title, content, content_type, device_id, device_type, favorite, created_at, updated_at";

/// Clipboard item storage.
#[async_trait]
pub trait ClipboardStore: Send + Sync {
    /// Store a new item. Content must not be empty.
    async fn save(&self, item: NewItem) -> SyncResult<ClipboardItem>;

    /// Fetch an item of `channel`.
    async fn get(&self, id: &ItemId, channel: &ChannelId) -> SyncResult<ClipboardItem>;

    /// Newest items first, at most `limit`. The caller bounds `limit`; 0 is
    /// read as 1.
    async fn latest(&self, channel: &ChannelId, limit: u32) -> SyncResult<Vec<ClipboardItem>>;

    /// One page of items matching `filter`.
    async fn list(
        &self,
        filter: &ItemFilter,
        order: ItemOrder,
        page: PageRequest,
    ) -> SyncResult<Page<ClipboardItem>>;

    /// Keyword search over title and content, title matches first.
    ///
    /// A blank keyword yields an empty page.
    async fn search(
        &self,
        channel: &ChannelId,
        keyword: &str,
        page: PageRequest,
    ) -> SyncResult<Page<ClipboardItem>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(Page::empty(page));
        }
        let filter = ItemFilter::new(channel.clone()).keyword(keyword);
        self.list(&filter, ItemOrder::Relevance, page).await
    }

    /// Apply a partial update and return the stored result.
    async fn update(
        &self,
        id: &ItemId,
        channel: &ChannelId,
        patch: ItemPatch,
    ) -> SyncResult<ClipboardItem>;

    /// Set the favorite flag to `explicit`, or flip it when `None`.
    async fn toggle_favorite(
        &self,
        id: &ItemId,
        channel: &ChannelId,
        explicit: Option<bool>,
    ) -> SyncResult<ClipboardItem>;

    /// Delete an item, returning what was removed.
    async fn delete(&self, id: &ItemId, channel: &ChannelId) -> SyncResult<ClipboardItem>;

    /// Items in `channel`.
    async fn count(&self, channel: &ChannelId) -> SyncResult<u64>;

    /// Items of one content type in `channel`.
    async fn count_by_type(&self, content_type: ContentType, channel: &ChannelId)
        -> SyncResult<u64>;
}

/// SQLite-backed [`ClipboardStore`].
#[derive(Clone)]
pub struct SqliteClipboardStore {
    db: Database,
}

impl SqliteClipboardStore {
    /// Create a store over `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ClipboardStore for SqliteClipboardStore {
    async fn save(&self, item: NewItem) -> SyncResult<ClipboardItem> {
        if item.content.is_empty() {
            return Err(SyncError::invalid("content is required"));
        }

        let id = ItemId::new();
        let now = now_millis();
        let sql = format!(
            r#"
            INSERT INTO clipboard_items
                (id, channel_id, title, content, content_type, device_id, device_type, favorite, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)
            RETURNING {ITEM_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id.to_string())
            .bind(item.channel_id.as_str())
            .bind(item.title.filter(|title| !title.is_empty()))
            .bind(&item.content)
            .bind(item.content_type.as_str())
            .bind(item.device_id.as_str())
            .bind(item.device_type.as_str())
            .bind(now)
            .fetch_one(self.db.pool())
            .await?;

        Ok(row.try_into()?)
    }

    async fn get(&self, id: &ItemId, channel: &ChannelId) -> SyncResult<ClipboardItem> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM clipboard_items WHERE id = ?1 AND channel_id = ?2");
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id.to_string())
            .bind(channel.as_str())
            .fetch_optional(self.db.pool())
            .await?;

        found(row, id)
    }

    async fn latest(&self, channel: &ChannelId, limit: u32) -> SyncResult<Vec<ClipboardItem>> {
        let sql = format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM clipboard_items
            WHERE channel_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#
        );
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(channel.as_str())
            .bind(limit.max(1) as i64)
            .fetch_all(self.db.pool())
            .await?;

        decode_all(rows)
    }

    async fn list(
        &self,
        filter: &ItemFilter,
        order: ItemOrder,
        page: PageRequest,
    ) -> SyncResult<Page<ClipboardItem>> {
        if filter.matches_nothing() {
            return Ok(Page::empty(page));
        }

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM clipboard_items");
        filter.push_where(&mut count);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(self.db.pool())
            .await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {ITEM_COLUMNS} FROM clipboard_items"));
        filter.push_where(&mut select);
        filter.push_order(order, &mut select);
        select.push(" LIMIT ");
        select.push_bind(page.size() as i64);
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let rows = select
            .build_query_as::<ItemRow>()
            .fetch_all(self.db.pool())
            .await?;

        Ok(Page::new(decode_all(rows)?, total as u64, page))
    }

    async fn update(
        &self,
        id: &ItemId,
        channel: &ChannelId,
        patch: ItemPatch,
    ) -> SyncResult<ClipboardItem> {
        if patch.content.as_deref() == Some("") {
            return Err(SyncError::invalid("content cannot be empty"));
        }

        let sql = format!(
            r#"
            UPDATE clipboard_items
            SET title = CASE WHEN ?3 THEN NULLIF(?4, '') ELSE title END,
                content = COALESCE(?5, content),
                content_type = COALESCE(?6, content_type),
                device_id = COALESCE(?7, device_id),
                device_type = COALESCE(?8, device_type),
                updated_at = ?9
            WHERE id = ?1 AND channel_id = ?2
            RETURNING {ITEM_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id.to_string())
            .bind(channel.as_str())
            .bind(patch.title.is_some())
            .bind(patch.title)
            .bind(patch.content)
            .bind(patch.content_type.map(|t| t.as_str()))
            .bind(patch.device_id.map(String::from))
            .bind(patch.device_type.map(|t| t.as_str()))
            .bind(now_millis())
            .fetch_optional(self.db.pool())
            .await?;

        found(row, id)
    }

    async fn toggle_favorite(
        &self,
        id: &ItemId,
        channel: &ChannelId,
        explicit: Option<bool>,
    ) -> SyncResult<ClipboardItem> {
        let sql = format!(
            r#"
            UPDATE clipboard_items
            SET favorite = COALESCE(?3, NOT favorite), updated_at = ?4
            WHERE id = ?1 AND channel_id = ?2
            RETURNING {ITEM_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id.to_string())
            .bind(channel.as_str())
            .bind(explicit)
            .bind(now_millis())
            .fetch_optional(self.db.pool())
            .await?;

        found(row, id)
    }

    async fn delete(&self, id: &ItemId, channel: &ChannelId) -> SyncResult<ClipboardItem> {
        let sql = format!(
            "DELETE FROM clipboard_items WHERE id = ?1 AND channel_id = ?2 RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(id.to_string())
            .bind(channel.as_str())
            .fetch_optional(self.db.pool())
            .await?;

        found(row, id)
    }

    async fn count(&self, channel: &ChannelId) -> SyncResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clipboard_items WHERE channel_id = ?1")
            .bind(channel.as_str())
            .fetch_one(self.db.pool())
            .await?;
        Ok(count as u64)
    }

    async fn count_by_type(
        &self,
        content_type: ContentType,
        channel: &ChannelId,
    ) -> SyncResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM clipboard_items WHERE channel_id = ?1 AND content_type = ?2",
        )
        .bind(channel.as_str())
        .bind(content_type.as_str())
        .fetch_one(self.db.pool())
        .await?;
        Ok(count as u64)
    }
}

fn found(row: Option<ItemRow>, id: &ItemId) -> SyncResult<ClipboardItem> {
    match row {
        Some(row) => Ok(row.try_into()?),
        None => Err(SyncError::not_found(Entity::ClipboardItem, id)),
    }
}

fn decode_all(rows: Vec<ItemRow>) -> SyncResult<Vec<ClipboardItem>> {
    rows.into_iter()
        .map(|row| row.try_into().map_err(SyncError::from))
        .collect()
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    channel_id: String,
    title: Option<String>,
    content: String,
    content_type: String,
    device_id: String,
    device_type: String,
    favorite: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ItemRow> for ClipboardItem {
    type Error = StorageError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let bad = corrupt("clipboard_items");
        Ok(ClipboardItem {
            id: ItemId::parse(&row.id).map_err(&bad)?,
            channel_id: ChannelId::try_from(row.channel_id).map_err(&bad)?,
            title: row.title,
            content: row.content,
            content_type: row.content_type.parse().map_err(&bad)?,
            device_id: DeviceId::try_from(row.device_id).map_err(&bad)?,
            device_type: row.device_type.parse().map_err(&bad)?,
            favorite: row.favorite,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cliplink_types::DeviceType;
    use std::collections::HashSet;

    async fn store() -> SqliteClipboardStore {
        SqliteClipboardStore::new(Database::in_memory().await.unwrap())
    }

    fn channel(id: &str) -> ChannelId {
        ChannelId::parse(id).unwrap()
    }

    fn new_item(channel_id: &ChannelId, content: &str) -> NewItem {
        NewItem {
            channel_id: channel_id.clone(),
            title: None,
            content: content.to_string(),
            content_type: ContentType::Text,
            device_id: DeviceId::parse("d1").unwrap(),
            device_type: DeviceType::Phone,
        }
    }

    #[tokio::test]
    async fn save_and_get() {
        let store = store().await;
        let c = channel("c1");

        let saved = store.save(new_item(&c, "hello")).await.unwrap();

        assert!(!saved.favorite);
        assert_eq!(saved.created_at, saved.updated_at);
        assert_eq!(saved.title, None);
        assert_eq!(store.get(&saved.id, &c).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn save_rejects_empty_content() {
        let store = store().await;
        let err = store.save(new_item(&channel("c1"), "")).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn items_are_invisible_from_other_channels() {
        let store = store().await;
        let (a, b) = (channel("a"), channel("b"));
        let item = store.save(new_item(&a, "secret")).await.unwrap();

        assert!(store.get(&item.id, &b).await.unwrap_err().is_not_found());
        assert!(store
            .update(&item.id, &b, ItemPatch::default())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store
            .toggle_favorite(&item.id, &b, None)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store.delete(&item.id, &b).await.unwrap_err().is_not_found());
        assert_eq!(store.count(&b).await.unwrap(), 0);
        assert_eq!(store.get(&item.id, &a).await.unwrap().content, "secret");
    }

    #[tokio::test]
    async fn latest_is_newest_first_and_clamped() {
        let store = store().await;
        let c = channel("c1");
        for i in 0..5 {
            store.save(new_item(&c, &format!("item {i}"))).await.unwrap();
        }

        let latest = store.latest(&c, 3).await.unwrap();
        let contents: Vec<_> = latest.iter().map(|item| item.content.as_str()).collect();
        assert_eq!(contents, vec!["item 4", "item 3", "item 2"]);

        assert_eq!(store.latest(&c, 0).await.unwrap().len(), 1);
        assert!(store.latest(&channel("empty"), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_pages_cover_everything() {
        let store = store().await;
        let c = channel("c1");
        let mut all = HashSet::new();
        for i in 0..25 {
            all.insert(store.save(new_item(&c, &format!("n{i}"))).await.unwrap().id);
        }

        let filter = ItemFilter::new(c.clone());
        let mut seen = HashSet::new();
        for page in 1..=3 {
            let result = store
                .list(&filter, ItemOrder::Newest, PageRequest::new(page, 10))
                .await
                .unwrap();
            assert_eq!(result.total, 25);
            assert_eq!(result.total_pages, 3);
            if page == 3 {
                assert_eq!(result.items.len(), 5);
            }
            seen.extend(result.items.into_iter().map(|item| item.id));
        }
        assert_eq!(seen, all);
    }

    #[tokio::test]
    async fn list_filters_by_conditions() {
        let store = store().await;
        let c = channel("c1");
        let mut code = new_item(&c, "fn main() {}");
        code.content_type = ContentType::Code;
        code.device_type = DeviceType::Desktop;
        let code = store.save(code).await.unwrap();
        store.save(new_item(&c, "plain")).await.unwrap();
        store.save(new_item(&channel("other"), "elsewhere")).await.unwrap();

        let page = store
            .list(
                &ItemFilter::new(c.clone()).content_type(ContentType::Code),
                ItemOrder::Newest,
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, code.id);

        let page = store
            .list(
                &ItemFilter::new(c.clone())
                    .content_type(ContentType::Text)
                    .device_type(DeviceType::Desktop),
                ItemOrder::Newest,
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        store.toggle_favorite(&code.id, &c, Some(true)).await.unwrap();
        let page = store
            .list(
                &ItemFilter::new(c.clone()).favorite(true),
                ItemOrder::RecentlyUpdated,
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(page.items[0].favorite);
    }

    #[tokio::test]
    async fn search_ranks_title_matches_first() {
        let store = store().await;
        let c = channel("c1");
        let mut titled = new_item(&c, "unrelated body");
        titled.title = Some("Rust Notes".into());
        let titled = store.save(titled).await.unwrap();
        store.save(new_item(&c, "learning rust today")).await.unwrap();
        store.save(new_item(&c, "nothing here")).await.unwrap();

        let page = store.search(&c, "RUST", PageRequest::default()).await.unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].id, titled.id);
        assert_eq!(page.items[1].content, "learning rust today");
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let store = store().await;
        let c = channel("c1");
        store.save(new_item(&c, "50% off")).await.unwrap();
        store.save(new_item(&c, "500 items")).await.unwrap();

        let page = store.search(&c, "0%", PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].content, "50% off");

        let page = store.search(&c, "_", PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn search_folds_ascii_case_only() {
        let store = store().await;
        let c = channel("c1");
        store.save(new_item(&c, "Café MENU")).await.unwrap();

        let total = |page: Page<ClipboardItem>| page.total;
        for keyword in ["menu", "café", "Café", "CAF"] {
            let page = store.search(&c, keyword, PageRequest::default()).await.unwrap();
            assert_eq!(total(page), 1, "{keyword}");
        }

        let page = store.search(&c, "CAFÉ", PageRequest::default()).await.unwrap();
        assert_eq!(total(page), 0);
    }

    #[tokio::test]
    async fn search_blank_keyword_is_empty_page() {
        let store = store().await;
        let c = channel("c1");
        store.save(new_item(&c, "hello")).await.unwrap();

        for keyword in ["", "   "] {
            let page = store
                .search(&c, keyword, PageRequest::new(1, 10))
                .await
                .unwrap();
            assert!(page.items.is_empty());
            assert_eq!(page.total, 0);
            assert_eq!(page.total_pages, 0);
        }
    }

    #[tokio::test]
    async fn update_content_preserves_other_fields() {
        let store = store().await;
        let c = channel("c1");
        let mut item = new_item(&c, "before");
        item.title = Some("title".into());
        item.content_type = ContentType::Link;
        item.device_type = DeviceType::Tablet;
        let item = store.save(item).await.unwrap();
        store.toggle_favorite(&item.id, &c, Some(true)).await.unwrap();

        let updated = store
            .update(
                &item.id,
                &c,
                ItemPatch {
                    content: Some("after".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.content, "after");
        assert_eq!(updated.title.as_deref(), Some("title"));
        assert_eq!(updated.content_type, ContentType::Link);
        assert_eq!(updated.device_type, DeviceType::Tablet);
        assert_eq!(updated.device_id, item.device_id);
        assert!(updated.favorite);
        assert!(updated.updated_at >= item.updated_at);
        assert_eq!(updated.created_at, item.created_at);
    }

    #[tokio::test]
    async fn update_can_clear_title_but_not_content() {
        let store = store().await;
        let c = channel("c1");
        let mut item = new_item(&c, "body");
        item.title = Some("title".into());
        let item = store.save(item).await.unwrap();

        let cleared = store
            .update(
                &item.id,
                &c,
                ItemPatch {
                    title: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.title, None);
        assert_eq!(cleared.content, "body");

        let err = store
            .update(
                &item.id,
                &c,
                ItemPatch {
                    content: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn update_changes_origin_and_type() {
        let store = store().await;
        let c = channel("c1");
        let item = store.save(new_item(&c, "body")).await.unwrap();

        let updated = store
            .update(
                &item.id,
                &c,
                ItemPatch {
                    content_type: Some(ContentType::Password),
                    device_id: Some(DeviceId::parse("d2").unwrap()),
                    device_type: Some(DeviceType::Desktop),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.content_type, ContentType::Password);
        assert_eq!(updated.device_id.as_str(), "d2");
        assert_eq!(updated.device_type, DeviceType::Desktop);
    }

    #[tokio::test]
    async fn favorite_explicit_is_idempotent() {
        let store = store().await;
        let c = channel("c1");
        let item = store.save(new_item(&c, "x")).await.unwrap();

        assert!(store.toggle_favorite(&item.id, &c, Some(true)).await.unwrap().favorite);
        assert!(store.toggle_favorite(&item.id, &c, Some(true)).await.unwrap().favorite);
        assert!(!store.toggle_favorite(&item.id, &c, Some(false)).await.unwrap().favorite);
    }

    #[tokio::test]
    async fn favorite_toggle_flips_back() {
        let store = store().await;
        let c = channel("c1");
        let item = store.save(new_item(&c, "x")).await.unwrap();

        assert!(store.toggle_favorite(&item.id, &c, None).await.unwrap().favorite);
        assert!(!store.toggle_favorite(&item.id, &c, None).await.unwrap().favorite);
    }

    #[tokio::test]
    async fn delete_returns_removed_item() {
        let store = store().await;
        let c = channel("c1");
        let item = store.save(new_item(&c, "bye")).await.unwrap();

        let removed = store.delete(&item.id, &c).await.unwrap();

        assert_eq!(removed, item);
        assert!(store.get(&item.id, &c).await.unwrap_err().is_not_found());
        assert!(store.delete(&item.id, &c).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn counts_are_per_channel_and_type() {
        let store = store().await;
        let c = channel("c1");
        let mut link = new_item(&c, "https://example.com");
        link.content_type = ContentType::Link;
        store.save(link).await.unwrap();
        store.save(new_item(&c, "a")).await.unwrap();
        store.save(new_item(&channel("c2"), "b")).await.unwrap();

        assert_eq!(store.count(&c).await.unwrap(), 2);
        assert_eq!(store.count_by_type(ContentType::Link, &c).await.unwrap(), 1);
        assert_eq!(store.count_by_type(ContentType::Image, &c).await.unwrap(), 0);
    }
}
