//! Composable predicates for clipboard item queries.
//!
//! Every value reaches SQLite as a bound parameter; only fixed SQL fragments
//! are pushed as text.

use cliplink_types::{ChannelId, ContentType, DeviceType};
use sqlx::{QueryBuilder, Sqlite};

/// A single predicate on clipboard items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Exact content type.
    ContentType(ContentType),
    /// Exact device type of the origin device.
    DeviceType(DeviceType),
    /// Favorite flag.
    Favorite(bool),
    /// Substring of title or content. Case folding is ASCII-only, as with
    /// SQLite `LIKE`.
    Keyword(String),
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemOrder {
    /// Newest first by creation time.
    #[default]
    Newest,
    /// Most recently modified first.
    RecentlyUpdated,
    /// Title keyword matches first, then newest. Same as `Newest` without a
    /// keyword condition.
    Relevance,
}

/// Channel-scoped filter over clipboard items.
///
/// The channel condition is implicit and always applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFilter {
    channel: ChannelId,
    conditions: Vec<Condition>,
}

impl ItemFilter {
    /// Every item of `channel`.
    pub fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            conditions: Vec::new(),
        }
    }

    /// Add an arbitrary condition.
    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Restrict to one content type.
    pub fn content_type(self, content_type: ContentType) -> Self {
        self.with(Condition::ContentType(content_type))
    }

    /// Restrict to one origin device type.
    pub fn device_type(self, device_type: DeviceType) -> Self {
        self.with(Condition::DeviceType(device_type))
    }

    /// Restrict by favorite flag.
    pub fn favorite(self, favorite: bool) -> Self {
        self.with(Condition::Favorite(favorite))
    }

    /// Restrict to items whose title or content contains `keyword`.
    pub fn keyword(self, keyword: impl Into<String>) -> Self {
        self.with(Condition::Keyword(keyword.into()))
    }

    /// The channel every result belongs to.
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Conditions beyond the channel.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// A blank keyword never matches anything.
    pub(crate) fn matches_nothing(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| matches!(c, Condition::Keyword(k) if k.trim().is_empty()))
    }

    fn first_keyword(&self) -> Option<&str> {
        self.conditions.iter().find_map(|c| match c {
            Condition::Keyword(k) => Some(k.as_str()),
            _ => None,
        })
    }

    /// Append the `WHERE` clause.
    pub(crate) fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE channel_id = ");
        qb.push_bind(self.channel.to_string());

        for condition in &self.conditions {
            match condition {
                Condition::ContentType(content_type) => {
                    qb.push(" AND content_type = ");
                    qb.push_bind(content_type.as_str().to_string());
                }
                Condition::DeviceType(device_type) => {
                    qb.push(" AND device_type = ");
                    qb.push_bind(device_type.as_str().to_string());
                }
                Condition::Favorite(favorite) => {
                    qb.push(" AND favorite = ");
                    qb.push_bind(*favorite);
                }
                Condition::Keyword(keyword) => {
                    let pattern = like_pattern(keyword.trim());
                    qb.push(" AND (title LIKE ");
                    qb.push_bind(pattern.clone());
                    qb.push(r" ESCAPE '\' OR content LIKE ");
                    qb.push_bind(pattern);
                    qb.push(r" ESCAPE '\')");
                }
            }
        }
    }

    /// Append the `ORDER BY` clause.
    pub(crate) fn push_order(&self, order: ItemOrder, qb: &mut QueryBuilder<'_, Sqlite>) {
        match (order, self.first_keyword()) {
            (ItemOrder::Relevance, Some(keyword)) => {
                qb.push(" ORDER BY CASE WHEN title LIKE ");
                qb.push_bind(like_pattern(keyword.trim()));
                qb.push(r" ESCAPE '\' THEN 0 ELSE 1 END, created_at DESC, rowid DESC");
            }
            (ItemOrder::RecentlyUpdated, _) => {
                qb.push(" ORDER BY updated_at DESC, rowid DESC");
            }
            _ => {
                qb.push(" ORDER BY created_at DESC, rowid DESC");
            }
        }
    }
}

/// `%keyword%` with LIKE wildcards in the keyword escaped by `\`.
pub(crate) fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for ch in keyword.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ChannelId {
        ChannelId::parse("c1").unwrap()
    }

    #[test]
    fn channel_only_filter() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM clipboard_items");
        ItemFilter::new(channel()).push_where(&mut qb);
        assert!(qb.sql().contains("WHERE channel_id = ?"));
        assert!(!qb.sql().contains("AND"));
    }

    #[test]
    fn conditions_are_anded_with_placeholders() {
        let filter = ItemFilter::new(channel())
            .content_type(ContentType::Code)
            .device_type(DeviceType::Phone)
            .favorite(true);

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM clipboard_items");
        filter.push_where(&mut qb);
        let sql = qb.sql();

        assert!(sql.contains("content_type = ?"));
        assert!(sql.contains("device_type = ?"));
        assert!(sql.contains("favorite = ?"));
        assert_eq!(sql.matches(" AND ").count(), 3);
        assert!(!sql.contains("code"));
        assert!(!sql.contains("phone"));
    }

    #[test]
    fn keyword_never_reaches_sql_text() {
        let filter = ItemFilter::new(channel()).keyword("'; DROP TABLE channels; --");
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM clipboard_items");
        filter.push_where(&mut qb);
        assert!(!qb.sql().contains("DROP"));
        assert!(qb.sql().contains("title LIKE ?"));
        assert!(qb.sql().contains("content LIKE ?"));
    }

    #[test]
    fn relevance_order_needs_keyword() {
        let mut qb = QueryBuilder::<Sqlite>::new("");
        ItemFilter::new(channel()).push_order(ItemOrder::Relevance, &mut qb);
        assert_eq!(qb.sql(), " ORDER BY created_at DESC, rowid DESC");

        let mut qb = QueryBuilder::<Sqlite>::new("");
        ItemFilter::new(channel())
            .keyword("x")
            .push_order(ItemOrder::Relevance, &mut qb);
        assert!(qb.sql().starts_with(" ORDER BY CASE WHEN title LIKE ?"));

        let mut qb = QueryBuilder::<Sqlite>::new("");
        ItemFilter::new(channel()).push_order(ItemOrder::RecentlyUpdated, &mut qb);
        assert_eq!(qb.sql(), " ORDER BY updated_at DESC, rowid DESC");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
        assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
    }

    #[test]
    fn blank_keyword_matches_nothing() {
        assert!(ItemFilter::new(channel()).keyword("  ").matches_nothing());
        assert!(!ItemFilter::new(channel()).keyword("x").matches_nothing());
        assert!(!ItemFilter::new(channel()).matches_nothing());
    }
}
