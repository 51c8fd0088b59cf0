//! Entities owned by the storage components, plus pagination.

use cliplink_types::{ChannelId, ContentType, DeviceId, DeviceType, EntryId, ItemId, SyncAction};
use serde::Serialize;

/// Page size used when the caller does not pick one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on page sizes and list limits.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A channel: the tenancy boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    /// Channel id.
    pub id: ChannelId,
    /// Creation time (Unix ms).
    pub created_at: i64,
}

/// Outcome of channel creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Creation {
    /// A new channel was stored.
    Created(Channel),
    /// The id was already taken; this is the stored channel.
    Existing(Channel),
}

impl Creation {
    /// The channel, whichever way it was obtained.
    pub fn into_channel(self) -> Channel {
        match self {
            Creation::Created(channel) | Creation::Existing(channel) => channel,
        }
    }

    /// Whether the channel was created by this call.
    pub fn is_new(&self) -> bool {
        matches!(self, Creation::Created(_))
    }
}

/// A client device. Presence here is global, not per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// Device id.
    pub id: DeviceId,
    /// Human-readable name.
    pub name: String,
    /// Form factor.
    pub device_type: DeviceType,
    /// Last time the device was seen anywhere (Unix ms).
    pub last_seen_at: i64,
    /// Global online flag.
    pub is_online: bool,
    /// First registration (Unix ms).
    pub created_at: i64,
    /// Last modification (Unix ms).
    pub updated_at: i64,
}

/// A device's participation in one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
    /// Member device.
    pub device_id: DeviceId,
    /// Channel joined.
    pub channel_id: ChannelId,
    /// Channel-local presence.
    pub is_active: bool,
    /// When the device first joined (Unix ms).
    pub joined_at: i64,
    /// Last activity in this channel (Unix ms).
    pub last_seen_at: i64,
}

/// A membership joined with its device's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceView {
    /// Device id.
    pub id: DeviceId,
    /// Device name.
    pub name: String,
    /// Form factor.
    pub device_type: DeviceType,
    /// Channel of the membership.
    pub channel_id: ChannelId,
    /// Global online flag.
    pub is_online: bool,
    /// Channel-local presence.
    pub is_active: bool,
    /// Last time the device was seen anywhere (Unix ms).
    pub last_seen_at: i64,
    /// Last activity in this channel (Unix ms).
    pub last_seen_in_channel: i64,
    /// When the device joined this channel (Unix ms).
    pub joined_at: i64,
    /// First registration of the device (Unix ms).
    pub created_at: i64,
}

/// A piece of synchronized clipboard content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipboardItem {
    /// Item id.
    pub id: ItemId,
    /// Owning channel.
    pub channel_id: ChannelId,
    /// Optional title.
    pub title: Option<String>,
    /// Payload.
    pub content: String,
    /// Kind of payload.
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Device that pushed it.
    pub device_id: DeviceId,
    /// Form factor of that device.
    pub device_type: DeviceType,
    /// Pinned by some device.
    pub favorite: bool,
    /// Creation time (Unix ms).
    pub created_at: i64,
    /// Last modification (Unix ms).
    pub updated_at: i64,
}

/// Fields of an item to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    /// Owning channel.
    pub channel_id: ChannelId,
    /// Optional title.
    pub title: Option<String>,
    /// Payload; must not be empty.
    pub content: String,
    /// Kind of payload.
    pub content_type: ContentType,
    /// Device pushing the item.
    pub device_id: DeviceId,
    /// Form factor of that device.
    pub device_type: DeviceType,
}

/// Partial update of an item. `None` leaves the field unchanged.
///
/// `title: Some(String::new())` clears the title; an empty content is
/// rejected since content is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    /// New title.
    pub title: Option<String>,
    /// New content.
    pub content: Option<String>,
    /// New content type.
    pub content_type: Option<ContentType>,
    /// New origin device.
    pub device_id: Option<DeviceId>,
    /// New origin device type.
    pub device_type: Option<DeviceType>,
}

impl ItemPatch {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.content_type.is_none()
            && self.device_id.is_none()
            && self.device_type.is_none()
    }
}

/// One append-only sync ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEntry {
    /// Ordinal; total order within a channel.
    pub id: EntryId,
    /// Channel the action happened in.
    pub channel_id: ChannelId,
    /// Acting device.
    pub device_id: DeviceId,
    /// What happened.
    pub action: SyncAction,
    /// Human-readable summary, not the payload.
    pub content: String,
    /// Time of the action (Unix ms).
    pub created_at: i64,
}

/// A validated, 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// Clamp with the default limits.
    pub fn new(page: u32, size: u32) -> Self {
        Self::with_limits(page, size, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// Clamp: page 0 becomes 1, size 0 becomes `default_size`, sizes above
    /// `max_size` become `max_size`.
    pub fn with_limits(page: u32, size: u32, default_size: u32, max_size: u32) -> Self {
        let max_size = max_size.max(1);
        let size = if size == 0 { default_size } else { size };
        Self {
            page: page.max(1),
            size: size.clamp(1, max_size),
        }
    }

    /// 1-indexed page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Page size.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Rows to skip.
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.size as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Rows across all pages.
    pub total: u64,
    /// 1-indexed page number.
    pub page: u32,
    /// Page size.
    pub size: u32,
    /// `ceil(total / size)`.
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Assemble a page from its rows and the unpaginated total.
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let size = request.size() as u64;
        Self {
            items,
            total,
            page: request.page(),
            size: request.size(),
            total_pages: total.div_ceil(size) as u32,
        }
    }

    /// A page with nothing on it.
    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }
}
