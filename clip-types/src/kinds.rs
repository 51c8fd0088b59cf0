//! Closed-set kinds: content type, device type and ledger action.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of clipboard payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Plain text.
    #[default]
    Text,
    /// URL.
    Link,
    /// Source code snippet.
    Code,
    /// Secret; stored as-is, masking is a client concern.
    Password,
    /// Image (data URL or reference).
    Image,
    /// File (reference).
    File,
}

impl ContentType {
    /// Every content type, in display order.
    pub const ALL: [ContentType; 6] = [
        ContentType::Text,
        ContentType::Link,
        ContentType::Code,
        ContentType::Password,
        ContentType::Image,
        ContentType::File,
    ];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Link => "link",
            ContentType::Code => "code",
            ContentType::Password => "password",
            ContentType::Image => "image",
            ContentType::File => "file",
        }
    }

    /// Parse leniently: anything unrecognized becomes [`ContentType::Text`].
    pub fn coerce(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for ContentType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| TypesError::UnknownKind {
                kind: "content type",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form factor of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Phone.
    Phone,
    /// Tablet.
    Tablet,
    /// Desktop or laptop.
    Desktop,
    /// Anything else.
    #[default]
    Other,
}

impl DeviceType {
    /// Every device type.
    pub const ALL: [DeviceType; 4] = [
        DeviceType::Phone,
        DeviceType::Tablet,
        DeviceType::Desktop,
        DeviceType::Other,
    ];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Phone => "phone",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
            DeviceType::Other => "other",
        }
    }

    /// Parse leniently: anything unrecognized becomes [`DeviceType::Other`].
    pub fn coerce(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for DeviceType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| TypesError::UnknownKind {
                kind: "device type",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action recorded in the sync ledger.
///
/// The ledger is advisory, so labels outside the known set are kept verbatim
/// in [`SyncAction::Other`] rather than rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncAction {
    /// Content was synced to a device.
    Sync,
    /// Device joined a channel.
    Connect,
    /// Device left a channel.
    Disconnect,
    /// Item was edited.
    Update,
    /// Item was deleted.
    Delete,
    /// Item was marked favorite.
    Favorite,
    /// Item was unmarked favorite.
    Unfavorite,
    /// Free-form label.
    Other(String),
}

impl SyncAction {
    /// Label as stored.
    pub fn as_str(&self) -> &str {
        match self {
            SyncAction::Sync => "sync",
            SyncAction::Connect => "connect",
            SyncAction::Disconnect => "disconnect",
            SyncAction::Update => "update",
            SyncAction::Delete => "delete",
            SyncAction::Favorite => "favorite",
            SyncAction::Unfavorite => "unfavorite",
            SyncAction::Other(label) => label,
        }
    }

    /// The favorite or unfavorite action for the given new state.
    pub fn for_favorite(favorite: bool) -> Self {
        if favorite {
            SyncAction::Favorite
        } else {
            SyncAction::Unfavorite
        }
    }
}

impl From<String> for SyncAction {
    fn from(label: String) -> Self {
        match label.as_str() {
            "sync" => SyncAction::Sync,
            "connect" => SyncAction::Connect,
            "disconnect" => SyncAction::Disconnect,
            "update" => SyncAction::Update,
            "delete" => SyncAction::Delete,
            "favorite" => SyncAction::Favorite,
            "unfavorite" => SyncAction::Unfavorite,
            _ => SyncAction::Other(label),
        }
    }
}

impl From<SyncAction> for String {
    fn from(action: SyncAction) -> Self {
        match action {
            SyncAction::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
