//! Identity and ordering types for cliplink.

use crate::error::TypesError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn check_len(kind: &'static str, value: &str, max: usize) -> Result<(), TypesError> {
    if value.is_empty() {
        return Err(TypesError::EmptyId { kind });
    }
    let len = value.chars().count();
    if len > max {
        return Err(TypesError::IdTooLong { kind, len, max });
    }
    Ok(())
}

/// Identifier of a channel, the tenancy boundary.
///
/// Either supplied by the caller or generated from 32 bytes of OS entropy
/// and rendered as URL-safe base64. Never empty.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    /// Maximum length of a channel id, in characters.
    pub const MAX_LEN: usize = 64;

    /// Generate a fresh random channel id.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Validate a caller-supplied channel id.
    pub fn parse(value: &str) -> Result<Self, TypesError> {
        check_len("channel", value, Self::MAX_LEN)?;
        Ok(Self(value.to_string()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ChannelId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        check_len("channel", &value, Self::MAX_LEN)?;
        Ok(Self(value))
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.0.chars().take(8).collect();
        write!(f, "ChannelId({short})")
    }
}

/// Identifier of a device.
///
/// Caller-supplied and stable across sessions; the same device id may be a
/// member of several channels at once.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Maximum length of a device id, in characters.
    pub const MAX_LEN: usize = 128;

    /// Generate a new device id (UUID v4 string).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Validate a caller-supplied device id.
    pub fn parse(value: &str) -> Result<Self, TypesError> {
        check_len("device", value, Self::MAX_LEN)?;
        Ok(Self(value.to_string()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        check_len("device", &value, Self::MAX_LEN)?;
        Ok(Self(value))
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

/// Identifier of a clipboard item.
///
/// UUID v4, generated by the store on save.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(uuid::Uuid);

impl ItemId {
    /// Create a new random ItemId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse the hyphenated string form.
    pub fn parse(value: &str) -> Result<Self, TypesError> {
        uuid::Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| TypesError::MalformedId {
                kind: "clipboard item",
                value: value.to_string(),
            })
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ItemId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

/// Ordinal of a sync ledger entry.
///
/// Assigned by the store on append. Entries of one channel are totally
/// ordered by this value; there is no cross-channel ordering guarantee.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    /// Create an EntryId with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}
