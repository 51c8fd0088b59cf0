//! # cliplink-types
//!
//! Shared types for the cliplink channel clipboard.
//!
//! - [`ChannelId`], [`DeviceId`], [`ItemId`], [`EntryId`] - identity and ordering types
//! - [`ContentType`], [`DeviceType`], [`SyncAction`] - closed-set kinds
//! - [`TypesError`] - validation errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod kinds;

pub use error::TypesError;
pub use ids::{ChannelId, DeviceId, EntryId, ItemId};
pub use kinds::{ContentType, DeviceType, SyncAction};
