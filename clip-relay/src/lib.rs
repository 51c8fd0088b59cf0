//! # cliplink-relay
//!
//! Multi-tenant clipboard synchronization server.
//!
//! Devices that share a channel id share a clipboard. This crate stores:
//! - Channels, the tenancy boundary
//! - Devices and their channel memberships
//! - Clipboard items, scoped to one channel each
//! - An append-only sync ledger per channel
//!
//! ## Architecture
//!
//! ```text
//!   HTTP (axum, X-Channel-ID)
//!             │
//!     ┌───────┴────────┐
//!     │    ClipSync    │  validation, coercion, ledger side effects
//!     └───────┬────────┘
//!   ┌─────────┼──────────┬───────────┐
//! Channels  Devices  Clipboard    Ledger
//!   └─────────┴────┬─────┴───────────┘
//!           SQLite (sqlx)
//! ```
//!
//! Every channel-scoped read and write takes the channel id and filters by it,
//! so no item, membership or ledger entry ever crosses channels.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channels;
pub mod clipboard;
pub mod config;
pub mod devices;
pub mod error;
pub mod http;
pub mod ledger;
pub mod model;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use error::{SyncError, SyncResult};
pub use storage::Database;
pub use sync::{ClipSync, Components, ItemDraft};
