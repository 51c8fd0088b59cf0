//! `/health`: liveness plus a storage round trip.

use crate::sync::ClipSync;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

static STARTED: OnceLock<Instant> = OnceLock::new();

/// Record process start; later calls are no-ops.
pub fn init_start_time() {
    STARTED.get_or_init(Instant::now);
}

fn uptime_seconds() -> u64 {
    STARTED.get().map_or(0, |start| start.elapsed().as_secs())
}

/// Coarse service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// Storage answered.
    Ok,
    /// The process is up but storage could not be queried.
    Degraded,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Service state.
    pub status: Health,
    /// Crate version.
    pub version: &'static str,
    /// Whether the channel count query succeeded.
    pub storage_reachable: bool,
    /// Stored channels, 0 when storage is unreachable.
    pub channels: u64,
    /// Items saved since start.
    pub items_saved: u64,
    /// Seconds since [`init_start_time`].
    pub uptime_seconds: u64,
}

/// Health check handler. Always answers 200; inspect `status`.
pub async fn health_handler(Extension(sync): Extension<Arc<ClipSync>>) -> Json<HealthStatus> {
    let count = sync.channel_count().await;
    if let Err(err) = &count {
        tracing::warn!(error = %err, "health check could not reach storage");
    }

    Json(HealthStatus {
        status: if count.is_ok() { Health::Ok } else { Health::Degraded },
        version: env!("CARGO_PKG_VERSION"),
        storage_reachable: count.is_ok(),
        channels: count.unwrap_or(0),
        items_saved: sync.metrics().items_saved.load(Ordering::Relaxed),
        uptime_seconds: uptime_seconds(),
    })
}
