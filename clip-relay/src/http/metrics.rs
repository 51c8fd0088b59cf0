//! Prometheus metrics endpoint.

use crate::sync::ClipSync;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Counters are monotonic since startup; the channel gauge is read from
/// storage on each scrape.
pub async fn metrics_handler(Extension(sync): Extension<Arc<ClipSync>>) -> impl IntoResponse {
    let m = sync.metrics();

    let channels_created = m.channels_created.load(Ordering::Relaxed);
    let devices_joined = m.devices_joined.load(Ordering::Relaxed);
    let items_saved = m.items_saved.load(Ordering::Relaxed);
    let items_updated = m.items_updated.load(Ordering::Relaxed);
    let items_deleted = m.items_deleted.load(Ordering::Relaxed);
    let favorites = m.favorites_toggled.load(Ordering::Relaxed);
    let ledger_failures = m.ledger_failures.load(Ordering::Relaxed);

    // Best effort
    let channels = sync.channel_count().await.unwrap_or(0);

    let body = render(&[
        ("cliplink_channels", "gauge", "Number of channels in storage", channels),
        ("cliplink_channels_created_total", "counter", "Channels created", channels_created),
        ("cliplink_devices_joined_total", "counter", "Device joins, including rejoins", devices_joined),
        ("cliplink_items_saved_total", "counter", "Clipboard items saved", items_saved),
        ("cliplink_items_updated_total", "counter", "Clipboard items updated", items_updated),
        ("cliplink_items_deleted_total", "counter", "Clipboard items deleted", items_deleted),
        ("cliplink_favorites_toggled_total", "counter", "Favorite flag changes", favorites),
        ("cliplink_ledger_failures_total", "counter", "Sync ledger appends dropped after a storage error", ledger_failures),
    ]);

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

fn render(series: &[(&str, &str, &str, u64)]) -> String {
    let mut body = format!(
        "# HELP cliplink_info Server information\n# TYPE cliplink_info gauge\ncliplink_info{{version=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION")
    );
    for (name, kind, help, value) in series {
        body.push_str(&format!(
            "\n# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {value}\n"
        ));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_emits_help_type_and_value() {
        let body = render(&[("cliplink_items_saved_total", "counter", "Items", 42)]);

        assert!(body.contains("cliplink_info{version="));
        assert!(body.contains("# HELP cliplink_items_saved_total Items\n"));
        assert!(body.contains("# TYPE cliplink_items_saved_total counter\n"));
        assert!(body.contains("\ncliplink_items_saved_total 42\n"));
    }
}
