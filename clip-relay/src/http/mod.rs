//! HTTP endpoints for cliplink-relay.
//!
//! Health and metrics at the root, the clipboard API under `/api`.

pub mod api;
pub mod health;
mod metrics;

use crate::sync::ClipSync;
use axum::{routing::get, Extension, Router};
use std::sync::Arc;

pub use api::{ApiError, CHANNEL_HEADER};
pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(sync: Arc<ClipSync>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api", api::routes());

    if sync.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router.layer(Extension(sync))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::Database;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    async fn test_sync(config: Config) -> Arc<ClipSync> {
        let db = Database::in_memory().await.unwrap();
        Arc::new(ClipSync::from_database(config, &db))
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = build_router(test_sync(Config::default()).await);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_ok() {
        let app = build_router(test_sync(Config::default()).await);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_can_be_disabled() {
        let mut config = Config::default();
        config.http.metrics_enabled = false;
        let app = build_router(test_sync(config).await);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
