//! JSON API over [`ClipSync`].
//!
//! # Route Structure
//!
//! ## Unscoped
//! - `POST /api/channel` - Create a channel (`201`) or return an existing one (`200`)
//! - `POST /api/channel/verify` - Check that a channel id exists
//! - `GET /api/channels/:channel_id` - Fetch a channel
//!
//! ## Scoped by the `X-Channel-ID` header
//! - `GET /api/stats` - Channel statistics
//! - `POST|GET /api/clipboard` - Save an item / newest items
//! - `GET /api/clipboard/{current,history,favorites,search,filter}`
//! - `GET /api/clipboard/type/:type`, `GET /api/clipboard/device/:device_type`
//! - `GET|PUT|DELETE /api/clipboard/:item_id`, `PUT /api/clipboard/:item_id/favorite`
//! - `POST|GET /api/devices`, `GET|DELETE /api/devices/:device_id`
//! - `PUT /api/devices/:device_id/{status,name}`, `POST /api/devices/:device_id/leave`
//!
//! Device deletion only ends the membership in the header's channel; the
//! device record and its other memberships are untouched.
//! - `GET /api/sync/history`, `POST /api/sync/log`

use crate::channels::ChannelStats;
use crate::error::SyncError;
use crate::model::{Channel, ClipboardItem, Device, DeviceView, ItemPatch, Page, SyncEntry};
use crate::sync::{ClipSync, ItemDraft};
use axum::extract::{Path, Query, Request};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use cliplink_types::{ChannelId, ContentType, DeviceId, DeviceType, ItemId, TypesError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Header carrying the channel id on scoped routes.
pub const CHANNEL_HEADER: &str = "x-channel-id";

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Scoped route called without a channel header.
    #[error("missing X-Channel-ID header")]
    MissingChannel,

    /// Channel header names no stored channel.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// Error from the synchronization core.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<TypesError> for ApiError {
    fn from(err: TypesError) -> Self {
        ApiError::Sync(err.into())
    }
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error, message) = match &self {
            Self::MissingChannel => (StatusCode::BAD_REQUEST, "missing_channel", Some(message)),
            Self::UnknownChannel(_) => (StatusCode::NOT_FOUND, "unknown_channel", Some(message)),
            Self::Sync(SyncError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found", Some(message))
            }
            Self::Sync(SyncError::InvalidInput { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_input", Some(message))
            }
            Self::Sync(SyncError::AlreadyExists { .. }) => {
                (StatusCode::CONFLICT, "already_exists", Some(message))
            }
            Self::Sync(SyncError::Storage(err)) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_unavailable",
                    Some("A storage error occurred".to_string()),
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the `/api` router.
pub fn routes() -> Router {
    let scoped = Router::new()
        .route("/stats", get(channel_stats))
        .route("/clipboard", post(save_item).get(latest))
        .route("/clipboard/current", get(current))
        .route("/clipboard/history", get(history))
        .route("/clipboard/favorites", get(favorites))
        .route("/clipboard/search", get(search))
        .route("/clipboard/filter", get(filtered))
        .route("/clipboard/type/:content_type", get(by_type))
        .route("/clipboard/device/:device_type", get(by_device_type))
        .route(
            "/clipboard/:item_id",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/clipboard/:item_id/favorite", put(toggle_favorite))
        .route("/devices", post(register_device).get(list_devices))
        .route("/devices/:device_id", get(get_device).delete(leave_channel))
        .route("/devices/:device_id/status", put(set_status))
        .route("/devices/:device_id/name", put(rename_device))
        .route("/devices/:device_id/leave", post(leave_channel))
        .route("/sync/history", get(sync_history))
        .route("/sync/log", post(log_sync))
        .route_layer(middleware::from_fn(require_channel));

    Router::new()
        .route("/channel", post(create_channel))
        .route("/channel/verify", post(verify_channel))
        .route("/channels/:channel_id", get(get_channel))
        .merge(scoped)
}

/// Resolve `X-Channel-ID` into a [`ChannelId`] request extension.
///
/// Missing header is `400`, unknown channel is `404`.
async fn require_channel(
    Extension(sync): Extension<Arc<ClipSync>>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let raw = request
        .headers()
        .get(CHANNEL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .unwrap_or_default();

    if raw.is_empty() {
        tracing::debug!("missing channel header");
        return Err(ApiError::MissingChannel);
    }
    if !sync.channel_exists(&raw).await? {
        tracing::debug!(channel_id = %raw, "unknown channel");
        return Err(ApiError::UnknownChannel(raw));
    }

    let channel = ChannelId::parse(&raw)?;
    request.extensions_mut().insert(channel);
    Ok(next.run(request).await)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ---- query strings ----

#[derive(Debug, Default, Deserialize)]
struct LatestQuery {
    #[serde(default)]
    limit: u32,
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    size: u32,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    keyword: String,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    size: u32,
}

#[derive(Debug, Default, Deserialize)]
struct FilterQuery {
    #[serde(default, rename = "type")]
    content_type: Option<String>,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    size: u32,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    limit: u32,
    #[serde(default)]
    offset: u64,
}

// ---- bodies ----

#[derive(Debug, Default, Deserialize)]
struct CreateChannelRequest {
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChannelCreated {
    #[serde(flatten)]
    channel: Channel,
    created: bool,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    channel_id: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    valid: bool,
}

#[derive(Debug, Deserialize)]
struct RegisterDeviceRequest {
    name: String,
    #[serde(default)]
    device_type: String,
    #[serde(default)]
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    is_online: bool,
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    name: String,
    #[serde(default)]
    device_type: Option<String>,
}

/// Partial update; empty strings mean "leave unchanged".
#[derive(Debug, Default, Deserialize)]
struct UpdateItemRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, rename = "type")]
    content_type: Option<String>,
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    is_favorite: Option<bool>,
}

impl UpdateItemRequest {
    fn into_patch(self) -> ApiResult<ItemPatch> {
        Ok(ItemPatch {
            title: non_empty(self.title),
            content: non_empty(self.content),
            content_type: non_empty(self.content_type).map(|raw| ContentType::coerce(&raw)),
            device_id: non_empty(self.device_id)
                .map(|raw| DeviceId::parse(&raw))
                .transpose()?,
            device_type: non_empty(self.device_type).map(|raw| DeviceType::coerce(&raw)),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct FavoriteRequest {
    #[serde(default)]
    is_favorite: Option<bool>,
    #[serde(default)]
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogSyncRequest {
    device_id: String,
    #[serde(default)]
    content: String,
}

fn optional_device(raw: Option<String>) -> ApiResult<Option<DeviceId>> {
    Ok(non_empty(raw)
        .map(|raw| DeviceId::parse(&raw))
        .transpose()?)
}

// ---- channels ----

async fn create_channel(
    Extension(sync): Extension<Arc<ClipSync>>,
    body: Option<Json<CreateChannelRequest>>,
) -> ApiResult<(StatusCode, Json<ChannelCreated>)> {
    let requested = body.and_then(|Json(body)| body.channel_id);
    let creation = sync.create_channel(requested.as_deref()).await?;

    let created = creation.is_new();
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ChannelCreated {
            channel: creation.into_channel(),
            created,
        }),
    ))
}

async fn verify_channel(
    Extension(sync): Extension<Arc<ClipSync>>,
    Json(body): Json<VerifyRequest>,
) -> ApiResult<Json<VerifyResponse>> {
    let valid = sync.channel_exists(&body.channel_id).await?;
    Ok(Json(VerifyResponse { valid }))
}

async fn get_channel(
    Extension(sync): Extension<Arc<ClipSync>>,
    Path(channel_id): Path<String>,
) -> ApiResult<Json<Channel>> {
    let channel = ChannelId::parse(&channel_id)?;
    Ok(Json(sync.get_channel(&channel).await?))
}

async fn channel_stats(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
) -> ApiResult<Json<ChannelStats>> {
    Ok(Json(sync.channel_stats(&channel).await?))
}

// ---- clipboard ----

async fn save_item(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Json(draft): Json<ItemDraft>,
) -> ApiResult<(StatusCode, Json<ClipboardItem>)> {
    let item = sync.save_item(&channel, draft).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn latest(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Json<Vec<ClipboardItem>>> {
    Ok(Json(sync.latest(&channel, query.limit).await?))
}

async fn current(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
) -> ApiResult<Json<Option<ClipboardItem>>> {
    Ok(Json(sync.current(&channel).await?))
}

async fn history(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<ClipboardItem>>> {
    Ok(Json(sync.history(&channel, query.page, query.size).await?))
}

async fn favorites(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<ClipboardItem>>> {
    Ok(Json(sync.favorites(&channel, query.page, query.size).await?))
}

async fn search(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Page<ClipboardItem>>> {
    let page = sync
        .search(&channel, &query.keyword, query.page, query.size)
        .await?;
    Ok(Json(page))
}

async fn filtered(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Query(query): Query<FilterQuery>,
) -> ApiResult<Json<Page<ClipboardItem>>> {
    let page = sync
        .filtered(
            &channel,
            query.content_type.as_deref(),
            query.device_type.as_deref(),
            query.page,
            query.size,
        )
        .await?;
    Ok(Json(page))
}

async fn by_type(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Path(content_type): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<ClipboardItem>>> {
    let page = sync
        .by_type(&channel, &content_type, query.page, query.size)
        .await?;
    Ok(Json(page))
}

async fn by_device_type(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Path(device_type): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<ClipboardItem>>> {
    let page = sync
        .by_device_type(&channel, &device_type, query.page, query.size)
        .await?;
    Ok(Json(page))
}

async fn get_item(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Path(item_id): Path<String>,
) -> ApiResult<Json<ClipboardItem>> {
    let id = ItemId::parse(&item_id)?;
    Ok(Json(sync.get_item(&channel, &id).await?))
}

async fn update_item(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Path(item_id): Path<String>,
    Json(body): Json<UpdateItemRequest>,
) -> ApiResult<Json<ClipboardItem>> {
    let id = ItemId::parse(&item_id)?;
    let favorite = body.is_favorite;
    let device = optional_device(body.device_id.clone())?;

    let mut item = sync.update_item(&channel, &id, body.into_patch()?).await?;
    if let Some(explicit) = favorite {
        item = sync
            .toggle_favorite(&channel, &id, Some(explicit), device.as_ref())
            .await?;
    }
    Ok(Json(item))
}

async fn delete_item(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Path(item_id): Path<String>,
) -> ApiResult<Json<ClipboardItem>> {
    let id = ItemId::parse(&item_id)?;
    Ok(Json(sync.delete_item(&channel, &id).await?))
}

async fn toggle_favorite(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Path(item_id): Path<String>,
    body: Option<Json<FavoriteRequest>>,
) -> ApiResult<Json<ClipboardItem>> {
    let id = ItemId::parse(&item_id)?;
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let device = optional_device(body.device_id)?;

    let item = sync
        .toggle_favorite(&channel, &id, body.is_favorite, device.as_ref())
        .await?;
    Ok(Json(item))
}

// ---- devices ----

async fn register_device(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Json(body): Json<RegisterDeviceRequest>,
) -> ApiResult<(StatusCode, Json<DeviceView>)> {
    let view = sync
        .join_channel(
            &channel,
            &body.name,
            &body.device_type,
            body.device_id.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_devices(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
) -> ApiResult<Json<Vec<DeviceView>>> {
    Ok(Json(sync.list_devices(&channel).await?))
}

async fn get_device(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<DeviceView>> {
    let device = DeviceId::parse(&device_id)?;
    Ok(Json(sync.get_device(&channel, &device).await?))
}

async fn set_status(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Path(device_id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<Json<Device>> {
    let device = DeviceId::parse(&device_id)?;
    Ok(Json(
        sync.set_presence(&channel, &device, body.is_online).await?,
    ))
}

/// Only members of the header's channel can be renamed through it.
async fn rename_device(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Path(device_id): Path<String>,
    Json(body): Json<RenameRequest>,
) -> ApiResult<Json<Device>> {
    let device = DeviceId::parse(&device_id)?;
    sync.get_device(&channel, &device).await?;
    let renamed = sync
        .rename_device(&device, &body.name, body.device_type.as_deref())
        .await?;
    Ok(Json(renamed))
}

async fn leave_channel(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Path(device_id): Path<String>,
) -> ApiResult<StatusCode> {
    let device = DeviceId::parse(&device_id)?;
    sync.leave_channel(&channel, &device).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- sync ledger ----

async fn sync_history(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<SyncEntry>>> {
    let entries = sync
        .sync_history(&channel, query.limit, query.offset)
        .await?;
    Ok(Json(entries))
}

async fn log_sync(
    Extension(sync): Extension<Arc<ClipSync>>,
    Extension(channel): Extension<ChannelId>,
    Json(body): Json<LogSyncRequest>,
) -> ApiResult<(StatusCode, Json<SyncEntry>)> {
    let device = DeviceId::parse(&body.device_id)?;
    let entry = sync.log_sync(&channel, &device, &body.content).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
