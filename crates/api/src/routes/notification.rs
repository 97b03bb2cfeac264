use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::oid::ObjectId;
use qrmenu_services::dao::base::{PaginatedResult, PaginationParams};
use qrmenu_services::notification::NotificationView;
use serde::Deserialize;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

fn parse_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw)
        .map_err(|_| ApiError::BadRequest("Invalid notification_id".to_string()))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedResult<NotificationView>>, ApiError> {
    let params = PaginationParams::new(
        query.page.unwrap_or(1),
        query
            .per_page
            .unwrap_or(state.settings.notifications.default_page_size),
    );

    let page = state.notifications.list(auth.user_id, &params).await?;
    Ok(Json(page.map(NotificationView::from)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.notifications.unread_count(auth.user_id).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let nid = parse_id(&notification_id)?;
    state.notifications.mark_read(auth.user_id, nid).await?;
    Ok(Json(serde_json::json!({ "id": notification_id, "is_read": true })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let modified = state.notifications.mark_all_read(auth.user_id).await?;
    Ok(Json(serde_json::json!({ "modified": modified })))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let nid = parse_id(&notification_id)?;
    state.notifications.delete(auth.user_id, nid).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
