use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{CreateItemRequest, ItemListQuery, ItemResponse, UpdateItemRequest};
use super::services;
use crate::error::ApiError;
use crate::extractors::{JsonBody, QueryParams};
use crate::pagination::Page;
use crate::request_id::XRequestId;
use crate::state::AppState;

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    rid: XRequestId,
    QueryParams(q): QueryParams<ItemListQuery>,
) -> Result<Json<Page<ItemResponse>>, ApiError> {
    let page = services::list(&state.db, q.owner(), q.page.to_request())
        .await
        .map_err(|e| rid.reject(e))?;
    Ok(Json(page.map(ItemResponse::from)))
}

#[instrument(skip(state, body))]
pub async fn create_item(
    State(state): State<AppState>,
    rid: XRequestId,
    JsonBody(body): JsonBody<CreateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = body.validate().map_err(|e| rid.reject(e))?;
    let item = services::create(&state.db, input)
        .await
        .map_err(|e| rid.reject(e))?;

    let location = format!("/api/items/{}", item.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ItemResponse::from(item)),
    ))
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    rid: XRequestId,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item = services::get(&state.db, &id)
        .await
        .map_err(|e| rid.reject(e))?;
    Ok(Json(item.into()))
}

#[instrument(skip(state, body))]
pub async fn update_item(
    State(state): State<AppState>,
    rid: XRequestId,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let input = body.validate().map_err(|e| rid.reject(e))?;
    let item = services::update(&state.db, &id, input)
        .await
        .map_err(|e| rid.reject(e))?;
    Ok(Json(item.into()))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    rid: XRequestId,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    services::delete(&state.db, &id)
        .await
        .map_err(|e| rid.reject(e))?;
    Ok(StatusCode::NO_CONTENT)
}
