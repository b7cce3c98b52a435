//! Product catalog handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::models::{ProductCreateRequest, ProductListParams, ProductUpdateRequest};
use super::state::ApiState;

pub async fn list_products(
    State(state): State<ApiState>,
    ApiQuery(params): ApiQuery<ProductListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let cancel = state.request_token();
    let page = state.catalog.list_products(params.into(), &cancel).await?;
    Ok(Json(page))
}

pub async fn get_product(
    State(state): State<ApiState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cancel = state.request_token();
    let product = state.catalog.get_product(id, &cancel).await?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<ApiState>,
    ApiJson(request): ApiJson<ProductCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cancel = state.request_token();
    let product = state
        .catalog
        .create_product(request.into(), &cancel)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<ApiState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ProductUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cancel = state.request_token();
    let product = state
        .catalog
        .update_product(request.into_command(id), &cancel)
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<ApiState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cancel = state.request_token();
    state.catalog.delete_product(id, &cancel).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_categories(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, ApiError> {
    let cancel = state.request_token();
    let categories = state.catalog.list_categories(&cancel).await?;
    Ok(Json(categories))
}
