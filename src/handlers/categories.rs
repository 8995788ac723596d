use super::common::{created_response, no_content_response, success_response};
use crate::{
    entities::category,
    errors::ServiceError,
    services::catalog::{CategoryInput, CategorySummary},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

/// List categories with their product counts
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "Categories listed", body = crate::ApiResponse<Vec<CategorySummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(success_response(categories))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category fetched", body = crate::ApiResponse<category::Model>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let found = state.services.catalog.get_category(id).await?;
    Ok(success_response(found))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = crate::ApiResponse<category::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.catalog.create_category(payload).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryInput,
    responses(
        (status = 200, description = "Category updated", body = crate::ApiResponse<category::Model>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.services.catalog.update_category(id, payload).await?;
    Ok(success_response(updated))
}

/// Delete a category that no product references
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Category still in use", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.catalog.delete_category(id).await?;
    Ok(no_content_response())
}
