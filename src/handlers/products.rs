use super::common::{created_response, no_content_response, paginated_response, success_response};
use crate::{
    entities::stock_transfer,
    errors::ServiceError,
    services::catalog::{CreateProductInput, ProductQuery, ProductView, UpdateProductInput},
    AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

/// Search the catalog
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Products listed", body = crate::ApiResponse<PaginatedResponse<ProductView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, per_page) = (query.page, query.per_page);
    let (items, total) = state.services.catalog.list_products(query).await?;
    Ok(paginated_response(items, total, page, per_page))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product fetched", body = crate::ApiResponse<ProductView>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.catalog.get_product(id).await?))
}

/// Scanner lookup
#[utoipa::path(
    get,
    path = "/api/v1/products/barcode/{barcode}",
    params(("barcode" = String, Path, description = "Product barcode")),
    responses(
        (status = 200, description = "Product fetched", body = crate::ApiResponse<ProductView>),
        (status = 404, description = "No product with this barcode", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn get_product_by_barcode(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.catalog.get_product_by_barcode(&barcode).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created", body = crate::ApiResponse<ProductView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.catalog.create_product(payload).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated", body = crate::ApiResponse<ProductView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.services.catalog.update_product(id, payload).await?;
    Ok(success_response(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product appears on recorded sales", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.catalog.delete_product(id).await?;
    Ok(no_content_response())
}

/// Stock movement history of one product, newest first
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/transfers",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Transfers listed", body = crate::ApiResponse<Vec<stock_transfer::Model>>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transfers"
)]
pub async fn product_transfers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let history = state
        .services
        .stock_transfers
        .transfers_for_product(id)
        .await?;
    Ok(success_response(history))
}
