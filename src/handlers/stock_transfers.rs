use super::common::{created_response, paginated_response, success_response};
use crate::{
    auth::AuthUser,
    entities::stock_transfer,
    errors::ServiceError,
    services::stock_transfers::{Actor, RecordTransferInput, TransferQuery},
    AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

/// Record a manual stock movement
#[utoipa::path(
    post,
    path = "/api/v1/stock-transfers",
    request_body = RecordTransferInput,
    responses(
        (status = 201, description = "Transfer recorded", body = crate::ApiResponse<stock_transfer::Model>),
        (status = 400, description = "Invalid quantity or reason", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Transfer out exceeds stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transfers"
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<RecordTransferInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = Actor {
        user_id: Some(user.staff_id),
        name: user.name,
    };
    let entry = state
        .services
        .stock_transfers
        .record_transfer(payload, &actor)
        .await?;
    Ok(created_response(entry))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock-transfers",
    params(TransferQuery),
    responses(
        (status = 200, description = "Transfers listed", body = crate::ApiResponse<PaginatedResponse<stock_transfer::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transfers"
)]
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<TransferQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, per_page) = (query.page, query.per_page);
    let (rows, total) = state.services.stock_transfers.list_transfers(query).await?;
    Ok(paginated_response(rows, total, page, per_page))
}

/// One ledger entry, used for the transfer receipt
#[utoipa::path(
    get,
    path = "/api/v1/stock-transfers/{id}",
    params(("id" = Uuid, Path, description = "Transfer ID")),
    responses(
        (status = 200, description = "Transfer fetched", body = crate::ApiResponse<stock_transfer::Model>),
        (status = 404, description = "Transfer not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transfers"
)]
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.stock_transfers.get_transfer(id).await?,
    ))
}
