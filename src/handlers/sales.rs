use super::common::{created_response, paginated_response, success_response};
use crate::{
    auth::AuthUser,
    entities::transaction,
    errors::ServiceError,
    services::sales::{SaleInput, SaleReceipt, TransactionQuery},
    AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

/// Checkout a cart. The signed-in staff member is recorded as cashier.
#[utoipa::path(
    post,
    path = "/api/v1/sales",
    request_body = SaleInput,
    responses(
        (status = 201, description = "Sale recorded", body = crate::ApiResponse<SaleReceipt>),
        (status = 400, description = "Empty cart, bad quantity or payment below total", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "sales"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SaleInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let receipt = state
        .services
        .sales
        .process_sale(payload, &user.name)
        .await?;
    Ok(created_response(receipt))
}

#[utoipa::path(
    get,
    path = "/api/v1/sales",
    params(TransactionQuery),
    responses(
        (status = 200, description = "Transactions listed", body = crate::ApiResponse<PaginatedResponse<transaction::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, per_page) = (query.page, query.per_page);
    let (rows, total) = state.services.sales.list_transactions(query).await?;
    Ok(paginated_response(rows, total, page, per_page))
}

/// Transaction detail for receipts
#[utoipa::path(
    get,
    path = "/api/v1/sales/{id}",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction fetched", body = crate::ApiResponse<SaleReceipt>),
        (status = 404, description = "Transaction not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(
        state.services.sales.get_transaction(id).await?,
    ))
}
