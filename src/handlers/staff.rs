use super::common::{created_response, paginated_response, success_response};
use crate::{
    entities::staff,
    errors::ServiceError,
    services::staff::{CreateStaffInput, StaffQuery, UpdateStaffInput},
    AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/v1/staff",
    params(StaffQuery),
    responses(
        (status = 200, description = "Staff listed", body = crate::ApiResponse<PaginatedResponse<staff::Model>>),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "staff"
)]
pub async fn list_staff(
    State(state): State<AppState>,
    Query(query): Query<StaffQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, per_page) = (query.page, query.per_page);
    let (members, total) = state.services.staff.list_staff(query).await?;
    Ok(paginated_response(members, total, page, per_page))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/{id}",
    params(("id" = Uuid, Path, description = "Staff ID")),
    responses(
        (status = 200, description = "Staff member fetched", body = crate::ApiResponse<staff::Model>),
        (status = 404, description = "Staff not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "staff"
)]
pub async fn get_staff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.staff.get_staff(id).await?))
}

/// Register a staff member together with their login
#[utoipa::path(
    post,
    path = "/api/v1/staff",
    request_body = CreateStaffInput,
    responses(
        (status = 201, description = "Staff created", body = crate::ApiResponse<staff::Model>),
        (status = 400, description = "Invalid request or missing password", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "staff"
)]
pub async fn create_staff(
    State(state): State<AppState>,
    Json(payload): Json<CreateStaffInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.staff.create_staff(payload).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    put,
    path = "/api/v1/staff/{id}",
    params(("id" = Uuid, Path, description = "Staff ID")),
    request_body = UpdateStaffInput,
    responses(
        (status = 200, description = "Staff updated", body = crate::ApiResponse<staff::Model>),
        (status = 404, description = "Staff not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "staff"
)]
pub async fn update_staff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStaffInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.services.staff.update_staff(id, payload).await?;
    Ok(success_response(updated))
}

/// Block the staff member's login
#[utoipa::path(
    post,
    path = "/api/v1/staff/{id}/deactivate",
    params(("id" = Uuid, Path, description = "Staff ID")),
    responses(
        (status = 200, description = "Staff deactivated", body = crate::ApiResponse<staff::Model>),
        (status = 404, description = "Staff not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Identity provider failure", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "staff"
)]
pub async fn deactivate_staff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.staff.deactivate(id).await?))
}

/// Restore the staff member's login
#[utoipa::path(
    post,
    path = "/api/v1/staff/{id}/reactivate",
    params(("id" = Uuid, Path, description = "Staff ID")),
    responses(
        (status = 200, description = "Staff reactivated", body = crate::ApiResponse<staff::Model>),
        (status = 404, description = "Staff not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Identity provider failure", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "staff"
)]
pub async fn reactivate_staff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.staff.reactivate(id).await?))
}
