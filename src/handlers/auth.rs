use super::common::success_response;
use crate::{
    auth::{AuthError, AuthUser, LoginCredentials, TokenResponse},
    AppState,
};
use axum::{extract::State, response::IntoResponse, Extension, Json};
use tracing::info;

/// Exchange email and password for a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Token issued", body = crate::ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account is deactivated")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<impl IntoResponse, AuthError> {
    let token = state.auth.login(&credentials).await?;
    info!(staff_id = %token.user.staff_id, role = %token.user.role, "login succeeded");
    Ok(success_response(token))
}

/// The staff member behind the presented token
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = crate::ApiResponse<AuthUser>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(Extension(user): Extension<AuthUser>) -> impl IntoResponse {
    success_response(user)
}
