use crate::{services::clamp_paging, ApiResponse, PaginatedResponse};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Wraps a page of results, echoing the paging actually applied.
pub fn paginated_response<T: Serialize>(
    items: Vec<T>,
    total: u64,
    page: Option<u64>,
    per_page: Option<u64>,
) -> Response {
    let (page, limit) = clamp_paging(page, per_page);
    success_response(PaginatedResponse::new(items, total, page, limit))
}

/// `text/csv` download with a `Content-Disposition` filename.
pub fn csv_response(filename: &str, body: String) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
