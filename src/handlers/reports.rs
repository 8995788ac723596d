use super::common::{csv_response, success_response};
use crate::{
    errors::ServiceError,
    services::reports::{Dashboard, Period, PeriodQuery, SalesReport, TransferReport},
    AppState,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};

/// Today's figures for the landing screen
#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard",
    responses(
        (status = 200, description = "Dashboard figures", body = crate::ApiResponse<Dashboard>)
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let figures = state.services.reports.dashboard(chrono::Utc::now()).await?;
    Ok(success_response(figures))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/sales",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Sales report", body = crate::ApiResponse<SalesReport>),
        (status = 400, description = "Malformed period", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn sales_report(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let period: Period = query.period.parse()?;
    Ok(success_response(
        state.services.reports.sales_report(&period).await?,
    ))
}

/// Day or month only
#[utoipa::path(
    get,
    path = "/api/v1/reports/transfers",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Transfer report", body = crate::ApiResponse<TransferReport>),
        (status = 400, description = "Malformed period or a whole year", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn transfer_report(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let period: Period = query.period.parse()?;
    Ok(success_response(
        state.services.reports.transfer_report(&period).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/sales/export",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Transactions as CSV", content_type = "text/csv", body = String),
        (status = 400, description = "Malformed period", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn export_sales(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let period: Period = query.period.parse()?;
    let export = state.services.reports.export_sales(&period).await?;
    Ok(csv_response(&export.filename, export.body))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/transfers/export",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Transfers as CSV", content_type = "text/csv", body = String),
        (status = 400, description = "Malformed period or a whole year", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn export_transfers(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let period: Period = query.period.parse()?;
    let export = state.services.reports.export_transfers(&period).await?;
    Ok(csv_response(&export.filename, export.body))
}
