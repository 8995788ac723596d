//! Kasir API Library
//!
//! Point-of-sale administration backend: catalog, staff, checkout, stock
//! transfers and reporting over a relational store.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthRouterExt, AuthService, IdentityProvider};
use crate::entities::StaffRole;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: services::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires every service against one connection pool and identity store.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        identities: Arc<dyn IdentityProvider>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(
            AuthConfig::from(&config),
            db.clone(),
            identities.clone(),
        ));
        let services = services::AppServices::new(db.clone(), identities, &config);
        Self {
            db,
            config,
            services,
            auth,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        assert!(!response.success);
        assert_eq!(response.errors.as_deref(), Some(&["missing".to_string()][..]));
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(PaginatedResponse::new(vec![1, 2], 41, 1, 20).total_pages, 3);
        assert_eq!(PaginatedResponse::<u8>::new(vec![], 0, 1, 20).total_pages, 0);
    }
}

const ADMIN: &str = "admin";

/// Routes under `/api/v1`, gated by role
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{categories, products, reports, sales, staff, stock_transfers};

    let catalog_read = Router::new()
        .route("/categories", get(categories::list_categories))
        .route("/categories/:id", get(categories::get_category))
        .route("/products", get(products::list_products))
        .route(
            "/products/barcode/:barcode",
            get(products::get_product_by_barcode),
        )
        .route("/products/:id", get(products::get_product))
        .with_auth();

    let catalog_write = Router::new()
        .route("/categories", post(categories::create_category))
        .route(
            "/categories/:id",
            axum::routing::put(categories::update_category).delete(categories::delete_category),
        )
        .route("/products", post(products::create_product))
        .route(
            "/products/:id",
            axum::routing::put(products::update_product).delete(products::delete_product),
        )
        .route("/products/:id/transfers", get(products::product_transfers))
        .with_role(ADMIN);

    let staff_admin = Router::new()
        .route("/staff", get(staff::list_staff).post(staff::create_staff))
        .route(
            "/staff/:id",
            get(staff::get_staff).put(staff::update_staff),
        )
        .route("/staff/:id/deactivate", post(staff::deactivate_staff))
        .route("/staff/:id/reactivate", post(staff::reactivate_staff))
        .with_role(ADMIN);

    let checkout = Router::new()
        .route("/sales", get(sales::list_sales).post(sales::create_sale))
        .route("/sales/:id", get(sales::get_sale))
        .route("/reports/dashboard", get(reports::dashboard))
        .with_auth();

    let transfers = Router::new()
        .route(
            "/stock-transfers",
            get(stock_transfers::list_transfers).post(stock_transfers::create_transfer),
        )
        .route("/stock-transfers/:id", get(stock_transfers::get_transfer))
        .with_role(ADMIN);

    let period_reports = Router::new()
        .route("/reports/sales", get(reports::sales_report))
        .route("/reports/transfers", get(reports::transfer_report))
        .route("/reports/sales/export", get(reports::export_sales))
        .route("/reports/transfers/export", get(reports::export_transfers))
        .with_role(ADMIN);

    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(api_status))
        .merge(catalog_read)
        .merge(catalog_write)
        .merge(staff_admin)
        .merge(checkout)
        .merge(transfers)
        .merge(period_reports)
}

/// Routes under `/auth`
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::auth::me))
        .with_auth()
        .route("/login", post(handlers::auth::login))
}

/// Full application router without the transport layers (CORS, compression,
/// body limit) that depend on deployment configuration.
pub fn app_router(state: AppState) -> Router {
    let auth = state.auth.clone();
    Router::new()
        .route("/", get(|| async { "kasir-api up" }))
        .nest("/api/v1", api_v1_routes())
        .nest("/auth", auth_routes())
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth,
            |State(auth): State<Arc<AuthService>>,
             mut req: axum::extract::Request,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "kasir-api",
        "environment": state.config.environment,
        "roles": [StaffRole::Admin.to_string(), StaffRole::Kasir.to_string()],
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
