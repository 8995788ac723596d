use crate::auth::IdentityProvider;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod catalog;
pub mod export;
pub mod reports;
pub mod sales;
pub mod staff;
pub mod stock_transfers;

pub use catalog::CatalogService;
pub use reports::ReportService;
pub use sales::SaleService;
pub use staff::StaffService;
pub use stock_transfers::StockTransferService;

pub(crate) const DEFAULT_LIMIT: u64 = 20;
pub(crate) const MAX_LIMIT: u64 = 100;

/// Clamps caller supplied paging to `(page, per_page)` with a 1-based page.
/// The page is capped so `(page - 1) * per_page` stays within an SQL `BIGINT`.
pub(crate) fn clamp_paging(page: Option<u64>, per_page: Option<u64>) -> (u64, u64) {
    let per_page = per_page.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let max_page = i64::MAX as u64 / per_page;
    let page = page.unwrap_or(1).clamp(1, max_page);
    (page, per_page)
}

/// Row offset for a page produced by [`clamp_paging`].
pub(crate) fn page_offset(page: u64, per_page: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(per_page)
}

/// Trims a required text field, rejecting blanks.
pub(crate) fn normalize_required(value: &str, field: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "{field} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .and_then(|v| if v.is_empty() { None } else { Some(v) })
}

/// All domain services, built once at startup and shared through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub staff: StaffService,
    pub sales: SaleService,
    pub stock_transfers: StockTransferService,
    pub reports: ReportService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        identities: Arc<dyn IdentityProvider>,
        config: &AppConfig,
    ) -> Self {
        Self {
            catalog: CatalogService::new(db.clone()),
            staff: StaffService::new(db.clone(), identities),
            sales: SaleService::new(db.clone(), config.default_customer_name.clone()),
            stock_transfers: StockTransferService::new(db.clone()),
            reports: ReportService::new(db, config.low_stock_threshold, config.top_products_limit),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
    use std::sync::Arc;

    /// Fresh migrated in-memory database. One connection keeps every query on
    /// the same SQLite memory instance.
    pub async fn memory_db() -> Arc<DatabaseConnection> {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("in-memory sqlite");
        run_migrations(&db).await.expect("migrations");
        Arc::new(db)
    }

    pub async fn exec(db: &DatabaseConnection, sql: &str) {
        db.execute(Statement::from_string(db.get_database_backend(), sql.to_string()))
            .await
            .expect("raw sql");
    }
}
