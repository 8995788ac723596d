use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kasir API",
        version = "1.0.0",
        description = r#"
# Kasir POS Administration API

Backend for a point-of-sale admin tool: catalog, staff, checkout, stock transfers and reporting.

## Authentication

`POST /auth/login` returns a JWT. Send it on every other request:

```
Authorization: Bearer <token>
```

Catalog writes, staff management, stock transfers and period reports need the `admin` role.
Checkout, catalog reads and the dashboard are open to `kasir` as well.

## Money

Amounts are whole rupiah (integers). Report averages are decimals rounded to 2 places.

## Periods

Reports take `period` as `YYYY-MM-DD`, `YYYY-MM` or `YYYY`, interpreted in UTC.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login and current user"),
        (name = "categories", description = "Product categories"),
        (name = "products", description = "Catalog products"),
        (name = "staff", description = "Staff directory and activation"),
        (name = "sales", description = "Checkout and transaction history"),
        (name = "stock-transfers", description = "Manual stock movements"),
        (name = "reports", description = "Dashboard, period reports and CSV export")
    ),
    paths(
        crate::handlers::auth::login,
        crate::handlers::auth::me,

        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,

        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::get_product_by_barcode,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::product_transfers,

        crate::handlers::staff::list_staff,
        crate::handlers::staff::get_staff,
        crate::handlers::staff::create_staff,
        crate::handlers::staff::update_staff,
        crate::handlers::staff::deactivate_staff,
        crate::handlers::staff::reactivate_staff,

        crate::handlers::sales::create_sale,
        crate::handlers::sales::list_sales,
        crate::handlers::sales::get_sale,

        crate::handlers::stock_transfers::create_transfer,
        crate::handlers::stock_transfers::list_transfers,
        crate::handlers::stock_transfers::get_transfer,

        crate::handlers::reports::dashboard,
        crate::handlers::reports::sales_report,
        crate::handlers::reports::transfer_report,
        crate::handlers::reports::export_sales,
        crate::handlers::reports::export_transfers,
    ),
    components(
        schemas(
            crate::entities::StaffRole,
            crate::entities::TransferType,
            crate::services::reports::PeriodKind,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_group() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Kasir API"));
        for path in [
            "/auth/login",
            "/api/v1/categories/{id}",
            "/api/v1/products/barcode/{barcode}",
            "/api/v1/staff/{id}/deactivate",
            "/api/v1/sales",
            "/api/v1/stock-transfers",
            "/api/v1/reports/sales/export",
        ] {
            assert!(json.contains(path), "missing {path}");
        }
        assert!(json.contains("bearer_auth"));
    }
}
