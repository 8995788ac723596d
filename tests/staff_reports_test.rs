//! Staff administration, period reports and CSV downloads.

mod common;

use axum::http::{header, Method};
use chrono::Utc;
use common::{response_json, response_text, TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn admin_creates_staff_who_can_log_in() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin_and_kasir_tokens().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/staff",
            Some(json!({
                "name": "Budi Santoso",
                "email": "budi@toko.id",
                "phone": "0813",
                "role": "kasir",
                "password": PASSWORD
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 201);
    let created = response_json(response).await;
    assert_eq!(created["data"]["role"], "kasir");
    assert_eq!(created["data"]["status"], true);

    app.login("budi@toko.id", PASSWORD).await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/staff?search=budi",
            None,
            Some(&admin),
        )
        .await;
    let listed = response_json(response).await;
    assert_eq!(listed["data"]["total"], 1);
    assert_eq!(listed["data"]["items"][0]["email"], "budi@toko.id");
}

#[tokio::test]
async fn staff_creation_rejects_duplicates_and_missing_password() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin_and_kasir_tokens().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/staff",
            Some(json!({
                "name": "Siti Lagi",
                "email": "siti@toko.id",
                "role": "kasir",
                "password": PASSWORD
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 409);

    let response = app
        .request(
            Method::POST,
            "/api/v1/staff",
            Some(json!({ "name": "Tanpa Sandi", "email": "tanpa@toko.id", "role": "kasir" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn status_update_goes_through_the_ban_toggle() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin_and_kasir_tokens().await;
    let dewi = app
        .seed_staff("Dewi", "dewi@toko.id", kasir_api::entities::StaffRole::Kasir)
        .await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/staff/{}", dewi.id),
            Some(json!({ "status": false, "phone": "0899" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated = response_json(response).await;
    assert_eq!(updated["data"]["status"], false);
    assert_eq!(updated["data"]["phone"], "0899");

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "dewi@toko.id", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn sales_report_and_dashboard_reflect_checkout() {
    let app = TestApp::new().await;
    let (admin, kasir) = app.admin_and_kasir_tokens().await;
    let minuman = app.seed_category("Minuman").await;
    let teh = app.seed_product(minuman.id, "Teh Botol", 3500, 10).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/sales",
            Some(json!({
                "payment": 10000,
                "items": [{ "product_id": teh.id, "quantity": 2 }]
            })),
            Some(&kasir),
        )
        .await;
    assert_eq!(response.status(), 201);

    let year = Utc::now().format("%Y").to_string();
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/reports/sales?period={year}"),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);
    let report = response_json(response).await["data"].clone();
    assert_eq!(report["kind"], "year");
    assert_eq!(report["total_revenue"], 7000);
    assert_eq!(report["transaction_count"], 1);
    assert_eq!(report["total_items"], 2);
    assert_eq!(report["chart"].as_array().unwrap().len(), 1);
    assert_eq!(report["top_products"][0]["product_name"], "Teh Botol");

    let response = app
        .request(Method::GET, "/api/v1/reports/dashboard", None, Some(&kasir))
        .await;
    let dashboard = response_json(response).await["data"].clone();
    assert_eq!(dashboard["product_count"], 1);
    assert_eq!(dashboard["low_stock_count"], 1);
    assert_eq!(dashboard["active_staff_count"], 2);
}

#[tokio::test]
async fn malformed_period_is_bad_request() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin_and_kasir_tokens().await;

    for period in ["2024-13", "kemarin", "2024-02-30"] {
        let response = app
            .request(
                Method::GET,
                &format!("/api/v1/reports/sales?period={period}"),
                None,
                Some(&admin),
            )
            .await;
        assert_eq!(response.status(), 400, "{period} should be rejected");
    }
}

#[tokio::test]
async fn transfer_report_refuses_whole_year() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin_and_kasir_tokens().await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/reports/transfers?period=2024",
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::GET,
            "/api/v1/reports/transfers?period=2024-05",
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["data"]["count"], 0);
}

#[tokio::test]
async fn sales_export_is_a_csv_download() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin_and_kasir_tokens().await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/reports/sales/export?period=2024-05",
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/csv"));
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("laporan-bulanan-2024-05.csv"));

    let body = response_text(response).await;
    assert_eq!(
        body.lines().next(),
        Some(kasir_api::services::export::TRANSACTION_HEADERS.join(",").as_str())
    );
}
