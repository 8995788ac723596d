//! Login and role gating over the HTTP surface.

mod common;

use axum::http::Method;
use common::{response_json, TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn login_returns_token_and_profile() {
    let app = TestApp::new().await;
    app.seed_staff("Admin Toko", "admin@toko.id", kasir_api::entities::StaffRole::Admin)
        .await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "admin@toko.id", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["user"]["role"], "admin");
    assert_eq!(body["data"]["user"]["name"], "Admin Toko");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.seed_staff("Admin Toko", "admin@toko.id", kasir_api::entities::StaffRole::Admin)
        .await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "admin@toko.id", "password": "bukan-ini" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_CREDENTIALS");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = TestApp::new().await;

    for uri in ["/api/v1/products", "/api/v1/sales", "/auth/me"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), 401, "{uri} should require a token");
    }

    let response = app
        .request(Method::GET, "/api/v1/products", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn me_echoes_the_token_owner() {
    let app = TestApp::new().await;
    let (_, kasir) = app.admin_and_kasir_tokens().await;

    let response = app.request(Method::GET, "/auth/me", None, Some(&kasir)).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["email"], "siti@toko.id");
    assert_eq!(body["data"]["role"], "kasir");
}

#[tokio::test]
async fn kasir_is_forbidden_on_admin_routes() {
    let app = TestApp::new().await;
    let (_, kasir) = app.admin_and_kasir_tokens().await;

    let cases = [
        (Method::GET, "/api/v1/staff", None),
        (
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Minuman" })),
        ),
        (Method::GET, "/api/v1/stock-transfers", None),
        (Method::GET, "/api/v1/reports/sales?period=2024-05", None),
        (Method::GET, "/api/v1/reports/sales/export?period=2024", None),
    ];
    for (method, uri, body) in cases {
        let response = app.request(method, uri, body, Some(&kasir)).await;
        assert_eq!(response.status(), 403, "{uri} should be admin only");
    }
}

#[tokio::test]
async fn kasir_can_use_checkout_routes() {
    let app = TestApp::new().await;
    let (_, kasir) = app.admin_and_kasir_tokens().await;

    for uri in [
        "/api/v1/products",
        "/api/v1/categories",
        "/api/v1/sales",
        "/api/v1/reports/dashboard",
    ] {
        let response = app.request(Method::GET, uri, None, Some(&kasir)).await;
        assert_eq!(response.status(), 200, "{uri} should be open to kasir");
    }
}

#[tokio::test]
async fn deactivated_staff_cannot_log_in_until_reactivated() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin_and_kasir_tokens().await;
    let budi = app
        .seed_staff("Budi", "budi@toko.id", kasir_api::entities::StaffRole::Kasir)
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/staff/{}/deactivate", budi.id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["data"]["status"], false);

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "budi@toko.id", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/staff/{}/reactivate", budi.id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 200);

    app.login("budi@toko.id", PASSWORD).await;
}
