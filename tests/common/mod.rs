#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use kasir_api::{
    auth::{DbIdentityProvider, IdentityProvider},
    config::AppConfig,
    db,
    entities::{category, staff, StaffRole},
    services::{
        catalog::{CategoryInput, CreateProductInput, ProductView},
        staff::CreateStaffInput,
    },
    AppState,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub const PASSWORD: &str = "rahasia-123";

const SECRET: &str = "k4s1r_t3st_s3cr3t_w1th_en0ugh_entr0py_ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghij";

/// Application wired against a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps every query on the same memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let identities: Arc<dyn IdentityProvider> =
            Arc::new(DbIdentityProvider::new(db_arc.clone()));
        let state = AppState::new(db_arc, cfg, identities);
        let router = kasir_api::app_router(state.clone());

        Self { router, state }
    }

    pub async fn seed_staff(&self, name: &str, email: &str, role: StaffRole) -> staff::Model {
        self.state
            .services
            .staff
            .create_staff(CreateStaffInput {
                name: name.to_string(),
                email: email.to_string(),
                phone: "0812000000".to_string(),
                role,
                status: Some(true),
                password: Some(PASSWORD.to_string()),
            })
            .await
            .expect("seed staff")
    }

    pub async fn seed_category(&self, name: &str) -> category::Model {
        self.state
            .services
            .catalog
            .create_category(CategoryInput {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("seed category")
    }

    pub async fn seed_product(
        &self,
        category_id: uuid::Uuid,
        name: &str,
        price: i64,
        stock: i32,
    ) -> ProductView {
        self.state
            .services
            .catalog
            .create_product(CreateProductInput {
                name: name.to_string(),
                price,
                stock,
                category_id,
                barcode: None,
            })
            .await
            .expect("seed product")
    }

    /// Logs in over HTTP and returns the bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/auth/login",
                Some(serde_json::json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(response.status(), 200, "login for {email} should succeed");
        let body = response_json(response).await;
        body["data"]["access_token"]
            .as_str()
            .expect("access token in login response")
            .to_string()
    }

    /// Seeds an admin and a kasir and returns their tokens.
    pub async fn admin_and_kasir_tokens(&self) -> (String, String) {
        self.seed_staff("Admin Toko", "admin@toko.id", StaffRole::Admin)
            .await;
        self.seed_staff("Siti Kasir", "siti@toko.id", StaffRole::Kasir)
            .await;
        let admin = self.login("admin@toko.id", PASSWORD).await;
        let kasir = self.login("siti@toko.id", PASSWORD).await;
        (admin, kasir)
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("response body bytes")
        .to_bytes()
        .to_vec()
}

pub async fn response_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json response")
}

pub async fn response_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf-8 body")
}
