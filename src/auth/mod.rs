/*!
 * # Authentication and Authorization Module
 *
 * Staff log in with email and password against an [`IdentityProvider`] and
 * receive an HS256 JWT carrying their staff id and role. The middleware in
 * this module validates bearer tokens and gates routes by role (`admin`,
 * `kasir`).
 */

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{staff, StaffRole};

pub mod identity;

pub use identity::{DbIdentityProvider, IdentityError, IdentityProvider, NewIdentity};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,         // Staff id
    pub identity_id: String, // Login identity behind the staff row
    pub name: String,
    pub email: String,
    pub role: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated staff member extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthUser {
    pub staff_id: Uuid,
    pub identity_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: StaffRole,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.to_string() == role
    }

    pub fn is_admin(&self) -> bool {
        self.role == StaffRole::Admin
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            staff_id: Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?,
            identity_id: Uuid::parse_str(&claims.identity_id)
                .map_err(|_| AuthError::InvalidToken)?,
            name: claims.name,
            email: claims.email,
            role: StaffRole::from_str(&claims.role).map_err(|_| AuthError::InvalidToken)?,
        })
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_issuer: String,
        jwt_audience: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Authentication service that handles login, token issuance and validation
#[derive(Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    db: Arc<DatabaseConnection>,
    identities: Arc<dyn IdentityProvider>,
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        db: Arc<DatabaseConnection>,
        identities: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            config,
            db,
            identities,
        }
    }

    /// Checks credentials and issues a token for the matching active staff member.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenResponse, AuthError> {
        let identity_id = self
            .identities
            .authenticate(&credentials.email, &credentials.password)
            .await
            .map_err(|e| match e {
                IdentityError::InvalidCredentials | IdentityError::NotFound(_) => {
                    AuthError::InvalidCredentials
                }
                IdentityError::Banned => AuthError::AccountDisabled,
                other => AuthError::InternalError(other.to_string()),
            })?;

        let member = staff::Entity::find()
            .filter(staff::Column::IdentityId.eq(identity_id))
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or_else(|| {
                warn!(%identity_id, "identity has no staff profile");
                AuthError::InvalidCredentials
            })?;

        if !member.status {
            return Err(AuthError::AccountDisabled);
        }

        info!(staff_id = %member.id, role = %member.role, "staff logged in");
        self.generate_token(&member)
    }

    /// Generate a JWT for a staff member
    pub fn generate_token(&self, member: &staff::Model) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: member.id.to_string(),
            identity_id: member.identity_id.to_string(),
            name: member.name.clone(),
            email: member.email.clone(),
            role: member.role.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            user: AuthUser {
                staff_id: member.id,
                identity_id: member.identity_id,
                name: member.name.clone(),
                email: member.email.clone(),
                role: member.role,
            },
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        Ok(claims)
    }
}

/// Issued access token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: AuthUser,
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginCredentials {
    #[schema(example = "admin@toko.id")]
    pub email: String,
    pub password: String,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountDisabled,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            Self::AccountDisabled => (
                StatusCode::FORBIDDEN,
                "AUTH_ACCOUNT_DISABLED",
                "Account is deactivated".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Token creation failed".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_DATABASE_ERROR",
                "Database error".to_string(),
            ),
            Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "authentication failure");
        }

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_role(&required_role) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingAuth)?;

    let claims = auth_service.validate_token(token)?;
    AuthUser::try_from(claims)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_role(self, role: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_role(self, role: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            role.to_string(),
            role_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use axum::{body::Body, http::Request as HttpRequest, routing::get, Extension, Router};
    use identity::MockIdentityProvider;
    use tower::ServiceExt;

    const SECRET: &str =
        "k4s1r_t3st_s3cr3t_w1th_en0ugh_entr0py_ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghij";

    async fn memory_db() -> Arc<DatabaseConnection> {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();
        Arc::new(db)
    }

    fn config() -> AuthConfig {
        AuthConfig::new(
            SECRET.into(),
            "kasir-api".into(),
            "kasir-admin".into(),
            Duration::from_secs(600),
        )
    }

    fn member(role: StaffRole, status: bool) -> staff::Model {
        staff::Model {
            id: Uuid::new_v4(),
            name: "Budi".into(),
            email: "budi@toko.id".into(),
            phone: "0812".into(),
            role,
            status,
            identity_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    async fn service() -> AuthService {
        AuthService::new(
            config(),
            memory_db().await,
            Arc::new(MockIdentityProvider::new()),
        )
    }

    #[tokio::test]
    async fn token_round_trip_preserves_role() {
        let service = service().await;
        let kasir = member(StaffRole::Kasir, true);
        let token = service.generate_token(&kasir).unwrap();

        let claims = service.validate_token(&token.access_token).unwrap();
        let user = AuthUser::try_from(claims).unwrap();
        assert_eq!(user.staff_id, kasir.id);
        assert_eq!(user.role, StaffRole::Kasir);
        assert!(!user.is_admin());
    }

    #[tokio::test]
    async fn token_from_other_audience_is_rejected() {
        let service = service().await;
        let mut other = service.clone();
        other.config.jwt_audience = "somebody-else".into();

        let token = other
            .generate_token(&member(StaffRole::Admin, true))
            .unwrap();
        assert!(matches!(
            service.validate_token(&token.access_token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn login_rejects_inactive_staff() {
        let db = memory_db().await;
        let inactive = member(StaffRole::Kasir, false);
        let identity_id = inactive.identity_id;
        {
            use sea_orm::{ActiveModelTrait, IntoActiveModel};
            inactive.clone().into_active_model().insert(&*db).await.unwrap();
        }

        let mut identities = MockIdentityProvider::new();
        identities
            .expect_authenticate()
            .returning(move |_, _| Ok(identity_id));
        let service = AuthService::new(config(), db, Arc::new(identities));

        let result = service
            .login(&LoginCredentials {
                email: "budi@toko.id".into(),
                password: "x".into(),
            })
            .await;
        assert!(matches!(result, Err(AuthError::AccountDisabled)));
    }

    #[tokio::test]
    async fn login_maps_banned_identity_to_disabled() {
        let mut identities = MockIdentityProvider::new();
        identities
            .expect_authenticate()
            .returning(|_, _| Err(IdentityError::Banned));
        let service = AuthService::new(config(), memory_db().await, Arc::new(identities));

        let result = service
            .login(&LoginCredentials {
                email: "budi@toko.id".into(),
                password: "x".into(),
            })
            .await;
        assert!(matches!(result, Err(AuthError::AccountDisabled)));
    }

    async fn whoami(Extension(user): Extension<AuthUser>) -> String {
        user.name
    }

    fn guarded(service: Arc<AuthService>) -> Router {
        Router::new()
            .route("/admin", get(whoami))
            .with_role("admin")
            .layer(Extension(service))
    }

    #[tokio::test]
    async fn middleware_requires_bearer_token() {
        let app = guarded(Arc::new(service().await));
        let response = app
            .oneshot(HttpRequest::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn role_middleware_forbids_kasir_on_admin_routes() {
        let service = Arc::new(service().await);
        let kasir = service
            .generate_token(&member(StaffRole::Kasir, true))
            .unwrap();
        let admin = service
            .generate_token(&member(StaffRole::Admin, true))
            .unwrap();
        let app = guarded(service);

        let forbidden = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/admin")
                    .header(header::AUTHORIZATION, format!("Bearer {}", kasir.access_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let allowed = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/admin")
                    .header(header::AUTHORIZATION, format!("Bearer {}", admin.access_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
