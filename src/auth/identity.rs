//! Login identities behind a trait, so staff management can be exercised
//! against a mock while the server runs on the `identities` table.

use crate::entities::identity;
use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Bans last 876000 hours, long enough to be permanent until lifted.
pub const BAN_DURATION_HOURS: i64 = 876_000;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity {0} not found")]
    NotFound(Uuid),

    #[error("email {0} is already registered")]
    EmailTaken(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is deactivated")]
    Banned,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("identity store failure: {0}")]
    Store(#[from] DbErr),
}

impl From<IdentityError> for ServiceError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotFound(id) => ServiceError::NotFound(format!("identity {}", id)),
            IdentityError::EmailTaken(email) => {
                ServiceError::Conflict(format!("email {} is already registered", email))
            }
            IdentityError::InvalidCredentials => {
                ServiceError::Unauthorized("invalid email or password".into())
            }
            IdentityError::Banned => ServiceError::Forbidden("account is deactivated".into()),
            IdentityError::Hash(msg) => ServiceError::HashError(msg),
            IdentityError::Store(e) => ServiceError::IdentityError(e.to_string()),
        }
    }
}

/// Data needed to register a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registers a login and returns its id.
    async fn create_identity(&self, new_identity: NewIdentity) -> Result<Uuid, IdentityError>;

    async fn delete_identity(&self, id: Uuid) -> Result<(), IdentityError>;

    /// Blocks logins for the identity.
    async fn ban(&self, id: Uuid) -> Result<(), IdentityError>;

    /// Lifts a ban.
    async fn unban(&self, id: Uuid) -> Result<(), IdentityError>;

    /// Checks a password and returns the identity id when it matches and the
    /// identity is not banned.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid, IdentityError>;
}

pub fn hash_password(password: &str) -> Result<String, IdentityError> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| IdentityError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Identity store backed by the `identities` table.
#[derive(Debug, Clone)]
pub struct DbIdentityProvider {
    db: Arc<DatabaseConnection>,
}

impl DbIdentityProvider {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find(&self, id: Uuid) -> Result<identity::Model, IdentityError> {
        identity::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or(IdentityError::NotFound(id))
    }

    async fn set_banned_until(
        &self,
        id: Uuid,
        banned_until: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), IdentityError> {
        let mut active: identity::ActiveModel = self.find(id).await?.into();
        active.banned_until = Set(banned_until);
        active.update(&*self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for DbIdentityProvider {
    #[instrument(skip(self, new_identity), fields(email = %new_identity.email))]
    async fn create_identity(&self, new_identity: NewIdentity) -> Result<Uuid, IdentityError> {
        let email = new_identity.email.trim().to_lowercase();
        let existing = identity::Entity::find()
            .filter(identity::Column::Email.eq(email.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(IdentityError::EmailTaken(email));
        }

        let id = Uuid::new_v4();
        identity::ActiveModel {
            id: Set(id),
            email: Set(email),
            password_hash: Set(hash_password(&new_identity.password)?),
            full_name: Set(new_identity.full_name),
            banned_until: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        debug!(identity_id = %id, "identity created");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn delete_identity(&self, id: Uuid) -> Result<(), IdentityError> {
        let result = identity::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(IdentityError::NotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn ban(&self, id: Uuid) -> Result<(), IdentityError> {
        let until = Utc::now() + ChronoDuration::hours(BAN_DURATION_HOURS);
        self.set_banned_until(id, Some(until)).await
    }

    #[instrument(skip(self))]
    async fn unban(&self, id: Uuid) -> Result<(), IdentityError> {
        self.set_banned_until(id, None).await
    }

    #[instrument(skip(self, password))]
    async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        let found = identity::Entity::find()
            .filter(identity::Column::Email.eq(email.trim().to_lowercase()))
            .one(&*self.db)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        if !verify_password(password, &found.password_hash) {
            warn!(identity_id = %found.id, "password mismatch");
            return Err(IdentityError::InvalidCredentials);
        }
        if found.is_banned_at(Utc::now()) {
            return Err(IdentityError::Banned);
        }
        Ok(found.id)
    }
}
