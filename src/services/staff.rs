use crate::{
    auth::{IdentityProvider, NewIdentity},
    entities::{staff, StaffRole},
    errors::ServiceError,
    services::{clamp_paging, normalize_optional, normalize_required, page_offset},
};
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Staff directory. Every staff row is paired with one login identity and
/// `status` mirrors whether that identity is banned.
#[derive(Clone)]
pub struct StaffService {
    db: Arc<DatabaseConnection>,
    identities: Arc<dyn IdentityProvider>,
}

impl StaffService {
    pub fn new(db: Arc<DatabaseConnection>, identities: Arc<dyn IdentityProvider>) -> Self {
        Self { db, identities }
    }

    /// Registers the login first, then the staff row. A failed staff insert
    /// deletes the login again.
    #[instrument(skip(self, input), fields(email = %input.email, role = %input.role))]
    pub async fn create_staff(&self, input: CreateStaffInput) -> Result<staff::Model, ServiceError> {
        input.validate()?;
        let password = input
            .password
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ServiceError::ValidationError("password is required".into()))?
            .to_string();
        let name = normalize_required(&input.name, "name")?;
        let email = normalize_required(&input.email, "email")?.to_lowercase();
        let active = input.status.unwrap_or(true);

        let identity_id = self
            .identities
            .create_identity(NewIdentity {
                email: email.clone(),
                password,
                full_name: name.clone(),
            })
            .await?;

        let inserted = staff::ActiveModel {
            name: Set(name),
            email: Set(email),
            phone: Set(input.phone.trim().to_string()),
            role: Set(input.role),
            status: Set(active),
            identity_id: Set(identity_id),
            ..Default::default()
        }
        .insert(&*self.db)
        .await;

        let member = match inserted {
            Ok(member) => member,
            Err(err) => {
                warn!(%identity_id, error = %err, "staff insert failed, deleting identity");
                self.discard_identity(identity_id).await;
                return Err(err.into());
            }
        };

        if !active {
            if let Err(err) = self.identities.ban(identity_id).await {
                warn!(staff_id = %member.id, error = %err, "ban of inactive staff failed, rolling back");
                if let Err(delete_err) = staff::Entity::delete_by_id(member.id).exec(&*self.db).await {
                    error!(staff_id = %member.id, error = %delete_err, "failed to delete staff row");
                }
                self.discard_identity(identity_id).await;
                return Err(err.into());
            }
        }

        info!(staff_id = %member.id, "staff created");
        Ok(member)
    }

    async fn discard_identity(&self, identity_id: Uuid) {
        if let Err(err) = self.identities.delete_identity(identity_id).await {
            error!(%identity_id, error = %err, "failed to delete orphaned identity");
        }
    }

    /// Updates profile columns. A status change goes through the same
    /// ban/unban path as [`Self::deactivate`] and [`Self::reactivate`].
    #[instrument(skip(self, input))]
    pub async fn update_staff(
        &self,
        id: Uuid,
        input: UpdateStaffInput,
    ) -> Result<staff::Model, ServiceError> {
        input.validate()?;
        let current = self.get_staff(id).await?;

        let mut active: staff::ActiveModel = current.clone().into();
        let mut dirty = false;
        if let Some(name) = input.name {
            active.name = Set(normalize_required(&name, "name")?);
            dirty = true;
        }
        if let Some(email) = input.email {
            active.email = Set(normalize_required(&email, "email")?.to_lowercase());
            dirty = true;
        }
        if let Some(phone) = input.phone {
            active.phone = Set(phone.trim().to_string());
            dirty = true;
        }
        if let Some(role) = input.role {
            active.role = Set(role);
            dirty = true;
        }

        let updated = if dirty {
            active.update(&*self.db).await?
        } else {
            current
        };

        match input.status {
            Some(false) if updated.status => self.deactivate(id).await,
            Some(true) if !updated.status => self.reactivate(id).await,
            _ => Ok(updated),
        }
    }

    /// Bans the login, then marks the staff row inactive. If the row update
    /// fails the ban is lifted again.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<staff::Model, ServiceError> {
        let member = self.get_staff(id).await?;
        self.identities.ban(member.identity_id).await?;

        if let Err(err) = self.write_status(id, false).await {
            warn!(staff_id = %id, error = %err, "status update failed, lifting ban");
            if let Err(undo) = self.identities.unban(member.identity_id).await {
                error!(staff_id = %id, identity_id = %member.identity_id, error = %undo, "failed to lift ban after status update failure");
            }
            return Err(err);
        }

        info!(staff_id = %id, "staff deactivated");
        self.get_staff(id).await
    }

    /// Lifts the ban, then marks the staff row active. If the row update
    /// fails the login is banned again.
    #[instrument(skip(self))]
    pub async fn reactivate(&self, id: Uuid) -> Result<staff::Model, ServiceError> {
        let member = self.get_staff(id).await?;
        self.identities.unban(member.identity_id).await?;

        if let Err(err) = self.write_status(id, true).await {
            warn!(staff_id = %id, error = %err, "status update failed, restoring ban");
            if let Err(undo) = self.identities.ban(member.identity_id).await {
                error!(staff_id = %id, identity_id = %member.identity_id, error = %undo, "failed to restore ban after status update failure");
            }
            return Err(err);
        }

        info!(staff_id = %id, "staff reactivated");
        self.get_staff(id).await
    }

    async fn write_status(&self, id: Uuid, status: bool) -> Result<(), ServiceError> {
        let result = staff::Entity::update_many()
            .col_expr(staff::Column::Status, Expr::value(status))
            .filter(staff::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Staff {} not found", id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_staff(&self, id: Uuid) -> Result<staff::Model, ServiceError> {
        staff::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Staff {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list_staff(
        &self,
        query: StaffQuery,
    ) -> Result<(Vec<staff::Model>, u64), ServiceError> {
        let (page, per_page) = clamp_paging(query.page, query.per_page);

        let mut select = staff::Entity::find();
        if let Some(term) = normalize_optional(query.search) {
            select = select.filter(
                Condition::any()
                    .add(staff::Column::Name.contains(&term))
                    .add(staff::Column::Email.contains(&term)),
            );
        }
        if let Some(role) = query.role {
            select = select.filter(staff::Column::Role.eq(role));
        }
        if let Some(status) = query.status {
            select = select.filter(staff::Column::Status.eq(status));
        }

        let total = select.clone().count(&*self.db).await?;
        let rows = select
            .order_by_asc(staff::Column::Name)
            .limit(per_page)
            .offset(page_offset(page, per_page))
            .all(&*self.db)
            .await?;
        Ok((rows, total))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateStaffInput {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Siti Aminah")]
    pub name: String,
    #[validate(email)]
    #[schema(example = "siti@toko.id")]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub role: StaffRole,
    /// Defaults to active.
    pub status: Option<bool>,
    #[validate(length(min = 6))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateStaffInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<StaffRole>,
    pub status: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams)]
pub struct StaffQuery {
    /// Matches name or email
    pub search: Option<String>,
    pub role: Option<StaffRole>,
    pub status: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}
