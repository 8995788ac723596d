use crate::{
    entities::{category, product, transaction_item},
    errors::ServiceError,
    services::{clamp_paging, normalize_optional, normalize_required, page_offset},
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Product and category management
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ---- categories ----

    /// All categories ordered by name, each with the number of products filed under it
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<CategorySummary>, ServiceError> {
        let categories = category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?;

        let counts: HashMap<Uuid, i64> = product::Entity::find()
            .select_only()
            .column(product::Column::CategoryId)
            .column_as(Expr::col(product::Column::Id).count(), "product_count")
            .group_by(product::Column::CategoryId)
            .into_tuple::<(Uuid, i64)>()
            .all(&*self.db)
            .await?
            .into_iter()
            .collect();

        Ok(categories
            .into_iter()
            .map(|c| {
                let product_count = counts.get(&c.id).copied().unwrap_or(0);
                CategorySummary {
                    id: c.id,
                    name: c.name,
                    description: c.description,
                    created_at: c.created_at,
                    product_count,
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_category(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let created = category::ActiveModel {
            name: Set(normalize_required(&input.name, "name")?),
            description: Set(normalize_optional(input.description)),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(category_id = %created.id, "category created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_category(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let mut active: category::ActiveModel = self.get_category(id).await?.into();
        active.name = Set(normalize_required(&input.name, "name")?);
        active.description = Set(normalize_optional(input.description));
        Ok(active.update(&*self.db).await?)
    }

    /// Deletes a category unless a product still references it.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_category(id).await?;

        let in_use = product::Entity::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(&*self.db)
            .await?;
        if in_use > 0 {
            warn!(category_id = %id, products = in_use, "refusing to delete category in use");
            return Err(ServiceError::Conflict(format!(
                "Category is still in use by {} product(s) and cannot be deleted",
                in_use
            )));
        }

        category::Entity::delete_by_id(id).exec(&*self.db).await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    // ---- products ----

    /// Search products by name or barcode, optionally narrowed to one category or to low stock
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductQuery,
    ) -> Result<(Vec<ProductView>, u64), ServiceError> {
        let (page, per_page) = clamp_paging(query.page, query.per_page);

        let mut select = product::Entity::find();
        if let Some(term) = normalize_optional(query.search) {
            select = select.filter(
                Condition::any()
                    .add(product::Column::Name.contains(&term))
                    .add(product::Column::Barcode.eq(term)),
            );
        }
        if let Some(category_id) = query.category_id {
            select = select.filter(product::Column::CategoryId.eq(category_id));
        }
        if let Some(threshold) = query.low_stock {
            select = select.filter(product::Column::Stock.lte(threshold));
        }

        let total = select.clone().count(&*self.db).await?;
        let rows = select
            .order_by_asc(product::Column::Name)
            .find_also_related(category::Entity)
            .limit(per_page)
            .offset(page_offset(page, per_page))
            .all(&*self.db)
            .await?;

        Ok((rows.into_iter().map(ProductView::from).collect(), total))
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<ProductView, ServiceError> {
        product::Entity::find_by_id(id)
            .find_also_related(category::Entity)
            .one(&*self.db)
            .await?
            .map(ProductView::from)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    /// Lookup used by the checkout scanner
    #[instrument(skip(self))]
    pub async fn get_product_by_barcode(&self, barcode: &str) -> Result<ProductView, ServiceError> {
        let barcode = normalize_required(barcode, "barcode")?;
        product::Entity::find()
            .filter(product::Column::Barcode.eq(barcode.clone()))
            .find_also_related(category::Entity)
            .one(&*self.db)
            .await?
            .map(ProductView::from)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product with barcode {} not found", barcode))
            })
    }

    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductView, ServiceError> {
        input.validate()?;
        self.ensure_category_exists(input.category_id).await?;

        let created = product::ActiveModel {
            name: Set(normalize_required(&input.name, "name")?),
            price: Set(input.price),
            stock: Set(input.stock),
            category_id: Set(input.category_id),
            barcode: Set(normalize_optional(input.barcode)),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %created.id, "product created");
        self.get_product(created.id).await
    }

    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductView, ServiceError> {
        input.validate()?;
        let existing = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = input.name {
            active.name = Set(normalize_required(&name, "name")?);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category_exists(category_id).await?;
            active.category_id = Set(category_id);
        }
        if let Some(barcode) = input.barcode {
            active.barcode = Set(normalize_optional(Some(barcode)));
        }

        active.update(&*self.db).await?;
        self.get_product(id).await
    }

    /// Deletes a product. Products that appear on a recorded sale are kept.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let sold = transaction_item::Entity::find()
            .filter(transaction_item::Column::ProductId.eq(id))
            .count(&*self.db)
            .await?;
        if sold > 0 {
            return Err(ServiceError::Conflict(
                "Product appears on recorded sales and cannot be deleted".to_string(),
            ));
        }

        let result = product::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Product {} not found", id)));
        }
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    async fn ensure_category_exists(&self, category_id: Uuid) -> Result<(), ServiceError> {
        let found = category::Entity::find_by_id(category_id)
            .one(&*self.db)
            .await?;
        if found.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Category {} does not exist",
                category_id
            )));
        }
        Ok(())
    }
}

/// Input for creating or renaming a category
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Minuman")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub product_count: i64,
}

/// Input for creating a product
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Kopi Susu")]
    pub name: String,
    #[validate(range(min = 0))]
    #[schema(example = 3500)]
    pub price: i64,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub stock: i32,
    pub category_id: Uuid,
    pub barcode: Option<String>,
}

/// Partial product update; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
    /// An empty string clears the barcode
    pub barcode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams)]
pub struct ProductQuery {
    /// Matches product names containing the term, or an exact barcode
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    /// Only products whose stock is at or below this value
    pub low_stock: Option<i32>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Product with its category name resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub stock: i32,
    pub category_id: Uuid,
    pub category_name: Option<String>,
    pub barcode: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<(product::Model, Option<category::Model>)> for ProductView {
    fn from((p, c): (product::Model, Option<category::Model>)) -> Self {
        Self {
            id: p.id,
            name: p.name,
            price: p.price,
            stock: p.stock,
            category_id: p.category_id,
            category_name: c.map(|c| c.name),
            barcode: p.barcode,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sales::{CartLine, SaleInput, SaleService};
    use crate::services::test_support::memory_db;
    use assert_matches::assert_matches;

    async fn seeded() -> (CatalogService, category::Model) {
        let service = CatalogService::new(memory_db().await);
        let minuman = service
            .create_category(CategoryInput {
                name: " Minuman ".into(),
                description: None,
            })
            .await
            .unwrap();
        (service, minuman)
    }

    fn kopi(category_id: Uuid) -> CreateProductInput {
        CreateProductInput {
            name: "Kopi Susu".into(),
            price: 3500,
            stock: 10,
            category_id,
            barcode: Some("899000001".into()),
        }
    }

    #[tokio::test]
    async fn category_name_is_trimmed() {
        let (_, minuman) = seeded().await;
        assert_eq!(minuman.name, "Minuman");
    }

    #[tokio::test]
    async fn category_in_use_cannot_be_deleted() {
        let (service, minuman) = seeded().await;
        service.create_product(kopi(minuman.id)).await.unwrap();

        let err = service.delete_category(minuman.id).await.unwrap_err();
        assert_matches!(err, ServiceError::Conflict(ref msg) if msg.contains("in use"));
        assert_eq!(service.get_category(minuman.id).await.unwrap(), minuman);
    }

    #[tokio::test]
    async fn unused_category_is_deleted() {
        let (service, minuman) = seeded().await;
        service.delete_category(minuman.id).await.unwrap();
        assert_matches!(
            service.get_category(minuman.id).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn unsold_product_is_deleted() {
        let (service, minuman) = seeded().await;
        let created = service.create_product(kopi(minuman.id)).await.unwrap();

        service.delete_product(created.id).await.unwrap();
        assert_matches!(
            service.get_product(created.id).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn sold_product_is_kept() {
        let (service, minuman) = seeded().await;
        let created = service.create_product(kopi(minuman.id)).await.unwrap();
        SaleService::new(service.db.clone(), "Umum".into())
            .process_sale(
                SaleInput {
                    customer: None,
                    payment: 3500,
                    items: vec![CartLine {
                        product_id: created.id,
                        quantity: 1,
                    }],
                },
                "Siti",
            )
            .await
            .unwrap();

        assert_matches!(
            service.delete_product(created.id).await,
            Err(ServiceError::Conflict(msg)) if msg.contains("recorded sales")
        );
        assert_eq!(service.get_product(created.id).await.unwrap().stock, 9);
    }

    #[tokio::test]
    async fn deleting_unknown_product_is_not_found() {
        let (service, _) = seeded().await;
        assert_matches!(
            service.delete_product(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn product_requires_existing_category() {
        let (service, _) = seeded().await;
        assert_matches!(
            service.create_product(kopi(Uuid::new_v4())).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let (service, minuman) = seeded().await;
        let mut input = kopi(minuman.id);
        input.price = -1;
        assert_matches!(
            service.create_product(input).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn search_matches_name_or_barcode() {
        let (service, minuman) = seeded().await;
        let created = service.create_product(kopi(minuman.id)).await.unwrap();
        assert_eq!(created.category_name.as_deref(), Some("Minuman"));

        let (by_name, total) = service
            .list_products(ProductQuery {
                search: Some("Susu".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(by_name[0].id, created.id);

        let by_barcode = service.get_product_by_barcode("899000001").await.unwrap();
        assert_eq!(by_barcode.id, created.id);

        let (low, _) = service
            .list_products(ProductQuery {
                low_stock: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(low.is_empty());
    }

    #[tokio::test]
    async fn category_listing_counts_products() {
        let (service, minuman) = seeded().await;
        service.create_product(kopi(minuman.id)).await.unwrap();
        let summaries = service.list_categories().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].product_count, 1);
    }

    #[tokio::test]
    async fn update_can_clear_barcode() {
        let (service, minuman) = seeded().await;
        let created = service.create_product(kopi(minuman.id)).await.unwrap();
        let updated = service
            .update_product(
                created.id,
                UpdateProductInput {
                    barcode: Some(String::new()),
                    price: Some(4000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.barcode, None);
        assert_eq!(updated.price, 4000);
    }
}
