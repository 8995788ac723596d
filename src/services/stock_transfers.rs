use crate::{
    entities::{product, stock_transfer, TransferType},
    errors::ServiceError,
    services::{clamp_paging, normalize_optional, normalize_required, page_offset},
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
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

/// Who performed a stock movement
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Option<Uuid>,
    pub name: String,
}

/// Manual stock adjustments with a before/after ledger
#[derive(Clone)]
pub struct StockTransferService {
    db: Arc<DatabaseConnection>,
}

impl StockTransferService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Moves stock in or out of a product and appends the ledger entry.
    ///
    /// The product's stock is written first. If the ledger append then fails,
    /// the stock is written back to its previous value before the error is
    /// returned. Two concurrent transfers on one product can interleave
    /// between the read and the write.
    #[instrument(skip(self, input, actor), fields(product_id = %input.product_id, kind = %input.transfer_type, quantity = input.quantity))]
    pub async fn record_transfer(
        &self,
        input: RecordTransferInput,
        actor: &Actor,
    ) -> Result<stock_transfer::Model, ServiceError> {
        input.validate()?;
        let reason = normalize_required(&input.reason, "reason")?;

        let target = product::Entity::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let stock_before = target.stock;
        let stock_after = input
            .transfer_type
            .apply(stock_before, input.quantity)
            .ok_or_else(|| match input.transfer_type {
                TransferType::In => ServiceError::ValidationError(format!(
                    "Transferring in {} would overflow the stock of {} ({})",
                    input.quantity, target.name, stock_before
                )),
                TransferType::Out => ServiceError::InsufficientStock(format!(
                    "{} has {} in stock, cannot transfer out {}",
                    target.name, stock_before, input.quantity
                )),
            })?;

        self.write_stock(target.id, stock_after).await?;

        let entry = stock_transfer::ActiveModel {
            product_id: Set(target.id),
            product_name: Set(target.name.clone()),
            transfer_type: Set(input.transfer_type),
            quantity: Set(input.quantity),
            reason: Set(reason),
            notes: Set(normalize_optional(input.notes)),
            stock_before: Set(stock_before),
            stock_after: Set(stock_after),
            user_id: Set(actor.user_id),
            user_name: Set(actor.name.clone()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await;

        match entry {
            Ok(entry) => {
                info!(transfer_id = %entry.id, stock_before, stock_after, "stock transfer recorded");
                Ok(entry)
            }
            Err(append_err) => {
                warn!(error = %append_err, "ledger append failed, restoring stock");
                if let Err(restore_err) = self.write_stock(target.id, stock_before).await {
                    error!(
                        product_id = %target.id,
                        stock_before,
                        error = %restore_err,
                        "failed to restore stock after ledger failure"
                    );
                }
                Err(append_err.into())
            }
        }
    }

    async fn write_stock(&self, product_id: Uuid, stock: i32) -> Result<(), ServiceError> {
        let result = product::Entity::update_many()
            .col_expr(product::Column::Stock, Expr::value(stock))
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }
        Ok(())
    }

    /// Ledger entries, newest first
    #[instrument(skip(self))]
    pub async fn list_transfers(
        &self,
        query: TransferQuery,
    ) -> Result<(Vec<stock_transfer::Model>, u64), ServiceError> {
        let (page, per_page) = clamp_paging(query.page, query.per_page);

        let mut select = stock_transfer::Entity::find();
        if let Some(product_id) = query.product_id {
            select = select.filter(stock_transfer::Column::ProductId.eq(product_id));
        }
        if let Some(kind) = query.transfer_type {
            select = select.filter(stock_transfer::Column::TransferType.eq(kind));
        }
        if let Some(from) = query.from {
            select = select.filter(stock_transfer::Column::CreatedAt.gte(from));
        }
        if let Some(to) = query.to {
            select = select.filter(stock_transfer::Column::CreatedAt.lt(to));
        }

        let total = select.clone().count(&*self.db).await?;
        let rows = select
            .order_by_desc(stock_transfer::Column::CreatedAt)
            .limit(per_page)
            .offset(page_offset(page, per_page))
            .all(&*self.db)
            .await?;
        Ok((rows, total))
    }

    /// Full history of one product, newest first
    #[instrument(skip(self))]
    pub async fn transfers_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<stock_transfer::Model>, ServiceError> {
        let exists = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .is_some();
        if !exists {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        Ok(stock_transfer::Entity::find()
            .filter(stock_transfer::Column::ProductId.eq(product_id))
            .order_by_desc(stock_transfer::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_transfer(&self, id: Uuid) -> Result<stock_transfer::Model, ServiceError> {
        stock_transfer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Stock transfer {} not found", id)))
    }
}

/// Input for a manual stock movement
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct RecordTransferInput {
    pub product_id: Uuid,
    #[serde(rename = "type")]
    pub transfer_type: TransferType,
    #[validate(range(min = 1))]
    #[schema(example = 5)]
    pub quantity: i32,
    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Restock dari supplier")]
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams)]
pub struct TransferQuery {
    pub product_id: Option<Uuid>,
    #[serde(rename = "type")]
    #[param(rename = "type")]
    pub transfer_type: Option<TransferType>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::category;
    use crate::services::test_support::{exec, memory_db};
    use assert_matches::assert_matches;

    async fn product_with_stock(db: &DatabaseConnection, stock: i32) -> product::Model {
        let cat = category::ActiveModel {
            name: Set("Sembako".into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
        product::ActiveModel {
            name: Set("Gula 1kg".into()),
            price: Set(15000),
            stock: Set(stock),
            category_id: Set(cat.id),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    fn actor() -> Actor {
        Actor {
            user_id: None,
            name: "Admin Toko".into(),
        }
    }

    fn transfer(product_id: Uuid, kind: TransferType, quantity: i32) -> RecordTransferInput {
        RecordTransferInput {
            product_id,
            transfer_type: kind,
            quantity,
            reason: "Stock opname".into(),
            notes: None,
        }
    }

    async fn stock_of(db: &DatabaseConnection, id: Uuid) -> i32 {
        product::Entity::find_by_id(id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    #[tokio::test]
    async fn transfer_in_snapshots_before_and_after() {
        let db = memory_db().await;
        let gula = product_with_stock(&db, 10).await;
        let service = StockTransferService::new(db.clone());

        let entry = service
            .record_transfer(transfer(gula.id, TransferType::In, 5), &actor())
            .await
            .unwrap();
        assert_eq!(entry.stock_before, 10);
        assert_eq!(entry.stock_after, 15);
        assert_eq!(entry.product_name, "Gula 1kg");
        assert_eq!(stock_of(&db, gula.id).await, 15);
    }

    #[tokio::test]
    async fn transfer_out_beyond_stock_is_rejected() {
        let db = memory_db().await;
        let gula = product_with_stock(&db, 10).await;
        let service = StockTransferService::new(db.clone());

        let err = service
            .record_transfer(transfer(gula.id, TransferType::Out, 15), &actor())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InsufficientStock(_));
        assert_eq!(stock_of(&db, gula.id).await, 10);
        assert!(service.transfers_for_product(gula.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transfer_in_past_stock_ceiling_is_invalid() {
        let db = memory_db().await;
        let gula = product_with_stock(&db, i32::MAX - 1).await;
        let service = StockTransferService::new(db.clone());

        let err = service
            .record_transfer(transfer(gula.id, TransferType::In, 2), &actor())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg.contains("overflow"));
        assert_eq!(stock_of(&db, gula.id).await, i32::MAX - 1);
        assert!(service.transfers_for_product(gula.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_ledger_append_restores_stock() {
        let db = memory_db().await;
        let gula = product_with_stock(&db, 10).await;
        exec(
            &db,
            "CREATE TRIGGER reject_ledger BEFORE INSERT ON stock_transfers \
             BEGIN SELECT RAISE(ABORT, 'ledger unavailable'); END;",
        )
        .await;
        let service = StockTransferService::new(db.clone());

        let err = service
            .record_transfer(transfer(gula.id, TransferType::Out, 4), &actor())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::DatabaseError(_));
        assert_eq!(stock_of(&db, gula.id).await, 10);
    }

    #[tokio::test]
    async fn zero_quantity_and_blank_reason_are_rejected() {
        let db = memory_db().await;
        let gula = product_with_stock(&db, 10).await;
        let service = StockTransferService::new(db);

        assert_matches!(
            service
                .record_transfer(transfer(gula.id, TransferType::In, 0), &actor())
                .await,
            Err(ServiceError::ValidationError(_))
        );

        let mut blank = transfer(gula.id, TransferType::In, 1);
        blank.reason = "   ".into();
        assert_matches!(
            service.record_transfer(blank, &actor()).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let db = memory_db().await;
        let gula = product_with_stock(&db, 10).await;
        let service = StockTransferService::new(db);

        let first = service
            .record_transfer(transfer(gula.id, TransferType::In, 1), &actor())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = service
            .record_transfer(transfer(gula.id, TransferType::Out, 2), &actor())
            .await
            .unwrap();

        let history = service.transfers_for_product(gula.id).await.unwrap();
        assert_eq!(
            history.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        assert_eq!(service.get_transfer(first.id).await.unwrap(), first);

        let (outs, total) = service
            .list_transfers(TransferQuery {
                transfer_type: Some(TransferType::Out),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(outs[0].id, second.id);
    }
}
