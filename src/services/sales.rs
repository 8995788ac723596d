use crate::{
    entities::{product, transaction, transaction_item},
    errors::ServiceError,
    services::{clamp_paging, normalize_optional, page_offset},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Checkout: records a transaction, its items and the stock decrements.
///
/// The writes are not wrapped in a database transaction. When a later step
/// fails, earlier writes are undone by compensating statements.
#[derive(Clone)]
pub struct SaleService {
    db: Arc<DatabaseConnection>,
    default_customer: String,
}

/// A cart line after merging and price lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: i64,
}

impl PricedLine {
    pub fn subtotal(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.unit_price)
    }
}

/// Sum of all line subtotals, `None` on overflow.
pub fn sale_total(lines: &[PricedLine]) -> Option<i64> {
    lines
        .iter()
        .try_fold(0i64, |acc, line| acc.checked_add(line.subtotal()?))
}

/// Folds repeated products into one line, keeping first-seen order.
pub fn merge_cart_lines(lines: &[CartLine]) -> Result<Vec<(Uuid, i32)>, ServiceError> {
    let mut merged: Vec<(Uuid, i32)> = Vec::with_capacity(lines.len());
    let mut positions: HashMap<Uuid, usize> = HashMap::new();

    for line in lines {
        if line.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Quantity for product {} must be greater than zero",
                line.product_id
            )));
        }
        match positions.get(&line.product_id) {
            Some(&idx) => {
                merged[idx].1 = merged[idx].1.checked_add(line.quantity).ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Quantity for product {} is too large",
                        line.product_id
                    ))
                })?;
            }
            None => {
                positions.insert(line.product_id, merged.len());
                merged.push((line.product_id, line.quantity));
            }
        }
    }
    Ok(merged)
}

impl SaleService {
    pub fn new(db: Arc<DatabaseConnection>, default_customer: String) -> Self {
        Self {
            db,
            default_customer,
        }
    }

    /// Runs the checkout for `cashier_name`.
    #[instrument(skip(self, input), fields(lines = input.items.len(), payment = input.payment))]
    pub async fn process_sale(
        &self,
        input: SaleInput,
        cashier_name: &str,
    ) -> Result<SaleReceipt, ServiceError> {
        input.validate()?;
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".into()));
        }

        let lines = self.price_lines(&merge_cart_lines(&input.items)?).await?;
        let total = sale_total(&lines)
            .ok_or_else(|| ServiceError::ValidationError("Sale total is too large".into()))?;
        if input.payment < total {
            return Err(ServiceError::ValidationError(format!(
                "Payment {} is less than total {}",
                input.payment, total
            )));
        }

        let customer =
            normalize_optional(input.customer).unwrap_or_else(|| self.default_customer.clone());

        let sale = transaction::ActiveModel {
            customer: Set(customer),
            total: Set(total),
            payment: Set(input.payment),
            change: Set(input.payment - total),
            cashier_name: Set(cashier_name.to_string()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        let items: Vec<transaction_item::Model> = lines
            .iter()
            .map(|line| transaction_item::Model {
                id: Uuid::new_v4(),
                transaction_id: sale.id,
                product_id: line.product_id,
                quantity: line.quantity,
                price_at_purchase: line.unit_price,
            })
            .collect();

        let insert_items = transaction_item::Entity::insert_many(items.iter().map(|item| {
            transaction_item::ActiveModel {
                id: Set(item.id),
                transaction_id: Set(item.transaction_id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                price_at_purchase: Set(item.price_at_purchase),
            }
        }))
        .exec_without_returning(&*self.db)
        .await;

        if let Err(err) = insert_items {
            warn!(transaction_id = %sale.id, error = %err, "item insert failed, removing transaction");
            self.compensate(sale.id, &[]).await;
            return Err(err.into());
        }

        let mut decremented: Vec<(Uuid, i32)> = Vec::with_capacity(lines.len());
        for line in &lines {
            if let Err(err) = self.decrement_stock(line).await {
                warn!(
                    transaction_id = %sale.id,
                    product_id = %line.product_id,
                    error = %err,
                    "stock decrement failed, compensating"
                );
                self.compensate(sale.id, &decremented).await;
                return Err(err);
            }
            decremented.push((line.product_id, line.quantity));
        }

        counter!("kasir_sales_completed_total", 1);
        info!(transaction_id = %sale.id, total, change = sale.change, "sale recorded");

        let names: HashMap<Uuid, String> = lines
            .into_iter()
            .map(|line| (line.product_id, line.product_name))
            .collect();
        Ok(SaleReceipt::new(
            sale,
            items.into_iter().map(|item| {
                let name = names.get(&item.product_id).cloned().unwrap_or_default();
                (item, name)
            }),
        ))
    }

    async fn price_lines(&self, merged: &[(Uuid, i32)]) -> Result<Vec<PricedLine>, ServiceError> {
        let ids: Vec<Uuid> = merged.iter().map(|(id, _)| *id).collect();
        let products: HashMap<Uuid, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        merged
            .iter()
            .map(|(id, quantity)| {
                let found = products
                    .get(id)
                    .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;
                Ok(PricedLine {
                    product_id: found.id,
                    product_name: found.name.clone(),
                    quantity: *quantity,
                    unit_price: found.price,
                })
            })
            .collect()
    }

    /// `stock = stock - q` guarded by `stock >= q`.
    async fn decrement_stock(&self, line: &PricedLine) -> Result<(), ServiceError> {
        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(line.quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(line.product_id))
            .filter(product::Column::Stock.gte(line.quantity))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "Not enough stock for {} (requested {})",
                line.product_name, line.quantity
            )));
        }
        Ok(())
    }

    /// Restores decremented stock, then removes the items and the transaction.
    /// Failures here are logged; the caller still reports its original error.
    async fn compensate(&self, transaction_id: Uuid, decremented: &[(Uuid, i32)]) {
        let mut compensated = true;

        for (product_id, quantity) in decremented {
            let restore = product::Entity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).add(*quantity),
                )
                .filter(product::Column::Id.eq(*product_id))
                .exec(&*self.db)
                .await;
            if let Err(err) = restore {
                compensated = false;
                error!(%transaction_id, %product_id, quantity, error = %err, "failed to restore stock");
            }
        }

        if let Err(err) = transaction_item::Entity::delete_many()
            .filter(transaction_item::Column::TransactionId.eq(transaction_id))
            .exec(&*self.db)
            .await
        {
            compensated = false;
            error!(%transaction_id, error = %err, "failed to delete transaction items");
        }

        if let Err(err) = transaction::Entity::delete_by_id(transaction_id)
            .exec(&*self.db)
            .await
        {
            compensated = false;
            error!(%transaction_id, error = %err, "failed to delete transaction");
        }

        counter!("kasir_sales_compensated_total", 1);
        warn!(%transaction_id, compensated, "sale rolled back");
    }

    /// One transaction with its items, for receipts.
    #[instrument(skip(self))]
    pub async fn get_transaction(&self, id: Uuid) -> Result<SaleReceipt, ServiceError> {
        let sale = transaction::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Transaction {} not found", id)))?;

        let items = transaction_item::Entity::find()
            .filter(transaction_item::Column::TransactionId.eq(id))
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;

        Ok(SaleReceipt::new(
            sale,
            items.into_iter().map(|(item, product)| {
                let name = product.map(|p| p.name).unwrap_or_default();
                (item, name)
            }),
        ))
    }

    /// Transactions, newest first
    #[instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        query: TransactionQuery,
    ) -> Result<(Vec<transaction::Model>, u64), ServiceError> {
        let (page, per_page) = clamp_paging(query.page, query.per_page);

        let mut select = transaction::Entity::find();
        if let Some(from) = query.from {
            select = select.filter(transaction::Column::CreatedAt.gte(from));
        }
        if let Some(to) = query.to {
            select = select.filter(transaction::Column::CreatedAt.lt(to));
        }
        if let Some(customer) = normalize_optional(query.customer) {
            select = select.filter(transaction::Column::Customer.contains(&customer));
        }

        let total = select.clone().count(&*self.db).await?;
        let rows = select
            .order_by_desc(transaction::Column::CreatedAt)
            .limit(per_page)
            .offset(page_offset(page, per_page))
            .all(&*self.db)
            .await?;
        Ok((rows, total))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    #[schema(example = 2)]
    pub quantity: i32,
}

/// Checkout request
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct SaleInput {
    /// Blank falls back to the configured walk-in customer name.
    pub customer: Option<String>,
    #[validate(range(min = 0))]
    #[schema(example = 10000)]
    pub payment: i64,
    pub items: Vec<CartLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReceiptLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_purchase: i64,
    pub subtotal: i64,
}

/// A transaction together with its items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SaleReceipt {
    pub transaction: transaction::Model,
    pub items: Vec<ReceiptLine>,
}

impl SaleReceipt {
    fn new(
        transaction: transaction::Model,
        items: impl IntoIterator<Item = (transaction_item::Model, String)>,
    ) -> Self {
        let items = items
            .into_iter()
            .map(|(item, product_name)| ReceiptLine {
                subtotal: item.subtotal(),
                id: item.id,
                product_id: item.product_id,
                product_name,
                quantity: item.quantity,
                price_at_purchase: item.price_at_purchase,
            })
            .collect();
        Self { transaction, items }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams)]
pub struct TransactionQuery {
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
    pub customer: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}
