//! Read-side aggregation over sales and stock transfers.
//!
//! Periods are calendar ranges in UTC written as `YYYY-MM-DD`, `YYYY-MM`
//! or `YYYY`. Ranges are half-open: `start <= created_at < end`.

use crate::{
    entities::{product, staff, stock_transfer, transaction, transaction_item, TransferType},
    errors::ServiceError,
    services::export,
};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Query;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Day,
    Month,
    Year,
}

/// A calendar day, month or year in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub kind: PeriodKind,
    label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn invalid_period(raw: &str) -> ServiceError {
    ServiceError::ValidationError(format!(
        "Invalid period '{}': expected YYYY-MM-DD, YYYY-MM or YYYY",
        raw
    ))
}

impl Period {
    pub fn day(date: NaiveDate) -> Option<Self> {
        let next = date.succ_opt()?;
        Some(Self {
            kind: PeriodKind::Day,
            label: date.format("%Y-%m-%d").to_string(),
            start: midnight(date),
            end: midnight(next),
        })
    }

    pub fn month(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            kind: PeriodKind::Month,
            label: first.format("%Y-%m").to_string(),
            start: midnight(first),
            end: midnight(next),
        })
    }

    pub fn year(year: i32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Some(Self {
            kind: PeriodKind::Year,
            label: format!("{:04}", year),
            start: midnight(first),
            end: midnight(next),
        })
    }

    pub fn today(now: DateTime<Utc>) -> Option<Self> {
        Self::day(now.date_naive())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Chart bucket for a timestamp: hour of a day, day of a month, month of a year.
    pub fn bucket(&self, at: DateTime<Utc>) -> String {
        match self.kind {
            PeriodKind::Day => at.format("%H:00").to_string(),
            PeriodKind::Month => at.format("%Y-%m-%d").to_string(),
            PeriodKind::Year => format!("{:04}-{:02}", at.year(), at.month()),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl FromStr for Period {
    type Err = ServiceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        let parts: Vec<&str> = value.split('-').collect();
        let numeric = parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        if !numeric || parts[0].len() != 4 {
            return Err(invalid_period(raw));
        }

        let period = match parts.as_slice() {
            [year] => year.parse().ok().and_then(Period::year),
            [year, month] if month.len() == 2 => match (year.parse(), month.parse()) {
                (Ok(y), Ok(m)) => Period::month(y, m),
                _ => None,
            },
            [_, month, day] if month.len() == 2 && day.len() == 2 => {
                NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .ok()
                    .and_then(Period::day)
            }
            _ => None,
        };
        period.ok_or_else(|| invalid_period(raw))
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct PeriodQuery {
    /// `YYYY-MM-DD`, `YYYY-MM` or `YYYY`
    #[param(example = "2024-03")]
    pub period: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChartPoint {
    pub label: String,
    pub revenue: i64,
    pub transactions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalesReport {
    pub period: String,
    pub kind: PeriodKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_revenue: i64,
    pub transaction_count: u64,
    pub total_items: i64,
    #[schema(value_type = String, example = "12500.50")]
    pub average_transaction: Decimal,
    pub chart: Vec<ChartPoint>,
    pub top_products: Vec<TopProduct>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransferReport {
    pub period: String,
    pub kind: PeriodKind,
    pub transfers: Vec<stock_transfer::Model>,
    pub total_in: i64,
    pub total_out: i64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Dashboard {
    pub today_revenue: i64,
    pub today_transactions: u64,
    pub product_count: u64,
    pub low_stock_count: u64,
    pub low_stock_threshold: i32,
    pub active_staff_count: u64,
}

/// A rendered CSV download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub body: String,
}

/// Average rounded to 2 places, zero when there is nothing to average.
pub fn average(total: i64, count: u64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(total) / Decimal::from(count)).round_dp(2)
}

/// Aggregates transactions and their items (paired with product names)
/// into a sales report.
pub fn summarize_sales(
    period: &Period,
    transactions: &[transaction::Model],
    items: &[(transaction_item::Model, String)],
    top_limit: usize,
) -> SalesReport {
    let total_revenue: i64 = transactions.iter().map(|t| t.total).sum();
    let transaction_count = transactions.len() as u64;
    let total_items: i64 = items.iter().map(|(i, _)| i64::from(i.quantity)).sum();

    let mut buckets: BTreeMap<String, (i64, u64)> = BTreeMap::new();
    for sale in transactions {
        let entry = buckets.entry(period.bucket(sale.created_at)).or_default();
        entry.0 += sale.total;
        entry.1 += 1;
    }
    let chart = buckets
        .into_iter()
        .map(|(label, (revenue, transactions))| ChartPoint {
            label,
            revenue,
            transactions,
        })
        .collect();

    let mut per_product: HashMap<Uuid, TopProduct> = HashMap::new();
    for (item, name) in items {
        let entry = per_product
            .entry(item.product_id)
            .or_insert_with(|| TopProduct {
                product_id: item.product_id,
                product_name: name.clone(),
                quantity: 0,
                revenue: 0,
            });
        entry.quantity += i64::from(item.quantity);
        entry.revenue += item.subtotal();
    }
    let mut top_products: Vec<TopProduct> = per_product.into_values().collect();
    top_products.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| b.quantity.cmp(&a.quantity))
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    top_products.truncate(top_limit);

    SalesReport {
        period: period.label().to_string(),
        kind: period.kind,
        start: period.start,
        end: period.end,
        total_revenue,
        transaction_count,
        total_items,
        average_transaction: average(total_revenue, transaction_count),
        chart,
        top_products,
    }
}

pub fn summarize_transfers(period: &Period, transfers: Vec<stock_transfer::Model>) -> TransferReport {
    let (total_in, total_out) =
        transfers
            .iter()
            .fold((0i64, 0i64), |(ins, outs), t| match t.transfer_type {
                TransferType::In => (ins + i64::from(t.quantity), outs),
                TransferType::Out => (ins, outs + i64::from(t.quantity)),
            });
    TransferReport {
        period: period.label().to_string(),
        kind: period.kind,
        count: transfers.len() as u64,
        transfers,
        total_in,
        total_out,
    }
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    low_stock_threshold: i32,
    top_products_limit: u64,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>, low_stock_threshold: i32, top_products_limit: u64) -> Self {
        Self {
            db,
            low_stock_threshold,
            top_products_limit,
        }
    }

    /// Transactions inside the period, oldest first
    pub async fn transactions_in(
        &self,
        period: &Period,
    ) -> Result<Vec<transaction::Model>, ServiceError> {
        Ok(transaction::Entity::find()
            .filter(transaction::Column::CreatedAt.gte(period.start))
            .filter(transaction::Column::CreatedAt.lt(period.end))
            .order_by_asc(transaction::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    async fn items_in(
        &self,
        period: &Period,
    ) -> Result<Vec<(transaction_item::Model, String)>, ServiceError> {
        let in_period = Query::select()
            .column(transaction::Column::Id)
            .from(transaction::Entity)
            .and_where(transaction::Column::CreatedAt.gte(period.start))
            .and_where(transaction::Column::CreatedAt.lt(period.end))
            .to_owned();

        let rows = transaction_item::Entity::find()
            .filter(transaction_item::Column::TransactionId.in_subquery(in_period))
            .find_also_related(product::Entity)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(item, product)| (item, product.map(|p| p.name).unwrap_or_default()))
            .collect())
    }

    /// Transfers inside a day or month, oldest first
    pub async fn transfers_in(
        &self,
        period: &Period,
    ) -> Result<Vec<stock_transfer::Model>, ServiceError> {
        if period.kind == PeriodKind::Year {
            return Err(ServiceError::ValidationError(
                "Transfer reports cover a day (YYYY-MM-DD) or a month (YYYY-MM)".into(),
            ));
        }
        Ok(stock_transfer::Entity::find()
            .filter(stock_transfer::Column::CreatedAt.gte(period.start))
            .filter(stock_transfer::Column::CreatedAt.lt(period.end))
            .order_by_asc(stock_transfer::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self), fields(period = %period))]
    pub async fn sales_report(&self, period: &Period) -> Result<SalesReport, ServiceError> {
        let transactions = self.transactions_in(period).await?;
        let items = self.items_in(period).await?;
        debug!(transactions = transactions.len(), items = items.len(), "building sales report");
        Ok(summarize_sales(
            period,
            &transactions,
            &items,
            self.top_products_limit as usize,
        ))
    }

    #[instrument(skip(self), fields(period = %period))]
    pub async fn transfer_report(&self, period: &Period) -> Result<TransferReport, ServiceError> {
        let transfers = self.transfers_in(period).await?;
        Ok(summarize_transfers(period, transfers))
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<Dashboard, ServiceError> {
        let today = Period::today(now)
            .ok_or_else(|| ServiceError::InternalError("current date out of range".into()))?;
        let sales_today = self.transactions_in(&today).await?;

        let product_count = product::Entity::find().count(&*self.db).await?;
        let low_stock_count = product::Entity::find()
            .filter(product::Column::Stock.lte(self.low_stock_threshold))
            .count(&*self.db)
            .await?;
        let active_staff_count = staff::Entity::find()
            .filter(staff::Column::Status.eq(true))
            .count(&*self.db)
            .await?;

        Ok(Dashboard {
            today_revenue: sales_today.iter().map(|t| t.total).sum(),
            today_transactions: sales_today.len() as u64,
            product_count,
            low_stock_count,
            low_stock_threshold: self.low_stock_threshold,
            active_staff_count,
        })
    }

    #[instrument(skip(self), fields(period = %period))]
    pub async fn export_sales(&self, period: &Period) -> Result<CsvExport, ServiceError> {
        let rows = self.transactions_in(period).await?;
        Ok(CsvExport {
            filename: export::sales_filename(period),
            body: export::transactions_csv(&rows),
        })
    }

    #[instrument(skip(self), fields(period = %period))]
    pub async fn export_transfers(&self, period: &Period) -> Result<CsvExport, ServiceError> {
        let rows = self.transfers_in(period).await?;
        Ok(CsvExport {
            filename: export::transfers_filename(period),
            body: export::transfers_csv(&rows),
        })
    }
}
