use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Direction of a manual stock movement.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransferType {
    #[sea_orm(string_value = "in")]
    In,
    #[sea_orm(string_value = "out")]
    Out,
}

impl TransferType {
    /// Stock level after moving `quantity` units, or `None` when it would go
    /// negative or past `i32::MAX`.
    pub fn apply(self, stock_before: i32, quantity: i32) -> Option<i32> {
        let after = match self {
            TransferType::In => stock_before.checked_add(quantity)?,
            TransferType::Out => stock_before.checked_sub(quantity)?,
        };
        (after >= 0).then_some(after)
    }

    /// Quantity with its direction applied, e.g. `+5` or `-3`.
    pub fn signed(self, quantity: i32) -> String {
        match self {
            TransferType::In => format!("+{}", quantity),
            TransferType::Out => format!("-{}", quantity),
        }
    }
}

/// Append-only ledger entry for a manual stock adjustment.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = StockTransfer)]
#[sea_orm(table_name = "stock_transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub transfer_type: TransferType,
    pub quantity: i32,
    pub reason: String,
    pub notes: Option<String>,
    pub stock_before: i32,
    pub stock_after: i32,
    pub user_id: Option<Uuid>,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(Utc::now());
            }
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn out_below_zero_is_rejected() {
        assert_eq!(TransferType::Out.apply(10, 15), None);
        assert_eq!(TransferType::Out.apply(10, 10), Some(0));
        assert_eq!(TransferType::In.apply(10, 5), Some(15));
    }

    #[test]
    fn signed_quantity_has_direction() {
        assert_eq!(TransferType::In.signed(5), "+5");
        assert_eq!(TransferType::Out.signed(3), "-3");
    }

    proptest! {
        #[test]
        fn stock_after_matches_direction(before in 0i32..100_000, qty in 1i32..100_000) {
            let incoming = TransferType::In.apply(before, qty).unwrap();
            prop_assert_eq!(incoming, before + qty);
            match TransferType::Out.apply(before, qty) {
                Some(after) => {
                    prop_assert_eq!(after, before - qty);
                    prop_assert!(after >= 0);
                }
                None => prop_assert!(qty > before),
            }
        }
    }
}
