//! `SeaORM` Entity for crypto_transaction_details table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::RateOrigin;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "crypto_transaction_details")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub transaction_id: Uuid,
    pub currency: String,
    pub network: String,
    #[sea_orm(column_type = "Decimal(Some((28, 8)))")]
    pub foreign_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((28, 12)))")]
    pub rate: Decimal,
    pub rate_origin: RateOrigin,
    pub external_ref: Option<String>,
    pub wallet_from: Option<String>,
    pub wallet_to: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((28, 8)))", nullable)]
    pub fee: Option<Decimal>,
    pub block_number: Option<i64>,
    pub confirmation_count: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id",
        on_delete = "Cascade"
    )]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
