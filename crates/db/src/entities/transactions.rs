//! `SeaORM` Entity for transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{TransactionStatus, TransactionType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub description: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    #[sea_orm(column_type = "Decimal(Some((28, 8)))")]
    pub total_amount: Decimal,
    pub transaction_date: Date,
    pub project_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub counterparty_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transaction_entries::Entity")]
    TransactionEntries,
    #[sea_orm(has_one = "super::crypto_transaction_details::Entity")]
    CryptoTransactionDetails,
}

impl Related<super::transaction_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionEntries.def()
    }
}

impl Related<super::crypto_transaction_details::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CryptoTransactionDetails.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
