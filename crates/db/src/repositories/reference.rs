//! Projects, categories and counterparties that transactions may link to.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use tally_shared::types::{CategoryId, CounterpartyId, ProjectId};
use uuid::Uuid;

use crate::entities::{categories, counterparties, projects};

/// Repository for link targets. The ledger only checks their existence.
#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    db: DatabaseConnection,
}

impl ReferenceRepository {
    /// Creates a new reference repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a project.
    pub async fn create_project(&self, name: &str) -> Result<ProjectId, DbErr> {
        let model = projects::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await?;
        Ok(ProjectId::from_uuid(model.id))
    }

    /// Creates a category.
    pub async fn create_category(&self, name: &str) -> Result<CategoryId, DbErr> {
        let model = categories::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await?;
        Ok(CategoryId::from_uuid(model.id))
    }

    /// Creates a counterparty.
    pub async fn create_counterparty(&self, name: &str) -> Result<CounterpartyId, DbErr> {
        let model = counterparties::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await?;
        Ok(CounterpartyId::from_uuid(model.id))
    }
}
