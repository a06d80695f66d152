use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde_json::Value;
use tracing::{debug, instrument};

use super::document_entity::{self, Entity as Documents};
use super::{merge_fields, DocumentStore, FieldFilter, StoreError};

/// Document store backed by the `documents` table.
///
/// Each row holds one JSON body; field filters run over the collection's rows
/// after they are loaded.
#[derive(Debug, Clone)]
pub struct SqlDocumentStore {
    db: DatabaseConnection,
}

impl SqlDocumentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn key(collection: &str, id: &str) -> (String, String) {
    (collection.to_string(), id.to_string())
}

#[async_trait]
impl DocumentStore for SqlDocumentStore {
    #[instrument(skip(self))]
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let row = Documents::find_by_id(key(collection, id)).one(&self.db).await?;
        Ok(row.map(|model| model.body))
    }

    #[instrument(skip(self, doc))]
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let row = document_entity::ActiveModel {
            collection: Set(collection.to_string()),
            id: Set(id.to_string()),
            body: Set(doc),
            updated_at: Set(Utc::now()),
        };

        Documents::insert(row)
            .on_conflict(
                OnConflict::columns([
                    document_entity::Column::Collection,
                    document_entity::Column::Id,
                ])
                .update_columns([
                    document_entity::Column::Body,
                    document_entity::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, partial))]
    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;

        let existing = Documents::find_by_id(key(collection, id))
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        let mut body = existing.body.clone();
        merge_fields(collection, id, &mut body, partial)?;

        let mut row: document_entity::ActiveModel = existing.into();
        row.body = Set(body);
        row.updated_at = Set(Utc::now());
        row.update(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let result = Documents::delete_by_id(key(collection, id))
            .exec(&self.db)
            .await?;
        debug!(rows = result.rows_affected, "document delete");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<Value>, StoreError> {
        let rows = Documents::find()
            .filter(document_entity::Column::Collection.eq(collection))
            .order_by_asc(document_entity::Column::Id)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|model| model.body)
            .filter(|body| filter.matches(body))
            .collect())
    }
}
