use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Entity not found")]
    NotFound,
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("Validation: {0}")]
    Validation(String),
}

impl DaoError {
    /// True for persistence-layer failures, as opposed to caller mistakes.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DaoError::Mongo(_) | DaoError::BsonSer(_) | DaoError::BsonDe(_) | DaoError::Unavailable(_)
        )
    }
}

pub type DaoResult<T> = Result<T, DaoError>;

pub const MAX_PER_PAGE: u64 = 100;

/// The driver refuses skips that don't fit an i64.
const MAX_SKIP: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl PaginationParams {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// page >= 1, per_page in [1, max_per_page].
    pub fn clamped(&self, max_per_page: u64) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, max_per_page.max(1)),
        }
    }

    /// Saturates, so a page far past the end just yields nothing.
    pub fn skip(&self) -> u64 {
        self.page
            .max(1)
            .saturating_sub(1)
            .saturating_mul(self.per_page)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, params: &PaginationParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages: total.div_ceil(params.per_page.max(1)),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T> BaseDao<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Unpin + Send + Sync,
{
    pub fn new(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<T>(collection_name),
        }
    }

    pub fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    pub async fn find_many(&self, filter: Document, sort: Option<Document>) -> DaoResult<Vec<T>> {
        let mut cursor = if let Some(sort) = sort {
            self.collection.find(filter).sort(sort).await?
        } else {
            self.collection.find(filter).await?
        };

        let mut results = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            results.push(doc);
        }
        Ok(results)
    }

    /// Callers are expected to pass already-clamped params.
    pub async fn find_paginated(
        &self,
        filter: Document,
        sort: Document,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<T>> {
        let total = self.collection.count_documents(filter.clone()).await?;

        let mut cursor = self
            .collection
            .find(filter)
            .sort(sort)
            .skip(params.skip().min(MAX_SKIP))
            .limit(params.per_page as i64)
            .await?;

        let mut items = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            items.push(doc);
        }

        Ok(PaginatedResult::new(items, total, params))
    }

    /// Ids matching `filter` in `sort` order, after skipping the first `skip`.
    pub async fn find_ids(
        &self,
        filter: Document,
        sort: Document,
        skip: u64,
    ) -> DaoResult<Vec<ObjectId>> {
        let mut cursor = self
            .collection
            .clone_with_type::<Document>()
            .find(filter)
            .sort(sort)
            .skip(skip.min(MAX_SKIP))
            .projection(doc! { "_id": 1 })
            .await?;

        let mut ids = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            if let Ok(id) = doc.get_object_id("_id") {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    pub async fn insert_one(&self, doc: &T) -> DaoResult<ObjectId> {
        let result = self.collection.insert_one(doc).await?;

        let id = result.inserted_id.as_object_id().ok_or_else(|| {
            DaoError::Unavailable("inserted_id is not an ObjectId".to_string())
        })?;
        debug!(?id, "Inserted document");
        Ok(id)
    }

    /// Unlike a generic update this never stamps `updated_at`: callers decide
    /// exactly which fields move.
    pub async fn update_one(&self, filter: Document, update: Document) -> DaoResult<bool> {
        let result = self.collection.update_one(filter, update).await?;
        Ok(result.modified_count > 0)
    }

    pub async fn update_many(&self, filter: Document, update: Document) -> DaoResult<u64> {
        let result = self.collection.update_many(filter, update).await?;
        Ok(result.modified_count)
    }

    pub async fn hard_delete(&self, filter: Document) -> DaoResult<u64> {
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    pub async fn count(&self, filter: Document) -> DaoResult<u64> {
        Ok(self.collection.count_documents(filter).await?)
    }
}
