/// Document store access for blog-api
///
/// A thin typed repository over the MongoDB driver. The store guarantees
/// per-document atomicity only; there are no multi-document transactions,
/// and every cross-document invariant in the service layer is maintained
/// by explicit, best-effort cascades.
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneOptions, FindOptions, UpdateOptions};
use mongodb::{Client, Collection, Database};

use crate::error::{AppError, Result};
use crate::models::Record;

pub mod pagination;

pub use pagination::{PagedData, PageWindow};

/// Connect to the store and select the configured database.
pub async fn connect(url: &str, database: &str) -> Result<Database> {
    let client = Client::with_uri_str(url).await?;
    Ok(client.database(database))
}

/// Parse a 24-character hex identity string. An identity that cannot be
/// parsed cannot resolve, so this maps straight to 404.
pub fn parse_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| AppError::NotFound)
}

/// Typed repository for one collection.
#[derive(Clone)]
pub struct Repo<T: Record> {
    collection: Collection<T>,
}

impl<T: Record> Repo<T> {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(T::COLLECTION),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        let oid = parse_id(id)?;
        Ok(self.collection.find_one(doc! { "_id": oid }, None).await?)
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        Ok(self.collection.find_one(filter, None).await?)
    }

    pub async fn find_one_with(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> Result<Option<T>> {
        Ok(self.collection.find_one(filter, options).await?)
    }

    pub async fn filter_by(&self, filter: Document, options: FindOptions) -> Result<Vec<T>> {
        let cursor = self.collection.find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Insert, stamping the creation time and binding the store-generated id.
    pub async fn insert_one(&self, mut record: T) -> Result<T> {
        record.header_mut().created_at = chrono::Utc::now();
        let result = self.collection.insert_one(&record, None).await?;
        record.header_mut().id = result.inserted_id.as_object_id();
        Ok(record)
    }

    /// Full-document replace; there are no partial patch semantics.
    pub async fn replace_by_id(&self, id: ObjectId, record: &T) -> Result<()> {
        self.collection
            .find_one_and_replace(doc! { "_id": id }, record, None)
            .await?;
        Ok(())
    }

    pub async fn delete_by_id(&self, id: ObjectId) -> Result<()> {
        self.collection
            .find_one_and_delete(doc! { "_id": id }, None)
            .await?;
        Ok(())
    }

    pub async fn delete_one(&self, filter: Document) -> Result<Option<T>> {
        Ok(self.collection.find_one_and_delete(filter, None).await?)
    }

    pub async fn update_one(&self, filter: Document, update: Document) -> Result<u64> {
        let result = self.collection.update_one(filter, update, None).await?;
        Ok(result.modified_count)
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Result<u64> {
        let result = self
            .collection
            .update_many(filter, update, options)
            .await?;
        Ok(result.modified_count)
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        Ok(self.collection.count_documents(filter, None).await?)
    }
}
