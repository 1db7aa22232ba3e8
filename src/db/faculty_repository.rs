use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A faculty directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faculty {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Repository trait for the faculty directory.
#[async_trait]
pub trait FacultyRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Faculty>, AppError>;

    async fn create(&self, faculty: &Faculty) -> Result<(), AppError>;

    /// Delete by id. Returns `false` if no entry matched.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;
}

/// MongoDB implementation of the FacultyRepository.
pub struct MongoFacultyRepository {
    collection: mongodb::Collection<Faculty>,
}

impl MongoFacultyRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("faculties"),
        }
    }
}

#[async_trait]
impl FacultyRepository for MongoFacultyRepository {
    async fn list(&self) -> Result<Vec<Faculty>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let cursor = self.collection.find(doc! {}).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn create(&self, faculty: &Faculty) -> Result<(), AppError> {
        self.collection.insert_one(faculty).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}
