use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A photo stored on the media host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HonorPhoto {
    pub url: String,
    /// Storage key, needed to remove the object later.
    pub public_id: String,
}

/// A student's rank on a class's honor roll for one semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Honor {
    #[serde(rename = "_id")]
    pub id: String,
    /// User id of the student.
    pub student: String,
    pub rank: u32,
    pub semester: String,
    /// Id of the class document.
    pub class_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<HonorPhoto>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Outcome of [`HonorRepository::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertedHonor {
    pub honor: Honor,
    /// `true` when no entry existed for the key.
    pub inserted: bool,
}

/// The uniqueness key of an honor entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HonorKey {
    pub student: String,
    pub semester: String,
    pub class_id: String,
}

impl HonorKey {
    pub fn filter(&self) -> Document {
        doc! {
            "student": &self.student,
            "semester": &self.semester,
            "classId": &self.class_id,
        }
    }
}

/// Repository trait for honor-roll entries.
#[async_trait]
pub trait HonorRepository: Send + Sync {
    /// Honors of a class in a semester, ordered by rank.
    async fn list(&self, class_id: &str, semester: &str) -> Result<Vec<Honor>, AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Honor>, AppError>;

    async fn find_by_key(&self, key: &HonorKey) -> Result<Option<Honor>, AppError>;

    /// Insert or update the entry for `key` in one atomic step.
    /// An existing photo is kept when `photo` is `None`.
    async fn upsert(
        &self,
        key: &HonorKey,
        rank: u32,
        photo: Option<&HonorPhoto>,
    ) -> Result<UpsertedHonor, AppError>;

    /// Patch rank and/or photo. Returns `None` if the entry does not exist.
    async fn update(
        &self,
        id: &str,
        rank: Option<u32>,
        photo: Option<&HonorPhoto>,
    ) -> Result<Option<Honor>, AppError>;

    /// Delete and return the removed entry.
    async fn delete(&self, id: &str) -> Result<Option<Honor>, AppError>;
}

fn photo_document(photo: &HonorPhoto) -> Document {
    doc! { "url": &photo.url, "publicId": &photo.public_id }
}

/// MongoDB implementation of the HonorRepository.
pub struct MongoHonorRepository {
    collection: mongodb::Collection<Honor>,
}

impl MongoHonorRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("honors"),
        }
    }

    /// Create the unique (student, semester, class) index the upsert relies on.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let index = IndexModel::builder()
            .keys(doc! { "student": 1, "semester": 1, "classId": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection.create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl HonorRepository for MongoHonorRepository {
    async fn list(&self, class_id: &str, semester: &str) -> Result<Vec<Honor>, AppError> {
        use futures::TryStreamExt;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder().sort(doc! { "rank": 1 }).build();
        let cursor = self
            .collection
            .find(doc! { "classId": class_id, "semester": semester })
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Honor>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_key(&self, key: &HonorKey) -> Result<Option<Honor>, AppError> {
        Ok(self.collection.find_one(key.filter()).await?)
    }

    async fn upsert(
        &self,
        key: &HonorKey,
        rank: u32,
        photo: Option<&HonorPhoto>,
    ) -> Result<UpsertedHonor, AppError> {
        use mongodb::options::UpdateOptions;

        let now = mongodb::bson::DateTime::now();
        let mut set = doc! { "rank": i64::from(rank), "updatedAt": now };
        if let Some(photo) = photo {
            set.insert("photo", photo_document(photo));
        }

        let update = doc! {
            "$set": set,
            "$setOnInsert": {
                "_id": uuid::Uuid::new_v4().to_string(),
                "createdAt": now,
            },
        };

        let result = self
            .collection
            .update_one(key.filter(), update)
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await?;

        let honor = self
            .find_by_key(key)
            .await?
            .ok_or_else(|| AppError::Database("Honor upsert left no document".into()))?;

        Ok(UpsertedHonor {
            honor,
            inserted: result.upserted_id.is_some(),
        })
    }

    async fn update(
        &self,
        id: &str,
        rank: Option<u32>,
        photo: Option<&HonorPhoto>,
    ) -> Result<Option<Honor>, AppError> {
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let mut set = doc! { "updatedAt": mongodb::bson::DateTime::now() };
        if let Some(rank) = rank {
            set.insert("rank", i64::from(rank));
        }
        if let Some(photo) = photo {
            set.insert("photo", photo_document(photo));
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .with_options(options)
            .await?)
    }

    async fn delete(&self, id: &str) -> Result<Option<Honor>, AppError> {
        Ok(self.collection.find_one_and_delete(doc! { "_id": id }).await?)
    }
}
