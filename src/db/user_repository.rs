use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::models::Role;
use crate::error::AppError;

/// A registered user (student, faculty member, CA or admin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    /// Identity-provider uid.
    pub uid: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_no: Option<String>,
    pub user_role: Role,
    /// Identifier string of the class the user belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
}

/// The subset of a user that is safe to embed in other responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_no: Option<String>,
}

impl User {
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            photo_url: self.photo_url.clone(),
            roll_no: self.roll_no.clone(),
        }
    }
}

/// Repository trait for users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by identity-provider uid.
    async fn find_by_uid(&self, uid: &str) -> Result<Option<User>, AppError>;

    /// Fetch the users with the given ids. Unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError>;
}

/// MongoDB implementation of the UserRepository.
pub struct MongoUserRepository {
    collection: mongodb::Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<User>, AppError> {
        use mongodb::bson::doc;

        Ok(self.collection.find_one(doc! { "uid": uid }).await?)
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = self.collection.find(doc! { "_id": { "$in": ids.to_vec() } }).await?;
        Ok(cursor.try_collect().await?)
    }
}
