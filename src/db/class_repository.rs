use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A class (cohort) of students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(rename = "_id")]
    pub id: String,
    /// Human-facing class identifier, e.g. `CSE-2024-A`.
    pub class_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester_id: Option<String>,
    /// User ids of the enrolled students.
    #[serde(default)]
    pub students: Vec<String>,
}

/// Repository trait for classes.
#[async_trait]
pub trait ClassRepository: Send + Sync {
    /// Find a class by its identifier string.
    async fn find_by_identifier(&self, class_id: &str) -> Result<Option<Class>, AppError>;

    /// Find the class attached to a (course, semester) pair.
    async fn find_by_course(
        &self,
        course_id: &str,
        semester_id: &str,
    ) -> Result<Option<Class>, AppError>;
}

/// MongoDB implementation of the ClassRepository.
pub struct MongoClassRepository {
    collection: mongodb::Collection<Class>,
}

impl MongoClassRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("classes"),
        }
    }
}

#[async_trait]
impl ClassRepository for MongoClassRepository {
    async fn find_by_identifier(&self, class_id: &str) -> Result<Option<Class>, AppError> {
        use mongodb::bson::doc;

        Ok(self.collection.find_one(doc! { "classId": class_id }).await?)
    }

    async fn find_by_course(
        &self,
        course_id: &str,
        semester_id: &str,
    ) -> Result<Option<Class>, AppError> {
        use mongodb::bson::doc;

        Ok(self
            .collection
            .find_one(doc! { "courseId": course_id, "semesterId": semester_id })
            .await?)
    }
}
