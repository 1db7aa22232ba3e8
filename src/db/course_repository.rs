use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Links a faculty member to a course they teach to a class in a semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAssignment {
    #[serde(rename = "_id")]
    pub id: String,
    /// User id of the teaching faculty member.
    pub faculty_id: String,
    pub course_id: String,
    /// Id of the class document.
    pub class_id: String,
    pub semester_id: String,
}

/// Repository trait for courses and their teaching assignments.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// All assignments of a class in a semester.
    async fn assignments_for_class(
        &self,
        class_id: &str,
        semester_id: &str,
    ) -> Result<Vec<CourseAssignment>, AppError>;

    /// Fetch the courses with the given ids. Unknown ids are skipped.
    async fn find_courses(&self, ids: &[String]) -> Result<Vec<Course>, AppError>;
}

/// MongoDB implementation of the CourseRepository.
pub struct MongoCourseRepository {
    courses: mongodb::Collection<Course>,
    assignments: mongodb::Collection<CourseAssignment>,
}

impl MongoCourseRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            courses: db.collection("courses"),
            assignments: db.collection("courseassignments"),
        }
    }
}

#[async_trait]
impl CourseRepository for MongoCourseRepository {
    async fn assignments_for_class(
        &self,
        class_id: &str,
        semester_id: &str,
    ) -> Result<Vec<CourseAssignment>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let cursor = self
            .assignments
            .find(doc! { "classId": class_id, "semesterId": semester_id })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_courses(&self, ids: &[String]) -> Result<Vec<Course>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = self.courses.find(doc! { "_id": { "$in": ids.to_vec() } }).await?;
        Ok(cursor.try_collect().await?)
    }
}
