use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::{self, Bson, Document};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::AppError;

/// Timestamps as they appear in API responses and form input. Stored
/// records keep BSON dates.
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
    use serde::Serializer;

    /// RFC 3339 with millisecond precision and a `Z` suffix.
    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or_else(|| format!("invalid date '{raw}'"))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(value))
    }
}

/// The five kinds of course-scoped material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Deadline,
    Syllabus,
    CourseMaterial,
    Note,
    Whiteboard,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 5] = [
        MaterialKind::Deadline,
        MaterialKind::Syllabus,
        MaterialKind::CourseMaterial,
        MaterialKind::Note,
        MaterialKind::Whiteboard,
    ];

    /// Parse the singular route segment used by mutations
    /// (`deadline`, `syllabus`, `material`, `note`, `whiteboard`).
    pub fn from_segment(s: &str) -> Option<Self> {
        match s {
            "deadline" => Some(MaterialKind::Deadline),
            "syllabus" => Some(MaterialKind::Syllabus),
            "material" => Some(MaterialKind::CourseMaterial),
            "note" => Some(MaterialKind::Note),
            "whiteboard" => Some(MaterialKind::Whiteboard),
            _ => None,
        }
    }

    /// Parse the plural `?type=` filter used by retrieval.
    pub fn from_filter(s: &str) -> Option<Self> {
        match s {
            "deadlines" => Some(MaterialKind::Deadline),
            "syllabus" => Some(MaterialKind::Syllabus),
            "materials" => Some(MaterialKind::CourseMaterial),
            "notes" => Some(MaterialKind::Note),
            "whiteboard" => Some(MaterialKind::Whiteboard),
            _ => None,
        }
    }

    pub fn segment(&self) -> &'static str {
        match self {
            MaterialKind::Deadline => "deadline",
            MaterialKind::Syllabus => "syllabus",
            MaterialKind::CourseMaterial => "material",
            MaterialKind::Note => "note",
            MaterialKind::Whiteboard => "whiteboard",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            MaterialKind::Deadline => "deadlines",
            MaterialKind::Syllabus => "syllabi",
            MaterialKind::CourseMaterial => "coursematerials",
            MaterialKind::Note => "sharednotes",
            MaterialKind::Whiteboard => "whiteboardshots",
        }
    }

    /// Field and direction (1 ascending, -1 descending) listings are sorted by.
    pub fn sort_order(&self) -> (&'static str, i32) {
        match self {
            MaterialKind::Deadline => ("dueDate", 1),
            MaterialKind::Whiteboard => ("lectureDate", -1),
            MaterialKind::Syllabus | MaterialKind::CourseMaterial | MaterialKind::Note => {
                ("uploadedAt", -1)
            }
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeadlineCategory {
    Assignment,
    Project,
    Quiz,
    Exam,
    Other,
}

impl DeadlineCategory {
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ASSIGNMENT" => Some(DeadlineCategory::Assignment),
            "PROJECT" => Some(DeadlineCategory::Project),
            "QUIZ" => Some(DeadlineCategory::Quiz),
            "EXAM" => Some(DeadlineCategory::Exam),
            "OTHER" => Some(DeadlineCategory::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeadlineStatus {
    #[default]
    Upcoming,
    Ongoing,
    Completed,
}

impl DeadlineStatus {
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "UPCOMING" => Some(DeadlineStatus::Upcoming),
            "ONGOING" => Some(DeadlineStatus::Ongoing),
            "COMPLETED" => Some(DeadlineStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialCategory {
    LectureNote,
    Presentation,
    Reference,
    Other,
}

impl MaterialCategory {
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LECTURE_NOTE" => Some(MaterialCategory::LectureNote),
            "PRESENTATION" => Some(MaterialCategory::Presentation),
            "REFERENCE" => Some(MaterialCategory::Reference),
            "OTHER" => Some(MaterialCategory::Other),
            _ => None,
        }
    }
}

/// Attributes shared by every material kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialBase {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// User id of the uploader.
    pub uploaded_by: String,
    pub course_id: String,
    pub semester_id: String,
    /// Id of the class document the material is scoped to.
    pub class_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deadline {
    #[serde(flatten)]
    pub base: MaterialBase,
    pub file_url: String,
    pub file_type: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub due_date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub category: DeadlineCategory,
    #[serde(default)]
    pub status: DeadlineStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Syllabus {
    #[serde(flatten)]
    pub base: MaterialBase,
    pub file_url: String,
    pub file_type: String,
}

/// Lecture notes, presentations, references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMaterial {
    #[serde(flatten)]
    pub base: MaterialBase,
    pub file_url: String,
    pub file_type: String,
    pub material_type: MaterialCategory,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedNote {
    #[serde(flatten)]
    pub base: MaterialBase,
    pub file_url: String,
    pub file_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// User ids; each user appears at most once.
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub is_verified: bool,
    pub shared_by: String,
}

/// One uploaded file of a whiteboard shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardShot {
    #[serde(flatten)]
    pub base: MaterialBase,
    pub files: Vec<FileRef>,
    pub topic: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub lecture_date: DateTime<Utc>,
}

/// Any stored material.
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Deadline(Deadline),
    Syllabus(Syllabus),
    CourseMaterial(CourseMaterial),
    Note(SharedNote),
    Whiteboard(WhiteboardShot),
}

impl Material {
    pub fn kind(&self) -> MaterialKind {
        match self {
            Material::Deadline(_) => MaterialKind::Deadline,
            Material::Syllabus(_) => MaterialKind::Syllabus,
            Material::CourseMaterial(_) => MaterialKind::CourseMaterial,
            Material::Note(_) => MaterialKind::Note,
            Material::Whiteboard(_) => MaterialKind::Whiteboard,
        }
    }

    pub fn base(&self) -> &MaterialBase {
        match self {
            Material::Deadline(m) => &m.base,
            Material::Syllabus(m) => &m.base,
            Material::CourseMaterial(m) => &m.base,
            Material::Note(m) => &m.base,
            Material::Whiteboard(m) => &m.base,
        }
    }

    pub fn to_document(&self) -> Result<Document, AppError> {
        let doc = match self {
            Material::Deadline(m) => bson::to_document(m),
            Material::Syllabus(m) => bson::to_document(m),
            Material::CourseMaterial(m) => bson::to_document(m),
            Material::Note(m) => bson::to_document(m),
            Material::Whiteboard(m) => bson::to_document(m),
        };
        doc.map_err(|e| AppError::Internal(format!("Failed to encode material: {e}")))
    }

    pub fn from_document(kind: MaterialKind, doc: Document) -> Result<Self, AppError> {
        let decoded = match kind {
            MaterialKind::Deadline => bson::from_document(doc).map(Material::Deadline),
            MaterialKind::Syllabus => bson::from_document(doc).map(Material::Syllabus),
            MaterialKind::CourseMaterial => {
                bson::from_document(doc).map(Material::CourseMaterial)
            }
            MaterialKind::Note => bson::from_document(doc).map(Material::Note),
            MaterialKind::Whiteboard => bson::from_document(doc).map(Material::Whiteboard),
        };
        decoded.map_err(|e| AppError::Database(format!("Corrupt {kind} document: {e}")))
    }
}

/// Responses carry the bare stored record, with dates as RFC 3339 strings.
impl Serialize for Material {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = self
            .to_document()
            .map_err(<S::Error as serde::ser::Error>::custom)?;
        for (_, value) in doc.iter_mut() {
            if let Bson::DateTime(date) = *value {
                *value = Bson::String(timestamp::format(&date.to_chrono()));
            }
        }
        doc.serialize(serializer)
    }
}

/// A partial update of a material. Fields that do not belong to the
/// target kind are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub files: Option<Vec<FileRef>>,
    pub due_date: Option<DateTime<Utc>>,
    pub category: Option<DeadlineCategory>,
    pub status: Option<DeadlineStatus>,
    pub material_type: Option<MaterialCategory>,
    pub unit: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_verified: Option<bool>,
    pub topic: Option<String>,
    pub lecture_date: Option<DateTime<Utc>>,
}

impl MaterialPatch {
    /// Build the `$set` document for `kind`.
    pub fn to_set_document(&self, kind: MaterialKind) -> Document {
        let mut set = Document::new();

        if let Some(title) = &self.title {
            set.insert("title", title);
        }
        if let Some(description) = &self.description {
            set.insert("description", description);
        }

        if kind == MaterialKind::Whiteboard {
            if let Some(files) = &self.files {
                let files: Vec<Bson> = files
                    .iter()
                    .map(|f| {
                        Bson::Document(bson::doc! { "url": &f.url, "type": &f.content_type })
                    })
                    .collect();
                set.insert("files", files);
            }
            if let Some(topic) = &self.topic {
                set.insert("topic", topic);
            }
            if let Some(date) = &self.lecture_date {
                set.insert("lectureDate", bson::DateTime::from_chrono(*date));
            }
            return set;
        }

        if let Some(url) = &self.file_url {
            set.insert("fileUrl", url);
        }
        if let Some(file_type) = &self.file_type {
            set.insert("fileType", file_type);
        }

        match kind {
            MaterialKind::Deadline => {
                if let Some(date) = &self.due_date {
                    set.insert("dueDate", bson::DateTime::from_chrono(*date));
                }
                if let Some(category) = self.category {
                    set.insert("type", enum_to_bson(category));
                }
                if let Some(status) = self.status {
                    set.insert("status", enum_to_bson(status));
                }
            }
            MaterialKind::CourseMaterial => {
                if let Some(material_type) = self.material_type {
                    set.insert("materialType", enum_to_bson(material_type));
                }
                if let Some(unit) = &self.unit {
                    set.insert("unit", unit);
                }
            }
            MaterialKind::Note => {
                if let Some(tags) = &self.tags {
                    set.insert("tags", tags.clone());
                }
                if let Some(verified) = self.is_verified {
                    set.insert("isVerified", verified);
                }
            }
            MaterialKind::Syllabus | MaterialKind::Whiteboard => {}
        }

        set
    }
}

fn enum_to_bson<T: Serialize>(value: T) -> Bson {
    // Unit variants always encode as strings.
    bson::to_bson(&value).unwrap_or(Bson::Null)
}
