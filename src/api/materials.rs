use axum::extract::{Multipart, Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::api::context::{profiles_by_id, resolve_class_scope};
use crate::api::envelope::ApiResponse;
use crate::api::upload::UploadForm;
use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::material_repository::MaterialKey;
use crate::db::models::{
    timestamp, CourseMaterial, Deadline, DeadlineCategory, DeadlineStatus, FileRef, Material,
    MaterialBase, MaterialCategory, MaterialKind, MaterialPatch, SharedNote, Syllabus,
    WhiteboardShot,
};
use crate::db::user_repository::PublicProfile;
use crate::error::AppError;
use crate::storage::upload::{FilePart, UploadedAsset};

/// A user who liked a note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Liker {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// A material together with its uploader's public profile. Notes also name
/// the users in their like list.
#[derive(Debug, Clone, Serialize)]
pub struct MaterialView {
    #[serde(flatten)]
    pub material: Material,
    pub uploader: Option<PublicProfile>,
    #[serde(rename = "likedBy", skip_serializing_if = "Option::is_none")]
    pub liked_by: Option<Vec<Liker>>,
}

impl MaterialView {
    pub fn new(material: Material, profiles: &HashMap<String, PublicProfile>) -> Self {
        let uploader = profiles.get(&material.base().uploaded_by).cloned();
        let liked_by = match &material {
            Material::Note(note) => Some(
                note.likes
                    .iter()
                    .filter_map(|id| profiles.get(id))
                    .map(|p| Liker {
                        id: p.id.clone(),
                        name: p.name.clone(),
                    })
                    .collect(),
            ),
            _ => None,
        };
        Self {
            material,
            uploader,
            liked_by,
        }
    }
}

/// Ids of every user a material view mentions: uploader and likers.
fn referenced_users<'a>(
    materials: impl IntoIterator<Item = &'a Material>,
) -> impl Iterator<Item = &'a String> {
    materials.into_iter().flat_map(|m| {
        let likes = match m {
            Material::Note(note) => note.likes.as_slice(),
            _ => &[],
        };
        std::iter::once(&m.base().uploaded_by).chain(likes)
    })
}

/// Every material kind of one class scope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllMaterials {
    pub deadlines: Vec<MaterialView>,
    pub syllabus: Option<MaterialView>,
    pub course_materials: Vec<MaterialView>,
    pub notes: Vec<MaterialView>,
    pub whiteboard_shots: Vec<MaterialView>,
}

/// Result of a material listing, shaped by the `type` filter.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MaterialListing {
    List(Vec<MaterialView>),
    /// Syllabus filter: the current syllabus, if any.
    Single(Option<MaterialView>),
    All(AllMaterials),
}

#[derive(Debug, Deserialize)]
pub struct MaterialQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub(crate) fn parse_kind(segment: &str) -> Result<MaterialKind, AppError> {
    MaterialKind::from_segment(segment)
        .ok_or_else(|| AppError::BadRequest("Invalid material type".into()))
}

fn into_views(
    materials: Vec<Material>,
    profiles: &HashMap<String, PublicProfile>,
) -> Vec<MaterialView> {
    materials
        .into_iter()
        .map(|material| MaterialView::new(material, profiles))
        .collect()
}

pub(crate) async fn with_uploaders(
    state: &AppState,
    materials: Vec<Material>,
) -> Result<Vec<MaterialView>, AppError> {
    let profiles = profiles_by_id(state, referenced_users(&materials)).await?;
    Ok(into_views(materials, &profiles))
}

/// Core listing logic: resolve the caller's class and read one or all kinds.
pub async fn process_list_materials(
    state: &AppState,
    uid: &str,
    course_id: &str,
    semester_id: &str,
    filter: Option<&str>,
) -> Result<MaterialListing, AppError> {
    let (_, scope) = resolve_class_scope(state, uid, course_id, semester_id).await?;
    let repo = &state.material_repo;

    match filter.and_then(MaterialKind::from_filter) {
        Some(MaterialKind::Syllabus) => {
            let mut latest = repo.list(MaterialKind::Syllabus, &scope).await?;
            latest.truncate(1);
            let view = with_uploaders(state, latest).await?.into_iter().next();
            Ok(MaterialListing::Single(view))
        }
        Some(kind) => {
            let materials = repo.list(kind, &scope).await?;
            Ok(MaterialListing::List(with_uploaders(state, materials).await?))
        }
        None => {
            let (deadlines, mut syllabi, course_materials, notes, whiteboard_shots) = futures::try_join!(
                repo.list(MaterialKind::Deadline, &scope),
                repo.list(MaterialKind::Syllabus, &scope),
                repo.list(MaterialKind::CourseMaterial, &scope),
                repo.list(MaterialKind::Note, &scope),
                repo.list(MaterialKind::Whiteboard, &scope),
            )?;
            syllabi.truncate(1);

            let users: Vec<&String> = referenced_users(
                deadlines
                    .iter()
                    .chain(&syllabi)
                    .chain(&course_materials)
                    .chain(&notes)
                    .chain(&whiteboard_shots),
            )
            .collect();
            let profiles = profiles_by_id(state, users).await?;

            Ok(MaterialListing::All(AllMaterials {
                deadlines: into_views(deadlines, &profiles),
                syllabus: into_views(syllabi, &profiles).into_iter().next(),
                course_materials: into_views(course_materials, &profiles),
                notes: into_views(notes, &profiles),
                whiteboard_shots: into_views(whiteboard_shots, &profiles),
            }))
        }
    }
}

/// Core logic to fetch a single material.
pub async fn process_get_material(
    state: &AppState,
    segment: &str,
    key: &MaterialKey,
) -> Result<MaterialView, AppError> {
    let kind = parse_kind(segment)?;
    let material = state
        .material_repo
        .find(kind, key)
        .await?
        .ok_or_else(|| AppError::NotFound("Material not found".into()))?;

    with_uploaders(state, vec![material])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("Material view lost".into()))
}

fn required(form: &UploadForm, name: &str) -> Result<String, AppError> {
    form.text(name)
        .ok_or_else(|| AppError::BadRequest(format!("Field '{name}' is required")))
}

fn optional_date(form: &UploadForm, name: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    form.text(name)
        .map(|raw| {
            timestamp::parse(&raw).map_err(|e| AppError::BadRequest(format!("Field '{name}': {e}")))
        })
        .transpose()
}

fn required_date(form: &UploadForm, name: &str) -> Result<DateTime<Utc>, AppError> {
    optional_date(form, name)?
        .ok_or_else(|| AppError::BadRequest(format!("Field '{name}' is required")))
}

fn optional_choice<T>(
    form: &UploadForm,
    name: &str,
    parse: fn(&str) -> Option<T>,
    expected: &str,
) -> Result<Option<T>, AppError> {
    form.text(name)
        .map(|raw| {
            parse(&raw).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Invalid value '{raw}' for '{name}'. Expected: {expected}"
                ))
            })
        })
        .transpose()
}

fn required_choice<T>(
    form: &UploadForm,
    name: &str,
    parse: fn(&str) -> Option<T>,
    expected: &str,
) -> Result<T, AppError> {
    optional_choice(form, name, parse, expected)?
        .ok_or_else(|| AppError::BadRequest(format!("Field '{name}' is required")))
}

fn optional_bool(form: &UploadForm, name: &str) -> Result<Option<bool>, AppError> {
    form.text(name)
        .map(|raw| match raw.to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(AppError::BadRequest(format!("Field '{name}' must be true or false"))),
        })
        .transpose()
}

const DEADLINE_TYPES: &str = "ASSIGNMENT, PROJECT, QUIZ, EXAM, OTHER";
const DEADLINE_STATUSES: &str = "UPCOMING, ONGOING, COMPLETED";
const MATERIAL_TYPES: &str = "LECTURE_NOTE, PRESENTATION, REFERENCE, OTHER";

/// Kind-specific fields of a material being created.
#[derive(Debug, Clone, PartialEq)]
enum DraftDetails {
    Deadline {
        due_date: DateTime<Utc>,
        category: DeadlineCategory,
        status: DeadlineStatus,
    },
    Syllabus,
    CourseMaterial {
        material_type: MaterialCategory,
        unit: String,
    },
    Note {
        tags: Vec<String>,
    },
    Whiteboard {
        topic: String,
        lecture_date: DateTime<Utc>,
    },
}

/// A validated creation request, ready once its files are uploaded.
#[derive(Debug, Clone, PartialEq)]
struct MaterialDraft {
    title: String,
    description: Option<String>,
    details: DraftDetails,
}

impl MaterialDraft {
    fn from_form(kind: MaterialKind, form: &UploadForm) -> Result<Self, AppError> {
        let details = match kind {
            MaterialKind::Deadline => DraftDetails::Deadline {
                due_date: required_date(form, "dueDate")?,
                category: required_choice(form, "type", DeadlineCategory::from_str_ci, DEADLINE_TYPES)?,
                status: optional_choice(form, "status", DeadlineStatus::from_str_ci, DEADLINE_STATUSES)?
                    .unwrap_or_default(),
            },
            MaterialKind::Syllabus => DraftDetails::Syllabus,
            MaterialKind::CourseMaterial => DraftDetails::CourseMaterial {
                material_type: required_choice(
                    form,
                    "materialType",
                    MaterialCategory::from_str_ci,
                    MATERIAL_TYPES,
                )?,
                unit: required(form, "unit")?,
            },
            MaterialKind::Note => DraftDetails::Note {
                tags: form.texts("tags"),
            },
            MaterialKind::Whiteboard => DraftDetails::Whiteboard {
                topic: required(form, "topic")?,
                lecture_date: required_date(form, "lectureDate")?,
            },
        };

        Ok(Self {
            title: required(form, "title")?,
            description: form.text("description"),
            details,
        })
    }

    fn into_material(
        self,
        base: MaterialBase,
        assets: Vec<UploadedAsset>,
    ) -> Result<Material, AppError> {
        let base = MaterialBase {
            title: self.title,
            description: self.description,
            ..base
        };

        let material = match self.details {
            DraftDetails::Deadline {
                due_date,
                category,
                status,
            } => {
                let (file_url, file_type) = first_file(assets)?;
                Material::Deadline(Deadline {
                    base,
                    file_url,
                    file_type,
                    due_date,
                    category,
                    status,
                })
            }
            DraftDetails::Syllabus => {
                let (file_url, file_type) = first_file(assets)?;
                Material::Syllabus(Syllabus {
                    base,
                    file_url,
                    file_type,
                })
            }
            DraftDetails::CourseMaterial {
                material_type,
                unit,
            } => {
                let (file_url, file_type) = first_file(assets)?;
                Material::CourseMaterial(CourseMaterial {
                    base,
                    file_url,
                    file_type,
                    material_type,
                    unit,
                })
            }
            DraftDetails::Note { tags } => {
                let (file_url, file_type) = first_file(assets)?;
                let shared_by = base.uploaded_by.clone();
                Material::Note(SharedNote {
                    base,
                    file_url,
                    file_type,
                    tags,
                    likes: Vec::new(),
                    is_verified: false,
                    shared_by,
                })
            }
            DraftDetails::Whiteboard {
                topic,
                lecture_date,
            } => Material::Whiteboard(WhiteboardShot {
                base,
                files: assets.into_iter().map(file_ref).collect(),
                topic,
                lecture_date,
            }),
        };

        Ok(material)
    }
}

fn first_file(assets: Vec<UploadedAsset>) -> Result<(String, String), AppError> {
    assets
        .into_iter()
        .next()
        .map(|a| (a.url, a.content_type))
        .ok_or_else(|| AppError::Internal("No uploaded file for material".into()))
}

fn file_ref(asset: UploadedAsset) -> FileRef {
    FileRef {
        url: asset.url,
        content_type: asset.content_type,
    }
}

/// Files a request carries for `kind`: many for whiteboard shots, one otherwise.
fn request_files(kind: MaterialKind, form: &UploadForm) -> Vec<FilePart> {
    if kind == MaterialKind::Whiteboard {
        form.files(&["files", "file"])
    } else {
        form.file("file").cloned().into_iter().collect()
    }
}

/// Core creation logic: validate, upload, persist.
pub async fn process_create_material(
    state: &AppState,
    uid: &str,
    segment: &str,
    course_id: &str,
    semester_id: &str,
    form: UploadForm,
) -> Result<MaterialView, AppError> {
    let kind = parse_kind(segment)?;
    let (user, scope) = resolve_class_scope(state, uid, course_id, semester_id).await?;

    let files = request_files(kind, &form);
    if files.is_empty() {
        let message = if kind == MaterialKind::Whiteboard {
            "No files uploaded"
        } else {
            "No file uploaded"
        };
        return Err(AppError::BadRequest(message.into()));
    }

    let draft = MaterialDraft::from_form(kind, &form)?;

    let folder = state.uploader.folder(kind.segment());
    let assets = state.uploader.upload_all(&files, &folder).await?;

    let base = MaterialBase {
        id: uuid::Uuid::new_v4().to_string(),
        title: String::new(),
        description: None,
        uploaded_by: user.id.clone(),
        course_id: scope.course_id,
        semester_id: scope.semester_id,
        class_id: scope.class_id,
        uploaded_at: Utc::now(),
    };
    let material = draft.into_material(base, assets)?;

    state.material_repo.insert(&material).await?;
    tracing::info!(kind = %kind, id = %material.base().id, "material created");

    let profiles = HashMap::from([(user.id.clone(), user.public_profile())]);
    Ok(MaterialView::new(material, &profiles))
}

fn patch_from_form(form: &UploadForm) -> Result<MaterialPatch, AppError> {
    Ok(MaterialPatch {
        title: form.text("title"),
        description: form.text("description"),
        due_date: optional_date(form, "dueDate")?,
        category: optional_choice(form, "type", DeadlineCategory::from_str_ci, DEADLINE_TYPES)?,
        status: optional_choice(form, "status", DeadlineStatus::from_str_ci, DEADLINE_STATUSES)?,
        material_type: optional_choice(
            form,
            "materialType",
            MaterialCategory::from_str_ci,
            MATERIAL_TYPES,
        )?,
        unit: form.text("unit"),
        tags: form.has_field("tags").then(|| form.texts("tags")),
        is_verified: optional_bool(form, "isVerified")?,
        topic: form.text("topic"),
        lecture_date: optional_date(form, "lectureDate")?,
        ..Default::default()
    })
}

/// Core update logic: optional re-upload, then a scoped patch.
pub async fn process_update_material(
    state: &AppState,
    segment: &str,
    key: &MaterialKey,
    form: UploadForm,
) -> Result<MaterialView, AppError> {
    let kind = parse_kind(segment)?;
    let mut patch = patch_from_form(&form)?;

    let files = request_files(kind, &form);
    if !files.is_empty() {
        // Avoid orphaned uploads for a material that does not exist.
        if state.material_repo.find(kind, key).await?.is_none() {
            return Err(AppError::NotFound("Material not found".into()));
        }

        let folder = state.uploader.folder(kind.segment());
        let assets = state.uploader.upload_all(&files, &folder).await?;
        if kind == MaterialKind::Whiteboard {
            patch.files = Some(assets.into_iter().map(file_ref).collect());
        } else if let Some(asset) = assets.into_iter().next() {
            patch.file_url = Some(asset.url);
            patch.file_type = Some(asset.content_type);
        }
    }

    let material = state
        .material_repo
        .update(kind, key, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Material not found".into()))?;

    tracing::info!(kind = %kind, id = %key.id, "material updated");

    with_uploaders(state, vec![material])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("Material view lost".into()))
}

/// Core delete logic.
pub async fn process_delete_material(
    state: &AppState,
    segment: &str,
    key: &MaterialKey,
) -> Result<(), AppError> {
    let kind = parse_kind(segment)?;

    state
        .material_repo
        .delete(kind, key)
        .await?
        .ok_or_else(|| AppError::NotFound("Material not found".into()))?;

    // TODO: purge the uploaded objects from the media host once material
    // records store storage keys alongside their public URLs.
    tracing::info!(kind = %kind, id = %key.id, "material deleted");

    Ok(())
}

/// `GET /courses/{course_id}/materials/{semester_id}?type=...`
pub async fn list_materials_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((course_id, semester_id)): Path<(String, String)>,
    Query(query): Query<MaterialQuery>,
) -> Result<ApiResponse<MaterialListing>, AppError> {
    let listing = process_list_materials(
        &state,
        &user.uid,
        &course_id,
        &semester_id,
        query.kind.as_deref(),
    )
    .await?;

    Ok(ApiResponse::ok(listing))
}

/// `POST /courses/{type}/{course_id}/{semester_id}` (multipart)
pub async fn create_material_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((segment, course_id, semester_id)): Path<(String, String, String)>,
    multipart: Multipart,
) -> Result<ApiResponse<MaterialView>, AppError> {
    // Reject unknown types before reading the body.
    parse_kind(&segment)?;
    let form = UploadForm::read(multipart).await?;

    let view =
        process_create_material(&state, &user.uid, &segment, &course_id, &semester_id, form)
            .await?;

    Ok(ApiResponse::created(view))
}

fn material_key(id: String, course_id: String, semester_id: String) -> MaterialKey {
    MaterialKey {
        id,
        course_id,
        semester_id,
    }
}

/// `GET /materials/{type}/{id}/{course_id}/{semester_id}`
pub async fn get_material_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((segment, id, course_id, semester_id)): Path<(String, String, String, String)>,
) -> Result<ApiResponse<MaterialView>, AppError> {
    let key = material_key(id, course_id, semester_id);
    let view = process_get_material(&state, &segment, &key).await?;
    Ok(ApiResponse::ok(view))
}

/// `PATCH /materials/{type}/{id}/{course_id}/{semester_id}` (multipart)
pub async fn update_material_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((segment, id, course_id, semester_id)): Path<(String, String, String, String)>,
    multipart: Multipart,
) -> Result<ApiResponse<MaterialView>, AppError> {
    parse_kind(&segment)?;
    let form = UploadForm::read(multipart).await?;

    let key = material_key(id, course_id, semester_id);
    let view = process_update_material(&state, &segment, &key, form).await?;
    Ok(ApiResponse::ok(view))
}

/// `DELETE /materials/{type}/{id}/{course_id}/{semester_id}`
pub async fn delete_material_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((segment, id, course_id, semester_id)): Path<(String, String, String, String)>,
) -> Result<ApiResponse<()>, AppError> {
    let key = material_key(id, course_id, semester_id);
    process_delete_material(&state, &segment, &key).await?;
    Ok(ApiResponse::message("Material deleted successfully"))
}
