use axum::extract::{Multipart, Path, State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::api::context::{profiles_by_id, resolve_class};
use crate::api::envelope::ApiResponse;
use crate::api::upload::UploadForm;
use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::honor_repository::{Honor, HonorKey, HonorPhoto};
use crate::db::models::timestamp;
use crate::db::user_repository::PublicProfile;
use crate::error::AppError;

const PHOTO_FOLDER: &str = "honor_photos";

/// The student of an honor entry: their profile, or the bare id when the
/// user no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StudentRef {
    Profile(PublicProfile),
    Id(String),
}

impl StudentRef {
    fn sort_name(&self) -> &str {
        match self {
            StudentRef::Profile(p) => &p.name,
            StudentRef::Id(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HonorView {
    #[serde(rename = "_id")]
    pub id: String,
    pub student: StudentRef,
    pub rank: u32,
    pub semester: String,
    pub class_id: String,
    pub photo_url: Option<String>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub updated_at: DateTime<Utc>,
}

impl HonorView {
    fn new(honor: Honor, profiles: &HashMap<String, PublicProfile>) -> Self {
        let student = match profiles.get(&honor.student) {
            Some(profile) => StudentRef::Profile(profile.clone()),
            None => StudentRef::Id(honor.student),
        };
        Self {
            id: honor.id,
            student,
            rank: honor.rank,
            semester: honor.semester,
            class_id: honor.class_id,
            photo_url: honor.photo.map(|p| p.url),
            created_at: honor.created_at,
            updated_at: honor.updated_at,
        }
    }
}

async fn view(state: &AppState, honor: Honor) -> Result<HonorView, AppError> {
    let profiles = profiles_by_id(state, [&honor.student]).await?;
    Ok(HonorView::new(honor, &profiles))
}

fn parse_rank(raw: &str) -> Result<u32, AppError> {
    match raw.trim().parse::<u32>() {
        Ok(rank) if rank >= 1 => Ok(rank),
        _ => Err(AppError::BadRequest("Rank must be a positive integer".into())),
    }
}

fn required(form: &UploadForm, name: &str) -> Result<String, AppError> {
    form.text(name)
        .ok_or_else(|| AppError::BadRequest(format!("Field '{name}' is required")))
}

async fn upload_photo(state: &AppState, form: &UploadForm) -> Result<Option<HonorPhoto>, AppError> {
    let Some(file) = form.file("photo") else {
        return Ok(None);
    };
    let asset = state
        .uploader
        .upload(file, &state.uploader.folder(PHOTO_FOLDER))
        .await?;
    Ok(Some(HonorPhoto {
        url: asset.url,
        public_id: asset.public_id,
    }))
}

/// Remove `old` from storage if it has been superseded by `new`.
async fn discard_replaced(state: &AppState, old: Option<HonorPhoto>, new: Option<&HonorPhoto>) {
    if let (Some(old), Some(new)) = (old, new) {
        if old.public_id != new.public_id {
            state.uploader.remove(&old.public_id).await;
        }
    }
}

/// Honors of a class for a semester, by rank then student name.
pub async fn process_list_honors(
    state: &AppState,
    class_identifier: &str,
    semester: &str,
) -> Result<Vec<HonorView>, AppError> {
    let class = resolve_class(state, class_identifier).await?;
    let honors = state.honor_repo.list(&class.id, semester).await?;
    let profiles = profiles_by_id(state, honors.iter().map(|h| &h.student)).await?;

    let mut views: Vec<HonorView> = honors
        .into_iter()
        .map(|h| HonorView::new(h, &profiles))
        .collect();
    views.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| a.student.sort_name().cmp(b.student.sort_name()))
    });

    Ok(views)
}

/// Create the honor for (student, semester, class), or update its rank and
/// photo if one already exists. The flag is `true` when a new entry was
/// created.
pub async fn process_upsert_honor(
    state: &AppState,
    form: UploadForm,
) -> Result<(HonorView, bool), AppError> {
    let student = required(&form, "studentId")?;
    let semester = required(&form, "semesterId")?;
    let class_identifier = required(&form, "classId")?;

    let class = resolve_class(state, &class_identifier).await?;
    let rank = parse_rank(&required(&form, "rank")?)?;

    let key = HonorKey {
        student,
        semester,
        class_id: class.id,
    };

    let photo = upload_photo(state, &form).await?;
    let previous = match photo {
        Some(_) => state.honor_repo.find_by_key(&key).await?,
        None => None,
    };

    let saved = state.honor_repo.upsert(&key, rank, photo.as_ref()).await?;
    discard_replaced(state, previous.and_then(|h| h.photo), photo.as_ref()).await;

    let honor = saved.honor;
    tracing::info!(
        id = %honor.id,
        student = %honor.student,
        rank = honor.rank,
        created = saved.inserted,
        "honor saved"
    );
    Ok((view(state, honor).await?, saved.inserted))
}

pub async fn process_update_honor(
    state: &AppState,
    honor_id: &str,
    form: UploadForm,
) -> Result<HonorView, AppError> {
    if let Some(class_identifier) = form.text("classId") {
        resolve_class(state, &class_identifier).await?;
    }
    let rank = form.text("rank").map(|r| parse_rank(&r)).transpose()?;

    let existing = state
        .honor_repo
        .find_by_id(honor_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Honor entry not found".into()))?;

    let photo = upload_photo(state, &form).await?;
    let honor = state
        .honor_repo
        .update(honor_id, rank, photo.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Honor entry not found".into()))?;
    discard_replaced(state, existing.photo, photo.as_ref()).await;

    tracing::info!(id = %honor.id, rank = honor.rank, "honor updated");
    view(state, honor).await
}

pub async fn process_delete_honor(state: &AppState, honor_id: &str) -> Result<(), AppError> {
    let honor = state
        .honor_repo
        .delete(honor_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Honor entry not found".into()))?;

    if let Some(photo) = honor.photo {
        state.uploader.remove(&photo.public_id).await;
    }
    tracing::info!(id = %honor_id, "honor deleted");

    Ok(())
}

/// `GET /honors/{class_id}/{semester_id}`
pub async fn list_honors_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((class_id, semester_id)): Path<(String, String)>,
) -> Result<ApiResponse<Vec<HonorView>>, AppError> {
    let honors = process_list_honors(&state, &class_id, &semester_id).await?;
    Ok(ApiResponse::ok(honors))
}

/// `POST /honors` (multipart). 201 for a new entry, 200 for an update.
pub async fn upsert_honor_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<ApiResponse<HonorView>, AppError> {
    let form = UploadForm::read(multipart).await?;
    match process_upsert_honor(&state, form).await? {
        (honor, true) => Ok(ApiResponse::created(honor)),
        (honor, false) => Ok(ApiResponse::ok(honor)),
    }
}

/// `PATCH /honors/{id}` (multipart)
pub async fn update_honor_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<ApiResponse<HonorView>, AppError> {
    let form = UploadForm::read(multipart).await?;
    let honor = process_update_honor(&state, &id, form).await?;
    Ok(ApiResponse::ok(honor))
}

/// `DELETE /honors/{id}`
pub async fn delete_honor_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    process_delete_honor(&state, &id).await?;
    Ok(ApiResponse::message("Honor entry deleted successfully"))
}
