use axum::extract::{Path, State};

use crate::api::context::resolve_user;
use crate::api::envelope::ApiResponse;
use crate::api::materials::{with_uploaders, MaterialView};
use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::material_repository::MaterialKey;
use crate::db::models::Material;
use crate::error::AppError;

/// Core like-toggle logic. Liking twice leaves the note as it was.
pub async fn process_toggle_like(
    state: &AppState,
    uid: &str,
    key: &MaterialKey,
) -> Result<MaterialView, AppError> {
    let user = resolve_user(state, uid).await?;

    let note = state
        .material_repo
        .toggle_like(key, &user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Note not found".into()))?;

    tracing::debug!(
        note = %key.id,
        user = %user.id,
        likes = note.likes.len(),
        "toggled note like"
    );

    with_uploaders(state, vec![Material::Note(note)])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("Note view lost".into()))
}

/// `POST /notes/{id}/{course_id}/{semester_id}/like`
pub async fn toggle_like_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, course_id, semester_id)): Path<(String, String, String)>,
) -> Result<ApiResponse<MaterialView>, AppError> {
    let key = MaterialKey {
        id,
        course_id,
        semester_id,
    };
    let view = process_toggle_like(&state, &user.uid, &key).await?;
    Ok(ApiResponse::ok(view))
}
