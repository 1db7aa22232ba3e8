use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::envelope::ApiResponse;
use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::faculty_repository::Faculty;
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct CreateFacultyRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn process_list_faculty(state: &AppState) -> Result<Vec<Faculty>, AppError> {
    state.faculty_repo.list().await
}

pub async fn process_create_faculty(
    state: &AppState,
    request: CreateFacultyRequest,
) -> Result<Faculty, AppError> {
    let (Some(name), Some(email)) = (non_blank(request.name), non_blank(request.email)) else {
        return Err(AppError::BadRequest("Name and email are required.".into()));
    };

    let faculty = Faculty {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        email,
    };
    state.faculty_repo.create(&faculty).await?;
    tracing::info!(id = %faculty.id, "faculty entry created");

    Ok(faculty)
}

pub async fn process_delete_faculty(state: &AppState, id: &str) -> Result<(), AppError> {
    if !state.faculty_repo.delete(id).await? {
        return Err(AppError::NotFound("Faculty not found".into()));
    }
    tracing::info!(id = %id, "faculty entry deleted");
    Ok(())
}

/// `GET /faculty`
pub async fn list_faculty_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<ApiResponse<Vec<Faculty>>, AppError> {
    Ok(ApiResponse::ok(process_list_faculty(&state).await?))
}

/// `POST /faculty`
pub async fn create_faculty_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(request): Json<CreateFacultyRequest>,
) -> Result<ApiResponse<Faculty>, AppError> {
    let faculty = process_create_faculty(&state, request).await?;
    Ok(ApiResponse::created(faculty))
}

/// `DELETE /faculty/{id}`
pub async fn delete_faculty_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    process_delete_faculty(&state, &id).await?;
    Ok(ApiResponse::message("Faculty deleted successfully"))
}
