use axum::extract::{Path, State};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::api::context::{profiles_by_id, resolve_class_scope};
use crate::api::envelope::ApiResponse;
use crate::api::materials::MaterialView;
use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{Material, MaterialKind, WhiteboardShot};
use crate::error::AppError;

/// Whiteboard shots of one lecture day.
#[derive(Debug, Serialize)]
pub struct TimelineDay {
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    pub shots: Vec<MaterialView>,
}

/// Group shots by the UTC date of their lecture, newest day first. Within a
/// day the incoming order is kept.
pub fn group_by_lecture_date(shots: Vec<WhiteboardShot>) -> Vec<(NaiveDate, Vec<WhiteboardShot>)> {
    let mut days: BTreeMap<NaiveDate, Vec<WhiteboardShot>> = BTreeMap::new();
    for shot in shots {
        days.entry(shot.lecture_date.date_naive()).or_default().push(shot);
    }
    days.into_iter().rev().collect()
}

/// Core timeline logic for the caller's class.
pub async fn process_whiteboard_timeline(
    state: &AppState,
    uid: &str,
    course_id: &str,
    semester_id: &str,
) -> Result<Vec<TimelineDay>, AppError> {
    let (_, scope) = resolve_class_scope(state, uid, course_id, semester_id).await?;

    let shots: Vec<WhiteboardShot> = state
        .material_repo
        .list(MaterialKind::Whiteboard, &scope)
        .await?
        .into_iter()
        .filter_map(|m| match m {
            Material::Whiteboard(shot) => Some(shot),
            _ => None,
        })
        .collect();

    let profiles = profiles_by_id(state, shots.iter().map(|s| &s.base.uploaded_by)).await?;

    Ok(group_by_lecture_date(shots)
        .into_iter()
        .map(|(date, shots)| TimelineDay {
            date: date.format("%Y-%m-%d").to_string(),
            shots: shots
                .into_iter()
                .map(|shot| MaterialView::new(Material::Whiteboard(shot), &profiles))
                .collect(),
        })
        .collect())
}

/// `GET /courses/{course_id}/materials/{semester_id}/whiteboard/timeline`
pub async fn whiteboard_timeline_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((course_id, semester_id)): Path<(String, String)>,
) -> Result<ApiResponse<Vec<TimelineDay>>, AppError> {
    let days = process_whiteboard_timeline(&state, &user.uid, &course_id, &semester_id).await?;
    Ok(ApiResponse::ok(days))
}
