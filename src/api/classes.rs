use axum::extract::{Path, State};
use serde::Serialize;
use std::collections::HashMap;

use crate::api::context::resolve_class;
use crate::api::envelope::ApiResponse;
use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::db::user_repository::{PublicProfile, User};
use crate::error::AppError;

/// A teaching member of a class with the course titles they teach there.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultySummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub role: Role,
    pub courses: Vec<String>,
}

impl FacultySummary {
    fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            photo_url: user.photo_url.clone(),
            role: user.user_role,
            courses: Vec::new(),
        }
    }
}

fn unique<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

/// Students enrolled in the class attached to a (course, semester) pair.
pub async fn process_class_students(
    state: &AppState,
    course_id: &str,
    semester_id: &str,
) -> Result<Vec<PublicProfile>, AppError> {
    let class = state
        .class_repo
        .find_by_course(course_id, semester_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Class not found".into()))?;

    let mut students: Vec<PublicProfile> = state
        .user_repo
        .find_by_ids(&class.students)
        .await?
        .into_iter()
        .filter(|u| u.user_role == Role::Student)
        .map(|u| u.public_profile())
        .collect();
    students.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(students)
}

/// Faculty members teaching a class in a semester, one entry per person.
pub async fn process_faculty_members(
    state: &AppState,
    class_identifier: &str,
    semester_id: &str,
) -> Result<Vec<FacultySummary>, AppError> {
    let class = resolve_class(state, class_identifier).await?;
    let assignments = state
        .course_repo
        .assignments_for_class(&class.id, semester_id)
        .await?;

    let faculty_ids = unique(assignments.iter().map(|a| &a.faculty_id));
    let course_ids = unique(assignments.iter().map(|a| &a.course_id));
    let (users, courses) = futures::try_join!(
        state.user_repo.find_by_ids(&faculty_ids),
        state.course_repo.find_courses(&course_ids),
    )?;

    let faculty_by_id: HashMap<&str, &User> = users
        .iter()
        .filter(|u| u.user_role.teaches())
        .map(|u| (u.id.as_str(), u))
        .collect();
    let titles: HashMap<&str, &str> = courses
        .iter()
        .map(|c| (c.id.as_str(), c.title.as_str()))
        .collect();

    let mut summaries: Vec<FacultySummary> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for assignment in &assignments {
        let Some(user) = faculty_by_id.get(assignment.faculty_id.as_str()) else {
            continue;
        };
        let pos = *positions.entry(user.id.as_str()).or_insert_with(|| {
            summaries.push(FacultySummary::from_user(user));
            summaries.len() - 1
        });

        if let Some(title) = titles.get(assignment.course_id.as_str()) {
            let courses = &mut summaries[pos].courses;
            if !courses.iter().any(|c| c == title) {
                courses.push(title.to_string());
            }
        }
    }

    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(summaries)
}

/// `GET /classes/{course_id}/{semester_id}/students`
pub async fn class_students_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((course_id, semester_id)): Path<(String, String)>,
) -> Result<ApiResponse<Vec<PublicProfile>>, AppError> {
    let students = process_class_students(&state, &course_id, &semester_id).await?;
    Ok(ApiResponse::ok(students))
}

/// `GET /classes/{class_id}/{semester_id}/faculty-members`
pub async fn faculty_members_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((class_id, semester_id)): Path<(String, String)>,
) -> Result<ApiResponse<Vec<FacultySummary>>, AppError> {
    let members = process_faculty_members(&state, &class_id, &semester_id).await?;
    Ok(ApiResponse::ok(members))
}
