use std::collections::HashMap;

use crate::app::AppState;
use crate::db::class_repository::Class;
use crate::db::material_repository::ClassScope;
use crate::db::user_repository::{PublicProfile, User};
use crate::error::AppError;

/// Look up the calling user by uid.
pub async fn resolve_user(state: &AppState, uid: &str) -> Result<User, AppError> {
    state
        .user_repo
        .find_by_uid(uid)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Look up a class by its identifier string.
pub async fn resolve_class(state: &AppState, class_id: &str) -> Result<Class, AppError> {
    state
        .class_repo
        .find_by_identifier(class_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Class not found".into()))
}

/// Derive the caller's (course, semester, class) scope.
pub async fn resolve_class_scope(
    state: &AppState,
    uid: &str,
    course_id: &str,
    semester_id: &str,
) -> Result<(User, ClassScope), AppError> {
    let user = resolve_user(state, uid).await?;

    let class = match user.class_id.as_deref() {
        Some(class_id) => state.class_repo.find_by_identifier(class_id).await?,
        None => None,
    }
    .ok_or_else(|| AppError::NotFound("Class not found".into()))?;

    let scope = ClassScope {
        course_id: course_id.to_string(),
        semester_id: semester_id.to_string(),
        class_id: class.id,
    };

    Ok((user, scope))
}

/// Public profiles for a set of user ids, keyed by id.
pub async fn profiles_by_id<'a, I>(
    state: &AppState,
    ids: I,
) -> Result<HashMap<String, PublicProfile>, AppError>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut unique: Vec<String> = Vec::new();
    for id in ids {
        if !unique.contains(id) {
            unique.push(id.clone());
        }
    }

    let users = state.user_repo.find_by_ids(&unique).await?;
    Ok(users
        .into_iter()
        .map(|u| (u.id.clone(), u.public_profile()))
        .collect())
}
