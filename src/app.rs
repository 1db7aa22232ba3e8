use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::AppConfig;
use crate::db::class_repository::{ClassRepository, MongoClassRepository};
use crate::db::course_repository::{CourseRepository, MongoCourseRepository};
use crate::db::faculty_repository::{FacultyRepository, MongoFacultyRepository};
use crate::db::honor_repository::{HonorRepository, MongoHonorRepository};
use crate::db::material_repository::{MaterialRepository, MongoMaterialRepository};
use crate::db::user_repository::{MongoUserRepository, UserRepository};
use crate::error::AppError;
use crate::storage::client::StorageClient;
use crate::storage::upload::MediaUploader;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub user_repo: Arc<dyn UserRepository>,
    pub class_repo: Arc<dyn ClassRepository>,
    pub material_repo: Arc<dyn MaterialRepository>,
    pub faculty_repo: Arc<dyn FacultyRepository>,
    pub course_repo: Arc<dyn CourseRepository>,
    pub honor_repo: Arc<dyn HonorRepository>,
    pub uploader: MediaUploader,
}

impl AppState {
    /// Wire the MongoDB repositories and the media uploader.
    ///
    /// Also creates the indexes the repositories rely on.
    pub async fn from_mongo(
        db: &mongodb::Database,
        storage: Arc<dyn StorageClient>,
        config: &AppConfig,
    ) -> Result<Self, AppError> {
        let honor_repo = MongoHonorRepository::new(db);
        honor_repo.ensure_indexes().await?;

        Ok(Self {
            user_repo: Arc::new(MongoUserRepository::new(db)),
            class_repo: Arc::new(MongoClassRepository::new(db)),
            material_repo: Arc::new(MongoMaterialRepository::new(db)),
            faculty_repo: Arc::new(MongoFacultyRepository::new(db)),
            course_repo: Arc::new(MongoCourseRepository::new(db)),
            honor_repo: Arc::new(honor_repo),
            uploader: MediaUploader::new(
                storage,
                config.upload_temp_dir.clone(),
                config.upload_folder.clone(),
            ),
        })
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Materials
        // The first segment is a course id for reads and a material type
        // for uploads; matchit needs one name per position.
        .route(
            "/courses/{scope}/materials/{semester_id}",
            get(api::materials::list_materials_handler),
        )
        .route(
            "/courses/{scope}/materials/{semester_id}/whiteboard/timeline",
            get(api::whiteboard::whiteboard_timeline_handler),
        )
        .route(
            "/courses/{scope}/{course_id}/{semester_id}",
            post(api::materials::create_material_handler),
        )
        .route(
            "/materials/{kind}/{id}/{course_id}/{semester_id}",
            get(api::materials::get_material_handler)
                .patch(api::materials::update_material_handler)
                .delete(api::materials::delete_material_handler),
        )
        .route(
            "/notes/{id}/{course_id}/{semester_id}/like",
            post(api::notes::toggle_like_handler),
        )
        // Classes
        .route(
            "/classes/{id}/{semester_id}/students",
            get(api::classes::class_students_handler),
        )
        .route(
            "/classes/{id}/{semester_id}/faculty-members",
            get(api::classes::faculty_members_handler),
        )
        // Faculty directory
        .route(
            "/faculty",
            get(api::faculty::list_faculty_handler).post(api::faculty::create_faculty_handler),
        )
        .route("/faculty/{id}", axum::routing::delete(api::faculty::delete_faculty_handler))
        // Honor roll
        .route("/honors", post(api::honors::upsert_honor_handler))
        .route(
            "/honors/{id}",
            axum::routing::patch(api::honors::update_honor_handler)
                .delete(api::honors::delete_honor_handler),
        )
        .route(
            "/honors/{id}/{semester_id}",
            get(api::honors::list_honors_handler),
        )
}

/// Build the HTTP router with all API routes under `/api`.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
