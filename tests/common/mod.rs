use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::multipart::{MultipartForm, Part};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::minio::MinIO;
use testcontainers_modules::mongo::Mongo;

use classmgmt::app::{router, AppState};
use classmgmt::auth::middleware::USER_UID_HEADER;
use classmgmt::auth::models::Role;
use classmgmt::config::AppConfig;
use classmgmt::db::class_repository::Class;
use classmgmt::db::course_repository::{Course, CourseAssignment};
use classmgmt::db::user_repository::User;
use classmgmt::storage::client::{S3StorageClient, StorageClient};

pub const BUCKET: &str = "classmgmt-test";

/// Running MongoDB + MinIO containers and the real router wired to them.
///
/// Containers live as long as this struct.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    _minio: ContainerAsync<MinIO>,
    _temp: tempfile::TempDir,
    pub router: Router,
    pub db: mongodb::Database,
    pub s3: aws_sdk_s3::Client,
}

impl TestEnv {
    pub async fn start() -> Self {
        let (mongo_container, minio_container) =
            tokio::join!(Mongo::default().start(), MinIO::default().start());
        let mongo_container = mongo_container.expect("Failed to start MongoDB container");
        let minio_container = minio_container.expect("Failed to start MinIO container");

        // --- MongoDB ---
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let db = mongo_client.database("classmgmt_test");

        // --- MinIO (S3) ---
        let minio_port = minio_container
            .get_host_port_ipv4(9000)
            .await
            .expect("Failed to get MinIO port");
        let minio_endpoint = format!("http://127.0.0.1:{}", minio_port);

        unsafe {
            std::env::set_var("AWS_ACCESS_KEY_ID", "minioadmin");
            std::env::set_var("AWS_SECRET_ACCESS_KEY", "minioadmin");
            std::env::set_var("AWS_REGION", "us-east-1");
        }

        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let config = AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            mongodb_uri: mongo_uri,
            mongodb_database: "classmgmt_test".to_string(),
            s3_bucket: BUCKET.to_string(),
            s3_region: "us-east-1".to_string(),
            s3_endpoint: Some(minio_endpoint),
            s3_force_path_style: true,
            media_public_url: None,
            upload_folder: "classmgmt".to_string(),
            upload_temp_dir: temp.path().join("uploads"),
            max_upload_bytes: 5 * 1024 * 1024,
        };

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(config.s3_endpoint.clone().unwrap_or_default())
            .region(aws_config::Region::new("us-east-1"))
            .load()
            .await;
        let s3 = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::from(&s3_config)
                .force_path_style(true)
                .build(),
        );
        let _ = s3.create_bucket().bucket(BUCKET).send().await;

        let storage: Arc<dyn StorageClient> = Arc::new(S3StorageClient::new(
            s3.clone(),
            BUCKET.to_string(),
            config.media_base_url(),
        ));

        let state = AppState::from_mongo(&db, storage, &config)
            .await
            .expect("Failed to build application state");

        Self {
            _mongo: mongo_container,
            _minio: minio_container,
            _temp: temp,
            router: router(state, config.max_upload_bytes),
            db,
            s3,
        }
    }

    /// A `TestServer` that expects success by default.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// A `TestServer` for error-path tests.
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    pub async fn insert_user(&self, user: &User) {
        self.db
            .collection::<User>("users")
            .insert_one(user)
            .await
            .expect("Failed to insert user");
    }

    pub async fn insert_class(&self, class: &Class) {
        self.db
            .collection::<Class>("classes")
            .insert_one(class)
            .await
            .expect("Failed to insert class");
    }

    pub async fn insert_course(&self, course: &Course) {
        self.db
            .collection::<Course>("courses")
            .insert_one(course)
            .await
            .expect("Failed to insert course");
    }

    pub async fn insert_assignment(&self, assignment: &CourseAssignment) {
        self.db
            .collection::<CourseAssignment>("courseassignments")
            .insert_one(assignment)
            .await
            .expect("Failed to insert course assignment");
    }

    /// Seed a student (uid [`STUDENT_UID`]) in class [`CLASS_ID`], attached to
    /// course `CS101` in semester `SEM3`.
    pub async fn seed_student(&self) {
        self.insert_user(&user(STUDENT_ID, STUDENT_UID, "Asha", Role::Student, Some(CLASS_ID)))
            .await;
        self.insert_class(&Class {
            id: CLASS_DOC_ID.to_string(),
            class_id: CLASS_ID.to_string(),
            course_id: Some("CS101".to_string()),
            semester_id: Some("SEM3".to_string()),
            students: vec![STUDENT_ID.to_string()],
        })
        .await;
    }

    /// Number of objects stored under `prefix` in the test bucket.
    pub async fn stored_objects(&self, prefix: &str) -> usize {
        self.s3
            .list_objects_v2()
            .bucket(BUCKET)
            .prefix(prefix)
            .send()
            .await
            .expect("Failed to list objects")
            .contents()
            .len()
    }
}

pub const STUDENT_ID: &str = "u-asha";
pub const STUDENT_UID: &str = "uid-asha";
pub const CLASS_ID: &str = "CSE-A";
pub const CLASS_DOC_ID: &str = "class-doc-1";

pub fn user(id: &str, uid: &str, name: &str, role: Role, class_id: Option<&str>) -> User {
    User {
        id: id.to_string(),
        uid: uid.to_string(),
        name: name.to_string(),
        email: format!("{id}@uni.edu"),
        photo_url: None,
        roll_no: None,
        user_role: role,
        class_id: class_id.map(str::to_string),
    }
}

/// The caller-identity header for `uid`.
pub fn as_user(uid: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(USER_UID_HEADER),
        HeaderValue::from_str(uid).expect("Invalid uid header"),
    )
}

pub fn file_part(name: &str, mime: &str) -> Part {
    Part::bytes(format!("contents of {name}").into_bytes())
        .file_name(name.to_string())
        .mime_type(mime.to_string())
}

/// Multipart body for a deadline with a single PDF attached.
pub fn deadline_form(title: &str, due_date: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("title", title.to_string())
        .add_text("dueDate", due_date.to_string())
        .add_text("type", "ASSIGNMENT")
        .add_part("file", file_part("brief.pdf", "application/pdf"))
}
