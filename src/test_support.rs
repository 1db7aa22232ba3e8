//! In-memory repositories and storage for handler-level unit tests.

use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::app::AppState;
use crate::auth::models::Role;
use crate::db::class_repository::{Class, ClassRepository};
use crate::db::course_repository::{Course, CourseAssignment, CourseRepository};
use crate::db::faculty_repository::{Faculty, FacultyRepository};
use crate::db::honor_repository::{Honor, HonorKey, HonorPhoto, HonorRepository, UpsertedHonor};
use crate::db::material_repository::{ClassScope, MaterialKey, MaterialRepository};
use crate::db::models::{Material, MaterialBase, MaterialKind, MaterialPatch, SharedNote};
use crate::db::user_repository::{User, UserRepository};
use crate::error::AppError;
use crate::storage::client::StorageClient;
use crate::storage::upload::{FilePart, MediaUploader};

pub fn file(name: &str) -> FilePart {
    FilePart {
        file_name: name.to_string(),
        content_type: None,
        data: format!("contents of {name}").into_bytes(),
    }
}

pub fn user(id: &str, name: &str, role: Role, class_id: Option<&str>) -> User {
    User {
        id: id.to_string(),
        uid: format!("uid-{id}"),
        name: name.to_string(),
        email: format!("{id}@uni.edu"),
        photo_url: None,
        roll_no: None,
        user_role: role,
        class_id: class_id.map(str::to_string),
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<Vec<User>>,
    lookups: AtomicUsize,
}

impl InMemoryUsers {
    pub fn add(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }

    /// Number of uid lookups served.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.lock().unwrap().iter().find(|u| u.uid == uid).cloned())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryClasses {
    classes: Mutex<Vec<Class>>,
}

impl InMemoryClasses {
    pub fn add(&self, class: Class) {
        self.classes.lock().unwrap().push(class);
    }

    pub fn enroll(&self, class_id: &str, students: &[&str]) {
        let mut classes = self.classes.lock().unwrap();
        let class = classes.iter_mut().find(|c| c.class_id == class_id).unwrap();
        class.students.extend(students.iter().map(|s| s.to_string()));
    }
}

#[async_trait]
impl ClassRepository for InMemoryClasses {
    async fn find_by_identifier(&self, class_id: &str) -> Result<Option<Class>, AppError> {
        Ok(self
            .classes
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.class_id == class_id)
            .cloned())
    }

    async fn find_by_course(
        &self,
        course_id: &str,
        semester_id: &str,
    ) -> Result<Option<Class>, AppError> {
        Ok(self
            .classes
            .lock()
            .unwrap()
            .iter()
            .find(|c| {
                c.course_id.as_deref() == Some(course_id)
                    && c.semester_id.as_deref() == Some(semester_id)
            })
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryMaterials {
    materials: Mutex<Vec<Material>>,
}

fn in_scope(material: &Material, scope: &ClassScope) -> bool {
    let base = material.base();
    base.course_id == scope.course_id
        && base.semester_id == scope.semester_id
        && base.class_id == scope.class_id
}

fn matches_key(material: &Material, kind: MaterialKind, key: &MaterialKey) -> bool {
    let base = material.base();
    material.kind() == kind
        && base.id == key.id
        && base.course_id == key.course_id
        && base.semester_id == key.semester_id
}

/// Orders like the Mongo sort in `MaterialKind::sort_order`.
fn sort_materials(kind: MaterialKind, materials: &mut [Material]) {
    let (field, direction) = kind.sort_order();
    materials.sort_by(|a, b| {
        let key = |m: &Material| {
            let doc = m.to_document().unwrap();
            *doc.get_datetime(field).unwrap()
        };
        let ordering = key(a).cmp(&key(b));
        let ordering = if direction < 0 { ordering.reverse() } else { ordering };
        ordering.then_with(|| a.base().id.cmp(&b.base().id))
    });
}

impl InMemoryMaterials {
    /// A note in the given course and semester but another class.
    pub fn insert_foreign_note(&self, course_id: &str, semester_id: &str, class_id: &str) {
        let base = MaterialBase {
            id: uuid::Uuid::new_v4().to_string(),
            title: "Foreign note".into(),
            description: None,
            uploaded_by: "someone-else".into(),
            course_id: course_id.into(),
            semester_id: semester_id.into(),
            class_id: class_id.into(),
            uploaded_at: Utc::now(),
        };
        self.materials.lock().unwrap().push(Material::Note(SharedNote {
            shared_by: base.uploaded_by.clone(),
            base,
            file_url: "https://media.test/foreign.pdf".into(),
            file_type: "application/pdf".into(),
            tags: vec![],
            likes: vec![],
            is_verified: false,
        }));
    }
}

#[async_trait]
impl MaterialRepository for InMemoryMaterials {
    async fn list(&self, kind: MaterialKind, scope: &ClassScope) -> Result<Vec<Material>, AppError> {
        let mut found: Vec<Material> = self
            .materials
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.kind() == kind && in_scope(m, scope))
            .cloned()
            .collect();
        sort_materials(kind, &mut found);
        Ok(found)
    }

    async fn find(&self, kind: MaterialKind, key: &MaterialKey) -> Result<Option<Material>, AppError> {
        Ok(self
            .materials
            .lock()
            .unwrap()
            .iter()
            .find(|m| matches_key(m, kind, key))
            .cloned())
    }

    async fn insert(&self, material: &Material) -> Result<(), AppError> {
        self.materials.lock().unwrap().push(material.clone());
        Ok(())
    }

    async fn update(
        &self,
        kind: MaterialKind,
        key: &MaterialKey,
        patch: &MaterialPatch,
    ) -> Result<Option<Material>, AppError> {
        let mut materials = self.materials.lock().unwrap();
        let Some(slot) = materials.iter_mut().find(|m| matches_key(m, kind, key)) else {
            return Ok(None);
        };

        let mut doc = slot.to_document()?;
        for (field, value) in patch.to_set_document(kind) {
            doc.insert(field, value);
        }
        *slot = Material::from_document(kind, doc)?;
        Ok(Some(slot.clone()))
    }

    async fn delete(&self, kind: MaterialKind, key: &MaterialKey) -> Result<Option<Material>, AppError> {
        let mut materials = self.materials.lock().unwrap();
        let position = materials.iter().position(|m| matches_key(m, kind, key));
        Ok(position.map(|i| materials.remove(i)))
    }

    async fn toggle_like(&self, key: &MaterialKey, user_id: &str) -> Result<Option<SharedNote>, AppError> {
        let mut materials = self.materials.lock().unwrap();
        let note = materials.iter_mut().find_map(|m| match m {
            Material::Note(note)
                if note.base.id == key.id
                    && note.base.course_id == key.course_id
                    && note.base.semester_id == key.semester_id =>
            {
                Some(note)
            }
            _ => None,
        });
        let Some(note) = note else {
            return Ok(None);
        };

        match note.likes.iter().position(|id| id == user_id) {
            Some(i) => {
                note.likes.remove(i);
            }
            None => note.likes.push(user_id.to_string()),
        }
        Ok(Some(note.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryFaculty {
    entries: Mutex<Vec<Faculty>>,
}

#[async_trait]
impl FacultyRepository for InMemoryFaculty {
    async fn list(&self) -> Result<Vec<Faculty>, AppError> {
        let mut entries = self.entries.lock().unwrap().clone();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn create(&self, faculty: &Faculty) -> Result<(), AppError> {
        self.entries.lock().unwrap().push(faculty.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|f| f.id != id);
        Ok(entries.len() < before)
    }
}

#[derive(Default)]
pub struct InMemoryCourses {
    courses: Mutex<Vec<Course>>,
    assignments: Mutex<Vec<CourseAssignment>>,
}

impl InMemoryCourses {
    pub fn add_course(&self, course: Course) {
        self.courses.lock().unwrap().push(course);
    }

    pub fn add_assignment(&self, assignment: CourseAssignment) {
        self.assignments.lock().unwrap().push(assignment);
    }
}

#[async_trait]
impl CourseRepository for InMemoryCourses {
    async fn assignments_for_class(
        &self,
        class_id: &str,
        semester_id: &str,
    ) -> Result<Vec<CourseAssignment>, AppError> {
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.class_id == class_id && a.semester_id == semester_id)
            .cloned()
            .collect())
    }

    async fn find_courses(&self, ids: &[String]) -> Result<Vec<Course>, AppError> {
        Ok(self
            .courses
            .lock()
            .unwrap()
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryHonors {
    honors: Mutex<Vec<Honor>>,
}

fn honor_matches(honor: &Honor, key: &HonorKey) -> bool {
    honor.student == key.student && honor.semester == key.semester && honor.class_id == key.class_id
}

#[async_trait]
impl HonorRepository for InMemoryHonors {
    async fn list(&self, class_id: &str, semester: &str) -> Result<Vec<Honor>, AppError> {
        let mut found: Vec<Honor> = self
            .honors
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.class_id == class_id && h.semester == semester)
            .cloned()
            .collect();
        found.sort_by_key(|h| h.rank);
        Ok(found)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Honor>, AppError> {
        Ok(self.honors.lock().unwrap().iter().find(|h| h.id == id).cloned())
    }

    async fn find_by_key(&self, key: &HonorKey) -> Result<Option<Honor>, AppError> {
        Ok(self
            .honors
            .lock()
            .unwrap()
            .iter()
            .find(|h| honor_matches(h, key))
            .cloned())
    }

    async fn upsert(
        &self,
        key: &HonorKey,
        rank: u32,
        photo: Option<&HonorPhoto>,
    ) -> Result<UpsertedHonor, AppError> {
        let now = Utc::now();
        let mut honors = self.honors.lock().unwrap();

        if let Some(existing) = honors.iter_mut().find(|h| honor_matches(h, key)) {
            existing.rank = rank;
            existing.updated_at = now;
            if let Some(photo) = photo {
                existing.photo = Some(photo.clone());
            }
            return Ok(UpsertedHonor {
                honor: existing.clone(),
                inserted: false,
            });
        }

        let honor = Honor {
            id: uuid::Uuid::new_v4().to_string(),
            student: key.student.clone(),
            rank,
            semester: key.semester.clone(),
            class_id: key.class_id.clone(),
            photo: photo.cloned(),
            created_at: now,
            updated_at: now,
        };
        honors.push(honor.clone());
        Ok(UpsertedHonor {
            honor,
            inserted: true,
        })
    }

    async fn update(
        &self,
        id: &str,
        rank: Option<u32>,
        photo: Option<&HonorPhoto>,
    ) -> Result<Option<Honor>, AppError> {
        let mut honors = self.honors.lock().unwrap();
        let Some(honor) = honors.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };
        if let Some(rank) = rank {
            honor.rank = rank;
        }
        if let Some(photo) = photo {
            honor.photo = Some(photo.clone());
        }
        honor.updated_at = Utc::now();
        Ok(Some(honor.clone()))
    }

    async fn delete(&self, id: &str) -> Result<Option<Honor>, AppError> {
        let mut honors = self.honors.lock().unwrap();
        let position = honors.iter().position(|h| h.id == id);
        Ok(position.map(|i| honors.remove(i)))
    }
}

/// Records uploads and deletions instead of talking to a media host.
#[derive(Default)]
pub struct FakeStorage {
    uploaded: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl FakeStorage {
    pub fn fail_uploads(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_file(&self, key: &str, path: &Path, _content_type: &str) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Storage("simulated outage".into()));
        }
        assert!(path.exists(), "staged file missing");
        self.uploaded.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://media.test/{key}")
    }
}

/// An [`AppState`] over in-memory fakes, with handles to inspect them.
pub struct Fixture {
    pub state: AppState,
    pub users: Arc<InMemoryUsers>,
    pub classes: Arc<InMemoryClasses>,
    pub materials: Arc<InMemoryMaterials>,
    pub courses: Arc<InMemoryCourses>,
    pub storage: Arc<FakeStorage>,
    _temp: tempfile::TempDir,
}

impl Fixture {
    pub const UID: &'static str = "uid-student";
    pub const USER_ID: &'static str = "u-student";
    pub const NAME: &'static str = "Asha";
    pub const CLASS_ID: &'static str = "CSE-A";
    pub const CLASS_DOC_ID: &'static str = "class-doc-1";

    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let users = Arc::new(InMemoryUsers::default());
        let classes = Arc::new(InMemoryClasses::default());
        let materials = Arc::new(InMemoryMaterials::default());
        let courses = Arc::new(InMemoryCourses::default());
        let storage = Arc::new(FakeStorage::default());

        let state = AppState {
            user_repo: users.clone(),
            class_repo: classes.clone(),
            material_repo: materials.clone(),
            faculty_repo: Arc::new(InMemoryFaculty::default()),
            course_repo: courses.clone(),
            honor_repo: Arc::new(InMemoryHonors::default()),
            uploader: MediaUploader::new(
                storage.clone(),
                temp.path().join("staging"),
                "classmgmt".to_string(),
            ),
        };

        Self {
            state,
            users,
            classes,
            materials,
            courses,
            storage,
            _temp: temp,
        }
    }

    /// A student (`UID`) enrolled in class `CLASS_ID`, which is attached to
    /// course `CS101` in semester `SEM3`.
    pub fn with_student() -> Self {
        let fx = Self::new();
        fx.users.add(User {
            uid: Self::UID.to_string(),
            ..user(Self::USER_ID, Self::NAME, Role::Student, Some(Self::CLASS_ID))
        });
        fx.classes.add(Class {
            id: Self::CLASS_DOC_ID.to_string(),
            class_id: Self::CLASS_ID.to_string(),
            course_id: Some("CS101".to_string()),
            semester_id: Some("SEM3".to_string()),
            students: vec![Self::USER_ID.to_string()],
        });
        fx
    }

    pub fn with_student_without_class() -> Self {
        let fx = Self::new();
        fx.users.add(User {
            uid: Self::UID.to_string(),
            ..user(Self::USER_ID, Self::NAME, Role::Student, None)
        });
        fx
    }
}
