use async_trait::async_trait;
use mongodb::bson::{doc, Document};

use crate::db::models::{Material, MaterialKind, MaterialPatch, SharedNote};
use crate::error::AppError;

/// The (course, semester, class) triple every material belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassScope {
    pub course_id: String,
    pub semester_id: String,
    /// Id of the class document.
    pub class_id: String,
}

impl ClassScope {
    pub fn filter(&self) -> Document {
        doc! {
            "courseId": &self.course_id,
            "semesterId": &self.semester_id,
            "classId": &self.class_id,
        }
    }
}

/// Identifies a single material for mutations: id scoped by course and semester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialKey {
    pub id: String,
    pub course_id: String,
    pub semester_id: String,
}

impl MaterialKey {
    pub fn filter(&self) -> Document {
        doc! {
            "_id": &self.id,
            "courseId": &self.course_id,
            "semesterId": &self.semester_id,
        }
    }
}

/// Repository trait for the five material collections.
///
/// This trait allows mocking the database layer in tests.
#[async_trait]
pub trait MaterialRepository: Send + Sync {
    /// List all materials of `kind` in the scope, in the kind's sort order.
    async fn list(&self, kind: MaterialKind, scope: &ClassScope) -> Result<Vec<Material>, AppError>;

    async fn find(&self, kind: MaterialKind, key: &MaterialKey) -> Result<Option<Material>, AppError>;

    async fn insert(&self, material: &Material) -> Result<(), AppError>;

    /// Apply `patch` and return the updated material, or `None` if nothing matched.
    async fn update(
        &self,
        kind: MaterialKind,
        key: &MaterialKey,
        patch: &MaterialPatch,
    ) -> Result<Option<Material>, AppError>;

    /// Delete and return the removed material, or `None` if nothing matched.
    async fn delete(&self, kind: MaterialKind, key: &MaterialKey) -> Result<Option<Material>, AppError>;

    /// Flip `user_id`'s membership in a note's like-list.
    async fn toggle_like(&self, key: &MaterialKey, user_id: &str) -> Result<Option<SharedNote>, AppError>;
}

/// MongoDB implementation of the MaterialRepository.
pub struct MongoMaterialRepository {
    db: mongodb::Database,
}

impl MongoMaterialRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self { db: db.clone() }
    }

    fn collection(&self, kind: MaterialKind) -> mongodb::Collection<Document> {
        self.db.collection(kind.collection())
    }
}

#[async_trait]
impl MaterialRepository for MongoMaterialRepository {
    async fn list(&self, kind: MaterialKind, scope: &ClassScope) -> Result<Vec<Material>, AppError> {
        use futures::TryStreamExt;
        use mongodb::options::FindOptions;

        let (field, direction) = kind.sort_order();
        let mut sort = Document::new();
        sort.insert(field, direction);
        sort.insert("_id", 1);
        let options = FindOptions::builder().sort(sort).build();

        let mut cursor = self
            .collection(kind)
            .find(scope.filter())
            .with_options(options)
            .await?;

        let mut materials = Vec::new();
        while let Some(raw) = cursor.try_next().await? {
            materials.push(Material::from_document(kind, raw)?);
        }

        Ok(materials)
    }

    async fn find(&self, kind: MaterialKind, key: &MaterialKey) -> Result<Option<Material>, AppError> {
        self.collection(kind)
            .find_one(key.filter())
            .await?
            .map(|raw| Material::from_document(kind, raw))
            .transpose()
    }

    async fn insert(&self, material: &Material) -> Result<(), AppError> {
        self.collection(material.kind())
            .insert_one(material.to_document()?)
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        kind: MaterialKind,
        key: &MaterialKey,
        patch: &MaterialPatch,
    ) -> Result<Option<Material>, AppError> {
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let set = patch.to_set_document(kind);
        if set.is_empty() {
            return self.find(kind, key).await;
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.collection(kind)
            .find_one_and_update(key.filter(), doc! { "$set": set })
            .with_options(options)
            .await?
            .map(|raw| Material::from_document(kind, raw))
            .transpose()
    }

    async fn delete(&self, kind: MaterialKind, key: &MaterialKey) -> Result<Option<Material>, AppError> {
        self.collection(kind)
            .find_one_and_delete(key.filter())
            .await?
            .map(|raw| Material::from_document(kind, raw))
            .transpose()
    }

    async fn toggle_like(&self, key: &MaterialKey, user_id: &str) -> Result<Option<SharedNote>, AppError> {
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let collection = self.collection(MaterialKind::Note);
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        // Each step is a single atomic update. When both guards miss, another
        // toggle flipped the like in between; retry while the note exists.
        let updated = loop {
            let mut not_liked = key.filter();
            not_liked.insert("likes", doc! { "$ne": user_id });
            let added = collection
                .find_one_and_update(not_liked, doc! { "$addToSet": { "likes": user_id } })
                .with_options(options.clone())
                .await?;
            if added.is_some() {
                break added;
            }

            let mut liked = key.filter();
            liked.insert("likes", user_id);
            let pulled = collection
                .find_one_and_update(liked, doc! { "$pull": { "likes": user_id } })
                .with_options(options.clone())
                .await?;
            if pulled.is_some() {
                break pulled;
            }

            if collection.count_documents(key.filter()).await? == 0 {
                break None;
            }
        };

        updated
            .map(|raw| {
                mongodb::bson::from_document::<SharedNote>(raw)
                    .map_err(|e| AppError::Database(format!("Corrupt note document: {e}")))
            })
            .transpose()
    }
}
