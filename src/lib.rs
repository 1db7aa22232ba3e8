pub mod app;
pub mod config;
pub mod error;
pub mod auth {
    pub mod middleware;
    pub mod models;
}
pub mod db {
    pub mod class_repository;
    pub mod course_repository;
    pub mod faculty_repository;
    pub mod honor_repository;
    pub mod material_repository;
    pub mod models;
    pub mod user_repository;
}
pub mod storage {
    pub mod client;
    pub mod upload;
}
pub mod api {
    pub mod classes;
    pub mod context;
    pub mod envelope;
    pub mod errors;
    pub mod faculty;
    pub mod honors;
    pub mod materials;
    pub mod notes;
    pub mod upload;
    pub mod whiteboard;
}

#[cfg(test)]
pub(crate) mod test_support;
