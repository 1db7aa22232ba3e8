use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "CLASSMGMT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "classmgmt.toml";

/// Runtime configuration.
///
/// Sources, lowest precedence first: built-in defaults, the optional TOML
/// file, then environment variables (`MONGODB_URI`, `S3_BUCKET`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub s3_bucket: String,
    pub s3_region: String,
    /// Custom endpoint for MinIO / LocalStack.
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    #[serde(default)]
    pub s3_force_path_style: bool,
    /// Base of the public URLs handed to clients.
    #[serde(default)]
    pub media_public_url: Option<String>,
    pub upload_folder: String,
    pub upload_temp_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        Self::load_from(Path::new(&path), config::Environment::default().try_parsing(true))
    }

    pub fn load_from(file: &Path, env: config::Environment) -> Result<Self, config::ConfigError> {
        let temp_dir = std::env::temp_dir().join("classmgmt-uploads");

        config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:3001")?
            .set_default("mongodb_uri", "mongodb://localhost:27017")?
            .set_default("mongodb_database", "classmgmt")?
            .set_default("s3_bucket", "classmgmt-media")?
            .set_default("s3_region", "us-east-1")?
            .set_default("upload_folder", "classmgmt")?
            .set_default("upload_temp_dir", temp_dir.to_string_lossy().to_string())?
            .set_default("max_upload_bytes", 25 * 1024 * 1024)?
            .add_source(config::File::from(file).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// Public base URL for stored media.
    pub fn media_base_url(&self) -> String {
        match (&self.media_public_url, &self.s3_endpoint) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(endpoint)) => {
                format!("{}/{}", endpoint.trim_end_matches('/'), self.s3_bucket)
            }
            (None, None) => format!("https://{}.s3.{}.amazonaws.com", self.s3_bucket, self.s3_region),
        }
    }
}
