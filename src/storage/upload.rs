use std::path::PathBuf;
use std::sync::Arc;

use crate::error::AppError;
use crate::storage::client::StorageClient;

/// An uploaded file held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl FilePart {
    /// The declared content type, or a guess from the file name.
    pub fn resolved_content_type(&self) -> String {
        match &self.content_type {
            Some(ct) if !ct.is_empty() => ct.clone(),
            _ => mime_guess::from_path(&self.file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedAsset {
    /// Absolute public URL on the media host.
    pub url: String,
    /// Storage key, used to delete the object later.
    pub public_id: String,
    pub content_type: String,
}

/// Stages files on local disk and forwards them to the media host.
#[derive(Clone)]
pub struct MediaUploader {
    storage: Arc<dyn StorageClient>,
    temp_dir: PathBuf,
    root_folder: String,
}

fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "upload.bin".to_string()
    } else {
        sanitized
    }
}

impl MediaUploader {
    pub fn new(storage: Arc<dyn StorageClient>, temp_dir: PathBuf, root_folder: String) -> Self {
        Self {
            storage,
            temp_dir,
            root_folder,
        }
    }

    /// Folder label for `section` under the configured root.
    pub fn folder(&self, section: &str) -> String {
        format!("{}/{}", self.root_folder.trim_end_matches('/'), section)
    }

    /// Upload one file into `folder`.
    ///
    /// The temp file is removed whether or not the upload succeeds. Any
    /// failure is reported as [`AppError::Upload`]; there is no retry.
    pub async fn upload(&self, file: &FilePart, folder: &str) -> Result<UploadedAsset, AppError> {
        let content_type = file.resolved_content_type();
        let stored_name = format!(
            "{}_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4().simple(),
            sanitize_file_name(&file.file_name)
        );
        let key = format!("{}/{}", folder.trim_matches('/'), stored_name);

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| AppError::Upload(format!("cannot create temp dir: {e}")))?;

        let temp_path = self.temp_dir.join(&stored_name);
        let result = match tokio::fs::write(&temp_path, &file.data).await {
            Ok(()) => self.storage.put_file(&key, &temp_path, &content_type).await,
            Err(e) => Err(AppError::Upload(format!("cannot write temp file: {e}"))),
        };

        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove temp file {}: {e}", temp_path.display());
            }
        }

        match result {
            Ok(()) => {}
            Err(AppError::Upload(msg)) => return Err(AppError::Upload(msg)),
            Err(other) => return Err(AppError::Upload(other.to_string())),
        }

        tracing::info!(key = %key, bytes = file.data.len(), "uploaded file");

        Ok(UploadedAsset {
            url: self.storage.public_url(&key),
            public_id: key,
            content_type,
        })
    }

    /// Upload several files concurrently. Results keep the input order.
    pub async fn upload_all(
        &self,
        files: &[FilePart],
        folder: &str,
    ) -> Result<Vec<UploadedAsset>, AppError> {
        futures::future::try_join_all(files.iter().map(|file| self.upload(file, folder))).await
    }

    /// Best-effort removal of a stored object. Failures are logged only.
    pub async fn remove(&self, public_id: &str) {
        match self.storage.delete_object(public_id).await {
            Ok(()) => tracing::info!(key = %public_id, "removed stored file"),
            Err(e) => tracing::warn!("Failed to remove stored file '{public_id}': {e}"),
        }
    }
}
