use axum::extract::Multipart;

use crate::error::AppError;
use crate::storage::upload::FilePart;

/// A parsed multipart request: text fields plus uploaded files, both in
/// arrival order.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    fields: Vec<(String, String)>,
    files: Vec<(String, FilePart)>,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_file(mut self, field: &str, file: FilePart) -> Self {
        self.files.push((field.to_string(), file));
        self
    }

    /// Drain a multipart body. Parts with a file name are files, everything
    /// else is a text field.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;

                    if file_name.is_empty() && data.is_empty() {
                        // Browsers send an empty part for an untouched file input.
                        continue;
                    }

                    form.files.push((
                        name,
                        FilePart {
                            file_name,
                            content_type,
                            data: data.to_vec(),
                        },
                    ));
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Failed to read field: {e}")))?;
                    form.fields.push((name, value));
                }
            }
        }

        Ok(form)
    }

    /// First non-blank value of a text field, trimmed.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// All values of a list field. Accepts repeated `name` / `name[]` parts,
    /// comma-separated values, or a JSON array of strings.
    pub fn texts(&self, name: &str) -> Vec<String> {
        let bracketed = format!("{name}[]");
        let mut values = Vec::new();

        for (_, raw) in self
            .fields
            .iter()
            .filter(|(n, _)| n == name || *n == bracketed)
        {
            let raw = raw.trim();
            if raw.starts_with('[') {
                if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
                    values.extend(list.into_iter().map(|v| v.trim().to_string()));
                    continue;
                }
            }
            values.extend(raw.split(',').map(|v| v.trim().to_string()));
        }

        values.retain(|v| !v.is_empty());
        values
    }

    /// Whether a text field was sent at all (even blank).
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name || *n == format!("{name}[]"))
    }

    /// The first file sent under `field`.
    pub fn file(&self, field: &str) -> Option<&FilePart> {
        self.files.iter().find(|(n, _)| n == field).map(|(_, f)| f)
    }

    /// Every file sent under any of `fields`, in arrival order.
    pub fn files(&self, fields: &[&str]) -> Vec<FilePart> {
        self.files
            .iter()
            .filter(|(n, _)| fields.contains(&n.as_str()))
            .map(|(_, f)| f.clone())
            .collect()
    }
}
