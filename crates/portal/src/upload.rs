//! Optional document attachments for class records and work details.
//!
//! Upload failure never blocks the record: the caller gets `None` and saves
//! the row with a null `document_url`.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use fms_core::types::Id;
use fms_events::{event_types, EventBus, PortalEvent};
use fms_remote::storage::sanitize_file_name;
use fms_remote::FileStorage;
use serde_json::json;

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            bytes,
            content_type,
        }
    }

    /// Read a local file.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, bytes))
    }
}

pub struct DocumentUploader {
    storage: Arc<dyn FileStorage>,
    events: Arc<EventBus>,
    bucket: String,
}

impl DocumentUploader {
    pub fn new(storage: Arc<dyn FileStorage>, events: Arc<EventBus>, bucket: impl Into<String>) -> Self {
        Self {
            storage,
            events,
            bucket: bucket.into(),
        }
    }

    /// Upload `document` under the owner's folder and return its public URL.
    ///
    /// Returns `None` when there is nothing to upload or the upload failed;
    /// a failure is logged and published as `upload.failed`.
    pub async fn upload_or_none(&self, owner: Id, document: Option<DocumentUpload>) -> Option<String> {
        let document = document?;
        let path = object_path(owner, &document.file_name);

        match self
            .storage
            .upload(&self.bucket, &path, document.bytes, &document.content_type)
            .await
        {
            Ok(stored) => {
                tracing::info!(bucket = %self.bucket, path = %stored, "Document uploaded");
                Some(self.storage.public_url(&self.bucket, &stored))
            }
            Err(e) => {
                tracing::warn!(bucket = %self.bucket, path = %path, error = %e, "Document upload failed, saving without it");
                self.events.publish(
                    PortalEvent::new(event_types::UPLOAD_FAILED)
                        .with_source(path)
                        .with_actor(owner)
                        .with_payload(json!({ "error": e.to_string() })),
                );
                None
            }
        }
    }
}

// ---- private helpers ----

fn object_path(owner: Id, file_name: &str) -> String {
    format!(
        "{owner}/{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
