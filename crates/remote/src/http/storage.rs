//! `/storage/v1` object endpoints.

use async_trait::async_trait;
use serde::Deserialize;

use super::HttpBackend;
use crate::error::RemoteError;
use crate::storage::FileStorage;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    /// `bucket/path` of the stored object.
    #[serde(rename = "Key")]
    key: String,
}

#[async_trait]
impl FileStorage for HttpBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RemoteError> {
        let size = bytes.len();
        let response = self
            .authorize(
                self.client
                    .post(self.url(&format!("/storage/v1/object/{bucket}/{path}"))),
            )
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        let uploaded: UploadResponse = Self::parse_response(response).await?;
        tracing::info!(bucket, path, size, "Uploaded object");

        let prefix = format!("{bucket}/");
        Ok(uploaded
            .key
            .strip_prefix(&prefix)
            .unwrap_or(&uploaded.key)
            .to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.url(&format!("/storage/v1/object/public/{bucket}/{path}"))
    }
}
