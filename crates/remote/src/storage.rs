//! Hosted object storage contract.

use async_trait::async_trait;

use crate::error::RemoteError;

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `bytes` at `path` inside `bucket` and return the stored path.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RemoteError>;

    /// Public URL of an object. Does not check that the object exists.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Reduce a user-supplied file name to a safe object-path segment.
///
/// Keeps ASCII letters, digits, `.`, `-`, and `_`; everything else becomes
/// `_`. An empty result becomes `"file"`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}
