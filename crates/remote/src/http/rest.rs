//! `/rest/v1` table endpoints.

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use serde_json::Value;

use super::HttpBackend;
use crate::data::DataService;
use crate::error::RemoteError;
use crate::query::Query;

const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_COUNT: &str = "count=exact";

/// Total row count from a `Content-Range` header such as `0-24/57` or `*/57`.
pub(crate) fn parse_content_range_total(header: Option<&HeaderValue>) -> Option<u64> {
    header?
        .to_str()
        .ok()?
        .rsplit('/')
        .next()?
        .trim()
        .parse()
        .ok()
}

impl HttpBackend {
    fn table_url(&self, table: &str) -> String {
        self.url(&format!("/rest/v1/{table}"))
    }
}

#[async_trait]
impl DataService for HttpBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .authorize(self.client.get(self.table_url(&query.table)))
            .query(&query.read_params())
            .send()
            .await?;

        let rows: Vec<Value> = Self::parse_response(response).await?;
        tracing::debug!(table = %query.table, rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> Result<u64, RemoteError> {
        let mut params = vec![("select".to_string(), "id".to_string())];
        params.extend(query.filter_params());

        let response = self
            .authorize(self.client.head(self.table_url(&query.table)))
            .header("Prefer", PREFER_COUNT)
            .query(&params)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        parse_content_range_total(response.headers().get("content-range")).ok_or_else(|| {
            RemoteError::Api {
                status: response.status().as_u16(),
                code: None,
                message: "Missing or malformed Content-Range header".to_string(),
            }
        })
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        let response = self
            .authorize(self.client.post(self.table_url(table)))
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&row)
            .send()
            .await?;

        let mut rows: Vec<Value> = Self::parse_response(response).await?;
        if rows.is_empty() {
            return Err(RemoteError::Api {
                status: 200,
                code: None,
                message: format!("Insert into {table} returned no row"),
            });
        }
        tracing::debug!(table, "Inserted row");
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .authorize(self.client.patch(self.table_url(&query.table)))
            .header("Prefer", PREFER_REPRESENTATION)
            .query(&query.filter_params())
            .json(&patch)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn delete(&self, query: &Query) -> Result<(), RemoteError> {
        let response = self
            .authorize(self.client.delete(self.table_url(&query.table)))
            .query(&query.filter_params())
            .send()
            .await?;

        Self::ensure_success(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_total_is_parsed() {
        let v = HeaderValue::from_static("0-24/57");
        assert_eq!(parse_content_range_total(Some(&v)), Some(57));
        let v = HeaderValue::from_static("*/0");
        assert_eq!(parse_content_range_total(Some(&v)), Some(0));
    }

    #[test]
    fn unknown_total_is_none() {
        let v = HeaderValue::from_static("0-24/*");
        assert_eq!(parse_content_range_total(Some(&v)), None);
        assert_eq!(parse_content_range_total(None), None);
    }
}
