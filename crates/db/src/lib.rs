//! Typed rows and repositories over the remote table store.
//!
//! Repositories are zero-sized structs whose async functions take
//! `&dyn DataService` as the first argument, mirroring a pool-based
//! repository layer but with the hosted REST store behind the trait.

use fms_remote::{tables, DataService, Query, RemoteError};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod models;
pub mod repositories;

/// Verify the table store answers.
pub async fn health_check(data: &dyn DataService) -> Result<(), RemoteError> {
    data.count(&Query::table(tables::PROFILES)).await?;
    Ok(())
}

pub(crate) fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T, RemoteError> {
    Ok(serde_json::from_value(row)?)
}

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, RemoteError> {
    rows.into_iter().map(decode_row).collect()
}
