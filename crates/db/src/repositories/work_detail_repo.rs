//! Repository for the `work_details` table.

use fms_core::types::Id;
use fms_remote::{tables, DataService, Query, RemoteError};

use crate::models::work_detail::{CreateWorkDetail, WorkDetail};
use crate::{decode_row, decode_rows};

pub struct WorkDetailRepo;

impl WorkDetailRepo {
    pub async fn create(
        data: &dyn DataService,
        input: &CreateWorkDetail,
    ) -> Result<WorkDetail, RemoteError> {
        let row = data
            .insert(tables::WORK_DETAILS, serde_json::to_value(input)?)
            .await?;
        decode_row(row)
    }

    /// A faculty member's work details, newest first.
    pub async fn list_for_faculty(
        data: &dyn DataService,
        faculty_id: Id,
    ) -> Result<Vec<WorkDetail>, RemoteError> {
        let query = Query::table(tables::WORK_DETAILS)
            .eq("faculty_id", faculty_id.to_string())
            .newest_first();
        decode_rows(data.select(&query).await?)
    }
}
