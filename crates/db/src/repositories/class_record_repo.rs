//! Repository for the `class_records` table.

use fms_core::types::Id;
use fms_remote::{tables, DataService, Query, RemoteError};

use crate::models::class_record::{ClassRecord, CreateClassRecord};
use crate::{decode_row, decode_rows};

pub struct ClassRecordRepo;

impl ClassRecordRepo {
    pub async fn create(
        data: &dyn DataService,
        input: &CreateClassRecord,
    ) -> Result<ClassRecord, RemoteError> {
        let row = data
            .insert(tables::CLASS_RECORDS, serde_json::to_value(input)?)
            .await?;
        let record: ClassRecord = decode_row(row)?;
        tracing::info!(
            record_id = %record.id,
            faculty_id = %record.faculty_id,
            has_document = record.document_url.is_some(),
            "Class record created",
        );
        Ok(record)
    }

    /// A faculty member's class records, newest first.
    pub async fn list_for_faculty(
        data: &dyn DataService,
        faculty_id: Id,
    ) -> Result<Vec<ClassRecord>, RemoteError> {
        let query = Query::table(tables::CLASS_RECORDS)
            .eq("faculty_id", faculty_id.to_string())
            .newest_first();
        decode_rows(data.select(&query).await?)
    }
}
