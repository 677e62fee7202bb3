//! Repository for the `class_sessions` table.

use fms_remote::{tables, DataService, Query, RemoteError};

use crate::decode_rows;
use crate::models::class_session::ClassSession;

pub struct ClassSessionRepo;

impl ClassSessionRepo {
    /// Every session, newest first, with course name/code and faculty name.
    pub async fn list_with_details(data: &dyn DataService) -> Result<Vec<ClassSession>, RemoteError> {
        let query = Query::table(tables::CLASS_SESSIONS)
            .embed(tables::COURSES, "course_id", &["name", "code"])
            .embed(tables::PROFILES, "faculty_id", &["full_name"])
            .newest_first();
        decode_rows(data.select(&query).await?)
    }

    pub async fn count(data: &dyn DataService) -> Result<u64, RemoteError> {
        data.count(&Query::table(tables::CLASS_SESSIONS)).await
    }
}
