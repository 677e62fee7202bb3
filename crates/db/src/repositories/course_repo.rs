//! Repository for the `courses` table.

use fms_remote::{tables, DataService, Query, RemoteError};

use crate::models::course::{Course, CreateCourse};
use crate::{decode_row, decode_rows};

pub struct CourseRepo;

impl CourseRepo {
    pub async fn create(data: &dyn DataService, input: &CreateCourse) -> Result<Course, RemoteError> {
        let row = data
            .insert(tables::COURSES, serde_json::to_value(input)?)
            .await?;
        let course: Course = decode_row(row)?;
        tracing::info!(course_id = %course.id, code = %course.code, "Course created");
        Ok(course)
    }

    /// All courses ordered by code.
    pub async fn list(data: &dyn DataService) -> Result<Vec<Course>, RemoteError> {
        let query = Query::table(tables::COURSES).order("code", true);
        decode_rows(data.select(&query).await?)
    }

    pub async fn count(data: &dyn DataService) -> Result<u64, RemoteError> {
        data.count(&Query::table(tables::COURSES)).await
    }
}
