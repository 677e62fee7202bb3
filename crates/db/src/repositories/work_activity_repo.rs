//! Repository for the `work_activities` table.
//!
//! Assignments and notifications share the table with self-logged
//! activities; each listing filters on `activity_type`.

use fms_core::activity::{TYPE_ASSIGNMENT, TYPE_NOTIFICATION, WORK_ACTIVITY_TYPES};
use fms_core::types::Id;
use fms_remote::{tables, DataService, Query, RemoteError};

use crate::models::work_activity::{NewWorkActivity, WorkActivity};
use crate::{decode_row, decode_rows};

pub struct WorkActivityRepo;

impl WorkActivityRepo {
    /// Insert a row. `structured` also writes the `details` column.
    pub async fn create(
        data: &dyn DataService,
        input: &NewWorkActivity,
        structured: bool,
    ) -> Result<WorkActivity, RemoteError> {
        let row = data
            .insert(tables::WORK_ACTIVITIES, input.to_row(structured))
            .await?;
        let activity: WorkActivity = decode_row(row)?;
        tracing::info!(
            activity_id = %activity.id,
            faculty_id = %input.faculty_id,
            activity_type = %activity.activity_type,
            structured,
            "Work activity created",
        );
        Ok(activity)
    }

    /// Assignments issued to a faculty member, newest first.
    pub async fn list_assignments(
        data: &dyn DataService,
        faculty_id: Id,
    ) -> Result<Vec<WorkActivity>, RemoteError> {
        Self::list_of_type(data, faculty_id, TYPE_ASSIGNMENT).await
    }

    /// Notifications sent to a faculty member, newest first.
    pub async fn list_notifications(
        data: &dyn DataService,
        faculty_id: Id,
    ) -> Result<Vec<WorkActivity>, RemoteError> {
        Self::list_of_type(data, faculty_id, TYPE_NOTIFICATION).await
    }

    /// Self-logged activities (teaching, research, admin, other), newest first.
    pub async fn list_work_activities(
        data: &dyn DataService,
        faculty_id: Id,
    ) -> Result<Vec<WorkActivity>, RemoteError> {
        let query = Query::table(tables::WORK_ACTIVITIES)
            .eq("faculty_id", faculty_id.to_string())
            .in_list("activity_type", WORK_ACTIVITY_TYPES.iter().copied())
            .newest_first();
        decode_rows(data.select(&query).await?)
    }

    // ---- private helpers ----

    async fn list_of_type(
        data: &dyn DataService,
        faculty_id: Id,
        activity_type: &str,
    ) -> Result<Vec<WorkActivity>, RemoteError> {
        let query = Query::table(tables::WORK_ACTIVITIES)
            .eq("faculty_id", faculty_id.to_string())
            .eq("activity_type", activity_type)
            .newest_first();
        decode_rows(data.select(&query).await?)
    }
}
