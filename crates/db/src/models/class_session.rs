//! Scheduled class sessions.

use chrono::NaiveTime;
use fms_core::types::{Date, Id, Timestamp};
use serde::{Deserialize, Serialize};

/// Course columns embedded in a session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub name: String,
    pub code: String,
}

/// Faculty columns embedded in a session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacultySummary {
    pub full_name: String,
}

/// A row from the `class_sessions` table, optionally with its course and
/// faculty embedded (`courses` / `profiles` keys).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSession {
    pub id: Id,
    pub course_id: Option<Id>,
    pub faculty_id: Option<Id>,
    pub session_date: Date,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub topic: Option<String>,
    pub location: Option<String>,
    pub session_type: Option<String>,
    pub created_at: Option<Timestamp>,
    #[serde(default, rename = "courses")]
    pub course: Option<CourseSummary>,
    #[serde(default, rename = "profiles")]
    pub faculty: Option<FacultySummary>,
}
