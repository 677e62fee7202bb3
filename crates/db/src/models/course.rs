//! Course models and DTOs.

use fms_core::schedule::CourseStatus;
use fms_core::types::{Id, Timestamp};
use serde::{Deserialize, Serialize};

/// A row from the `courses` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Id,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub department_id: Option<Id>,
    pub faculty_id: Option<Id>,
    pub credits: Option<i32>,
    pub semester: Option<String>,
    pub academic_year: Option<String>,
    pub status: Option<CourseStatus>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

/// DTO for creating a course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateCourse {
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculty_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,
    pub status: CourseStatus,
}
