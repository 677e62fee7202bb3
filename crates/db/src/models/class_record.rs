//! Class record models and DTOs.

use fms_core::attendance;
use fms_core::types::{Date, Id, Timestamp};
use serde::{Deserialize, Serialize};

/// A row from the `class_records` table: one taught class with attendance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: Id,
    pub faculty_id: Id,
    pub session_date: Date,
    pub topic_covered: String,
    pub students_present: i32,
    pub students_absent: i32,
    pub total_students: i32,
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub document_url: Option<String>,
    pub created_at: Timestamp,
}

impl ClassRecord {
    pub fn attendance_percentage(&self) -> Option<f64> {
        attendance::attendance_percentage(self.students_present, self.total_students)
    }
}

/// DTO for creating a class record.
///
/// Optional columns serialize as explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateClassRecord {
    pub faculty_id: Id,
    pub session_date: Date,
    pub topic_covered: String,
    pub students_present: i32,
    pub students_absent: i32,
    pub total_students: i32,
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub document_url: Option<String>,
}
