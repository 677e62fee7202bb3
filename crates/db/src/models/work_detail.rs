//! Work detail models and DTOs.

use fms_core::schedule::SlotType;
use fms_core::types::{Date, Id, Timestamp};
use serde::{Deserialize, Serialize};

/// A row from the `work_details` table: a block of non-teaching work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkDetail {
    pub id: Id,
    pub faculty_id: Id,
    pub work_type: String,
    /// Free text, e.g. "2 hours".
    pub duration: String,
    pub slot_type: Option<SlotType>,
    pub description: String,
    pub remarks: Option<String>,
    pub document_url: Option<String>,
    pub session_date: Date,
    pub created_at: Timestamp,
}

/// DTO for creating a work detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateWorkDetail {
    pub faculty_id: Id,
    pub work_type: String,
    pub duration: String,
    pub slot_type: SlotType,
    pub description: String,
    pub remarks: Option<String>,
    pub document_url: Option<String>,
    pub session_date: Date,
}
