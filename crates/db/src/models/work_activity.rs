//! Work activity models and DTOs.
//!
//! The `work_activities` table carries three kinds of rows, told apart by
//! `activity_type`: self-logged activities, assignments, and notifications.
//! [`WorkActivity::record`] yields the typed [`ActivityRecord`] for a row.

use fms_core::activity_record::ActivityRecord;
use fms_core::types::{Date, Id, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A row from the `work_activities` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkActivity {
    pub id: Id,
    pub faculty_id: Option<Id>,
    pub title: String,
    pub description: Option<String>,
    pub activity_type: String,
    pub status: Option<String>,
    pub hours_spent: Option<f64>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    /// Structured record written alongside the legacy text, when enabled.
    #[serde(default)]
    pub details: Option<Value>,
}

impl WorkActivity {
    pub fn record(&self) -> ActivityRecord {
        ActivityRecord::classify(
            &self.activity_type,
            &self.title,
            self.description.as_deref(),
            self.details.as_ref(),
        )
    }
}

/// DTO for inserting a work activity row of any kind.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkActivity {
    pub faculty_id: Id,
    pub record: ActivityRecord,
    pub status: String,
    pub hours_spent: Option<f64>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

impl NewWorkActivity {
    /// Row to insert. Legacy `title` / `description` are always written;
    /// `details` only when `structured` is set.
    pub fn to_row(&self, structured: bool) -> Value {
        let stored = self.record.to_stored();
        let mut row = Map::new();
        row.insert("faculty_id".into(), Value::String(self.faculty_id.to_string()));
        row.insert("activity_type".into(), Value::String(stored.activity_type));
        row.insert("title".into(), Value::String(stored.title));
        row.insert(
            "description".into(),
            stored.description.map(Value::String).unwrap_or(Value::Null),
        );
        row.insert("status".into(), Value::String(self.status.clone()));
        if let Some(hours) = self.hours_spent {
            row.insert("hours_spent".into(), Value::from(hours));
        }
        if let Some(date) = self.start_date {
            row.insert("start_date".into(), Value::String(date.to_string()));
        }
        if let Some(date) = self.end_date {
            row.insert("end_date".into(), Value::String(date.to_string()));
        }
        if structured {
            row.insert("details".into(), stored.details);
        }
        Value::Object(row)
    }
}
