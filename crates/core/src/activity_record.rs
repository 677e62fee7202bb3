//! Tagged activity records.
//!
//! A `work_activities` row is one of three things: an assignment issued by an
//! administrator, a notification sent by an administrator, or an activity a
//! faculty member logged. [`ActivityRecord`] models that as a discriminated
//! union instead of prefix-and-regex conventions.
//!
//! Rows may carry a structured `details` object (the serialized record). When
//! present it wins; otherwise the legacy title/description text is decoded via
//! [`record_codec`](crate::record_codec).

use serde::{Deserialize, Serialize};

use crate::activity::{TYPE_ASSIGNMENT, TYPE_NOTIFICATION};
use crate::error::CoreError;
use crate::record_codec::{
    decode_assignment, decode_notification, encode_assignment, encode_notification,
    AssignmentFields, EncodedText, NOT_AVAILABLE,
};

/// Structured assignment fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub subject: String,
    pub branch: String,
    pub semester: String,
    pub time_slot: String,
    /// `None` when a legacy row carried no parseable count.
    pub student_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

/// A genuine, self-logged work activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkActivityDetails {
    pub activity_type: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityRecord {
    Assignment(Assignment),
    Notification(Notification),
    WorkActivity(WorkActivityDetails),
}

/// Column values to write for an [`ActivityRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredActivity {
    pub activity_type: String,
    pub title: String,
    pub description: Option<String>,
    pub details: serde_json::Value,
}

impl Assignment {
    /// Convert decoded legacy text into structured fields.
    ///
    /// `"N/A"` and non-numeric student counts become `None`.
    pub fn from_legacy(fields: AssignmentFields) -> Self {
        Self {
            student_count: fields.student_count.trim().parse().ok(),
            subject: fields.subject,
            branch: fields.branch,
            semester: fields.semester,
            time_slot: fields.time_slot,
        }
    }

    pub fn to_legacy(&self) -> AssignmentFields {
        AssignmentFields {
            subject: self.subject.clone(),
            branch: self.branch.clone(),
            semester: self.semester.clone(),
            time_slot: self.time_slot.clone(),
            student_count: self.student_count_display(),
        }
    }

    pub fn student_count_display(&self) -> String {
        self.student_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    /// Reject values the legacy text format cannot carry.
    ///
    /// A comma would cut the value short for any reader that only understands
    /// the comma-delimited description.
    pub fn validate_legacy_safe(&self) -> Result<(), CoreError> {
        let offending: Vec<&str> = [
            ("branch", &self.branch),
            ("semester", &self.semester),
            ("time_slot", &self.time_slot),
        ]
        .into_iter()
        .filter(|(_, v)| v.contains(','))
        .map(|(name, _)| name)
        .collect();

        if offending.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Commas are not allowed in assignment fields: {}",
                offending.join(", ")
            )))
        }
    }
}

impl ActivityRecord {
    /// Classify a stored row.
    ///
    /// A `details` object is used when it deserializes to a record whose kind
    /// agrees with `activity_type`; anything else falls back to the legacy
    /// text so malformed details never hide a row.
    pub fn classify(
        activity_type: &str,
        title: &str,
        description: Option<&str>,
        details: Option<&serde_json::Value>,
    ) -> Self {
        if let Some(record) = details
            .and_then(|d| serde_json::from_value::<ActivityRecord>(d.clone()).ok())
            .filter(|r| r.activity_type_matches(activity_type))
        {
            return record;
        }

        let text = EncodedText {
            title: title.to_string(),
            description: description.unwrap_or_default().to_string(),
        };

        match activity_type {
            TYPE_ASSIGNMENT => Self::Assignment(Assignment::from_legacy(decode_assignment(&text))),
            TYPE_NOTIFICATION => {
                let decoded = decode_notification(&text);
                Self::Notification(Notification {
                    title: decoded.title,
                    message: decoded.message,
                })
            }
            other => Self::WorkActivity(WorkActivityDetails {
                activity_type: other.to_string(),
                title: title.to_string(),
                description: description.map(str::to_string),
            }),
        }
    }

    pub fn activity_type(&self) -> &str {
        match self {
            Self::Assignment(_) => TYPE_ASSIGNMENT,
            Self::Notification(_) => TYPE_NOTIFICATION,
            Self::WorkActivity(w) => &w.activity_type,
        }
    }

    fn activity_type_matches(&self, activity_type: &str) -> bool {
        self.activity_type() == activity_type
    }

    /// Column values for this record, with legacy text always populated.
    pub fn to_stored(&self) -> StoredActivity {
        let (title, description) = match self {
            Self::Assignment(a) => {
                let text = encode_assignment(&a.to_legacy());
                (text.title, Some(text.description))
            }
            Self::Notification(n) => {
                let text = encode_notification(&n.title, &n.message);
                (text.title, Some(text.description))
            }
            Self::WorkActivity(w) => (w.title.clone(), w.description.clone()),
        };

        StoredActivity {
            activity_type: self.activity_type().to_string(),
            title,
            description,
            details: serde_json::to_value(self).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sample_assignment() -> Assignment {
        Assignment {
            subject: "Data Structures".into(),
            branch: "CSE".into(),
            semester: "3rd".into(),
            time_slot: "10-11".into(),
            student_count: Some(60),
        }
    }

    #[test]
    fn legacy_assignment_row_is_classified() {
        let record = ActivityRecord::classify(
            TYPE_ASSIGNMENT,
            "Assignment: Data Structures",
            Some("Branch: CSE, Semester: 3rd, Time Slot: 10-11, Students: 60"),
            None,
        );
        assert_eq!(record, ActivityRecord::Assignment(sample_assignment()));
    }

    #[test]
    fn structured_details_win_over_text() {
        let mut assignment = sample_assignment();
        assignment.branch = "CSE, AI".into();
        let record = ActivityRecord::Assignment(assignment.clone());
        let stored = record.to_stored();

        let classified = ActivityRecord::classify(
            &stored.activity_type,
            &stored.title,
            stored.description.as_deref(),
            Some(&stored.details),
        );
        assert_matches!(classified, ActivityRecord::Assignment(a) if a.branch == "CSE, AI");
    }

    #[test]
    fn mismatched_details_fall_back_to_text() {
        let details = serde_json::json!({"kind": "notification", "title": "x", "message": "y"});
        let record = ActivityRecord::classify(
            TYPE_ASSIGNMENT,
            "Assignment: Compilers",
            Some("Branch: IT"),
            Some(&details),
        );
        assert_matches!(record, ActivityRecord::Assignment(a) if a.subject == "Compilers" && a.student_count.is_none());
    }

    #[test]
    fn malformed_details_fall_back_to_text() {
        let details = serde_json::json!({"kind": "assignment"});
        let record = ActivityRecord::classify(
            TYPE_NOTIFICATION,
            "Notification: Meeting",
            Some("Staff meeting at 4pm"),
            Some(&details),
        );
        assert_eq!(
            record,
            ActivityRecord::Notification(Notification {
                title: "Meeting".into(),
                message: "Staff meeting at 4pm".into(),
            })
        );
    }

    #[test]
    fn work_activity_keeps_its_type() {
        let record = ActivityRecord::classify("research", "Paper review", None, None);
        assert_eq!(record.activity_type(), "research");
        assert_matches!(record, ActivityRecord::WorkActivity(w) if w.description.is_none());
    }

    #[test]
    fn stored_assignment_has_legacy_text_and_tagged_details() {
        let stored = ActivityRecord::Assignment(sample_assignment()).to_stored();
        assert_eq!(stored.activity_type, TYPE_ASSIGNMENT);
        assert_eq!(stored.title, "Assignment: Data Structures");
        assert_eq!(
            stored.description.as_deref(),
            Some("Branch: CSE, Semester: 3rd, Time Slot: 10-11, Students: 60")
        );
        assert_eq!(stored.details["kind"], "assignment");
        assert_eq!(stored.details["student_count"], 60);
    }

    #[test]
    fn non_numeric_student_count_is_none() {
        let fields = AssignmentFields {
            subject: "X".into(),
            branch: "Y".into(),
            semester: "Z".into(),
            time_slot: "W".into(),
            student_count: NOT_AVAILABLE.into(),
        };
        let a = Assignment::from_legacy(fields);
        assert_eq!(a.student_count, None);
        assert_eq!(a.student_count_display(), NOT_AVAILABLE);
    }

    #[test]
    fn commas_are_not_legacy_safe() {
        assert!(sample_assignment().validate_legacy_safe().is_ok());
        let mut a = sample_assignment();
        a.time_slot = "10-11, 14-15".into();
        assert!(a.validate_legacy_safe().is_err());
    }
}
