//! Legacy text encoding for assignments and notifications.
//!
//! The remote store has no assignment or notification tables, so both are
//! written as `work_activities` rows whose `title`/`description` pair carries
//! the structured fields:
//!
//! ```text
//! title:       "Assignment: Data Structures"
//! description: "Branch: CSE, Semester: 3rd, Time Slot: 10-11, Students: 60"
//! ```
//!
//! Decoding is best-effort: a field whose label is missing decodes to
//! [`NOT_AVAILABLE`]. Values are delimited by commas, so a value that itself
//! contains a comma truncates at the comma and does not round-trip. That is
//! the stored format and is kept for interop with existing rows; new code
//! should prefer [`ActivityRecord`](crate::activity_record::ActivityRecord).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Title prefix marking an assignment row.
pub const ASSIGNMENT_PREFIX: &str = "Assignment: ";

/// Title prefix marking a notification row.
pub const NOTIFICATION_PREFIX: &str = "Notification: ";

/// Sentinel for a field that could not be decoded.
pub const NOT_AVAILABLE: &str = "N/A";

/// Fallback title for a notification whose title is empty after decoding.
pub const DEFAULT_NOTIFICATION_TITLE: &str = "Notification";

const LABEL_BRANCH: &str = "Branch";
const LABEL_SEMESTER: &str = "Semester";
const LABEL_TIME_SLOT: &str = "Time Slot";
const LABEL_STUDENTS: &str = "Students";

static BRANCH_RE: LazyLock<Regex> = LazyLock::new(|| field_regex(LABEL_BRANCH));
static SEMESTER_RE: LazyLock<Regex> = LazyLock::new(|| field_regex(LABEL_SEMESTER));
static TIME_SLOT_RE: LazyLock<Regex> = LazyLock::new(|| field_regex(LABEL_TIME_SLOT));
static STUDENTS_RE: LazyLock<Regex> = LazyLock::new(|| field_regex(LABEL_STUDENTS));

fn field_regex(label: &str) -> Regex {
    Regex::new(&format!("{}: ([^,]+)", regex::escape(label))).expect("valid regex")
}

/// A `title`/`description` pair as stored in `work_activities`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedText {
    pub title: String,
    pub description: String,
}

/// The fields packed into an assignment row, all as display strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentFields {
    pub subject: String,
    pub branch: String,
    pub semester: String,
    pub time_slot: String,
    pub student_count: String,
}

/// A decoded notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationText {
    pub title: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

/// Pack assignment fields into a title and a fixed-order description.
pub fn encode_assignment(fields: &AssignmentFields) -> EncodedText {
    EncodedText {
        title: format!("{ASSIGNMENT_PREFIX}{}", fields.subject),
        description: format!(
            "{LABEL_BRANCH}: {}, {LABEL_SEMESTER}: {}, {LABEL_TIME_SLOT}: {}, {LABEL_STUDENTS}: {}",
            fields.branch, fields.semester, fields.time_slot, fields.student_count
        ),
    }
}

/// Unpack an assignment row. Never fails; missing fields become `"N/A"`.
///
/// The subject is the title with a leading `"Assignment: "` removed. A title
/// without the prefix is used as-is, and an empty subject decodes to `"N/A"`.
pub fn decode_assignment(text: &EncodedText) -> AssignmentFields {
    let subject = text
        .title
        .strip_prefix(ASSIGNMENT_PREFIX)
        .unwrap_or(&text.title);

    AssignmentFields {
        subject: or_not_available(subject),
        branch: capture(&BRANCH_RE, &text.description),
        semester: capture(&SEMESTER_RE, &text.description),
        time_slot: capture(&TIME_SLOT_RE, &text.description),
        student_count: capture(&STUDENTS_RE, &text.description),
    }
}

/// Returns `true` if the title carries the assignment prefix.
pub fn is_assignment_title(title: &str) -> bool {
    title.starts_with(ASSIGNMENT_PREFIX)
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

pub fn encode_notification(title: &str, message: &str) -> EncodedText {
    EncodedText {
        title: format!("{NOTIFICATION_PREFIX}{title}"),
        description: message.to_string(),
    }
}

/// Strip the notification prefix; an empty title becomes `"Notification"`.
pub fn decode_notification(text: &EncodedText) -> NotificationText {
    let title = text
        .title
        .strip_prefix(NOTIFICATION_PREFIX)
        .unwrap_or(&text.title);
    let title = if title.is_empty() {
        DEFAULT_NOTIFICATION_TITLE.to_string()
    } else {
        title.to_string()
    };

    NotificationText {
        title,
        message: text.description.clone(),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn capture(re: &Regex, haystack: &str) -> String {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn or_not_available(value: &str) -> String {
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}
