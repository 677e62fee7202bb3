//! Work activity type and status constants.
//!
//! The `work_activities` table is shared by genuine work activities,
//! assignments, and notifications; `activity_type` tells them apart.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Activity types
// ---------------------------------------------------------------------------

pub const TYPE_TEACHING: &str = "teaching";
pub const TYPE_RESEARCH: &str = "research";
pub const TYPE_ADMIN: &str = "admin";
pub const TYPE_OTHER: &str = "other";
pub const TYPE_ASSIGNMENT: &str = "assignment";
pub const TYPE_NOTIFICATION: &str = "notification";

/// Activity types a faculty member may log themselves.
pub const WORK_ACTIVITY_TYPES: &[&str] = &[TYPE_TEACHING, TYPE_RESEARCH, TYPE_ADMIN, TYPE_OTHER];

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Status given to a freshly issued assignment.
pub const STATUS_ASSIGNED: &str = "assigned";
/// Status given to a freshly sent notification.
pub const STATUS_UNREAD: &str = "unread";
pub const STATUS_READ: &str = "read";
pub const STATUS_IN_PROGRESS: &str = "in_progress";
/// Self-logged activities are recorded as already completed.
pub const STATUS_COMPLETED: &str = "completed";

/// All statuses the portal writes.
pub const VALID_STATUSES: &[&str] = &[
    STATUS_ASSIGNED,
    STATUS_UNREAD,
    STATUS_READ,
    STATUS_IN_PROGRESS,
    STATUS_COMPLETED,
];

/// Maximum hours that can be logged against a single activity.
pub const MAX_HOURS_SPENT: f64 = 1_000.0;

/// Validate a self-logged activity type.
pub fn validate_work_activity_type(activity_type: &str) -> Result<(), CoreError> {
    if WORK_ACTIVITY_TYPES.contains(&activity_type) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid activity type '{activity_type}'. Must be one of: {WORK_ACTIVITY_TYPES:?}"
        )))
    }
}

pub fn validate_status(status: &str) -> Result<(), CoreError> {
    if VALID_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid activity status '{status}'. Must be one of: {VALID_STATUSES:?}"
        )))
    }
}

pub fn validate_hours(hours: f64) -> Result<(), CoreError> {
    if !hours.is_finite() || hours < 0.0 || hours > MAX_HOURS_SPENT {
        return Err(CoreError::Validation(format!(
            "Hours spent must be between 0 and {MAX_HOURS_SPENT} (got {hours})"
        )));
    }
    Ok(())
}

/// Human-readable label for an activity type.
pub fn type_label(activity_type: &str) -> &str {
    match activity_type {
        TYPE_TEACHING => "Teaching",
        TYPE_RESEARCH => "Research",
        TYPE_ADMIN => "Administrative",
        TYPE_OTHER => "Other",
        TYPE_ASSIGNMENT => "Assignment",
        TYPE_NOTIFICATION => "Notification",
        other => other,
    }
}
