//! Cache keys shared by views and mutations.

use fms_core::types::Id;

use crate::cache::QueryKey;

pub const FACULTY_ASSIGNMENTS: &str = "faculty-assignments";
pub const FACULTY_NOTIFICATIONS: &str = "faculty-notifications";
pub const FACULTY_WORK_ACTIVITIES: &str = "faculty-work-activities";
pub const FACULTY_CLASS_RECORDS: &str = "faculty-class-records";
pub const FACULTY_WORK_DETAILS: &str = "faculty-work-details";
pub const PROFILE: &str = "profile";
pub const ALL_FACULTY: &str = "all-faculty";
pub const ALL_CLASS_RECORDS: &str = "all-class-records";
pub const ADMIN_STATS: &str = "admin-stats";
pub const COURSES: &str = "courses";

/// Prefix covering every key under `name`.
pub fn root(name: &str) -> QueryKey {
    QueryKey::new(name)
}

pub fn faculty_assignments(user_id: Id) -> QueryKey {
    QueryKey::new(FACULTY_ASSIGNMENTS).with(user_id)
}

pub fn faculty_notifications(user_id: Id) -> QueryKey {
    QueryKey::new(FACULTY_NOTIFICATIONS).with(user_id)
}

pub fn faculty_work_activities(user_id: Id) -> QueryKey {
    QueryKey::new(FACULTY_WORK_ACTIVITIES).with(user_id)
}

pub fn faculty_class_records(user_id: Id) -> QueryKey {
    QueryKey::new(FACULTY_CLASS_RECORDS).with(user_id)
}

pub fn faculty_work_details(user_id: Id) -> QueryKey {
    QueryKey::new(FACULTY_WORK_DETAILS).with(user_id)
}

pub fn profile(user_id: Id) -> QueryKey {
    QueryKey::new(PROFILE).with(user_id)
}

pub fn all_faculty() -> QueryKey {
    QueryKey::new(ALL_FACULTY)
}

/// Admin listing of class sessions with course and faculty names.
pub fn all_class_records() -> QueryKey {
    QueryKey::new(ALL_CLASS_RECORDS)
}

pub fn admin_stats() -> QueryKey {
    QueryKey::new(ADMIN_STATS)
}

pub fn courses() -> QueryKey {
    QueryKey::new(COURSES)
}
