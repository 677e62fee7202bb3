//! Aggregate counts for the admin dashboard.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub total_faculty: u64,
    pub total_courses: u64,
    pub total_sessions: u64,
}
