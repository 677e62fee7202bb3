//! Admin dashboard counts.

use fms_core::roles::Role;
use fms_remote::{DataService, RemoteError};

use super::{ClassSessionRepo, CourseRepo, ProfileRepo};
use crate::models::stats::AdminStats;

pub struct StatsRepo;

impl StatsRepo {
    /// Faculty, course, and session counts, fetched concurrently.
    pub async fn admin_stats(data: &dyn DataService) -> Result<AdminStats, RemoteError> {
        let (total_faculty, total_courses, total_sessions) = futures::try_join!(
            ProfileRepo::count_by_role(data, Role::Faculty),
            CourseRepo::count(data),
            ClassSessionRepo::count(data),
        )?;
        Ok(AdminStats {
            total_faculty,
            total_courses,
            total_sessions,
        })
    }
}
