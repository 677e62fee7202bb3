//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async functions that
//! accept `&dyn DataService` as the first argument.

pub mod class_record_repo;
pub mod class_session_repo;
pub mod course_repo;
pub mod profile_repo;
pub mod stats_repo;
pub mod work_activity_repo;
pub mod work_detail_repo;

pub use class_record_repo::ClassRecordRepo;
pub use class_session_repo::ClassSessionRepo;
pub use course_repo::CourseRepo;
pub use profile_repo::ProfileRepo;
pub use stats_repo::StatsRepo;
pub use work_activity_repo::WorkActivityRepo;
pub use work_detail_repo::WorkDetailRepo;
