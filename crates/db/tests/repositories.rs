//! Repository round trips against the in-memory backend.

use assert_matches::assert_matches;
use chrono::NaiveDate;
use fms_core::activity::{STATUS_ASSIGNED, STATUS_COMPLETED, STATUS_UNREAD, TYPE_TEACHING};
use fms_core::activity_record::{ActivityRecord, Assignment, Notification, WorkActivityDetails};
use fms_core::roles::Role;
use fms_core::schedule::{CourseStatus, SlotType};
use fms_core::types::Id;
use fms_db::models::class_record::CreateClassRecord;
use fms_db::models::course::CreateCourse;
use fms_db::models::profile::UpdateProfile;
use fms_db::models::work_activity::NewWorkActivity;
use fms_db::models::work_detail::CreateWorkDetail;
use fms_db::repositories::{
    ClassRecordRepo, ClassSessionRepo, CourseRepo, ProfileRepo, StatsRepo, WorkActivityRepo,
    WorkDetailRepo,
};
use fms_remote::{tables, MemoryBackend, Operation, RemoteError};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn date(s: &str) -> NaiveDate {
    s.parse().expect("valid date")
}

fn new_activity(faculty_id: Id, record: ActivityRecord, status: &str) -> NewWorkActivity {
    NewWorkActivity {
        faculty_id,
        record,
        status: status.to_string(),
        hours_spent: None,
        start_date: None,
        end_date: None,
    }
}

fn data_structures() -> ActivityRecord {
    ActivityRecord::Assignment(Assignment {
        subject: "Data Structures".into(),
        branch: "CSE".into(),
        semester: "3rd".into(),
        time_slot: "10-11".into(),
        student_count: Some(60),
    })
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn profiles_are_listed_by_role_and_patched() {
    let backend = MemoryBackend::new();
    let rao = backend.register_user("rao@uni.edu", "pw", "Dr. Rao", Role::Faculty, true);
    backend.register_user("admin@uni.edu", "pw", "Admin", Role::Admin, true);
    backend.register_user("iyer@uni.edu", "pw", "Dr. Iyer", Role::Faculty, true);

    let faculty = ProfileRepo::list_by_role(&backend, Role::Faculty).await.unwrap();
    assert_eq!(faculty.len(), 2);
    assert_eq!(faculty[0].full_name, "Dr. Iyer");
    assert_eq!(ProfileRepo::count_by_role(&backend, Role::Admin).await.unwrap(), 1);

    let patch = UpdateProfile {
        department: Some("Computer Science".into()),
        ..Default::default()
    };
    let updated = ProfileRepo::update(&backend, rao.id, &patch)
        .await
        .unwrap()
        .expect("profile exists");
    assert_eq!(updated.department.as_deref(), Some("Computer Science"));
    assert_eq!(updated.full_name, "Dr. Rao");

    let missing = ProfileRepo::find_by_id(&backend, Id::new_v4()).await.unwrap();
    assert!(missing.is_none());
}

// ---------------------------------------------------------------------------
// Class records and work details
// ---------------------------------------------------------------------------

#[tokio::test]
async fn class_record_writes_explicit_nulls() {
    let backend = MemoryBackend::new();
    let faculty_id = Id::new_v4();
    let input = CreateClassRecord {
        faculty_id,
        session_date: date("2024-03-04"),
        topic_covered: "Binary trees".into(),
        students_present: 25,
        students_absent: 5,
        total_students: 30,
        description: None,
        remarks: None,
        document_url: None,
    };

    let record = ClassRecordRepo::create(&backend, &input).await.unwrap();
    assert_eq!(record.attendance_percentage(), Some(83.3));

    let stored = &backend.rows(tables::CLASS_RECORDS)[0];
    assert!(stored["document_url"].is_null());
    assert!(stored.get("document_url").is_some());

    let listed = ClassRecordRepo::list_for_faculty(&backend, faculty_id).await.unwrap();
    assert_eq!(listed, vec![record]);
    let other = ClassRecordRepo::list_for_faculty(&backend, Id::new_v4()).await.unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn work_details_keep_slot() {
    let backend = MemoryBackend::new();
    let faculty_id = Id::new_v4();
    let input = CreateWorkDetail {
        faculty_id,
        work_type: "Lab preparation".into(),
        duration: "2 hours".into(),
        slot_type: SlotType::Afternoon,
        description: "Set up the networking lab".into(),
        remarks: None,
        document_url: None,
        session_date: date("2024-03-05"),
    };
    WorkDetailRepo::create(&backend, &input).await.unwrap();

    let details = WorkDetailRepo::list_for_faculty(&backend, faculty_id).await.unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].slot_type, Some(SlotType::Afternoon));
}

// ---------------------------------------------------------------------------
// Work activities
// ---------------------------------------------------------------------------

#[tokio::test]
async fn activity_listings_split_by_type() {
    let backend = MemoryBackend::new();
    let faculty_id = Id::new_v4();

    WorkActivityRepo::create(
        &backend,
        &new_activity(faculty_id, data_structures(), STATUS_ASSIGNED),
        false,
    )
    .await
    .unwrap();
    WorkActivityRepo::create(
        &backend,
        &new_activity(
            faculty_id,
            ActivityRecord::Notification(Notification {
                title: "Exam duty".into(),
                message: "Report to hall B".into(),
            }),
            STATUS_UNREAD,
        ),
        false,
    )
    .await
    .unwrap();
    let mut taught = new_activity(
        faculty_id,
        ActivityRecord::WorkActivity(WorkActivityDetails {
            activity_type: TYPE_TEACHING.into(),
            title: "Guest lecture".into(),
            description: None,
        }),
        STATUS_COMPLETED,
    );
    taught.hours_spent = Some(1.5);
    WorkActivityRepo::create(&backend, &taught, false).await.unwrap();

    let assignments = WorkActivityRepo::list_assignments(&backend, faculty_id).await.unwrap();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].record(), data_structures());
    assert_eq!(assignments[0].status.as_deref(), Some(STATUS_ASSIGNED));

    let notifications = WorkActivityRepo::list_notifications(&backend, faculty_id).await.unwrap();
    assert_matches!(
        notifications[0].record(),
        ActivityRecord::Notification(n) if n.title == "Exam duty" && n.message == "Report to hall B"
    );

    let logged = WorkActivityRepo::list_work_activities(&backend, faculty_id).await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].hours_spent, Some(1.5));
}

#[tokio::test]
async fn structured_details_survive_commas() {
    let backend = MemoryBackend::new();
    let faculty_id = Id::new_v4();
    let record = ActivityRecord::Assignment(Assignment {
        subject: "Networks".into(),
        branch: "CSE, AI".into(),
        semester: "5th".into(),
        time_slot: "2-3".into(),
        student_count: Some(40),
    });

    WorkActivityRepo::create(
        &backend,
        &new_activity(faculty_id, record.clone(), STATUS_ASSIGNED),
        true,
    )
    .await
    .unwrap();

    let listed = WorkActivityRepo::list_assignments(&backend, faculty_id).await.unwrap();
    assert_eq!(listed[0].record(), record);
}

// ---------------------------------------------------------------------------
// Admin listings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sessions_embed_course_and_faculty() {
    let backend = MemoryBackend::new();
    let rao = backend.register_user("rao@uni.edu", "pw", "Dr. Rao", Role::Faculty, true);
    let course = CourseRepo::create(
        &backend,
        &CreateCourse {
            code: "CS201".into(),
            name: "Data Structures".into(),
            description: None,
            faculty_id: Some(rao.id),
            credits: Some(4),
            semester: Some("3".into()),
            academic_year: None,
            status: CourseStatus::Active,
        },
    )
    .await
    .unwrap();
    backend.seed(
        tables::CLASS_SESSIONS,
        json!({
            "course_id": course.id,
            "faculty_id": rao.id,
            "session_date": "2024-03-04",
            "start_time": "10:00:00",
            "end_time": "11:00:00",
            "topic": "Heaps",
        }),
    );

    let sessions = ClassSessionRepo::list_with_details(&backend).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].course.as_ref().map(|c| c.code.as_str()), Some("CS201"));
    assert_eq!(
        sessions[0].faculty.as_ref().map(|f| f.full_name.as_str()),
        Some("Dr. Rao")
    );

    let stats = StatsRepo::admin_stats(&backend).await.unwrap();
    assert_eq!(stats.total_faculty, 1);
    assert_eq!(stats.total_courses, 1);
    assert_eq!(stats.total_sessions, 1);
}

#[tokio::test]
async fn stats_fail_when_any_count_fails() {
    let backend = MemoryBackend::new();
    backend.fail_next(Operation::Count);
    assert_matches!(
        StatsRepo::admin_stats(&backend).await,
        Err(RemoteError::Unavailable(_))
    );
}

#[tokio::test]
async fn health_check_reports_outage() {
    let backend = MemoryBackend::new();
    assert!(fms_db::health_check(&backend).await.is_ok());
    backend.set_failing(Operation::Count, true);
    assert!(fms_db::health_check(&backend).await.is_err());
}
