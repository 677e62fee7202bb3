//! Faculty dashboard: own assignments, notifications, work log, class
//! records, and work details.

use std::sync::Arc;

use chrono::Utc;
use fms_core::activity::{self, STATUS_COMPLETED};
use fms_core::activity_record::{ActivityRecord, Assignment, Notification, WorkActivityDetails};
use fms_core::attendance;
use fms_core::error::CoreError;
use fms_core::schedule::SlotType;
use fms_core::types::{Date, Id, Timestamp};
use fms_db::models::class_record::{ClassRecord, CreateClassRecord};
use fms_db::models::work_activity::{NewWorkActivity, WorkActivity};
use fms_db::models::work_detail::{CreateWorkDetail, WorkDetail};
use fms_db::repositories::{ClassRecordRepo, WorkActivityRepo, WorkDetailRepo};
use fms_remote::DataService;
use validator::Validate;

use super::{non_blank, polled_query, required};
use crate::cache::QueryHandle;
use crate::error::{AppError, AppResult};
use crate::keys;
use crate::mutation::Mutation;
use crate::state::AppContext;
use crate::upload::{DocumentUpload, DocumentUploader};

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Validate)]
pub struct WorkActivityForm {
    #[validate(custom(function = "required", message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    /// One of teaching, research, admin, other.
    pub activity_type: String,
    pub hours_spent: Option<f64>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

impl WorkActivityForm {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        activity::validate_work_activity_type(&self.activity_type)?;
        if let Some(hours) = self.hours_spent {
            activity::validate_hours(hours)?;
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(CoreError::Validation(
                    "End date must not be before the start date".into(),
                )
                .into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Validate)]
pub struct ClassRecordForm {
    pub session_date: Date,
    #[validate(custom(function = "required", message = "Topic covered is required"))]
    pub topic_covered: String,
    pub students_present: i32,
    pub students_absent: i32,
    pub total_students: i32,
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub document: Option<DocumentUpload>,
}

impl ClassRecordForm {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        attendance::validate_counts(
            self.students_present,
            self.students_absent,
            self.total_students,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Validate)]
pub struct WorkDetailForm {
    pub session_date: Date,
    #[validate(custom(function = "required", message = "Work type is required"))]
    pub work_type: String,
    #[validate(custom(function = "required", message = "Duration is required"))]
    pub duration: String,
    pub slot_type: SlotType,
    #[validate(custom(function = "required", message = "Description is required"))]
    pub description: String,
    pub remarks: Option<String>,
    pub document: Option<DocumentUpload>,
}

// ---------------------------------------------------------------------------
// Decoded rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentItem {
    pub id: Id,
    pub assignment: Assignment,
    pub status: Option<String>,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationItem {
    pub id: Id,
    pub notification: Notification,
    pub status: Option<String>,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacultySection {
    Assignments,
    Notifications,
    WorkActivities,
    ClassRecords,
    WorkDetails,
    Attendance,
}

impl FacultySection {
    pub const ALL: [FacultySection; 6] = [
        FacultySection::Assignments,
        FacultySection::Notifications,
        FacultySection::WorkActivities,
        FacultySection::ClassRecords,
        FacultySection::WorkDetails,
        FacultySection::Attendance,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FacultySection::Assignments => "My Assignments",
            FacultySection::Notifications => "Notifications",
            FacultySection::WorkActivities => "Work Activities",
            FacultySection::ClassRecords => "Class Records",
            FacultySection::WorkDetails => "Work Details",
            FacultySection::Attendance => "Attendance",
        }
    }
}

// ---------------------------------------------------------------------------
// FacultyDashboard
// ---------------------------------------------------------------------------

pub struct FacultyDashboard {
    user_id: Id,
    pub assignments: QueryHandle<Vec<WorkActivity>>,
    pub notifications: QueryHandle<Vec<WorkActivity>>,
    pub work_activities: QueryHandle<Vec<WorkActivity>>,
    pub class_records: QueryHandle<Vec<ClassRecord>>,
    pub work_details: QueryHandle<Vec<WorkDetail>>,
    create_work_activity: Mutation<WorkActivityForm, WorkActivity>,
    create_class_record: Mutation<ClassRecordForm, ClassRecord>,
    create_work_detail: Mutation<WorkDetailForm, WorkDetail>,
}

impl FacultyDashboard {
    /// Mount the dashboard for the signed-in user.
    pub fn mount(ctx: &AppContext) -> AppResult<Self> {
        let user_id = ctx.session.user_id().ok_or(AppError::NotAuthenticated)?;
        let polling = ctx.config.polling;
        let structured = ctx.config.structured_activities;

        let assignments = polled_query(
            ctx,
            keys::faculty_assignments(user_id),
            polling.fast,
            move |data| async move { WorkActivityRepo::list_assignments(data.as_ref(), user_id).await },
        )?;
        let notifications = polled_query(
            ctx,
            keys::faculty_notifications(user_id),
            polling.fast,
            move |data| async move { WorkActivityRepo::list_notifications(data.as_ref(), user_id).await },
        )?;
        let work_activities = polled_query(
            ctx,
            keys::faculty_work_activities(user_id),
            polling.standard,
            move |data| async move { WorkActivityRepo::list_work_activities(data.as_ref(), user_id).await },
        )?;
        let class_records = polled_query(
            ctx,
            keys::faculty_class_records(user_id),
            polling.standard,
            move |data| async move { ClassRecordRepo::list_for_faculty(data.as_ref(), user_id).await },
        )?;
        let work_details = polled_query(
            ctx,
            keys::faculty_work_details(user_id),
            polling.standard,
            move |data| async move { WorkDetailRepo::list_for_faculty(data.as_ref(), user_id).await },
        )?;

        let create_work_activity = {
            let data = Arc::clone(&ctx.data);
            ctx.dispatcher
                .mutation("create-work-activity", move |form: WorkActivityForm| {
                    let data = Arc::clone(&data);
                    async move { insert_work_activity(data, user_id, structured, form).await }
                })
                .invalidates(keys::root(keys::FACULTY_WORK_ACTIVITIES))
                .success_message("Work activity created successfully")
                .acting_as(Some(user_id))
        };

        let create_class_record = {
            let data = Arc::clone(&ctx.data);
            let uploader = Arc::clone(&ctx.uploader);
            ctx.dispatcher
                .mutation("create-class-record", move |form: ClassRecordForm| {
                    let data = Arc::clone(&data);
                    let uploader = Arc::clone(&uploader);
                    async move { insert_class_record(data, uploader, user_id, form).await }
                })
                .invalidates(keys::root(keys::FACULTY_CLASS_RECORDS))
                .success_message("Class record created successfully")
                .acting_as(Some(user_id))
        };

        let create_work_detail = {
            let data = Arc::clone(&ctx.data);
            let uploader = Arc::clone(&ctx.uploader);
            ctx.dispatcher
                .mutation("create-work-detail", move |form: WorkDetailForm| {
                    let data = Arc::clone(&data);
                    let uploader = Arc::clone(&uploader);
                    async move { insert_work_detail(data, uploader, user_id, form).await }
                })
                .invalidates(keys::root(keys::FACULTY_WORK_DETAILS))
                .success_message("Work detail created successfully")
                .acting_as(Some(user_id))
        };

        tracing::debug!(%user_id, "Faculty dashboard mounted");
        Ok(Self {
            user_id,
            assignments,
            notifications,
            work_activities,
            class_records,
            work_details,
            create_work_activity,
            create_class_record,
            create_work_detail,
        })
    }

    pub fn user_id(&self) -> Id {
        self.user_id
    }

    // ---- reads ----

    pub fn decoded_assignments(&self) -> Vec<AssignmentItem> {
        rows(&self.assignments)
            .iter()
            .filter_map(|row| match row.record() {
                ActivityRecord::Assignment(assignment) => Some(AssignmentItem {
                    id: row.id,
                    assignment,
                    status: row.status.clone(),
                    created_at: row.created_at,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn decoded_notifications(&self) -> Vec<NotificationItem> {
        rows(&self.notifications)
            .iter()
            .filter_map(|row| match row.record() {
                ActivityRecord::Notification(notification) => Some(NotificationItem {
                    id: row.id,
                    notification,
                    status: row.status.clone(),
                    created_at: row.created_at,
                }),
                _ => None,
            })
            .collect()
    }

    /// Sidebar badge: shown only for non-empty assignment and notification
    /// lists.
    pub fn badge(&self, section: FacultySection) -> Option<usize> {
        let count = match section {
            FacultySection::Assignments => rows(&self.assignments).len(),
            FacultySection::Notifications => rows(&self.notifications).len(),
            _ => 0,
        };
        (count > 0).then_some(count)
    }

    pub fn is_saving(&self) -> bool {
        self.create_work_activity.is_pending()
            || self.create_class_record.is_pending()
            || self.create_work_detail.is_pending()
    }

    /// Wait until any of the dashboard's queries completes a fetch.
    pub async fn refreshed(&mut self) {
        tokio::select! {
            _ = self.assignments.fetched() => {}
            _ = self.notifications.fetched() => {}
            _ = self.work_activities.fetched() => {}
            _ = self.class_records.fetched() => {}
            _ = self.work_details.fetched() => {}
        }
    }

    // ---- actions ----

    /// Log a completed work activity.
    pub async fn log_work_activity(&self, form: WorkActivityForm) -> AppResult<WorkActivity> {
        self.create_work_activity.mutate(form).await
    }

    pub async fn submit_class_record(&self, form: ClassRecordForm) -> AppResult<ClassRecord> {
        self.create_class_record.mutate(form).await
    }

    /// Submit a class record and run `on_success` once it is saved.
    pub async fn submit_class_record_then(
        &self,
        form: ClassRecordForm,
        on_success: impl FnOnce(&ClassRecord),
    ) -> AppResult<ClassRecord> {
        self.create_class_record.mutate_then(form, on_success).await
    }

    pub async fn submit_work_detail(&self, form: WorkDetailForm) -> AppResult<WorkDetail> {
        self.create_work_detail.mutate(form).await
    }
}

/// Today's date, the default session date of the forms.
pub fn today() -> Date {
    Utc::now().date_naive()
}

// ---- private helpers ----

fn rows<T>(handle: &QueryHandle<Vec<T>>) -> Arc<Vec<T>> {
    handle.data().unwrap_or_default()
}

async fn insert_work_activity(
    data: Arc<dyn DataService>,
    user_id: Id,
    structured: bool,
    form: WorkActivityForm,
) -> AppResult<WorkActivity> {
    form.check()?;
    let input = NewWorkActivity {
        faculty_id: user_id,
        record: ActivityRecord::WorkActivity(WorkActivityDetails {
            activity_type: form.activity_type,
            title: form.title.trim().to_string(),
            description: non_blank(form.description.as_deref()),
        }),
        status: STATUS_COMPLETED.to_string(),
        hours_spent: form.hours_spent,
        start_date: form.start_date,
        end_date: form.end_date,
    };
    Ok(WorkActivityRepo::create(data.as_ref(), &input, structured).await?)
}

/// The document is uploaded first; a failed upload saves the record without
/// one.
async fn insert_class_record(
    data: Arc<dyn DataService>,
    uploader: Arc<DocumentUploader>,
    user_id: Id,
    form: ClassRecordForm,
) -> AppResult<ClassRecord> {
    form.check()?;
    let document_url = uploader.upload_or_none(user_id, form.document).await;
    let input = CreateClassRecord {
        faculty_id: user_id,
        session_date: form.session_date,
        topic_covered: form.topic_covered.trim().to_string(),
        students_present: form.students_present,
        students_absent: form.students_absent,
        total_students: form.total_students,
        description: non_blank(form.description.as_deref()),
        remarks: non_blank(form.remarks.as_deref()),
        document_url,
    };
    Ok(ClassRecordRepo::create(data.as_ref(), &input).await?)
}

async fn insert_work_detail(
    data: Arc<dyn DataService>,
    uploader: Arc<DocumentUploader>,
    user_id: Id,
    form: WorkDetailForm,
) -> AppResult<WorkDetail> {
    form.validate()?;
    let document_url = uploader.upload_or_none(user_id, form.document).await;
    let input = CreateWorkDetail {
        faculty_id: user_id,
        work_type: form.work_type.trim().to_string(),
        duration: form.duration.trim().to_string(),
        slot_type: form.slot_type,
        description: form.description.trim().to_string(),
        remarks: non_blank(form.remarks.as_deref()),
        document_url,
        session_date: form.session_date,
    };
    Ok(WorkDetailRepo::create(data.as_ref(), &input).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_form(present: i32, absent: i32, total: i32) -> ClassRecordForm {
        ClassRecordForm {
            session_date: today(),
            topic_covered: "Binary trees".into(),
            students_present: present,
            students_absent: absent,
            total_students: total,
            description: None,
            remarks: None,
            document: None,
        }
    }

    #[test]
    fn class_record_counts_are_checked() {
        assert!(record_form(25, 5, 30).check().is_ok());
        assert!(matches!(
            record_form(26, 5, 30).check(),
            Err(AppError::Core(CoreError::Validation(_)))
        ));
        let blank_topic = ClassRecordForm {
            topic_covered: String::new(),
            ..record_form(1, 0, 1)
        };
        assert!(matches!(blank_topic.check(), Err(AppError::Validation(_))));
        let spaces_only = ClassRecordForm {
            topic_covered: "   ".into(),
            ..record_form(1, 0, 1)
        };
        assert!(matches!(spaces_only.check(), Err(AppError::Validation(_))));
    }

    #[test]
    fn work_activity_form_rejects_unknown_types_and_reversed_dates() {
        let form = WorkActivityForm {
            title: "Guest lecture".into(),
            activity_type: "teaching".into(),
            hours_spent: Some(2.0),
            ..Default::default()
        };
        assert!(form.check().is_ok());

        let wrong_type = WorkActivityForm {
            activity_type: "assignment".into(),
            ..form.clone()
        };
        assert!(wrong_type.check().is_err());

        let reversed = WorkActivityForm {
            start_date: Some(today()),
            end_date: today().pred_opt(),
            ..form
        };
        assert!(reversed.check().is_err());
    }

    #[test]
    fn sections_have_sidebar_labels() {
        let labels: Vec<&str> = FacultySection::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels[0], "My Assignments");
        assert_eq!(labels.len(), 6);
    }
}
