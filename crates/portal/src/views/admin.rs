//! Admin dashboard: faculty roster, class sessions, totals, and the admin
//! writes (assignments, notifications, profile edits, courses).

use std::sync::Arc;

use fms_core::activity::{STATUS_ASSIGNED, STATUS_UNREAD};
use fms_core::activity_record::{ActivityRecord, Assignment, Notification};
use fms_core::error::CoreError;
use fms_core::roles::Role;
use fms_core::schedule::CourseStatus;
use fms_core::types::Id;
use fms_db::models::class_session::ClassSession;
use fms_db::models::course::{Course, CreateCourse};
use fms_db::models::profile::{Profile, UpdateProfile};
use fms_db::models::stats::AdminStats;
use fms_db::models::work_activity::{NewWorkActivity, WorkActivity};
use fms_db::repositories::{
    ClassSessionRepo, CourseRepo, ProfileRepo, StatsRepo, WorkActivityRepo,
};
use fms_remote::DataService;
use validator::Validate;

use super::{non_blank, polled_query, required};
use crate::cache::QueryHandle;
use crate::error::{AppError, AppResult};
use crate::keys;
use crate::mutation::Mutation;
use crate::state::AppContext;

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Validate)]
pub struct AssignmentForm {
    pub faculty_id: Id,
    #[validate(custom(function = "required", message = "Subject is required"))]
    pub subject: String,
    #[validate(custom(function = "required", message = "Branch is required"))]
    pub branch: String,
    #[validate(custom(function = "required", message = "Semester is required"))]
    pub semester: String,
    #[validate(custom(function = "required", message = "Time slot is required"))]
    pub time_slot: String,
    pub student_count: Option<u32>,
}

impl AssignmentForm {
    fn into_assignment(self) -> Assignment {
        Assignment {
            subject: self.subject.trim().to_string(),
            branch: self.branch.trim().to_string(),
            semester: self.semester.trim().to_string(),
            time_slot: self.time_slot.trim().to_string(),
            student_count: self.student_count,
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct NotificationForm {
    pub faculty_id: Id,
    #[validate(custom(function = "required", message = "Title is required"))]
    pub title: String,
    #[validate(custom(function = "required", message = "Message is required"))]
    pub message: String,
}

#[derive(Debug, Clone, Validate)]
pub struct CourseForm {
    #[validate(custom(function = "required", message = "Course code is required"))]
    pub code: String,
    #[validate(custom(function = "required", message = "Course name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub faculty_id: Option<Id>,
    #[validate(range(min = 0, max = 30, message = "Credits must be between 0 and 30"))]
    pub credits: Option<i32>,
    pub semester: Option<String>,
    pub academic_year: Option<String>,
    /// Active when not chosen.
    pub status: Option<CourseStatus>,
}

// ---------------------------------------------------------------------------
// AdminDashboard
// ---------------------------------------------------------------------------

pub struct AdminDashboard {
    admin: Profile,
    pub faculty: QueryHandle<Vec<Profile>>,
    pub class_sessions: QueryHandle<Vec<ClassSession>>,
    pub stats: QueryHandle<AdminStats>,
    pub courses: QueryHandle<Vec<Course>>,
    create_assignment: Mutation<AssignmentForm, WorkActivity>,
    send_notification: Mutation<NotificationForm, WorkActivity>,
    update_profile: Mutation<(Id, UpdateProfile), Profile>,
    create_course: Mutation<CourseForm, Course>,
}

impl AdminDashboard {
    /// Mount the dashboard. The signed-in profile must carry the admin role.
    pub async fn mount(ctx: &AppContext) -> AppResult<Self> {
        let user_id = ctx.session.user_id().ok_or(AppError::NotAuthenticated)?;
        let admin = ProfileRepo::find_by_id(ctx.data.as_ref(), user_id)
            .await?
            .filter(|p| p.role.is_admin())
            .ok_or_else(|| AppError::Forbidden("Administrator access required".into()))?;

        let polling = ctx.config.polling;
        let structured = ctx.config.structured_activities;

        let faculty = polled_query(ctx, keys::all_faculty(), polling.faculty_list, |data| async move {
            ProfileRepo::list_by_role(data.as_ref(), Role::Faculty).await
        })?;
        let class_sessions = polled_query(
            ctx,
            keys::all_class_records(),
            polling.standard,
            |data| async move { ClassSessionRepo::list_with_details(data.as_ref()).await },
        )?;
        let stats = polled_query(ctx, keys::admin_stats(), polling.stats, |data| async move {
            StatsRepo::admin_stats(data.as_ref()).await
        })?;
        let courses = polled_query(ctx, keys::courses(), polling.standard, |data| async move {
            CourseRepo::list(data.as_ref()).await
        })?;

        let create_assignment = {
            let data = Arc::clone(&ctx.data);
            ctx.dispatcher
                .mutation("create-assignment", move |form: AssignmentForm| {
                    let data = Arc::clone(&data);
                    async move { insert_assignment(data, structured, form).await }
                })
                .invalidates(keys::root(keys::FACULTY_ASSIGNMENTS))
                .success_message("Assignment created successfully")
                .acting_as(Some(user_id))
        };

        let send_notification = {
            let data = Arc::clone(&ctx.data);
            ctx.dispatcher
                .mutation("send-notification", move |form: NotificationForm| {
                    let data = Arc::clone(&data);
                    async move { insert_notification(data, structured, form).await }
                })
                .invalidates(keys::root(keys::FACULTY_NOTIFICATIONS))
                .success_message("Notification sent successfully")
                .acting_as(Some(user_id))
        };

        let update_profile = {
            let data = Arc::clone(&ctx.data);
            ctx.dispatcher
                .mutation(
                    "update-faculty-profile",
                    move |(id, patch): (Id, UpdateProfile)| {
                        let data = Arc::clone(&data);
                        async move { patch_profile(data, id, patch).await }
                    },
                )
                .invalidates(keys::all_faculty())
                .invalidates(keys::root(keys::PROFILE))
                .success_message("Faculty profile updated successfully")
                .acting_as(Some(user_id))
        };

        let create_course = {
            let data = Arc::clone(&ctx.data);
            ctx.dispatcher
                .mutation("create-course", move |form: CourseForm| {
                    let data = Arc::clone(&data);
                    async move { insert_course(data, form).await }
                })
                .invalidates(keys::courses())
                .invalidates(keys::admin_stats())
                .success_message("Course created successfully")
                .acting_as(Some(user_id))
        };

        tracing::debug!(admin_id = %admin.id, "Admin dashboard mounted");
        Ok(Self {
            admin,
            faculty,
            class_sessions,
            stats,
            courses,
            create_assignment,
            send_notification,
            update_profile,
            create_course,
        })
    }

    /// The signed-in administrator's profile.
    pub fn admin(&self) -> &Profile {
        &self.admin
    }

    pub fn is_saving(&self) -> bool {
        self.create_assignment.is_pending()
            || self.send_notification.is_pending()
            || self.update_profile.is_pending()
            || self.create_course.is_pending()
    }

    /// Wait until any of the rendered queries completes a fetch.
    pub async fn refreshed(&mut self) {
        tokio::select! {
            _ = self.stats.fetched() => {}
            _ = self.faculty.fetched() => {}
            _ = self.class_sessions.fetched() => {}
            _ = self.courses.fetched() => {}
        }
    }

    // ---- actions ----

    pub async fn assign(&self, form: AssignmentForm) -> AppResult<WorkActivity> {
        self.create_assignment.mutate(form).await
    }

    pub async fn notify(&self, form: NotificationForm) -> AppResult<WorkActivity> {
        self.send_notification.mutate(form).await
    }

    pub async fn update_faculty(&self, id: Id, patch: UpdateProfile) -> AppResult<Profile> {
        self.update_profile.mutate((id, patch)).await
    }

    pub async fn add_course(&self, form: CourseForm) -> AppResult<Course> {
        self.create_course.mutate(form).await
    }
}

// ---- private helpers ----

async fn insert_assignment(
    data: Arc<dyn DataService>,
    structured: bool,
    form: AssignmentForm,
) -> AppResult<WorkActivity> {
    form.validate()?;
    let faculty_id = form.faculty_id;
    let assignment = form.into_assignment();
    if !structured {
        assignment.validate_legacy_safe()?;
    }
    let input = NewWorkActivity {
        faculty_id,
        record: ActivityRecord::Assignment(assignment),
        status: STATUS_ASSIGNED.to_string(),
        hours_spent: None,
        start_date: None,
        end_date: None,
    };
    Ok(WorkActivityRepo::create(data.as_ref(), &input, structured).await?)
}

async fn insert_notification(
    data: Arc<dyn DataService>,
    structured: bool,
    form: NotificationForm,
) -> AppResult<WorkActivity> {
    form.validate()?;
    let input = NewWorkActivity {
        faculty_id: form.faculty_id,
        record: ActivityRecord::Notification(Notification {
            title: form.title.trim().to_string(),
            message: form.message.trim().to_string(),
        }),
        status: STATUS_UNREAD.to_string(),
        hours_spent: None,
        start_date: None,
        end_date: None,
    };
    Ok(WorkActivityRepo::create(data.as_ref(), &input, structured).await?)
}

async fn patch_profile(
    data: Arc<dyn DataService>,
    id: Id,
    patch: UpdateProfile,
) -> AppResult<Profile> {
    let patch = UpdateProfile {
        full_name: non_blank(patch.full_name.as_deref()),
        department: non_blank(patch.department.as_deref()),
        employee_id: non_blank(patch.employee_id.as_deref()),
        phone: non_blank(patch.phone.as_deref()),
    };
    if patch.is_empty() {
        return Err(CoreError::Validation("Nothing to update".into()).into());
    }
    ProfileRepo::update(data.as_ref(), id, &patch)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "profile",
                id: id.to_string(),
            }
            .into()
        })
}

async fn insert_course(data: Arc<dyn DataService>, form: CourseForm) -> AppResult<Course> {
    form.validate()?;
    let input = CreateCourse {
        code: form.code.trim().to_string(),
        name: form.name.trim().to_string(),
        description: non_blank(form.description.as_deref()),
        faculty_id: form.faculty_id,
        credits: form.credits,
        semester: non_blank(form.semester.as_deref()),
        academic_year: non_blank(form.academic_year.as_deref()),
        status: form.status.unwrap_or(CourseStatus::Active),
    };
    Ok(CourseRepo::create(data.as_ref(), &input).await?)
}
