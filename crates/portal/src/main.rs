use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use fms_core::roles::Role;
use fms_core::schedule::{CourseStatus, SlotType};
use fms_core::types::{Date, Id};
use fms_db::models::profile::UpdateProfile;
use fms_portal::upload::DocumentUpload;
use fms_portal::views::admin::{AdminDashboard, AssignmentForm, CourseForm, NotificationForm};
use fms_portal::views::auth::{AuthView, SignInForm, SignUpForm};
use fms_portal::views::faculty::{
    today, ClassRecordForm, FacultyDashboard, FacultySection, WorkActivityForm, WorkDetailForm,
};
use fms_portal::views::render;
use fms_portal::views::router::{navigate, Route, RouteDecision, View};
use fms_portal::{AppContext, AppError, Backend, PortalConfig};
use fms_remote::{HttpBackend, MemoryBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "fms-portal", about = "Faculty management portal")]
struct Cli {
    /// Account email.
    #[arg(long, env = "FMS_EMAIL", global = true)]
    email: Option<String>,

    #[arg(long, env = "FMS_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Use an in-process backend seeded with demo accounts.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new account.
    SignUp {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        role: Option<Role>,
    },
    /// Show the dashboard for the signed-in role.
    Dashboard {
        /// Keep polling until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// Record a taught class with attendance.
    ClassRecord {
        #[arg(long)]
        date: Option<Date>,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        present: i32,
        #[arg(long)]
        absent: i32,
        #[arg(long)]
        total: i32,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        remarks: Option<String>,
        #[arg(long)]
        document: Option<PathBuf>,
    },
    /// Record a block of non-teaching work.
    WorkDetail {
        #[arg(long)]
        date: Option<Date>,
        #[arg(long)]
        work_type: String,
        #[arg(long)]
        duration: String,
        #[arg(long, default_value = "morning")]
        slot: SlotType,
        #[arg(long)]
        description: String,
        #[arg(long)]
        remarks: Option<String>,
        #[arg(long)]
        document: Option<PathBuf>,
    },
    /// Log a completed work activity.
    Activity {
        #[arg(long)]
        title: String,
        #[arg(long = "type", default_value = "teaching")]
        activity_type: String,
        #[arg(long)]
        hours: Option<f64>,
        #[arg(long)]
        start: Option<Date>,
        #[arg(long)]
        end: Option<Date>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Assign a class to a faculty member (admin).
    Assign {
        #[arg(long)]
        faculty: Id,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        branch: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        time_slot: String,
        #[arg(long)]
        students: Option<u32>,
    },
    /// Send a notification to a faculty member (admin).
    Notify {
        #[arg(long)]
        faculty: Id,
        #[arg(long)]
        title: String,
        #[arg(long)]
        message: String,
    },
    /// Edit a faculty profile (admin).
    UpdateFaculty {
        #[arg(long)]
        faculty: Id,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        employee_id: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// List courses (admin).
    Courses,
    /// Create a course (admin).
    AddCourse {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        faculty: Option<Id>,
        #[arg(long)]
        credits: Option<i32>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        academic_year: Option<String>,
        #[arg(long)]
        status: Option<CourseStatus>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fms_portal=info,fms_remote=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let (config, backend) = if cli.offline {
        let memory = Arc::new(MemoryBackend::new());
        seed_demo_accounts(&memory);
        tracing::info!("Using the in-process backend");
        (PortalConfig::new("memory://fms", "offline"), Backend::shared(memory))
    } else {
        let config = PortalConfig::from_env().context("Failed to load portal configuration")?;
        let http = HttpBackend::new(config.remote_config())
            .context("Failed to build the remote client")?;
        (config, Backend::shared(Arc::new(http)))
    };

    let ctx = AppContext::init(config, backend);
    let result = run(&ctx, &cli).await;

    if tokio::time::timeout(TEARDOWN_TIMEOUT, ctx.teardown()).await.is_err() {
        tracing::warn!("Teardown timed out");
    }
    result
}

async fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    ctx.session.ready().await;

    if let Command::SignUp { full_name, role } = &cli.command {
        let (email, password) = credentials(cli)?;
        let mut view = AuthView::new(Arc::clone(&ctx.session));
        let form = SignUpForm {
            email,
            password,
            full_name: full_name.clone(),
            role: *role,
        };
        if view.sign_up(&form).await.is_none() {
            bail!(view.error.unwrap_or_else(|| "Registration failed".into()));
        }
        if let Some(notice) = view.notice {
            println!("{notice}");
        }
        return Ok(());
    }

    sign_in(ctx, cli).await?;

    match &cli.command {
        Command::SignUp { .. } => {}
        Command::Dashboard { watch } => dashboard(ctx, *watch).await?,
        Command::ClassRecord {
            date,
            topic,
            present,
            absent,
            total,
            description,
            remarks,
            document,
        } => {
            let document = load_document(document.as_deref()).await?;
            let dashboard = FacultyDashboard::mount(ctx)?;
            let form = ClassRecordForm {
                session_date: date.unwrap_or_else(today),
                topic_covered: topic.clone(),
                students_present: *present,
                students_absent: *absent,
                total_students: *total,
                description: description.clone(),
                remarks: remarks.clone(),
                document,
            };
            let record = dashboard
                .submit_class_record_then(form, |r| {
                    if r.document_url.is_none() && document_requested(cli) {
                        println!("Document could not be uploaded; record saved without it.");
                    }
                })
                .await
                .map_err(user_error)?;
            println!("Class record {} saved", record.id);
        }
        Command::WorkDetail {
            date,
            work_type,
            duration,
            slot,
            description,
            remarks,
            document,
        } => {
            let document = load_document(document.as_deref()).await?;
            let dashboard = FacultyDashboard::mount(ctx)?;
            let form = WorkDetailForm {
                session_date: date.unwrap_or_else(today),
                work_type: work_type.clone(),
                duration: duration.clone(),
                slot_type: *slot,
                description: description.clone(),
                remarks: remarks.clone(),
                document,
            };
            let detail = dashboard.submit_work_detail(form).await.map_err(user_error)?;
            println!("Work detail {} saved", detail.id);
        }
        Command::Activity {
            title,
            activity_type,
            hours,
            start,
            end,
            description,
        } => {
            let dashboard = FacultyDashboard::mount(ctx)?;
            let form = WorkActivityForm {
                title: title.clone(),
                description: description.clone(),
                activity_type: activity_type.clone(),
                hours_spent: *hours,
                start_date: *start,
                end_date: *end,
            };
            let activity = dashboard.log_work_activity(form).await.map_err(user_error)?;
            println!("Work activity {} saved", activity.id);
        }
        Command::Assign {
            faculty,
            subject,
            branch,
            semester,
            time_slot,
            students,
        } => {
            let admin = AdminDashboard::mount(ctx).await.map_err(user_error)?;
            let form = AssignmentForm {
                faculty_id: *faculty,
                subject: subject.clone(),
                branch: branch.clone(),
                semester: semester.clone(),
                time_slot: time_slot.clone(),
                student_count: *students,
            };
            let row = admin.assign(form).await.map_err(user_error)?;
            println!("Assignment {} created", row.id);
        }
        Command::Notify {
            faculty,
            title,
            message,
        } => {
            let admin = AdminDashboard::mount(ctx).await.map_err(user_error)?;
            let form = NotificationForm {
                faculty_id: *faculty,
                title: title.clone(),
                message: message.clone(),
            };
            let row = admin.notify(form).await.map_err(user_error)?;
            println!("Notification {} sent", row.id);
        }
        Command::UpdateFaculty {
            faculty,
            full_name,
            department,
            employee_id,
            phone,
        } => {
            let admin = AdminDashboard::mount(ctx).await.map_err(user_error)?;
            let patch = UpdateProfile {
                full_name: full_name.clone(),
                department: department.clone(),
                employee_id: employee_id.clone(),
                phone: phone.clone(),
            };
            let profile = admin
                .update_faculty(*faculty, patch)
                .await
                .map_err(user_error)?;
            println!("Profile of {} updated", profile.display_name());
        }
        Command::Courses => {
            let mut admin = AdminDashboard::mount(ctx).await.map_err(user_error)?;
            let state = admin.courses.wait_until(|s| s.fetch_count > 0).await;
            if let Some(error) = state.error {
                bail!(error.user_message());
            }
            print!("{}", render::courses_table(&state.data.unwrap_or_default()));
        }
        Command::AddCourse {
            code,
            name,
            description,
            faculty,
            credits,
            semester,
            academic_year,
            status,
        } => {
            let admin = AdminDashboard::mount(ctx).await.map_err(user_error)?;
            let form = CourseForm {
                code: code.clone(),
                name: name.clone(),
                description: description.clone(),
                faculty_id: *faculty,
                credits: *credits,
                semester: semester.clone(),
                academic_year: academic_year.clone(),
                status: *status,
            };
            let course = admin.add_course(form).await.map_err(user_error)?;
            println!("Course {} created", course.code);
        }
    }

    print!("{}", render::toasts(&ctx.toasts.drain()));
    Ok(())
}

async fn dashboard(ctx: &AppContext, watch: bool) -> anyhow::Result<()> {
    match navigate(ctx, Route::Dashboard).await? {
        RouteDecision::Render(View::AdminDashboard) => {
            let mut admin = AdminDashboard::mount(ctx).await.map_err(user_error)?;
            loop {
                admin.stats.wait_until(|s| s.fetch_count > 0).await;
                admin.faculty.wait_until(|s| s.fetch_count > 0).await;
                admin.class_sessions.wait_until(|s| s.fetch_count > 0).await;
                print_admin(&admin);
                if !watch || !wait_or_shutdown(admin.refreshed()).await {
                    break;
                }
            }
        }
        RouteDecision::Render(View::FacultyDashboard) => {
            let mut faculty = FacultyDashboard::mount(ctx)?;
            loop {
                faculty.assignments.wait_until(|s| s.fetch_count > 0).await;
                faculty.notifications.wait_until(|s| s.fetch_count > 0).await;
                faculty.work_activities.wait_until(|s| s.fetch_count > 0).await;
                faculty.class_records.wait_until(|s| s.fetch_count > 0).await;
                faculty.work_details.wait_until(|s| s.fetch_count > 0).await;
                print_faculty(&faculty);
                if !watch || !wait_or_shutdown(faculty.refreshed()).await {
                    break;
                }
            }
        }
        decision => bail!("Unexpected route decision: {decision:?}"),
    }
    Ok(())
}

fn print_admin(admin: &AdminDashboard) {
    println!("Admin Dashboard: {}\n", admin.admin().display_name());
    if let Some(stats) = admin.stats.data() {
        print!("{}", render::stats_block(&stats));
    }
    println!("\nFaculty Members");
    print!("{}", render::faculty_table(&admin.faculty.data().unwrap_or_default()));
    println!("\nRecent Class Sessions");
    print!(
        "{}",
        render::class_sessions_table(&admin.class_sessions.data().unwrap_or_default())
    );
    if let Some(error) = admin.faculty.error() {
        println!("\n(faculty list is stale: {})", error.user_message());
    }
}

fn print_faculty(faculty: &FacultyDashboard) {
    let sections: Vec<String> = FacultySection::ALL
        .iter()
        .map(|s| match faculty.badge(*s) {
            Some(n) => format!("{} ({n})", s.label()),
            None => s.label().to_string(),
        })
        .collect();
    println!("{}\n", sections.join(" | "));

    println!("My Assignments");
    print!("{}", render::assignments_table(&faculty.decoded_assignments()));
    println!("\nNotifications");
    print!("{}", render::notifications_list(&faculty.decoded_notifications()));
    println!("\nWork Activities");
    print!(
        "{}",
        render::work_activities_table(&faculty.work_activities.data().unwrap_or_default())
    );
    println!("\nClass Records");
    print!(
        "{}",
        render::class_records_table(&faculty.class_records.data().unwrap_or_default())
    );
    println!("\nWork Details");
    print!(
        "{}",
        render::work_details_table(&faculty.work_details.data().unwrap_or_default())
    );
    println!("\nAttendance\nComing soon.");
}

/// Wait for `next`; `false` once a shutdown signal arrives.
async fn wait_or_shutdown<F: std::future::Future>(next: F) -> bool {
    tokio::select! {
        _ = next => true,
        () = shutdown_signal() => false,
    }
}

async fn sign_in(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    let (email, password) = credentials(cli)?;
    let mut view = AuthView::new(Arc::clone(&ctx.session));
    let form = SignInForm { email, password };
    match view.sign_in(&form).await {
        Some(user) => {
            tracing::info!(user_id = %user.id, "Signed in");
            Ok(())
        }
        None => bail!(view.error.unwrap_or_else(|| "Sign-in failed".into())),
    }
}

fn credentials(cli: &Cli) -> anyhow::Result<(String, String)> {
    match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => Ok((email.clone(), password.clone())),
        _ => bail!("--email and --password (or FMS_EMAIL and FMS_PASSWORD) are required"),
    }
}

fn document_requested(cli: &Cli) -> bool {
    matches!(
        &cli.command,
        Command::ClassRecord {
            document: Some(_),
            ..
        }
    )
}

async fn load_document(path: Option<&std::path::Path>) -> anyhow::Result<Option<DocumentUpload>> {
    match path {
        Some(path) => {
            let upload = DocumentUpload::from_path(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Some(upload))
        }
        None => Ok(None),
    }
}

fn user_error(err: AppError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}

fn seed_demo_accounts(memory: &MemoryBackend) {
    memory.register_user("admin@fms.local", "admin123", "Portal Admin", Role::Admin, true);
    memory.register_user("faculty@fms.local", "faculty123", "Demo Faculty", Role::Faculty, true);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
