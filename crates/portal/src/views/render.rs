//! Plain-text rendering of dashboard data for the terminal.

use std::fmt::Write as _;

use fms_core::activity;
use fms_db::models::class_record::ClassRecord;
use fms_db::models::class_session::ClassSession;
use fms_db::models::course::Course;
use fms_db::models::profile::Profile;
use fms_db::models::stats::AdminStats;
use fms_db::models::work_activity::WorkActivity;
use fms_db::models::work_detail::WorkDetail;
use fms_events::Toast;

use super::faculty::{AssignmentItem, NotificationItem};

const NOT_SET: &str = "Not Set";
const EMPTY: &str = "No records found.";

/// Column-aligned text table.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return format!("{EMPTY}\n");
        }

        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let width = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }

        let mut out = String::new();
        push_line(&mut out, &self.headers, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_line(&mut out, &rule, &widths);
        for row in &self.rows {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            format!("{cell:<w$}")
        })
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

fn or_not_set(value: Option<&str>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(NOT_SET)
        .to_string()
}

fn or_dash(value: Option<&str>) -> String {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("-").to_string()
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

pub fn faculty_table(profiles: &[Profile]) -> String {
    profiles
        .iter()
        .fold(
            Table::new(["Name", "Email", "Department", "Employee ID", "Status"]),
            |table, p| {
                table.row([
                    p.display_name().to_string(),
                    p.email.clone(),
                    or_not_set(p.department.as_deref()),
                    or_not_set(p.employee_id.as_deref()),
                    "Active".to_string(),
                ])
            },
        )
        .render()
}

pub fn class_sessions_table(sessions: &[ClassSession]) -> String {
    sessions
        .iter()
        .fold(
            Table::new(["Faculty", "Course", "Date", "Time", "Topic"]),
            |table, s| {
                let faculty = s
                    .faculty
                    .as_ref()
                    .map(|f| f.full_name.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                let course = s
                    .course
                    .as_ref()
                    .map(|c| {
                        if c.name.trim().is_empty() {
                            c.code.clone()
                        } else {
                            c.name.clone()
                        }
                    })
                    .unwrap_or_else(|| "Unknown".to_string());
                table.row([
                    faculty,
                    course,
                    s.session_date.to_string(),
                    s.start_time.format("%H:%M").to_string(),
                    or_dash(s.topic.as_deref()),
                ])
            },
        )
        .render()
}

pub fn courses_table(courses: &[Course]) -> String {
    courses
        .iter()
        .fold(
            Table::new(["Code", "Name", "Credits", "Semester", "Status"]),
            |table, c| {
                table.row([
                    c.code.clone(),
                    c.name.clone(),
                    c.credits.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
                    or_dash(c.semester.as_deref()),
                    c.status.map(|s| s.as_str().to_string()).unwrap_or_else(|| "-".into()),
                ])
            },
        )
        .render()
}

pub fn stats_block(stats: &AdminStats) -> String {
    format!(
        "Total Faculty:   {}\nTotal Courses:   {}\nTotal Sessions:  {}\n",
        stats.total_faculty, stats.total_courses, stats.total_sessions
    )
}

// ---------------------------------------------------------------------------
// Faculty
// ---------------------------------------------------------------------------

pub fn assignments_table(items: &[AssignmentItem]) -> String {
    items
        .iter()
        .fold(
            Table::new(["Subject", "Branch", "Semester", "Time Slot", "Students"]),
            |table, item| {
                let a = &item.assignment;
                table.row([
                    a.subject.clone(),
                    a.branch.clone(),
                    a.semester.clone(),
                    a.time_slot.clone(),
                    a.student_count_display(),
                ])
            },
        )
        .render()
}

pub fn notifications_list(items: &[NotificationItem]) -> String {
    if items.is_empty() {
        return format!("{EMPTY}\n");
    }
    let mut out = String::new();
    for item in items {
        let when = item
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let _ = writeln!(out, "* {} {}", item.notification.title, when);
        let _ = writeln!(out, "  {}", item.notification.message);
    }
    out
}

pub fn work_activities_table(rows: &[WorkActivity]) -> String {
    rows.iter()
        .fold(
            Table::new(["Title", "Type", "Hours", "Start", "End"]),
            |table, row| {
                table.row([
                    row.title.clone(),
                    activity::type_label(&row.activity_type).to_string(),
                    row.hours_spent.map(|h| format!("{h:.1}")).unwrap_or_else(|| "-".into()),
                    row.start_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                    row.end_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                ])
            },
        )
        .render()
}

pub fn class_records_table(rows: &[ClassRecord]) -> String {
    rows.iter()
        .fold(
            Table::new(["Date", "Topic", "Present", "Absent", "Total", "Attendance", "Document"]),
            |table, r| {
                table.row([
                    r.session_date.to_string(),
                    r.topic_covered.clone(),
                    r.students_present.to_string(),
                    r.students_absent.to_string(),
                    r.total_students.to_string(),
                    r.attendance_percentage()
                        .map(|p| format!("{p:.1}%"))
                        .unwrap_or_else(|| "-".into()),
                    if r.document_url.is_some() { "yes" } else { "no" }.to_string(),
                ])
            },
        )
        .render()
}

pub fn work_details_table(rows: &[WorkDetail]) -> String {
    rows.iter()
        .fold(
            Table::new(["Date", "Work Type", "Duration", "Slot", "Description"]),
            |table, d| {
                table.row([
                    d.session_date.to_string(),
                    d.work_type.clone(),
                    d.duration.clone(),
                    d.slot_type.map(|s| s.as_str().to_string()).unwrap_or_else(|| "-".into()),
                    d.description.clone(),
                ])
            },
        )
        .render()
}

pub fn toasts(toasts: &[Toast]) -> String {
    let mut out = String::new();
    for toast in toasts {
        let marker = if toast.is_destructive() { "!" } else { "-" };
        let _ = writeln!(out, "{marker} {}: {}", toast.title, toast.description);
    }
    out
}
