use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{Report, ReportStatus, StatusCounts, Student};
use crate::store::ReportStore;

/// Renders the dashboard view of a store as markdown.
pub fn build_dashboard(store: &ReportStore, generated_at: DateTime<Utc>) -> String {
    render(
        &store.students(),
        &store.recent_reports(),
        store.reports_by_status(),
        generated_at,
    )
}

fn render(
    students: &[Student],
    recent: &[Report],
    counts: StatusCounts,
    generated_at: DateTime<Utc>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# SageReport Dashboard");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Reports by Status");
    for status in ReportStatus::ALL {
        let _ = writeln!(output, "- {}: {}", status, counts.get(status));
    }
    let _ = writeln!(output, "- total: {}", counts.total());

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Reports");
    if recent.is_empty() {
        let _ = writeln!(output, "No reports yet.");
    } else {
        for report in recent {
            let _ = writeln!(
                output,
                "- [{}] {} for {} ({}, updated {})",
                report.id,
                report.title,
                report.student_name,
                report.status,
                report.updated_at.format("%Y-%m-%d")
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");
    if students.is_empty() {
        let _ = writeln!(output, "No students enrolled.");
    } else {
        for student in students {
            let _ = writeln!(
                output,
                "- {} ({}){}",
                student.name,
                student.grade,
                student
                    .email
                    .as_deref()
                    .map(|email| format!(" <{email}>"))
                    .unwrap_or_default()
            );
        }
    }

    output
}
