use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::error::ImportError;
use crate::models::{NewStudent, Report, ReportId, ReportStatus, Student, StudentId};
use crate::store::ReportStore;

fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

pub fn demo_students() -> Vec<Student> {
    let roster = [
        ("1", "Emma Johnson", "5th Grade", "emma.j@school.edu", 15),
        ("2", "Liam Williams", "5th Grade", "liam.w@school.edu", 15),
        ("3", "Olivia Brown", "4th Grade", "olivia.b@school.edu", 16),
        ("4", "Noah Davis", "5th Grade", "noah.d@school.edu", 16),
        ("5", "Ava Martinez", "4th Grade", "ava.m@school.edu", 17),
    ];

    roster
        .into_iter()
        .map(|(id, name, grade, email, created)| Student {
            id: StudentId::new(id),
            name: name.to_string(),
            grade: grade.to_string(),
            email: Some(email.to_string()),
            created_at: day(2024, 1, created),
        })
        .collect()
}

pub fn demo_reports() -> Vec<Report> {
    vec![
        Report {
            id: ReportId::new("1"),
            student_id: StudentId::new("1"),
            student_name: "Emma Johnson".to_string(),
            title: "Q1 Progress Report".to_string(),
            content: "Emma has demonstrated exceptional growth this quarter. Her reading comprehension has improved significantly, moving from a 3rd grade level to solidly within 5th grade expectations.

**Academic Highlights:**
- Consistently completes homework assignments on time
- Shows strong analytical thinking in math problem-solving
- Actively participates in class discussions

**Areas for Continued Growth:**
- Working on organizing written responses
- Building confidence in presenting to larger groups

Emma is a pleasure to have in class and continues to be a positive influence on her peers."
                .to_string(),
            status: ReportStatus::Sent,
            created_at: day(2024, 1, 20),
            updated_at: day(2024, 1, 22),
        },
        Report {
            id: ReportId::new("2"),
            student_id: StudentId::new("2"),
            student_name: "Liam Williams".to_string(),
            title: "Q1 Progress Report".to_string(),
            content: "Liam has shown remarkable improvement in his academic performance this quarter.

**Academic Highlights:**
- Strong aptitude for mathematical concepts
- Excellent collaborative skills in group projects
- Creative approach to problem-solving

**Areas for Continued Growth:**
- Focusing on attention to detail in written work
- Time management during independent work periods"
                .to_string(),
            status: ReportStatus::Reviewed,
            created_at: day(2024, 1, 21),
            updated_at: day(2024, 1, 21),
        },
        Report {
            id: ReportId::new("3"),
            student_id: StudentId::new("3"),
            student_name: "Olivia Brown".to_string(),
            title: "Behavioral Assessment".to_string(),
            content: "Olivia continues to be a model student in terms of classroom behavior and engagement."
                .to_string(),
            status: ReportStatus::Draft,
            created_at: day(2024, 1, 25),
            updated_at: day(2024, 1, 25),
        },
    ]
}

/// Store pre-loaded with the demo roster and reports.
pub fn demo_store() -> ReportStore {
    ReportStore::new(demo_students(), demo_reports())
}

/// Adds every row of a `name,grade,email` CSV file to the store.
pub fn import_students(store: &ReportStore, csv_path: &Path) -> Result<Vec<Student>, ImportError> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        grade: String,
        #[serde(default)]
        email: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut rows = Vec::new();

    // Validate the whole file before touching the store.
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        if row.name.trim().is_empty() {
            return Err(ImportError::MissingName { row: index + 1 });
        }
        rows.push(row);
    }

    let added: Vec<Student> = rows
        .into_iter()
        .map(|row| {
            store.add_student(NewStudent {
                name: row.name.trim().to_string(),
                grade: row.grade.trim().to_string(),
                email: row.email.map(|e| e.trim().to_string()),
            })
        })
        .collect();

    info!(count = added.len(), path = %csv_path.display(), "students imported");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn demo_data_is_consistent() {
        let store = demo_store();
        assert_eq!(store.students().len(), 5);
        assert_eq!(store.reports().len(), 3);
        for report in store.reports() {
            let student = store.get_student(&report.student_id).unwrap();
            assert_eq!(student.name, report.student_name);
        }
        assert_eq!(store.recent_reports()[0].id, ReportId::new("3"));
    }

    #[test]
    fn import_adds_rows_with_fresh_ids() {
        let store = demo_store();
        let file = csv_file("name,grade,email\nMia Chen,4th Grade,mia.c@school.edu\nLucas Reed,5th Grade,\n");

        let added = import_students(&store, file.path()).unwrap();

        assert_eq!(added.len(), 2);
        assert_eq!(added[0].id, StudentId::new("6"));
        assert_eq!(added[0].email.as_deref(), Some("mia.c@school.edu"));
        assert_eq!(added[1].id, StudentId::new("7"));
        assert_eq!(added[1].email, None);
        assert_eq!(store.students().len(), 7);
    }

    #[test]
    fn import_rejects_blank_names_without_partial_writes() {
        let store = demo_store();
        let file = csv_file("name,grade,email\nMia Chen,4th Grade,\n ,5th Grade,\n");

        let err = import_students(&store, file.path()).unwrap_err();

        assert!(matches!(err, ImportError::MissingName { row: 2 }));
        assert_eq!(store.students().len(), 5);
    }
}
