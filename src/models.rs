use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReportId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub grade: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// Substring of the display name before the first space.
    pub fn first_name(&self) -> &str {
        self.name.split(' ').next().unwrap_or_default()
    }
}

/// Fields a caller supplies when enrolling a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub grade: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Draft,
    Generated,
    Reviewed,
    Sent,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Draft,
        ReportStatus::Generated,
        ReportStatus::Reviewed,
        ReportStatus::Sent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Draft => "draft",
            ReportStatus::Generated => "generated",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Sent => "sent",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ReportStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown report status: {value}"))
    }
}

/// Report category. Unrecognised labels are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportType {
    Progress,
    Behavioral,
    Academic,
    Iep,
    Other(String),
}

impl ReportType {
    pub fn parse(label: &str) -> Self {
        match label {
            "progress" => ReportType::Progress,
            "behavioral" => ReportType::Behavioral,
            "academic" => ReportType::Academic,
            "iep" => ReportType::Iep,
            other => ReportType::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ReportType::Progress => "progress",
            ReportType::Behavioral => "behavioral",
            ReportType::Academic => "academic",
            ReportType::Iep => "iep",
            ReportType::Other(label) => label,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ReportType::Other(_))
    }
}

impl From<String> for ReportType {
    fn from(value: String) -> Self {
        ReportType::parse(&value)
    }
}

impl From<ReportType> for String {
    fn from(value: ReportType) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: ReportId,
    pub student_id: StudentId,
    /// Snapshot of the student's name when the report was created; never refreshed.
    pub student_name: String,
    pub title: String,
    pub content: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportGenerationRequest {
    pub student_id: StudentId,
    pub report_type: ReportType,
    pub period: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub strengths: Option<Vec<String>>,
    /// Accepted but not used when rendering.
    #[serde(default)]
    pub areas_for_growth: Option<Vec<String>>,
}

impl ReportGenerationRequest {
    pub fn new(student_id: StudentId, report_type: ReportType, period: impl Into<String>) -> Self {
        Self {
            student_id,
            report_type,
            period: period.into(),
            notes: None,
            strengths: None,
            areas_for_growth: None,
        }
    }
}

/// Partial edit applied by `ReportStore::update_report`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<ReportStatus>,
    #[serde(default)]
    pub student_name: Option<String>,
}

impl ReportUpdate {
    pub fn status(status: ReportStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.status.is_none()
            && self.student_name.is_none()
    }

    pub(crate) fn apply(self, report: &mut Report) {
        if let Some(title) = self.title {
            report.title = title;
        }
        if let Some(content) = self.content {
            report.content = content;
        }
        if let Some(status) = self.status {
            report.status = status;
        }
        if let Some(student_name) = self.student_name {
            report.student_name = student_name;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub draft: usize,
    pub generated: usize,
    pub reviewed: usize,
    pub sent: usize,
}

impl StatusCounts {
    pub fn tally<'a>(reports: impl IntoIterator<Item = &'a Report>) -> Self {
        let mut counts = StatusCounts::default();
        for report in reports {
            *counts.slot(report.status) += 1;
        }
        counts
    }

    pub fn get(&self, status: ReportStatus) -> usize {
        match status {
            ReportStatus::Draft => self.draft,
            ReportStatus::Generated => self.generated,
            ReportStatus::Reviewed => self.reviewed,
            ReportStatus::Sent => self.sent,
        }
    }

    pub fn total(&self) -> usize {
        self.draft + self.generated + self.reviewed + self.sent
    }

    fn slot(&mut self, status: ReportStatus) -> &mut usize {
        match status {
            ReportStatus::Draft => &mut self.draft,
            ReportStatus::Generated => &mut self.generated,
            ReportStatus::Reviewed => &mut self.reviewed,
            ReportStatus::Sent => &mut self.sent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_type_parse_keeps_unknown_labels() {
        assert_eq!(ReportType::parse("iep"), ReportType::Iep);
        let other = ReportType::parse("attendance");
        assert_eq!(other, ReportType::Other("attendance".to_string()));
        assert_eq!(other.label(), "attendance");
        assert!(!other.is_known());
    }

    #[test]
    fn report_status_parses_case_insensitively() {
        assert_eq!("Reviewed".parse::<ReportStatus>(), Ok(ReportStatus::Reviewed));
        assert!("archived".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn report_serializes_with_camel_case_and_lowercase_status() {
        let now = Utc::now();
        let report = Report {
            id: ReportId::new("7"),
            student_id: StudentId::new("1"),
            student_name: "Emma Johnson".to_string(),
            title: "Q1 Progress Report".to_string(),
            content: String::new(),
            status: ReportStatus::Generated,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["studentId"], "1");
        assert_eq!(value["status"], "generated");
    }

    #[test]
    fn first_name_stops_at_first_space() {
        let student = Student {
            id: StudentId::new("1"),
            name: "Mary Ann Lee".to_string(),
            grade: "5th Grade".to_string(),
            email: None,
            created_at: Utc::now(),
        };
        assert_eq!(student.first_name(), "Mary");
    }
}
