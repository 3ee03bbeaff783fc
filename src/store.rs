use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{
    NewStudent, Report, ReportGenerationRequest, ReportId, ReportStatus, ReportUpdate,
    StatusCounts, Student, StudentId,
};
use crate::strategy::{LatencySimulator, RandomChooser, RandomLatency, TemplateChooser};
use crate::templates;

pub const RECENT_REPORT_LIMIT: usize = 5;

pub struct ReportStore {
    state: RwLock<Collections>,
    pending: AtomicUsize,
    chooser: Box<dyn TemplateChooser>,
    latency: Box<dyn LatencySimulator>,
}

struct Collections {
    students: Vec<Student>,
    reports: Vec<Report>,
    next_student: u64,
    next_report: u64,
}

impl Collections {
    fn student_id(&mut self) -> StudentId {
        let id = StudentId::new(self.next_student.to_string());
        self.next_student += 1;
        id
    }

    fn report_id(&mut self) -> ReportId {
        let id = ReportId::new(self.next_report.to_string());
        self.next_report += 1;
        id
    }
}

/// First counter value above every numeric id already present.
fn next_sequence<'a>(ids: impl Iterator<Item = &'a str>) -> u64 {
    ids.filter_map(|id| id.parse::<u64>().ok())
        .max()
        .map_or(1, |max| max + 1)
}

impl std::fmt::Debug for ReportStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ReportStore")
            .field("students", &state.students.len())
            .field("reports", &state.reports.len())
            .field("generating", &self.is_generating())
            .finish()
    }
}

impl Default for ReportStore {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl ReportStore {
    pub fn new(students: Vec<Student>, reports: Vec<Report>) -> Self {
        let next_student = next_sequence(students.iter().map(|s| s.id.as_str()));
        let next_report = next_sequence(reports.iter().map(|r| r.id.as_str()));
        Self {
            state: RwLock::new(Collections {
                students,
                reports,
                next_student,
                next_report,
            }),
            pending: AtomicUsize::new(0),
            chooser: Box::new(RandomChooser),
            latency: Box::new(RandomLatency::default()),
        }
    }

    pub fn with_chooser(mut self, chooser: impl TemplateChooser + 'static) -> Self {
        self.chooser = Box::new(chooser);
        self
    }

    pub fn with_latency(mut self, latency: impl LatencySimulator + 'static) -> Self {
        self.latency = Box::new(latency);
        self
    }

    pub fn students(&self) -> Vec<Student> {
        self.state.read().students.clone()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.state.read().reports.clone()
    }

    pub fn get_student(&self, id: &StudentId) -> Option<Student> {
        let found = self
            .state
            .read()
            .students
            .iter()
            .find(|s| &s.id == id)
            .cloned();
        debug!(student_id = %id, found = found.is_some(), "student lookup");
        found
    }

    pub fn get_report(&self, id: &ReportId) -> Option<Report> {
        let found = self
            .state
            .read()
            .reports
            .iter()
            .find(|r| &r.id == id)
            .cloned();
        debug!(report_id = %id, found = found.is_some(), "report lookup");
        found
    }

    /// True while at least one `generate_report` call is pending.
    pub fn is_generating(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0
    }

    /// Up to five reports, most recently updated first.
    pub fn recent_reports(&self) -> Vec<Report> {
        let mut reports = self.reports();
        reports.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        reports.truncate(RECENT_REPORT_LIMIT);
        reports
    }

    pub fn reports_by_status(&self) -> StatusCounts {
        StatusCounts::tally(self.state.read().reports.iter())
    }

    pub fn reports_with_status(&self, status: ReportStatus) -> Vec<Report> {
        self.state
            .read()
            .reports
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    /// Produces a report from a category template and appends it.
    ///
    /// The student is resolved after the simulated latency; an unknown
    /// student fails with [`StoreError::StudentNotFound`] and appends nothing.
    pub async fn generate_report(
        &self,
        request: ReportGenerationRequest,
    ) -> Result<Report, StoreError> {
        let _pending = PendingGuard::raise(&self.pending);

        let delay = self.latency.delay();
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "simulating generation latency");
            tokio::time::sleep(delay).await;
        }

        let student = match self.get_student(&request.student_id) {
            Some(student) => student,
            None => {
                warn!(student_id = %request.student_id, "report requested for unknown student");
                return Err(StoreError::StudentNotFound(request.student_id));
            }
        };

        if !request.report_type.is_known() {
            warn!(
                category = request.report_type.label(),
                "unrecognised report category, using progress templates"
            );
        }

        let set = templates::templates_for(&request.report_type);
        let template = set
            .get(self.chooser.choose(set.len()))
            .copied()
            .unwrap_or_else(|| set[0]);
        let content = templates::render_content(template, student.first_name(), &request);
        let title = templates::compose_title(&request.period, &request.report_type);

        let now = Utc::now();
        let report = {
            let mut state = self.state.write();
            let report = Report {
                id: state.report_id(),
                student_id: student.id.clone(),
                student_name: student.name.clone(),
                title,
                content,
                status: ReportStatus::Generated,
                created_at: now,
                updated_at: now,
            };
            state.reports.push(report.clone());
            report
        };

        info!(
            report_id = %report.id,
            student_id = %report.student_id,
            category = request.report_type.label(),
            "report generated"
        );
        Ok(report)
    }

    /// Merges `update` into the report and refreshes `updated_at`.
    /// Returns `None`, touching nothing, when the id is unknown.
    pub fn update_report(&self, id: &ReportId, update: ReportUpdate) -> Option<Report> {
        let mut state = self.state.write();
        let Some(report) = state.reports.iter_mut().find(|r| &r.id == id) else {
            debug!(report_id = %id, "update skipped, report not found");
            return None;
        };
        update.apply(report);
        report.updated_at = Utc::now();
        debug!(report_id = %id, status = %report.status, "report updated");
        Some(report.clone())
    }

    pub fn delete_report(&self, id: &ReportId) -> bool {
        let mut state = self.state.write();
        let before = state.reports.len();
        state.reports.retain(|r| &r.id != id);
        let removed = state.reports.len() != before;
        debug!(report_id = %id, removed, "report delete");
        removed
    }

    pub fn add_student(&self, student: NewStudent) -> Student {
        let mut state = self.state.write();
        let student = Student {
            id: state.student_id(),
            name: student.name,
            grade: student.grade,
            email: student.email.filter(|e| !e.is_empty()),
            created_at: Utc::now(),
        };
        state.students.push(student.clone());
        info!(student_id = %student.id, grade = %student.grade, "student added");
        student
    }
}

/// Keeps the pending counter raised for as long as it lives.
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn raise(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
