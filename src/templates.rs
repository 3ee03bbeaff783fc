use std::fmt::Write;

use crate::models::{ReportGenerationRequest, ReportType};

pub const NAME_PLACEHOLDER: &str = "{name}";
pub const STRENGTHS_HEADING: &str = "**Strengths Observed:**";

const PROGRESS: &[&str] = &[
    "{name} has demonstrated consistent growth throughout this reporting period. Their engagement in classroom activities has been commendable.

**Academic Performance:**
- Shows strong comprehension of core curriculum concepts
- Actively participates in group discussions and collaborative work
- Demonstrates improving organizational skills in managing assignments

**Social Development:**
- Works well with peers in group settings
- Shows respect for classroom rules and expectations
- Demonstrates empathy and kindness toward classmates

**Areas for Growth:**
- Continue building confidence in sharing ideas with the whole class
- Focus on showing all work in mathematical problem-solving

{name} is making excellent progress and we look forward to seeing continued growth.",
    "This quarter, {name} has shown remarkable dedication to their academic growth. Their commitment to learning is evident in their daily work.

**Strengths Observed:**
- Exceptional attention to detail in written assignments
- Strong problem-solving abilities across subjects
- Enthusiastic participation in hands-on learning activities

**Progress Highlights:**
- Reading fluency has improved significantly
- Mathematical reasoning skills continue to develop
- Science inquiry skills are emerging nicely

**Next Steps:**
- Continue challenging {name} with extension activities
- Support development in presenting ideas orally

We are proud of {name}'s accomplishments this quarter.",
];

const BEHAVIORAL: &[&str] = &[
    "{name} consistently demonstrates positive behaviors that contribute to a supportive classroom environment.

**Behavioral Strengths:**
- Follows classroom expectations independently
- Shows self-regulation skills during transitions
- Demonstrates respect for peers and adults
- Takes responsibility for personal belongings and workspace

**Social-Emotional Growth:**
- Building positive relationships with classmates
- Shows resilience when facing challenges
- Developing conflict resolution skills

**Recommendations:**
- Continue reinforcing positive choices
- Encourage leadership opportunities

{name} is a valued member of our classroom community.",
];

const ACADEMIC: &[&str] = &[
    "{name}'s academic performance this period reflects dedicated effort and growing mastery of grade-level standards.

**Reading & Language Arts:**
- Demonstrates grade-level reading comprehension
- Writing shows improving organization and detail
- Vocabulary usage continues to expand

**Mathematics:**
- Shows solid understanding of core concepts
- Problem-solving strategies are developing well
- Fact fluency continues to improve

**Science & Social Studies:**
- Engages enthusiastically with content
- Makes connections across subject areas
- Demonstrates curiosity through questioning

{name} is meeting academic expectations and shows potential for continued growth.",
];

const IEP: &[&str] = &[
    "Progress Report for {name}'s Individualized Education Program Goals:

**Goal 1: Reading Comprehension**
Current Progress: Making steady progress toward annual goal
- Demonstrates improved ability to identify main ideas
- Working on making inferences from text
- Support strategies are effective

**Goal 2: Written Expression**
Current Progress: Approaching benchmark
- Sentence structure has improved
- Working on paragraph organization
- Benefits from graphic organizers

**Goal 3: Social Skills**
Current Progress: Meeting expectations
- Improved peer interactions observed
- Self-advocacy skills developing
- Continues to benefit from social skills instruction

**Recommendations:**
- Continue current accommodations and modifications
- Schedule team meeting to discuss transition planning

{name} continues to make meaningful progress toward IEP goals.",
];

/// Template set for a category. Unknown categories use the progress set.
pub fn templates_for(report_type: &ReportType) -> &'static [&'static str] {
    match report_type {
        ReportType::Progress | ReportType::Other(_) => PROGRESS,
        ReportType::Behavioral => BEHAVIORAL,
        ReportType::Academic => ACADEMIC,
        ReportType::Iep => IEP,
    }
}

pub fn render_content(template: &str, first_name: &str, request: &ReportGenerationRequest) -> String {
    let mut content = template.replace(NAME_PLACEHOLDER, first_name);

    // Splice before notes are appended so only the template's own heading can match.
    if let Some(strengths) = request.strengths.as_deref().filter(|s| !s.is_empty()) {
        content = splice_strengths(&content, strengths);
    }

    if let Some(notes) = request.notes.as_deref().filter(|n| !n.is_empty()) {
        let _ = write!(content, "\n\n**Additional Notes:**\n{notes}");
    }

    content
}

fn splice_strengths(content: &str, strengths: &[String]) -> String {
    let mut block = String::from(STRENGTHS_HEADING);
    for strength in strengths {
        let _ = write!(block, "\n- {strength}");
    }
    content.replacen(STRENGTHS_HEADING, &block, 1)
}

pub fn compose_title(period: &str, report_type: &ReportType) -> String {
    format!("{} {} Report", period, capitalize(report_type.label()))
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StudentId;

    fn request(report_type: ReportType) -> ReportGenerationRequest {
        ReportGenerationRequest::new(StudentId::new("1"), report_type, "Q2")
    }

    #[test]
    fn every_placeholder_is_replaced() {
        for template in PROGRESS.iter().chain(BEHAVIORAL).chain(ACADEMIC).chain(IEP) {
            let content = render_content(template, "Emma", &request(ReportType::Progress));
            assert!(!content.contains(NAME_PLACEHOLDER));
            assert!(content.contains("Emma"));
        }
    }

    #[test]
    fn strengths_only_land_under_template_heading() {
        let mut req = request(ReportType::Progress);
        req.strengths = Some(vec!["Kind to classmates".to_string()]);

        let with_heading = render_content(PROGRESS[1], "Emma", &req);
        assert!(with_heading.contains("**Strengths Observed:**\n- Kind to classmates\n- Exceptional"));

        let without_heading = render_content(PROGRESS[0], "Emma", &req);
        let baseline = render_content(PROGRESS[0], "Emma", &request(ReportType::Progress));
        assert_eq!(without_heading, baseline);
    }

    #[test]
    fn strengths_never_splice_into_notes() {
        let mut req = request(ReportType::Behavioral);
        req.strengths = Some(vec!["Patient".to_string()]);
        req.notes = Some("**Strengths Observed:** see portfolio".to_string());

        let content = render_content(BEHAVIORAL[0], "Liam", &req);
        assert!(content.ends_with("**Additional Notes:**\n**Strengths Observed:** see portfolio"));
        assert!(!content.contains("- Patient"));
    }

    #[test]
    fn empty_notes_are_not_appended() {
        let mut req = request(ReportType::Academic);
        req.notes = Some(String::new());
        let content = render_content(ACADEMIC[0], "Ava", &req);
        assert!(!content.contains("Additional Notes"));
    }

    #[test]
    fn unknown_category_falls_back_to_progress() {
        let other = ReportType::Other("attendance".to_string());
        assert_eq!(templates_for(&other), PROGRESS);
        assert_eq!(compose_title("Fall 2024", &other), "Fall 2024 Attendance Report");
    }

    #[test]
    fn title_capitalizes_only_first_letter() {
        assert_eq!(compose_title("Q1", &ReportType::Iep), "Q1 Iep Report");
        assert_eq!(compose_title("Q3", &ReportType::Behavioral), "Q3 Behavioral Report");
    }
}
