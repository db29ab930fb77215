pub mod curricula;
pub mod institute;
pub mod language;
pub mod lecturers;
pub mod text;

use super::normalize::CanonicalKey;
use super::Anomaly;

pub use curricula::CurriculumEntry;

/// Typed value produced by a field extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Names(Vec<String>),
    Entries(Vec<CurriculumEntry>),
    /// Recognized header whose extraction is intentionally not implemented.
    Empty,
    /// Substituted when an extractor could not parse its body.
    Unparsed,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Extractor signature: section body in, typed value out, anomalies into
/// the shared sink.
pub type Extractor = fn(&str, &mut Vec<Anomaly>) -> FieldValue;

/// The dispatch table: every canonical key has exactly one bound extractor.
pub fn bound(key: CanonicalKey) -> Extractor {
    use CanonicalKey::*;
    match key {
        Properties | LearningOutcomes | AdditionalInformation | SubjectOfCourse
        | TeachingMethods | ModeOfExamination | ExaminationModalities | CourseRegistration
        | Literature | PreviousKnowledge | PrecedingCourses => text::extract,
        Lecturers => lecturers::extract,
        Language => language::extract,
        Institute => institute::extract,
        Curricula => curricula::extract,
        GroupDates | Exams | GroupRegistration | CourseDates => deferred,
    }
}

/// Valid headers whose content is not extracted yet. Recognizing them
/// without a value keeps them out of the unknown-header diagnostics.
fn deferred(_body: &str, _diags: &mut Vec<Anomaly>) -> FieldValue {
    FieldValue::Empty
}
