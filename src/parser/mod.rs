pub mod extract;
pub mod html;
pub mod normalize;
pub mod program;
pub mod record;
pub mod segment;

use thiserror::Error;

use normalize::{AliasTable, CanonicalKey, Lang};
use segment::SegmentConfig;

pub use program::ProgramEntry;
pub use record::ExtractedRecord;

/// Unrecoverable setup problem, surfaced before any document is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("alias table has no {lang} alias for {key:?}")]
    MissingAlias { key: CanonicalKey, lang: Lang },
}

/// Recoverable oddity found while extracting. Collected on the record,
/// never raised: extraction always yields a best-effort record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Anomaly {
    #[error("unknown section header {header:?} with non-empty body")]
    UnknownHeader { header: String },
    #[error("course number mismatch: page says {page:?}, address says {address:?}")]
    CourseNumberMismatch { page: String, address: String },
    #[error("curricula section has no semester qualifier marker")]
    MissingCurriculaMarker,
    #[error("curriculum entry has no closing study-code anchor")]
    MissingStudyCode,
    #[error("curriculum entry cell {index} is missing")]
    MissingCell { index: usize },
    #[error("section {key:?} could not be parsed")]
    UnparsedField { key: CanonicalKey },
    #[error("segment limit of {max} reached, trailing markup skipped")]
    SegmentLimit { max: usize },
    #[error("prologue marker {marker:?} not found")]
    MissingPrologue { marker: &'static str },
    #[error("quick info has {found} comma-separated fields, expected 5")]
    ShortQuickInfo { found: usize },
    #[error("course row {code:?} appears before any module header row")]
    CourseBeforeModule { code: String },
    #[error("course row {code:?} has an unreadable credits cell")]
    MalformedCredits { code: String },
}

impl Anomaly {
    /// Stable tag stored alongside the rendered message.
    pub fn kind(&self) -> &'static str {
        match self {
            Anomaly::UnknownHeader { .. } => "unknown_header",
            Anomaly::CourseNumberMismatch { .. } => "course_number_mismatch",
            Anomaly::MissingCurriculaMarker => "missing_curricula_marker",
            Anomaly::MissingStudyCode => "missing_study_code",
            Anomaly::MissingCell { .. } => "missing_cell",
            Anomaly::UnparsedField { .. } => "unparsed_field",
            Anomaly::SegmentLimit { .. } => "segment_limit",
            Anomaly::MissingPrologue { .. } => "missing_prologue",
            Anomaly::ShortQuickInfo { .. } => "short_quick_info",
            Anomaly::CourseBeforeModule { .. } => "course_before_module",
            Anomaly::MalformedCredits { .. } => "malformed_credits",
        }
    }
}

/// Knobs for one extraction run. `Default` matches the portal's markup.
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    pub segments: SegmentConfig,
    pub aliases: AliasTable,
    /// Portal language of the pages; inferred per document when absent.
    pub language_hint: Option<Lang>,
}

/// Fold one course detail page into a record. Pure per document; batch
/// callers may run pages in parallel freely.
pub fn process_course(address: &str, document: &str, config: &ExtractorConfig) -> ExtractedRecord {
    record::assemble(address, document, config)
}

/// Flatten one program curriculum page into module-tagged course rows.
pub fn process_program(document: &str) -> (Vec<ProgramEntry>, Vec<Anomaly>) {
    let mut diags = Vec::new();
    let entries = program::extract(document, &mut diags);
    (entries, diags)
}
