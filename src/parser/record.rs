use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::extract::{self, CurriculumEntry, FieldValue};
use super::html;
use super::normalize::{CanonicalKey, Lang, Normalized, Normalizer};
use super::segment::{segment, Segment};
use super::{Anomaly, ExtractorConfig};

static ADDRESS_NR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"courseNr=([0-9A-Za-z]+)").unwrap());

const NUMBER_OPEN: &str = "<span class=\"light\">";
const NUMBER_CLOSE: &str = "</span>";
const QUICK_OPEN: &str = "<div id=\"subHeader\" class=\"clearfix\">";
const QUICK_CLOSE: &str = "</div>";

/// Cosmetic attributes the portal sprinkles over every section body.
const COSMETIC_ATTRS: [&str; 2] = [" class=\"encode\"", " class=\"bulletList\""];

/// Identifies one field slot. Repeated sections of a multiplicity-bearing
/// key occupy successive occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FieldSlot {
    pub key: CanonicalKey,
    pub occurrence: usize,
}

/// The comma-separated line under the course title: `2023W, VU, 2.0, 3.0,
/// and anything after the fourth comma is free text`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuickInfo {
    pub semester: String,
    pub course_type: String,
    pub sws: String,
    pub ects: String,
    pub note: String,
}

/// Everything extracted from one course detail page. Always best-effort:
/// whatever the page did not yield shows up in `diagnostics` instead of
/// failing the document.
#[derive(Debug)]
pub struct ExtractedRecord {
    pub address: String,
    pub course_number: String,
    pub title: String,
    pub quick: QuickInfo,
    /// Language the page was served in, configured or inferred.
    pub language: Option<Lang>,
    fields: BTreeMap<FieldSlot, FieldValue>,
    pub diagnostics: Vec<Anomaly>,
}

impl ExtractedRecord {
    pub fn get(&self, key: CanonicalKey) -> Option<&FieldValue> {
        self.get_nth(key, 0)
    }

    pub fn get_nth(&self, key: CanonicalKey, occurrence: usize) -> Option<&FieldValue> {
        self.fields.get(&FieldSlot { key, occurrence })
    }

    /// Number of stored occurrences of `key`.
    pub fn occurrences(&self, key: CanonicalKey) -> usize {
        self.fields.keys().filter(|slot| slot.key == key).count()
    }

    pub fn first_text(&self, key: CanonicalKey) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    /// All slots in key order, occurrences ascending.
    pub fn slots(&self) -> impl Iterator<Item = (FieldSlot, &FieldValue)> {
        self.fields.iter().map(|(slot, value)| (*slot, value))
    }

    pub fn curricula(&self) -> &[CurriculumEntry] {
        match self.get(CanonicalKey::Curricula) {
            Some(FieldValue::Entries(entries)) => entries,
            _ => &[],
        }
    }

    pub fn lecturers(&self) -> &[String] {
        match self.get(CanonicalKey::Lecturers) {
            Some(FieldValue::Names(names)) => names,
            _ => &[],
        }
    }
}

/// Course number embedded in a detail-page address.
pub fn address_course_number(address: &str) -> Option<String> {
    ADDRESS_NR_RE
        .captures(address)
        .map(|caps| caps[1].to_string())
}

/// Fold one course detail page into a record.
pub fn assemble(address: &str, document: &str, config: &ExtractorConfig) -> ExtractedRecord {
    let mut diagnostics = Vec::new();

    let (prologue, rest) = parse_prologue(document, &mut diagnostics);

    // The address encodes the course number; the page must agree.
    if let Some(from_address) = address_course_number(address) {
        if !prologue.number.is_empty() && prologue.number.replace('.', "") != from_address {
            diagnostics.push(Anomaly::CourseNumberMismatch {
                page: prologue.number.clone(),
                address: from_address,
            });
        }
    }

    let mut normalizer = Normalizer::new(&config.aliases, config.language_hint);
    let mut fields = BTreeMap::new();
    let mut counters: BTreeMap<CanonicalKey, usize> = BTreeMap::new();

    let mut segments = segment(rest, &config.segments);
    for seg in segments.by_ref() {
        store_segment(
            seg,
            &mut normalizer,
            &mut fields,
            &mut counters,
            &mut diagnostics,
        );
    }
    if segments.truncated() {
        diagnostics.push(Anomaly::SegmentLimit {
            max: config.segments.max_segments,
        });
    }

    ExtractedRecord {
        address: address.to_string(),
        course_number: prologue.number,
        title: prologue.title,
        quick: prologue.quick,
        language: normalizer.hint(),
        fields,
        diagnostics,
    }
}

#[derive(Default)]
struct Prologue {
    number: String,
    title: String,
    quick: QuickInfo,
}

/// Course number, title and quick-info line are positional, ahead of the
/// first section header, and parsed before segmentation begins.
fn parse_prologue<'a>(document: &'a str, diags: &mut Vec<Anomaly>) -> (Prologue, &'a str) {
    let mut prologue = Prologue::default();
    let mut rest = document;

    match rest.find(NUMBER_OPEN) {
        Some(open) => {
            let after_open = &rest[open + NUMBER_OPEN.len()..];
            match after_open.find(NUMBER_CLOSE) {
                Some(close) => {
                    prologue.number = after_open[..close].trim().to_string();
                    rest = &after_open[close + NUMBER_CLOSE.len()..];
                    // The title follows the number span as bare text.
                    prologue.title = match rest.find('<') {
                        Some(pos) => rest[..pos].trim().to_string(),
                        None => rest.trim().to_string(),
                    };
                }
                None => diags.push(Anomaly::MissingPrologue {
                    marker: NUMBER_CLOSE,
                }),
            }
        }
        None => diags.push(Anomaly::MissingPrologue {
            marker: NUMBER_OPEN,
        }),
    }

    match html::slice_between(rest, QUICK_OPEN, QUICK_CLOSE) {
        Some(line) => prologue.quick = parse_quick_info(line.trim(), diags),
        None => diags.push(Anomaly::MissingPrologue { marker: QUICK_OPEN }),
    }

    (prologue, rest)
}

fn parse_quick_info(line: &str, diags: &mut Vec<Anomaly>) -> QuickInfo {
    let parts: Vec<&str> = line.splitn(5, ',').map(str::trim).collect();
    if parts.len() < 5 {
        diags.push(Anomaly::ShortQuickInfo { found: parts.len() });
    }
    let part = |index: usize| parts.get(index).copied().unwrap_or("").to_string();
    QuickInfo {
        semester: part(0),
        course_type: part(1),
        sws: part(2),
        ects: part(3),
        note: part(4),
    }
}

fn store_segment(
    seg: Segment,
    normalizer: &mut Normalizer,
    fields: &mut BTreeMap<FieldSlot, FieldValue>,
    counters: &mut BTreeMap<CanonicalKey, usize>,
    diags: &mut Vec<Anomaly>,
) {
    let mut body = seg.body;
    for attr in COSMETIC_ATTRS {
        body = body.replace(attr, "");
    }

    match normalizer.normalize(&seg.header) {
        Normalized::Known(key) => {
            let value = (extract::bound(key))(&body, diags);
            if value == FieldValue::Unparsed {
                diags.push(Anomaly::UnparsedField { key });
            }
            let counter = counters.entry(key).or_insert(0);
            fields.insert(
                FieldSlot {
                    key,
                    occurrence: *counter,
                },
                value,
            );
            if key.multiplicity_bearing() {
                *counter += 1;
            }
        }
        Normalized::Unknown(header) => {
            if !html::strip_tags(&body).trim().is_empty() {
                diags.push(Anomaly::UnknownHeader { header });
            }
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str =
        "https://tiss.tuwien.ac.at/course/courseDetails.xhtml?courseNr=185A91";

    fn page(sections: &str) -> String {
        format!(
            "<div id=\"contentInner\"><h1><span class=\"light\">185.A91 </span>\
             Programming Paradigms\n</h1>\
             <div id=\"subHeader\" class=\"clearfix\">2023W, VU, 2, 3, optional</div>{}",
            sections
        )
    }

    fn run(sections: &str) -> ExtractedRecord {
        assemble(ADDRESS, &page(sections), &ExtractorConfig::default())
    }

    #[test]
    fn prologue_scalars() {
        let record = run("");
        assert_eq!(record.course_number, "185.A91");
        assert_eq!(record.title, "Programming Paradigms");
        assert_eq!(record.quick.semester, "2023W");
        assert_eq!(record.quick.course_type, "VU");
        assert_eq!(record.quick.sws, "2");
        assert_eq!(record.quick.ects, "3");
        assert_eq!(record.quick.note, "optional");
        assert!(record.diagnostics.is_empty());
    }

    #[test]
    fn quick_info_keeps_trailing_free_text() {
        let mut diags = Vec::new();
        let quick = parse_quick_info("2023W, VU, 2, 3, not graded, bring laptop", &mut diags);
        assert_eq!(quick.note, "not graded, bring laptop");
        assert!(diags.is_empty());
    }

    #[test]
    fn short_quick_info_reported() {
        let mut diags = Vec::new();
        let quick = parse_quick_info("2023W, VU", &mut diags);
        assert_eq!(quick.semester, "2023W");
        assert_eq!(quick.ects, "");
        assert_eq!(diags, [Anomaly::ShortQuickInfo { found: 2 }]);
    }

    #[test]
    fn empty_document_yields_prologue_only_diagnostics() {
        let record = assemble(ADDRESS, "", &ExtractorConfig::default());
        assert_eq!(record.slots().count(), 0);
        assert_eq!(record.course_number, "");
        assert!(record
            .diagnostics
            .iter()
            .all(|d| matches!(d, Anomaly::MissingPrologue { .. })));
        assert_eq!(record.diagnostics.len(), 2);
    }

    #[test]
    fn course_number_mismatch_reported() {
        let record = assemble(
            "https://tiss.tuwien.ac.at/course/courseDetails.xhtml?courseNr=999999",
            &page(""),
            &ExtractorConfig::default(),
        );
        assert!(record.diagnostics.contains(&Anomaly::CourseNumberMismatch {
            page: "185.A91".to_string(),
            address: "999999".to_string(),
        }));
    }

    #[test]
    fn repeated_additional_information_gets_distinct_slots() {
        let record = run(
            "<h2>Additional information</h2><p>first block</p>\
             <h2>Additional information</h2><p>second block</p>",
        );
        assert_eq!(record.occurrences(CanonicalKey::AdditionalInformation), 2);
        assert_eq!(
            record.get_nth(CanonicalKey::AdditionalInformation, 0),
            Some(&FieldValue::Text("<p>first block</p>".to_string()))
        );
        assert_eq!(
            record.get_nth(CanonicalKey::AdditionalInformation, 1),
            Some(&FieldValue::Text("<p>second block</p>".to_string()))
        );
    }

    #[test]
    fn unknown_header_with_body_reported() {
        let record = run("<h2>Cafeteria</h2><p>Open daily</p>");
        assert!(record.diagnostics.contains(&Anomaly::UnknownHeader {
            header: "Cafeteria".to_string()
        }));
    }

    #[test]
    fn unknown_header_without_body_dropped() {
        let record = run("<h2>Cafeteria</h2> <br/> ");
        assert!(record.diagnostics.is_empty());
    }

    #[test]
    fn deferred_section_is_recognized_not_reported() {
        let record = run("<h2>Exams</h2><table><tr><td>lots</td></tr></table>");
        assert_eq!(record.get(CanonicalKey::Exams), Some(&FieldValue::Empty));
        assert!(record.diagnostics.is_empty());
    }

    #[test]
    fn language_hint_inferred_and_kept() {
        let record = run("<h2>Merkmale</h2><p>Pflichtfach</p>");
        assert_eq!(record.language, Some(Lang::De));
        assert_eq!(
            record.first_text(CanonicalKey::Properties),
            Some("<p>Pflichtfach</p>")
        );
    }

    #[test]
    fn segment_bound_reported() {
        let config = ExtractorConfig {
            segments: crate::parser::segment::SegmentConfig {
                max_segments: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let doc = page("<h2>Properties</h2>a<h2>Literature</h2>b");
        let record = assemble(ADDRESS, &doc, &config);
        assert_eq!(record.slots().count(), 1);
        assert!(record
            .diagnostics
            .contains(&Anomaly::SegmentLimit { max: 1 }));
    }

    #[test]
    fn address_number_extraction() {
        assert_eq!(
            address_course_number("https://x/courseDetails.xhtml?courseNr=104263&lang=de"),
            Some("104263".to_string())
        );
        assert_eq!(address_course_number("https://x/no-number"), None);
    }

    // ── Fixture pages ──

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    #[test]
    fn english_course_page() {
        let html = fixture("185.A91.html");
        let record = assemble(ADDRESS, &html, &ExtractorConfig::default());

        assert_eq!(record.course_number, "185.A91");
        assert_eq!(record.title, "Introduction to Programming Paradigms");
        assert_eq!(record.quick.semester, "2023W");
        assert_eq!(record.quick.course_type, "VU");
        assert_eq!(record.quick.sws, "4.0");
        assert_eq!(record.quick.ects, "6.0");
        assert_eq!(record.language, Some(Lang::En));

        let names: Vec<&str> = record.lecturers().iter().map(String::as_str).collect();
        assert_eq!(names, ["Ana Gruber", "Jan Novak", "Ana Gruber"]);
        assert_eq!(
            record.first_text(CanonicalKey::Language),
            Some("if required in English")
        );
        assert_eq!(
            record.first_text(CanonicalKey::Institute),
            Some("E185 Institute of Computer Languages")
        );
        assert_eq!(record.occurrences(CanonicalKey::AdditionalInformation), 2);

        let curricula = record.curricula();
        assert_eq!(curricula.len(), 2);
        assert_eq!(curricula[0].study_code, "033 521 Informatik");
        assert_eq!(curricula[0].semester, "2023W");
        assert_eq!(curricula[1].note, "STEOP");

        assert_eq!(record.get(CanonicalKey::Exams), Some(&FieldValue::Empty));
        assert!(record.diagnostics.is_empty(), "{:?}", record.diagnostics);
    }

    #[test]
    fn german_course_page() {
        let html = fixture("104.263.html");
        let record = assemble(
            "https://tiss.tuwien.ac.at/course/courseDetails.xhtml?courseNr=104263",
            &html,
            &ExtractorConfig::default(),
        );

        assert_eq!(record.course_number, "104.263");
        assert_eq!(record.language, Some(Lang::De));
        assert_eq!(record.occurrences(CanonicalKey::AdditionalInformation), 2);
        assert_eq!(record.curricula().len(), 1);
        assert_eq!(record.curricula()[0].note, "STEOP");

        // The one unknown section with content is reported, nothing else.
        assert_eq!(
            record.diagnostics,
            [Anomaly::UnknownHeader {
                header: "Sonstiges".to_string()
            }]
        );
    }
}
