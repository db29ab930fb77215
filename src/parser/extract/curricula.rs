use serde::Serialize;

use super::FieldValue;
use crate::parser::{html, Anomaly};

/// Study links in the curricula table carry exactly one semester
/// qualifier per page, depending on when the course next runs.
const NEXT_MARKER: &str = "semester=NEXT\">";
const CURRENT_MARKER: &str = "semester=CURRENT\">";
const ANCHOR_END: &str = "</a>";
const CELL_MARKER: &str = "td role=\"gridcell\">";
const CELL_END: &str = "</td>";
const STEOP_PHRASE: &str = "Studieneingangs- und Orientierungsphase";
const STEOP: &str = "STEOP";

/// One study program the course is offered in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurriculumEntry {
    pub study_code: String,
    pub semester: String,
    pub precondition: String,
    /// Free text, or the literal `STEOP` when the cell names the
    /// entry-requirements phase.
    pub note: String,
}

pub fn extract(body: &str, diags: &mut Vec<Anomaly>) -> FieldValue {
    let marker = if body.contains(NEXT_MARKER) {
        NEXT_MARKER
    } else if body.contains(CURRENT_MARKER) {
        CURRENT_MARKER
    } else {
        diags.push(Anomaly::MissingCurriculaMarker);
        return FieldValue::Entries(Vec::new());
    };

    let mut entries = Vec::new();
    let mut rest = body;

    while let Some(pos) = rest.find(marker) {
        rest = &rest[pos + marker.len()..];
        // One entry runs to the next qualified study link or the end.
        let chunk = match rest.find(marker) {
            Some(next) => &rest[..next],
            None => rest,
        };

        let Some(study_code) = html::until(chunk, ANCHOR_END) else {
            diags.push(Anomaly::MissingStudyCode);
            continue;
        };

        let mut cells: [String; 3] = Default::default();
        let mut cursor = chunk;
        for (index, cell) in cells.iter_mut().enumerate() {
            let Some(found) = html::after(cursor, CELL_MARKER).and_then(|after_marker| {
                html::until(after_marker, CELL_END).map(|text| (text, after_marker))
            }) else {
                diags.push(Anomaly::MissingCell { index });
                break;
            };
            let (text, after_marker) = found;
            *cell = text.trim().to_string();
            cursor = &after_marker[text.len()..];
        }

        let [semester, precondition, mut note] = cells;
        if note.contains(STEOP_PHRASE) || note.contains(STEOP) {
            note = STEOP.to_string();
        }

        entries.push(CurriculumEntry {
            study_code: study_code.trim().to_string(),
            semester,
            precondition,
            note,
        });
    }

    FieldValue::Entries(entries)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(body: &str) -> (Vec<CurriculumEntry>, Vec<Anomaly>) {
        let mut diags = Vec::new();
        match extract(body, &mut diags) {
            FieldValue::Entries(entries) => (entries, diags),
            other => panic!("expected entries, got {:?}", other),
        }
    }

    #[test]
    fn single_current_entry_round_trips() {
        let body = format!(
            "<table>{}</table>",
            row_str("CURRENT", "033 526 Data Science", ["2023W", "true", "some note"])
        );
        let (entries, diags) = entries(&body);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].study_code, "033 526 Data Science");
        assert_eq!(entries[0].semester, "2023W");
        assert_eq!(entries[0].precondition, "true");
        assert_eq!(entries[0].note, "some note");
        assert!(diags.is_empty());
    }

    fn row_str(qualifier: &str, code: &str, cells: [&str; 3]) -> String {
        format!(
            "<tr><td><a href=\"/curriculum/public/curriculum.xhtml?key=1&semester={}\">{}</a></td>\
             <td role=\"gridcell\">{}</td><td role=\"gridcell\">{}</td><td role=\"gridcell\">{}</td></tr>",
            qualifier, code, cells[0], cells[1], cells[2]
        )
    }

    #[test]
    fn steop_phrase_replaces_note() {
        let body = row_str(
            "NEXT",
            "033 521 Informatik",
            ["2024S", "false", "Studieneingangs- und Orientierungsphase erforderlich"],
        );
        let (entries, diags) = entries(&body);
        assert_eq!(entries[0].note, "STEOP");
        assert!(diags.is_empty());
    }

    #[test]
    fn steop_literal_replaces_note() {
        let body = row_str("NEXT", "033 521", ["2024S", "", "already STEOP tagged"]);
        let (entries, _) = entries(&body);
        assert_eq!(entries[0].note, "STEOP");
    }

    #[test]
    fn multiple_entries_in_order() {
        let body = format!(
            "{}{}",
            row_str("CURRENT", "033 526 Data Science", ["2023W", "true", ""]),
            row_str("CURRENT", "066 645 Logic", ["2023W", "false", ""]),
        );
        let (entries, _) = entries(&body);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].study_code, "033 526 Data Science");
        assert_eq!(entries[1].study_code, "066 645 Logic");
    }

    #[test]
    fn missing_qualifier_is_reported() {
        let (entries, diags) = entries("<table>no qualified links</table>");
        assert!(entries.is_empty());
        assert_eq!(diags, [Anomaly::MissingCurriculaMarker]);
    }

    #[test]
    fn missing_cells_reported_but_entry_kept() {
        let body = "<a href=\"x?semester=CURRENT\">033 526</a> no cells follow";
        let (entries, diags) = entries(body);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].study_code, "033 526");
        assert_eq!(entries[0].semester, "");
        assert!(diags.contains(&Anomaly::MissingCell { index: 0 }));
    }
}
