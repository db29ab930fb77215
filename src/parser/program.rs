use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{html, Anomaly};

static CREDITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)").unwrap());

const ROW_OPEN: &str = "<tr";
const ROW_CLOSE: &str = "</tr>";
const CELL_OPEN: &str = "<td";
const CELL_CLOSE: &str = "</td>";
const KEY_CLASS: &str = "courseKey";
const TITLE_CLASS: &str = "courseTitle";

/// One course row of a program curriculum table, tagged with the module
/// section it appeared under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramEntry {
    pub module: String,
    pub code: String,
    pub course_type: String,
    pub semester: String,
    pub title: String,
    pub credits: Option<f64>,
}

/// Walk the curriculum table in row order. Rows carrying a course key are
/// course rows; rows with bare first-cell text and no link open a new
/// module section, the same boundary pattern the course pages use with
/// their section headers.
pub fn extract(document: &str, diags: &mut Vec<Anomaly>) -> Vec<ProgramEntry> {
    let mut entries = Vec::new();
    let mut module = String::new();

    for row in rows(document) {
        let cells = row_cells(row);
        let Some(first) = cells.first() else { continue };

        if let Some(key_text) = class_span(first, KEY_CLASS) {
            let mut parts = key_text.split_whitespace();
            let code = parts.next().unwrap_or("").to_string();

            if module.is_empty() {
                diags.push(Anomaly::CourseBeforeModule { code });
                continue;
            }

            let credits = cells.get(3).and_then(|cell| parse_credits(cell));
            if credits.is_none() {
                diags.push(Anomaly::MalformedCredits { code: code.clone() });
            }

            entries.push(ProgramEntry {
                module: module.clone(),
                code,
                course_type: parts.next().unwrap_or("").to_string(),
                semester: parts.next().unwrap_or("").to_string(),
                title: class_span(first, TITLE_CLASS).unwrap_or_default(),
                credits,
            });
        } else {
            let text = html::strip_tags(first);
            let text = text.trim();
            if !text.is_empty() && !row.contains("<a ") {
                module = text.to_string();
            }
        }
    }

    entries
}

/// Table rows in document order.
fn rows(document: &str) -> impl Iterator<Item = &str> + '_ {
    let mut rest = document;
    std::iter::from_fn(move || {
        let start = rest.find(ROW_OPEN)?;
        let after = &rest[start..];
        let end = after.find(ROW_CLOSE)?;
        let row = &after[..end];
        rest = &after[end + ROW_CLOSE.len()..];
        Some(row)
    })
}

fn row_cells(row: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let mut rest = row;
    while let Some(start) = rest.find(CELL_OPEN) {
        let after = &rest[start..];
        let Some(end) = after.find(CELL_CLOSE) else { break };
        cells.push(&after[..end]);
        rest = &after[end + CELL_CLOSE.len()..];
    }
    cells
}

/// Inner text of the first element in `cell` carrying `class`.
fn class_span(cell: &str, class: &str) -> Option<String> {
    let marker = format!("class=\"{}\"", class);
    let rest = html::after(cell, &marker)?;
    let rest = html::after(rest, ">")?;
    let text = html::until(rest, "<")?;
    let text = html::collapse_ws(text);
    (!text.is_empty()).then_some(text)
}

fn parse_credits(cell: &str) -> Option<f64> {
    let text = html::strip_tags(cell);
    let caps = CREDITS_RE.captures(text.trim())?;
    caps[1].replace(',', ".").parse().ok()
}

// ── Tests ──
