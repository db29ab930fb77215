//! Row-oriented tabular output. The extractor itself stays
//! format-agnostic; everything separator-shaped lives here.

use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sep {
    Tab,
    Comma,
}

impl Sep {
    pub fn as_char(self) -> char {
        match self {
            Sep::Tab => '\t',
            Sep::Comma => ',',
        }
    }
}

pub const COURSE_HEADER: &[&str] = &[
    "course_nr", "url", "title", "semester", "type", "sws", "ects", "quick_note",
    "fetch_lang", "properties", "learning_outcomes", "subject", "methods", "exam_mode",
    "exam_modalities", "registration", "literature", "previous_knowledge",
    "preceding_courses", "language", "institute",
];
pub const CURRICULA_HEADER: &[&str] =
    &["course_nr", "study_code", "semester", "precondition", "note"];
pub const LECTURER_HEADER: &[&str] = &["course_nr", "position", "name"];
pub const FIELD_HEADER: &[&str] = &["course_nr", "key", "occurrence", "kind", "value"];
pub const PROGRAM_HEADER: &[&str] =
    &["module", "code", "type", "semester", "title", "credits"];

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single row, quoting fields that embed the separator, quotes or
/// line breaks.
pub fn write_row<W: Write>(mut w: W, row: &[String], sep: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, "{}", sep)?;
        } else {
            first = false;
        }
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

pub fn write_table<W: Write>(
    mut w: W,
    header: &[&str],
    rows: &[Vec<String>],
    sep: Sep,
) -> io::Result<()> {
    let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    write_row(&mut w, &header, sep.as_char())?;
    for row in rows {
        write_row(&mut w, row, sep.as_char())?;
    }
    Ok(())
}

// ── Tests ──
