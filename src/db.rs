use anyhow::Result;
use rusqlite::Connection;

use crate::fetcher::PageKind;
use crate::parser::extract::FieldValue;
use crate::parser::normalize::CanonicalKey;
use crate::parser::record::address_course_number;
use crate::parser::{Anomaly, ExtractedRecord};

const DB_PATH: &str = "data/tiss.sqlite";

pub fn connect() -> Result<Connection> {
    if let Some(parent) = std::path::Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            id          INTEGER PRIMARY KEY,
            url         TEXT UNIQUE NOT NULL,
            course_nr   TEXT,
            kind        TEXT NOT NULL CHECK(kind IN ('course','program')),
            html        TEXT NOT NULL,
            imported_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_kind ON pages(kind);

        CREATE TABLE IF NOT EXISTS courses (
            course_nr          TEXT PRIMARY KEY,
            url                TEXT NOT NULL,
            title              TEXT,
            semester           TEXT,
            course_type        TEXT,
            sws                TEXT,
            ects               TEXT,
            quick_note         TEXT,
            fetch_lang         TEXT,
            properties         TEXT,
            learning_outcomes  TEXT,
            subject            TEXT,
            methods            TEXT,
            exam_mode          TEXT,
            exam_modalities    TEXT,
            registration       TEXT,
            literature         TEXT,
            previous_knowledge TEXT,
            preceding_courses  TEXT,
            language           TEXT,
            institute          TEXT,
            processed_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Generic (key, occurrence) slot dump, one row per section.
        CREATE TABLE IF NOT EXISTS course_fields (
            id         INTEGER PRIMARY KEY,
            course_nr  TEXT NOT NULL REFERENCES courses(course_nr),
            key        TEXT NOT NULL,
            occurrence INTEGER NOT NULL,
            kind       TEXT NOT NULL,
            value      TEXT,
            UNIQUE(course_nr, key, occurrence)
        );

        CREATE TABLE IF NOT EXISTS lecturers (
            id        INTEGER PRIMARY KEY,
            course_nr TEXT NOT NULL REFERENCES courses(course_nr),
            position  INTEGER NOT NULL,
            name      TEXT NOT NULL,
            UNIQUE(course_nr, position)
        );

        CREATE TABLE IF NOT EXISTS curricula (
            id           INTEGER PRIMARY KEY,
            course_nr    TEXT NOT NULL REFERENCES courses(course_nr),
            study_code   TEXT NOT NULL,
            semester     TEXT,
            precondition TEXT,
            note         TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_curricula_course ON curricula(course_nr);

        CREATE TABLE IF NOT EXISTS program_courses (
            id          INTEGER PRIMARY KEY,
            page_id     INTEGER NOT NULL REFERENCES pages(id),
            module      TEXT NOT NULL,
            code        TEXT NOT NULL,
            course_type TEXT,
            semester    TEXT,
            title       TEXT,
            credits     REAL
        );
        CREATE INDEX IF NOT EXISTS idx_program_page ON program_courses(page_id);

        CREATE TABLE IF NOT EXISTS diagnostics (
            id          INTEGER PRIMARY KEY,
            url         TEXT NOT NULL,
            kind        TEXT NOT NULL,
            detail      TEXT NOT NULL,
            recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_diagnostics_url ON diagnostics(url);
        ",
    )?;
    Ok(())
}

// ── Importing ──

pub struct ImportedPage {
    pub url: String,
    pub course_nr: Option<String>,
    pub kind: PageKind,
    pub html: String,
}

pub fn insert_pages(conn: &Connection, pages: &[ImportedPage]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO pages (url, course_nr, kind, html) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for page in pages {
            count += stmt.execute(rusqlite::params![
                page.url,
                page.course_nr,
                page.kind.as_str(),
                page.html,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Processing ──

pub struct PageRow {
    pub id: i64,
    pub url: String,
    pub html: String,
}

pub fn fetch_unprocessed_courses(conn: &Connection, limit: Option<usize>) -> Result<Vec<PageRow>> {
    fetch_pages(
        conn,
        "SELECT p.id, p.url, p.html FROM pages p
         LEFT JOIN courses c ON c.url = p.url
         WHERE p.kind = 'course' AND c.url IS NULL
         ORDER BY p.id",
        limit,
    )
}

pub fn fetch_unprocessed_programs(conn: &Connection, limit: Option<usize>) -> Result<Vec<PageRow>> {
    fetch_pages(
        conn,
        "SELECT p.id, p.url, p.html FROM pages p
         WHERE p.kind = 'program'
           AND NOT EXISTS (SELECT 1 FROM program_courses pc WHERE pc.page_id = p.id)
         ORDER BY p.id",
        limit,
    )
}

fn fetch_pages(conn: &Connection, sql: &str, limit: Option<usize>) -> Result<Vec<PageRow>> {
    let sql = match limit {
        Some(n) => format!("{} LIMIT {}", sql, n),
        None => sql.to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PageRow {
                id: row.get(0)?,
                url: row.get(1)?,
                html: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Extracted rows ──

pub struct CourseRow {
    pub course_nr: String,
    pub url: String,
    pub title: String,
    pub semester: String,
    pub course_type: String,
    pub sws: String,
    pub ects: String,
    pub quick_note: String,
    pub fetch_lang: Option<String>,
    pub properties: Option<String>,
    pub learning_outcomes: Option<String>,
    pub subject: Option<String>,
    pub methods: Option<String>,
    pub exam_mode: Option<String>,
    pub exam_modalities: Option<String>,
    pub registration: Option<String>,
    pub literature: Option<String>,
    pub previous_knowledge: Option<String>,
    pub preceding_courses: Option<String>,
    pub language: Option<String>,
    pub institute: Option<String>,
}

pub struct FieldRow {
    pub course_nr: String,
    pub key: &'static str,
    pub occurrence: i64,
    pub kind: &'static str,
    pub value: String,
}

pub struct LecturerRow {
    pub course_nr: String,
    pub position: i64,
    pub name: String,
}

pub struct CurriculumRow {
    pub course_nr: String,
    pub study_code: String,
    pub semester: String,
    pub precondition: String,
    pub note: String,
}

pub struct DiagnosticRow {
    pub url: String,
    pub kind: String,
    pub detail: String,
}

/// Everything one processed course page writes to the database.
pub struct CourseBundle {
    pub course: CourseRow,
    pub fields: Vec<FieldRow>,
    pub lecturers: Vec<LecturerRow>,
    pub curricula: Vec<CurriculumRow>,
    pub diagnostics: Vec<DiagnosticRow>,
}

/// Map one extracted record onto its table rows.
pub fn bundle(record: &ExtractedRecord) -> CourseBundle {
    use CanonicalKey as K;

    // Broken pages may lack the number; fall back to the address so the
    // row still keys.
    let course_nr = if record.course_number.is_empty() {
        address_course_number(&record.address).unwrap_or_else(|| record.address.clone())
    } else {
        record.course_number.clone()
    };

    let text = |key: K| record.first_text(key).map(str::to_string);
    let course = CourseRow {
        course_nr: course_nr.clone(),
        url: record.address.clone(),
        title: record.title.clone(),
        semester: record.quick.semester.clone(),
        course_type: record.quick.course_type.clone(),
        sws: record.quick.sws.clone(),
        ects: record.quick.ects.clone(),
        quick_note: record.quick.note.clone(),
        fetch_lang: record.language.map(|lang| lang.as_str().to_string()),
        properties: text(K::Properties),
        learning_outcomes: text(K::LearningOutcomes),
        subject: text(K::SubjectOfCourse),
        methods: text(K::TeachingMethods),
        exam_mode: text(K::ModeOfExamination),
        exam_modalities: text(K::ExaminationModalities),
        registration: text(K::CourseRegistration),
        literature: text(K::Literature),
        previous_knowledge: text(K::PreviousKnowledge),
        preceding_courses: text(K::PrecedingCourses),
        language: text(K::Language),
        institute: text(K::Institute),
    };

    let fields = record
        .slots()
        .map(|(slot, value)| {
            let (kind, cell) = field_cell(value);
            FieldRow {
                course_nr: course_nr.clone(),
                key: slot.key.as_str(),
                occurrence: slot.occurrence as i64,
                kind,
                value: cell,
            }
        })
        .collect();

    let lecturers = record
        .lecturers()
        .iter()
        .enumerate()
        .map(|(position, name)| LecturerRow {
            course_nr: course_nr.clone(),
            position: position as i64,
            name: name.clone(),
        })
        .collect();

    let curricula = record
        .curricula()
        .iter()
        .map(|entry| CurriculumRow {
            course_nr: course_nr.clone(),
            study_code: entry.study_code.clone(),
            semester: entry.semester.clone(),
            precondition: entry.precondition.clone(),
            note: entry.note.clone(),
        })
        .collect();

    let diagnostics = record
        .diagnostics
        .iter()
        .map(|anomaly| DiagnosticRow {
            url: record.address.clone(),
            kind: anomaly.kind().to_string(),
            detail: anomaly.to_string(),
        })
        .collect();

    CourseBundle {
        course,
        fields,
        lecturers,
        curricula,
        diagnostics,
    }
}

fn field_cell(value: &FieldValue) -> (&'static str, String) {
    match value {
        FieldValue::Text(text) => ("text", text.clone()),
        FieldValue::Names(names) => ("names", serde_json::to_string(names).unwrap_or_default()),
        FieldValue::Entries(entries) => {
            ("curricula", serde_json::to_string(entries).unwrap_or_default())
        }
        FieldValue::Empty => ("empty", String::new()),
        FieldValue::Unparsed => ("unparsed", String::new()),
    }
}

pub fn save_courses(conn: &Connection, bundles: &[CourseBundle]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut course_stmt = tx.prepare(
            "INSERT OR REPLACE INTO courses
             (course_nr, url, title, semester, course_type, sws, ects, quick_note,
              fetch_lang, properties, learning_outcomes, subject, methods, exam_mode,
              exam_modalities, registration, literature, previous_knowledge,
              preceding_courses, language, institute)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
        )?;
        let mut clear_fields =
            tx.prepare("DELETE FROM course_fields WHERE course_nr = ?1")?;
        let mut clear_lecturers = tx.prepare("DELETE FROM lecturers WHERE course_nr = ?1")?;
        let mut clear_curricula = tx.prepare("DELETE FROM curricula WHERE course_nr = ?1")?;
        let mut field_stmt = tx.prepare(
            "INSERT INTO course_fields (course_nr, key, occurrence, kind, value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut lecturer_stmt = tx.prepare(
            "INSERT INTO lecturers (course_nr, position, name) VALUES (?1, ?2, ?3)",
        )?;
        let mut curriculum_stmt = tx.prepare(
            "INSERT INTO curricula (course_nr, study_code, semester, precondition, note)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut clear_diags = tx.prepare("DELETE FROM diagnostics WHERE url = ?1")?;
        let mut diag_stmt = tx.prepare(
            "INSERT INTO diagnostics (url, kind, detail) VALUES (?1, ?2, ?3)",
        )?;

        for b in bundles {
            let c = &b.course;
            // Children first: replacing the course row deletes the old one,
            // which must not still be referenced.
            clear_fields.execute(rusqlite::params![c.course_nr])?;
            clear_lecturers.execute(rusqlite::params![c.course_nr])?;
            clear_curricula.execute(rusqlite::params![c.course_nr])?;
            clear_diags.execute(rusqlite::params![c.url])?;

            course_stmt.execute(rusqlite::params![
                c.course_nr, c.url, c.title, c.semester, c.course_type, c.sws, c.ects,
                c.quick_note, c.fetch_lang, c.properties, c.learning_outcomes, c.subject,
                c.methods, c.exam_mode, c.exam_modalities, c.registration, c.literature,
                c.previous_knowledge, c.preceding_courses, c.language, c.institute,
            ])?;

            for f in &b.fields {
                field_stmt.execute(rusqlite::params![
                    f.course_nr, f.key, f.occurrence, f.kind, f.value,
                ])?;
            }
            for l in &b.lecturers {
                lecturer_stmt.execute(rusqlite::params![l.course_nr, l.position, l.name])?;
            }
            for cu in &b.curricula {
                curriculum_stmt.execute(rusqlite::params![
                    cu.course_nr, cu.study_code, cu.semester, cu.precondition, cu.note,
                ])?;
            }
            for d in &b.diagnostics {
                diag_stmt.execute(rusqlite::params![d.url, d.kind, d.detail])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn save_program_entries(
    conn: &Connection,
    page_id: i64,
    entries: &[crate::parser::ProgramEntry],
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        tx.execute(
            "DELETE FROM program_courses WHERE page_id = ?1",
            rusqlite::params![page_id],
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO program_courses (page_id, module, code, course_type, semester, title, credits)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for e in entries {
            stmt.execute(rusqlite::params![
                page_id, e.module, e.code, e.course_type, e.semester, e.title, e.credits,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn save_diagnostics(conn: &Connection, url: &str, anomalies: &[Anomaly]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        tx.execute(
            "DELETE FROM diagnostics WHERE url = ?1",
            rusqlite::params![url],
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO diagnostics (url, kind, detail) VALUES (?1, ?2, ?3)",
        )?;
        for anomaly in anomalies {
            stmt.execute(rusqlite::params![url, anomaly.kind(), anomaly.to_string()])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Export ──

fn fetch_table(conn: &Connection, sql: &str) -> Result<Vec<Vec<String>>> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| {
                    // Render REAL/INTEGER columns through TEXT coercion.
                    row.get::<_, Option<String>>(i).map(Option::unwrap_or_default)
                })
                .collect::<Result<Vec<String>, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_course_table(conn: &Connection) -> Result<Vec<Vec<String>>> {
    fetch_table(
        conn,
        "SELECT course_nr, url, title, semester, course_type, sws, ects, quick_note,
                fetch_lang, properties, learning_outcomes, subject, methods, exam_mode,
                exam_modalities, registration, literature, previous_knowledge,
                preceding_courses, language, institute
         FROM courses ORDER BY course_nr",
    )
}

pub fn fetch_curricula_table(conn: &Connection) -> Result<Vec<Vec<String>>> {
    fetch_table(
        conn,
        "SELECT course_nr, study_code, semester, precondition, note
         FROM curricula ORDER BY course_nr, id",
    )
}

pub fn fetch_lecturer_table(conn: &Connection) -> Result<Vec<Vec<String>>> {
    fetch_table(
        conn,
        "SELECT course_nr, CAST(position AS TEXT), name
         FROM lecturers ORDER BY course_nr, position",
    )
}

pub fn fetch_field_table(conn: &Connection) -> Result<Vec<Vec<String>>> {
    fetch_table(
        conn,
        "SELECT course_nr, key, CAST(occurrence AS TEXT), kind, value
         FROM course_fields ORDER BY course_nr, key, occurrence",
    )
}

pub fn fetch_program_table(conn: &Connection) -> Result<Vec<Vec<String>>> {
    fetch_table(
        conn,
        "SELECT module, code, course_type, semester, title, CAST(credits AS TEXT)
         FROM program_courses ORDER BY id",
    )
}

// ── Overview ──

pub struct OverviewRow {
    pub course_nr: String,
    pub title: String,
    pub course_type: String,
    pub semester: String,
    pub ects: String,
    pub lecturer_count: i64,
    pub curricula_count: i64,
}

pub fn fetch_overview(
    conn: &Connection,
    semester: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let where_clause = match semester {
        Some(_) => " WHERE c.semester = ?1",
        None => "",
    };
    let sql = format!(
        "SELECT c.course_nr, COALESCE(c.title,''), COALESCE(c.course_type,''),
                COALESCE(c.semester,''), COALESCE(c.ects,''),
                (SELECT COUNT(*) FROM lecturers l WHERE l.course_nr = c.course_nr),
                (SELECT COUNT(*) FROM curricula cu WHERE cu.course_nr = c.course_nr)
         FROM courses c{}
         ORDER BY c.course_nr
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok(OverviewRow {
            course_nr: row.get(0)?,
            title: row.get(1)?,
            course_type: row.get(2)?,
            semester: row.get(3)?,
            ects: row.get(4)?,
            lecturer_count: row.get(5)?,
            curricula_count: row.get(6)?,
        })
    };
    let rows = match semester {
        Some(s) => stmt
            .query_map(rusqlite::params![s], map_row)?
            .collect::<Result<Vec<_>, _>>()?,
        None => stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub pages: usize,
    pub course_pages: usize,
    pub program_pages: usize,
    pub processed: usize,
    pub lecturers: usize,
    pub curricula: usize,
    pub program_rows: usize,
    pub diagnostics: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> {
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    };
    Ok(Stats {
        pages: count("SELECT COUNT(*) FROM pages")?,
        course_pages: count("SELECT COUNT(*) FROM pages WHERE kind = 'course'")?,
        program_pages: count("SELECT COUNT(*) FROM pages WHERE kind = 'program'")?,
        processed: count("SELECT COUNT(*) FROM courses")?,
        lecturers: count("SELECT COUNT(*) FROM lecturers")?,
        curricula: count("SELECT COUNT(*) FROM curricula")?,
        program_rows: count("SELECT COUNT(*) FROM program_courses")?,
        diagnostics: count("SELECT COUNT(*) FROM diagnostics")?,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{process_course, ExtractorConfig};

    const ADDRESS: &str =
        "https://tiss.tuwien.ac.at/course/courseDetails.xhtml?courseNr=185A91";

    fn sample_bundle() -> CourseBundle {
        let html = std::fs::read_to_string("tests/fixtures/185.A91.html").unwrap();
        let record = process_course(ADDRESS, &html, &ExtractorConfig::default());
        bundle(&record)
    }

    #[test]
    fn bundle_maps_record_to_rows() {
        let b = sample_bundle();
        assert_eq!(b.course.course_nr, "185.A91");
        assert_eq!(b.course.semester, "2023W");
        assert_eq!(b.lecturers.len(), 3);
        assert_eq!(b.curricula.len(), 2);
        // Two additional-information slots show up as two field rows.
        let additional: Vec<_> = b
            .fields
            .iter()
            .filter(|f| f.key == "additional_information")
            .collect();
        assert_eq!(additional.len(), 2);
        assert!(b.diagnostics.is_empty());
    }

    #[test]
    fn save_and_count_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let pages = [ImportedPage {
            url: ADDRESS.to_string(),
            course_nr: Some("185A91".to_string()),
            kind: PageKind::Course,
            html: "<html></html>".to_string(),
        }];
        assert_eq!(insert_pages(&conn, &pages).unwrap(), 1);
        // Idempotent on the unique url.
        assert_eq!(insert_pages(&conn, &pages).unwrap(), 0);

        save_courses(&conn, &[sample_bundle()]).unwrap();
        // Re-saving replaces instead of duplicating.
        save_courses(&conn, &[sample_bundle()]).unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.lecturers, 3);
        assert_eq!(stats.curricula, 2);

        // The processed page no longer shows up as work.
        assert!(fetch_unprocessed_courses(&conn, None).unwrap().is_empty());

        let overview = fetch_overview(&conn, Some("2023W"), 10).unwrap();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].lecturer_count, 3);

        let rows = fetch_curricula_table(&conn).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][4], "STEOP");
    }
}
