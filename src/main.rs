mod db;
mod export;
mod fetcher;
mod parser;

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use fetcher::PageFetcher;
use parser::normalize::Lang;

#[derive(Parser)]
#[command(name = "tiss_scraper", about = "TISS course catalog extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import saved portal pages from a directory
    Import {
        /// Directory of saved pages; the file stem names the course number
        dir: PathBuf,
    },
    /// Extract records from imported, unprocessed pages
    Process {
        /// Max pages to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Portal language of the saved pages (en|de), inferred per page
        /// when absent
        #[arg(long)]
        lang: Option<String>,
        /// Safety bound on sections scanned per page
        #[arg(long, default_value_t = 100)]
        max_segments: usize,
    },
    /// Write an extracted table as TSV (or CSV)
    Export {
        #[arg(long, value_enum, default_value = "courses")]
        table: Table,
        /// Comma-separated output instead of tabs
        #[arg(long)]
        csv: bool,
        /// Output file (stdout when absent)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Compact course table
    Overview {
        /// Filter by semester (e.g. "2023W")
        #[arg(long)]
        semester: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Pipeline statistics
    Stats,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Table {
    Courses,
    Curricula,
    Lecturers,
    Fields,
    Program,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import { dir } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let saved = fetcher::SavedPageDir::open(&dir)?;
            if saved.pages().is_empty() {
                println!("No saved pages found in {}", dir.display());
                return Ok(());
            }
            let mut imported = Vec::new();
            for meta in saved.pages() {
                imported.push(db::ImportedPage {
                    url: meta.address.clone(),
                    course_nr: meta.course_nr.clone(),
                    kind: meta.kind,
                    html: saved.fetch(&meta.address)?,
                });
            }
            let inserted = db::insert_pages(&conn, &imported)?;
            println!(
                "Imported {} new pages ({} found in {})",
                inserted,
                imported.len(),
                dir.display()
            );
            Ok(())
        }
        Commands::Process {
            limit,
            lang,
            max_segments,
        } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;

            let hint = lang
                .as_deref()
                .map(Lang::from_str)
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let config = parser::ExtractorConfig {
                segments: parser::segment::SegmentConfig {
                    max_segments,
                    ..Default::default()
                },
                language_hint: hint,
                ..Default::default()
            };

            let courses = db::fetch_unprocessed_courses(&conn, limit)?;
            let programs = db::fetch_unprocessed_programs(&conn, limit)?;
            if courses.is_empty() && programs.is_empty() {
                println!("No unprocessed pages. Run 'import' first.");
                return Ok(());
            }

            if !courses.is_empty() {
                println!("Processing {} course pages...", courses.len());
                let counts = process_courses(&conn, &courses, &config)?;
                counts.print();
            }
            if !programs.is_empty() {
                println!("Processing {} program pages...", programs.len());
                let rows = process_programs(&conn, &programs)?;
                println!("Saved {} program course rows.", rows);
            }
            Ok(())
        }
        Commands::Export { table, csv, out } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let sep = if csv { export::Sep::Comma } else { export::Sep::Tab };
            let (header, rows) = match table {
                Table::Courses => (export::COURSE_HEADER, db::fetch_course_table(&conn)?),
                Table::Curricula => (export::CURRICULA_HEADER, db::fetch_curricula_table(&conn)?),
                Table::Lecturers => (export::LECTURER_HEADER, db::fetch_lecturer_table(&conn)?),
                Table::Fields => (export::FIELD_HEADER, db::fetch_field_table(&conn)?),
                Table::Program => (export::PROGRAM_HEADER, db::fetch_program_table(&conn)?),
            };
            match out {
                Some(path) => {
                    let file = BufWriter::new(File::create(&path)?);
                    export::write_table(file, header, &rows, sep)?;
                    println!("Wrote {} rows to {}", rows.len(), path.display());
                }
                None => export::write_table(io::stdout().lock(), header, &rows, sep)?,
            }
            Ok(())
        }
        Commands::Overview { semester, limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, semester.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No processed courses found.");
                return Ok(());
            }

            println!(
                "{:>9} | {:<40} | {:<4} | {:<6} | {:>5} | {:>4} | {:>4}",
                "Course", "Title", "Type", "Sem", "ECTS", "Lect", "Curr"
            );
            println!("{}", "-".repeat(90));
            for r in &rows {
                println!(
                    "{:>9} | {:<40} | {:<4} | {:<6} | {:>5} | {:>4} | {:>4}",
                    r.course_nr,
                    truncate(&r.title, 40),
                    r.course_type,
                    r.semester,
                    r.ects,
                    r.lecturer_count,
                    r.curricula_count
                );
            }
            println!("\n{} courses", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Pages:         {}", s.pages);
            println!("  courses:     {}", s.course_pages);
            println!("  programs:    {}", s.program_pages);
            println!("Processed:     {}", s.processed);
            println!("Lecturers:     {}", s.lecturers);
            println!("Curricula:     {}", s.curricula);
            println!("Program rows:  {}", s.program_rows);
            println!("Diagnostics:   {}", s.diagnostics);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

struct ProcessCounts {
    courses: usize,
    lecturers: usize,
    curricula: usize,
    diagnostics: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} courses, {} lecturers, {} curriculum entries ({} diagnostics).",
            self.courses, self.lecturers, self.curricula, self.diagnostics,
        );
    }
}

/// Course pages are independent; parse chunks in parallel, save each
/// chunk in one transaction.
fn process_courses(
    conn: &rusqlite::Connection,
    pages: &[db::PageRow],
    config: &parser::ExtractorConfig,
) -> Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        courses: 0,
        lecturers: 0,
        curricula: 0,
        diagnostics: 0,
    };

    for chunk in pages.chunks(200) {
        let bundles: Vec<db::CourseBundle> = chunk
            .par_iter()
            .map(|page| {
                let record = parser::process_course(&page.url, &page.html, config);
                db::bundle(&record)
            })
            .collect();

        for b in &bundles {
            counts.courses += 1;
            counts.lecturers += b.lecturers.len();
            counts.curricula += b.curricula.len();
            counts.diagnostics += b.diagnostics.len();
        }
        db::save_courses(conn, &bundles)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn process_programs(conn: &rusqlite::Connection, pages: &[db::PageRow]) -> Result<usize> {
    let mut saved = 0;
    for page in pages {
        let (entries, diags) = parser::process_program(&page.html);
        db::save_program_entries(conn, page.id, &entries)?;
        db::save_diagnostics(conn, &page.url, &diags)?;
        saved += entries.len();
    }
    Ok(saved)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
