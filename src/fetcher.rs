use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

pub const COURSE_ADDRESS: &str =
    "https://tiss.tuwien.ac.at/course/courseDetails.xhtml?courseNr=";
pub const PROGRAM_ADDRESS: &str =
    "https://tiss.tuwien.ac.at/curriculum/public/curriculum.xhtml?key=";

/// Supplies raw page markup for an address. Fetching is deliberately
/// external to the extractor: login, rate limits and the browser session
/// all live with whatever produced the pages.
pub trait PageFetcher {
    fn fetch(&self, address: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Course,
    Program,
}

impl PageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Course => "course",
            PageKind::Program => "program",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageMeta {
    pub address: String,
    pub course_nr: Option<String>,
    pub kind: PageKind,
}

/// A directory of saved portal pages, one file per page. The file stem
/// names the course number (dots tolerated) or the curriculum key; the
/// page kind is sniffed from the content.
pub struct SavedPageDir {
    index: BTreeMap<String, PathBuf>,
    metas: Vec<PageMeta>,
}

impl SavedPageDir {
    pub fn open(root: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(root)
            .with_context(|| format!("reading saved pages in {}", root.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("html" | "htm" | "xhtml")
                )
            })
            .collect();
        paths.sort();

        let mut index = BTreeMap::new();
        let mut metas = Vec::new();
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let html = match fs::read_to_string(&path) {
                Ok(html) => html,
                Err(err) => {
                    warn!("Skipping unreadable page {}: {}", path.display(), err);
                    continue;
                }
            };
            let kind = sniff_kind(&html);
            let (address, course_nr) = match kind {
                PageKind::Course => {
                    let nr = stem.replace('.', "");
                    (format!("{}{}", COURSE_ADDRESS, nr), Some(nr))
                }
                PageKind::Program => (format!("{}{}", PROGRAM_ADDRESS, stem), None),
            };
            if index.contains_key(&address) {
                warn!("Duplicate saved page for {}, keeping the first", address);
                continue;
            }
            index.insert(address.clone(), path);
            metas.push(PageMeta {
                address,
                course_nr,
                kind,
            });
        }

        Ok(Self { index, metas })
    }

    pub fn pages(&self) -> &[PageMeta] {
        &self.metas
    }
}

impl PageFetcher for SavedPageDir {
    fn fetch(&self, address: &str) -> Result<String> {
        let path = self
            .index
            .get(address)
            .with_context(|| format!("no saved page for {}", address))?;
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

/// Program curriculum pages carry the node table; everything else is a
/// course detail page.
fn sniff_kind(html: &str) -> PageKind {
    if html.contains("nodeTable_data") {
        PageKind::Program
    } else {
        PageKind::Course
    }
}

// ── Tests ──
