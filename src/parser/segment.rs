use std::collections::HashMap;

/// One header-delimited chunk of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub header: String,
    pub body: String,
    /// Zero-based count of earlier segments carrying the same header text.
    pub occurrence: usize,
}

#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Opening header marker, e.g. `<h2>`.
    pub marker: String,
    /// Hard bound on emitted segments; scanning stops there even on
    /// malformed markup.
    pub max_segments: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            marker: "<h2>".to_string(),
            max_segments: 100,
        }
    }
}

impl SegmentConfig {
    /// Closing delimiter derived from the marker: `<h2>` becomes `</h2>`.
    pub fn closing(&self) -> String {
        self.marker.replacen('<', "</", 1)
    }
}

/// Split a document into header-delimited segments.
///
/// The returned iterator is lazy, finite and non-restartable; rescan by
/// calling `segment` again on the raw document.
pub fn segment<'a>(document: &'a str, config: &SegmentConfig) -> Segments<'a> {
    Segments {
        rest: document,
        open: config.marker.clone(),
        close: config.closing(),
        emitted: 0,
        max: config.max_segments,
        seen: HashMap::new(),
        truncated: false,
    }
}

pub struct Segments<'a> {
    rest: &'a str,
    open: String,
    close: String,
    emitted: usize,
    max: usize,
    seen: HashMap<String, usize>,
    truncated: bool,
}

impl Segments<'_> {
    /// True once the iterator stopped at the segment bound with markup
    /// left unscanned.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl Iterator for Segments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let start = self.rest.find(&self.open)?;
        if self.emitted == self.max {
            self.truncated = true;
            return None;
        }

        let after_open = &self.rest[start + self.open.len()..];
        // The chunk runs to the next opening marker or the document end.
        let (chunk, rest) = match after_open.find(&self.open) {
            Some(next) => (&after_open[..next], &after_open[next..]),
            None => (after_open, ""),
        };
        self.rest = rest;

        let (header, body) = match chunk.find(&self.close) {
            Some(end) => (&chunk[..end], &chunk[end + self.close.len()..]),
            // No closing delimiter: the whole chunk is header text.
            None => (chunk, ""),
        };
        let header = header.trim().to_string();

        let counter = self.seen.entry(header.clone()).or_insert(0);
        let occurrence = *counter;
        *counter += 1;
        self.emitted += 1;

        Some(Segment {
            header,
            body: body.to_string(),
            occurrence,
        })
    }
}

// ── Tests ──
