//! Tolerant fragment scanning over raw markup. The portal's pages are not
//! well-formed enough for a DOM parser to buy anything; everything here
//! works on marker substrings and never panics on malformed input.

/// Slice strictly between the first `open` and the next `close` after it.
pub fn slice_between<'a>(s: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = s.find(open)? + open.len();
    let end = s[start..].find(close)? + start;
    Some(&s[start..end])
}

/// Everything after the first occurrence of `pat`.
pub fn after<'a>(s: &'a str, pat: &str) -> Option<&'a str> {
    s.find(pat).map(|pos| &s[pos + pat.len()..])
}

/// Everything before the first occurrence of `pat`.
pub fn until<'a>(s: &'a str, pat: &str) -> Option<&'a str> {
    s.find(pat).map(|pos| &s[..pos])
}

/// Drop every `<...>` run. Unclosed tags swallow the rest of the input.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
