use super::FieldValue;
use crate::parser::Anomaly;

const OPEN: &str = "<span>";
const CLOSE: &str = "</span>";

/// Every inline name span in document order, duplicates preserved: the
/// same person may teach several groups.
pub fn extract(body: &str, _diags: &mut Vec<Anomaly>) -> FieldValue {
    let mut names = Vec::new();
    let mut rest = body;

    while let Some(open) = rest.find(OPEN) {
        let Some(close) = rest.find(CLOSE) else { break };
        if close > open {
            names.push(rest[open + OPEN.len()..close].trim().to_string());
        }
        rest = &rest[close + CLOSE.len()..];
    }

    FieldValue::Names(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(body: &str) -> Vec<String> {
        let mut diags = Vec::new();
        match extract(body, &mut diags) {
            FieldValue::Names(names) => names,
            other => panic!("expected names, got {:?}", other),
        }
    }

    #[test]
    fn order_and_duplicates_preserved() {
        let body = "<ul><li><span>Ana Gruber</span></li>\
                    <li><span>Jan Novak</span></li>\
                    <li><span>Ana Gruber</span></li></ul>";
        assert_eq!(names(body), ["Ana Gruber", "Jan Novak", "Ana Gruber"]);
    }

    #[test]
    fn stray_closing_span_skipped() {
        // The stray close sits before the open; the scan advances past it
        // and the remaining pair is still picked up.
        let body = "</span>x<span>Jan Novak</span>";
        assert_eq!(names(body), ["Jan Novak"]);
    }

    #[test]
    fn unclosed_span_terminates() {
        assert_eq!(names("<span>Ana Gruber"), Vec::<String>::new().as_slice());
    }
}
