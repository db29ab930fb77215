use super::FieldValue;
use crate::parser::Anomaly;

/// Plain prose section: drop line breaks, trim. Cosmetic class attributes
/// are already removed by the assembler before dispatch.
pub fn extract(body: &str, _diags: &mut Vec<Anomaly>) -> FieldValue {
    FieldValue::Text(body.replace('\n', "").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_breaks_dropped_and_trimmed() {
        let mut diags = Vec::new();
        let value = extract("  <p>Weekly\nexercises</p>\n ", &mut diags);
        assert_eq!(value, FieldValue::Text("<p>Weeklyexercises</p>".to_string()));
        assert!(diags.is_empty());
    }

    #[test]
    fn empty_body() {
        let mut diags = Vec::new();
        assert_eq!(extract("\n \n", &mut diags), FieldValue::Text(String::new()));
    }
}
