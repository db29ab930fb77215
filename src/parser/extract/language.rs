use super::FieldValue;
use crate::parser::Anomaly;

/// The language section embeds the semester selection form right after
/// the prose; everything ahead of it is the value.
const FORM_MARKER: &str = "<input type=\"hidden\" name=";

pub fn extract(body: &str, _diags: &mut Vec<Anomaly>) -> FieldValue {
    let text = match body.find(FORM_MARKER) {
        Some(pos) => &body[..pos],
        None => body,
    };
    FieldValue::Text(text.trim().to_string())
}
