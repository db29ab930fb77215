use super::FieldValue;
use crate::parser::{html, Anomaly};

const ITEM_MARKER: &str = "<li><a href=";

/// The owning institute is the first link body after the list-item marker.
pub fn extract(body: &str, _diags: &mut Vec<Anomaly>) -> FieldValue {
    let Some(rest) = html::after(body, ITEM_MARKER) else {
        return FieldValue::Unparsed;
    };
    let Some(rest) = html::after(rest, ">") else {
        return FieldValue::Unparsed;
    };
    let Some(name) = html::until(rest, "<") else {
        return FieldValue::Unparsed;
    };
    FieldValue::Text(name.replace('\n', "").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_body_after_list_item() {
        let mut diags = Vec::new();
        let body = "<ul><li><a href=\"/adressbuch/orgeinheit/1234\">\
                    E185 Institute of Computer Languages</a></li></ul>";
        assert_eq!(
            extract(body, &mut diags),
            FieldValue::Text("E185 Institute of Computer Languages".to_string())
        );
    }

    #[test]
    fn missing_marker_is_unparsed() {
        let mut diags = Vec::new();
        assert_eq!(extract("<p>no list here</p>", &mut diags), FieldValue::Unparsed);
    }
}
