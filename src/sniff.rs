//! Best-effort model sniffing for batch-style uploads.
//!
//! A batch file is newline-delimited JSON, one request per line, and by
//! convention every line targets the same model. Only the first line is
//! inspected so large uploads stay cheap; every failure path degrades to
//! "no model found" because sniffing must never abort the request.

use serde_json::Value;

/// Parses the first line of the upload as a JSON object.
pub fn first_json_object(bytes: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(bytes).ok()?;
    let first_line = text.lines().next()?.trim();
    let value: Value = serde_json::from_str(first_line).ok()?;
    value.is_object().then_some(value)
}

/// Extracts the declared target model (`body.model`) from a parsed record.
pub fn model_from_json_object(object: &Value) -> Option<String> {
    object
        .get("body")?
        .get("model")?
        .as_str()
        .map(str::to_string)
}

pub fn sniff_model(bytes: &[u8]) -> Option<String> {
    first_json_object(bytes)
        .as_ref()
        .and_then(model_from_json_object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_model_from_first_line() {
        let file = b"{\"custom_id\": \"1\", \"body\": {\"model\": \"gpt-4\"}}\nnot json at all\n";
        assert_eq!(sniff_model(file).as_deref(), Some("gpt-4"));
    }

    #[test]
    fn later_lines_never_matter() {
        let file = b"{\"body\": {\"model\": \"gpt-4o\"}}\n{\"body\": {\"model\": \"other\"}}\n";
        assert_eq!(sniff_model(file).as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn invalid_utf8_yields_none() {
        assert_eq!(sniff_model(&[0xff, 0xfe, 0x80]), None);
    }

    #[test]
    fn non_json_first_line_yields_none() {
        assert_eq!(sniff_model(b"purpose,model\nbatch,gpt-4\n"), None);
    }

    #[test]
    fn empty_file_yields_none() {
        assert_eq!(sniff_model(b""), None);
    }

    #[test]
    fn json_array_first_line_yields_none() {
        assert_eq!(sniff_model(b"[1, 2, 3]\n"), None);
    }

    #[test]
    fn missing_body_or_model_yields_none() {
        assert_eq!(sniff_model(b"{\"model\": \"gpt-4\"}\n"), None);
        assert_eq!(sniff_model(b"{\"body\": {}}\n"), None);
        assert_eq!(sniff_model(b"{\"body\": {\"model\": 7}}\n"), None);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let file = b"   {\"body\": {\"model\": \"gpt-4\"}}   \r\nrest\n";
        assert_eq!(sniff_model(file).as_deref(), Some("gpt-4"));
    }
}
