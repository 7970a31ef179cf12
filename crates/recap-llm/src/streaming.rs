use serde_json::Value;

const CONTENT_POINTER: &str = "/choices/0/delta/content";
const FINISH_REASON_POINTER: &str = "/choices/0/finish_reason";

/// Result of extracting the text fragment from one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// Text fragment, possibly empty
    Text {
        content: String,
        finish_reason: Option<String>,
    },
    /// Payload was not JSON; skip it
    Drop,
}

impl Extracted {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { content, .. } => Some(content),
            Self::Drop => None,
        }
    }
}

/// Pull the incremental text out of one `data:` payload body
pub fn extract_delta(data: &str) -> Extracted {
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "dropping non-JSON SSE payload");
            return Extracted::Drop;
        }
    };

    // Sibling fields are never typed, so a numeric id or string index is fine
    let content = value
        .pointer(CONTENT_POINTER)
        .and_then(Value::as_str)
        .unwrap_or_default();
    let finish_reason = value
        .pointer(FINISH_REASON_POINTER)
        .and_then(Value::as_str);

    Extracted::Text {
        content: content.to_string(),
        finish_reason: finish_reason.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_content() {
        let extracted = extract_delta(r#"{"choices":[{"delta":{"content":"He"}}]}"#);
        assert_eq!(extracted.text(), Some("He"));
    }

    #[test]
    fn test_invalid_json_is_dropped() {
        assert_eq!(extract_delta("{not json"), Extracted::Drop);
        assert_eq!(extract_delta(""), Extracted::Drop);
    }

    #[test]
    fn test_missing_content_is_empty_delta() {
        let extracted = extract_delta(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#);
        assert_eq!(extracted.text(), Some(""));

        let extracted = extract_delta(r#"{"choices":[]}"#);
        assert_eq!(extracted.text(), Some(""));
    }

    #[test]
    fn test_non_string_content_is_empty_delta() {
        let extracted = extract_delta(r#"{"choices":[{"delta":{"content":42}}]}"#);
        assert_eq!(extracted.text(), Some(""));

        let extracted = extract_delta(r#"{"choices":[{"delta":{"content":null}}]}"#);
        assert_eq!(extracted.text(), Some(""));
    }

    #[test]
    fn test_retyped_sibling_fields_keep_content() {
        let extracted = extract_delta(r#"{"id":7,"choices":[{"delta":{"content":"Hi"}}]}"#);
        assert_eq!(extracted.text(), Some("Hi"));

        let extracted = extract_delta(r#"{"choices":[{"index":"0","delta":{"content":"Hi"}}]}"#);
        assert_eq!(extracted.text(), Some("Hi"));

        let extracted = extract_delta(r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":1}]}"#);
        assert_eq!(
            extracted,
            Extracted::Text {
                content: "Hi".to_string(),
                finish_reason: None,
            }
        );
    }

    #[test]
    fn test_unexpected_shape_is_empty_delta() {
        assert_eq!(extract_delta("[1,2,3]").text(), Some(""));
        assert_eq!(extract_delta(r#"{"choices":"nope"}"#).text(), Some(""));
    }

    #[test]
    fn test_finish_reason_is_reported() {
        let extracted =
            extract_delta(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#);

        assert_eq!(
            extracted,
            Extracted::Text {
                content: String::new(),
                finish_reason: Some("stop".to_string()),
            }
        );
    }
}
