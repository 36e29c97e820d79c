use serde_json::Value;
use shared::protocol::{ChatResponse, Citation, ConfigResponse, OcrResponse};

pub const CITATION_SEPARATOR: &str = " — page ";
pub const OCR_FAILURE_PREFIX: &str = "OCR failed: ";
pub const OCR_GENERIC_FAILURE: &str = "OCR request failed.";
pub const CONFIG_FAILURE_PREFIX: &str = "Config error: ";
pub const CONFIG_GENERIC_FAILURE: &str = "Could not load config.";

/// Contents of the answer output region. `Default` is the cleared state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerView {
    pub answer: String,
    pub error: String,
    pub citations: Vec<String>,
}

/// Final path component, accepting `\` and `/` separators in the same string.
pub fn basename(path: &str) -> &str {
    path.rsplit(|c: char| c == '\\' || c == '/')
        .next()
        .unwrap_or(path)
}

pub fn format_citation(citation: &Citation) -> String {
    format!(
        "{}{CITATION_SEPARATOR}{}",
        basename(&citation.source),
        citation.page
    )
}

pub fn render_chat(response: &ChatResponse) -> AnswerView {
    AnswerView {
        answer: response.answer.clone().unwrap_or_default(),
        error: response.error.clone().unwrap_or_default(),
        citations: response.sources.iter().map(format_citation).collect(),
    }
}

pub fn render_ocr(response: &OcrResponse) -> String {
    response.text.clone().unwrap_or_default()
}

/// Two-space indented JSON, keys in the order the backend sent them.
pub fn render_config(config: &ConfigResponse) -> String {
    let value = Value::Object(config.clone());
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

pub fn failure_message(prefix: &str, detail: Option<&str>, generic: &str) -> String {
    match detail.filter(|detail| !detail.is_empty()) {
        Some(detail) => format!("{prefix}{detail}"),
        None => format!("{prefix}{generic}"),
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::Page;

    use super::*;

    #[test]
    fn basename_handles_both_separators() {
        assert_eq!(basename("C:\\docs\\a\\b.pdf"), "b.pdf");
        assert_eq!(basename("/docs/a/b.pdf"), "b.pdf");
        assert_eq!(basename("b.pdf"), "b.pdf");
        assert_eq!(basename("C:\\docs/mixed\\dir/b.pdf"), "b.pdf");
        assert_eq!(basename("docs/"), "");
    }

    #[test]
    fn basename_is_idempotent() {
        for path in ["C:\\docs\\a\\b.pdf", "/docs/a/b.pdf", "b.pdf", "x/y\\z"] {
            let once = basename(path);
            assert_eq!(basename(once), once);
        }
    }

    #[test]
    fn citations_keep_order_and_format() {
        let response = ChatResponse {
            answer: Some("42".into()),
            error: None,
            sources: vec![
                Citation::new("C:\\pdfs\\machines.pdf", 12),
                Citation::new("/srv/pdfs/power.pdf", Page::from("iv")),
                Citation::new("notes.pdf", 1),
            ],
        };

        let view = render_chat(&response);
        assert_eq!(
            view.citations,
            vec![
                "machines.pdf — page 12".to_string(),
                "power.pdf — page iv".to_string(),
                "notes.pdf — page 1".to_string(),
            ]
        );
    }

    #[test]
    fn answer_and_error_render_together() {
        let response = ChatResponse {
            answer: Some("42".into()),
            error: Some("low confidence".into()),
            sources: Vec::new(),
        };
        let view = render_chat(&response);
        assert_eq!(view.answer, "42");
        assert_eq!(view.error, "low confidence");
        assert!(view.citations.is_empty());
    }

    #[test]
    fn config_round_trips_through_pretty_text() {
        let config: ConfigResponse =
            serde_json::from_str(r#"{"mode": "fast", "topK": 5}"#).expect("config");
        let rendered = render_config(&config);
        assert_eq!(rendered, "{\n  \"mode\": \"fast\",\n  \"topK\": 5\n}");

        let reparsed: ConfigResponse = serde_json::from_str(&rendered).expect("reparse");
        assert_eq!(reparsed, config);
    }

    #[test]
    fn failure_message_prefers_server_detail() {
        assert_eq!(
            failure_message(OCR_FAILURE_PREFIX, Some("unsupported format"), OCR_GENERIC_FAILURE),
            "OCR failed: unsupported format"
        );
        assert_eq!(
            failure_message(OCR_FAILURE_PREFIX, None, OCR_GENERIC_FAILURE),
            "OCR failed: OCR request failed."
        );
    }
}
