use serde::Deserialize;

/// Body carried by failing OCR and config responses: `{"error": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Best-effort extraction of the `error` field. Bodies that are not JSON objects,
    /// or that carry an empty message, yield `None`.
    pub fn detail_from_slice(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.error)
            .filter(|message| !message.is_empty())
    }
}
