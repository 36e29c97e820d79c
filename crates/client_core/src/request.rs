use std::path::Path;

use reqwest::Method;
use shared::{
    domain::{Language, Mode},
    protocol::{ChatRequest, RetrieveRequest},
};

use crate::error::{ImageReadError, ValidationError};

pub const DEFAULT_TOP_K: i64 = 5;
pub const OCR_FIELD: &str = "image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Chat,
    Ocr,
    Config,
    Health,
    Reindex,
    Retrieve,
}

impl Endpoint {
    pub fn method(self) -> Method {
        match self {
            Endpoint::Config | Endpoint::Health => Method::GET,
            Endpoint::Chat | Endpoint::Ocr | Endpoint::Reindex | Endpoint::Retrieve => Method::POST,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Chat => "/api/chat",
            Endpoint::Ocr => "/api/ocr",
            Endpoint::Config => "/api/config",
            Endpoint::Health => "/api/health",
            Endpoint::Reindex => "/api/reindex",
            Endpoint::Retrieve => "/api/retrieve",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Chat => "chat",
            Endpoint::Ocr => "ocr",
            Endpoint::Config => "config",
            Endpoint::Health => "health",
            Endpoint::Reindex => "reindex",
            Endpoint::Retrieve => "retrieve",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub question: String,
    pub solution: String,
    pub language: Language,
    pub show_steps: bool,
    pub mode: Mode,
    /// Unparsed text of the top-k control; `None` when the control is absent.
    pub top_k: Option<String>,
}

impl FormState {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ImageReadError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| ImageReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image.bin")
            .to_string();
        let mime_type = mime_guess::from_path(path).first_raw().map(str::to_string);
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrRequest {
    pub image: ImageFile,
}

pub fn build_chat_request(form: &FormState) -> Result<ChatRequest, ValidationError> {
    let query = form.question.trim();
    if query.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }

    Ok(ChatRequest {
        query: query.to_string(),
        solution: form.solution.trim().to_string(),
        language: form.language,
        show_steps: form.show_steps,
        mode: form.mode,
        top_k: parse_top_k(form.top_k.as_deref()),
    })
}

/// Uses the first selected file; an empty selection never reaches the network.
pub fn build_ocr_request(files: &[ImageFile]) -> Result<OcrRequest, ValidationError> {
    let image = files.first().ok_or(ValidationError::NoImageSelected)?;
    if files.len() > 1 {
        tracing::debug!(selected = files.len(), "multiple images selected; using the first");
    }
    Ok(OcrRequest {
        image: image.clone(),
    })
}

pub fn build_retrieve_request(
    query: &str,
    top_k: Option<&str>,
) -> Result<RetrieveRequest, ValidationError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    Ok(RetrieveRequest {
        query: query.to_string(),
        top_k: parse_top_k(top_k),
    })
}

/// Integer-prefix parse of the top-k control. Trailing text is ignored (`"7 docs"` is 7);
/// no digits, zero, or a value out of range falls back to [`DEFAULT_TOP_K`]. Negative
/// values are left to the backend.
pub fn parse_top_k(raw: Option<&str>) -> i64 {
    raw.and_then(parse_integer_prefix)
        .filter(|top_k| *top_k != 0)
        .unwrap_or(DEFAULT_TOP_K)
}

fn parse_integer_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = unsigned[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
