use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    Bn,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Bn => "bn",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "bn" | "bengali" | "bangla" => Ok(Language::Bn),
            other => Err(format!("unsupported language '{other}' (expected en or bn)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Answer the question from the indexed sources.
    #[default]
    Answer,
    /// Evaluate and correct the accompanying user solution.
    Check,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Answer => "answer",
            Mode::Check => "check",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "answer" => Ok(Mode::Answer),
            "check" => Ok(Mode::Check),
            other => Err(format!("unsupported mode '{other}' (expected answer or check)")),
        }
    }
}

/// Page reference attached to a citation. Backends send either a page number or a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Page {
    Number(i64),
    Label(String),
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Page::Number(n) => write!(f, "{n}"),
            Page::Label(label) => f.write_str(label),
        }
    }
}

impl From<i64> for Page {
    fn from(value: i64) -> Self {
        Page::Number(value)
    }
}

impl From<&str> for Page {
    fn from(value: &str) -> Self {
        Page::Label(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_and_mode_use_lowercase_wire_values() {
        assert_eq!(serde_json::to_string(&Language::Bn).expect("json"), "\"bn\"");
        assert_eq!(serde_json::to_string(&Mode::Check).expect("json"), "\"check\"");
        assert_eq!("English".parse::<Language>(), Ok(Language::En));
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn page_accepts_numbers_and_labels() {
        let number: Page = serde_json::from_str("12").expect("number");
        let label: Page = serde_json::from_str("\"iv\"").expect("label");
        assert_eq!(number, Page::Number(12));
        assert_eq!(label.to_string(), "iv");
    }
}
