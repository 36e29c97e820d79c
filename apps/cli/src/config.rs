use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::Language;
use tracing::warn;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Raw top-k text, parsed the same way as the form control.
    pub default_top_k: Option<String>,
    pub language: Language,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            request_timeout_secs: 120,
            default_top_k: None,
            language: Language::En,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    top_k: Option<i64>,
    language: Option<String>,
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid backend url '{}'", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!(
                "backend url '{}' must use http or https, not '{}'",
                self.base_url,
                url.scheme()
            );
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request timeout must be at least one second");
        }
        Ok(())
    }

    /// All-or-nothing: an invalid field leaves every setting untouched.
    fn apply_file(&mut self, raw: &str) -> anyhow::Result<()> {
        let file_cfg: FileSettings = toml::from_str(raw).context("malformed settings file")?;
        let language = file_cfg
            .language
            .map(|v| {
                v.parse::<Language>()
                    .map_err(|err: String| anyhow::anyhow!(err))
                    .context("invalid language in settings file")
            })
            .transpose()?;

        if let Some(v) = file_cfg.base_url {
            self.base_url = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file_cfg.top_k {
            self.default_top_k = Some(v.to_string());
        }
        if let Some(v) = language {
            self.language = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TUTOR_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("APP__BASE_URL") {
            self.base_url = v;
        }

        if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
            match v.parse::<u64>() {
                Ok(parsed) => self.request_timeout_secs = parsed,
                Err(_) => warn!(value = %v, "ignoring non-numeric APP__REQUEST_TIMEOUT_SECS"),
            }
        }

        if let Some(v) = lookup("APP__TOP_K") {
            self.default_top_k = Some(v);
        }

        if let Some(v) = lookup("APP__LANGUAGE") {
            match v.parse::<Language>() {
                Ok(language) => self.language = language,
                Err(err) => warn!(%err, "ignoring APP__LANGUAGE"),
            }
        }
    }
}

/// Defaults, then the optional settings file, then environment overrides.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Err(err) = settings.apply_file(&raw) {
            warn!(path = %path.display(), error = %format!("{err:#}"), "ignoring settings file");
        }
    }

    settings.apply_env(|key| std::env::var(key).ok());
    settings
}
