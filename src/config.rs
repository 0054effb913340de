use anyhow::{Context, Result};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Gemini connection settings. `api_key: None` runs the client in demo mode.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub analysis_model: String,
    pub trend_model: String,
    pub image_model: String,
    pub timeout: Duration,
    /// Language the stylist answers in.
    pub language: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            analysis_model: "gemini-3-pro-preview".into(),
            trend_model: "gemini-2.5-flash".into(),
            image_model: "gemini-2.5-flash-image".into(),
            timeout: Duration::from_secs(120),
            language: "Brazilian Portuguese".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StylistConfig {
    pub host: String,
    pub port: u16,
    pub store_path: PathBuf,
    pub max_upload_bytes: usize,
    pub gemini: GeminiSettings,
}

impl StylistConfig {
    /// | Env Var                 | Default                                            |
    /// |-------------------------|----------------------------------------------------|
    /// | `HOST`                  | `0.0.0.0`                                          |
    /// | `PORT`                  | `8080`                                             |
    /// | `STYLIST_STORE_PATH`    | `data/saved-looks`                                 |
    /// | `MAX_UPLOAD_BYTES`      | `20971520`                                         |
    /// | `GEMINI_API_KEY`        | unset (demo mode)                                  |
    /// | `GEMINI_API_BASE`       | `https://generativelanguage.googleapis.com/v1beta` |
    /// | `GEMINI_ANALYSIS_MODEL` | `gemini-3-pro-preview`                             |
    /// | `GEMINI_TREND_MODEL`    | `gemini-2.5-flash`                                 |
    /// | `GEMINI_IMAGE_MODEL`    | `gemini-2.5-flash-image`                           |
    /// | `GEMINI_TIMEOUT_SECS`   | `120`                                              |
    /// | `STYLIST_LANGUAGE`      | `Brazilian Portuguese`                             |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = GeminiSettings::default();
        let text = |key: &str, default: String| lookup(key).filter(|v| !v.trim().is_empty()).unwrap_or(default);

        let gemini = GeminiSettings {
            api_key: lookup("GEMINI_API_KEY").filter(|v| !v.trim().is_empty()),
            base_url: text("GEMINI_API_BASE", defaults.base_url),
            analysis_model: text("GEMINI_ANALYSIS_MODEL", defaults.analysis_model),
            trend_model: text("GEMINI_TREND_MODEL", defaults.trend_model),
            image_model: text("GEMINI_IMAGE_MODEL", defaults.image_model),
            timeout: Duration::from_secs(parse_or(&lookup, "GEMINI_TIMEOUT_SECS", defaults.timeout.as_secs())?),
            language: text("STYLIST_LANGUAGE", defaults.language),
        };

        Ok(Self {
            host: text("HOST", "0.0.0.0".into()),
            port: parse_or(&lookup, "PORT", 8080)?,
            store_path: PathBuf::from(text("STYLIST_STORE_PATH", "data/saved-looks".into())),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            gemini,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        _ => Ok(default),
    }
}
