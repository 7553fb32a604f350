use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::NauticaError;

pub const DEFAULT_CONFIG_FILE: &str = "nautica.json";
pub const DEFAULT_DEST: &str = "./nautica";
pub const DEFAULT_BASE_URL: &str = "https://ksm.dev";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_STALE_THRESHOLD: u32 = 5;
pub const DEFAULT_SKEW_HOURS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Shell out to `unar`, which honors the archive's filename encoding.
    #[default]
    Unar,
    /// Extract in-process with the bundled zip reader.
    Builtin,
}

/// Optional `nautica.json` settings file. Every field may be omitted.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub extractor: Option<ExtractorKind>,
    #[serde(default)]
    pub filename_encoding: Option<String>,
    #[serde(default)]
    pub stale_threshold: Option<u32>,
    #[serde(default)]
    pub skew_hours: Option<i64>,
}

/// Values given on the command line; they win over the settings file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub dest: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub extractor: Option<ExtractorKind>,
    pub filename_encoding: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub dest: Utf8PathBuf,
    pub base_url: String,
    pub timeout: Duration,
    pub extractor: ExtractorKind,
    pub filename_encoding: Option<String>,
    pub stale_threshold: u32,
    pub skew_hours: i64,
}

impl Default for ResolvedSettings {
    fn default() -> Self {
        Self {
            dest: Utf8PathBuf::from(DEFAULT_DEST),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            extractor: ExtractorKind::Unar,
            filename_encoding: None,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            skew_hours: DEFAULT_SKEW_HOURS,
        }
    }
}

pub struct SettingsLoader;

impl SettingsLoader {
    /// Loads the settings file at `path`, or `nautica.json` in the current
    /// directory when it exists, and applies `overrides` on top.
    pub fn resolve(
        path: Option<&str>,
        overrides: SettingsOverrides,
    ) -> Result<ResolvedSettings, NauticaError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let settings = if path.is_none() && !config_path.exists() {
            Settings::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| NauticaError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| NauticaError::ConfigParse(err.to_string()))?
        };

        Self::resolve_settings(settings, overrides)
    }

    pub fn resolve_settings(
        settings: Settings,
        overrides: SettingsOverrides,
    ) -> Result<ResolvedSettings, NauticaError> {
        let defaults = ResolvedSettings::default();

        let dest = overrides
            .dest
            .or(settings.dest)
            .map(Utf8PathBuf::from)
            .unwrap_or(defaults.dest);
        let base_url = overrides
            .base_url
            .or(settings.base_url)
            .unwrap_or(defaults.base_url);
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(NauticaError::ConfigParse(format!(
                "base_url must be an http(s) URL: {base_url}"
            )));
        }
        let timeout = overrides
            .timeout_secs
            .or(settings.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let stale_threshold = settings
            .stale_threshold
            .unwrap_or(defaults.stale_threshold);
        if stale_threshold == 0 {
            return Err(NauticaError::ConfigParse(
                "stale_threshold must be at least 1".to_string(),
            ));
        }
        let filename_encoding = overrides
            .filename_encoding
            .or(settings.filename_encoding)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(ResolvedSettings {
            dest,
            base_url,
            timeout,
            extractor: overrides
                .extractor
                .or(settings.extractor)
                .unwrap_or(defaults.extractor),
            filename_encoding,
            stale_threshold,
            skew_hours: settings.skew_hours.unwrap_or(defaults.skew_hours),
        })
    }
}
