use std::{fs, path::Path, str::FromStr, time::Duration};

use anyhow::{bail, Context};
use client_core::{FallbackPolicy, ProgressSettings, SelectionOptions};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "facefind.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub service_url: String,
    pub request_timeout_secs: u64,
    pub default_tolerance: f64,
    pub max_files: usize,
    pub max_file_size: u64,
    pub gallery_fallback: bool,
    pub remote_delete: bool,
    pub progress_step: u8,
    pub progress_tick_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:5000".into(),
            request_timeout_secs: 60,
            default_tolerance: shared::protocol::DEFAULT_TOLERANCE,
            max_files: client_core::selection::DEFAULT_MAX_FILES,
            max_file_size: client_core::selection::DEFAULT_MAX_FILE_SIZE,
            gallery_fallback: true,
            remote_delete: false,
            progress_step: client_core::progress::DEFAULT_PROGRESS_STEP,
            progress_tick_ms: 200,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn selection_options(&self, multiple: bool) -> SelectionOptions {
        SelectionOptions {
            multiple,
            max_files: self.max_files,
            max_size: self.max_file_size,
            ..SelectionOptions::default()
        }
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        if self.gallery_fallback {
            FallbackPolicy::DemoPhotos
        } else {
            FallbackPolicy::Disabled
        }
    }

    pub fn progress(&self) -> ProgressSettings {
        ProgressSettings {
            step: self.progress_step,
            tick: Duration::from_millis(self.progress_tick_ms),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    service_url: Option<String>,
    request_timeout_secs: Option<u64>,
    default_tolerance: Option<f64>,
    max_files: Option<usize>,
    max_file_size: Option<u64>,
    gallery_fallback: Option<bool>,
    remote_delete: Option<bool>,
    progress_step: Option<u8>,
    progress_tick_ms: Option<u64>,
}

/// Defaults, then `facefind.toml` (or `path`), then environment overrides.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    validate(&settings)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file.service_url {
        settings.service_url = v;
    }
    if let Some(v) = file.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file.default_tolerance {
        settings.default_tolerance = v;
    }
    if let Some(v) = file.max_files {
        settings.max_files = v;
    }
    if let Some(v) = file.max_file_size {
        settings.max_file_size = v;
    }
    if let Some(v) = file.gallery_fallback {
        settings.gallery_fallback = v;
    }
    if let Some(v) = file.remote_delete {
        settings.remote_delete = v;
    }
    if let Some(v) = file.progress_step {
        settings.progress_step = v;
    }
    if let Some(v) = file.progress_tick_ms {
        settings.progress_tick_ms = v;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("FACEFIND_SERVICE_URL") {
        settings.service_url = v;
    }
    if let Some(v) = lookup("APP__SERVICE_URL") {
        settings.service_url = v;
    }
    parse_env(&lookup, "APP__REQUEST_TIMEOUT_SECS", &mut settings.request_timeout_secs)?;
    parse_env(&lookup, "APP__DEFAULT_TOLERANCE", &mut settings.default_tolerance)?;
    parse_env(&lookup, "APP__MAX_FILES", &mut settings.max_files)?;
    parse_env(&lookup, "APP__MAX_FILE_SIZE", &mut settings.max_file_size)?;
    parse_env(&lookup, "APP__GALLERY_FALLBACK", &mut settings.gallery_fallback)?;
    parse_env(&lookup, "APP__REMOTE_DELETE", &mut settings.remote_delete)?;
    Ok(())
}

fn parse_env<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> anyhow::Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value '{raw}' for {key}"))?;
    }
    Ok(())
}

fn validate(settings: &Settings) -> anyhow::Result<()> {
    if settings.service_url.trim().is_empty() {
        bail!("service_url must not be empty");
    }
    if settings.max_files == 0 {
        bail!("max_files must be at least 1");
    }
    if settings.progress_step == 0 {
        bail!("progress_step must be at least 1");
    }
    if settings.progress_tick_ms == 0 {
        bail!("progress_tick_ms must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
