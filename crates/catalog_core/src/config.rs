use std::{collections::HashMap, fs, path::Path};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://vpic.nhtsa.dot.gov/api/vehicles";
pub const DEFAULT_SETTINGS_FILE: &str = "catalog.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogSettings {
    pub base_url: String,
    pub event_capacity: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            event_capacity: 1024,
        }
    }
}

pub fn load_settings() -> CatalogSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file when it parses, then environment overrides.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> CatalogSettings {
    let mut settings = CatalogSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match parse_settings_file(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("base_url") {
                    settings.base_url = v.clone();
                }
                if let Some(v) = file_cfg.get("event_capacity") {
                    apply_capacity(&mut settings, v);
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable settings file");
            }
        }
    }

    if let Some(v) = env("VPIC_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = env("APP__BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = env("APP__EVENT_CAPACITY") {
        apply_capacity(&mut settings, &v);
    }

    settings
}

fn parse_settings_file(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let table: toml::Table = toml::from_str(raw).context("invalid TOML")?;
    Ok(table
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                _ => return None,
            };
            Some((key, value))
        })
        .collect())
}

fn apply_capacity(settings: &mut CatalogSettings, raw: &str) {
    match raw.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => settings.event_capacity = parsed,
        _ => tracing::warn!(value = raw, "ignoring invalid event capacity"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
