use std::path::{Path, PathBuf};

use vidqueue_core::fs_paths::app_data_dir;

use vidqueue_core::models::settings::{AppSettings, SCHEMA_VERSION};

const SETTINGS_FILE: &str = "settings.json";

pub fn settings_path() -> PathBuf {
    if let Ok(path) = std::env::var("VIDQUEUE_CONFIG") {
        return PathBuf::from(path);
    }
    app_data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SETTINGS_FILE)
}

/// Reads settings from `path`. A missing or unreadable file yields defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AppSettings::default(),
        Err(e) => {
            tracing::warn!("failed to read settings {}: {}", path.display(), e);
            return AppSettings::default();
        }
    };

    match serde_json::from_str::<AppSettings>(&raw) {
        Ok(settings) => {
            if settings.schema_version > SCHEMA_VERSION {
                tracing::warn!(
                    "settings {} use schema {}, newer than {}; unknown fields are ignored",
                    path.display(),
                    settings.schema_version,
                    SCHEMA_VERSION
                );
            }
            settings
        }
        Err(e) => {
            tracing::warn!("invalid settings {}, using defaults: {}", path.display(), e);
            AppSettings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn apply_env_overrides(settings: &mut AppSettings) {
    if let Ok(addr) = std::env::var("VIDQUEUE_ADDR") {
        if !addr.trim().is_empty() {
            settings.server.address = addr.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidqueue_core::models::settings::DownloaderBackend;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("nope.json"));
        assert_eq!(settings.server.address, "0.0.0.0:1234");
        assert_eq!(settings.download.backend, DownloaderBackend::Process);
    }

    #[test]
    fn garbage_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings(&path).advanced.max_retries, 10);
    }

    #[test]
    fn newer_schema_still_loads_known_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "schema_version": 7, "advanced": { "max_retries": 4 }, "future": true }"#,
        )
        .unwrap();
        let settings = load_settings(&path);
        assert_eq!(settings.schema_version, 7);
        assert_eq!(settings.advanced.max_retries, 4);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = AppSettings::default();
        settings.download.backend = DownloaderBackend::Stream;
        settings.advanced.max_retries = 3;
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path);
        assert_eq!(loaded.download.backend, DownloaderBackend::Stream);
        assert_eq!(loaded.advanced.max_retries, 3);
    }
}
