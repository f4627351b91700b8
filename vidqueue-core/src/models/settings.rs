use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub advanced: AdvancedSettings,
    #[serde(default)]
    pub ytdl: YtdlSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_address")]
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloaderBackend {
    /// Shell out to the `ytdl` executable for the whole download.
    Process,
    /// Resolve metadata, then stream the selected formats in-process.
    Stream,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_quality")]
    pub default_quality: String,
    #[serde(default = "default_backend")]
    pub backend: DownloaderBackend,
    #[serde(default = "default_true")]
    pub cleanup_fragments: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtdlSettings {
    #[serde(default = "default_ytdl_executable")]
    pub executable: String,
    #[serde(default = "default_true")]
    pub auto_install: bool,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Newest settings layout this build understands.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_address() -> String {
    "0.0.0.0:1234".into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Downloads")
}

pub fn default_quality() -> String {
    "hd720".into()
}

fn default_backend() -> DownloaderBackend {
    DownloaderBackend::Process
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_ytdl_executable() -> String {
    "ytdl".into()
}

fn default_true() -> bool {
    true
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            default_quality: default_quality(),
            backend: default_backend(),
            cleanup_fragments: true,
        }
    }
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for YtdlSettings {
    fn default() -> Self {
        Self {
            executable: default_ytdl_executable(),
            auto_install: true,
            download_url: None,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            server: ServerSettings::default(),
            download: DownloadSettings::default(),
            advanced: AdvancedSettings::default(),
            ytdl: YtdlSettings::default(),
        }
    }
}
