use crate::ffprobe_reader::DEFAULT_FFPROBE_TIMEOUT_SECS;
use crate::heuristic::DEFAULT_WINDOW_SECS;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub max_filename_len: usize,
    pub heuristic_window_secs: i64,
    pub extractor: ExtractorConfig,
    pub geocoder: GeocoderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_filename_len: DEFAULT_MAX_FILENAME_LEN,
            heuristic_window_secs: DEFAULT_WINDOW_SECS,
            extractor: ExtractorConfig::default(),
            geocoder: GeocoderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractorConfig {
    /// ffprobe is killed after this long on a single file.
    pub ffprobe_timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ffprobe_timeout_secs: DEFAULT_FFPROBE_TIMEOUT_SECS,
        }
    }
}

impl ExtractorConfig {
    pub fn ffprobe_timeout(&self) -> Duration {
        Duration::from_secs(self.ffprobe_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub user_agent: String,
    pub language: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub min_interval_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org/reverse".to_string(),
            user_agent: concat!("geotag-renamer/", env!("CARGO_PKG_VERSION")).to_string(),
            language: "en".to_string(),
            timeout_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 1000,
            min_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "geotag", "geotag-renamer")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    Ok(AppPaths {
        config_path: proj.config_dir().join("config.toml"),
    })
}

/// Loads `path`, or the OS config location when `path` is `None`. A missing
/// default file yields defaults; an explicitly named one must exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default_path = app_paths()?.config_path;
            if !default_path.exists() {
                return Ok(AppConfig::default());
            }
            default_path
        }
    };

    let raw = fs::read_to_string(&config_path).with_context(|| {
        format!(
            "設定ファイルを読めませんでした: {}",
            config_path.display()
        )
    })?;

    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<AppConfig> {
    let config = toml::from_str::<AppConfig>(raw).context("設定ファイルのパースに失敗しました")?;
    if config.extractor.ffprobe_timeout_secs == 0 {
        anyhow::bail!("extractor.ffprobe_timeout_secs は1以上にしてください");
    }
    if config.max_filename_len < 16 {
        anyhow::bail!(
            "max_filename_len が小さすぎます: {}",
            config.max_filename_len
        );
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let config = parse_config(
            r#"
max_filename_len = 200

[geocoder]
language = "ja"
min_interval_ms = 1500
"#,
        )
        .expect("parse");

        assert_eq!(config.max_filename_len, 200);
        assert_eq!(config.heuristic_window_secs, 3600);
        assert_eq!(config.geocoder.language, "ja");
        assert_eq!(config.geocoder.min_interval_ms, 1500);
        assert_eq!(config.geocoder.max_retries, 2);
        assert!(config.geocoder.enabled);
        assert_eq!(config.extractor.ffprobe_timeout_secs, 30);
    }

    #[test]
    fn ffprobe_timeout_sits_beside_geocoder_settings() {
        let config = parse_config(
            r#"
[extractor]
ffprobe_timeout_secs = 5

[geocoder]
timeout_secs = 3
"#,
        )
        .expect("parse");

        assert_eq!(config.extractor.ffprobe_timeout(), Duration::from_secs(5));
        assert_eq!(config.geocoder.timeout_secs, 3);
        assert!(parse_config("[extractor]\nffprobe_timeout_secs = 0\n").is_err());
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(parse_config("").expect("parse"), AppConfig::default());
    }

    #[test]
    fn rejects_unusably_small_ceiling() {
        assert!(parse_config("max_filename_len = 4").is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_config(Some(&temp.path().join("nope.toml"))).is_err());

        let path = temp.path().join("config.toml");
        fs::write(&path, "heuristic_window_secs = 600\n").expect("write");
        let config = load_config(Some(&path)).expect("load");
        assert_eq!(config.heuristic_window_secs, 600);
    }
}
