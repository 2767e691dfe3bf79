use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "http://localhost:5000/api";
pub const API_URL_ENV: &str = "TIMECARD_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub dark_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            log_level: default_log_level(),
            dark_mode: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = config_path()
            .and_then(|path| read_config(&path))
            .unwrap_or_default();
        config.apply_env(env::var(API_URL_ENV).ok());
        config
    }

    fn apply_env(&mut self, api_url: Option<String>) {
        if let Some(value) = api_url {
            if !value.trim().is_empty() {
                self.api_base = value.trim().to_string();
            }
        }
    }

    pub fn save(&self) -> Result<(), io::Error> {
        let path = config_path()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Home directory not found"))?;
        write_config(&path, self)
    }
}

fn config_path() -> Option<PathBuf> {
    let mut path = dirs::home_dir()?;
    path.push(".timecard.json");
    Some(path)
}

fn read_config(path: &Path) -> Option<AppConfig> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
    fs::write(path, json)
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"dark_mode": true}"#).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.log_level, "info");
        assert!(config.dark_mode);
    }

    #[test]
    fn env_overrides_api_base_unless_blank() {
        let mut config = AppConfig::default();
        config.apply_env(Some("  ".to_string()));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        config.apply_env(Some("https://timecard.example/api".to_string()));
        assert_eq!(config.api_base, "https://timecard.example/api");
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AppConfig {
            api_base: "https://timecard.example/api".to_string(),
            log_level: "debug".to_string(),
            dark_mode: true,
        };
        write_config(&path, &config).unwrap();
        assert_eq!(read_config(&path), Some(config));
    }

    #[test]
    fn unreadable_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{").unwrap();
        assert_eq!(read_config(&path), None);
    }
}
