use std::env;
use std::path::PathBuf;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub api_key: String,
    pub gemini_image_model: String,
    pub gemini_base_url: String,
    pub history_storage_path: PathBuf,
    pub history_storage_key: String,
    pub download_file_name: String,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_HISTORY_STORAGE_KEY: &str = "birthdayShootHistory";

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_api_key() -> String {
    if let Some(key) = env_non_empty("API_KEY") {
        return key;
    }
    env_non_empty("GEMINI_API_KEY").unwrap_or_default()
}

fn normalize_base_url(value: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        warn!(
            "GEMINI_BASE_URL is empty; defaulting to {}.",
            DEFAULT_GEMINI_BASE_URL
        );
        return DEFAULT_GEMINI_BASE_URL.to_string();
    }
    trimmed.to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let history_storage_key = env_string("HISTORY_STORAGE_KEY", DEFAULT_HISTORY_STORAGE_KEY);
        if history_storage_key.trim().is_empty() {
            return Err(anyhow::anyhow!("HISTORY_STORAGE_KEY must not be empty"));
        }

        let download_file_name = env_string("DOWNLOAD_FILE_NAME", "birthday-shoot.jpg");
        if download_file_name.trim().is_empty() || download_file_name.contains(['/', '\\']) {
            return Err(anyhow::anyhow!(
                "DOWNLOAD_FILE_NAME must be a plain file name, got '{}'",
                download_file_name
            ));
        }

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(env_string("LOG_DIR", "logs")),
            api_key: resolve_api_key(),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", DEFAULT_IMAGE_MODEL),
            gemini_base_url: normalize_base_url(env_string(
                "GEMINI_BASE_URL",
                DEFAULT_GEMINI_BASE_URL,
            )),
            history_storage_path: PathBuf::from(env_string(
                "HISTORY_STORAGE_PATH",
                "birthday_shoot_storage.json",
            )),
            history_storage_key: history_storage_key.trim().to_string(),
            download_file_name: download_file_name.trim().to_string(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Preset styles offered by the outfit picker. Free text is accepted as well.
pub const OUTFIT_OPTIONS: &[&str] = &[
    "Chic & Élégant",
    "Décontracté & Tendance",
    "Festif & Pailleté",
    "Costume de super-héros",
    "Robe de bal de conte de fées",
];
