use crate::planner::CollisionPolicy;
use crate::template::DEFAULT_FORMAT;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "mp3", "ogg", "oga", "opus", "flac", "m4a", "mp4", "aac", "wav", "aiff", "aif", "ape", "wv",
    "mpc", "spx",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub format: String,
    pub padding: usize,
    pub flatten: bool,
    pub recursive: bool,
    pub include_hidden: bool,
    pub extensions: Vec<String>,
    pub on_collision: CollisionPolicy,
    pub max_filename_len: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            padding: 0,
            flatten: false,
            recursive: false,
            include_hidden: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            on_collision: CollisionPolicy::Number,
            max_filename_len: 240,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub undo_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("org", "projectmusic", "music-renamer")
        .context("could not determine the OS configuration directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        undo_path: config_dir.join("undo-last.json"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths.config_path)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read config file: {}", path.display()))?;

    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("could not parse config file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempdir().expect("tempdir");
        let config = load_config_from(&temp.path().join("config.toml")).expect("load");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.format, DEFAULT_FORMAT);
        assert!(config.extensions.iter().any(|e| e == "mp3"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "format = \"artist(=)album(=)track - title\"\npadding = 2\non_collision = \"skip\"\n",
        )
        .expect("write config");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.format, "artist(=)album(=)track - title");
        assert_eq!(config.padding, 2);
        assert_eq!(config.on_collision, CollisionPolicy::Skip);
        assert!(!config.flatten);
        assert_eq!(config.max_filename_len, 240);
    }

    #[test]
    fn malformed_file_is_reported() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "padding = \"wide\"").expect("write config");

        let err = load_config_from(&path).expect_err("must fail");
        assert!(err.to_string().contains("could not parse config file"));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = AppConfig {
            flatten: true,
            extensions: vec!["mp3".to_string()],
            ..AppConfig::default()
        };
        let body = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&body).expect("parse");
        assert_eq!(parsed, config);
    }
}
