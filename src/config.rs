// Local credentials file. The config is an explicit value: commands load
// it, pass it down, and call `save` when something (a new token) must be
// written back.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location, relative to the user's home directory.
pub const DEFAULT_CONFIG_PATH: &str = "~/.crowdaq/config.json";

/// Contents of the config file. Missing fields deserialize as empty
/// strings so a half-written file still loads.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub token: String,
}

impl Config {
    /// Read the config from `path`. Unlike `load_or_default`, a missing
    /// file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("{} is not a file.", path.display());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let conf: Config = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(conf)
    }

    /// Used by the interactive `config` command, which may run before any
    /// file exists.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Write the config as indented JSON, creating the parent directory
    /// when needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Copy of this config carrying a fresh token.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        Config {
            token: token.into(),
            ..self
        }
    }

    /// Merge interactive answers: empty answers keep the current value and
    /// the token is always cleared, since it belonged to the old account.
    pub fn updated(&self, site_url: &str, user: &str, password: &str) -> Self {
        let site_url = site_url.trim().trim_end_matches('/');
        let user = user.trim();
        let password = password.trim();
        Config {
            site_url: pick(site_url, &self.site_url),
            user: pick(user, &self.user),
            password: pick(password, &self.password),
            token: String::new(),
        }
    }
}

fn pick(answer: &str, current: &str) -> String {
    if answer.is_empty() {
        current.to_string()
    } else {
        answer.to_string()
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_keeps_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let conf = Config {
            site_url: "https://example.org".into(),
            user: "alice".into(),
            password: "secret".into(),
            token: String::new(),
        }
        .with_token("tok-1");
        conf.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.token, "tok-1");
        assert_eq!(loaded.user, "alice");
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("is not a file"));
    }

    #[test]
    fn updated_keeps_blank_answers_and_clears_token() {
        let current = Config {
            site_url: "https://old.org".into(),
            user: "bob".into(),
            password: "pw".into(),
            token: "stale".into(),
        };
        let next = current.updated("https://new.org/", "", "  ");
        assert_eq!(next.site_url, "https://new.org");
        assert_eq!(next.user, "bob");
        assert_eq!(next.password, "pw");
        assert!(next.token.is_empty());
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("conf.json"), PathBuf::from("conf.json"));
        assert!(!expand_home("~/x.json").starts_with("~"));
    }
}
