//! API key configuration.
//!
//! Keys live in a JSON file under the home directory
//! (`~/.paperscout.json`); each field can be overridden with a
//! `PAPERSCOUT_*` environment variable so CI and one-off runs never have
//! to touch the file.

use crate::error::{Result, ScoutError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Default config file path: `~/.paperscout.json`
fn default_config_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".paperscout.json"))
        .ok_or_else(|| ScoutError::Config("Cannot determine home directory".to_string()))
}

/// API keys and credentials for the sources that need them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Semantic Scholar API key (optional, raises rate limits)
    #[serde(default)]
    pub semanticscholar_key: Option<String>,
    /// IEEE Xplore API key (required for the IEEE source)
    #[serde(default)]
    pub ieee_key: Option<String>,
    /// Elsevier API key (required for the Scopus source)
    #[serde(default)]
    pub elsevier_key: Option<String>,
    /// Springer Nature API key (required for the Springer source)
    #[serde(default)]
    pub springer_key: Option<String>,
    /// NCBI API key (optional, raises PubMed/PMC rate limits)
    #[serde(default)]
    pub ncbi_key: Option<String>,
    /// Zotero write-API key
    #[serde(default)]
    pub zotero_key: Option<String>,
    /// Zotero numeric user id
    #[serde(default)]
    pub zotero_user_id: Option<String>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Self {
        let from_file = default_config_path()
            .ok()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default();
        from_file.with_env_overrides()
    }

    /// Load from an explicit path, falling back to defaults on any error.
    pub fn load_from(path: &PathBuf) -> Self {
        if !path.exists() {
            debug!("Config file not found: {:?}", path);
            return Config::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse config file: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file: {}", e);
                Config::default()
            }
        }
    }

    /// Apply `PAPERSCOUT_*` environment variables over file values.
    fn with_env_overrides(self) -> Self {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Inner form of [`Config::with_env_overrides`] with a pluggable lookup.
    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let overrides: [(&str, &mut Option<String>); 7] = [
            ("PAPERSCOUT_SEMANTICSCHOLAR_KEY", &mut self.semanticscholar_key),
            ("PAPERSCOUT_IEEE_KEY", &mut self.ieee_key),
            ("PAPERSCOUT_ELSEVIER_KEY", &mut self.elsevier_key),
            ("PAPERSCOUT_SPRINGER_KEY", &mut self.springer_key),
            ("PAPERSCOUT_NCBI_KEY", &mut self.ncbi_key),
            ("PAPERSCOUT_ZOTERO_KEY", &mut self.zotero_key),
            ("PAPERSCOUT_ZOTERO_USER_ID", &mut self.zotero_user_id),
        ];

        for (var, slot) in overrides {
            if let Some(value) = lookup(var) {
                if !value.trim().is_empty() {
                    *slot = Some(value);
                }
            }
        }

        self
    }

    /// Path the config is loaded from.
    pub fn path() -> Result<PathBuf> {
        default_config_path()
    }

    /// Write an empty template for the user to fill in.
    pub fn write_template() -> Result<PathBuf> {
        let path = default_config_path()?;
        if path.exists() {
            return Err(ScoutError::Config(format!(
                "Config file already exists: {:?}",
                path
            )));
        }
        let template = serde_json::to_string_pretty(&Config::default())?;
        std::fs::write(&path, template)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_missing_file() {
        let config = Config::load_from(&PathBuf::from("/nonexistent/config.json"));
        assert!(config.ieee_key.is_none());
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let mut temp = NamedTempFile::new()?;
        writeln!(
            temp,
            r#"{{"ieee_key": "abc", "zotero_user_id": "12345"}}"#
        )?;

        let config = Config::load_from(&temp.path().to_path_buf());
        assert_eq!(config.ieee_key.as_deref(), Some("abc"));
        assert_eq!(config.zotero_user_id.as_deref(), Some("12345"));
        assert!(config.springer_key.is_none());
        Ok(())
    }

    #[test]
    fn test_env_override_wins_over_file_value() {
        let config = Config {
            ieee_key: Some("from-file".into()),
            ..Default::default()
        };

        let config = config.with_overrides(|var| match var {
            "PAPERSCOUT_IEEE_KEY" => Some("from-env".to_string()),
            "PAPERSCOUT_NCBI_KEY" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config.ieee_key.as_deref(), Some("from-env"));
        // Blank values do not count as overrides
        assert!(config.ncbi_key.is_none());
        // Untouched fields keep their file values (here: none)
        assert!(config.springer_key.is_none());
    }

    #[test]
    fn test_load_invalid_json_falls_back() -> Result<()> {
        let mut temp = NamedTempFile::new()?;
        writeln!(temp, "not json")?;
        let config = Config::load_from(&temp.path().to_path_buf());
        assert!(config.ieee_key.is_none());
        Ok(())
    }
}
