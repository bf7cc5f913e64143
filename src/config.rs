//! Settings parser for .weft/config.toml

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

const CONFIG_FILENAME: &str = "config.toml";
const WEFT_DIR: &str = ".weft";

/// Optional settings merged under CLI flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend server URL used by `weft connect` when no URL argument is
    /// given.
    pub server_url: Option<String>,

    /// Override for the static asset configuration location.
    pub static_config_url: Option<String>,
}

impl Settings {
    /// Load settings from `explicit_path`, or from the first of
    /// `./.weft/config.toml` and `<config dir>/weft/config.toml` that
    /// exists. Missing files mean defaults; unreadable files are logged
    /// and ignored.
    pub fn load(explicit_path: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = match explicit_path {
            Some(path) => vec![path.to_path_buf()],
            None => {
                let mut paths = vec![PathBuf::from(WEFT_DIR).join(CONFIG_FILENAME)];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("weft").join(CONFIG_FILENAME));
                }
                paths
            }
        };

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::parse_file(&path) {
                Ok(settings) => return settings,
                Err(message) => warn!("ignoring config at {}: {message}", path.display()),
            }
        }
        Self::default()
    }

    fn parse_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        toml::from_str(&contents).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("nope.toml")));
        assert!(settings.server_url.is_none());
        assert!(settings.static_config_url.is_none());
    }

    #[test]
    fn test_load_parses_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
server_url = "http://localhost:9000/"
static_config_url = "https://assets.example.com/static.json"
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path));
        assert_eq!(settings.server_url.as_deref(), Some("http://localhost:9000/"));
        assert_eq!(
            settings.static_config_url.as_deref(),
            Some("https://assets.example.com/static.json")
        );
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, r#"server_url = "http://localhost:9000/""#).unwrap();

        let settings = Settings::load(Some(&path));
        assert!(settings.server_url.is_some());
        assert!(settings.static_config_url.is_none());
    }

    #[test]
    fn test_load_corrupt_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "server_url = [this is not toml").unwrap();

        let settings = Settings::load(Some(&path));
        assert!(settings.server_url.is_none());
    }
}
