use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use fractalview_core::ViewportParameters;

/// Startup settings: where the service lives and the view to start from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Static path the service serves generated images from.
    #[serde(default = "default_image_path")]
    pub image_path: String,
    #[serde(default)]
    pub initial: ViewportParameters,
}

fn default_server_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_image_path() -> String {
    "/fractals".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            image_path: default_image_path(),
            initial: ViewportParameters::default(),
        }
    }
}

impl AppConfig {
    /// Load from the configured path, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&crate::app_dir::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    error!("Failed to parse config {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read config file: {e}");
                Self::default()
            }
        }
    }

    /// Parse and check a config document. Invalid starting parameters are
    /// replaced by the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut config: AppConfig = serde_json::from_str(json)?;
        if let Err(e) = config.initial.validate() {
            error!("Ignoring initial view from config: {e}");
            config.initial = ViewportParameters::default();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(AppConfig::from_json("{}").unwrap(), AppConfig::default());
    }

    #[test]
    fn initial_view_is_read() {
        let config = AppConfig::from_json(
            r#"{"server_url":"http://fractals.local:9000",
                "initial":{"rows":400,"cols":400,"centerRe":0.0,"centerIm":0.0,
                           "pixelDivision":0.005,"maxIterations":100}}"#,
        )
        .unwrap();
        assert_eq!(config.server_url, "http://fractals.local:9000");
        assert_eq!(config.image_path, "/fractals");
        assert_eq!(
            config.initial,
            ViewportParameters::new(400, 400, 0.0, 0.0, 0.005, 100).unwrap()
        );
    }

    #[test]
    fn invalid_initial_view_falls_back() {
        let config = AppConfig::from_json(
            r#"{"initial":{"rows":0,"cols":400,"centerRe":0.0,"centerIm":0.0,
                           "pixelDivision":0.005,"maxIterations":100}}"#,
        )
        .unwrap();
        assert_eq!(config.initial, ViewportParameters::default());
    }

    #[test]
    fn unreadable_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!(
            "fractalview-config-test-{}.json",
            std::process::id()
        ));
        fs::write(&path, "{ not json").unwrap();
        let config = AppConfig::load_from(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("fractalview-config-test-does-not-exist.json");
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }
}
