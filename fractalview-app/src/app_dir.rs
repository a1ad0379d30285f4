//! Where the app looks for its configuration: next to the executable, so a
//! standalone install carries its settings with it.

use std::path::PathBuf;

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "FRACTALVIEW_CONFIG";

/// Directory holding the running binary, or the working directory when that
/// cannot be determined.
pub fn exe_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Configuration file path, honouring [`CONFIG_ENV`].
pub fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => exe_directory().join("fractalview.json"),
    }
}
