/// Config file loading and creation for the veripoll CLI.
///
/// Config lives at ~/.config/veripoll/config.toml.
/// All fields are optional — CLI flags and prompts override config values.
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::bail;

#[derive(Deserialize, Default)]
pub struct VeripollConfig {
    pub audit_type: Option<String>,
    pub risk_limit: Option<f64>,
    pub max_fraction: Option<f64>,
    pub delta: Option<f64>,
}

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# veripoll configuration
# All values here can be overridden by CLI flags or interactive prompts.

# Audit engine: \"brla\", \"minerva\", \"athena\" or \"bravo\"
# audit_type = \"minerva\"

# Risk limit (alpha), strictly between 0 and 1
# risk_limit = 0.1

# Maximum fraction of contest ballots to draw, in (0, 1]
# max_fraction = 0.25

# Athena delta parameter (only used with audit_type = \"athena\")
# delta = 1.0
";

/// Returns the default config path: ~/.config/veripoll/config.toml
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| bail("HOME environment variable not set"));
    PathBuf::from(home).join(".config").join("veripoll").join("config.toml")
}

/// Load config from a file path. Returns default (all None) if file doesn't exist.
pub fn load_config(path: &Path) -> VeripollConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)
            .unwrap_or_else(|e| bail(format!("Failed to parse config at {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => VeripollConfig::default(),
        Err(e) => bail(format!("Failed to read config at {}: {e}", path.display())),
    }
}

/// Create the default config file. Errors if it already exists.
pub fn create_default_config() -> PathBuf {
    let path = config_path();

    if path.exists() {
        bail(format!("Config file already exists at {}", path.display()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| bail(format!("Failed to create directory {}: {e}", parent.display())));
    }

    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
        .unwrap_or_else(|e| bail(format!("Failed to write config to {}: {e}", path.display())));

    path
}
