//! Settings file loading (`.gridsync/config.toml`)

use std::path::Path;

use gridsync_core::prelude::*;

use super::types::Settings;

const GRIDSYNC_DIR: &str = ".gridsync";
const CONFIG_FILENAME: &str = "config.toml";

/// Load settings from `.gridsync/config.toml`.
///
/// A missing file yields defaults silently; an unreadable or invalid one
/// yields defaults with a warning.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = project_path.join(GRIDSYNC_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create `.gridsync/config.toml` with commented defaults if it does not exist
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let gridsync_dir = project_path.join(GRIDSYNC_DIR);

    if !gridsync_dir.exists() {
        std::fs::create_dir_all(&gridsync_dir)
            .map_err(|e| Error::config(format!("Failed to create .gridsync dir: {}", e)))?;
    }

    let config_path = gridsync_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        let default_content = r##"# gridsync component settings

[gradient]
low_color = "#FF0000"      # Smallest ranked value blends toward this
high_color = "#00FF00"     # Largest ranked value renders exactly this

[live]
reconnect = true           # Reconnect the live channel after it drops
max_reconnect_attempts = 10
initial_backoff_ms = 1000  # Doubles per attempt
max_backoff_ms = 30000

[dispatch]
channel_capacity = 256     # Pending messages before listeners start dropping
"##;
        std::fs::write(&config_path, default_content)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config at {:?}", config_path);
    }

    Ok(())
}
