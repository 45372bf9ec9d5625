use std::path::{Path, PathBuf};

use anyhow::Context;
use fusion::PipelineConfig;

/// Get the path to the user's pipeline config file.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("fusionplayer").join("config.json"))
}

/**
    Load the pipeline config.

    An explicit path must exist. Without one, the user config file is used
    if present, otherwise the defaults.
*/
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_file_path().filter(|p| p.is_file()) {
            Some(path) => path,
            None => {
                log::debug!("no config file, using defaults");
                return Ok(PipelineConfig::default());
            }
        },
    };

    let config = PipelineConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    log::info!("loaded config from {}", path.display());
    Ok(config)
}
