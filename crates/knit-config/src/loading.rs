//! Layered configuration loading.

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use path_clean::PathClean;

use crate::config::{KnitConfig, absolutize};
use crate::error::{ConfigError, Result};

/// File name looked up in the project root.
pub const CONFIG_FILE: &str = "knit.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "KNIT_";

impl KnitConfig {
    /// Load configuration for the project at `root`.
    ///
    /// Priority: environment variables > `knit.toml` > defaults.
    /// A relative `project_root` is resolved against `root`.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let config_file = root.join(CONFIG_FILE);
        Self::load_layers(root, config_file.exists().then_some(config_file.as_path()))
    }

    /// Load configuration from an explicit file instead of `knit.toml`.
    pub fn load_from(root: impl AsRef<Path>, config_file: impl AsRef<Path>) -> Result<Self> {
        let config_file = config_file.as_ref();
        if !config_file.exists() {
            return Err(ConfigError::InvalidValue {
                field: "config file".to_string(),
                message: format!("{} does not exist", config_file.display()),
            });
        }
        Self::load_layers(root.as_ref(), Some(config_file))
    }

    fn load_layers(root: &Path, config_file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(KnitConfig::new(root)));

        if let Some(path) = config_file {
            tracing::debug!(path = %path.display(), "Loading config file");
            figment = figment.merge(Toml::file(path));
        }

        // KNIT_CACHE__DEBOUNCE_MS -> cache.debounce_ms
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: KnitConfig =
            figment
                .extract()
                .map_err(|e: figment::Error| ConfigError::InvalidValue {
                    field: e.path.join("."),
                    message: e.to_string(),
                })?;

        config.project_root = absolutize(root, &config.project_root).clean();
        if let Some(dir) = &config.cache.dir {
            config.cache.dir = Some(absolutize(&config.project_root, dir));
        }

        Ok(config)
    }
}
