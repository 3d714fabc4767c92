//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/storyrun/storyrun.toml`
//! 3. Explicit config file (`--config`)
//! 4. Environment variables: `STORYRUN_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;

/// Default upper bound for one `run` invocation.
pub const DEFAULT_MAX_TICKS: u64 = 1000;

/// Raw settings for intermediate parsing (`None` → not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub save_dir: Option<PathBuf>,
    pub max_ticks: Option<u64>,
    pub stop_when_empty: Option<bool>,
}

/// Unified configuration for storyrun.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directory for bare session names (default: ~/.storyrun/saves)
    pub save_dir: PathBuf,
    /// Upper bound on ticks for one run
    pub max_ticks: u64,
    /// End the session as soon as a tick reports success
    pub stop_when_empty: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            max_ticks: DEFAULT_MAX_TICKS,
            stop_when_empty: true,
        }
    }
}

fn default_save_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".storyrun").join("saves"))
        .unwrap_or_else(|| PathBuf::from("~/.storyrun/saves"))
}

/// Get the XDG config directory for storyrun.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "storyrun").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("storyrun.toml"))
}

fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// `~`, `$VAR` and `${VAR}`; unknown variables leave the input untouched.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(raw.as_ref()) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

impl Settings {
    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            save_dir: overlay
                .save_dir
                .clone()
                .unwrap_or_else(|| self.save_dir.clone()),
            max_ticks: overlay.max_ticks.unwrap_or(self.max_ticks),
            stop_when_empty: overlay.stop_when_empty.unwrap_or(self.stop_when_empty),
        }
    }

    fn expand_paths(&mut self) {
        self.save_dir = expand_path(&self.save_dir);
    }

    /// Load settings with layered precedence.
    ///
    /// An explicit `config_file` must exist; the global file is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("global config: {}", global_path.display());
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            debug!("explicit config: {}", path.display());
            current = current.merge_with(&load_raw_settings(path)?);
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        Ok(current)
    }

    /// Apply STORYRUN_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("STORYRUN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("save_dir") {
            settings.save_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get::<u64>("max_ticks") {
            settings.max_ticks = val;
        }
        if let Ok(val) = config.get_bool("stop_when_empty") {
            settings.stop_when_empty = val;
        }
        Ok(settings)
    }

    /// Absolute paths and paths with a directory component pass through;
    /// bare names resolve under `save_dir`.
    pub fn resolve_save_path(&self, name: &str) -> PathBuf {
        let path = expand_path(Path::new(name));
        let is_bare = path
            .parent()
            .map(|p| p.as_os_str().is_empty())
            .unwrap_or(true);
        if path.is_absolute() || !is_bare {
            path
        } else {
            self.save_dir.join(path)
        }
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# storyrun configuration
#
# Locations (by precedence, lowest to highest):
#   Global:   ~/.config/storyrun/storyrun.toml
#   Explicit: --config <file>
#   Env:      STORYRUN_* environment variables

# Directory for bare session names
# save_dir = "~/.storyrun/saves"

# Upper bound on ticks for one `storyrun run`
# max_ticks = 1000

# End the session once a tick reports success
# stop_when_empty = true
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_default_settings_when_created_then_has_expected_values() {
        let settings = Settings::default();
        assert_eq!(settings.max_ticks, DEFAULT_MAX_TICKS);
        assert!(settings.stop_when_empty);
        assert!(settings.save_dir.ends_with(".storyrun/saves"));
    }

    #[test]
    fn given_partial_overlay_when_merging_then_only_specified_fields_change() {
        let base = Settings::default();
        let overlay = RawSettings {
            max_ticks: Some(7),
            ..Default::default()
        };

        let merged = base.merge_with(&overlay);

        assert_eq!(merged.max_ticks, 7);
        assert_eq!(merged.save_dir, base.save_dir);
        assert_eq!(merged.stop_when_empty, base.stop_when_empty);
    }

    #[test]
    fn given_tilde_in_save_dir_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            save_dir: PathBuf::from("~/stories"),
            ..Default::default()
        };

        settings.expand_paths();

        let home = directories::BaseDirs::new().unwrap().home_dir().to_path_buf();
        assert_eq!(settings.save_dir, home.join("stories"));
    }

    #[test]
    fn given_bare_name_when_resolving_then_joins_save_dir() {
        let settings = Settings {
            save_dir: PathBuf::from("/var/saves"),
            ..Default::default()
        };
        assert_eq!(
            settings.resolve_save_path("chapter1.sav"),
            PathBuf::from("/var/saves/chapter1.sav")
        );
    }

    #[test]
    fn given_path_with_directory_when_resolving_then_passes_through() {
        let settings = Settings {
            save_dir: PathBuf::from("/var/saves"),
            ..Default::default()
        };
        assert_eq!(
            settings.resolve_save_path("/tmp/chapter1.sav"),
            PathBuf::from("/tmp/chapter1.sav")
        );
        assert_eq!(
            settings.resolve_save_path("local/chapter1.sav"),
            PathBuf::from("local/chapter1.sav")
        );
    }

    #[test]
    fn given_settings_when_rendering_toml_then_contains_all_keys() {
        let toml = Settings::default().to_toml().unwrap();
        assert!(toml.contains("save_dir"));
        assert!(toml.contains("max_ticks = 1000"));
        assert!(toml.contains("stop_when_empty = true"));
    }
}
