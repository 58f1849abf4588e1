//! Config loading entry points.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::FragmirrorConfig;
use config::{ConfigError, Environment, File};
use std::path::{Path, PathBuf};

/// Loads [`FragmirrorConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): built-in defaults, the global config file, the
    /// workspace's `config/config.toml`, `config/{FRAGMIRROR_ENV}.toml`, then
    /// `FRAGMIRROR__SECTION__KEY` environment variables.
    pub fn load(workspace_root: &Path) -> Result<FragmirrorConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(
                Environment::with_prefix("FRAGMIRROR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Load a single file over the built-in defaults.
    pub fn load_from_file(path: &Path) -> Result<FragmirrorConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Location of the global config file, if a home directory can be resolved.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
