//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

pub const DEFAULT_METADATA_FILE_NAME: &str = ".fragment.json";
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0";
pub const DEFAULT_SCHEMA_LOCATION: &str = "urn:fragmirror:schema:fragment:1";
pub const DEFAULT_MAX_LOCAL_NAME_LEN: i64 = 32;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("mirror.metadata_file_name", DEFAULT_METADATA_FILE_NAME)?
        .set_default("mirror.schema_version", DEFAULT_SCHEMA_VERSION)?
        .set_default("mirror.schema_location", DEFAULT_SCHEMA_LOCATION)?
        .set_default("mirror.max_local_name_len", DEFAULT_MAX_LOCAL_NAME_LEN)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stdout")
}
