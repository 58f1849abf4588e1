//! Configuration System
//!
//! Layered configuration for controllers and logging. Defaults come from the merge policy;
//! the global file, workspace files and `FRAGMIRROR__*` environment variables override them
//! in that order.

use crate::error::FragmentError;
use crate::fragment::CommonAttributes;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use merge::merge_policy::{
    DEFAULT_MAX_LOCAL_NAME_LEN, DEFAULT_METADATA_FILE_NAME, DEFAULT_SCHEMA_LOCATION,
    DEFAULT_SCHEMA_VERSION,
};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FragmirrorConfig {
    /// Controller settings
    #[serde(default)]
    pub mirror: MirrorSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings shared by every controller opened with them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSettings {
    /// Conventional name of the per-container metadata file
    #[serde(default = "default_metadata_file_name")]
    pub metadata_file_name: String,

    /// Schema version written on new fragments
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Schema location written on new fragments
    #[serde(default = "default_schema_location")]
    pub schema_location: String,

    /// Longest container name derived from display text
    #[serde(default = "default_max_local_name_len")]
    pub max_local_name_len: usize,
}

fn default_metadata_file_name() -> String {
    DEFAULT_METADATA_FILE_NAME.to_string()
}

fn default_schema_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

fn default_schema_location() -> String {
    DEFAULT_SCHEMA_LOCATION.to_string()
}

fn default_max_local_name_len() -> usize {
    DEFAULT_MAX_LOCAL_NAME_LEN as usize
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            metadata_file_name: default_metadata_file_name(),
            schema_version: default_schema_version(),
            schema_location: default_schema_location(),
            max_local_name_len: default_max_local_name_len(),
        }
    }
}

impl MirrorSettings {
    /// Validate controller settings
    pub fn validate(&self) -> Result<(), String> {
        let name = self.metadata_file_name.as_str();
        if name.is_empty() {
            return Err("Metadata file name cannot be empty".to_string());
        }
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(format!(
                "Metadata file name must be a single path segment: {:?}",
                name
            ));
        }
        if self.schema_version.trim().is_empty() {
            return Err("Schema version cannot be empty".to_string());
        }
        if self.max_local_name_len == 0 {
            return Err("max_local_name_len must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Common attributes for a fragment synthesized under these settings.
    pub fn common_attributes(&self) -> CommonAttributes {
        CommonAttributes::new(&self.schema_version, &self.schema_location)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Mirror(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Mirror(msg) => write!(f, "Mirror: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl FragmirrorConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.mirror.validate() {
            errors.push(ValidationError::Mirror(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one error.
    pub fn ensure_valid(&self) -> Result<(), FragmentError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            FragmentError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }
}
