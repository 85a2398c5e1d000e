//! Configuration management for the resolver
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (resolver.toml)
//! - Environment variables (SCHEMA_RESOLVER__*)
//!
//! ## Example config file (resolver.toml):
//! ```toml
//! [input]
//! dir = "./parsed"
//! extension = "json"
//! skip_prefixes = ["drafts/"]
//!
//! [resolution]
//! policy = "best_effort"
//!
//! [logging]
//! filter = "schema_resolver=info"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::context::Policy;
use crate::loader::LoadConfig;

/// Main configuration for a resolution run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Where parsed module documents are read from
    #[serde(default)]
    pub input: InputConfig,

    /// Failure handling
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Input discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Directory holding parsed module documents
    #[serde(default = "default_input_dir")]
    pub dir: PathBuf,

    /// File extension of module documents
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Relative path prefixes to ignore
    #[serde(default)]
    pub skip_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionConfig {
    #[serde(default)]
    pub policy: Policy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_extension() -> String {
    "json".to_string()
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: default_input_dir(),
            extension: default_extension(),
            skip_prefixes: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl From<&InputConfig> for LoadConfig {
    fn from(input: &InputConfig) -> Self {
        LoadConfig {
            extension: input.extension.clone(),
            skip_prefixes: input.skip_prefixes.clone(),
        }
    }
}

impl ResolverConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["resolver.toml", ".resolver.toml", "config/resolver.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) =
            directories::ProjectDirs::from("dev", "schema-resolver", "schema-resolver")
        {
            let xdg_config = config_dir.config_dir().join("resolver.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCHEMA_RESOLVER__RESOLUTION__POLICY=strict
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_RESOLVER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Input directory (resolves relative paths)
    pub fn input_dir(&self) -> PathBuf {
        if self.input.dir.is_absolute() {
            self.input.dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.input.dir)
        }
    }

    pub fn load_config(&self) -> LoadConfig {
        LoadConfig::from(&self.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.resolution.policy, Policy::BestEffort);
        assert_eq!(config.input.extension, "json");
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_serialize_config() {
        let config = ResolverConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[resolution]"));
        assert!(toml_str.contains("policy = \"best_effort\""));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[input]\ndir = \"parsed\"\nskip_prefixes = [\"drafts/\"]\n\n\
             [resolution]\npolicy = \"strict\"\n",
        )
        .unwrap();

        let config = ResolverConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.resolution.policy, Policy::Strict);
        assert_eq!(config.input.dir, PathBuf::from("parsed"));
        assert_eq!(config.load_config().skip_prefixes, vec!["drafts/".to_string()]);
        assert_eq!(config.input.extension, "json");
    }

    #[test]
    fn test_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = ResolverConfig::default();
        config.resolution.policy = Policy::Strict;
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = ResolverConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.resolution.policy, Policy::Strict);
    }
}
