//! Configuration loading and validation.
//!
//! The adapter reads a single JSON config file, `cxgate.json` in the
//! current directory by default. The `general` block configures the HTTP
//! listener and the logger; the `service` block describes the backing
//! service: where it listens, what it is, which parameters it accepts,
//! and the networks it consumes and produces.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cxgate_core::{CodecError, GeneratorConfig, ParameterConfig, ParserConfig};

/// Default config file location, resolved against the working directory.
pub const CONFIG_FILE: &str = "cxgate.json";

/// Errors raised while loading or validating the configuration. All of
/// these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be opened or read.
    #[error("could not read config file {}: {source}", path.display())]
    Read {
        /// The path that was attempted.
        path: PathBuf,
        /// The underlying IO failure.
        source: std::io::Error,
    },

    /// The config file is not valid JSON for the expected schema.
    #[error("could not parse config file {}: {source}", path.display())]
    Parse {
        /// The path that was read.
        path: PathBuf,
        /// The decoder's failure.
        source: serde_json::Error,
    },

    /// A required field is absent.
    #[error("{section} config missing required {field} field")]
    MissingField {
        /// The config block at fault.
        section: &'static str,
        /// The absent field.
        field: &'static str,
    },

    /// A singleton flag is set but the network list is not a singleton.
    #[error("{section} config: singleton mode requires exactly one network, found {count}")]
    SingletonCardinality {
        /// The config block at fault.
        section: &'static str,
        /// How many networks were configured.
        count: usize,
    },

    /// A parser, generator, or parameter descriptor failed validation.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The configured log file could not be opened.
    #[error("could not open log file {path}: {source}")]
    LogFile {
        /// The configured file path.
        path: String,
        /// The underlying IO failure.
        source: std::io::Error,
    },
}

/// The whole configuration of the adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub general: GeneralConfig,
    pub service: ServiceConfig,
}

/// Options for the adapter process itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralConfig {
    /// host:port the HTTP listener binds.
    pub location: String,
    /// Optional DNS domain the deployment is served under.
    pub domain: String,
    pub logger: LogConfig,
    /// Inactivity deadline for reading the request body, in seconds.
    pub read_timeout: u64,
    /// Deadline for writing the response, in seconds. Recorded and
    /// logged; see DESIGN.md for enforcement notes.
    pub write_timeout: u64,
    /// TCP keep-alive window, in seconds. Recorded and logged.
    pub idle_timeout: u64,
}

/// Logger options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    /// Turn on debug-level output.
    pub debug: bool,
    /// Append log lines to this file instead of stderr.
    pub file: String,
    /// `json` for structured output, anything else for plain text.
    pub format: String,
}

/// Everything describing the backing service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    /// host:port the gRPC service listens on.
    pub location: String,
    pub title: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub license: String,
    pub language: String,
    /// Parameters forwarded from the query string.
    pub parameters: ParameterConfig,
    /// The networks a request body must contain, in order.
    pub input: ParserConfig,
    /// Treat the single input network as a bare document, no outer array.
    pub singleton_input: bool,
    /// The networks the response will contain, in order.
    pub output: GeneratorConfig,
    /// Treat the single output network as a bare document, no outer array.
    pub singleton_output: bool,
}

impl Config {
    /// Load a config file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate every block and apply the timeout defaults.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.service.validate()?;
        Ok(())
    }

    /// Render the config as indented JSON, for the `config` subcommand.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl GeneralConfig {
    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.location.is_empty() {
            return Err(ConfigError::MissingField {
                section: "general",
                field: "location",
            });
        }
        if self.read_timeout == 0 {
            self.read_timeout = 5;
        }
        if self.write_timeout == 0 {
            self.write_timeout = 10;
        }
        if self.idle_timeout == 0 {
            self.idle_timeout = 120;
        }
        Ok(())
    }
}

impl ServiceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.location.is_empty() {
            return Err(ConfigError::MissingField {
                section: "service",
                field: "location",
            });
        }
        if self.title.is_empty() {
            return Err(ConfigError::MissingField {
                section: "service",
                field: "title",
            });
        }
        if self.version.is_empty() {
            return Err(ConfigError::MissingField {
                section: "service",
                field: "version",
            });
        }
        self.parameters.validate()?;
        self.input.validate()?;
        self.output.validate()?;
        if self.singleton_input && self.input.0.len() != 1 {
            return Err(ConfigError::SingletonCardinality {
                section: "input",
                count: self.input.0.len(),
            });
        }
        if self.singleton_output && self.output.0.len() != 1 {
            return Err(ConfigError::SingletonCardinality {
                section: "output",
                count: self.output.0.len(),
            });
        }
        Ok(())
    }
}
