use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of a single TTFB measurement.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection to {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read first byte from {url}: {source}")]
    Read {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("no response from {url} within {deadline:?}")]
    Timeout { url: String, deadline: Duration },
}

impl ProbeError {
    /// Short label used for logs and the failure counter.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Read { .. } => "read",
            Self::Body { .. } => "body",
            Self::Timeout { .. } => "timeout",
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No {} file! Please create it and run again.", path.display())]
    MissingEnvFile { path: PathBuf },
    #[error("Could not determine the home directory; pass --env-file instead.")]
    NoHomeDir,
    #[error("Failed to read '{}': {source}", path.display())]
    ReadEnvFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse '{}': {source}", path.display())]
    ParseEnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("Failed to create '{}' from '{}'': {source}", path.display(), template.display())]
    InstallEnvFile {
        path: PathBuf,
        template: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read '{key}' from stdin: {source}")]
    Prompt {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{key}' must not be empty.")]
    EmptyValue { key: String },
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme '{scheme}' in '{url}'; use http:// or https://")]
    UnsupportedScheme { url: String, scheme: String },
    #[error("Invalid value '{value}' for '{key}'.")]
    InvalidValue { key: String, value: String },
    #[error("Invalid log level: {0}. Valid levels are: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}
