use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::util::{home_dir, trim_line_ending};

pub const ENV_FILE_NAME: &str = ".ttfbEnv";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TtfbConfig {
    pub url: String,
    pub search: String,
    pub no_cache: bool,
    pub timeout_ms: u64,
    pub repeat: u32,
    pub interval_ms: u64,
    pub log_level: String,
    pub log_format: LogFormat,
    pub enable_latency_history: bool,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl TtfbConfig {
    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(ConfigError::InvalidLogLevel(self.log_level.clone())),
        }
    }

    /// Validate the log level is one of the supported values
    pub fn validate_log_level(&self) -> Result<(), ConfigError> {
        self.get_tracing_level().map(|_| ())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFileStatus {
    Existing,
    Linked,
    Copied,
    Missing,
}

/// Resolves the run configuration from CLI flags, the env file and, as a last
/// resort, interactive prompts.
pub struct ConfigLoader {
    env_path: PathBuf,
    template: PathBuf,
}

impl ConfigLoader {
    pub fn new(env_path: PathBuf, template: PathBuf) -> Self {
        Self { env_path, template }
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let env_path = match &cli.env_file {
            Some(path) => path.clone(),
            None => home_dir().ok_or(ConfigError::NoHomeDir)?.join(ENV_FILE_NAME),
        };
        Ok(Self::new(env_path, PathBuf::from(ENV_FILE_NAME)))
    }

    pub fn env_path(&self) -> &Path {
        &self.env_path
    }

    /// Installs the template as the env file on first run: hard link first,
    /// copy when linking is not possible.
    pub fn prepare_env_file(&self) -> Result<EnvFileStatus, ConfigError> {
        if self.env_path.is_file() {
            return Ok(EnvFileStatus::Existing);
        }
        if !self.template.is_file() {
            return Ok(EnvFileStatus::Missing);
        }
        match fs::hard_link(&self.template, &self.env_path) {
            Ok(()) => Ok(EnvFileStatus::Linked),
            Err(e) => {
                tracing::debug!("hard link to {} failed: {:?}", self.env_path.display(), e);
                fs::copy(&self.template, &self.env_path)
                    .map(|_| EnvFileStatus::Copied)
                    .map_err(|source| ConfigError::InstallEnvFile {
                        path: self.env_path.clone(),
                        template: self.template.clone(),
                        source,
                    })
            }
        }
    }

    /// Parses the env file without touching the process environment.
    pub fn read_env_file(&self) -> Result<HashMap<String, String>, ConfigError> {
        let env_err = |source: dotenvy::Error| match source {
            dotenvy::Error::Io(source) => ConfigError::ReadEnvFile {
                path: self.env_path.clone(),
                source,
            },
            source => ConfigError::ParseEnvFile {
                path: self.env_path.clone(),
                source,
            },
        };
        dotenvy::from_path_iter(&self.env_path)
            .map_err(env_err)?
            .map(|item| item.map_err(env_err))
            .collect()
    }

    pub fn load<R: BufRead, W: Write>(
        &self,
        cli: &Cli,
        input: &mut R,
        output: &mut W,
    ) -> Result<TtfbConfig, ConfigError> {
        let status = self.prepare_env_file()?;
        if matches!(status, EnvFileStatus::Linked | EnvFileStatus::Copied) {
            let _ = writeln!(
                output,
                "Config file does not exist, linking default to {}\nPlease edit it after all.",
                self.env_path.display()
            );
        }

        let cli_complete = non_empty(cli.url.as_deref()).is_some()
            && non_empty(cli.search.as_deref()).is_some();
        let file = match status {
            EnvFileStatus::Missing if cli_complete => HashMap::new(),
            EnvFileStatus::Missing => {
                return Err(ConfigError::MissingEnvFile {
                    path: self.env_path.clone(),
                });
            }
            EnvFileStatus::Existing | EnvFileStatus::Linked | EnvFileStatus::Copied => {
                self.read_env_file()?
            }
        };
        let from_file = |key: &str| non_empty(file.get(key).map(String::as_str));

        let mut prompter = Prompter {
            input,
            output,
            enabled: !cli.no_prompt,
            greeted: false,
        };

        let url = match non_empty(cli.url.as_deref()).or_else(|| from_file("url")) {
            Some(url) => url.to_string(),
            None => prompter.ask(
                "url",
                "-> 'url' in .ttfbEnv is empty - please provide with http:// or https:// !",
            )?,
        };
        validate_url(&url)?;

        let search = match non_empty(cli.search.as_deref()).or_else(|| from_file("search")) {
            Some(search) => search.to_string(),
            None => prompter.ask(
                "search",
                "-> 'search' in .ttfbEnv is empty - please provide (you can use wildcards - for ex. '.*com')?",
            )?,
        };

        let no_cache = cli.no_cache
            || from_file("no_cache")
                .map(parse_bool)
                .transpose()?
                .unwrap_or(false);
        let timeout_ms = match cli.timeout_ms {
            Some(ms) => ms,
            None => from_file("timeout_ms")
                .map(|v| parse_number("timeout_ms", v))
                .transpose()?
                .unwrap_or_else(default_timeout_ms),
        };
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_ms".to_string(),
                value: timeout_ms.to_string(),
            });
        }
        let log_level = cli
            .log_level
            .as_deref()
            .or_else(|| from_file("log_level"))
            .map(str::to_string)
            .unwrap_or_else(default_log_level);

        let config = TtfbConfig {
            url,
            search,
            no_cache,
            timeout_ms,
            repeat: cli.repeat,
            interval_ms: cli.interval_ms,
            log_level,
            log_format: cli.log_format,
            enable_latency_history: cli.latency_history,
        };
        config.validate_log_level()?;
        Ok(config)
    }
}

struct Prompter<'a, R, W> {
    input: &'a mut R,
    output: &'a mut W,
    enabled: bool,
    greeted: bool,
}

impl<R: BufRead, W: Write> Prompter<'_, R, W> {
    fn ask(&mut self, key: &str, message: &str) -> Result<String, ConfigError> {
        if !self.enabled {
            return Err(ConfigError::EmptyValue {
                key: key.to_string(),
            });
        }
        let io_err = |source: std::io::Error| ConfigError::Prompt {
            key: key.to_string(),
            source,
        };
        if !self.greeted {
            self.greeted = true;
            writeln!(
                self.output,
                "ttfb, testing your slow website since 2020 ;-)\n---------------------\nYou can test custom url by .ttfbEnv or inline\nThere is also 'search' if you need some HTML body & headers info\n---------------------"
            )
            .map_err(io_err)?;
        }
        writeln!(self.output, "{message}").map_err(io_err)?;
        self.output.flush().map_err(io_err)?;

        let mut line = String::new();
        self.input.read_line(&mut line).map_err(io_err)?;
        match non_empty(Some(trim_line_ending(&line))) {
            Some(value) => Ok(value.to_string()),
            None => Err(ConfigError::EmptyValue {
                key: key.to_string(),
            }),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn validate_url(raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: "no_cache".to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
